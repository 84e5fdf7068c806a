pub mod clock;
pub mod config;
pub mod error;
pub mod loyalty;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use error::{ClaimRejection, RewardsError, RewardsResult};
pub use storage::KeyValueStore;
