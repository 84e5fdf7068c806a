pub mod claims;
pub mod codec;
pub mod cycle;
pub mod engine;

pub use engine::RewardsEngine;
