pub mod coordinator;
pub mod error;
pub mod hashring;

pub use coordinator::{CoordinationConfig, PartitionCoordinator};
pub use error::{Error, Result};
pub use hashring::HashRing;
