pub mod backends;
pub mod error;
pub mod policy;
pub mod uri;

pub use backends::{Backend, MemoryBackend};
pub use error::{BackendError, PublishError};
pub use policy::Publisher;
pub use uri::{DeliveryPolicy, PublisherSpec};
