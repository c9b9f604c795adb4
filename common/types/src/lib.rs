pub mod event;
pub mod resource;
pub mod sample;

pub use event::{Event, Trait, TraitValue};
pub use resource::Resource;
pub use sample::{Sample, SampleKind};
