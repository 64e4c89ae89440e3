pub mod engine;
pub mod usable;

pub use engine::{wait, Wait};
pub use usable::Usable;
