pub mod phase;
pub mod policy;

pub use phase::PhaseMachine;
pub use policy::{DecisionContext, TeachingPolicy};
