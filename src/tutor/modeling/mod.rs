pub mod classifier;
pub mod emotion;
pub mod flow;
pub mod profile_builder;
pub mod trend;
pub mod zpd;

pub use classifier::{Classification, ResponseClassifier};
pub use emotion::{dominant_emotion, EmotionEstimator, EmotionInput};
pub use flow::FlowStateCalculator;
pub use profile_builder::{
    BaseProfileRecord, CognitiveProfileBuilder, CognitiveTelemetry, DiagnosticSession,
    SkillProgress,
};
pub use zpd::{classify_zone, zpd_alignment};
