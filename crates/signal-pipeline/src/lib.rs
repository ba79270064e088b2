pub mod lifecycle;
pub mod pipeline;

pub use lifecycle::{CycleOutcome, LifecycleState, SignalLifecycleManager};
pub use pipeline::{CycleReport, SignalPipeline};
