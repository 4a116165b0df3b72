//! Conversion core: tabular normalizer, chunk emitter, execution contexts,
//! and the task orchestrator that coordinates them.

pub mod context;
pub mod emitter;
pub mod normalize;
pub mod orchestrator;
pub mod transform;

// Re-export public API for convenience
pub use orchestrator::{Orchestrator, SubmitOptions};
pub use transform::{Transform, TransformOutput};
