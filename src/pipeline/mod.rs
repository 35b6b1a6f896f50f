pub mod runner;

pub use runner::{CycleReport, Pipeline, PipelineError};
