pub mod catalog;
pub mod decision;
pub mod naming;
pub mod state;
pub mod thresholds;
pub mod trigger;

pub use catalog::{CatalogError, SourceCatalog};
pub use decision::{BatchResult, DecisionEngine, EngineSettings, TriggerMark};
pub use naming::{DatedNameGenerator, NameGenerator};
pub use state::{BeamActivityWindow, TriggerState};
pub use thresholds::Thresholds;
pub use trigger::{StoreTrigger, Suppression, TriggerDecision, TriggerRequest, TriggerStep};
