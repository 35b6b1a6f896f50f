pub mod gulp;
pub mod reader;
pub mod synchronizer;

pub use gulp::{validate, Gulp, PayloadError, SourcePayload, Validation};
pub use reader::{CloseDelimitedReader, PayloadReader};
pub use synchronizer::{CycleOutcome, GulpSynchronizer, SyncError, SyncState};
