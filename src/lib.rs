pub mod candidate;
pub mod cli;
pub mod config;
pub mod engine;
pub mod mjd;
pub mod output;
pub mod pipeline;
pub mod status;
pub mod store;
pub mod sync;
