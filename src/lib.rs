pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod fsstore;
pub mod group;
pub mod hookrunner;
pub mod log;
pub mod phase_engine;
pub mod runtime_state;
pub mod template;
pub mod workflow_engine;
