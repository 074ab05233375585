// crates/indexer/src/lib.rs
//! The indexing pipeline: per-repository transaction, worker pool, feeder,
//! feed controller, and session orchestration. The `dex` binary is a thin
//! shell over [`orchestrator::run_session`].

pub mod config;
pub mod controller;
pub mod feeder;
pub mod indexer;
pub mod orchestrator;
pub mod worker;

pub use config::Config;
pub use orchestrator::{run_session, BootFailure, SessionSummary};
