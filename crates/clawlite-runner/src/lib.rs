//! ClawLite worker runner.
//!
//! Prepares per-group workspaces, spawns one worker process per turn, streams
//! its framed output back to the caller in order, and enforces timeouts.

pub mod capture;
pub mod codec;
pub mod error;
pub mod output_chain;
pub mod run_log;
pub mod snapshot;
pub mod supervisor;
pub mod workspace;

pub use codec::OutputCodec;
pub use error::RunnerError;
pub use output_chain::{OutputChain, OutputSink};
pub use supervisor::{Supervisor, WorkerHandle};
pub use workspace::{prepare_workspace, GroupWorkspace};
