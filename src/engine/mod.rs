// Transcode orchestration engine - independent of any presentation layer

pub mod core;
pub mod error;
pub mod probe;
pub mod runner;
pub mod worker;

pub use self::core::*;
pub use error::EncodeError;
pub use runner::{ExitState, ProcessRunner, StopHandle};
pub use worker::{
    BatchHandle, EncodeOptions, JobHandle, WorkerMessage, eta_secs, overall_percent, spawn_batch,
    spawn_job,
};
