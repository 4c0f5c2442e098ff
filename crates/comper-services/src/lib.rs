//! comper-services: Background workers around the comping core

pub mod optimizer_worker;

pub use optimizer_worker::{OptimizationOutcome, OptimizerWorker, WorkerError};
