pub mod pool;

pub use pool::{TaskOutcome, WorkerPool};
