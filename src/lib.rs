pub mod container;

pub mod pool;
pub use pool::{Builder, ThreadPool};

pub mod task;
pub use task::{JoinError, JoinHandle};
