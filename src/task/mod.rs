// Public API
mod error;
pub use self::error::JoinError;

mod handle;
pub use self::handle::JoinHandle;

#[allow(clippy::module_inception)]
mod task;
pub(crate) use self::task::Task;

/// Task result sent back to the submitter.
pub type Result<T> = std::result::Result<T, JoinError>;
