use std::error::Error;
use std::fmt;

/// Why a task failed to produce its value.
///
/// Returned by [`JoinHandle::take`] when the submitted callable panicked, or
/// when the pool shut down before the task ever ran.
///
/// [`JoinHandle::take`]: crate::task::JoinHandle::take
pub struct JoinError {
    repr: Repr,
}

enum Repr {
    /// The callable panicked while running; the payload message is kept.
    Panic(String),

    /// The task was dropped unrun, which only happens on pool shutdown.
    Shutdown,
}

impl JoinError {
    pub(crate) fn panic(msg: String) -> JoinError {
        JoinError {
            repr: Repr::Panic(msg),
        }
    }

    pub(crate) fn shutdown() -> JoinError {
        JoinError {
            repr: Repr::Shutdown,
        }
    }

    /// Returns true if the error was caused by the task panicking.
    pub fn is_panic(&self) -> bool {
        matches!(self.repr, Repr::Panic(_))
    }

    /// Returns true if the task never ran because the pool shut down first.
    pub fn is_shutdown(&self) -> bool {
        matches!(self.repr, Repr::Shutdown)
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Panic(msg) => write!(f, "task panicked: {msg}"),
            Repr::Shutdown => write!(f, "pool shut down before the task ran"),
        }
    }
}

impl fmt::Debug for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Panic(msg) => f.debug_tuple("JoinError::Panic").field(msg).finish(),
            Repr::Shutdown => f.write_str("JoinError::Shutdown"),
        }
    }
}

impl Error for JoinError {}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(JoinError: Send, Sync, Error);

    #[test]
    fn test_discriminators() {
        let err = JoinError::panic("boom".into());
        assert!(err.is_panic());
        assert!(!err.is_shutdown());
        assert_eq!(err.to_string(), "task panicked: boom");

        let err = JoinError::shutdown();
        assert!(err.is_shutdown());
        assert!(!err.is_panic());
    }
}
