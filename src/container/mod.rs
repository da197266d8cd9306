//! Lock-based concurrent containers.
//!
//! The pool is assembled from these, and they stand on their own: an MPMC
//! FIFO [`Queue`], an MPMC LIFO [`Stack`], a hand-over-hand linked [`List`],
//! and a fixed-bucket hash [`Map`] layered over the list.

mod queue;
pub use self::queue::Queue;

mod stack;
pub use self::stack::Stack;

mod list;
pub use self::list::List;

mod map;
pub use self::map::{DEFAULT_BUCKETS, Map};
