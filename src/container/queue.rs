use parking_lot::{Condvar, Mutex, MutexGuard};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Unbounded multi-producer/multi-consumer FIFO queue.
///
/// Singly-linked with a dummy sentinel at the tail, and one mutex for each
/// end, so pushers and poppers only contend when the queue is one element
/// away from empty.
///
/// Invariants, holding between any two operations:
/// - traversing `next` from `head` eventually reaches `tail`;
/// - `head == tail` iff the queue is empty;
/// - every non-tail node carries a value and a non-null `next`;
/// - the tail sentinel carries no value and a null `next`;
/// - `len` agrees with the number of non-tail nodes.
pub struct Queue<T> {
    /// Oldest node; where poppers unlink.
    head: Mutex<*mut Node<T>>,

    /// The sentinel; where pushers append.
    tail: Mutex<*mut Node<T>>,

    /// Notified on every push, after the tail lock is released.
    pushed: Condvar,

    len: AtomicUsize,
}

struct Node<T> {
    /// `None` only on the sentinel.
    value: Option<T>,

    /// Null only on the sentinel.
    next: *mut Node<T>,
}

impl<T> Node<T> {
    fn sentinel() -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            value: None,
            next: ptr::null_mut(),
        }))
    }
}

// Safety: the raw node pointers are only ever dereferenced under the head or
// tail mutex, and a popped node leaves the structure before its value is
// handed out.
unsafe impl<T: Send> Send for Queue<T> {}
unsafe impl<T: Send> Sync for Queue<T> {}

impl<T> Queue<T> {
    pub fn new() -> Queue<T> {
        let sentinel = Node::sentinel();

        Queue {
            head: Mutex::new(sentinel),
            tail: Mutex::new(sentinel),
            pushed: Condvar::new(),
            len: AtomicUsize::new(0),
        }
    }

    /// Appends a value at the tail.
    ///
    /// The old sentinel becomes the value's node and a fresh sentinel takes
    /// its place, so poppers holding the head lock are not disturbed.
    pub fn push(&self, value: T) {
        // Allocate outside the lock.
        let sentinel = Node::sentinel();

        {
            let mut tail = self.tail.lock();

            // Safety: `*tail` is the live sentinel; we own its mutex.
            unsafe {
                (**tail).value = Some(value);
                (**tail).next = sentinel;
            }
            *tail = sentinel;
            self.len.fetch_add(1, Ordering::Relaxed);
        }

        // Notify with the lock released so the woken popper can take the
        // head mutex immediately.
        self.pushed.notify_one();
    }

    /// Removes and returns the value at the head, or `None` when empty.
    pub fn try_pop(&self) -> Option<T> {
        let mut head = self.head.lock();
        if *head == self.current_tail() {
            return None;
        }
        Some(self.pop_locked(&mut head))
    }

    /// Removes and returns the value at the head, blocking until a value is
    /// available.
    pub fn pop(&self) -> T {
        let mut head = self.head.lock();
        self.pushed
            .wait_while(&mut head, |head| *head == self.current_tail());
        self.pop_locked(&mut head)
    }

    /// Drops every queued value.
    pub fn clear(&self) {
        // Both locks, so neither end moves under us. Always head before tail,
        // the same order `try_pop` uses.
        let mut head = self.head.lock();
        let tail = self.tail.lock();
        while *head != *tail {
            drop(self.unlink_head(&mut head));
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads the sentinel pointer. Taking the tail lock here, while the
    /// caller holds the head lock, is safe: pushers take tail only, so
    /// head -> tail is the one compound order in play.
    fn current_tail(&self) -> *mut Node<T> {
        *self.tail.lock()
    }

    /// Unlinks the head node. Caller has checked the queue is non-empty.
    fn pop_locked(&self, head: &mut MutexGuard<'_, *mut Node<T>>) -> T {
        self.unlink_head(head)
            .expect("non-sentinel node carries a value")
    }

    fn unlink_head(&self, head: &mut MutexGuard<'_, *mut Node<T>>) -> Option<T> {
        let old_head = **head;

        // Safety: `old_head` is a live non-sentinel node (caller checked
        // head != tail under both locks), so `next` is non-null. Re-boxing
        // transfers ownership and frees the node at end of scope.
        let mut node = unsafe { Box::from_raw(old_head) };
        **head = node.next;
        self.len.fetch_sub(1, Ordering::Relaxed);
        node.value.take()
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Queue<T> {
        Queue::new()
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        // Walk and free the whole chain, sentinel included. Iterative, so a
        // long backlog cannot overflow the stack.
        let mut cur = *self.head.get_mut();
        while !cur.is_null() {
            // Safety: we have exclusive access; every node in the chain was
            // allocated by `Node::sentinel` and is freed exactly once.
            let node = unsafe { Box::from_raw(cur) };
            cur = node.next;
        }
    }
}
