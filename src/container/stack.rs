use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Unbounded multi-producer/multi-consumer LIFO stack.
///
/// One mutex over the top-of-stack pointer. The pool uses one of these per
/// worker as its local queue: the owner pushes and pops the same end, and
/// LIFO keeps the freshly submitted task, whose data is still warm in the
/// owner's cache, first in line. Thieves pop the same end too.
///
/// Invariants:
/// - `top == None` iff the stack is empty;
/// - following `next` from the top terminates;
/// - `len` agrees with the chain length.
pub struct Stack<T> {
    top: Mutex<Option<Box<Node<T>>>>,

    /// Notified on every push, after the top lock is released.
    pushed: Condvar,

    len: AtomicUsize,
}

struct Node<T> {
    value: T,
    next: Option<Box<Node<T>>>,
}

impl<T> Stack<T> {
    pub fn new() -> Stack<T> {
        Stack {
            top: Mutex::new(None),
            pushed: Condvar::new(),
            len: AtomicUsize::new(0),
        }
    }

    /// Pushes a value onto the top of the stack.
    pub fn push(&self, value: T) {
        // Allocate before taking the lock.
        let mut node = Box::new(Node { value, next: None });

        {
            let mut top = self.top.lock();
            node.next = top.take();
            *top = Some(node);
            self.len.fetch_add(1, Ordering::Relaxed);
        }

        self.pushed.notify_one();
    }

    /// Removes and returns the top value, or `None` when empty.
    pub fn try_pop(&self) -> Option<T> {
        let mut top = self.top.lock();
        Self::pop_locked(&mut top, &self.len)
    }

    /// Removes and returns the top value, blocking until one is available.
    pub fn pop(&self) -> T {
        let mut top = self.top.lock();
        self.pushed.wait_while(&mut top, |top| top.is_none());
        Self::pop_locked(&mut top, &self.len).expect("woken with a non-empty stack")
    }

    /// Drops every value on the stack.
    pub fn clear(&self) {
        let mut top = self.top.lock();
        // Unlink one node at a time; letting the chain drop in one go would
        // recurse per node.
        while let Some(mut node) = top.take() {
            *top = node.next.take();
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pop_locked(top: &mut MutexGuard<'_, Option<Box<Node<T>>>>, len: &AtomicUsize) -> Option<T> {
        top.take().map(|mut node| {
            **top = node.next.take();
            len.fetch_sub(1, Ordering::Relaxed);
            node.value
        })
    }
}

impl<T> Default for Stack<T> {
    fn default() -> Stack<T> {
        Stack::new()
    }
}

impl<T> Drop for Stack<T> {
    fn drop(&mut self) {
        let top = self.top.get_mut();
        while let Some(mut node) = top.take() {
            *top = node.next.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    assert_impl_all!(Stack<usize>: Send, Sync);

    #[test]
    fn test_lifo_order() {
        // Pushed then popped with no concurrent modification: the popped
        // sequence is the reverse of the pushed sequence.
        let stack = Stack::new();
        for i in 0..100 {
            stack.push(i);
        }

        assert_eq!(stack.len(), 100);
        for i in (0..100).rev() {
            assert_eq!(stack.try_pop(), Some(i));
        }
        assert_eq!(stack.try_pop(), None);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_blocking_pop_wakes_on_push() {
        let stack: Arc<Stack<u32>> = Arc::new(Stack::new());

        let waiter = {
            let stack = Arc::clone(&stack);
            thread::spawn(move || stack.pop())
        };

        thread::sleep(Duration::from_millis(20));
        stack.push(99);
        assert_eq!(waiter.join().unwrap(), 99);
    }

    #[test]
    fn test_clear() {
        let stack = Stack::new();
        for i in 0..10 {
            stack.push(i);
        }
        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(stack.try_pop(), None);
    }

    #[test]
    fn test_concurrent_push_pop_conserves_values() {
        let stack = Arc::new(Stack::new());
        let per_thread = 1_000;

        let pushers: Vec<_> = (0..4)
            .map(|t| {
                let stack = Arc::clone(&stack);
                thread::spawn(move || {
                    for i in 0..per_thread {
                        stack.push(t * per_thread + i);
                    }
                })
            })
            .collect();

        let poppers: Vec<_> = (0..4)
            .map(|_| {
                let stack = Arc::clone(&stack);
                thread::spawn(move || (0..per_thread).map(|_| stack.pop()).collect::<Vec<_>>())
            })
            .collect();

        for p in pushers {
            p.join().unwrap();
        }

        let mut seen: Vec<usize> = poppers.into_iter().flat_map(|p| p.join().unwrap()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..4 * per_thread).collect::<Vec<_>>());
    }

    #[test]
    fn test_drop_releases_long_chain() {
        let stack = Stack::new();
        for i in 0..100_000 {
            stack.push(i);
        }
        // Drop must not recurse per node.
        drop(stack);
    }
}
