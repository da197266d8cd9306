use lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A node's lock guards exactly its value and its outgoing link.
type Node<T> = RwLock<Entry<T>>;
type Link<T> = Option<Arc<Node<T>>>;

struct Entry<T> {
    /// Values are held through `Arc` so a search can hand one out that stays
    /// alive while the list mutates underneath it.
    value: Arc<T>,
    next: Link<T>,
}

/// Singly-linked list with hand-over-hand locking.
///
/// Every traversal locks the next node before releasing the one it stands
/// on, so at most two adjacent locks are held at a time and any two threads
/// moving forward converge without a cycle. Readers overlap on distinct
/// sections, writers proceed on disjoint sections, and readers run alongside
/// writers elsewhere in the list.
///
/// Invariants:
/// - following `next` from the head terminates;
/// - every node owns its value through a shared-ownership pointer, and its
///   `next` link is owned exclusively by its predecessor;
/// - `len` agrees with the number of nodes.
///
/// Two `push_front` calls racing resolve in either order; nothing here
/// promises FIFO.
pub struct List<T> {
    /// Dummy head: the lock over the first link, standing in for a head
    /// node's mutex.
    head: Arc<RwLock<Link<T>>>,
    len: AtomicUsize,
}

/// Traversal position for shared scans: the guard of the link we stand on.
enum ReadCursor<T> {
    Head(ArcRwLockReadGuard<RawRwLock, Link<T>>),
    Node(ArcRwLockReadGuard<RawRwLock, Entry<T>>),
}

impl<T> ReadCursor<T> {
    fn link(&self) -> &Link<T> {
        match self {
            ReadCursor::Head(guard) => guard,
            ReadCursor::Node(guard) => &guard.next,
        }
    }
}

/// Traversal position for exclusive scans.
enum WriteCursor<T> {
    Head(ArcRwLockWriteGuard<RawRwLock, Link<T>>),
    Node(ArcRwLockWriteGuard<RawRwLock, Entry<T>>),
}

impl<T> WriteCursor<T> {
    fn link(&self) -> &Link<T> {
        match self {
            WriteCursor::Head(guard) => guard,
            WriteCursor::Node(guard) => &guard.next,
        }
    }

    fn link_mut(&mut self) -> &mut Link<T> {
        match self {
            WriteCursor::Head(guard) => guard,
            WriteCursor::Node(guard) => &mut guard.next,
        }
    }
}

/// What an exclusive scan does with the node it just locked.
enum Step<R> {
    Advance,
    Unlink,
    Break(R),
}

impl<T> List<T> {
    pub fn new() -> List<T> {
        List {
            head: Arc::new(RwLock::new(None)),
            len: AtomicUsize::new(0),
        }
    }

    /// Adds a value at the front of the list.
    pub fn push_front(&self, value: T) {
        let value = Arc::new(value);

        let mut head = self.head.write();
        let node = Arc::new(RwLock::new(Entry {
            value,
            next: head.take(),
        }));
        *head = Some(node);
        self.len.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns true if any value passes the predicate.
    pub fn match_any(&self, predicate: impl Fn(&T) -> bool) -> bool {
        self.scan(|value| {
            if predicate(value) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .is_some()
    }

    /// Returns true if no value passes the predicate.
    pub fn match_none(&self, predicate: impl Fn(&T) -> bool) -> bool {
        !self.match_any(predicate)
    }

    /// Returns the first value passing the predicate.
    ///
    /// The returned `Arc` keeps the value alive independently of its node:
    /// it stays usable after the node is removed or replaced.
    pub fn find_first_if(&self, predicate: impl Fn(&T) -> bool) -> Option<Arc<T>> {
        self.scan(|value| {
            if predicate(value) {
                ControlFlow::Break(Arc::clone(value))
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    /// Removes values passing the predicate, at most `limit` of them.
    /// Returns how many were removed.
    pub fn remove_if(&self, predicate: impl Fn(&T) -> bool, limit: usize) -> usize {
        let mut removed = 0;

        let _: Option<()> = self.scan_mut(|entry| {
            if removed == limit {
                return Step::Break(());
            }
            if predicate(&entry.value) {
                removed += 1;
                Step::Unlink
            } else {
                Step::Advance
            }
        });

        removed
    }

    /// Overwrites values passing the predicate with fresh ones from the
    /// supplier, at most `limit` of them. Returns how many were replaced.
    pub fn replace_if(
        &self,
        predicate: impl Fn(&T) -> bool,
        mut supplier: impl FnMut() -> T,
        limit: usize,
    ) -> usize {
        let mut replaced = 0;

        let _: Option<()> = self.scan_mut(|entry| {
            if replaced == limit {
                return Step::Break(());
            }
            if predicate(&entry.value) {
                entry.value = Arc::new(supplier());
                replaced += 1;
            }
            Step::Advance
        });

        replaced
    }

    /// Applies the consumer to every value, front to back, under reader
    /// locks.
    pub fn read_each(&self, mut consumer: impl FnMut(&T)) {
        let _: Option<()> = self.scan(|value| {
            consumer(value);
            ControlFlow::Continue(())
        });
    }

    /// Applies the consumer to every value, front to back, under writer
    /// locks.
    ///
    /// Mutation goes through [`Arc::make_mut`]: a value whose `Arc` escaped
    /// earlier through [`find_first_if`] is copied rather than aliased, and
    /// the escapee keeps observing the pre-mutation value.
    ///
    /// [`find_first_if`]: List::find_first_if
    pub fn write_each(&self, mut consumer: impl FnMut(&mut T))
    where
        T: Clone,
    {
        let _: Option<()> = self.scan_mut(|entry| {
            consumer(Arc::make_mut(&mut entry.value));
            Step::Advance
        });
    }

    /// Maps the first value passing the predicate under its reader lock.
    /// `None` when nothing matches.
    pub fn read_map_first_if<R>(
        &self,
        predicate: impl Fn(&T) -> bool,
        mapper: impl FnOnce(&T) -> R,
    ) -> Option<R> {
        let mut mapper = Some(mapper);
        self.scan(|value| {
            if predicate(value) {
                let mapper = mapper.take().expect("scan stops at the first match");
                ControlFlow::Break(mapper(value))
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    /// Maps the first value passing the predicate under its writer lock,
    /// with mutable access. `None` when nothing matches.
    pub fn write_map_first_if<R>(
        &self,
        predicate: impl Fn(&T) -> bool,
        mapper: impl FnOnce(&mut T) -> R,
    ) -> Option<R>
    where
        T: Clone,
    {
        let mut mapper = Some(mapper);
        self.scan_mut(|entry| {
            if predicate(&entry.value) {
                let mapper = mapper.take().expect("scan stops at the first match");
                Step::Break(mapper(Arc::make_mut(&mut entry.value)))
            } else {
                Step::Advance
            }
        })
    }

    /// Unlinks every node.
    pub fn clear(&self) {
        let _: Option<()> = self.scan_mut(|_| Step::Unlink);
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shared hand-over-hand traversal. Stops at the visitor's first `Break`.
    fn scan<R>(&self, mut visit: impl FnMut(&Arc<T>) -> ControlFlow<R>) -> Option<R> {
        let mut cursor = ReadCursor::Head(self.head.read_arc());

        loop {
            let Some(node) = cursor.link().clone() else {
                return None;
            };
            let guard = node.read_arc();

            if let ControlFlow::Break(result) = visit(&guard.value) {
                return Some(result);
            }

            // Moving the fresh guard into the cursor drops the trailing one:
            // the next lock is acquired before the current is released.
            cursor = ReadCursor::Node(guard);
        }
    }

    /// Exclusive hand-over-hand traversal.
    ///
    /// On `Unlink` the cursor stays on the predecessor, which re-routes its
    /// link around the locked node; the node's lock is released before the
    /// last reference to the node can drop. Nobody else can be waiting on
    /// that lock: reaching a node requires holding its predecessor's lock,
    /// and the cursor holds it exclusively.
    fn scan_mut<R>(&self, mut visit: impl FnMut(&mut Entry<T>) -> Step<R>) -> Option<R> {
        let mut cursor = WriteCursor::Head(self.head.write_arc());

        loop {
            let Some(node) = cursor.link().clone() else {
                return None;
            };
            let mut guard = node.write_arc();

            match visit(&mut guard) {
                Step::Advance => cursor = WriteCursor::Node(guard),
                Step::Unlink => {
                    *cursor.link_mut() = guard.next.take();
                    self.len.fetch_sub(1, Ordering::Relaxed);
                    drop(guard);
                    drop(node);
                }
                Step::Break(result) => return Some(result),
            }
        }
    }
}

impl<T> Default for List<T> {
    fn default() -> List<T> {
        List::new()
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        // Unlink node by node; dropping the chain wholesale would recurse
        // through every `next`.
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;
    use std::thread;

    assert_impl_all!(List<usize>: Send, Sync);

    fn collect(list: &List<i32>) -> Vec<i32> {
        let mut values = Vec::new();
        list.read_each(|v| values.push(*v));
        values
    }

    #[test]
    fn test_push_front_orders_front_to_back() {
        let list = List::new();
        for i in 0..5 {
            list.push_front(i);
        }

        assert_eq!(collect(&list), vec![4, 3, 2, 1, 0]);
        assert_eq!(list.len(), 5);
    }

    #[test]
    fn test_match_any_and_none() {
        let list = List::new();
        list.push_front(1);
        list.push_front(2);

        assert!(list.match_any(|v| *v == 2));
        assert!(list.match_none(|v| *v == 3));
        assert!(!list.match_any(|v| *v == 3));
    }

    #[test]
    fn test_find_first_if_survives_removal() {
        let list = List::new();
        list.push_front(10);
        list.push_front(20);

        let found = list.find_first_if(|v| *v == 10).unwrap();
        assert_eq!(list.remove_if(|v| *v == 10, usize::MAX), 1);

        // The escaped value outlives its node.
        assert_eq!(*found, 10);
        assert!(list.match_none(|v| *v == 10));
    }

    #[test]
    fn test_remove_if_respects_limit() {
        let list = List::new();
        for _ in 0..5 {
            list.push_front(7);
        }

        assert_eq!(list.remove_if(|v| *v == 7, 2), 2);
        assert_eq!(list.len(), 3);
        assert_eq!(list.remove_if(|v| *v == 7, usize::MAX), 3);
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_if_keeps_non_matching() {
        let list = List::new();
        for i in 0..6 {
            list.push_front(i);
        }

        assert_eq!(list.remove_if(|v| *v % 2 == 0, usize::MAX), 3);
        assert_eq!(collect(&list), vec![5, 3, 1]);
    }

    #[test]
    fn test_replace_if() {
        let list = List::new();
        list.push_front(1);
        list.push_front(2);
        list.push_front(1);

        assert_eq!(list.replace_if(|v| *v == 1, || 9, usize::MAX), 2);
        assert_eq!(collect(&list), vec![9, 2, 9]);
    }

    #[test]
    fn test_write_each_copies_escaped_values() {
        let list = List::new();
        list.push_front(1);

        let escaped = list.find_first_if(|_| true).unwrap();
        list.write_each(|v| *v += 100);

        assert_eq!(collect(&list), vec![101]);
        // The escapee sees the pre-mutation value.
        assert_eq!(*escaped, 1);
    }

    #[test]
    fn test_map_first_if() {
        let list = List::new();
        list.push_front(3);
        list.push_front(4);

        assert_eq!(list.read_map_first_if(|v| *v == 3, |v| v * 10), Some(30));
        assert_eq!(list.read_map_first_if(|v| *v == 8, |v| v * 10), None);

        assert_eq!(
            list.write_map_first_if(
                |v| *v == 4,
                |v| {
                    *v = 40;
                    *v
                }
            ),
            Some(40)
        );
        assert_eq!(collect(&list), vec![40, 3]);
    }

    #[test]
    fn test_clear() {
        let list = List::new();
        for i in 0..100 {
            list.push_front(i);
        }

        list.clear();
        assert!(list.is_empty());
        assert_eq!(collect(&list), Vec::<i32>::new());
    }

    #[test]
    fn test_concurrent_pushes_and_removes() {
        let list = Arc::new(List::new());
        let per_thread = 500;

        let pushers: Vec<_> = (0..4)
            .map(|t| {
                let list = Arc::clone(&list);
                thread::spawn(move || {
                    for i in 0..per_thread {
                        list.push_front(t * per_thread + i);
                    }
                })
            })
            .collect();

        for p in pushers {
            p.join().unwrap();
        }
        assert_eq!(list.len(), 4 * per_thread);

        // Concurrent removers split the whole population between them.
        let removers: Vec<_> = (0..4)
            .map(|_| {
                let list = Arc::clone(&list);
                thread::spawn(move || list.remove_if(|_| true, usize::MAX))
            })
            .collect();

        let removed: usize = removers.into_iter().map(|r| r.join().unwrap()).sum();
        assert_eq!(removed, 4 * per_thread);
        assert!(list.is_empty());
    }

    #[test]
    fn test_readers_run_alongside_writers() {
        let list = Arc::new(List::new());
        for i in 0..100 {
            list.push_front(i);
        }

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let list = Arc::clone(&list);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let mut count = 0;
                        list.read_each(|_| count += 1);
                        assert!(count >= 100);
                    }
                })
            })
            .collect();

        let writer = {
            let list = Arc::clone(&list);
            thread::spawn(move || {
                for i in 100..200 {
                    list.push_front(i);
                }
            })
        };

        for r in readers {
            r.join().unwrap();
        }
        writer.join().unwrap();
        assert_eq!(list.len(), 200);
    }

    #[test]
    fn test_drop_releases_long_chain() {
        let list = List::new();
        for i in 0..100_000 {
            list.push_front(i);
        }
        drop(list);
    }
}
