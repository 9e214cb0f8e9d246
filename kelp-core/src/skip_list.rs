use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::ptr;
use std::sync::atomic::{AtomicIsize, AtomicPtr, Ordering};

use crate::guard::{DeferredGuard, Guard};
use crate::internal::TagPtr;
use crate::order::{Natural, Order};

const MAX_LEVEL: usize = 20;

type NodePtr<T> = *mut SkipNode<T>;

// =============================================================================
// SKIP LIST STRUCTURE & PROTOCOL
// =============================================================================
//
// Sorted ascending, multiple levels, bracketed by value-less sentinels:
//
// Level 2:  HEAD ──────────────────────► 30 ─────────────────► TAIL
// Level 1:  HEAD ──────────► 10 ──────► 30 ─────────────────► TAIL
// Level 0:  HEAD ──────────► 10 ──────► 30 ──────────► 40 ──► TAIL
//
// The mark bit on node.next[level] means the NODE is logically deleted at
// that level. Every operation goes through `search`, which descends from
// the top level and unlinks any marked node it touches; when the unlink CAS
// on a predecessor slot fails the whole descent restarts from HEAD, because
// the predecessor itself may have been removed out from under us.
//
// add:    link at level 0 (the insertion linearization point), then splice
//         the upper tower levels bottom-up, refreshing the search whenever
//         a predecessor moved.
// remove: mark the tower top-down, then the level-0 mark — the removal
//         linearization point; exactly one contending remover wins it. The
//         winner runs one more search to finish the physical unlink, then
//         retires the node to the guard.
//
// Removal only begins on a node whose tower is completely linked. Marks on
// a half-built tower would let the still-running insert splice a link to a
// node the remover has already retired, and a retired node must never
// become reachable again once its destruction is scheduled.
//
// =============================================================================

// ============================================================================
// SkipNode - Multi-level node with tagged forward pointers
// ============================================================================

/// A skip-list node: an immutable value, an immutable height, and a tower
/// of `height` tagged atomic forward pointers.
///
/// Single allocation per node: the tower is a flexible array member laid
/// out inline after the struct fields. Sentinels carry no value.
#[repr(C)]
pub(crate) struct SkipNode<T> {
    value: Option<T>,
    height: usize,
    // Flexible array: [next[0], next[1], ..., next[height-1]]
    tower: [AtomicPtr<SkipNode<T>>; 0],
}

impl<T> SkipNode<T> {
    fn layout(height: usize) -> Layout {
        Layout::new::<Self>()
            .extend(Layout::array::<AtomicPtr<Self>>(height).unwrap())
            .unwrap()
            .0
            .pad_to_align()
    }

    /// Allocate a node with all tower slots null. `value` is `None` only
    /// for the head/tail sentinels.
    fn alloc(value: Option<T>, height: usize) -> *mut Self {
        unsafe {
            let layout = Self::layout(height);
            let ptr = alloc(layout) as *mut Self;
            if ptr.is_null() {
                handle_alloc_error(layout);
            }

            ptr::write(&mut (*ptr).value, value);
            ptr::write(&mut (*ptr).height, height);

            let slots = (*ptr).tower.as_ptr() as *mut AtomicPtr<Self>;
            for level in 0..height {
                ptr::write(slots.add(level), AtomicPtr::new(ptr::null_mut()));
            }

            ptr
        }
    }

    /// Deallocate a node.
    ///
    /// # Safety
    /// `ptr` must come from [`SkipNode::alloc`] and must not be accessed
    /// afterwards.
    pub(crate) unsafe fn dealloc(ptr: *mut Self) {
        unsafe {
            let layout = Self::layout((*ptr).height);
            ptr::drop_in_place(&mut (*ptr).value);
            dealloc(ptr as *mut u8, layout);
        }
    }

    #[inline]
    fn slot(&self, level: usize) -> &AtomicPtr<SkipNode<T>> {
        debug_assert!(level < self.height);
        unsafe { &*self.tower.as_ptr().add(level) }
    }

    /// Load the tagged forward pointer at `level` (Acquire).
    #[inline]
    fn next(&self, level: usize) -> TagPtr<SkipNode<T>> {
        TagPtr::from_raw(self.slot(level).load(Ordering::Acquire))
    }

    /// Store the tagged forward pointer at `level` (Release). Only valid
    /// while the slot is unpublished (node not yet linked at `level`).
    #[inline]
    fn store_next(&self, level: usize, next: TagPtr<SkipNode<T>>) {
        self.slot(level).store(next.raw(), Ordering::Release);
    }

    /// CAS the full tagged word at `level` (Release/Relaxed).
    #[inline]
    fn cas_next(
        &self,
        level: usize,
        expected: TagPtr<SkipNode<T>>,
        new: TagPtr<SkipNode<T>>,
    ) -> Result<*mut SkipNode<T>, *mut SkipNode<T>> {
        self.slot(level)
            .compare_exchange(expected.raw(), new.raw(), Ordering::Release, Ordering::Relaxed)
    }

    /// Weak CAS variant for mark loops, which re-read on failure anyway.
    #[inline]
    fn cas_next_weak(
        &self,
        level: usize,
        expected: TagPtr<SkipNode<T>>,
        new: TagPtr<SkipNode<T>>,
    ) -> Result<*mut SkipNode<T>, *mut SkipNode<T>> {
        self.slot(level).compare_exchange_weak(
            expected.raw(),
            new.raw(),
            Ordering::Release,
            Ordering::Relaxed,
        )
    }

    #[inline]
    fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn value(&self) -> &T {
        self.value.as_ref().expect("sentinel has no value")
    }

    /// Take the value back out of a node that was never published.
    ///
    /// # Safety
    /// The node must never have been linked into the list, and this must
    /// be called at most once.
    unsafe fn take_value_unlinked(&mut self) -> T {
        self.value.take().expect("sentinel has no value")
    }
}

/// Tower height: geometric with p = 1/2, clamped to `MAX_LEVEL`.
///
/// Drawing coin flips until the first tails is the same as counting the
/// trailing zeros of a single random word, so one RNG call suffices.
#[inline]
fn random_height() -> usize {
    let bits = fastrand::u32(..);
    (1 + bits.trailing_zeros() as usize).min(MAX_LEVEL)
}

// ============================================================================
// Search - per-level predecessors and successors of a probe value
// ============================================================================

struct Search<T> {
    /// For each level, the last node ordered strictly before the probe
    /// (or head). Always unmarked at the moment it was observed.
    prevs: [NodePtr<T>; MAX_LEVEL],
    /// For each level, the node the predecessor's forward pointer reached.
    nexts: [NodePtr<T>; MAX_LEVEL],
    /// Whether `nexts[0]` is a non-sentinel node equivalent to the probe.
    found: bool,
}

// ============================================================================
// SkipListSet - Lock-free concurrent ordered set
// ============================================================================

/// A concurrent ordered set backed by a lock-free skip list.
///
/// Ordering is supplied by `O` ([`Natural`] by default, or any
/// `Fn(&T, &T) -> bool` strict weak ordering); duplicates under the
/// derived equivalence are rejected. All operations are lock-free: no
/// mutual exclusion anywhere, only atomic loads and compare-and-swaps on
/// tagged pointers.
///
/// `G` selects the memory reclamation strategy for removed nodes; see the
/// [`guard`](crate::guard) module.
pub struct SkipListSet<T, O = Natural, G = DeferredGuard>
where
    O: Order<T>,
    G: Guard,
{
    head: NodePtr<T>,
    tail: NodePtr<T>,
    order: O,
    len: AtomicIsize,
    guard: G,
}

impl<T, O, G> SkipListSet<T, O, G>
where
    O: Order<T>,
    G: Guard,
{
    /// Create an empty set with the default ordering.
    pub fn new() -> Self
    where
        O: Default,
    {
        Self::with_order(O::default())
    }

    /// Create an empty set ordered by `order`.
    pub fn with_order(order: O) -> Self {
        let head = SkipNode::alloc(None, MAX_LEVEL);
        let tail = SkipNode::alloc(None, MAX_LEVEL);
        unsafe {
            for level in 0..MAX_LEVEL {
                (*head).store_next(level, TagPtr::compose(tail, false));
            }
        }
        SkipListSet {
            head,
            tail,
            order,
            len: AtomicIsize::new(0),
            guard: G::default(),
        }
    }

    /// Insert `value`.
    ///
    /// Returns `true` if the value was inserted, `false` if an equivalent
    /// value was already present.
    pub fn add(&self, mut value: T) -> bool {
        let _pin = G::pin();
        loop {
            let mut search = self.search(&value);
            if search.found {
                return false;
            }

            let height = random_height();
            let node = SkipNode::alloc(Some(value), height);

            unsafe {
                for (level, &succ) in search.nexts.iter().enumerate().take(height) {
                    (*node).store_next(level, TagPtr::compose(succ, false));
                }

                // Level 0 is the linearization point: once this CAS lands,
                // the value is in the set.
                let expected = TagPtr::compose(search.nexts[0], false);
                let linked = TagPtr::compose(node, false);
                if (*search.prevs[0]).cas_next(0, expected, linked).is_err() {
                    // Never published; take the value back and start over.
                    value = (*node).take_value_unlinked();
                    SkipNode::dealloc(node);
                    continue;
                }

                let value_ref = (*node).value();
                for level in 1..height {
                    loop {
                        let prev = search.prevs[level];
                        let succ = search.nexts[level];
                        if succ == node {
                            // A refreshed search already observed this level
                            // linked; nothing left to do here.
                            break;
                        }
                        // Re-point the tower slot at the successor we are
                        // splicing in front of. The slot stays unpublished
                        // until the CAS below succeeds, and removal waits for
                        // the full tower, so a plain store suffices.
                        (*node).store_next(level, TagPtr::compose(succ, false));
                        let expected = TagPtr::compose(succ, false);
                        if (*prev)
                            .cas_next(level, expected, TagPtr::compose(node, false))
                            .is_ok()
                        {
                            break;
                        }
                        // The predecessor moved; refresh and retry this level.
                        search = self.search(value_ref);
                    }
                }
            }

            self.len.fetch_add(1, Ordering::Relaxed);
            return true;
        }
    }

    /// Remove the value equivalent to `value`.
    ///
    /// Returns `true` if this call removed it, `false` if it was absent.
    /// Under contention exactly one remover succeeds.
    pub fn remove(&self, value: &T) -> bool {
        let _pin = G::pin();
        let search = self.search(value);
        if !search.found {
            return false;
        }
        let node = search.nexts[0];

        unsafe {
            let height = (*node).height();
            // A tower still being built cannot be marked; treat the value
            // as not yet removable (see protocol notes above).
            if height > 1 && search.nexts[height - 1] != node {
                return false;
            }

            // Mark the upper levels top-down. Any mark is sufficient; the
            // loops only retry to make sure one lands.
            for level in (1..height).rev() {
                let mut next = (*node).next(level);
                while !next.is_deleted() {
                    let _ = (*node).cas_next_weak(level, next, next.deleted());
                    next = (*node).next(level);
                }
            }

            // The level-0 mark is the linearization point of removal; the
            // thread whose CAS lands owns the node.
            let mut next = (*node).next(0);
            loop {
                if next.is_deleted() {
                    // Another remover got here first.
                    return false;
                }
                if (*node).cas_next(0, next, next.deleted()).is_ok() {
                    break;
                }
                next = (*node).next(0);
            }

            self.len.fetch_sub(1, Ordering::Relaxed);

            // One cleaning pass unlinks the node from every level it is
            // still reachable at; only then may it be retired.
            self.search(value);
            self.guard.defer_destroy(node, SkipNode::dealloc);
        }

        true
    }

    /// Whether an equivalent value is present.
    ///
    /// Like every operation this traverses via `search` and so helps
    /// unlink logically deleted nodes along the way.
    pub fn contains(&self, value: &T) -> bool {
        let _pin = G::pin();
        self.search(value).found
    }

    /// Advisory number of elements.
    ///
    /// Maintained by the linearizing CASes of `add` and `remove`; may lag
    /// in-flight operations but is exact once they have all completed.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Locate `value`: for every level, the last node ordered before it and
    /// that node's successor, plus whether an equivalent unmarked node sits
    /// at level 0. Unlinks every marked node encountered on the way; a
    /// failed unlink CAS restarts the descent from HEAD, since a changed
    /// predecessor slot invalidates everything observed below it.
    fn search(&self, value: &T) -> Search<T> {
        'restart: loop {
            let mut prevs = [ptr::null_mut(); MAX_LEVEL];
            let mut nexts = [ptr::null_mut(); MAX_LEVEL];
            let mut prev = self.head;

            for level in (0..MAX_LEVEL).rev() {
                let mut cur = unsafe { (*prev).next(level).ptr() };
                loop {
                    let mut next = unsafe { (*cur).next(level) };
                    while next.is_deleted() {
                        // cur is logically deleted at this level: unlink it
                        // before moving on.
                        debug_assert!(prev != cur, "unlink CAS would self-link");
                        let expected = TagPtr::compose(cur, false);
                        let through = TagPtr::compose(next.ptr(), false);
                        if unsafe { (*prev).cas_next(level, expected, through) }.is_err() {
                            continue 'restart;
                        }
                        cur = unsafe { (*prev).next(level).ptr() };
                        next = unsafe { (*cur).next(level) };
                    }
                    if !self.node_less(cur, value) {
                        break;
                    }
                    prev = cur;
                    cur = next.ptr();
                }
                prevs[level] = prev;
                nexts[level] = cur;
            }

            let found = self.node_equivalent(nexts[0], value);
            return Search { prevs, nexts, found };
        }
    }

    /// Whether `node` orders strictly before `value`. Head is below
    /// everything, tail above everything.
    #[inline]
    fn node_less(&self, node: NodePtr<T>, value: &T) -> bool {
        if node == self.head {
            return true;
        }
        if node == self.tail {
            return false;
        }
        unsafe { self.order.less((*node).value(), value) }
    }

    /// Whether `node` is a non-sentinel equivalent of `value`.
    #[inline]
    fn node_equivalent(&self, node: NodePtr<T>, value: &T) -> bool {
        if node == self.head || node == self.tail {
            return false;
        }
        unsafe { self.order.equivalent((*node).value(), value) }
    }

    /// Validate the structural invariants. Quiescent use only: every level
    /// must be a strictly ascending, mark-free chain, every upper level a
    /// subset of the level below, and the advisory length must equal the
    /// level-0 population. Panics on the first violation.
    pub fn check_invariants(&self) {
        use std::collections::HashSet;

        let _pin = G::pin();
        unsafe {
            let mut below: HashSet<usize> = HashSet::new();
            let mut count = 0isize;
            let mut prev: NodePtr<T> = ptr::null_mut();
            let mut cur = (*self.head).next(0).ptr();
            while cur != self.tail {
                let next = (*cur).next(0);
                assert!(!next.is_deleted(), "marked node reachable at level 0");
                if !prev.is_null() {
                    assert!(
                        self.order.less((*prev).value(), (*cur).value()),
                        "level 0 is not strictly ascending"
                    );
                }
                below.insert(cur as usize);
                count += 1;
                prev = cur;
                cur = next.ptr();
            }
            assert_eq!(
                count,
                self.len.load(Ordering::Relaxed),
                "advisory length diverged from level-0 population"
            );

            for level in 1..MAX_LEVEL {
                let mut here: HashSet<usize> = HashSet::new();
                let mut prev: NodePtr<T> = ptr::null_mut();
                let mut cur = (*self.head).next(level).ptr();
                while cur != self.tail {
                    let next = (*cur).next(level);
                    assert!(!next.is_deleted(), "marked node reachable at level {level}");
                    assert!(
                        below.contains(&(cur as usize)),
                        "node at level {level} is not reachable at level {}",
                        level - 1
                    );
                    if !prev.is_null() {
                        assert!(
                            self.order.less((*prev).value(), (*cur).value()),
                            "level {level} is not strictly ascending"
                        );
                    }
                    here.insert(cur as usize);
                    prev = cur;
                    cur = next.ptr();
                }
                below = here;
            }
        }
    }
}

impl<T, O, G> Default for SkipListSet<T, O, G>
where
    O: Order<T> + Default,
    G: Guard,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, O, G> Drop for SkipListSet<T, O, G>
where
    O: Order<T>,
    G: Guard,
{
    fn drop(&mut self) {
        unsafe {
            // Removed nodes were unlinked and retired to the guard; only
            // live nodes remain on the level-0 chain.
            let mut cur = (*self.head).next(0).ptr();
            while cur != self.tail {
                let next = (*cur).next(0);
                debug_assert!(!next.is_deleted(), "removed node still linked at drop");
                SkipNode::dealloc(cur);
                cur = next.ptr();
            }
            SkipNode::dealloc(self.head);
            SkipNode::dealloc(self.tail);
        }
    }
}

// Safety: nodes are only ever mutated through atomics, values are shared
// read-only across threads, and the guard serializes reclamation.
unsafe impl<T, O, G> Send for SkipListSet<T, O, G>
where
    T: Send,
    O: Order<T>,
    G: Guard,
{
}

unsafe impl<T, O, G> Sync for SkipListSet<T, O, G>
where
    T: Send + Sync,
    O: Order<T>,
    G: Guard,
{
}

// ============================================================================
// Tests
// ============================================================================
