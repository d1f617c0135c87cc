//! Self-balancing search tree over address ranges
//!
//! The ingestion side of ipcc mutates range sets heavily: every consolidated
//! feed line either widens an existing range, splits one, or lands between
//! two. `RangeTree` keeps those ranges in an AVL tree keyed by interval so
//! each of those decisions is O(log n), then hands the finished set to
//! [`crate::table`] as one in-order pass. The query side never builds a
//! tree; it bisects the serialized array directly.
//!
//! One engine covers all three key shapes used by the system: 32-bit IPv4
//! range bounds, 128-bit IPv6 range bounds ([`crate::wide::U128`]), and
//! two-letter country codes (degenerate point intervals, see
//! [`crate::country`]).
//!
//! Rebalancing uses balance-delta propagation: each recursive call reports
//! whether its subtree changed height, and the parent frame folds that
//! delta into its own balance factor instead of recomputing subtree
//! heights. A factor of ±2 triggers one of the four AVL rotations, chosen
//! by the taller child's balance sign.

/// Tree key: a copyable totally-ordered value with neighbor queries.
///
/// `checked_incr`/`checked_decr` return `None` at the ends of the key
/// space; the tree uses them to detect zero-gap adjacency without wrapping.
pub trait RangeKey: Copy + Ord {
    /// The next key up, or `None` at the top of the key space.
    fn checked_incr(self) -> Option<Self>;
    /// The next key down, or `None` at the bottom of the key space.
    fn checked_decr(self) -> Option<Self>;
}

impl RangeKey for u32 {
    #[inline]
    fn checked_incr(self) -> Option<Self> {
        self.checked_add(1)
    }
    #[inline]
    fn checked_decr(self) -> Option<Self> {
        self.checked_sub(1)
    }
}

impl RangeKey for crate::wide::U128 {
    #[inline]
    fn checked_incr(self) -> Option<Self> {
        self.checked_add(crate::wide::U128::ONE)
    }
    #[inline]
    fn checked_decr(self) -> Option<Self> {
        self.checked_sub(crate::wide::U128::ONE)
    }
}

/// One `[lo, hi]` range and its tag, as returned by lookups and iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range<K, V> {
    /// Inclusive lower bound.
    pub lo: K,
    /// Inclusive upper bound.
    pub hi: K,
    /// The value tagged onto the range (a country code for address trees).
    pub value: V,
}

struct Node<K, V> {
    lo: K,
    hi: K,
    value: V,
    /// height(right) - height(left); -2/+2 only transiently mid-rebalance.
    balance: i8,
    left: Link<K, V>,
    right: Link<K, V>,
}

type Link<K, V> = Option<Box<Node<K, V>>>;

/// Balanced tree of disjoint `[lo, hi]` ranges, each tagged with a value.
///
/// Ranges are keyed by their low bound; containment lookups work because
/// the tree only ever holds pairwise disjoint ranges. Dropping the tree
/// releases every node.
pub struct RangeTree<K, V> {
    root: Link<K, V>,
    len: usize,
}

/// Outcome of a recursive insertion, reported to the parent frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inserted {
    /// The low bound is already keyed in the tree; nothing was mutated.
    Duplicate,
    /// Inserted; this subtree's height is unchanged.
    SameHeight,
    /// Inserted; this subtree grew one level.
    Grew,
}

/// Outcome of a recursive removal, reported to the parent frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removed {
    /// No range contains the point; nothing was mutated.
    NotFound,
    /// Removed; this subtree's height is unchanged.
    SameHeight,
    /// Removed; this subtree shrank one level.
    Shrank,
}

impl<K: RangeKey, V: Copy> RangeTree<K, V> {
    /// Create an empty tree.
    pub fn new() -> Self {
        RangeTree { root: None, len: 0 }
    }

    /// Number of ranges in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no ranges.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Find the unique range containing `point`.
    pub fn find(&self, point: K) -> Option<Range<K, V>> {
        let mut cur = self.root.as_deref();
        while let Some(node) = cur {
            if point < node.lo {
                cur = node.left.as_deref();
            } else if point > node.hi {
                cur = node.right.as_deref();
            } else {
                return Some(Range {
                    lo: node.lo,
                    hi: node.hi,
                    value: node.value,
                });
            }
        }
        None
    }

    /// Insert a new disjoint range.
    ///
    /// Caller contract: `[lo, hi]` must not overlap or same-value-touch any
    /// stored range (resolve those through [`RangeTree::add`] or
    /// [`RangeTree::find_touching`] first). A low bound that is already
    /// keyed in the tree is a structural no-op returning `false`.
    pub fn insert(&mut self, lo: K, hi: K, value: V) -> bool {
        debug_assert!(lo <= hi);
        match insert_at(&mut self.root, lo, hi, value) {
            Inserted::Duplicate => false,
            _ => {
                self.len += 1;
                true
            }
        }
    }

    /// Remove the range containing `point`, if any.
    ///
    /// Removing a point no range contains leaves the tree untouched and
    /// returns `false`.
    pub fn remove(&mut self, point: K) -> bool {
        match remove_at(&mut self.root, point) {
            Removed::NotFound => false,
            _ => {
                self.len -= 1;
                true
            }
        }
    }

    /// In-order iteration: ranges in strictly ascending `lo` order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter { stack: Vec::new() };
        iter.push_left_spine(self.root.as_deref());
        iter
    }
}

impl<K: RangeKey, V: Copy + PartialEq> RangeTree<K, V> {
    /// Find a range that overlaps `[lo, hi]`, or touches it with zero gap
    /// while carrying the same value, or is fully contained in it.
    ///
    /// This is the pre-insertion probe: a hit means `[lo, hi]` cannot be
    /// inserted as-is and must first be merged with or split against the
    /// returned range.
    pub fn find_touching(&self, lo: K, hi: K, value: V) -> Option<Range<K, V>> {
        debug_assert!(lo <= hi);
        let mut cur = self.root.as_deref();
        while let Some(node) = cur {
            let overlaps = lo <= node.hi && node.lo <= hi;
            let adjacent = value == node.value
                && (node.hi.checked_incr() == Some(lo) || hi.checked_incr() == Some(node.lo));
            if overlaps || adjacent {
                return Some(Range {
                    lo: node.lo,
                    hi: node.hi,
                    value: node.value,
                });
            }
            cur = if lo < node.lo {
                node.left.as_deref()
            } else {
                node.right.as_deref()
            };
        }
        None
    }

    /// Add a range, merging and splitting against whatever is stored.
    ///
    /// Touching ranges with the same value are coalesced into one node;
    /// overlapped ranges with a different value lose the overlapped part
    /// (the incoming range wins), keeping any remnants outside `[lo, hi]`.
    /// Afterwards the steady-state invariant holds: all ranges pairwise
    /// disjoint, no two adjacent ranges with the same value.
    pub fn add(&mut self, lo: K, hi: K, value: V) {
        debug_assert!(lo <= hi);
        let mut lo = lo;
        let mut hi = hi;
        while let Some(hit) = self.find_touching(lo, hi, value) {
            self.remove(hit.lo);
            if hit.value == value {
                // Same value: absorb the stored range and keep probing with
                // the widened bounds.
                lo = lo.min(hit.lo);
                hi = hi.max(hit.hi);
            } else {
                // Different value: keep the parts of the stored range that
                // stick out on either side. Remnants are adjacent with a
                // different value, so they never re-match the probe.
                if hit.lo < lo {
                    if let Some(end) = lo.checked_decr() {
                        self.insert(hit.lo, end, hit.value);
                    }
                }
                if hit.hi > hi {
                    if let Some(start) = hi.checked_incr() {
                        self.insert(start, hit.hi, hit.value);
                    }
                }
            }
        }
        self.insert(lo, hi, value);
    }
}

impl<K: RangeKey, V: Copy> Default for RangeTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// In-order iterator over a tree's ranges.
pub struct Iter<'a, K, V> {
    stack: Vec<&'a Node<K, V>>,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn push_left_spine(&mut self, mut link: Option<&'a Node<K, V>>) {
        while let Some(node) = link {
            self.stack.push(node);
            link = node.left.as_deref();
        }
    }
}

impl<'a, K: Copy, V: Copy> Iterator for Iter<'a, K, V> {
    type Item = Range<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left_spine(node.right.as_deref());
        Some(Range {
            lo: node.lo,
            hi: node.hi,
            value: node.value,
        })
    }
}

fn insert_at<K: RangeKey, V: Copy>(link: &mut Link<K, V>, lo: K, hi: K, value: V) -> Inserted {
    let Some(node) = link else {
        *link = Some(Box::new(Node {
            lo,
            hi,
            value,
            balance: 0,
            left: None,
            right: None,
        }));
        return Inserted::Grew;
    };

    if lo < node.lo {
        match insert_at(&mut node.left, lo, hi, value) {
            Inserted::Grew => node.balance -= 1,
            other => return other,
        }
    } else if lo > node.lo {
        match insert_at(&mut node.right, lo, hi, value) {
            Inserted::Grew => node.balance += 1,
            other => return other,
        }
    } else {
        return Inserted::Duplicate;
    }

    let balance = node.balance;
    if balance.abs() > 1 {
        // The rotation swallows the level this insertion added.
        if rebalance(link) {
            Inserted::SameHeight
        } else {
            Inserted::Grew
        }
    } else if balance != 0 {
        Inserted::Grew
    } else {
        Inserted::SameHeight
    }
}

fn remove_at<K: RangeKey, V: Copy>(link: &mut Link<K, V>, point: K) -> Removed {
    let Some(node) = link else {
        return Removed::NotFound;
    };

    if point >= node.lo && point <= node.hi {
        return remove_here(link);
    }

    if point < node.lo {
        match remove_at(&mut node.left, point) {
            Removed::Shrank => node.balance += 1,
            other => return other,
        }
    } else {
        match remove_at(&mut node.right, point) {
            Removed::Shrank => node.balance -= 1,
            other => return other,
        }
    }

    after_shrink(link)
}

/// Remove the root node of this non-empty subtree.
fn remove_here<K: RangeKey, V: Copy>(link: &mut Link<K, V>) -> Removed {
    {
        let node = link.as_mut().expect("remove_here on empty subtree");
        if node.left.is_none() || node.right.is_none() {
            let node = link.take().expect("checked non-empty above");
            *link = if node.left.is_some() {
                node.left
            } else {
                node.right
            };
            return Removed::Shrank;
        }

        // Two children: relink the in-order predecessor (when leaning
        // left) or successor (when leaning right) into this position.
        // The replacement retains this node's balance; the pick walk has
        // already rebalanced every ancestor it passed through.
        let lean_left = node.balance == -1;
        let (picked, pick_shrank) = if lean_left {
            pick_max(&mut node.left)
        } else {
            pick_min(&mut node.right)
        };
        node.lo = picked.lo;
        node.hi = picked.hi;
        node.value = picked.value;
        if !pick_shrank {
            return Removed::SameHeight;
        }
        node.balance += if lean_left { 1 } else { -1 };
    }
    after_shrink(link)
}

/// Detach and return the rightmost node of this non-empty subtree,
/// rebalancing every node on the way back up. The bool reports whether the
/// subtree shrank one level.
fn pick_max<K: RangeKey, V: Copy>(link: &mut Link<K, V>) -> (Box<Node<K, V>>, bool) {
    let node = link.as_mut().expect("pick_max on empty subtree");
    if node.right.is_none() {
        // Rightmost: splice it out, promoting its left child.
        let mut picked = link.take().expect("checked non-empty above");
        *link = picked.left.take();
        return (picked, true);
    }
    let (picked, child_shrank) = pick_max(&mut node.right);
    if !child_shrank {
        return (picked, false);
    }
    node.balance -= 1;
    let shrank = matches!(after_shrink(link), Removed::Shrank);
    (picked, shrank)
}

/// Mirror of [`pick_max`]: detach and return the leftmost node.
fn pick_min<K: RangeKey, V: Copy>(link: &mut Link<K, V>) -> (Box<Node<K, V>>, bool) {
    let node = link.as_mut().expect("pick_min on empty subtree");
    if node.left.is_none() {
        let mut picked = link.take().expect("checked non-empty above");
        *link = picked.right.take();
        return (picked, true);
    }
    let (picked, child_shrank) = pick_min(&mut node.left);
    if !child_shrank {
        return (picked, false);
    }
    node.balance += 1;
    let shrank = matches!(after_shrink(link), Removed::Shrank);
    (picked, shrank)
}

/// Common post-removal tail: fold an already-applied balance delta into a
/// possible rotation and report whether the subtree shrank.
fn after_shrink<K: RangeKey, V: Copy>(link: &mut Link<K, V>) -> Removed {
    let balance = link.as_ref().expect("after_shrink on empty subtree").balance;
    if balance.abs() > 1 {
        if rebalance(link) {
            Removed::Shrank
        } else {
            Removed::SameHeight
        }
    } else if balance == 0 {
        Removed::Shrank
    } else {
        Removed::SameHeight
    }
}

/// Rotate a ±2-balanced subtree back into AVL shape.
///
/// Returns whether the rotation changed the subtree's overall height.
/// After a single rotation the pivot's balance is derived from the vacated
/// child's balance; after a double rotation all three nodes' balances are
/// derived from the middle node's pre-rotation balance sign.
fn rebalance<K, V>(link: &mut Link<K, V>) -> bool {
    let mut o = link.take().expect("rebalance on empty subtree");
    debug_assert!(o.balance == -2 || o.balance == 2);

    if o.balance == -2 {
        let mut p = o.left.take().expect("left-heavy node without left child");
        if p.balance == 1 {
            // Double left-right rotation.
            let mut q = p.right.take().expect("right-leaning node without right child");
            p.right = q.left.take();
            o.left = q.right.take();
            o.balance = (q.balance < 0) as i8;
            p.balance = -((q.balance > 0) as i8);
            q.balance = 0;
            q.left = Some(p);
            q.right = Some(o);
            *link = Some(q);
            true
        } else {
            // Single right rotation.
            let height_changed = p.balance != 0;
            o.left = p.right.take();
            p.balance += 1;
            o.balance = -p.balance;
            p.right = Some(o);
            *link = Some(p);
            height_changed
        }
    } else {
        let mut q = o.right.take().expect("right-heavy node without right child");
        if q.balance == -1 {
            // Double right-left rotation.
            let mut p = q.left.take().expect("left-leaning node without left child");
            q.left = p.right.take();
            o.right = p.left.take();
            o.balance = -((p.balance > 0) as i8);
            q.balance = (p.balance < 0) as i8;
            p.balance = 0;
            p.left = Some(o);
            p.right = Some(q);
            *link = Some(p);
            true
        } else {
            // Single left rotation.
            let height_changed = q.balance != 0;
            o.right = q.left.take();
            q.balance -= 1;
            o.balance = -q.balance;
            q.left = Some(o);
            *link = Some(q);
            height_changed
        }
    }
}
