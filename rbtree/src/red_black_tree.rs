use core::fmt;
use core::iter::FusedIterator;

use crate::compare::{Comparator, NaturalOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

impl Color {
    /// Returns `true` if the color is [`Red`].
    ///
    /// [`Red`]: Color::Red
    #[must_use]
    fn is_red(&self) -> bool {
        matches!(self, Self::Red)
    }

    /// Returns `true` if the color is [`Black`].
    ///
    /// [`Black`]: Color::Black
    #[must_use]
    fn is_black(&self) -> bool {
        matches!(self, Self::Black)
    }
}

/// Handle to a node owned by a [`RedBlackTree`].
///
/// A handle is a plain index into the tree's slot arena. It stays valid
/// until the node it names is erased (or the tree is cleared); after that
/// the slot may be recycled and the stale handle names whatever lives
/// there next. Handles are only meaningful for the tree that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// The sentinel slot. Every relation with no target points here, so the
/// balancing code never deals with a "no node" case.
const NIL: NodeId = NodeId(0);

#[derive(Clone)]
struct Node<T> {
    parent: NodeId,
    left: NodeId,
    right: NodeId,
    color: Color,
    // `None` only in the sentinel slot and in vacant (free-listed) slots.
    // A vacant slot reuses `parent` as the next-free link.
    value: Option<T>,
}

/// Half-open run of nodes `[first, second)` in traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub first: NodeId,
    pub second: NodeId,
}

impl Range {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first == self.second
    }
}

/// Outcome of [`RedBlackTree::insert`].
///
/// Rejection in unique mode is a normal outcome, not an error: the value
/// is handed back together with the handle of the equal node already in
/// the tree.
#[derive(Debug, PartialEq, Eq)]
pub enum InsertResult<T> {
    Inserted(NodeId),
    Duplicate(NodeId, T),
}

impl<T> InsertResult<T> {
    /// The inserted node, or the pre-existing equal node on rejection.
    pub fn node(&self) -> NodeId {
        match *self {
            InsertResult::Inserted(node) | InsertResult::Duplicate(node, _) => node,
        }
    }

    #[must_use]
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertResult::Inserted(_))
    }

    /// The value handed back by a rejected insertion.
    pub fn rejected(self) -> Option<T> {
        match self {
            InsertResult::Inserted(_) => None,
            InsertResult::Duplicate(_, value) => Some(value),
        }
    }
}

/// An ordered container keeping its payloads sorted under a
/// [`Comparator`], with O(log n) insert/erase/lookup and O(1) amortized
/// in-order stepping.
///
/// Nodes live in a slot arena; slot 0 is a sentinel that every absent
/// relation points at. The root and the cached extremes are tree-level
/// fields, so the sentinel means "nothing" and only that. Erased slots
/// are recycled through a free list.
///
/// A tree is either unique-key ([`new`]) or multi-key ([`new_multi`]).
/// Multi-key trees keep comparator-equal payloads in insertion order.
///
/// [`new`]: RedBlackTree::new
/// [`new_multi`]: RedBlackTree::new_multi
pub struct RedBlackTree<T, C = NaturalOrder> {
    // INVARIANTS (between public calls):
    //  * slot 0 is the sentinel: black, payload-free, never linked from a
    //    live node's parent slot
    //  * every live node's absent relations are NIL, never dangling
    //  * root is black; no red node has a red child; every root-to-NIL
    //    path crosses the same number of black nodes
    //  * leftmost/rightmost are the true extremes (NIL when empty)
    //  * len == number of live nodes
    nodes: Vec<Node<T>>,
    root: NodeId,
    leftmost: NodeId,
    rightmost: NodeId,
    free: NodeId,
    len: usize,
    multi: bool,
    cmp: C,
}

impl<T, C> fmt::Debug for RedBlackTree<T, C>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct InOrder<'a, T, C>(&'a RedBlackTree<T, C>);

        impl<T, C> fmt::Debug for InOrder<'_, T, C>
        where
            T: fmt::Debug,
        {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_list().entries(self.0.iter()).finish()
            }
        }

        f.debug_struct("RedBlackTree")
            .field("len", &self.len)
            .field("multi", &self.multi)
            .field("values", &InOrder(self))
            .finish()
    }
}

impl<T, C> Clone for RedBlackTree<T, C>
where
    T: Clone,
    C: Clone,
{
    fn clone(&self) -> Self {
        // Slot-for-slot copy: relations are indices, so handles issued by
        // `self` name the same values in the clone.
        Self {
            nodes: self.nodes.clone(),
            root: self.root,
            leftmost: self.leftmost,
            rightmost: self.rightmost,
            free: self.free,
            len: self.len,
            multi: self.multi,
            cmp: self.cmp.clone(),
        }
    }
}

impl<T, C> Default for RedBlackTree<T, C>
where
    C: Default,
{
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<T: Ord> RedBlackTree<T, NaturalOrder> {
    /// Unique-key tree ordered by `T`'s [`Ord`] instance.
    pub fn with_order() -> Self {
        Self::new(NaturalOrder)
    }

    /// Multi-key tree ordered by `T`'s [`Ord`] instance.
    pub fn with_order_multi() -> Self {
        Self::new_multi(NaturalOrder)
    }
}

impl<T, C> RedBlackTree<T, C> {
    /// Unique-key tree: an insertion that ties with a live node is
    /// rejected.
    pub fn new(cmp: C) -> Self {
        Self::with_mode(cmp, false)
    }

    /// Multi-key tree: comparator-equal payloads coexist, in insertion
    /// order.
    pub fn new_multi(cmp: C) -> Self {
        Self::with_mode(cmp, true)
    }

    fn with_mode(cmp: C, multi: bool) -> Self {
        Self {
            nodes: vec![Node {
                parent: NIL,
                left: NIL,
                right: NIL,
                color: Color::Black,
                value: None,
            }],
            root: NIL,
            leftmost: NIL,
            rightmost: NIL,
            free: NIL,
            len: 0,
            multi,
            cmp,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_multi(&self) -> bool {
        self.multi
    }

    /// Handle of the minimum node, [`end`] when empty.
    ///
    /// [`end`]: RedBlackTree::end
    #[inline]
    pub fn first(&self) -> NodeId {
        self.leftmost
    }

    /// Handle of the maximum node, [`end`] when empty.
    ///
    /// [`end`]: RedBlackTree::end
    #[inline]
    pub fn last(&self) -> NodeId {
        self.rightmost
    }

    /// The one-past-the-end sentinel handle. Queries that find nothing
    /// return it, and it closes every full range `[first, end)`.
    #[inline]
    pub const fn end(&self) -> NodeId {
        NIL
    }

    /// Payload of a live node, `None` for the sentinel or a dead handle.
    pub fn get(&self, node: NodeId) -> Option<&T> {
        self.nodes.get(node.idx()).and_then(|n| n.value.as_ref())
    }

    /// Mutable payload access.
    ///
    /// The parts of the payload the comparator looks at must not be
    /// changed through this, or the node ends up out of order.
    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut T> {
        self.nodes.get_mut(node.idx()).and_then(|n| n.value.as_mut())
    }

    /// In-order successor; [`end`] after the maximum. Stepping from
    /// [`end`] itself yields the minimum.
    ///
    /// Worst case O(log n), amortized O(1) over a full traversal.
    ///
    /// [`end`]: RedBlackTree::end
    pub fn next(&self, node: NodeId) -> NodeId {
        if node == NIL {
            return self.leftmost;
        }
        if self.right(node) != NIL {
            return self.min_of(self.right(node));
        }

        // No right subtree: the successor is the first ancestor reached
        // from its left side.
        let mut node = node;
        let mut parent = self.parent(node);
        while parent != NIL && node == self.right(parent) {
            node = parent;
            parent = self.parent(parent);
        }

        parent
    }

    /// In-order predecessor; [`end`] before the minimum. Stepping from
    /// [`end`] yields the maximum, so reverse iteration needs no special
    /// entry point.
    ///
    /// [`end`]: RedBlackTree::end
    pub fn prev(&self, node: NodeId) -> NodeId {
        if node == NIL {
            return self.rightmost;
        }
        if self.left(node) != NIL {
            return self.max_of(self.left(node));
        }

        let mut node = node;
        let mut parent = self.parent(node);
        while parent != NIL && node == self.left(parent) {
            node = parent;
            parent = self.parent(parent);
        }

        parent
    }

    /// Number of nodes in `[begin, end)`.
    ///
    /// The full range `[first, end)` is answered from the live count in
    /// O(1); any other range walks successor steps. `end` must be
    /// reachable from `begin`.
    pub fn distance(&self, begin: NodeId, end: NodeId) -> usize {
        if begin == self.leftmost && end == NIL {
            return self.len;
        }

        let mut count = 0;
        let mut cur = begin;
        while cur != end && cur != NIL {
            cur = self.next(cur);
            count += 1;
        }
        debug_assert!(cur == end, "`end` is not reachable from `begin`");

        count
    }

    /// Unlinks `node` and returns its payload together with its in-order
    /// successor, so erase-while-iterating loops can keep going from the
    /// returned handle.
    ///
    /// # Panics
    ///
    /// Panics if `node` is the sentinel or does not name a live node;
    /// the check happens before any structural change.
    pub fn erase(&mut self, node: NodeId) -> (T, NodeId) {
        assert!(
            self.get(node).is_some(),
            "erase: handle does not name a live node"
        );

        let next = self.next(node);
        let erased = node;

        // `target` is the node physically unlinked from its position:
        // `erased` itself when it has at most one child, its in-order
        // successor otherwise. `fix` is the subtree that takes the
        // target's place (possibly NIL) and `fix_parent` its parent after
        // the splice; the repair walk needs the parent threaded through
        // explicitly exactly because `fix` may be the sentinel.
        let mut target = erased;
        let fix;
        let fix_parent;
        let removed_color;

        if self.left(erased) == NIL {
            fix = self.right(erased);
        } else if self.right(erased) == NIL {
            fix = self.left(erased);
        } else {
            // Two children: the successor (minimum of the right subtree)
            // is unlinked instead and will be spliced into erased's spot.
            target = next;
            fix = self.right(target);
        }

        if target == erased {
            // At most one child: replace `erased` with that child.
            removed_color = self.color(erased);
            fix_parent = self.parent(erased);
            if fix != NIL {
                self.set_parent(fix, fix_parent);
            }
            if self.root == erased {
                self.root = fix;
            } else if self.left(fix_parent) == erased {
                self.set_left(fix_parent, fix);
            } else {
                self.set_right(fix_parent, fix);
            }

            if self.leftmost == erased {
                self.leftmost = if fix == NIL {
                    fix_parent
                } else {
                    self.min_of(fix)
                };
            }
            if self.rightmost == erased {
                self.rightmost = if fix == NIL {
                    fix_parent
                } else {
                    self.max_of(fix)
                };
            }
        } else {
            // Two children. The successor has no left child, so it can be
            // cut out of the right subtree and re-linked where `erased`
            // was; afterwards it wears erased's color so every path
            // through the spot keeps its black count, and the repair
            // decision below is made on the successor's own old color.
            removed_color = self.color(target);

            let erased_left = self.left(erased);
            self.set_parent(erased_left, target);
            self.set_left(target, erased_left);

            if target == self.right(erased) {
                fix_parent = target;
            } else {
                fix_parent = self.parent(target);
                if fix != NIL {
                    self.set_parent(fix, fix_parent);
                }
                self.set_left(fix_parent, fix);

                let erased_right = self.right(erased);
                self.set_right(target, erased_right);
                self.set_parent(erased_right, target);
            }

            let erased_parent = self.parent(erased);
            if self.root == erased {
                self.root = target;
            } else if self.left(erased_parent) == erased {
                self.set_left(erased_parent, target);
            } else {
                self.set_right(erased_parent, target);
            }
            self.set_parent(target, erased_parent);
            self.set_color(target, self.color(erased));
        }

        if removed_color.is_black() {
            // A black node left some side of the tree: one set of paths
            // is now a black short.
            self.erase_fixup(fix, fix_parent);
        }

        self.len -= 1;
        let value = self.release(erased);

        (value, next)
    }

    /// Erases `[begin, end)`, returning `end`.
    ///
    /// Erasing the full `[first, end)` range degrades to a wholesale
    /// reset with no per-node rebalancing.
    pub fn erase_range(&mut self, begin: NodeId, end: NodeId) -> NodeId {
        if begin == self.leftmost && end == NIL {
            self.clear();
            return NIL;
        }

        let mut cur = begin;
        while cur != end && cur != NIL {
            cur = self.erase(cur).1;
        }
        debug_assert!(cur == end, "`end` is not reachable from `begin`");

        cur
    }

    /// Like [`erase_range`] but reports how many nodes went away.
    ///
    /// [`erase_range`]: RedBlackTree::erase_range
    pub fn erase_range_count(&mut self, begin: NodeId, end: NodeId) -> usize {
        if begin == self.leftmost && end == NIL {
            let count = self.len;
            self.clear();
            return count;
        }

        let mut count = 0;
        let mut cur = begin;
        while cur != end && cur != NIL {
            cur = self.erase(cur).1;
            count += 1;
        }
        debug_assert!(cur == end, "`end` is not reachable from `begin`");

        count
    }

    /// Drops every payload and resets the arena. All handles die.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.root = NIL;
        self.leftmost = NIL;
        self.rightmost = NIL;
        self.free = NIL;
        self.len = 0;
    }

    /// Payloads in comparator order.
    pub fn iter(&self) -> Iter<'_, T, C> {
        Iter {
            tree: self,
            front: self.leftmost,
            back: NIL,
            remaining: self.len,
        }
    }

    #[inline]
    fn node(&self, id: NodeId) -> &Node<T> {
        &self.nodes[id.idx()]
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
        &mut self.nodes[id.idx()]
    }

    #[inline]
    fn value(&self, id: NodeId) -> &T {
        self.node(id)
            .value
            .as_ref()
            .expect("no payload in sentinel or vacant slot")
    }

    #[inline]
    fn parent(&self, id: NodeId) -> NodeId {
        self.node(id).parent
    }

    #[inline]
    fn left(&self, id: NodeId) -> NodeId {
        self.node(id).left
    }

    #[inline]
    fn right(&self, id: NodeId) -> NodeId {
        self.node(id).right
    }

    #[inline]
    fn color(&self, id: NodeId) -> Color {
        self.node(id).color
    }

    #[inline]
    fn set_parent(&mut self, id: NodeId, to: NodeId) {
        debug_assert!(id != NIL);
        self.node_mut(id).parent = to;
    }

    #[inline]
    fn set_left(&mut self, id: NodeId, to: NodeId) {
        debug_assert!(id != NIL);
        self.node_mut(id).left = to;
    }

    #[inline]
    fn set_right(&mut self, id: NodeId, to: NodeId) {
        debug_assert!(id != NIL);
        self.node_mut(id).right = to;
    }

    #[inline]
    fn set_color(&mut self, id: NodeId, color: Color) {
        debug_assert!(id != NIL);
        self.node_mut(id).color = color;
    }

    fn min_of(&self, mut node: NodeId) -> NodeId {
        while self.left(node) != NIL {
            node = self.left(node);
        }

        node
    }

    fn max_of(&self, mut node: NodeId) -> NodeId {
        while self.right(node) != NIL {
            node = self.right(node);
        }

        node
    }

    /// Takes a slot off the free list, or grows the arena, and primes it
    /// as a red leaf with every relation at the sentinel.
    fn allocate(&mut self, value: T) -> NodeId {
        let id = if self.free != NIL {
            let id = self.free;
            self.free = self.parent(id);
            id
        } else {
            let index = self.nodes.len();
            assert!(index <= u32::MAX as usize, "arena is full");
            self.nodes.push(Node {
                parent: NIL,
                left: NIL,
                right: NIL,
                color: Color::Red,
                value: None,
            });
            NodeId(index as u32)
        };

        let node = self.node_mut(id);
        node.parent = NIL;
        node.left = NIL;
        node.right = NIL;
        node.color = Color::Red;
        node.value = Some(value);

        id
    }

    /// Moves the payload out and free-lists the slot.
    fn release(&mut self, id: NodeId) -> T {
        let free = self.free;
        let node = self.node_mut(id);
        let value = node.value.take().expect("releasing an empty slot");
        node.parent = free;
        self.free = id;

        value
    }

    fn rotate_left(&mut self, node: NodeId) {
        //    p                       p
        //    |                       |
        // +-node-+               +-pivot-+
        // |      |      -->      |       |
        // a  +-pivot-+       +-node-+    c
        //    |       |       |      |
        //    b       c       a      b
        // where a, b, c can be any subtrees
        let pivot = self.right(node);
        debug_assert!(pivot != NIL);

        // attach b to node
        let b = self.left(pivot);
        self.set_right(node, b);
        if b != NIL {
            self.set_parent(b, node);
        }

        // attach pivot to node's parent
        let parent = self.parent(node);
        self.set_parent(pivot, parent);
        if node == self.root {
            self.root = pivot;
        } else if node == self.left(parent) {
            self.set_left(parent, pivot);
        } else {
            self.set_right(parent, pivot);
        }

        // attach node to pivot
        self.set_left(pivot, node);
        self.set_parent(node, pivot);
    }

    fn rotate_right(&mut self, node: NodeId) {
        //         p              p
        //         |              |
        //     +-node-+       +-pivot-+
        //     |      |       |       |
        // +-pivot-+  c  -->  a   +-node-+
        // |       |              |      |
        // a       b              b      c
        // where a, b, c can be any subtrees
        let pivot = self.left(node);
        debug_assert!(pivot != NIL);

        let b = self.right(pivot);
        self.set_left(node, b);
        if b != NIL {
            self.set_parent(b, node);
        }

        let parent = self.parent(node);
        self.set_parent(pivot, parent);
        if node == self.root {
            self.root = pivot;
        } else if node == self.right(parent) {
            self.set_right(parent, pivot);
        } else {
            self.set_left(parent, pivot);
        }

        self.set_right(pivot, node);
        self.set_parent(node, pivot);
    }

    /// Links `node` (a primed red leaf) under `pos` on the given side,
    /// refreshes the extreme caches and rebalances.
    fn attach(&mut self, node: NodeId, pos: NodeId, add_left: bool) {
        self.set_parent(node, pos);

        if pos == NIL {
            self.root = node;
            self.leftmost = node;
            self.rightmost = node;
        } else if add_left {
            self.set_left(pos, node);
            if pos == self.leftmost {
                self.leftmost = node;
            }
        } else {
            self.set_right(pos, node);
            if pos == self.rightmost {
                self.rightmost = node;
            }
        }

        self.insert_fixup(node);
        self.len += 1;
    }

    fn insert_fixup(&mut self, mut node: NodeId) {
        // The new node went in red, so the only possible violation is a
        // red parent over a red child, and there is exactly one of those
        // at a time as the walk moves up.
        while self.color(self.parent(node)).is_red() {
            let mut parent = self.parent(node);
            // a red parent is never the root, so the grandparent is real
            let grand = self.parent(parent);
            debug_assert!(grand != NIL);

            if parent == self.left(grand) {
                let uncle = self.right(grand);
                if self.color(uncle).is_red() {
                    //     +--- g:b ---+               +--- g:r ---+
                    //     |           |               |           |
                    //  + p:r +     + u:r +   -->   + p:b +     + u:b +
                    //  |     |     |     |         |     |     |     |
                    // n:r    a     b     c        n:r    a     b     c
                    //
                    // Pushing the grandparent's black down to both sides
                    // keeps every black count; the grandparent may now
                    // clash with its own parent, so the walk continues
                    // from it.
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grand, Color::Red);
                    node = grand;
                } else {
                    if node == self.right(parent) {
                        //     +-- g:b --+              +-- g:b --+
                        //     |         |              |         |
                        // +- p:r -+    u:b  -->    +- n:r -+    u:b
                        // |       |                |       |
                        // a    +- n:r -+       +- p:r -+   c
                        //      |       |       |       |
                        //      b       c       a       b
                        //
                        // Fold the zig-zag into the straight case below.
                        node = parent;
                        self.rotate_left(node);
                        parent = self.parent(node);
                    }

                    //         +--- g:b ---+            +--- p:b ---+
                    //         |           |            |           |
                    //     +- p:r -+      u:b  -->  +- n:r -+   +- g:r -+
                    //     |       |                |       |   |       |
                    // +- n:r -+   c                a       b   c      u:b
                    // |       |
                    // a       b
                    //
                    // The red pair is gone and black counts are intact:
                    // done.
                    self.set_color(parent, Color::Black);
                    self.set_color(grand, Color::Red);
                    self.rotate_right(grand);
                }
            } else {
                // mirror of the branch above
                let uncle = self.left(grand);
                if self.color(uncle).is_red() {
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grand, Color::Red);
                    node = grand;
                } else {
                    if node == self.left(parent) {
                        node = parent;
                        self.rotate_right(node);
                        parent = self.parent(node);
                    }

                    self.set_color(parent, Color::Black);
                    self.set_color(grand, Color::Red);
                    self.rotate_left(grand);
                }
            }
        }

        let root = self.root;
        self.set_color(root, Color::Black);
    }

    /// Repairs the one-black-short deficit left behind by unlinking a
    /// black node. `fix` is the node the deficit sits on (possibly NIL)
    /// and `fix_parent` its parent, threaded explicitly since the
    /// sentinel carries no parent link.
    fn erase_fixup(&mut self, mut fix: NodeId, mut fix_parent: NodeId) {
        while fix != self.root && self.color(fix).is_black() {
            let step = if fix == self.left(fix_parent) {
                self.repair_left_deficit(fix_parent)
            } else {
                self.repair_right_deficit(fix_parent)
            };

            match step {
                Repair::Shift => {
                    // The deficit moved onto the parent.
                    fix = fix_parent;
                    fix_parent = self.parent(fix);
                }
                Repair::Done => break,
            }
        }

        // Either the deficit reached the root (where it vanishes), or the
        // walk stopped on a red node that absorbs it.
        if fix != NIL {
            self.set_color(fix, Color::Black);
        }
    }

    /// One repair step for a deficit below `parent` on its *left* side.
    /// The sibling subtree on the right is taller by one black; the step
    /// either rebalances locally or pushes the deficit up.
    fn repair_left_deficit(&mut self, parent: NodeId) -> Repair {
        let mut sibling = self.right(parent);

        if self.color(sibling).is_red() {
            // red sibling
            //
            //     +--- p:b ---+               +--- s:b ---+
            //     |           |               |           |
            //    x:b      +- s:r -+   -->  +- p:r -+     d:b
            //             |       |        |       |
            //            c:b     d:b      x:b     c:b
            //
            // The deficit is still on x, but its sibling is now the black
            // c, which one of the cases below resolves.
            self.set_color(sibling, Color::Black);
            self.set_color(parent, Color::Red);
            self.rotate_left(parent);
            sibling = self.right(parent);
        }

        if sibling == NIL {
            // Black heights were already inconsistent; just move up.
            debug_assert!(false, "deficit node has no sibling");
            return Repair::Shift;
        }

        let near = self.left(sibling);
        let far = self.right(sibling);

        if self.color(near).is_black() && self.color(far).is_black() {
            // black sibling, black nephews: take one black off both
            // sides and hand the deficit to the parent
            //
            //     +--- p:? ---+               +--- p:? ---+
            //     |           |               |           |
            //    x:b      +- s:b -+   -->    x:b      +- s:r -+
            //             |       |                   |       |
            //            c:b     d:b                 c:b     d:b
            //
            // If p came in red the walk stops there and p turns black,
            // restoring the missing count.
            self.set_color(sibling, Color::Red);
            return Repair::Shift;
        }

        if self.color(far).is_black() {
            // near nephew red, far black: rotate the red over to the far
            // side, reducing to the terminal case below
            //
            //   +--- s:b ---+            +- c:b -+
            //   |           |     -->    |       |
            // +- c:r -+    d:b           e   +- s:r -+
            // |       |                      |       |
            // e       f                      f      d:b
            self.set_color(near, Color::Black);
            self.set_color(sibling, Color::Red);
            self.rotate_right(sibling);
            sibling = self.right(parent);
        }

        // far nephew red: one rotation around the parent adds a black
        // ancestor to x's side and the recolored far nephew keeps the
        // sibling side balanced; the deficit is gone
        //
        //     +--- p:? ---+                  +--- s:? ---+
        //     |           |                  |           |
        //    x:b      +- s:b -+   -->    +- p:b -+      d:b
        //             |       |          |       |
        //            c:?     d:r        x:b     c:?
        self.set_color(sibling, self.color(parent));
        self.set_color(parent, Color::Black);
        let far = self.right(sibling);
        self.set_color(far, Color::Black);
        self.rotate_left(parent);

        Repair::Done
    }

    /// Mirror of [`repair_left_deficit`] for a deficit on the right side.
    ///
    /// [`repair_left_deficit`]: RedBlackTree::repair_left_deficit
    fn repair_right_deficit(&mut self, parent: NodeId) -> Repair {
        let mut sibling = self.left(parent);

        if self.color(sibling).is_red() {
            self.set_color(sibling, Color::Black);
            self.set_color(parent, Color::Red);
            self.rotate_right(parent);
            sibling = self.left(parent);
        }

        if sibling == NIL {
            debug_assert!(false, "deficit node has no sibling");
            return Repair::Shift;
        }

        let near = self.right(sibling);
        let far = self.left(sibling);

        if self.color(near).is_black() && self.color(far).is_black() {
            self.set_color(sibling, Color::Red);
            return Repair::Shift;
        }

        if self.color(far).is_black() {
            self.set_color(near, Color::Black);
            self.set_color(sibling, Color::Red);
            self.rotate_left(sibling);
            sibling = self.left(parent);
        }

        self.set_color(sibling, self.color(parent));
        self.set_color(parent, Color::Black);
        let far = self.left(sibling);
        self.set_color(far, Color::Black);
        self.rotate_right(parent);

        Repair::Done
    }
}

/// Outcome of one deficit-repair step.
enum Repair {
    /// The deficit moved one level up; keep walking.
    Shift,
    /// Balance restored, the walk terminates.
    Done,
}

impl<T, C> RedBlackTree<T, C>
where
    C: Comparator<T>,
{
    #[inline]
    fn less(&self, a: &T, b: &T) -> bool {
        let less = self.cmp.less(a, b);
        debug_assert!(
            !less || !self.cmp.less(b, a),
            "comparator is not antisymmetric"
        );

        less
    }

    /// Inserts `value` at its sorted position.
    ///
    /// In multi mode the new node lands after every node it compares
    /// equal to, so equal runs stay in arrival order. In unique mode a
    /// tie with a live node rejects the insertion: the tree is left
    /// untouched and [`InsertResult::Duplicate`] hands the value back
    /// with the existing node's handle.
    pub fn insert(&mut self, value: T) -> InsertResult<T> {
        // Walk down to the leaf position the value sorts to, biasing
        // right on ties.
        let mut pos = NIL;
        let mut cur = self.root;
        let mut add_left = true;
        while cur != NIL {
            pos = cur;
            add_left = self.less(&value, self.value(cur));
            cur = if add_left {
                self.left(cur)
            } else {
                self.right(cur)
            };
        }

        if !self.multi && pos != NIL {
            // The only candidate that can tie with `value` is its would-be
            // in-order predecessor: `pos` itself when the walk ended going
            // right, otherwise the node before `pos`.
            let prior = if !add_left {
                pos
            } else if pos == self.leftmost {
                NIL
            } else {
                self.prev(pos)
            };

            if prior != NIL && !self.less(self.value(prior), &value) {
                return InsertResult::Duplicate(prior, value);
            }
        }

        let node = self.allocate(value);
        self.attach(node, pos, add_left);

        InsertResult::Inserted(node)
    }

    /// Handle of some node comparator-equal to `value`, [`end`] if there
    /// is none. In multi mode this is the first of the equal run.
    ///
    /// [`end`]: RedBlackTree::end
    pub fn find(&self, value: &T) -> NodeId {
        let candidate = self.lower_bound(value);
        if candidate == NIL || self.less(value, self.value(candidate)) {
            NIL
        } else {
            candidate
        }
    }

    pub fn contains(&self, value: &T) -> bool {
        self.find(value) != NIL
    }

    /// First node not less than `value`, [`end`] if every node is less.
    ///
    /// [`end`]: RedBlackTree::end
    pub fn lower_bound(&self, value: &T) -> NodeId {
        let mut bound = NIL;
        let mut cur = self.root;
        while cur != NIL {
            if self.less(self.value(cur), value) {
                cur = self.right(cur);
            } else {
                bound = cur;
                cur = self.left(cur);
            }
        }

        bound
    }

    /// First node greater than `value`, [`end`] if there is none.
    ///
    /// [`end`]: RedBlackTree::end
    pub fn upper_bound(&self, value: &T) -> NodeId {
        let mut bound = NIL;
        let mut cur = self.root;
        while cur != NIL {
            if self.less(value, self.value(cur)) {
                bound = cur;
                cur = self.left(cur);
            } else {
                cur = self.right(cur);
            }
        }

        bound
    }

    /// The maximal run of nodes comparator-equal to `value`, as a
    /// half-open `[first, second)` range. An absent value yields an empty
    /// range positioned at its sorted insertion point.
    ///
    /// One descent finds the lower bound while remembering where a
    /// strictly-greater node was last seen; the upper-bound refinement
    /// then resumes from that divergence point instead of the root, so
    /// the whole query costs a single O(log n) pass.
    pub fn equal_range(&self, value: &T) -> Range {
        let mut first = NIL;
        let mut second = NIL;

        let mut cur = self.root;
        while cur != NIL {
            if self.less(self.value(cur), value) {
                cur = self.right(cur);
            } else {
                if second == NIL && self.less(value, self.value(cur)) {
                    second = cur;
                }
                first = cur;
                cur = self.left(cur);
            }
        }

        // Finish the upper bound from where the two searches split.
        let mut cur = if second == NIL {
            self.root
        } else {
            self.left(second)
        };
        while cur != NIL {
            if self.less(value, self.value(cur)) {
                second = cur;
                cur = self.left(cur);
            } else {
                cur = self.right(cur);
            }
        }

        Range { first, second }
    }

    /// Number of nodes comparator-equal to `value`.
    pub fn count(&self, value: &T) -> usize {
        let range = self.equal_range(value);
        self.distance(range.first, range.second)
    }

    /// Erases every node comparator-equal to `value`, returning how many
    /// there were.
    pub fn erase_by_value(&mut self, value: &T) -> usize {
        let range = self.equal_range(value);
        self.erase_range_count(range.first, range.second)
    }
}

/// Double-ended in-order iterator over payload references.
pub struct Iter<'a, T, C> {
    tree: &'a RedBlackTree<T, C>,
    front: NodeId,
    back: NodeId,
    remaining: usize,
}

impl<'a, T, C> Iterator for Iter<'a, T, C> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.tree.get(self.front)?;
        self.front = self.tree.next(self.front);
        self.remaining -= 1;

        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, C> DoubleEndedIterator for Iter<'_, T, C> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.back = self.tree.prev(self.back);
        self.remaining -= 1;

        self.tree.get(self.back)
    }
}

impl<T, C> ExactSizeIterator for Iter<'_, T, C> {}
impl<T, C> FusedIterator for Iter<'_, T, C> {}

impl<'a, T, C> IntoIterator for &'a RedBlackTree<T, C> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, C>;

    fn into_iter(self) -> Iter<'a, T, C> {
        self.iter()
    }
}

/// Owning in-order iterator; erases front to back.
pub struct IntoIter<T, C> {
    tree: RedBlackTree<T, C>,
}

impl<T, C> Iterator for IntoIter<T, C> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.tree.is_empty() {
            return None;
        }
        let first = self.tree.first();

        Some(self.tree.erase(first).0)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.tree.len(), Some(self.tree.len()))
    }
}

impl<T, C> ExactSizeIterator for IntoIter<T, C> {}
impl<T, C> FusedIterator for IntoIter<T, C> {}

impl<T, C> IntoIterator for RedBlackTree<T, C> {
    type Item = T;
    type IntoIter = IntoIter<T, C>;

    fn into_iter(self) -> IntoIter<T, C> {
        IntoIter { tree: self }
    }
}

impl<T, C> Extend<T> for RedBlackTree<T, C>
where
    C: Comparator<T>,
{
    /// Inserts every value; in unique mode duplicates are dropped.
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T, C> FromIterator<T> for RedBlackTree<T, C>
where
    C: Comparator<T> + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut tree = Self::new(C::default());
        tree.extend(iter);

        tree
    }
}
