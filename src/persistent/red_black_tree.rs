//! Persistent left-leaning red-black tree engine.
//!
//! This module holds the balanced search tree shared by
//! [`PersistentTreeMap`](super::PersistentTreeMap) and
//! [`PersistentTreeSet`](super::PersistentTreeSet). The tree does not own a
//! comparator: every ordered operation receives one explicitly, and the
//! façades are responsible for passing the same comparator to every call made
//! on a tree and its descendants.
//!
//! # Internal Structure
//!
//! The tree maintains the following invariants after every operation:
//! 1. Keys are in search-tree order under the comparator
//! 2. No red node has a red child
//! 3. Every path from a node to an empty leaf has the same number of black nodes
//! 4. The root is black
//! 5. Red links lean left: a right child is never red
//!
//! Insertion descends to a new red leaf and repairs red-red violations on the
//! way back up with [`RedBlackTree::balance`]. Deletion works top-down: before
//! descending into a black child whose own left child is black, redness is
//! pushed down with `move_red_left` / `move_red_right`, so the node finally
//! removed is never a lone black node.
//!
//! Nothing is mutated in place. Each operation rebuilds the path it touched
//! and shares every other subtree with its input.

use super::ReferenceCounter;
use crate::comparator::Comparator;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::ops::Bound;

// =============================================================================
// Color Definition
// =============================================================================

/// The color of a Red-Black Tree node.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Color {
    Red,
    Black,
}

// =============================================================================
// Node Definition
// =============================================================================

/// A possibly empty subtree. `None` is the empty leaf, which counts as black.
pub(crate) type Link<K, V> = Option<ReferenceCounter<Node<K, V>>>;

/// Internal node structure for the Red-Black Tree.
#[derive(Clone)]
pub(crate) struct Node<K, V> {
    key: K,
    value: V,
    color: Color,
    left: Link<K, V>,
    right: Link<K, V>,
}

impl<K, V> Node<K, V> {
    const fn new(color: Color, key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Self {
        Self {
            key,
            value,
            color,
            left,
            right,
        }
    }

    /// Allocates a node and returns it as a link.
    fn link(color: Color, key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Link<K, V> {
        Some(ReferenceCounter::new(Self::new(color, key, value, left, right)))
    }

    /// Checks if this node is red.
    fn is_red(&self) -> bool {
        self.color == Color::Red
    }

    /// Creates a copy of this node with a new color.
    fn with_color(&self, color: Color) -> Self
    where
        K: Clone,
        V: Clone,
    {
        Self {
            key: self.key.clone(),
            value: self.value.clone(),
            color,
            left: self.left.clone(),
            right: self.right.clone(),
        }
    }
}

/// Helper function to check if an optional node is red.
fn is_red<K, V>(node: Option<&ReferenceCounter<Node<K, V>>>) -> bool {
    node.is_some_and(|node| node.is_red())
}

/// Returns `node` with the given color, sharing it when the color already matches.
fn recolor<K: Clone, V: Clone>(node: &ReferenceCounter<Node<K, V>>, color: Color) -> Link<K, V> {
    if node.color == color {
        Some(ReferenceCounter::clone(node))
    } else {
        Some(ReferenceCounter::new(node.with_color(color)))
    }
}

// =============================================================================
// RedBlackTree Definition
// =============================================================================

/// A persistent red-black tree over arbitrary keys and values.
///
/// Cloning is O(1): the clone shares the root with the original.
pub(crate) struct RedBlackTree<K, V> {
    root: Link<K, V>,
}

impl<K, V> Clone for RedBlackTree<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<K, V> RedBlackTree<K, V> {
    /// Creates an empty tree.
    pub(crate) const fn new() -> Self {
        Self { root: None }
    }

    /// Returns `true` only for the empty tree.
    pub(crate) const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Counts the entries by walking the whole tree.
    ///
    /// # Complexity
    ///
    /// O(N)
    pub(crate) fn len(&self) -> usize {
        Self::count_nodes(self.root.as_ref())
    }

    fn count_nodes(node: Option<&ReferenceCounter<Node<K, V>>>) -> usize {
        node.map_or(0, |node_ref| {
            Self::count_nodes(node_ref.left.as_ref()) + 1 + Self::count_nodes(node_ref.right.as_ref())
        })
    }

    /// Returns `true` if both trees share the same root allocation.
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (None, None) => true,
            (Some(left), Some(right)) => ReferenceCounter::ptr_eq(left, right),
            _ => false,
        }
    }

    /// Looks up the stored entry whose key compares equal to `key`.
    pub(crate) fn get_entry<C>(&self, comparator: &C, key: &K) -> Option<(&K, &V)>
    where
        C: Comparator<K> + ?Sized,
    {
        let mut current = self.root.as_ref();
        while let Some(node_ref) = current {
            match comparator.compare(key, &node_ref.key) {
                Ordering::Less => current = node_ref.left.as_ref(),
                Ordering::Greater => current = node_ref.right.as_ref(),
                Ordering::Equal => return Some((&node_ref.key, &node_ref.value)),
            }
        }
        None
    }

    /// Looks up the value stored under `key`.
    ///
    /// # Complexity
    ///
    /// O(log N)
    pub(crate) fn get<C>(&self, comparator: &C, key: &K) -> Option<&V>
    where
        C: Comparator<K> + ?Sized,
    {
        self.get_entry(comparator, key).map(|(_, value)| value)
    }

    /// Presence check built on [`get`](Self::get).
    pub(crate) fn contains_key<C>(&self, comparator: &C, key: &K) -> bool
    where
        C: Comparator<K> + ?Sized,
    {
        self.get(comparator, key).is_some()
    }

    /// Returns the entry with the smallest key.
    pub(crate) fn min(&self) -> Option<(&K, &V)> {
        Self::min_from_node(self.root.as_ref())
    }

    fn min_from_node(node: Option<&ReferenceCounter<Node<K, V>>>) -> Option<(&K, &V)> {
        node.and_then(|node_ref| {
            node_ref.left.as_ref().map_or_else(
                || Some((&node_ref.key, &node_ref.value)),
                |left| Self::min_from_node(Some(left)),
            )
        })
    }

    /// Returns the entry with the largest key.
    pub(crate) fn max(&self) -> Option<(&K, &V)> {
        Self::max_from_node(self.root.as_ref())
    }

    fn max_from_node(node: Option<&ReferenceCounter<Node<K, V>>>) -> Option<(&K, &V)> {
        node.and_then(|node_ref| {
            node_ref.right.as_ref().map_or_else(
                || Some((&node_ref.key, &node_ref.value)),
                |right| Self::max_from_node(Some(right)),
            )
        })
    }

    /// Folds over the entries in ascending key order.
    pub(crate) fn fold_left<B, F>(&self, init: B, mut function: F) -> B
    where
        F: FnMut(B, &K, &V) -> B,
    {
        Self::fold_left_node(self.root.as_ref(), init, &mut function)
    }

    fn fold_left_node<B, F>(node: Option<&ReferenceCounter<Node<K, V>>>, init: B, function: &mut F) -> B
    where
        F: FnMut(B, &K, &V) -> B,
    {
        match node {
            None => init,
            Some(node_ref) => {
                let accumulator = Self::fold_left_node(node_ref.left.as_ref(), init, function);
                let accumulator = function(accumulator, &node_ref.key, &node_ref.value);
                Self::fold_left_node(node_ref.right.as_ref(), accumulator, function)
            }
        }
    }

    /// Folds over the entries in descending key order.
    pub(crate) fn fold_right<B, F>(&self, init: B, mut function: F) -> B
    where
        F: FnMut(&K, &V, B) -> B,
    {
        Self::fold_right_node(self.root.as_ref(), init, &mut function)
    }

    fn fold_right_node<B, F>(node: Option<&ReferenceCounter<Node<K, V>>>, init: B, function: &mut F) -> B
    where
        F: FnMut(&K, &V, B) -> B,
    {
        match node {
            None => init,
            Some(node_ref) => {
                let accumulator = Self::fold_right_node(node_ref.right.as_ref(), init, function);
                let accumulator = function(&node_ref.key, &node_ref.value, accumulator);
                Self::fold_right_node(node_ref.left.as_ref(), accumulator, function)
            }
        }
    }

    /// Returns a lazy iterator over the entries in ascending key order.
    pub(crate) fn iter(&self) -> InOrder<'_, K, V> {
        InOrder::new(self.root.as_ref())
    }

    /// Returns a lazy iterator starting at the first key inside `lower`.
    pub(crate) fn iter_from<C>(&self, comparator: &C, lower: Bound<&K>) -> InOrder<'_, K, V>
    where
        C: Comparator<K> + ?Sized,
    {
        InOrder::starting_at(self.root.as_ref(), comparator, lower)
    }

    /// Linear merge-join of two ascending entry sequences.
    ///
    /// While the pending key of `self` orders before the current key of
    /// `other`, `left_step` consumes it. A key present in both trees goes
    /// through `both_step` exactly once; any other key of `other` goes through
    /// `right_step`. Once `other` is exhausted the remaining entries of `self`
    /// go through `left_step`. The accumulator therefore sees every key of
    /// either tree once, in ascending order.
    ///
    /// # Complexity
    ///
    /// O(N + M)
    pub(crate) fn merge<W, C, R, LeftStep, BothStep, RightStep>(
        &self,
        comparator: &C,
        other: &RedBlackTree<K, W>,
        mut left_step: LeftStep,
        mut both_step: BothStep,
        mut right_step: RightStep,
        init: R,
    ) -> R
    where
        C: Comparator<K> + ?Sized,
        LeftStep: FnMut(&K, &V, R) -> R,
        BothStep: FnMut(&K, &V, &W, R) -> R,
        RightStep: FnMut(&K, &W, R) -> R,
    {
        let mut pending = self.iter().peekable();
        let mut accumulator = init;

        for (right_key, right_value) in other.iter() {
            while let Some((left_key, left_value)) =
                pending.next_if(|&(left_key, _)| comparator.compare(left_key, right_key) == Ordering::Less)
            {
                accumulator = left_step(left_key, left_value, accumulator);
            }

            accumulator = match pending
                .next_if(|&(left_key, _)| comparator.compare(left_key, right_key) == Ordering::Equal)
            {
                Some((left_key, left_value)) => {
                    both_step(left_key, left_value, right_value, accumulator)
                }
                None => right_step(right_key, right_value, accumulator),
            };
        }

        pending.fold(accumulator, |accumulator, (left_key, left_value)| {
            left_step(left_key, left_value, accumulator)
        })
    }

    /// Checks ordering, coloring and black-height balance; returns the black
    /// height of the tree.
    pub(crate) fn check_invariants<C>(&self, comparator: &C) -> Result<usize, &'static str>
    where
        C: Comparator<K> + ?Sized,
    {
        if is_red(self.root.as_ref()) {
            return Err("root is red");
        }
        Self::check_node(self.root.as_ref(), comparator, None, None)
    }

    fn check_node<C>(
        node: Option<&ReferenceCounter<Node<K, V>>>,
        comparator: &C,
        lower: Option<&K>,
        upper: Option<&K>,
    ) -> Result<usize, &'static str>
    where
        C: Comparator<K> + ?Sized,
    {
        let Some(node_ref) = node else {
            return Ok(1);
        };

        if lower.is_some_and(|bound| comparator.compare(&node_ref.key, bound) != Ordering::Greater)
            || upper.is_some_and(|bound| comparator.compare(&node_ref.key, bound) != Ordering::Less)
        {
            return Err("keys are out of order");
        }
        if node_ref.is_red() && (is_red(node_ref.left.as_ref()) || is_red(node_ref.right.as_ref())) {
            return Err("red node has a red child");
        }
        if is_red(node_ref.right.as_ref()) {
            return Err("red link leans right");
        }

        let left_height =
            Self::check_node(node_ref.left.as_ref(), comparator, lower, Some(&node_ref.key))?;
        let right_height =
            Self::check_node(node_ref.right.as_ref(), comparator, Some(&node_ref.key), upper)?;
        if left_height != right_height {
            return Err("black height differs between subtrees");
        }

        Ok(left_height + usize::from(!node_ref.is_red()))
    }
}

impl<K: Clone, V> RedBlackTree<K, V> {
    /// Transforms every value, keeping shape, colors and keys.
    ///
    /// Keys do not change, so no rebalancing is needed. Values are visited
    /// in ascending key order.
    pub(crate) fn map_values<W, F>(&self, mut transform: F) -> RedBlackTree<K, W>
    where
        F: FnMut(&K, &V) -> W,
    {
        RedBlackTree {
            root: Self::map_node(self.root.as_ref(), &mut transform),
        }
    }

    fn map_node<W, F>(node: Option<&ReferenceCounter<Node<K, V>>>, transform: &mut F) -> Link<K, W>
    where
        F: FnMut(&K, &V) -> W,
    {
        node.map(|node_ref| {
            let left = Self::map_node(node_ref.left.as_ref(), transform);
            let value = transform(&node_ref.key, &node_ref.value);
            let right = Self::map_node(node_ref.right.as_ref(), transform);
            ReferenceCounter::new(Node::new(node_ref.color, node_ref.key.clone(), value, left, right))
        })
    }
}

impl<K: Clone, V: Clone> RedBlackTree<K, V> {
    /// Builds a tree by inserting every entry in order.
    ///
    /// Later duplicates overwrite the values of earlier ones.
    pub(crate) fn from_iter_by<C, I>(comparator: &C, entries: I) -> Self
    where
        C: Comparator<K> + ?Sized,
        I: IntoIterator<Item = (K, V)>,
    {
        entries
            .into_iter()
            .fold(Self::new(), |tree, (key, value)| tree.insert(comparator, key, value))
    }

    /// Collects the entries in ascending key order.
    pub(crate) fn to_vec(&self) -> Vec<(K, V)> {
        let mut entries = self.fold_right(Vec::new(), |key, value, mut entries| {
            entries.push((key.clone(), value.clone()));
            entries
        });
        entries.reverse();
        entries
    }

    // -------------------------------------------------------------------------
    // Insertion
    // -------------------------------------------------------------------------

    /// Inserts `key` with `value`.
    ///
    /// An existing entry whose key compares equal keeps its stored key, color
    /// and position; only the value is replaced.
    ///
    /// # Complexity
    ///
    /// O(log N)
    pub(crate) fn insert<C>(&self, comparator: &C, key: K, value: V) -> Self
    where
        C: Comparator<K> + ?Sized,
    {
        Self {
            root: Self::blacken(Self::insert_into_node(
                self.root.as_ref(),
                comparator,
                key,
                value,
            )),
        }
    }

    fn insert_into_node<C>(
        node: Option<&ReferenceCounter<Node<K, V>>>,
        comparator: &C,
        key: K,
        value: V,
    ) -> Link<K, V>
    where
        C: Comparator<K> + ?Sized,
    {
        let Some(node_ref) = node else {
            return Node::link(Color::Red, key, value, None, None);
        };

        match comparator.compare(&key, &node_ref.key) {
            Ordering::Less => {
                let new_left = Self::insert_into_node(node_ref.left.as_ref(), comparator, key, value);
                Self::balance(
                    node_ref.color,
                    node_ref.key.clone(),
                    node_ref.value.clone(),
                    new_left,
                    node_ref.right.clone(),
                )
            }
            Ordering::Greater => {
                let new_right =
                    Self::insert_into_node(node_ref.right.as_ref(), comparator, key, value);
                Self::balance(
                    node_ref.color,
                    node_ref.key.clone(),
                    node_ref.value.clone(),
                    node_ref.left.clone(),
                    new_right,
                )
            }
            Ordering::Equal => Node::link(
                node_ref.color,
                node_ref.key.clone(),
                value,
                node_ref.left.clone(),
                node_ref.right.clone(),
            ),
        }
    }

    /// Forces the root black.
    fn blacken(root: Link<K, V>) -> Link<K, V> {
        root.map(|node| {
            if node.is_red() {
                ReferenceCounter::new(node.with_color(Color::Black))
            } else {
                node
            }
        })
    }

    /// Rebuilds a node from its parts, repairing a red-red violation or a
    /// right-leaning red link introduced directly below it.
    ///
    /// Each case is O(1):
    /// - both children red: flip colors, pushing redness up
    /// - only the right child red: rotate left
    /// - red left child with a red left grandchild: rotate right and recolor
    fn balance(color: Color, key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Link<K, V> {
        if let Some(right_node) = right.as_ref().filter(|node| node.is_red()) {
            return if let Some(left_node) = left.as_ref().filter(|node| node.is_red()) {
                Node::link(
                    Color::Red,
                    key,
                    value,
                    recolor(left_node, Color::Black),
                    recolor(right_node, Color::Black),
                )
            } else {
                Node::link(
                    color,
                    right_node.key.clone(),
                    right_node.value.clone(),
                    Node::link(Color::Red, key, value, left, right_node.left.clone()),
                    right_node.right.clone(),
                )
            };
        }

        if let Some(left_node) = left.as_ref().filter(|node| node.is_red())
            && let Some(left_left) = left_node.left.as_ref().filter(|node| node.is_red())
        {
            return Node::link(
                Color::Red,
                left_node.key.clone(),
                left_node.value.clone(),
                recolor(left_left, Color::Black),
                Node::link(Color::Black, key, value, left_node.right.clone(), right),
            );
        }

        Node::link(color, key, value, left, right)
    }

    // -------------------------------------------------------------------------
    // Deletion
    // -------------------------------------------------------------------------

    /// Removes the entry stored under `key`.
    ///
    /// Removing an absent key returns a tree sharing the original root.
    ///
    /// # Complexity
    ///
    /// O(log N)
    pub(crate) fn remove<C>(&self, comparator: &C, key: &K) -> Self
    where
        C: Comparator<K> + ?Sized,
    {
        if !self.contains_key(comparator, key) {
            return self.clone();
        }

        Self {
            root: Self::blacken(Self::remove_from_node(self.root.as_ref(), comparator, key)),
        }
    }

    fn remove_from_node<C>(
        node: Option<&ReferenceCounter<Node<K, V>>>,
        comparator: &C,
        key: &K,
    ) -> Link<K, V>
    where
        C: Comparator<K> + ?Sized,
    {
        let node_ref = node?;

        if comparator.compare(key, &node_ref.key) != Ordering::Less {
            return Self::remove_here_or_right(Self::lean_right(node_ref), comparator, key);
        }

        match node_ref.left.as_ref() {
            Some(left) if !left.is_red() && !is_red(left.left.as_ref()) => {
                let Node {
                    color,
                    key: moved_key,
                    value,
                    left: moved_left,
                    right: moved_right,
                } = Self::move_red_left(node_ref);
                Self::balance(
                    color,
                    moved_key,
                    value,
                    Self::remove_from_node(moved_left.as_ref(), comparator, key),
                    moved_right,
                )
            }
            _ => Node::link(
                node_ref.color,
                node_ref.key.clone(),
                node_ref.value.clone(),
                Self::remove_from_node(node_ref.left.as_ref(), comparator, key),
                node_ref.right.clone(),
            ),
        }
    }

    /// Prepares a node for a removal at or to the right of its key: a red
    /// left link is rotated to the right, otherwise redness is moved into a
    /// right child that would be a lone black node.
    fn lean_right(node: &ReferenceCounter<Node<K, V>>) -> Node<K, V> {
        if let Some(left) = node.left.as_ref().filter(|left| left.is_red()) {
            return Node::new(
                node.color,
                left.key.clone(),
                left.value.clone(),
                left.left.clone(),
                Node::link(
                    Color::Red,
                    node.key.clone(),
                    node.value.clone(),
                    left.right.clone(),
                    node.right.clone(),
                ),
            );
        }

        match node.right.as_ref() {
            Some(right) if !right.is_red() && !is_red(right.left.as_ref()) => Self::move_red_right(node),
            _ => (**node).clone(),
        }
    }

    fn remove_here_or_right<C>(node: Node<K, V>, comparator: &C, key: &K) -> Link<K, V>
    where
        C: Comparator<K> + ?Sized,
    {
        let Node {
            color,
            key: node_key,
            value,
            left,
            right,
        } = node;

        if comparator.compare(key, &node_key) != Ordering::Equal {
            return Self::balance(
                color,
                node_key,
                value,
                left,
                Self::remove_from_node(right.as_ref(), comparator, key),
            );
        }

        // Without a right subtree the node is a leaf here: its left side was
        // either rotated away by `lean_right` or is empty.
        let (successor_key, successor_value) = match Self::min_from_node(right.as_ref()) {
            Some((successor_key, successor_value)) => (successor_key.clone(), successor_value.clone()),
            None => return None,
        };

        Self::balance(
            color,
            successor_key,
            successor_value,
            left,
            Self::remove_min_from_node(right.as_ref()),
        )
    }

    /// Splices out the leftmost node of a subtree.
    fn remove_min_from_node(node: Option<&ReferenceCounter<Node<K, V>>>) -> Link<K, V> {
        let node_ref = node?;

        match node_ref.left.as_ref() {
            None => None,
            Some(left) if !left.is_red() && !is_red(left.left.as_ref()) => {
                let Node {
                    color,
                    key,
                    value,
                    left: moved_left,
                    right: moved_right,
                } = Self::move_red_left(node_ref);
                Self::balance(
                    color,
                    key,
                    value,
                    Self::remove_min_from_node(moved_left.as_ref()),
                    moved_right,
                )
            }
            Some(_) => Node::link(
                node_ref.color,
                node_ref.key.clone(),
                node_ref.value.clone(),
                Self::remove_min_from_node(node_ref.left.as_ref()),
                node_ref.right.clone(),
            ),
        }
    }

    /// Makes the left child (or one of its children) red.
    ///
    /// Borrows from the right sibling when its left child is red, otherwise
    /// flips colors with the parent.
    fn move_red_left(node: &ReferenceCounter<Node<K, V>>) -> Node<K, V> {
        let (Some(left), Some(right)) = (node.left.as_ref(), node.right.as_ref()) else {
            unreachable!("red-black tree: move_red_left on a node without two children")
        };

        if let Some(right_left) = right.left.as_ref().filter(|node| node.is_red()) {
            Node::new(
                Color::Red,
                right_left.key.clone(),
                right_left.value.clone(),
                Node::link(
                    Color::Black,
                    node.key.clone(),
                    node.value.clone(),
                    recolor(left, Color::Red),
                    right_left.left.clone(),
                ),
                Node::link(
                    Color::Black,
                    right.key.clone(),
                    right.value.clone(),
                    right_left.right.clone(),
                    right.right.clone(),
                ),
            )
        } else {
            Node::new(
                Color::Black,
                node.key.clone(),
                node.value.clone(),
                recolor(left, Color::Red),
                recolor(right, Color::Red),
            )
        }
    }

    /// Makes the right child (or one of its children) red.
    ///
    /// Borrows from the left sibling when its left child is red, otherwise
    /// flips colors with the parent.
    fn move_red_right(node: &ReferenceCounter<Node<K, V>>) -> Node<K, V> {
        let (Some(left), Some(right)) = (node.left.as_ref(), node.right.as_ref()) else {
            unreachable!("red-black tree: move_red_right on a node without two children")
        };

        if let Some(left_left) = left.left.as_ref().filter(|node| node.is_red()) {
            Node::new(
                Color::Red,
                left.key.clone(),
                left.value.clone(),
                recolor(left_left, Color::Black),
                Node::link(
                    Color::Black,
                    node.key.clone(),
                    node.value.clone(),
                    left.right.clone(),
                    recolor(right, Color::Red),
                ),
            )
        } else {
            Node::new(
                Color::Black,
                node.key.clone(),
                node.value.clone(),
                recolor(left, Color::Red),
                recolor(right, Color::Red),
            )
        }
    }

    // -------------------------------------------------------------------------
    // Derived operations
    // -------------------------------------------------------------------------

    /// Looks up `key`, applies `updater` to the current value and stores the
    /// outcome.
    ///
    /// Returns a tree sharing the original root when nothing changes: the key
    /// stays absent, or the new value equals the current one.
    pub(crate) fn update<C, F>(&self, comparator: &C, key: K, updater: F) -> Self
    where
        C: Comparator<K> + ?Sized,
        F: FnOnce(Option<&V>) -> Option<V>,
        V: PartialEq,
    {
        let current = self.get(comparator, &key);
        match (current, updater(current)) {
            (Some(current_value), Some(new_value)) if *current_value == new_value => self.clone(),
            (_, Some(new_value)) => self.insert(comparator, key, new_value),
            (Some(_), None) => self.remove(comparator, &key),
            (None, None) => self.clone(),
        }
    }

    /// Keeps the entries satisfying `predicate`.
    pub(crate) fn filter<C, P>(&self, comparator: &C, mut predicate: P) -> Self
    where
        C: Comparator<K> + ?Sized,
        P: FnMut(&K, &V) -> bool,
    {
        self.fold_left(Self::new(), |kept, key, value| {
            if predicate(key, value) {
                kept.insert(comparator, key.clone(), value.clone())
            } else {
                kept
            }
        })
    }

    /// Splits the entries into those satisfying `predicate` and the rest.
    pub(crate) fn partition<C, P>(&self, comparator: &C, mut predicate: P) -> (Self, Self)
    where
        C: Comparator<K> + ?Sized,
        P: FnMut(&K, &V) -> bool,
    {
        self.fold_left(
            (Self::new(), Self::new()),
            |(matching, not_matching), key, value| {
                if predicate(key, value) {
                    (matching.insert(comparator, key.clone(), value.clone()), not_matching)
                } else {
                    (matching, not_matching.insert(comparator, key.clone(), value.clone()))
                }
            },
        )
    }

    /// Adds the entries of `other` whose keys are absent from `self`.
    ///
    /// On a shared key both the stored key and the value of `self` survive.
    pub(crate) fn union<C>(&self, comparator: &C, other: &Self) -> Self
    where
        C: Comparator<K> + ?Sized,
    {
        other.fold_left(self.clone(), |merged, key, value| {
            if merged.contains_key(comparator, key) {
                merged
            } else {
                merged.insert(comparator, key.clone(), value.clone())
            }
        })
    }

    /// Keeps the entries of `self` whose keys are present in `other`.
    pub(crate) fn intersection<C, W>(&self, comparator: &C, other: &RedBlackTree<K, W>) -> Self
    where
        C: Comparator<K> + ?Sized,
    {
        self.filter(comparator, |key, _| other.contains_key(comparator, key))
    }

    /// Removes every key of `other` from `self`.
    pub(crate) fn difference<C, W>(&self, comparator: &C, other: &RedBlackTree<K, W>) -> Self
    where
        C: Comparator<K> + ?Sized,
    {
        other.fold_left(self.clone(), |remaining, key, _| remaining.remove(comparator, key))
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// Inline capacity of the traversal stack; covers trees of several million entries.
const STACK_INLINE_CAPACITY: usize = 48;

/// Lazy in-order traversal driven by an explicit stack of pending ancestors.
pub(crate) struct InOrder<'a, K, V> {
    stack: SmallVec<[&'a Node<K, V>; STACK_INLINE_CAPACITY]>,
}

impl<'a, K, V> InOrder<'a, K, V> {
    fn new(root: Option<&'a ReferenceCounter<Node<K, V>>>) -> Self {
        let mut iterator = Self {
            stack: SmallVec::new(),
        };
        iterator.push_left_spine(root);
        iterator
    }

    /// Seeds the stack with the path to the first key inside `lower`.
    fn starting_at<C>(
        root: Option<&'a ReferenceCounter<Node<K, V>>>,
        comparator: &C,
        lower: Bound<&K>,
    ) -> Self
    where
        C: Comparator<K> + ?Sized,
    {
        let mut iterator = Self {
            stack: SmallVec::new(),
        };
        let mut current = root;
        while let Some(node_ref) = current {
            let inside = match lower {
                Bound::Included(bound) => comparator.compare(&node_ref.key, bound) != Ordering::Less,
                Bound::Excluded(bound) => {
                    comparator.compare(&node_ref.key, bound) == Ordering::Greater
                }
                Bound::Unbounded => true,
            };
            if inside {
                let node: &'a Node<K, V> = node_ref;
                iterator.stack.push(node);
                current = node_ref.left.as_ref();
            } else {
                current = node_ref.right.as_ref();
            }
        }
        iterator
    }

    fn push_left_spine(&mut self, mut current: Option<&'a ReferenceCounter<Node<K, V>>>) {
        while let Some(node_ref) = current {
            let node: &'a Node<K, V> = node_ref;
            self.stack.push(node);
            current = node_ref.left.as_ref();
        }
    }

    /// Drops every pending entry.
    pub(crate) fn clear(&mut self) {
        self.stack.clear();
    }
}

impl<'a, K, V> Iterator for InOrder<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left_spine(node.right.as_ref());
        Some((&node.key, &node.value))
    }
}

impl<K, V> std::iter::FusedIterator for InOrder<'_, K, V> {}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::{NaturalOrder, Reversed};
    use rstest::rstest;

    fn tree_of(keys: impl IntoIterator<Item = i32>) -> RedBlackTree<i32, i32> {
        RedBlackTree::from_iter_by(&NaturalOrder, keys.into_iter().map(|key| (key, key * 10)))
    }

    fn keys_of(tree: &RedBlackTree<i32, i32>) -> Vec<i32> {
        tree.iter().map(|(key, _)| *key).collect()
    }

    /// Deterministic pseudo-random permutation of `0..size`.
    fn scrambled(size: i32) -> Vec<i32> {
        (0..size).map(|index| (index * 7919) % size).collect()
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    #[rstest]
    fn test_empty_tree_is_valid() {
        let tree: RedBlackTree<i32, i32> = RedBlackTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.check_invariants(&NaturalOrder), Ok(1));
    }

    #[rstest]
    fn test_three_ascending_inserts_rebalance_to_black_root() {
        let tree = tree_of([1, 2, 3]);
        let root = tree.root.as_ref().map(|node| (node.key, node.color));
        assert_eq!(root, Some((2, Color::Black)));
        assert_eq!(tree.check_invariants(&NaturalOrder), Ok(3));
    }

    #[rstest]
    #[case::ascending((0..200).collect())]
    #[case::descending((0..200).rev().collect())]
    #[case::scrambled(scrambled(211))]
    fn test_insert_keeps_invariants(#[case] keys: Vec<i32>) {
        let mut tree = RedBlackTree::new();
        for key in keys {
            tree = tree.insert(&NaturalOrder, key, key);
            assert!(tree.check_invariants(&NaturalOrder).is_ok());
        }
    }

    #[rstest]
    fn test_insert_equal_key_keeps_stored_key_and_shape() {
        let by_length = |left: &String, right: &String| left.len().cmp(&right.len());
        let tree = RedBlackTree::new()
            .insert(&by_length, "aa".to_string(), 1)
            .insert(&by_length, "b".to_string(), 2)
            .insert(&by_length, "zz".to_string(), 3);

        assert_eq!(tree.len(), 2);
        assert_eq!(
            tree.get_entry(&by_length, &"xx".to_string()),
            Some((&"aa".to_string(), &3))
        );
    }

    #[rstest]
    fn test_insert_shares_untouched_subtrees() {
        let tree = tree_of(0..64);
        let updated = tree.insert(&NaturalOrder, 63, 0);
        let original_left = tree.root.as_ref().and_then(|node| node.left.clone());
        let updated_left = updated.root.as_ref().and_then(|node| node.left.clone());
        match (original_left, updated_left) {
            (Some(original), Some(updated)) => assert!(ReferenceCounter::ptr_eq(&original, &updated)),
            _ => panic!("both trees should have a left subtree"),
        }
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    #[rstest]
    #[case::from_front((0..128).collect())]
    #[case::from_back((0..128).rev().collect())]
    #[case::scrambled(scrambled(128))]
    fn test_remove_keeps_invariants(#[case] removal_order: Vec<i32>) {
        let mut tree = tree_of(0..128);
        let mut expected: Vec<i32> = (0..128).collect();
        for key in removal_order {
            tree = tree.remove(&NaturalOrder, &key);
            expected.retain(|existing| *existing != key);
            assert!(tree.check_invariants(&NaturalOrder).is_ok(), "after removing {key}");
            assert_eq!(keys_of(&tree), expected);
        }
        assert!(tree.is_empty());
    }

    #[rstest]
    fn test_remove_absent_key_shares_root() {
        let tree = tree_of(0..10);
        let unchanged = tree.remove(&NaturalOrder, &42);
        assert!(unchanged.ptr_eq(&tree));
    }

    #[rstest]
    fn test_remove_node_with_two_children_uses_successor() {
        let tree = tree_of([1, 2, 3]);
        let removed = tree.remove(&NaturalOrder, &2);
        assert_eq!(keys_of(&removed), vec![1, 3]);
        assert!(removed.check_invariants(&NaturalOrder).is_ok());
        assert_eq!(tree.len(), 3);
    }

    #[rstest]
    fn test_interleaved_insert_and_remove_keep_invariants() {
        let mut tree = RedBlackTree::new();
        for step in 0..600 {
            let key = (step * 37) % 101;
            tree = if step % 3 == 2 {
                tree.remove(&NaturalOrder, &key)
            } else {
                tree.insert(&NaturalOrder, key, step)
            };
            assert!(tree.check_invariants(&NaturalOrder).is_ok(), "at step {step}");
        }
    }

    #[rstest]
    fn test_custom_comparator_orders_tree() {
        let descending = Reversed(NaturalOrder);
        let tree = RedBlackTree::from_iter_by(&descending, (0..50).map(|key| (key, ())));
        assert!(tree.check_invariants(&descending).is_ok());
        let keys: Vec<i32> = tree.iter().map(|(key, _)| *key).collect();
        assert_eq!(keys, (0..50).rev().collect::<Vec<_>>());
        let removed = tree.remove(&descending, &25);
        assert!(removed.check_invariants(&descending).is_ok());
        assert!(!removed.contains_key(&descending, &25));
    }

    // =========================================================================
    // Update
    // =========================================================================

    #[rstest]
    fn test_update_unchanged_value_shares_root() {
        let tree = tree_of(0..10);
        let updated = tree.update(&NaturalOrder, 3, |value| value.copied());
        assert!(updated.ptr_eq(&tree));
    }

    #[rstest]
    fn test_update_absent_to_absent_shares_root() {
        let tree = tree_of(0..10);
        let updated = tree.update(&NaturalOrder, 99, |_| None);
        assert!(updated.ptr_eq(&tree));
    }

    #[rstest]
    fn test_update_inserts_changes_and_removes() {
        let tree = tree_of(0..5);
        let inserted = tree.update(&NaturalOrder, 7, |value| {
            assert_eq!(value, None);
            Some(70)
        });
        let changed = inserted.update(&NaturalOrder, 2, |value| value.map(|value| value + 1));
        let removed = changed.update(&NaturalOrder, 0, |_| None);

        assert_eq!(inserted.get(&NaturalOrder, &7), Some(&70));
        assert_eq!(changed.get(&NaturalOrder, &2), Some(&21));
        assert_eq!(removed.get(&NaturalOrder, &0), None);
        assert_eq!(keys_of(&removed), vec![1, 2, 3, 4, 7]);
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    #[rstest]
    fn test_folds_visit_in_opposite_orders() {
        let tree = tree_of([3, 1, 2]);
        let ascending = tree.fold_left(Vec::new(), |mut keys, key, _| {
            keys.push(*key);
            keys
        });
        let descending = tree.fold_right(Vec::new(), |key, _, mut keys| {
            keys.push(*key);
            keys
        });
        assert_eq!(ascending, vec![1, 2, 3]);
        assert_eq!(descending, vec![3, 2, 1]);
    }

    #[rstest]
    #[case(Bound::Included(&4), vec![4, 6, 8])]
    #[case(Bound::Excluded(&4), vec![6, 8])]
    #[case(Bound::Included(&5), vec![6, 8])]
    #[case(Bound::Unbounded, vec![0, 2, 4, 6, 8])]
    #[case(Bound::Excluded(&8), vec![])]
    fn test_iter_from_lower_bound(#[case] lower: Bound<&i32>, #[case] expected: Vec<i32>) {
        let tree = tree_of([0, 2, 4, 6, 8]);
        let keys: Vec<i32> = tree.iter_from(&NaturalOrder, lower).map(|(key, _)| *key).collect();
        assert_eq!(keys, expected);
    }

    #[rstest]
    fn test_map_values_preserves_shape() {
        let tree = tree_of(0..20);
        let mapped = tree.map_values(|key, value| format!("{key}:{value}"));
        assert_eq!(mapped.check_invariants(&NaturalOrder), tree.check_invariants(&NaturalOrder));
        assert_eq!(mapped.get(&NaturalOrder, &3), Some(&"3:30".to_string()));
    }

    // =========================================================================
    // Combination
    // =========================================================================

    #[rstest]
    fn test_merge_visits_every_key_once_in_order() {
        let left = tree_of([1, 3, 5, 7]);
        let right: RedBlackTree<i32, &str> =
            RedBlackTree::from_iter_by(&NaturalOrder, [(2, "b"), (3, "c"), (8, "h")]);

        let visited = left.merge(
            &NaturalOrder,
            &right,
            |key, _, mut log: Vec<String>| {
                log.push(format!("L{key}"));
                log
            },
            |key, _, _, mut log| {
                log.push(format!("B{key}"));
                log
            },
            |key, _, mut log| {
                log.push(format!("R{key}"));
                log
            },
            Vec::new(),
        );

        assert_eq!(visited, vec!["L1", "R2", "B3", "L5", "L7", "R8"]);
    }

    #[rstest]
    fn test_union_prefers_left_values() {
        let left = RedBlackTree::from_iter_by(&NaturalOrder, [(1, "a"), (2, "b")]);
        let right = RedBlackTree::from_iter_by(&NaturalOrder, [(2, "x"), (3, "y")]);
        let merged = left.union(&NaturalOrder, &right);
        assert_eq!(merged.to_vec(), vec![(1, "a"), (2, "b"), (3, "y")]);
        assert!(merged.check_invariants(&NaturalOrder).is_ok());
    }

    #[rstest]
    fn test_intersection_and_difference() {
        let left = tree_of(0..10);
        let right = tree_of((5..15).rev());
        assert_eq!(keys_of(&left.intersection(&NaturalOrder, &right)), vec![5, 6, 7, 8, 9]);
        assert_eq!(keys_of(&left.difference(&NaturalOrder, &right)), vec![0, 1, 2, 3, 4]);
    }

    #[rstest]
    fn test_partition_splits_by_predicate() {
        let tree = tree_of(0..10);
        let (even, odd) = tree.partition(&NaturalOrder, |key, _| key % 2 == 0);
        assert_eq!(keys_of(&even), vec![0, 2, 4, 6, 8]);
        assert_eq!(keys_of(&odd), vec![1, 3, 5, 7, 9]);
        assert!(even.check_invariants(&NaturalOrder).is_ok());
        assert!(odd.check_invariants(&NaturalOrder).is_ok());
    }

    // =========================================================================
    // Invariant checker
    // =========================================================================

    #[rstest]
    fn test_check_invariants_rejects_red_root() {
        let tree = RedBlackTree {
            root: Node::link(Color::Red, 1, 1, None, None),
        };
        assert_eq!(tree.check_invariants(&NaturalOrder), Err("root is red"));
    }

    #[rstest]
    fn test_check_invariants_rejects_unbalanced_black_height() {
        let tree = RedBlackTree {
            root: Node::link(
                Color::Black,
                2,
                2,
                Node::link(Color::Black, 1, 1, None, None),
                None,
            ),
        };
        assert_eq!(
            tree.check_invariants(&NaturalOrder),
            Err("black height differs between subtrees")
        );
    }

    #[rstest]
    fn test_check_invariants_rejects_disordered_keys() {
        let tree = RedBlackTree {
            root: Node::link(
                Color::Black,
                2,
                2,
                Node::link(Color::Red, 3, 3, None, None),
                None,
            ),
        };
        assert_eq!(tree.check_invariants(&NaturalOrder), Err("keys are out of order"));
    }
}
