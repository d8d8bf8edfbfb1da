//! Compact character-sequence counting trie.
//!
//! [`CharSeqCounter`] owns a trie of substring counts over UTF-16 code units
//! (`u16`), bounded to a maximum tracked substring length. Nodes are a single
//! tagged enum, [`Node`], whose variants encode the branching shape: terminal,
//! one/two/three inline daughters, a sorted parallel-array shape for wider
//! fan-out, and a PATRICIA-style run that collapses a non-branching chain of
//! equal-count nodes into one value.
//!
//! Nodes are immutable values: every mutation consumes the affected subtree
//! and splices a freshly assembled replacement into its parent, so ownership
//! stays strictly tree-shaped and shape transitions (terminal to run to
//! branching, growing daughter arrays) happen in one place, the
//! [`Node::assemble`] factory.
//!
//! Counts are capped at `2^63 - 1` so they survive signed interchange
//! formats.

use std::collections::{BTreeMap, BinaryHeap};
use std::cmp::Reverse;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trie_codec::{TrieReader, TrieWriter};

/// Result type alias for counter operations.
pub type Result<T> = std::result::Result<T, TrieError>;

/// Largest representable node count.
pub const MAX_COUNT: u64 = i64::MAX as u64;

/// Errors arising from trie mutation and (de)serialization.
#[derive(Error, Debug)]
pub enum TrieError {
    /// Increment and decrement amounts must be positive.
    #[error("count amounts must be positive")]
    ZeroAmount,

    /// A count would exceed [`MAX_COUNT`].
    #[error("count overflow past 2^63 - 1")]
    CountOverflow,

    /// Attempt to decrement a sequence that was never counted.
    #[error("cannot decrement a sequence with no count")]
    MissingSequence,

    /// Attempt to decrement a count below zero.
    #[error("decrement would drive a count negative")]
    NegativeCount,

    /// A serialized symbol does not fit the u16 character domain.
    #[error("symbol {0} outside the character range")]
    SymbolRange(u64),

    /// Failure in the underlying trie stream.
    #[error(transparent)]
    Codec(#[from] trie_codec::CodecError),
}

/// Branching shape of a node, for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeShape {
    Terminal,
    Run,
    One,
    Two,
    Three,
    Array,
}

/// Width class of the smallest signed integer type holding a count, for
/// diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CountWidth {
    Byte,
    Short,
    Int,
    Long,
}

impl CountWidth {
    pub fn of(count: u64) -> CountWidth {
        if count <= i8::MAX as u64 {
            CountWidth::Byte
        } else if count <= i16::MAX as u64 {
            CountWidth::Short
        } else if count <= i32::MAX as u64 {
            CountWidth::Int
        } else {
            CountWidth::Long
        }
    }
}

/// One trie node: a non-negative count for the string spelled by the path
/// from the root, plus daughters sorted by character code.
///
/// `Run` holds a chain of trailing characters with no branching where every
/// implicit node shares this node's count; the chain ends terminal, so no
/// information is lost by the compression.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Terminal {
        count: u64,
    },
    Run {
        count: u64,
        #[serde(deserialize_with = "non_empty_run")]
        run: Vec<u16>,
    },
    One {
        count: u64,
        ch: u16,
        dtr: Box<Node>,
    },
    Two {
        count: u64,
        ch1: u16,
        ch2: u16,
        dtr1: Box<Node>,
        dtr2: Box<Node>,
    },
    Three {
        count: u64,
        ch1: u16,
        ch2: u16,
        ch3: u16,
        dtr1: Box<Node>,
        dtr2: Box<Node>,
        dtr3: Box<Node>,
    },
    Array {
        count: u64,
        chars: Vec<u16>,
        dtrs: Vec<Node>,
        /// Sum of daughter counts, maintained at construction so extension
        /// lookups on wide nodes need no re-summation.
        dtr_sum: u64,
    },
}

/// A run spells at least one character; an empty run would be a node with a
/// phantom daughter.
fn non_empty_run<'de, D>(deserializer: D) -> std::result::Result<Vec<u16>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let run = Vec::deserialize(deserializer)?;
    if run.is_empty() {
        return Err(serde::de::Error::invalid_length(
            0,
            &"at least one run character",
        ));
    }
    Ok(run)
}

/// Borrowed view of a node, materializing the implicit tail nodes of a run
/// without allocating them.
#[derive(Clone, Copy, Debug)]
enum View<'a> {
    Real(&'a Node),
    Tail { count: u64, run: &'a [u16] },
}

impl<'a> View<'a> {
    fn count(self) -> u64 {
        match self {
            View::Real(node) => node.count(),
            View::Tail { count, .. } => count,
        }
    }

    /// Daughters in ascending character order.
    fn daughters(self) -> Vec<(u16, View<'a>)> {
        match self {
            View::Real(node) => match node {
                Node::Terminal { .. } => Vec::new(),
                Node::Run { count, run } => vec![(
                    run[0],
                    View::Tail {
                        count: *count,
                        run: &run[1..],
                    },
                )],
                Node::One { ch, dtr, .. } => vec![(*ch, View::Real(dtr))],
                Node::Two {
                    ch1,
                    ch2,
                    dtr1,
                    dtr2,
                    ..
                } => vec![(*ch1, View::Real(dtr1)), (*ch2, View::Real(dtr2))],
                Node::Three {
                    ch1,
                    ch2,
                    ch3,
                    dtr1,
                    dtr2,
                    dtr3,
                    ..
                } => vec![
                    (*ch1, View::Real(dtr1)),
                    (*ch2, View::Real(dtr2)),
                    (*ch3, View::Real(dtr3)),
                ],
                Node::Array { chars, dtrs, .. } => chars
                    .iter()
                    .zip(dtrs.iter())
                    .map(|(&ch, dtr)| (ch, View::Real(dtr)))
                    .collect(),
            },
            View::Tail { count, run } => {
                if run.is_empty() {
                    Vec::new()
                } else {
                    vec![(
                        run[0],
                        View::Tail {
                            count,
                            run: &run[1..],
                        },
                    )]
                }
            }
        }
    }

    fn daughter(self, target: u16) -> Option<View<'a>> {
        match self {
            View::Real(node) => match node {
                Node::Terminal { .. } => None,
                Node::Run { count, run } => (run[0] == target).then(|| View::Tail {
                    count: *count,
                    run: &run[1..],
                }),
                Node::One { ch, dtr, .. } => (*ch == target).then(|| View::Real(dtr)),
                Node::Two {
                    ch1,
                    ch2,
                    dtr1,
                    dtr2,
                    ..
                } => {
                    if *ch1 == target {
                        Some(View::Real(dtr1))
                    } else if *ch2 == target {
                        Some(View::Real(dtr2))
                    } else {
                        None
                    }
                }
                Node::Three {
                    ch1,
                    ch2,
                    ch3,
                    dtr1,
                    dtr2,
                    dtr3,
                    ..
                } => {
                    if *ch1 == target {
                        Some(View::Real(dtr1))
                    } else if *ch2 == target {
                        Some(View::Real(dtr2))
                    } else if *ch3 == target {
                        Some(View::Real(dtr3))
                    } else {
                        None
                    }
                }
                Node::Array { chars, dtrs, .. } => chars
                    .binary_search(&target)
                    .ok()
                    .map(|i| View::Real(&dtrs[i])),
            },
            View::Tail { count, run } => run.split_first().and_then(|(&first, rest)| {
                (first == target).then_some(View::Tail { count, run: rest })
            }),
        }
    }

    /// Walk a character path from this node.
    fn descend(self, path: &[u16]) -> Option<View<'a>> {
        let mut view = self;
        for &ch in path {
            view = view.daughter(ch)?;
        }
        Some(view)
    }

    /// Sum of daughter counts.
    fn extension_count(self) -> u64 {
        match self {
            View::Real(Node::Array { dtr_sum, .. }) => *dtr_sum,
            View::Real(Node::Run { count, .. }) => *count,
            View::Tail { count, run } => {
                if run.is_empty() {
                    0
                } else {
                    count
                }
            }
            other => other.daughters().iter().map(|(_, d)| d.count()).sum(),
        }
    }

    /// Depth-first visit of every (path, count) pair down to `max_depth`.
    fn visit(self, path: &mut Vec<u16>, max_depth: usize, f: &mut impl FnMut(&[u16], u64)) {
        f(path, self.count());
        if path.len() == max_depth {
            return;
        }
        for (ch, dtr) in self.daughters() {
            path.push(ch);
            dtr.visit(path, max_depth, f);
            path.pop();
        }
    }
}

impl Node {
    /// A daughterless node. Terminals are tiny by-value constants, so no
    /// pooling or sharing is needed.
    pub const fn terminal(count: u64) -> Node {
        Node::Terminal { count }
    }

    /// This node's own count.
    pub fn count(&self) -> u64 {
        match self {
            Node::Terminal { count }
            | Node::Run { count, .. }
            | Node::One { count, .. }
            | Node::Two { count, .. }
            | Node::Three { count, .. }
            | Node::Array { count, .. } => *count,
        }
    }

    pub fn shape(&self) -> NodeShape {
        match self {
            Node::Terminal { .. } => NodeShape::Terminal,
            Node::Run { .. } => NodeShape::Run,
            Node::One { .. } => NodeShape::One,
            Node::Two { .. } => NodeShape::Two,
            Node::Three { .. } => NodeShape::Three,
            Node::Array { .. } => NodeShape::Array,
        }
    }

    pub fn width(&self) -> CountWidth {
        CountWidth::of(self.count())
    }

    /// Decompose into count and owned daughters, materializing one level of
    /// a run chain.
    fn into_parts(self) -> (u64, Vec<(u16, Node)>) {
        match self {
            Node::Terminal { count } => (count, Vec::new()),
            Node::Run { count, run } => {
                let tail = if run.len() == 1 {
                    Node::terminal(count)
                } else {
                    Node::Run {
                        count,
                        run: run[1..].to_vec(),
                    }
                };
                (count, vec![(run[0], tail)])
            }
            Node::One { count, ch, dtr } => (count, vec![(ch, *dtr)]),
            Node::Two {
                count,
                ch1,
                ch2,
                dtr1,
                dtr2,
            } => (count, vec![(ch1, *dtr1), (ch2, *dtr2)]),
            Node::Three {
                count,
                ch1,
                ch2,
                ch3,
                dtr1,
                dtr2,
                dtr3,
            } => (count, vec![(ch1, *dtr1), (ch2, *dtr2), (ch3, *dtr3)]),
            Node::Array {
                count, chars, dtrs, ..
            } => (count, chars.into_iter().zip(dtrs).collect()),
        }
    }

    /// Factory: build the smallest shape holding `count` and the given
    /// daughters (which must be sorted by character, ascending).
    ///
    /// A single daughter whose count equals the parent's folds into a run,
    /// merging an existing run tail, so equal-count non-branching chains are
    /// always stored path-compressed.
    pub fn assemble(count: u64, mut dtrs: Vec<(u16, Node)>) -> Node {
        debug_assert!(dtrs.windows(2).all(|w| w[0].0 < w[1].0));
        match dtrs.len() {
            0 => Node::terminal(count),
            1 => {
                let (ch, dtr) = dtrs.pop().unwrap_or((0, Node::terminal(0)));
                if dtr.count() == count {
                    match dtr {
                        Node::Terminal { .. } => Node::Run {
                            count,
                            run: vec![ch],
                        },
                        Node::Run { mut run, .. } => {
                            run.insert(0, ch);
                            Node::Run { count, run }
                        }
                        other => Node::One {
                            count,
                            ch,
                            dtr: Box::new(other),
                        },
                    }
                } else {
                    Node::One {
                        count,
                        ch,
                        dtr: Box::new(dtr),
                    }
                }
            }
            2 => {
                let (ch2, dtr2) = dtrs.pop().unwrap_or((0, Node::terminal(0)));
                let (ch1, dtr1) = dtrs.pop().unwrap_or((0, Node::terminal(0)));
                Node::Two {
                    count,
                    ch1,
                    ch2,
                    dtr1: Box::new(dtr1),
                    dtr2: Box::new(dtr2),
                }
            }
            3 => {
                let (ch3, dtr3) = dtrs.pop().unwrap_or((0, Node::terminal(0)));
                let (ch2, dtr2) = dtrs.pop().unwrap_or((0, Node::terminal(0)));
                let (ch1, dtr1) = dtrs.pop().unwrap_or((0, Node::terminal(0)));
                Node::Three {
                    count,
                    ch1,
                    ch2,
                    ch3,
                    dtr1: Box::new(dtr1),
                    dtr2: Box::new(dtr2),
                    dtr3: Box::new(dtr3),
                }
            }
            _ => {
                let dtr_sum = dtrs.iter().map(|(_, d)| d.count()).sum();
                let (chars, nodes) = dtrs.into_iter().unzip();
                Node::Array {
                    count,
                    chars,
                    dtrs: nodes,
                    dtr_sum,
                }
            }
        }
    }

    /// A fresh chain for `path` with every node at `count`: path-compressed
    /// from the start.
    fn fresh(count: u64, path: &[u16]) -> Node {
        if path.is_empty() {
            Node::terminal(count)
        } else {
            Node::Run {
                count,
                run: path.to_vec(),
            }
        }
    }

    /// Add `amount` to this node and every node along `path`, creating nodes
    /// as needed. New daughters binary-insert into sorted position. The
    /// caller has ruled out count overflow (root counts dominate all others).
    fn increment(self, path: &[u16], amount: u64) -> Node {
        let (count, mut dtrs) = self.into_parts();
        let count = count + amount;
        if let Some((&first, rest)) = path.split_first() {
            match dtrs.binary_search_by_key(&first, |&(ch, _)| ch) {
                Ok(i) => {
                    let dtr = std::mem::replace(&mut dtrs[i].1, Node::terminal(0));
                    dtrs[i].1 = dtr.increment(rest, amount);
                }
                Err(i) => {
                    dtrs.insert(i, (first, Node::fresh(amount, rest)));
                }
            }
        }
        Node::assemble(count, dtrs)
    }

    /// Subtract `amount` from this node and every node along `path`,
    /// removing nodes that reach zero with no daughters. Returns `None` if
    /// this node itself is removed.
    ///
    /// The path must exist with sufficient counts throughout; callers
    /// validate with a read-only pass first so failure never mutates.
    fn decrement_unchecked(self, path: &[u16], amount: u64) -> Option<Node> {
        let (count, mut dtrs) = self.into_parts();
        debug_assert!(count >= amount);
        let count = count - amount;
        if let Some((&first, rest)) = path.split_first() {
            if let Ok(i) = dtrs.binary_search_by_key(&first, |&(ch, _)| ch) {
                let dtr = std::mem::replace(&mut dtrs[i].1, Node::terminal(0));
                match dtr.decrement_unchecked(rest, amount) {
                    Some(replacement) => dtrs[i].1 = replacement,
                    None => {
                        dtrs.remove(i);
                    }
                }
            } else {
                debug_assert!(false, "decrement path validated to exist");
            }
        }
        if count == 0 && dtrs.is_empty() {
            None
        } else {
            Some(Node::assemble(count, dtrs))
        }
    }

    /// Drop any subtree whose own count is below `min_count`, recursively.
    /// Returns `None` if this node itself falls below the threshold.
    fn prune(self, min_count: u64) -> Option<Node> {
        if self.count() < min_count {
            return None;
        }
        // Every implicit node of a run shares its count, so a surviving run
        // survives whole.
        if matches!(self, Node::Terminal { .. } | Node::Run { .. }) {
            return Some(self);
        }
        let (count, dtrs) = self.into_parts();
        let kept = dtrs
            .into_iter()
            .filter_map(|(ch, dtr)| dtr.prune(min_count).map(|d| (ch, d)))
            .collect();
        Some(Node::assemble(count, kept))
    }

    /// Tally node shapes and count widths over the physically stored nodes
    /// (run chains count once).
    fn tally_shapes(&self, tally: &mut BTreeMap<(NodeShape, CountWidth), u64>) {
        *tally.entry((self.shape(), self.width())).or_insert(0) += 1;
        match self {
            Node::Terminal { .. } | Node::Run { .. } => {}
            Node::One { dtr, .. } => dtr.tally_shapes(tally),
            Node::Two { dtr1, dtr2, .. } => {
                dtr1.tally_shapes(tally);
                dtr2.tally_shapes(tally);
            }
            Node::Three {
                dtr1, dtr2, dtr3, ..
            } => {
                dtr1.tally_shapes(tally);
                dtr2.tally_shapes(tally);
                dtr3.tally_shapes(tally);
            }
            Node::Array { dtrs, .. } => {
                for dtr in dtrs {
                    dtr.tally_shapes(tally);
                }
            }
        }
    }
}

/// Character-sequence counter: a bounded-depth substring count trie.
///
/// The counter exclusively owns its trie; every mutating call may replace
/// the root node reference. Serialize writers externally; reads concurrent
/// with no writer are safe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharSeqCounter {
    root: Node,
    max_length: usize,
}

impl CharSeqCounter {
    /// Create an empty counter tracking substrings up to `max_length`
    /// characters.
    pub fn new(max_length: usize) -> Self {
        CharSeqCounter {
            root: Node::terminal(0),
            max_length,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Occurrence count of exactly this substring, 0 if absent.
    pub fn count(&self, cs: &[u16]) -> u64 {
        View::Real(&self.root)
            .descend(cs)
            .map_or(0, View::count)
    }

    /// Sum of counts of all one-character extensions of this substring.
    /// Defined even when the substring itself has count 0.
    pub fn extension_count(&self, cs: &[u16]) -> u64 {
        View::Real(&self.root)
            .descend(cs)
            .map_or(0, View::extension_count)
    }

    /// The characters observed following this substring, ascending.
    pub fn characters_following(&self, cs: &[u16]) -> Vec<u16> {
        View::Real(&self.root)
            .descend(cs)
            .map_or_else(Vec::new, |v| {
                v.daughters().into_iter().map(|(ch, _)| ch).collect()
            })
    }

    /// Number of distinct characters observed following this substring.
    pub fn num_characters_following(&self, cs: &[u16]) -> usize {
        View::Real(&self.root)
            .descend(cs)
            .map_or(0, |v| v.daughters().len())
    }

    /// All characters observed anywhere in training, ascending.
    pub fn observed_characters(&self) -> Vec<u16> {
        self.characters_following(&[])
    }

    /// Add 1 to the count of every substring of `cs` up to `max_length`
    /// characters.
    pub fn increment_substrings(&mut self, cs: &[u16]) -> Result<()> {
        self.increment_substrings_by(cs, 1)
    }

    /// Add `amount` to the count of every substring of `cs` up to
    /// `max_length` characters.
    ///
    /// The window sweep runs in two passes: maximal windows first, then the
    /// short windows whose start is too close to the end for a full-length
    /// window. Each window increments itself and all its prefixes.
    pub fn increment_substrings_by(&mut self, cs: &[u16], amount: u64) -> Result<()> {
        if amount == 0 {
            return Err(TrieError::ZeroAmount);
        }
        let n = cs.len();
        let k = self.max_length;
        let maximal = if k <= n { n - k + 1 } else { 0 };
        let tail_start = (n + 1).saturating_sub(k).max(maximal);
        let windows = maximal as u64 + (n - n.min(tail_start)) as u64;

        // The root's count dominates every other count in the trie, so
        // checking it rules out overflow anywhere below.
        let added = windows
            .checked_mul(amount)
            .ok_or(TrieError::CountOverflow)?;
        if self.root.count().checked_add(added).is_none_or(|c| c > MAX_COUNT) {
            return Err(TrieError::CountOverflow);
        }

        for i in 0..maximal {
            self.apply_increment(&cs[i..i + k], amount);
        }
        for i in tail_start..n {
            self.apply_increment(&cs[i..n], amount);
        }
        Ok(())
    }

    /// Subtract 1 from the count of every substring of `cs`: the exact
    /// inverse of [`increment_substrings`](Self::increment_substrings) over
    /// the same slice.
    ///
    /// Each window is validated read-only before any node is replaced; a
    /// failed window leaves the trie untouched by that window.
    pub fn decrement_substrings(&mut self, cs: &[u16]) -> Result<()> {
        let n = cs.len();
        let k = self.max_length;
        let maximal = if k <= n { n - k + 1 } else { 0 };
        let tail_start = (n + 1).saturating_sub(k).max(maximal);

        for i in 0..maximal {
            self.apply_decrement(&cs[i..i + k], 1)?;
        }
        for i in tail_start..n {
            self.apply_decrement(&cs[i..n], 1)?;
        }
        Ok(())
    }

    /// Subtract 1 from the single-character sequence `c` (and the root),
    /// undoing one automatic boundary-character increment.
    pub fn decrement_unigram(&mut self, c: u16) -> Result<()> {
        self.decrement_unigram_by(c, 1)
    }

    /// Subtract `amount` from the single-character sequence `c` (and the
    /// root).
    pub fn decrement_unigram_by(&mut self, c: u16, amount: u64) -> Result<()> {
        if amount == 0 {
            return Err(TrieError::ZeroAmount);
        }
        self.apply_decrement(&[c], amount)
    }

    /// Remove every node whose own count is below `min_count`. Monotone and
    /// idempotent; the root survives any prune (a root that would be removed
    /// resets to a fresh empty node).
    pub fn prune(&mut self, min_count: u64) {
        let root = std::mem::replace(&mut self.root, Node::terminal(0));
        if let Some(kept) = root.prune(min_count) {
            self.root = kept;
        }
    }

    fn apply_increment(&mut self, window: &[u16], amount: u64) {
        let root = std::mem::replace(&mut self.root, Node::terminal(0));
        self.root = root.increment(window, amount);
    }

    fn apply_decrement(&mut self, window: &[u16], amount: u64) -> Result<()> {
        // Validate the whole path before replacing any node.
        let mut view = View::Real(&self.root);
        if view.count() < amount {
            return Err(TrieError::NegativeCount);
        }
        for &ch in window {
            view = view.daughter(ch).ok_or(TrieError::MissingSequence)?;
            if view.count() < amount {
                return Err(TrieError::NegativeCount);
            }
        }
        let root = std::mem::replace(&mut self.root, Node::terminal(0));
        if let Some(kept) = root.decrement_unchecked(window, amount) {
            self.root = kept;
        }
        Ok(())
    }

    /// Number of distinct length-`n` sequences with nonzero counts.
    pub fn unique_ngram_count(&self, n: usize) -> u64 {
        let mut unique = 0;
        let mut path = Vec::new();
        View::Real(&self.root).visit(&mut path, n, &mut |p, count| {
            if p.len() == n && count > 0 {
                unique += 1;
            }
        });
        unique
    }

    /// Sum of counts over all length-`n` sequences.
    pub fn total_ngram_count(&self, n: usize) -> u64 {
        let mut total = 0;
        let mut path = Vec::new();
        View::Real(&self.root).visit(&mut path, n, &mut |p, count| {
            if p.len() == n {
                total += count;
            }
        });
        total
    }

    /// The `max_returned` most frequent length-`n` sequences, most frequent
    /// first, ties broken by ascending sequence.
    pub fn top_ngrams(&self, n: usize, max_returned: usize) -> Vec<(Vec<u16>, u64)> {
        if max_returned == 0 {
            return Vec::new();
        }
        // Bounded min-heap: pop the weakest entry whenever capacity spills.
        let mut heap: BinaryHeap<Reverse<(u64, Reverse<Vec<u16>>)>> = BinaryHeap::new();
        let mut path = Vec::new();
        View::Real(&self.root).visit(&mut path, n, &mut |p, count| {
            if p.len() == n && count > 0 {
                heap.push(Reverse((count, Reverse(p.to_vec()))));
                if heap.len() > max_returned {
                    heap.pop();
                }
            }
        });
        let mut out: Vec<(Vec<u16>, u64)> = heap
            .into_iter()
            .map(|Reverse((count, Reverse(gram)))| (gram, count))
            .collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    /// Histogram of stored node shapes crossed with count widths.
    pub fn shape_histogram(&self) -> BTreeMap<(NodeShape, CountWidth), u64> {
        let mut tally = BTreeMap::new();
        self.root.tally_shapes(&mut tally);
        tally
    }

    /// Serialize the count trie depth-first through a trie stream.
    pub fn write_counts<W: TrieWriter>(&self, writer: &mut W) -> Result<()> {
        fn write_view<W: TrieWriter>(view: View<'_>, writer: &mut W) -> Result<()> {
            writer.write_count(view.count())?;
            for (ch, dtr) in view.daughters() {
                writer.write_symbol(ch as u64)?;
                write_view(dtr, writer)?;
            }
            writer.finish_node()?;
            Ok(())
        }
        write_view(View::Real(&self.root), writer)
    }

    /// Rebuild a counter from a trie stream, truncating below `max_length`
    /// while still consuming the whole stream.
    pub fn read_counts<R: TrieReader>(reader: &mut R, max_length: usize) -> Result<Self> {
        fn skip_node<R: TrieReader>(reader: &mut R) -> Result<()> {
            reader.read_count()?;
            while reader.read_symbol()?.is_some() {
                skip_node(reader)?;
            }
            Ok(())
        }

        fn read_node<R: TrieReader>(reader: &mut R, depth_left: usize) -> Result<Node> {
            let count = reader.read_count()?;
            if count > MAX_COUNT {
                return Err(TrieError::CountOverflow);
            }
            let mut dtrs = Vec::new();
            while let Some(symbol) = reader.read_symbol()? {
                if depth_left == 0 {
                    skip_node(reader)?;
                    continue;
                }
                let ch =
                    u16::try_from(symbol).map_err(|_| TrieError::SymbolRange(symbol))?;
                dtrs.push((ch, read_node(reader, depth_left - 1)?));
            }
            Ok(Node::assemble(count, dtrs))
        }

        let root = read_node(reader, max_length)?;
        Ok(CharSeqCounter { root, max_length })
    }
}

impl fmt::Display for CharSeqCounter {
    /// Depth-first rendering, one `char count` line per node.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn render(view: View<'_>, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for (ch, dtr) in view.daughters() {
                match char::from_u32(ch as u32).filter(|c| !c.is_control()) {
                    Some(c) => writeln!(f, "{:indent$}{} {}", "", c, dtr.count(), indent = 2 * depth)?,
                    None => writeln!(
                        f,
                        "{:indent$}\\u{:04X} {}",
                        "",
                        ch,
                        dtr.count(),
                        indent = 2 * depth
                    )?,
                }
                render(dtr, depth + 1, f)?;
            }
            Ok(())
        }
        writeln!(f, "{}", self.root.count())?;
        render(View::Real(&self.root), 1, f)
    }
}

/// Encode a string as the UTF-16 code units this crate counts over.
pub fn utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}
