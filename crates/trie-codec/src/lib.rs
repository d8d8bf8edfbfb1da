//! Streaming trie codec over delta-coded bit streams.
//!
//! A trie is written depth-first as a flat sequence of positive integers:
//!
//! ```text
//! encode(node) = count (sym_1 encode(dtr_1)) ... (sym_k encode(dtr_k)) TERM
//! ```
//!
//! Daughter symbols are written in strictly ascending order. The bit layer
//! carries only positive integers, so two reserved encodings are used at the
//! symbol position: the terminator is written as `1`, and a symbol `s`
//! following the previous symbol `p` at the same depth (initially `-1`) is
//! written as `s - p + 1`, which is always at least `2`. Reader and writer
//! each keep an explicit stack of "last symbol at this depth" to invert the
//! transform.
//!
//! Symbols are `u64` so the same protocol serves character tries (u16 code
//! units) and integer-keyed token tries alike.
//!
//! On top of the [`BitTrieReader`] / [`BitTrieWriter`] pair, three reader
//! decorators operate without materializing a tree: [`MergeTrieReader`]
//! (pairwise count sum of two tries), [`PruneTrieReader`] (drop subtrees
//! below a count threshold) and [`ScaleTrieReader`] (rescale counts, drop
//! subtrees that round to zero).

use bit_io::{BitInput, BitOutput};
use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors arising from trie stream encoding and decoding.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Failure in the underlying bit stream.
    #[error(transparent)]
    Bit(#[from] bit_io::BitError),

    /// Node counts on the wire must be positive.
    #[error("trie stream counts must be positive, got {0}")]
    InvalidCount(u64),

    /// Daughter symbols must be strictly ascending within a node.
    #[error("symbol {next} does not follow {prev} in ascending order")]
    NonAscendingSymbol { prev: i64, next: u64 },

    /// Symbols must fit a signed 63-bit range for the delta transform.
    #[error("symbol {0} out of encodable range")]
    SymbolOutOfRange(u64),

    /// The caller violated the count/symbol/terminator call sequence.
    #[error("trie stream protocol violation: {0}")]
    Protocol(&'static str),

    /// Summed counts exceeded the representable range.
    #[error("merged count overflows")]
    CountOverflow,
}

/// Sink for a depth-first trie traversal.
///
/// Calls must follow the encoding grammar: one `write_count` per node, then
/// alternating `write_symbol` / nested node encodings, then `finish_node`.
pub trait TrieWriter {
    /// Write the count of the node just entered.
    fn write_count(&mut self, count: u64) -> Result<()>;

    /// Write the symbol leading to the next daughter.
    fn write_symbol(&mut self, symbol: u64) -> Result<()>;

    /// Terminate the daughter list of the current node.
    fn finish_node(&mut self) -> Result<()>;
}

/// Source of a depth-first trie traversal.
///
/// Calls must mirror [`TrieWriter`]: one `read_count` per node, then
/// `read_symbol` until it returns `None`.
pub trait TrieReader {
    /// Read the count of the node just entered.
    fn read_count(&mut self) -> Result<u64>;

    /// Read the next daughter symbol, or `None` at the end of the current
    /// node's daughter list.
    fn read_symbol(&mut self) -> Result<Option<u64>>;
}

/// Terminator marker as written through the delta coder.
const TERMINATOR: u64 = 1;

/// Trie writer over a delta-coded bit stream.
#[derive(Debug)]
pub struct BitTrieWriter<W: BitOutput> {
    out: W,
    /// Last symbol written at each open depth; -1 before the first daughter.
    last: Vec<i64>,
}

impl<W: BitOutput> BitTrieWriter<W> {
    pub fn new(out: W) -> Self {
        BitTrieWriter {
            out,
            last: Vec::new(),
        }
    }

    /// Flush the underlying bit stream. Call once after the root's
    /// `finish_node`.
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: BitOutput> TrieWriter for BitTrieWriter<W> {
    fn write_count(&mut self, count: u64) -> Result<()> {
        if count == 0 {
            return Err(CodecError::InvalidCount(count));
        }
        self.out.write_delta(count)?;
        self.last.push(-1);
        Ok(())
    }

    fn write_symbol(&mut self, symbol: u64) -> Result<()> {
        if symbol > i64::MAX as u64 {
            return Err(CodecError::SymbolOutOfRange(symbol));
        }
        let prev = self
            .last
            .last_mut()
            .ok_or(CodecError::Protocol("symbol written outside a node"))?;
        if symbol as i64 <= *prev {
            return Err(CodecError::NonAscendingSymbol {
                prev: *prev,
                next: symbol,
            });
        }
        // Widen before subtracting: prev may be -1 with symbol near the top
        // of the signed range.
        self.out
            .write_delta((symbol as i128 - *prev as i128 + 1) as u64)?;
        *prev = symbol as i64;
        Ok(())
    }

    fn finish_node(&mut self) -> Result<()> {
        self.last
            .pop()
            .ok_or(CodecError::Protocol("terminator written outside a node"))?;
        self.out.write_delta(TERMINATOR)?;
        Ok(())
    }
}

/// Trie reader over a delta-coded bit stream.
#[derive(Debug)]
pub struct BitTrieReader<R: BitInput> {
    input: R,
    /// Last symbol read at each open depth; -1 before the first daughter.
    last: Vec<i64>,
}

impl<R: BitInput> BitTrieReader<R> {
    pub fn new(input: R) -> Self {
        BitTrieReader {
            input,
            last: Vec::new(),
        }
    }

    pub fn into_inner(self) -> R {
        self.input
    }
}

impl<R: BitInput> TrieReader for BitTrieReader<R> {
    fn read_count(&mut self) -> Result<u64> {
        let count = self.input.read_delta()?;
        self.last.push(-1);
        Ok(count)
    }

    fn read_symbol(&mut self) -> Result<Option<u64>> {
        let prev = self
            .last
            .last_mut()
            .ok_or(CodecError::Protocol("symbol read outside a node"))?;
        let v = self.input.read_delta()?;
        if v == TERMINATOR {
            self.last.pop();
            return Ok(None);
        }
        let delta = i64::try_from(v - 1)
            .map_err(|_| CodecError::SymbolOutOfRange(v))?;
        let symbol = prev
            .checked_add(delta)
            .ok_or(CodecError::SymbolOutOfRange(v))?;
        *prev = symbol;
        Ok(Some(symbol as u64))
    }
}

/// Drive a reader/writer pair in lock-step, copying one whole trie.
///
/// Recursion depth is bounded by the depth of the encoded trie.
pub fn copy_trie<R: TrieReader, W: TrieWriter>(reader: &mut R, writer: &mut W) -> Result<()> {
    let count = reader.read_count()?;
    writer.write_count(count)?;
    while let Some(symbol) = reader.read_symbol()? {
        writer.write_symbol(symbol)?;
        copy_trie(reader, writer)?;
    }
    writer.finish_node()
}

/// Consume and discard the daughter list of the current node, including all
/// nested subtrees. The node's own count must already have been read.
fn skip_daughters<R: TrieReader>(reader: &mut R) -> Result<()> {
    while reader.read_symbol()?.is_some() {
        reader.read_count()?;
        skip_daughters(reader)?;
    }
    Ok(())
}

/// Which underlying streams supply the next node of a merge.
#[derive(Clone, Copy, Debug)]
enum Source {
    A,
    B,
    Both,
}

/// Per-depth merge state: which sides still have daughters at this level,
/// and a read-but-unconsumed symbol per side.
#[derive(Debug)]
struct MergeLevel {
    a_active: bool,
    b_active: bool,
    a_pend: Option<u64>,
    b_pend: Option<u64>,
}

/// Streaming merge of two tries: the merged trie has the union of paths and
/// the pairwise sum of counts at every matching node.
#[derive(Debug)]
pub struct MergeTrieReader<A: TrieReader, B: TrieReader> {
    a: A,
    b: B,
    levels: Vec<MergeLevel>,
    next_src: Option<Source>,
}

impl<A: TrieReader, B: TrieReader> MergeTrieReader<A, B> {
    pub fn new(a: A, b: B) -> Self {
        MergeTrieReader {
            a,
            b,
            levels: Vec::new(),
            next_src: Some(Source::Both),
        }
    }
}

impl<A: TrieReader, B: TrieReader> TrieReader for MergeTrieReader<A, B> {
    fn read_count(&mut self) -> Result<u64> {
        let src = self
            .next_src
            .take()
            .ok_or(CodecError::Protocol("count read without preceding symbol"))?;
        let (count, a_active, b_active) = match src {
            Source::A => (self.a.read_count()?, true, false),
            Source::B => (self.b.read_count()?, false, true),
            Source::Both => {
                let ca = self.a.read_count()?;
                let cb = self.b.read_count()?;
                (ca.checked_add(cb).ok_or(CodecError::CountOverflow)?, true, true)
            }
        };
        self.levels.push(MergeLevel {
            a_active,
            b_active,
            a_pend: None,
            b_pend: None,
        });
        Ok(count)
    }

    fn read_symbol(&mut self) -> Result<Option<u64>> {
        let idx = self
            .levels
            .len()
            .checked_sub(1)
            .ok_or(CodecError::Protocol("symbol read outside a node"))?;

        let na = if self.levels[idx].a_active {
            match self.levels[idx].a_pend.take() {
                Some(s) => Some(s),
                None => {
                    let s = self.a.read_symbol()?;
                    if s.is_none() {
                        self.levels[idx].a_active = false;
                    }
                    s
                }
            }
        } else {
            None
        };
        let nb = if self.levels[idx].b_active {
            match self.levels[idx].b_pend.take() {
                Some(s) => Some(s),
                None => {
                    let s = self.b.read_symbol()?;
                    if s.is_none() {
                        self.levels[idx].b_active = false;
                    }
                    s
                }
            }
        } else {
            None
        };

        match (na, nb) {
            (None, None) => {
                self.levels.pop();
                Ok(None)
            }
            (Some(x), None) => {
                self.next_src = Some(Source::A);
                Ok(Some(x))
            }
            (None, Some(y)) => {
                self.next_src = Some(Source::B);
                Ok(Some(y))
            }
            (Some(x), Some(y)) => {
                if x == y {
                    self.next_src = Some(Source::Both);
                    Ok(Some(x))
                } else if x < y {
                    self.levels[idx].b_pend = Some(y);
                    self.next_src = Some(Source::A);
                    Ok(Some(x))
                } else {
                    self.levels[idx].a_pend = Some(x);
                    self.next_src = Some(Source::B);
                    Ok(Some(y))
                }
            }
        }
    }
}

/// Count transformation applied by a filtering reader.
trait CountFilter {
    /// Map a raw count to its surfaced value.
    fn map(&self, count: u64) -> u64;

    /// Whether a daughter with the mapped count survives.
    fn keep(&self, mapped: u64) -> bool;
}

/// Shared delete-while-reading skeleton: the next daughter's count is read
/// ahead and buffered, and the daughter's symbol is surfaced only if the
/// mapped count survives the filter; otherwise the whole subtree is consumed
/// and discarded before moving to the next sibling. The top-level root count
/// is mapped but never dropped.
#[derive(Debug)]
struct Filtered<R: TrieReader, F: CountFilter> {
    inner: R,
    filter: F,
    pending: Option<u64>,
    root_read: bool,
}

impl<R: TrieReader, F: CountFilter> Filtered<R, F> {
    fn new(inner: R, filter: F) -> Self {
        Filtered {
            inner,
            filter,
            pending: None,
            root_read: false,
        }
    }
}

impl<R: TrieReader, F: CountFilter> TrieReader for Filtered<R, F> {
    fn read_count(&mut self) -> Result<u64> {
        if let Some(count) = self.pending.take() {
            return Ok(count);
        }
        if self.root_read {
            return Err(CodecError::Protocol("count read without preceding symbol"));
        }
        self.root_read = true;
        Ok(self.filter.map(self.inner.read_count()?))
    }

    fn read_symbol(&mut self) -> Result<Option<u64>> {
        loop {
            match self.inner.read_symbol()? {
                None => return Ok(None),
                Some(symbol) => {
                    let mapped = self.filter.map(self.inner.read_count()?);
                    if self.filter.keep(mapped) {
                        self.pending = Some(mapped);
                        return Ok(Some(symbol));
                    }
                    skip_daughters(&mut self.inner)?;
                }
            }
        }
    }
}

#[derive(Debug)]
struct MinCount(u64);

impl CountFilter for MinCount {
    fn map(&self, count: u64) -> u64 {
        count
    }
    fn keep(&self, mapped: u64) -> bool {
        mapped >= self.0
    }
}

#[derive(Debug)]
struct Rescale(f64);

impl CountFilter for Rescale {
    fn map(&self, count: u64) -> u64 {
        (count as f64 * self.0).round() as u64
    }
    fn keep(&self, mapped: u64) -> bool {
        mapped > 0
    }
}

/// Reader decorator that drops every subtree whose own count is below a
/// threshold. The root node always survives.
#[derive(Debug)]
pub struct PruneTrieReader<R: TrieReader>(Filtered<R, MinCount>);

impl<R: TrieReader> PruneTrieReader<R> {
    pub fn new(inner: R, min_count: u64) -> Self {
        PruneTrieReader(Filtered::new(inner, MinCount(min_count)))
    }
}

impl<R: TrieReader> TrieReader for PruneTrieReader<R> {
    fn read_count(&mut self) -> Result<u64> {
        self.0.read_count()
    }
    fn read_symbol(&mut self) -> Result<Option<u64>> {
        self.0.read_symbol()
    }
}

/// Reader decorator that multiplies every count by a factor and rounds,
/// dropping any subtree whose rescaled count becomes zero. The root count is
/// rescaled but the root itself is never dropped.
#[derive(Debug)]
pub struct ScaleTrieReader<R: TrieReader>(Filtered<R, Rescale>);

impl<R: TrieReader> ScaleTrieReader<R> {
    pub fn new(inner: R, factor: f64) -> Self {
        ScaleTrieReader(Filtered::new(inner, Rescale(factor)))
    }
}

impl<R: TrieReader> TrieReader for ScaleTrieReader<R> {
    fn read_count(&mut self) -> Result<u64> {
        self.0.read_count()
    }
    fn read_symbol(&mut self) -> Result<Option<u64>> {
        self.0.read_symbol()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bit_io::{BitReader, BitWriter};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    /// Materialized trie for driving and checking codec streams in tests.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestTrie {
        count: u64,
        dtrs: Vec<(u64, TestTrie)>,
    }

    impl TestTrie {
        fn leaf(count: u64) -> Self {
            TestTrie {
                count,
                dtrs: Vec::new(),
            }
        }

        fn node(count: u64, dtrs: Vec<(u64, TestTrie)>) -> Self {
            TestTrie { count, dtrs }
        }

        fn write_to<W: TrieWriter>(&self, writer: &mut W) -> Result<()> {
            writer.write_count(self.count)?;
            for (symbol, dtr) in &self.dtrs {
                writer.write_symbol(*symbol)?;
                dtr.write_to(writer)?;
            }
            writer.finish_node()
        }

        fn read_from<R: TrieReader>(reader: &mut R) -> Result<Self> {
            let count = reader.read_count()?;
            let mut dtrs = Vec::new();
            while let Some(symbol) = reader.read_symbol()? {
                dtrs.push((symbol, Self::read_from(reader)?));
            }
            Ok(TestTrie { count, dtrs })
        }
    }

    fn encode(trie: &TestTrie) -> Vec<u8> {
        let mut writer = BitTrieWriter::new(BitWriter::new(Vec::new()));
        trie.write_to(&mut writer).unwrap();
        writer.flush().unwrap();
        writer.into_inner().into_inner()
    }

    fn decode(bytes: &[u8]) -> TestTrie {
        let mut reader = BitTrieReader::new(BitReader::new(bytes));
        TestTrie::read_from(&mut reader).unwrap()
    }

    /// Decode the raw delta integers of an encoded stream.
    fn raw_deltas(bytes: &[u8], count: usize) -> Vec<u64> {
        use bit_io::BitInput;
        let mut reader = BitReader::new(bytes);
        (0..count).map(|_| reader.read_delta().unwrap()).collect()
    }

    #[test]
    fn single_node_wire_stream() {
        // {count=4, no daughters} encodes as [4, 1]: count, then terminator.
        let bytes = encode(&TestTrie::leaf(4));
        assert_eq!(raw_deltas(&bytes, 2), vec![4, 1]);
    }

    #[test]
    fn single_node_decodes() {
        let bytes = encode(&TestTrie::leaf(4));
        assert_eq!(decode(&bytes), TestTrie::leaf(4));
    }

    #[test]
    fn sibling_symbols_are_delta_coded() {
        // Root count 11 with daughters 97 -> {5} and 98 -> {2}.
        // First symbol: 97 - (-1) + 1 = 99. Second: 98 - 97 + 1 = 2.
        let trie = TestTrie::node(
            11,
            vec![(97, TestTrie::leaf(5)), (98, TestTrie::leaf(2))],
        );
        let bytes = encode(&trie);
        assert_eq!(raw_deltas(&bytes, 8), vec![11, 99, 5, 1, 2, 2, 1, 1]);
        assert_eq!(decode(&bytes), trie);
    }

    #[test]
    fn nested_roundtrip() {
        let trie = TestTrie::node(
            20,
            vec![
                (
                    3,
                    TestTrie::node(12, vec![(1, TestTrie::leaf(7)), (9, TestTrie::leaf(5))]),
                ),
                (8, TestTrie::leaf(4)),
                (100, TestTrie::node(4, vec![(100, TestTrie::leaf(4))])),
            ],
        );
        assert_eq!(decode(&encode(&trie)), trie);
    }

    fn random_trie(rng: &mut SmallRng, depth: usize) -> TestTrie {
        let count = rng.random_range(1..10_000u64);
        let mut dtrs = Vec::new();
        if depth > 0 {
            let n = rng.random_range(0..4usize);
            let mut symbol = 0u64;
            for _ in 0..n {
                symbol += rng.random_range(1..500u64);
                dtrs.push((symbol, random_trie(rng, depth - 1)));
            }
        }
        TestTrie { count, dtrs }
    }

    #[test]
    fn randomized_roundtrip() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..100 {
            let trie = random_trie(&mut rng, 4);
            assert_eq!(decode(&encode(&trie)), trie);
        }
    }

    #[test]
    fn copy_trie_is_verbatim() {
        let mut rng = SmallRng::seed_from_u64(11);
        let trie = random_trie(&mut rng, 5);
        let bytes = encode(&trie);

        let mut reader = BitTrieReader::new(BitReader::new(&bytes[..]));
        let mut writer = BitTrieWriter::new(BitWriter::new(Vec::new()));
        copy_trie(&mut reader, &mut writer).unwrap();
        writer.flush().unwrap();
        let copied = writer.into_inner().into_inner();
        assert_eq!(copied, bytes);
    }

    #[test]
    fn zero_count_rejected() {
        let mut writer = BitTrieWriter::new(BitWriter::new(Vec::new()));
        assert!(matches!(
            writer.write_count(0),
            Err(CodecError::InvalidCount(0))
        ));
    }

    #[test]
    fn non_ascending_symbol_rejected() {
        let mut writer = BitTrieWriter::new(BitWriter::new(Vec::new()));
        writer.write_count(5).unwrap();
        writer.write_symbol(10).unwrap();
        writer.write_count(1).unwrap();
        writer.finish_node().unwrap();
        assert!(matches!(
            writer.write_symbol(10),
            Err(CodecError::NonAscendingSymbol { prev: 10, next: 10 })
        ));
    }

    #[test]
    fn truncated_stream_is_error() {
        let trie = TestTrie::node(9, vec![(4, TestTrie::leaf(3))]);
        let bytes = encode(&trie);
        let mut reader = BitTrieReader::new(BitReader::new(&bytes[..1]));
        assert!(TestTrie::read_from(&mut reader).is_err());
    }

    fn merge(a: &TestTrie, b: &TestTrie) -> TestTrie {
        let ab = encode(a);
        let bb = encode(b);
        let mut reader = MergeTrieReader::new(
            BitTrieReader::new(BitReader::new(&ab[..])),
            BitTrieReader::new(BitReader::new(&bb[..])),
        );
        TestTrie::read_from(&mut reader).unwrap()
    }

    #[test]
    fn merge_sums_matching_nodes() {
        let a = TestTrie::node(4, vec![(1, TestTrie::leaf(3)), (2, TestTrie::leaf(1))]);
        let b = TestTrie::node(6, vec![(1, TestTrie::leaf(2)), (2, TestTrie::leaf(4))]);
        let merged = merge(&a, &b);
        assert_eq!(
            merged,
            TestTrie::node(10, vec![(1, TestTrie::leaf(5)), (2, TestTrie::leaf(5))])
        );
    }

    #[test]
    fn merge_handles_uneven_daughter_sets() {
        let a = TestTrie::node(
            5,
            vec![
                (1, TestTrie::node(3, vec![(7, TestTrie::leaf(3))])),
                (4, TestTrie::leaf(2)),
            ],
        );
        let b = TestTrie::node(
            9,
            vec![(2, TestTrie::leaf(6)), (4, TestTrie::leaf(3))],
        );
        let merged = merge(&a, &b);
        assert_eq!(
            merged,
            TestTrie::node(
                14,
                vec![
                    (1, TestTrie::node(3, vec![(7, TestTrie::leaf(3))])),
                    (2, TestTrie::leaf(6)),
                    (4, TestTrie::leaf(5)),
                ]
            )
        );
    }

    #[test]
    fn merge_of_disjoint_tries_interleaves() {
        let a = TestTrie::node(2, vec![(10, TestTrie::leaf(2))]);
        let b = TestTrie::node(3, vec![(5, TestTrie::leaf(3))]);
        let merged = merge(&a, &b);
        assert_eq!(
            merged,
            TestTrie::node(5, vec![(5, TestTrie::leaf(3)), (10, TestTrie::leaf(2))])
        );
    }

    #[test]
    fn prune_drops_low_count_subtrees() {
        let trie = TestTrie::node(
            10,
            vec![
                (1, TestTrie::node(6, vec![(3, TestTrie::leaf(1))])),
                (2, TestTrie::leaf(2)),
                (5, TestTrie::leaf(4)),
            ],
        );
        let bytes = encode(&trie);
        let mut reader =
            PruneTrieReader::new(BitTrieReader::new(BitReader::new(&bytes[..])), 3);
        let pruned = TestTrie::read_from(&mut reader).unwrap();
        assert_eq!(
            pruned,
            TestTrie::node(10, vec![(1, TestTrie::leaf(6)), (5, TestTrie::leaf(4))])
        );
    }

    #[test]
    fn prune_keeps_low_count_root() {
        let trie = TestTrie::node(2, vec![(1, TestTrie::leaf(1))]);
        let bytes = encode(&trie);
        let mut reader =
            PruneTrieReader::new(BitTrieReader::new(BitReader::new(&bytes[..])), 100);
        let pruned = TestTrie::read_from(&mut reader).unwrap();
        assert_eq!(pruned, TestTrie::leaf(2));
    }

    #[test]
    fn scale_rescales_and_drops_zeros() {
        let trie = TestTrie::node(
            10,
            vec![
                (1, TestTrie::node(4, vec![(2, TestTrie::leaf(1))])),
                (3, TestTrie::leaf(1)),
            ],
        );
        let bytes = encode(&trie);
        let mut reader =
            ScaleTrieReader::new(BitTrieReader::new(BitReader::new(&bytes[..])), 0.5);
        let scaled = TestTrie::read_from(&mut reader).unwrap();
        // 10 -> 5; 4 -> 2; 1 -> 0.5, which f64::round takes to 1, so the
        // count-1 leaves survive.
        assert_eq!(
            scaled,
            TestTrie::node(
                5,
                vec![
                    (1, TestTrie::node(2, vec![(2, TestTrie::leaf(1))])),
                    (3, TestTrie::leaf(1)),
                ]
            )
        );
    }

    #[test]
    fn scale_drops_subtrees_that_round_to_zero() {
        let trie = TestTrie::node(
            10,
            vec![
                (1, TestTrie::node(4, vec![(2, TestTrie::leaf(1))])),
                (3, TestTrie::leaf(1)),
            ],
        );
        let bytes = encode(&trie);
        let mut reader =
            ScaleTrieReader::new(BitTrieReader::new(BitReader::new(&bytes[..])), 0.25);
        let scaled = TestTrie::read_from(&mut reader).unwrap();
        // 10 -> 2.5 -> 3 (root kept); 4 -> 1; nested 1 -> 0.25 -> 0 dropped;
        // sibling 1 -> 0 dropped.
        assert_eq!(scaled, TestTrie::node(3, vec![(1, TestTrie::leaf(1))]));
    }

    #[test]
    fn scale_then_decode_through_copy() {
        // Filters compose with copy_trie like any other reader.
        let trie = TestTrie::node(8, vec![(1, TestTrie::leaf(4)), (2, TestTrie::leaf(2))]);
        let bytes = encode(&trie);
        let mut reader =
            ScaleTrieReader::new(BitTrieReader::new(BitReader::new(&bytes[..])), 0.5);
        let mut writer = BitTrieWriter::new(BitWriter::new(Vec::new()));
        copy_trie(&mut reader, &mut writer).unwrap();
        writer.flush().unwrap();
        let rebytes = writer.into_inner().into_inner();
        assert_eq!(
            decode(&rebytes),
            TestTrie::node(4, vec![(1, TestTrie::leaf(2)), (2, TestTrie::leaf(1))])
        );
    }
}
