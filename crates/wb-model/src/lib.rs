//! Dynamic character n-gram process language model with Witten-Bell smoothing.
//!
//! [`NGramProcessLm`] wraps a [`CharSeqCounter`] and turns its raw substring
//! counts into smoothed probability estimates. The conditional estimate for a
//! character given its context interpolates the maximum-likelihood estimate at
//! each context length with the estimate one character shorter, bottoming out
//! in a uniform distribution over the character set:
//!
//! ```text
//! P(c | ctx) = lambda(ctx) * count(ctx.c) / ext(ctx)
//!            + (1 - lambda(ctx)) * P(c | shorter ctx)
//! ```
//!
//! where `lambda(ctx) = ext(ctx) / (ext(ctx) + L * following(ctx))` and `L` is
//! a tunable hyperparameter. The model is a process model: it assigns
//! probabilities to sequences of any length, and the joint estimate of a
//! sequence is the sum of per-character conditional log estimates.
//!
//! Models train incrementally, serialize to a compact bit stream, and compile
//! to the flat read-only format consumed by `compiled-lm`.

use std::io::Write;

use bit_io::{BitInput, BitOutput};
use byteorder::{BigEndian, WriteBytesExt};
use count_trie::CharSeqCounter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use trie_codec::{BitTrieReader, BitTrieWriter};

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Scale used to carry the lambda factor through the integer-only bit stream.
const LAMBDA_FACTOR_SCALE: f64 = 1_000_000.0;

/// Errors arising from model construction, training, and (de)serialization.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The maximum n-gram order must be at least one.
    #[error("maximum n-gram order must be positive")]
    InvalidMaxNgram,

    /// The character set size must be positive.
    #[error("number of characters must be positive, got {0}")]
    InvalidNumChars(u64),

    /// The smoothing hyperparameter must be finite and non-negative.
    #[error("lambda factor must be finite and non-negative, got {0}")]
    InvalidLambdaFactor(f64),

    /// The lambda factor rounds to zero in the serialized fixed-point form.
    #[error("lambda factor {0} too small to serialize")]
    LambdaUnderflow(f64),

    /// Conditional estimates require at least one character.
    #[error("conditional estimate requires a non-empty sequence")]
    EmptySequence,

    /// A conditional training context extends past the training sequence.
    #[error("context length {context_len} exceeds sequence length {len}")]
    ContextBounds { context_len: usize, len: usize },

    /// A deserialized header field is out of range.
    #[error("malformed model stream: {0}")]
    Format(&'static str),

    /// Failure in the underlying count trie.
    #[error(transparent)]
    Trie(#[from] count_trie::TrieError),

    /// Failure in the underlying bit stream.
    #[error(transparent)]
    Bit(#[from] bit_io::BitError),

    /// Failure in the underlying trie codec.
    #[error(transparent)]
    Codec(#[from] trie_codec::CodecError),

    /// Failure in the underlying byte stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A trainable Witten-Bell smoothed character n-gram process model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NGramProcessLm {
    counter: CharSeqCounter,
    max_ngram: usize,
    num_chars: u32,
    lambda_factor: f64,
}

impl NGramProcessLm {
    /// Default character set size: the full 16-bit code unit range.
    pub const DEFAULT_NUM_CHARS: u32 = 65_536;

    /// Create a model of the given order with an explicit character set size
    /// and interpolation hyperparameter.
    pub fn new(max_ngram: usize, num_chars: u32, lambda_factor: f64) -> Result<Self> {
        if max_ngram == 0 {
            return Err(ModelError::InvalidMaxNgram);
        }
        if num_chars == 0 {
            return Err(ModelError::InvalidNumChars(0));
        }
        if !lambda_factor.is_finite() || lambda_factor < 0.0 {
            return Err(ModelError::InvalidLambdaFactor(lambda_factor));
        }
        Ok(NGramProcessLm {
            counter: CharSeqCounter::new(max_ngram),
            max_ngram,
            num_chars,
            lambda_factor,
        })
    }

    /// Create a model of the given order with the default character set size
    /// and a lambda factor equal to the order.
    pub fn with_order(max_ngram: usize) -> Result<Self> {
        NGramProcessLm::new(max_ngram, Self::DEFAULT_NUM_CHARS, max_ngram as f64)
    }

    pub fn max_ngram(&self) -> usize {
        self.max_ngram
    }

    pub fn num_chars(&self) -> u32 {
        self.num_chars
    }

    pub fn lambda_factor(&self) -> f64 {
        self.lambda_factor
    }

    /// The underlying substring counter.
    pub fn counter(&self) -> &CharSeqCounter {
        &self.counter
    }

    /// All characters observed in training, ascending.
    pub fn observed_characters(&self) -> Vec<u16> {
        self.counter.observed_characters()
    }

    /// Log (base 2) of the uniform per-character estimate.
    pub fn log2_uniform_estimate(&self) -> f64 {
        -(self.num_chars as f64).log2()
    }

    /// Train on every substring of `cs` up to the model order.
    pub fn train(&mut self, cs: &[u16]) -> Result<()> {
        self.counter.increment_substrings(cs)?;
        Ok(())
    }

    /// Train on every substring of `cs` with a multiplicity.
    pub fn train_by(&mut self, cs: &[u16], amount: u64) -> Result<()> {
        self.counter.increment_substrings_by(cs, amount)?;
        Ok(())
    }

    /// Train the conditional distribution of `cs` past its first
    /// `context_len` characters, without training the context itself.
    ///
    /// Trains on the whole sequence and then takes back the counts
    /// contributed by the bare context, so only estimates that condition on
    /// the context move.
    pub fn train_conditional(&mut self, cs: &[u16], context_len: usize) -> Result<()> {
        if context_len > cs.len() {
            return Err(ModelError::ContextBounds {
                context_len,
                len: cs.len(),
            });
        }
        self.counter.increment_substrings(cs)?;
        if context_len > 0 {
            self.counter.decrement_substrings(&cs[..context_len])?;
        }
        Ok(())
    }

    /// Take back one automatic count of the single character `c`, as a
    /// boundary-marker wrapper does after splicing markers into its training
    /// text.
    pub fn decrement_unigram(&mut self, c: u16) -> Result<()> {
        self.counter.decrement_unigram(c)?;
        Ok(())
    }

    /// Take back `amount` counts of the single character `c`.
    pub fn decrement_unigram_by(&mut self, c: u16, amount: u64) -> Result<()> {
        self.counter.decrement_unigram_by(c, amount)?;
        Ok(())
    }

    /// The interpolation weight given to the maximum-likelihood estimate in
    /// context `ctx`. Zero when the context has never been extended.
    pub fn lambda(&self, ctx: &[u16]) -> f64 {
        let ext = self.counter.extension_count(ctx);
        if ext == 0 {
            return 0.0;
        }
        let following = self.counter.num_characters_following(ctx) as f64;
        let ext = ext as f64;
        ext / (ext + self.lambda_factor * following)
    }

    /// Log (base 2) conditional estimate of the last character of `cs` given
    /// all the characters before it.
    ///
    /// Contexts longer than the model can use are ignored; contexts the
    /// model never saw extended fall through to shorter ones, down to the
    /// uniform estimate.
    pub fn log2_conditional_estimate(&self, cs: &[u16]) -> Result<f64> {
        if cs.is_empty() {
            return Err(ModelError::EmptySequence);
        }
        Ok(self.conditional_at(cs, cs.len() - 1))
    }

    /// Log (base 2) joint estimate of `cs` under the process model. The
    /// empty sequence has estimate zero.
    pub fn log2_estimate(&self, cs: &[u16]) -> f64 {
        (0..cs.len()).map(|i| self.conditional_at(cs, i)).sum()
    }

    /// Conditional log estimate of `cs[i]` given `cs[..i]`, folding the
    /// interpolation from the empty context up to the longest usable one.
    fn conditional_at(&self, cs: &[u16], i: usize) -> f64 {
        let mut estimate = 1.0 / self.num_chars as f64;
        let max_context = (self.max_ngram - 1).min(i);
        for len in 0..=max_context {
            let ctx = &cs[i - len..i];
            let ext = self.counter.extension_count(ctx);
            if ext == 0 {
                break;
            }
            let lambda = self.lambda(ctx);
            let ml = self.counter.count(&cs[i - len..=i]) as f64 / ext as f64;
            estimate = lambda * ml + (1.0 - lambda) * estimate;
        }
        estimate.log2()
    }

    /// Remove every count below `min_count`, reclaiming the space.
    pub fn prune(&mut self, min_count: u64) {
        self.counter.prune(min_count);
    }

    /// Serialize the model to a bit stream: order, character set size, and
    /// fixed-point lambda factor as deltas, then the count trie. Flushes the
    /// output.
    pub fn write_to<W: BitOutput>(&self, out: &mut W) -> Result<()> {
        out.write_delta(self.max_ngram as u64)?;
        out.write_delta(self.num_chars as u64)?;
        let scaled = (self.lambda_factor * LAMBDA_FACTOR_SCALE).round() as u64;
        if scaled == 0 {
            return Err(ModelError::LambdaUnderflow(self.lambda_factor));
        }
        out.write_delta(scaled)?;
        let mut writer = BitTrieWriter::new(&mut *out);
        self.counter.write_counts(&mut writer)?;
        out.flush()?;
        Ok(())
    }

    /// Deserialize a model written by [`write_to`](Self::write_to).
    pub fn read_from<R: BitInput>(input: &mut R) -> Result<Self> {
        let max_ngram = input.read_delta()?;
        if max_ngram > u16::MAX as u64 {
            return Err(ModelError::Format("n-gram order out of range"));
        }
        let max_ngram = max_ngram as usize;
        let num_chars = input.read_delta()?;
        if num_chars > u32::MAX as u64 {
            return Err(ModelError::Format("character set size out of range"));
        }
        let lambda_factor = input.read_delta()? as f64 / LAMBDA_FACTOR_SCALE;
        let mut reader = BitTrieReader::new(&mut *input);
        let counter = CharSeqCounter::read_counts(&mut reader, max_ngram)?;
        Ok(NGramProcessLm {
            counter,
            max_ngram,
            num_chars: num_chars as u32,
            lambda_factor,
        })
    }

    /// Compile the model into the flat big-endian array format.
    ///
    /// Nodes are laid out in breadth-first order, so each internal node's
    /// daughters form a contiguous ascending run and a single first-child
    /// index per internal node delimits them all. Internal nodes are those
    /// shallower than the model order, whether or not they currently branch;
    /// the remainder are leaves carrying only their character and estimate.
    pub fn compile_to<W: Write>(&self, out: &mut W) -> Result<()> {
        let mut order: Vec<Vec<u16>> = vec![Vec::new()];
        let mut head = 0;
        while head < order.len() {
            let ngram = order[head].clone();
            head += 1;
            if ngram.len() < self.max_ngram {
                for c in self.counter.characters_following(&ngram) {
                    let mut extended = ngram.clone();
                    extended.push(c);
                    order.push(extended);
                }
            }
        }
        let num_nodes = order.len();
        let num_internal = order.iter().filter(|s| s.len() < self.max_ngram).count();
        let log2_uniform = self.log2_uniform_estimate() as f32;

        out.write_i32::<BigEndian>(self.max_ngram as i32)?;
        out.write_f32::<BigEndian>(log2_uniform)?;
        out.write_i32::<BigEndian>(num_nodes as i32)?;
        out.write_i32::<BigEndian>(num_internal as i32 - 1)?;

        let mut next_child = 1i64;
        for (index, ngram) in order.iter().enumerate() {
            let (c, log2_prob) = if index == 0 {
                (0xFFFF, log2_uniform)
            } else {
                // The estimate is total, not maximum-likelihood: the trained
                // interpolation for this character in this context.
                (ngram[ngram.len() - 1], self.conditional_at(ngram, ngram.len() - 1) as f32)
            };
            out.write_u16::<BigEndian>(c)?;
            out.write_f32::<BigEndian>(log2_prob)?;
            if ngram.len() < self.max_ngram {
                let one_minus_lambda = 1.0 - self.lambda(ngram);
                out.write_f32::<BigEndian>(one_minus_lambda.log2() as f32)?;
                out.write_i32::<BigEndian>(next_child as i32)?;
                next_child += self.counter.num_characters_following(ngram) as i64;
            }
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bit_io::{BitReader, BitWriter};
    use count_trie::utf16;

    fn close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn construction_validates_parameters() {
        assert!(matches!(
            NGramProcessLm::new(0, 16, 1.0),
            Err(ModelError::InvalidMaxNgram)
        ));
        assert!(matches!(
            NGramProcessLm::new(3, 0, 1.0),
            Err(ModelError::InvalidNumChars(0))
        ));
        assert!(matches!(
            NGramProcessLm::new(3, 16, -1.0),
            Err(ModelError::InvalidLambdaFactor(_))
        ));
        assert!(matches!(
            NGramProcessLm::new(3, 16, f64::NAN),
            Err(ModelError::InvalidLambdaFactor(_))
        ));
    }

    #[test]
    fn default_order_parameters() {
        let lm = NGramProcessLm::with_order(5).unwrap();
        assert_eq!(lm.max_ngram(), 5);
        assert_eq!(lm.num_chars(), 65_536);
        close(lm.lambda_factor(), 5.0);
    }

    #[test]
    fn untrained_model_is_uniform() {
        let lm = NGramProcessLm::new(3, 4, 2.0).unwrap();
        close(
            lm.log2_conditional_estimate(&utf16("a")).unwrap(),
            -2.0,
        );
        close(lm.log2_estimate(&utf16("abc")), -6.0);
    }

    #[test]
    fn empty_sequence_conditional_is_error() {
        let lm = NGramProcessLm::new(3, 4, 2.0).unwrap();
        assert!(matches!(
            lm.log2_conditional_estimate(&[]),
            Err(ModelError::EmptySequence)
        ));
    }

    #[test]
    fn empty_sequence_joint_is_zero() {
        let mut lm = NGramProcessLm::new(3, 4, 2.0).unwrap();
        lm.train(&utf16("abc")).unwrap();
        close(lm.log2_estimate(&[]), 0.0);
    }

    #[test]
    fn lambda_formula() {
        let mut lm = NGramProcessLm::new(3, 256, 4.0).unwrap();
        lm.train(&utf16("abracadabra")).unwrap();
        // ext("") = 11 across 5 distinct following characters.
        close(lm.lambda(&[]), 11.0 / (11.0 + 4.0 * 5.0));
        // ext("a") = 4 across 3 distinct following characters.
        close(lm.lambda(&utf16("a")), 4.0 / (4.0 + 4.0 * 3.0));
        // Unseen context gets zero weight.
        close(lm.lambda(&utf16("zz")), 0.0);
    }

    #[test]
    fn smoothed_conditional_by_hand() {
        // Order 2 over a two-character alphabet, lambda factor 1.
        let mut lm = NGramProcessLm::new(2, 2, 1.0).unwrap();
        lm.train(&utf16("ab")).unwrap();
        // Empty context: ext = 2 over 2 followers, lambda = 1/2,
        // ml(b) = 1/2, uniform = 1/2, so P(b) = 1/2.
        // Context "a": ext = 1 over 1 follower, lambda = 1/2, ml(b|a) = 1,
        // so P(b|a) = 1/2 * 1 + 1/2 * 1/2 = 3/4.
        close(
            lm.log2_conditional_estimate(&utf16("ab")).unwrap(),
            (0.75f64).log2(),
        );
        close(
            lm.log2_conditional_estimate(&utf16("b")).unwrap(),
            (0.5f64).log2(),
        );
    }

    #[test]
    fn joint_is_sum_of_conditionals() {
        let mut lm = NGramProcessLm::new(3, 256, 3.0).unwrap();
        lm.train(&utf16("abracadabra")).unwrap();
        let cs = utf16("cadab");
        let by_parts: f64 = (1..=cs.len())
            .map(|end| lm.log2_conditional_estimate(&cs[..end]).unwrap())
            .sum();
        close(lm.log2_estimate(&cs), by_parts);
    }

    #[test]
    fn training_raises_seen_sequences() {
        let mut lm = NGramProcessLm::new(3, 256, 3.0).unwrap();
        let before = lm.log2_estimate(&utf16("abra"));
        lm.train(&utf16("abracadabra")).unwrap();
        let after = lm.log2_estimate(&utf16("abra"));
        assert!(after > before);
    }

    #[test]
    fn train_by_multiplies() {
        let mut once = NGramProcessLm::new(3, 256, 3.0).unwrap();
        once.train(&utf16("abc")).unwrap();
        once.train(&utf16("abc")).unwrap();
        once.train(&utf16("abc")).unwrap();
        let mut bulk = NGramProcessLm::new(3, 256, 3.0).unwrap();
        bulk.train_by(&utf16("abc"), 3).unwrap();
        assert_eq!(once, bulk);
    }

    #[test]
    fn conditional_training_leaves_context_uncounted() {
        let mut lm = NGramProcessLm::new(3, 256, 3.0).unwrap();
        lm.train_conditional(&utf16("xy"), 1).unwrap();
        assert_eq!(lm.counter().count(&utf16("x")), 0);
        assert_eq!(lm.counter().count(&utf16("xy")), 1);
        assert_eq!(lm.counter().extension_count(&utf16("x")), 1);
    }

    #[test]
    fn unigram_decrement_undoes_boundary_counts() {
        let mut lm = NGramProcessLm::new(3, 256, 3.0).unwrap();
        lm.train(&utf16("abracadabra")).unwrap();
        let marker = utf16("a")[0];
        lm.decrement_unigram(marker).unwrap();
        assert_eq!(lm.counter().count(&utf16("a")), 4);
        assert_eq!(lm.counter().count(&utf16("")), 10);
        // Longer n-grams through the character are untouched.
        assert_eq!(lm.counter().count(&utf16("ab")), 2);
        assert!(lm.decrement_unigram(utf16("z")[0]).is_err());
    }

    #[test]
    fn conditional_training_bounds_checked() {
        let mut lm = NGramProcessLm::new(3, 256, 3.0).unwrap();
        assert!(matches!(
            lm.train_conditional(&utf16("xy"), 3),
            Err(ModelError::ContextBounds {
                context_len: 3,
                len: 2
            })
        ));
    }

    #[test]
    fn prune_removes_rare_counts() {
        let mut lm = NGramProcessLm::new(3, 256, 3.0).unwrap();
        lm.train(&utf16("abracadabra")).unwrap();
        lm.prune(2);
        assert_eq!(lm.counter().count(&utf16("c")), 0);
        assert_eq!(lm.counter().count(&utf16("ab")), 2);
    }

    #[test]
    fn bit_stream_roundtrip() {
        let mut lm = NGramProcessLm::new(4, 128, 2.5).unwrap();
        lm.train(&utf16("abracadabra")).unwrap();
        lm.train(&utf16("candelabra")).unwrap();

        let mut writer = BitWriter::new(Vec::new());
        lm.write_to(&mut writer).unwrap();
        let bytes = writer.into_inner();

        let mut reader = BitReader::new(&bytes[..]);
        let back = NGramProcessLm::read_from(&mut reader).unwrap();
        assert_eq!(back, lm);
        close(
            back.log2_estimate(&utf16("abracadabra")),
            lm.log2_estimate(&utf16("abracadabra")),
        );
    }

    #[test]
    fn zero_lambda_factor_does_not_serialize() {
        let lm = NGramProcessLm::new(3, 256, 0.0).unwrap();
        let mut writer = BitWriter::new(Vec::new());
        assert!(matches!(
            lm.write_to(&mut writer),
            Err(ModelError::LambdaUnderflow(_))
        ));
    }

    #[test]
    fn truncated_stream_is_error() {
        let mut lm = NGramProcessLm::new(3, 256, 3.0).unwrap();
        lm.train(&utf16("abracadabra")).unwrap();
        let mut writer = BitWriter::new(Vec::new());
        lm.write_to(&mut writer).unwrap();
        let bytes = writer.into_inner();

        let mut reader = BitReader::new(&bytes[..2]);
        assert!(NGramProcessLm::read_from(&mut reader).is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let mut lm = NGramProcessLm::new(3, 256, 3.0).unwrap();
        lm.train(&utf16("abracadabra")).unwrap();
        let json = serde_json::to_string(&lm).unwrap();
        let back: NGramProcessLm = serde_json::from_str(&json).unwrap();
        assert_eq!(back, lm);
    }

    #[test]
    fn compiled_header_layout() {
        let mut lm = NGramProcessLm::new(2, 4, 1.0).unwrap();
        lm.train(&utf16("ab")).unwrap();
        let mut bytes = Vec::new();
        lm.compile_to(&mut bytes).unwrap();

        // maxNGram
        assert_eq!(&bytes[0..4], &2i32.to_be_bytes());
        // log2 uniform over 4 characters
        assert_eq!(&bytes[4..8], &(-2.0f32).to_be_bytes());
        // nodes: root, "a", "b", "ab" -- "a" and "b" internal at order 2
        assert_eq!(&bytes[8..12], &4i32.to_be_bytes());
        // root, "a", "b" are internal
        assert_eq!(&bytes[12..16], &2i32.to_be_bytes());
        // root record: char 0xFFFF, then first child 1 at record end
        assert_eq!(&bytes[16..18], &0xFFFFu16.to_be_bytes());
        assert_eq!(&bytes[26..30], &1i32.to_be_bytes());

        // 16 header + 3 internal * 14 + 1 leaf * 6
        assert_eq!(bytes.len(), 16 + 3 * 14 + 6);
    }

    #[test]
    fn compiled_untrained_model_is_root_only() {
        let lm = NGramProcessLm::new(3, 256, 3.0).unwrap();
        let mut bytes = Vec::new();
        lm.compile_to(&mut bytes).unwrap();
        assert_eq!(&bytes[8..12], &1i32.to_be_bytes());
        assert_eq!(&bytes[12..16], &0i32.to_be_bytes());
        assert_eq!(bytes.len(), 16 + 14);
    }
}
