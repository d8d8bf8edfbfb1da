//! Read-only compiled character n-gram process language model.
//!
//! [`CompiledNGramProcessLm`] loads the flat big-endian format emitted by the
//! dynamic model's compiler and serves estimates from parallel arrays with no
//! further allocation. Trie nodes sit in breadth-first order: each internal
//! node stores a first-child index, and its daughters run contiguously up to
//! the next node's first child, sorted by character for binary search.
//!
//! Each node's stored estimate is the full smoothed conditional estimate of
//! its last character given the rest of the n-gram, so evaluating a character
//! in context is a walk down suffix links accumulating `log2(1 - lambda)`
//! until a node for the character is found, bottoming out in the uniform
//! estimate at the root. Suffix links are reconstructed once at load time.
//!
//! Contexts are plain node indices, so streaming evaluation carries one
//! integer of state from character to character.

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};
use thiserror::Error;

/// Result type alias for compiled model operations.
pub type Result<T> = std::result::Result<T, CompiledError>;

/// Errors arising from loading and querying a compiled model.
#[derive(Error, Debug)]
pub enum CompiledError {
    /// Underlying byte stream failure, including truncation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A structural check on the loaded arrays failed.
    #[error("malformed compiled model: {0}")]
    Malformed(&'static str),

    /// A context index does not name a node of this model.
    #[error("context index {0} out of range")]
    ContextOutOfRange(usize),
}

/// A compiled Witten-Bell character n-gram model over flat arrays.
#[derive(Clone, Debug)]
pub struct CompiledNGramProcessLm {
    max_ngram: usize,
    log2_uniform: f32,
    /// Index of the last internal node; internals are exactly `0..=last_internal`.
    last_internal: usize,
    /// Last character of each node's n-gram; `0xFFFF` at the root.
    chars: Vec<u16>,
    /// Smoothed conditional log estimate of each node's last character.
    log2_probs: Vec<f32>,
    /// Backoff weight per internal node.
    log2_one_minus_lambdas: Vec<f32>,
    /// First daughter index per internal node, plus a one-past-the-end
    /// sentinel, so daughters of `i` are `first_child[i]..first_child[i + 1]`.
    first_child: Vec<u32>,
    /// Node index of each node's n-gram minus its first character; `-1` at
    /// the root.
    suffix: Vec<i32>,
}

impl CompiledNGramProcessLm {
    /// Load a compiled model from its binary form.
    pub fn read_from<R: Read>(input: &mut R) -> Result<Self> {
        let max_ngram = input.read_i32::<BigEndian>()?;
        if max_ngram < 1 {
            return Err(CompiledError::Malformed("n-gram order must be positive"));
        }
        let log2_uniform = input.read_f32::<BigEndian>()?;
        if !log2_uniform.is_finite() || log2_uniform > 0.0 {
            return Err(CompiledError::Malformed("uniform estimate out of range"));
        }
        let num_nodes = input.read_i32::<BigEndian>()?;
        if num_nodes < 1 {
            return Err(CompiledError::Malformed("node count must be positive"));
        }
        let num_nodes = num_nodes as usize;
        let last_internal = input.read_i32::<BigEndian>()?;
        if last_internal < 0 || last_internal as usize >= num_nodes {
            return Err(CompiledError::Malformed("internal count out of range"));
        }
        let last_internal = last_internal as usize;

        let mut chars = Vec::with_capacity(num_nodes);
        let mut log2_probs = Vec::with_capacity(num_nodes);
        let mut log2_one_minus_lambdas = Vec::with_capacity(last_internal + 1);
        let mut first_child = Vec::with_capacity(last_internal + 2);
        for index in 0..num_nodes {
            chars.push(input.read_u16::<BigEndian>()?);
            log2_probs.push(input.read_f32::<BigEndian>()?);
            if index <= last_internal {
                log2_one_minus_lambdas.push(input.read_f32::<BigEndian>()?);
                let child = input.read_i32::<BigEndian>()?;
                if child < 1 || child as usize > num_nodes {
                    return Err(CompiledError::Malformed("first-child index out of range"));
                }
                // Breadth-first layout: daughters always follow their parent.
                if child as usize <= index {
                    return Err(CompiledError::Malformed("first-child index precedes parent"));
                }
                if let Some(&prev) = first_child.last() {
                    if (child as u32) < prev {
                        return Err(CompiledError::Malformed(
                            "first-child indices must be non-decreasing",
                        ));
                    }
                }
                first_child.push(child as u32);
            }
        }
        first_child.push(num_nodes as u32);
        for i in 0..=last_internal {
            let lo = first_child[i] as usize;
            let hi = first_child[i + 1] as usize;
            if !chars[lo..hi].windows(2).all(|w| w[0] < w[1]) {
                return Err(CompiledError::Malformed("daughters not sorted by character"));
            }
        }

        let mut model = CompiledNGramProcessLm {
            max_ngram: max_ngram as usize,
            log2_uniform,
            last_internal,
            chars,
            log2_probs,
            log2_one_minus_lambdas,
            first_child,
            suffix: Vec::new(),
        };
        model.suffix = model.build_suffix_links()?;
        // Suffix targets sit one level shallower, so they must be internal;
        // the backoff walk indexes the lambda array through them.
        if model.suffix[1..]
            .iter()
            .any(|&at| at as usize > last_internal)
        {
            return Err(CompiledError::Malformed("suffix node is not internal"));
        }
        Ok(model)
    }

    /// Compute suffix links by rebuilding each node's n-gram from parent
    /// pointers and looking up the n-gram minus its first character.
    fn build_suffix_links(&self) -> Result<Vec<i32>> {
        let num_nodes = self.chars.len();
        let mut parent = vec![-1i64; num_nodes];
        for i in 0..=self.last_internal {
            let lo = self.first_child[i] as usize;
            let hi = self.first_child[i + 1] as usize;
            for child in lo..hi {
                parent[child] = i as i64;
            }
        }
        let mut suffix = vec![-1i32; num_nodes];
        let mut ngram = Vec::new();
        for index in 1..num_nodes {
            ngram.clear();
            let mut at = index as i64;
            while at > 0 {
                ngram.push(self.chars[at as usize]);
                at = parent[at as usize];
                if at == -1 {
                    return Err(CompiledError::Malformed("node unreachable from root"));
                }
            }
            ngram.reverse();
            // The suffix may be absent (a writer can decrement unigrams away
            // while longer n-grams keep them as interior characters); such
            // nodes back off straight to the root.
            suffix[index] = self.index_of(&ngram[1..]).unwrap_or(0) as i32;
        }
        Ok(suffix)
    }

    pub fn max_ngram(&self) -> usize {
        self.max_ngram
    }

    pub fn num_nodes(&self) -> usize {
        self.chars.len()
    }

    /// Log (base 2) of the uniform per-character estimate.
    pub fn log2_uniform_estimate(&self) -> f64 {
        self.log2_uniform as f64
    }

    /// Daughter of `index` along `c`, if any. Leaves have no daughters.
    fn child(&self, index: usize, c: u16) -> Option<usize> {
        if index > self.last_internal {
            return None;
        }
        let lo = self.first_child[index] as usize;
        let hi = self.first_child[index + 1] as usize;
        self.chars[lo..hi].binary_search(&c).ok().map(|at| lo + at)
    }

    /// Node index of exactly the n-gram `cs`, if present. The empty
    /// sequence names the root.
    pub fn index_of(&self, cs: &[u16]) -> Option<usize> {
        let mut index = 0;
        for &c in cs {
            index = self.child(index, c)?;
        }
        Some(index)
    }

    /// Node index of the longest suffix of `cs` present in the model,
    /// bounded by the usable context length. Falls back to the root.
    pub fn longest_context_index(&self, cs: &[u16]) -> usize {
        let start = cs.len().saturating_sub(self.max_ngram - 1);
        for from in start..=cs.len() {
            if let Some(index) = self.index_of(&cs[from..]) {
                return index;
            }
        }
        0
    }

    /// Suffix link of a node: the node for its n-gram minus the first
    /// character. `None` at the root.
    pub fn suffix_index(&self, index: usize) -> Result<Option<usize>> {
        if index >= self.chars.len() {
            return Err(CompiledError::ContextOutOfRange(index));
        }
        match self.suffix[index] {
            -1 => Ok(None),
            at => Ok(Some(at as usize)),
        }
    }

    /// The context reached by reading `c` in context `context`: the longest
    /// tracked suffix of the extended sequence. Always an internal node.
    pub fn next_context(&self, context: usize, c: u16) -> Result<usize> {
        if context >= self.chars.len() {
            return Err(CompiledError::ContextOutOfRange(context));
        }
        let mut at = self.internalize(context);
        loop {
            if let Some(child) = self.child(at, c) {
                return Ok(self.internalize(child));
            }
            if at == 0 {
                return Ok(0);
            }
            at = self.suffix[at] as usize;
        }
    }

    /// Log (base 2) conditional estimate of `c` in context `context`.
    pub fn log2_estimate(&self, context: usize, c: u16) -> Result<f64> {
        if context >= self.chars.len() {
            return Err(CompiledError::ContextOutOfRange(context));
        }
        Ok(self.estimate_from(context, c))
    }

    /// Log (base 2) joint estimate of `cs`, threading the context through
    /// each character in turn starting from the root.
    pub fn log2_estimate_seq(&self, cs: &[u16]) -> f64 {
        let mut context = 0;
        let mut total = 0.0;
        for &c in cs {
            total += self.estimate_from(context, c);
            context = self.next_context_from(context, c);
        }
        total
    }

    /// Replace a leaf by its suffix, which sits one level shallower and is
    /// always internal. Internal nodes pass through.
    fn internalize(&self, index: usize) -> usize {
        if index > self.last_internal {
            self.suffix[index] as usize
        } else {
            index
        }
    }

    fn next_context_from(&self, context: usize, c: u16) -> usize {
        let mut at = self.internalize(context);
        loop {
            if let Some(child) = self.child(at, c) {
                return self.internalize(child);
            }
            if at == 0 {
                return 0;
            }
            at = self.suffix[at] as usize;
        }
    }

    fn estimate_from(&self, context: usize, c: u16) -> f64 {
        let mut at = self.internalize(context);
        let mut backoff = 0.0;
        loop {
            if let Some(child) = self.child(at, c) {
                return backoff + self.log2_probs[child] as f64;
            }
            backoff += self.log2_one_minus_lambdas[at] as f64;
            if at == 0 {
                return backoff + self.log2_uniform as f64;
            }
            at = self.suffix[at] as usize;
        }
    }
}
