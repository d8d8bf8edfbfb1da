//! Bit-level input/output with Elias delta coding for positive integers.
//!
//! This crate provides the [`BitOutput`] / [`BitInput`] trait pair used by the
//! trie codec: a universal (prefix-free) code for positive integers, written
//! MSB-first over ordinary byte streams. The code is self-delimiting, so
//! back-to-back deltas need no framing markers.
//!
//! The concrete [`BitWriter`] / [`BitReader`] implementations work over any
//! `std::io::Write` / `std::io::Read`. Each instance holds per-stream bit
//! position state and serves exactly one stream traversal; it must not be
//! shared between threads.

use std::io::{ErrorKind, Read, Write};

use thiserror::Error;

/// Result type alias for bit stream operations.
pub type Result<T> = std::result::Result<T, BitError>;

/// Errors arising from bit-level reads and writes.
#[derive(Error, Debug)]
pub enum BitError {
    /// Underlying byte stream failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Delta codes are defined for positive integers only.
    #[error("delta code requires a positive value, got {0}")]
    NonPositive(u64),

    /// The stream ended in the middle of a code word.
    #[error("unexpected end of bit stream")]
    UnexpectedEof,

    /// A code word claimed more than 64 significant bits.
    #[error("malformed delta code: length prefix out of range")]
    Malformed,
}

/// Sink for delta-coded positive integers.
pub trait BitOutput {
    /// Write one positive integer using Elias delta coding.
    fn write_delta(&mut self, n: u64) -> Result<()>;

    /// Pad the final partial byte with zero bits and flush the underlying
    /// stream. Must be called once after the last `write_delta`.
    fn flush(&mut self) -> Result<()>;
}

/// Source of delta-coded positive integers.
pub trait BitInput {
    /// Read one Elias-delta-coded positive integer.
    fn read_delta(&mut self) -> Result<u64>;
}

impl<T: BitOutput + ?Sized> BitOutput for &mut T {
    fn write_delta(&mut self, n: u64) -> Result<()> {
        (**self).write_delta(n)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<T: BitInput + ?Sized> BitInput for &mut T {
    fn read_delta(&mut self) -> Result<u64> {
        (**self).read_delta()
    }
}

/// MSB-first bit writer over any `std::io::Write`.
#[derive(Debug)]
pub struct BitWriter<W: Write> {
    inner: W,
    /// Pending bits, left-aligned as they accumulate.
    buf: u8,
    /// Number of pending bits in `buf` (0..8).
    used: u8,
}

impl<W: Write> BitWriter<W> {
    pub fn new(inner: W) -> Self {
        BitWriter {
            inner,
            buf: 0,
            used: 0,
        }
    }

    /// Consume the writer, returning the underlying stream.
    ///
    /// Pending bits that have not been flushed are discarded.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.buf = (self.buf << 1) | (bit as u8);
        self.used += 1;
        if self.used == 8 {
            self.inner.write_all(&[self.buf])?;
            self.buf = 0;
            self.used = 0;
        }
        Ok(())
    }

    /// Write the low `count` bits of `value`, most significant first.
    fn write_bits(&mut self, value: u64, count: u32) -> Result<()> {
        for shift in (0..count).rev() {
            self.write_bit((value >> shift) & 1 == 1)?;
        }
        Ok(())
    }
}

impl<W: Write> BitOutput for BitWriter<W> {
    fn write_delta(&mut self, n: u64) -> Result<()> {
        if n == 0 {
            return Err(BitError::NonPositive(n));
        }
        // Elias delta: gamma-code the bit length of n, then the remaining
        // bits of n below its leading one.
        let num_bits = 64 - n.leading_zeros(); // >= 1
        let len_bits = 32 - num_bits.leading_zeros(); // bit length of num_bits
        self.write_bits(0, len_bits - 1)?;
        self.write_bits(num_bits as u64, len_bits)?;
        self.write_bits(n, num_bits - 1)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.used > 0 {
            let byte = self.buf << (8 - self.used);
            self.inner.write_all(&[byte])?;
            self.buf = 0;
            self.used = 0;
        }
        self.inner.flush()?;
        Ok(())
    }
}

/// MSB-first bit reader over any `std::io::Read`.
#[derive(Debug)]
pub struct BitReader<R: Read> {
    inner: R,
    /// Remaining bits of the current byte, left-aligned.
    buf: u8,
    /// Number of unread bits in `buf` (0..8).
    left: u8,
}

impl<R: Read> BitReader<R> {
    pub fn new(inner: R) -> Self {
        BitReader {
            inner,
            buf: 0,
            left: 0,
        }
    }

    /// Consume the reader, returning the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_bit(&mut self) -> Result<bool> {
        if self.left == 0 {
            let mut byte = [0u8; 1];
            if let Err(e) = self.inner.read_exact(&mut byte) {
                return if e.kind() == ErrorKind::UnexpectedEof {
                    Err(BitError::UnexpectedEof)
                } else {
                    Err(BitError::Io(e))
                };
            }
            self.buf = byte[0];
            self.left = 8;
        }
        let bit = self.buf & 0x80 != 0;
        self.buf <<= 1;
        self.left -= 1;
        Ok(bit)
    }

    /// Read `count` bits, most significant first.
    fn read_bits(&mut self, count: u32) -> Result<u64> {
        let mut value = 0u64;
        for _ in 0..count {
            value = (value << 1) | (self.read_bit()? as u64);
        }
        Ok(value)
    }
}

impl<R: Read> BitInput for BitReader<R> {
    fn read_delta(&mut self) -> Result<u64> {
        // Gamma decode: count zeros up to the first one, then that many
        // further bits complete the length prefix.
        let mut zeros = 0u32;
        while !self.read_bit()? {
            zeros += 1;
            if zeros > 6 {
                // num_bits <= 64 means its gamma code has at most 6 zeros.
                return Err(BitError::Malformed);
            }
        }
        let num_bits = (1u64 << zeros) | self.read_bits(zeros)?;
        if num_bits == 0 || num_bits > 64 {
            return Err(BitError::Malformed);
        }
        let low = self.read_bits(num_bits as u32 - 1)?;
        Ok((1u64 << (num_bits - 1)) | low)
    }
}
