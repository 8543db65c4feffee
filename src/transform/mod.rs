// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion between wire bytes and typed values.
//!
//! Controllers disagree about the byte layout of values wider than a single
//! register. A [`ByteTransform`] combines one of three byte strategies with a
//! [`WordOrder`] permutation for 32 and 64 bit values:
//!
//! - [`TransformKind::Regular`]: the bytes are used as they are.
//! - [`TransformKind::ReverseBytes`]: every value is fully byte-reversed first.
//! - [`TransformKind::ReverseWord`]: the two bytes of every 16 bit word are
//!   swapped first, then the value is decoded like [`TransformKind::Regular`].
//!
//! After that the [`WordOrder`] permutation is applied and the result is read
//! as a little-endian number.

mod text;

use byteorder::{ByteOrder as _, LittleEndian};

use crate::{Error, Result};

pub use self::text::TextEncoding;

/// Byte permutation inside 4 and 8 byte groups.
///
/// The letters name the source bytes in the order they end up in memory,
/// `A` being the most significant byte of the value:
///
/// | order  | bytes on the wire for `0x0A0B0C0D` |
/// |--------|------------------------------------|
/// | `ABCD` | `0A 0B 0C 0D`                      |
/// | `BADC` | `0B 0A 0D 0C`                      |
/// | `CDAB` | `0C 0D 0A 0B`                      |
/// | `DCBA` | `0D 0C 0B 0A`                      |
///
/// for a [`TransformKind::Regular`] transform. The 8 byte case applies the same
/// scheme to four 16 bit words.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordOrder {
    ABCD,
    BADC,
    CDAB,
    DCBA,
}

impl WordOrder {
    const fn table4(self) -> [usize; 4] {
        match self {
            Self::ABCD => [3, 2, 1, 0],
            Self::BADC => [2, 3, 0, 1],
            Self::CDAB => [1, 0, 3, 2],
            Self::DCBA => [0, 1, 2, 3],
        }
    }

    const fn table8(self) -> [usize; 8] {
        match self {
            Self::ABCD => [7, 6, 5, 4, 3, 2, 1, 0],
            Self::BADC => [6, 7, 4, 5, 2, 3, 0, 1],
            Self::CDAB => [1, 0, 3, 2, 5, 4, 7, 6],
            Self::DCBA => [0, 1, 2, 3, 4, 5, 6, 7],
        }
    }

    /// Rearrange a 4 or 8 byte group in place. Other sizes are left untouched.
    ///
    /// Every permutation is its own inverse.
    fn arrange(self, group: &mut [u8]) {
        let mut src = [0u8; 8];
        src[..group.len()].copy_from_slice(group);
        match group.len() {
            4 => {
                for (dst, &idx) in group.iter_mut().zip(self.table4().iter()) {
                    *dst = src[idx];
                }
            }
            8 => {
                for (dst, &idx) in group.iter_mut().zip(self.table8().iter()) {
                    *dst = src[idx];
                }
            }
            _ => {}
        }
    }
}

/// Byte strategy of a [`ByteTransform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    Regular,
    ReverseBytes,
    ReverseWord,
}

/// A numeric type that can be decoded from and encoded into wire bytes.
pub trait Value: Copy + Sized {
    /// Number of bytes of the encoded value.
    const WIDTH: usize;

    /// Read from exactly [`Self::WIDTH`] little-endian bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Write into exactly [`Self::WIDTH`] little-endian bytes.
    fn write_le(self, bytes: &mut [u8]);
}

macro_rules! impl_value {
    ($($ty:ty: $width:literal, $read:ident, $write:ident;)*) => {
        $(
            impl Value for $ty {
                const WIDTH: usize = $width;

                fn read_le(bytes: &[u8]) -> Self {
                    LittleEndian::$read(bytes)
                }

                fn write_le(self, bytes: &mut [u8]) {
                    LittleEndian::$write(bytes, self);
                }
            }
        )*
    };
}

impl_value! {
    i16: 2, read_i16, write_i16;
    u16: 2, read_u16, write_u16;
    i32: 4, read_i32, write_i32;
    u32: 4, read_u32, write_u32;
    i64: 8, read_i64, write_i64;
    u64: 8, read_u64, write_u64;
    f32: 4, read_f32, write_f32;
    f64: 8, read_f64, write_f64;
}

/// Stateful byte codec: byte strategy, word order and string handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteTransform {
    kind: TransformKind,
    order: WordOrder,
    reverse_string_words: bool,
}

impl Default for ByteTransform {
    /// Big-endian registers with the high word first, i.e. the layout
    /// described by the Modbus application protocol.
    fn default() -> Self {
        Self::reverse_word(WordOrder::BADC)
    }
}

impl ByteTransform {
    #[must_use]
    pub const fn new(kind: TransformKind, order: WordOrder) -> Self {
        Self {
            kind,
            order,
            reverse_string_words: false,
        }
    }

    #[must_use]
    pub const fn regular(order: WordOrder) -> Self {
        Self::new(TransformKind::Regular, order)
    }

    #[must_use]
    pub const fn reverse_bytes(order: WordOrder) -> Self {
        Self::new(TransformKind::ReverseBytes, order)
    }

    #[must_use]
    pub const fn reverse_word(order: WordOrder) -> Self {
        Self::new(TransformKind::ReverseWord, order)
    }

    /// Swap the two bytes of every word of decoded and encoded strings.
    #[must_use]
    pub const fn with_string_reverse(mut self, reverse_string_words: bool) -> Self {
        self.reverse_string_words = reverse_string_words;
        self
    }

    #[must_use]
    pub const fn with_order(mut self, order: WordOrder) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub const fn kind(&self) -> TransformKind {
        self.kind
    }

    #[must_use]
    pub const fn order(&self) -> WordOrder {
        self.order
    }

    #[must_use]
    pub const fn reverse_string_words(&self) -> bool {
        self.reverse_string_words
    }

    /// Wire bytes of a single value to native little-endian bytes.
    fn to_native(self, group: &mut [u8]) {
        match self.kind {
            TransformKind::Regular => {}
            TransformKind::ReverseBytes => group.reverse(),
            TransformKind::ReverseWord => swap_word_bytes(group),
        }
        self.order.arrange(group);
    }

    /// Inverse of [`Self::to_native`].
    fn to_wire(self, group: &mut [u8]) {
        self.order.arrange(group);
        match self.kind {
            TransformKind::Regular => {}
            TransformKind::ReverseBytes => group.reverse(),
            TransformKind::ReverseWord => swap_word_bytes(group),
        }
    }

    /// Decode a single value at `offset`.
    pub fn decode<T: Value>(&self, buf: &[u8], offset: usize) -> Result<T> {
        check_bounds(buf, offset, T::WIDTH)?;
        let mut group = [0u8; 8];
        let group = &mut group[..T::WIDTH];
        group.copy_from_slice(&buf[offset..offset + T::WIDTH]);
        self.to_native(group);
        Ok(T::read_le(group))
    }

    /// Decode `count` consecutive values starting at `offset`.
    pub fn decode_array<T: Value>(&self, buf: &[u8], offset: usize, count: usize) -> Result<Vec<T>> {
        let length = count.checked_mul(T::WIDTH).ok_or(Error::Bounds {
            offset,
            length: usize::MAX,
            available: buf.len(),
        })?;
        check_bounds(buf, offset, length)?;
        (0..count)
            .map(|i| self.decode(buf, offset + i * T::WIDTH))
            .collect()
    }

    /// Encode all `values` into consecutive wire bytes.
    #[must_use]
    pub fn encode<T: Value>(&self, values: &[T]) -> Vec<u8> {
        let mut buf = vec![0u8; values.len() * T::WIDTH];
        for (group, value) in buf.chunks_exact_mut(T::WIDTH).zip(values) {
            value.write_le(group);
            self.to_wire(group);
        }
        buf
    }

    /// Decode `length` bytes at `offset` as text.
    ///
    /// Byte pairs are swapped before the text decoding if string word
    /// reversal is enabled.
    pub fn decode_string(
        &self,
        buf: &[u8],
        offset: usize,
        length: usize,
        encoding: TextEncoding,
    ) -> Result<String> {
        check_bounds(buf, offset, length)?;
        let mut bytes = buf[offset..offset + length].to_vec();
        if self.reverse_string_words {
            swap_word_bytes(&mut bytes);
        }
        encoding.decode(&bytes)
    }

    /// Inverse of [`Self::decode_string`].
    #[must_use]
    pub fn encode_string(&self, text: &str, encoding: TextEncoding) -> Vec<u8> {
        let mut bytes = encoding.encode(text);
        if self.reverse_string_words {
            swap_word_bytes(&mut bytes);
        }
        bytes
    }
}

fn check_bounds(buf: &[u8], offset: usize, length: usize) -> Result<()> {
    match offset.checked_add(length) {
        Some(end) if end <= buf.len() => Ok(()),
        _ => Err(Error::Bounds {
            offset,
            length,
            available: buf.len(),
        }),
    }
}

/// Swap the two bytes of every 16 bit word. A trailing odd byte stays in place.
pub fn swap_word_bytes(bytes: &mut [u8]) {
    for pair in bytes.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
}

/// Unpack `bit_count` bits starting at bit `bit_offset`.
///
/// Bits are packed least significant bit first within each byte.
pub fn decode_bits(buf: &[u8], bit_offset: usize, bit_count: usize) -> Result<Vec<bool>> {
    let available = buf.len() * 8;
    match bit_offset.checked_add(bit_count) {
        Some(end) if end <= available => {}
        _ => {
            return Err(Error::Bounds {
                offset: bit_offset,
                length: bit_count,
                available,
            })
        }
    }
    Ok((bit_offset..bit_offset + bit_count)
        .map(|i| buf[i / 8] & (1 << (i % 8)) != 0)
        .collect())
}

/// Pack bits least significant bit first, padding the last byte with zeros.
#[must_use]
pub fn encode_bits(bits: &[bool]) -> Vec<u8> {
    let mut buf = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        buf[i / 8] |= u8::from(*bit) << (i % 8);
    }
    buf
}
