// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{Error, Result};

/// Text encoding of string values stored in registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    /// 7 bit ASCII. Characters outside of ASCII are encoded as `?`.
    #[default]
    Ascii,
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    pub(crate) fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            Self::Ascii => {
                if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
                    return Err(Error::Encoding(format!(
                        "non-ASCII byte 0x{:02X} at position {pos}",
                        bytes[pos]
                    )));
                }
                Ok(bytes.iter().map(|&b| char::from(b)).collect())
            }
            Self::Utf8 => {
                String::from_utf8(bytes.to_vec()).map_err(|err| Error::Encoding(err.to_string()))
            }
            Self::Utf16Le => decode_utf16(bytes, u16::from_le_bytes),
            Self::Utf16Be => decode_utf16(bytes, u16::from_be_bytes),
        }
    }

    pub(crate) fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Self::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        }
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::Encoding(format!(
            "odd number of bytes for UTF-16: {}",
            bytes.len()
        )));
    }
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|err| Error::Encoding(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii() {
        assert_eq!(TextEncoding::Ascii.decode(b"Hi!").unwrap(), "Hi!");
        assert!(TextEncoding::Ascii.decode(&[0x41, 0x80]).is_err());
        assert_eq!(TextEncoding::Ascii.encode("Aä"), b"A?");
    }

    #[test]
    fn utf8() {
        let bytes = TextEncoding::Utf8.encode("Grüße");
        assert_eq!(TextEncoding::Utf8.decode(&bytes).unwrap(), "Grüße");
        assert!(TextEncoding::Utf8.decode(&[0xC3]).is_err());
    }

    #[test]
    fn utf16() {
        assert_eq!(TextEncoding::Utf16Le.encode("A€"), vec![0x41, 0x00, 0xAC, 0x20]);
        assert_eq!(TextEncoding::Utf16Be.encode("A€"), vec![0x00, 0x41, 0x20, 0xAC]);
        assert_eq!(
            TextEncoding::Utf16Be
                .decode(&[0x00, 0x41, 0x20, 0xAC])
                .unwrap(),
            "A€"
        );
        assert!(TextEncoding::Utf16Le.decode(&[0x41]).is_err());
        // Unpaired surrogate
        assert!(TextEncoding::Utf16Le.decode(&[0x00, 0xD8]).is_err());
    }
}
