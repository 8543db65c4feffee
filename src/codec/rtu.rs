// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU framing: core + CRC16 (little-endian)

use bytes::{BufMut as _, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::check_core_size;
use crate::{CommandFrame, Error, Result};

/// station + function + CRC + at least one payload byte
const MIN_FRAME_LEN: usize = 5;

/// CRC16 with the Modbus polynomial.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFF;
    for x in data {
        crc ^= u16::from(*x);
        for _ in 0..8 {
            if (crc & 0x0001) != 0 {
                crc >>= 1;
                crc ^= 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Append the CRC to `core`.
#[must_use]
pub fn wrap(core: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(core.len() + 2);
    buf.put_slice(core);
    buf.put_u16_le(crc16(core));
    buf.freeze()
}

/// Verify the CRC of a complete frame and strip it.
pub fn unwrap(frame: &[u8]) -> Result<Bytes> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(Error::framing(format!(
            "RTU frame too short: {} bytes",
            frame.len()
        )));
    }
    let (core, crc) = frame.split_at(frame.len() - 2);
    let actual = u16::from_le_bytes([crc[0], crc[1]]);
    let expected = crc16(core);
    if actual != expected {
        return Err(Error::Checksum { expected, actual });
    }
    Ok(Bytes::copy_from_slice(core))
}

/// Length of the complete response frame, CRC included.
///
/// Returns `None` while the header is incomplete.
fn response_len(buf: &[u8]) -> Result<Option<usize>> {
    if buf.len() < 2 {
        return Ok(None);
    }
    let payload_len = match buf[1] {
        0x01..=0x04 => {
            let Some(&byte_count) = buf.get(2) else {
                return Ok(None);
            };
            1 + usize::from(byte_count)
        }
        0x05 | 0x06 | 0x0F | 0x10 => 4,
        0x16 => 6,
        code if code & 0x80 != 0 => 1,
        code => {
            return Err(Error::framing(format!(
                "unexpected function {code} in RTU response"
            )));
        }
    };
    Ok(Some(2 + payload_len + 2))
}

/// Codec for Modbus RTU, over serial lines or tunneled through TCP/UDP.
#[derive(Debug, Clone, Copy, Default)]
pub struct RtuCodec;

impl Encoder<CommandFrame> for RtuCodec {
    type Error = Error;

    fn encode(&mut self, frame: CommandFrame, buf: &mut BytesMut) -> Result<()> {
        check_core_size(frame.encoded_len())?;
        buf.reserve(frame.encoded_len() + 2);
        let start = buf.len();
        frame.encode(buf);
        let crc = crc16(&buf[start..]);
        buf.put_u16_le(crc);
        Ok(())
    }
}

impl Decoder for RtuCodec {
    type Item = Bytes;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>> {
        let Some(len) = response_len(buf)? else {
            return Ok(None);
        };
        if buf.len() < len {
            return Ok(None);
        }
        let frame = buf.split_to(len);
        unwrap(&frame).map(Some)
    }
}
