// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus ASCII framing: `:` + hex(core + LRC) + CRLF

use bytes::{BufMut as _, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{check_core_size, MAX_CORE_SIZE};
use crate::{CommandFrame, Error, Result};

const START: u8 = b':';
const END: &[u8] = b"\r\n";

/// Longest valid frame: marker, hex digits of core and LRC, CRLF.
const MAX_FRAME_LEN: usize = 1 + 2 * (MAX_CORE_SIZE + 1) + 2;

/// Two's complement of the byte sum.
#[must_use]
pub fn lrc(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |sum, b| sum.wrapping_add(*b))
        .wrapping_neg()
}

/// Frame `core` with markers and LRC.
#[must_use]
pub fn wrap(core: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + 2 * (core.len() + 1) + 2);
    put_frame(core, &mut buf);
    buf.freeze()
}

fn put_frame(core: &[u8], buf: &mut BytesMut) {
    buf.put_u8(START);
    buf.put_slice(hex::encode_upper(core).as_bytes());
    buf.put_slice(hex::encode_upper([lrc(core)]).as_bytes());
    buf.put_slice(END);
}

/// Verify markers and LRC of a complete frame and return the core.
pub fn unwrap(frame: &[u8]) -> Result<Bytes> {
    let Some(body) = frame
        .strip_prefix(&[START])
        .and_then(|rest| rest.strip_suffix(END))
    else {
        return Err(Error::framing("ASCII frame without start or end marker"));
    };
    let mut data = hex::decode(body)
        .map_err(|err| Error::framing(format!("invalid hex in ASCII frame: {err}")))?;
    if data.len() < 3 {
        return Err(Error::framing(format!(
            "ASCII frame too short: {} bytes",
            data.len()
        )));
    }
    let actual = data[data.len() - 1];
    data.truncate(data.len() - 1);
    let expected = lrc(&data);
    if actual != expected {
        return Err(Error::Checksum {
            expected: expected.into(),
            actual: actual.into(),
        });
    }
    Ok(data.into())
}

/// Codec for Modbus ASCII.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiCodec;

impl Encoder<CommandFrame> for AsciiCodec {
    type Error = Error;

    fn encode(&mut self, frame: CommandFrame, buf: &mut BytesMut) -> Result<()> {
        check_core_size(frame.encoded_len())?;
        let core = frame.to_bytes();
        buf.reserve(1 + 2 * (core.len() + 1) + 2);
        put_frame(&core, buf);
        Ok(())
    }
}

impl Decoder for AsciiCodec {
    type Item = Bytes;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>> {
        let Some(pos) = buf.iter().position(|b| *b == b'\n') else {
            if buf.len() > MAX_FRAME_LEN {
                return Err(Error::framing("ASCII frame without end marker"));
            }
            return Ok(None);
        };
        let frame = buf.split_to(pos + 1);
        unwrap(&frame).map(Some)
    }
}
