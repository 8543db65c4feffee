// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP framing: `[transaction id][protocol id][length]` + core

use std::sync::{
    atomic::{AtomicU16, Ordering},
    Arc,
};

use byteorder::{BigEndian, ByteOrder as _};
use bytes::{BufMut as _, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{check_core_size, u16_len, MAX_CORE_SIZE};
use crate::{CommandFrame, Error, Result};

const HEADER_LEN: usize = 6;
const PROTOCOL_ID: u16 = 0x0000;

/// Prepend the TCP header to `core`.
#[must_use]
pub fn wrap(transaction_id: u16, core: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + core.len());
    buf.put_u16(transaction_id);
    buf.put_u16(PROTOCOL_ID);
    buf.put_u16(u16_len(core.len()));
    buf.put_slice(core);
    buf.freeze()
}

/// Split a complete TCP frame into transaction id and core.
pub fn unwrap(frame: &[u8]) -> Result<(u16, Bytes)> {
    if frame.len() < HEADER_LEN {
        return Err(Error::framing(format!(
            "TCP frame too short: {} bytes",
            frame.len()
        )));
    }
    let (transaction_id, len) = parse_header(frame)?;
    if frame.len() != HEADER_LEN + len {
        return Err(Error::framing(format!(
            "TCP header declares {len} bytes but {} follow",
            frame.len() - HEADER_LEN
        )));
    }
    Ok((transaction_id, Bytes::copy_from_slice(&frame[HEADER_LEN..])))
}

fn parse_header(header: &[u8]) -> Result<(u16, usize)> {
    let transaction_id = BigEndian::read_u16(&header[0..2]);
    let protocol_id = BigEndian::read_u16(&header[2..4]);
    let len = usize::from(BigEndian::read_u16(&header[4..6]));
    if protocol_id != PROTOCOL_ID {
        return Err(Error::framing(format!(
            "invalid protocol id 0x{protocol_id:04X}"
        )));
    }
    if !(2..=MAX_CORE_SIZE).contains(&len) {
        return Err(Error::framing(format!("invalid length {len} in TCP header")));
    }
    Ok((transaction_id, len))
}

/// Codec for Modbus TCP.
///
/// Clones share the transaction id counter, so ids keep incrementing
/// across reconnects.
#[derive(Debug, Clone)]
pub struct TcpCodec {
    next_transaction_id: Arc<AtomicU16>,
    check_transaction_id: bool,
    pending: Option<u16>,
}

impl Default for TcpCodec {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TcpCodec {
    #[must_use]
    pub fn new(check_transaction_id: bool) -> Self {
        Self {
            next_transaction_id: Arc::new(AtomicU16::new(0)),
            check_transaction_id,
            pending: None,
        }
    }

    /// Wraps around to `0` after `u16::MAX`.
    fn next_transaction_id(&self) -> u16 {
        self.next_transaction_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Encoder<CommandFrame> for TcpCodec {
    type Error = Error;

    fn encode(&mut self, frame: CommandFrame, buf: &mut BytesMut) -> Result<()> {
        check_core_size(frame.encoded_len())?;
        let transaction_id = self.next_transaction_id();
        buf.reserve(HEADER_LEN + frame.encoded_len());
        buf.put_u16(transaction_id);
        buf.put_u16(PROTOCOL_ID);
        buf.put_u16(u16_len(frame.encoded_len()));
        frame.encode(buf);
        self.pending = Some(transaction_id);
        Ok(())
    }
}

impl Decoder for TcpCodec {
    type Item = Bytes;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }
        let (transaction_id, len) = parse_header(buf)?;
        if buf.len() < HEADER_LEN + len {
            return Ok(None);
        }
        let mut frame = buf.split_to(HEADER_LEN + len);
        if self.check_transaction_id {
            if let Some(expected) = self.pending {
                if transaction_id != expected {
                    return Err(Error::framing(format!(
                        "unexpected transaction id {transaction_id}, expected {expected}"
                    )));
                }
            }
        }
        self.pending = None;
        Ok(Some(frame.split_off(HEADER_LEN).freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FunctionCode;

    fn read_request() -> CommandFrame {
        CommandFrame::new(
            0x66,
            FunctionCode::ReadInputRegisters,
            vec![0x00, 0x23, 0x00, 0x05],
        )
    }

    #[test]
    fn encode_read_request() {
        let mut codec = TcpCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(read_request(), &mut buf).unwrap();
        assert_eq!(
            &buf[..],
            &[0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x66, 0x04, 0x00, 0x23, 0x00, 0x05]
        );
        assert_eq!(buf.freeze(), wrap(0, &read_request().to_bytes()));
    }

    #[test]
    fn transaction_id_wraps() {
        let mut codec = TcpCodec::default();
        codec.next_transaction_id.store(u16::MAX - 1, Ordering::Relaxed);
        let mut ids = Vec::new();
        for _ in 0..3 {
            let mut buf = BytesMut::new();
            codec.encode(read_request(), &mut buf).unwrap();
            ids.push(BigEndian::read_u16(&buf[0..2]));
        }
        assert_eq!(ids, vec![u16::MAX - 1, u16::MAX, 0]);
    }

    #[test]
    fn clones_share_transaction_ids() {
        let mut first = TcpCodec::default();
        let mut second = first.clone();
        let mut buf = BytesMut::new();
        first.encode(read_request(), &mut buf).unwrap();
        buf.clear();
        second.encode(read_request(), &mut buf).unwrap();
        assert_eq!(BigEndian::read_u16(&buf[0..2]), 1);
    }

    #[test]
    fn decode_header_fragment() {
        let mut codec = TcpCodec::default();
        let mut buf = BytesMut::from(&[0x00, 0x11, 0x00, 0x00, 0x00][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn decode_partly_received_message() {
        let mut codec = TcpCodec::default();
        let mut buf = BytesMut::from(
            &[
                0x00, // transaction id HI
                0x11, // transaction id LO
                0x00, // protocol id HI
                0x00, // protocol id LO
                0x00, // length HI
                0x03, // length LO
                0x66, // station
                0x02,
            ][..],
        );
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn decode_response() {
        let mut codec = TcpCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(read_request(), &mut buf).unwrap();

        let mut buf = BytesMut::from(
            &[
                0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x66, 0x04, 0x02, 0x12, 0x34, 0xFF,
            ][..],
        );
        let core = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&core[..], &[0x66, 0x04, 0x02, 0x12, 0x34]);
        assert_eq!(&buf[..], &[0xFF]);
    }

    #[test]
    fn decode_with_invalid_protocol_id() {
        let mut codec = TcpCodec::default();
        let mut buf = BytesMut::from(&[0x00, 0x00, 0x33, 0x12, 0x00, 0x03, 0x66, 0x82, 0x03][..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, Error::Framing(_)));
        assert_eq!(err.to_string(), "invalid frame: invalid protocol id 0x3312");
    }

    #[test]
    fn decode_with_invalid_transaction_id() {
        let mut codec = TcpCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(read_request(), &mut buf).unwrap();
        let mut buf = BytesMut::from(&[0x00, 0x07, 0x00, 0x00, 0x00, 0x03, 0x66, 0x84, 0x02][..]);
        assert!(matches!(codec.decode(&mut buf), Err(Error::Framing(_))));
    }

    #[test]
    fn decode_without_transaction_id_check() {
        let mut codec = TcpCodec::new(false);
        let mut buf = BytesMut::new();
        codec.encode(read_request(), &mut buf).unwrap();
        let mut buf = BytesMut::from(&[0x00, 0x07, 0x00, 0x00, 0x00, 0x03, 0x66, 0x84, 0x02][..]);
        let core = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&core[..], &[0x66, 0x84, 0x02]);
    }

    #[test]
    fn unwrap_frame() {
        let frame = wrap(0x1234, &[0x01, 0x06, 0x00, 0x01, 0x00, 0x03]);
        let (transaction_id, core) = unwrap(&frame).unwrap();
        assert_eq!(transaction_id, 0x1234);
        assert_eq!(&core[..], &[0x01, 0x06, 0x00, 0x01, 0x00, 0x03]);
        assert!(unwrap(&frame[..frame.len() - 1]).is_err());
        assert!(unwrap(&frame[..4]).is_err());
    }
}
