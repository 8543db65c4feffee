// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport framings of a [`CommandFrame`].
//!
//! Every codec encodes a [`CommandFrame`] into its envelope and decodes a
//! received envelope into the transport independent part
//! `[station][function][payload]` of the response.

use bytes::Bytes;
use tokio_util::codec::{Decoder, Encoder};

use crate::{CommandFrame, Error};

#[cfg(feature = "ascii")]
pub mod ascii;

#[cfg(feature = "rtu")]
pub mod rtu;

#[cfg(feature = "tcp")]
pub mod tcp;

/// Maximum PDU size, function code included.
pub(crate) const MAX_PDU_SIZE: usize = 253;

/// Maximum size of `[station][function][payload]`.
pub(crate) const MAX_CORE_SIZE: usize = 1 + MAX_PDU_SIZE;

/// A framing that can be used by an executor.
///
/// Clones of a codec are handed to every new connection.
pub trait FrameCodec:
    Encoder<CommandFrame, Error = Error> + Decoder<Item = Bytes, Error = Error> + Clone + Send + 'static
{
}

impl<T> FrameCodec for T where
    T: Encoder<CommandFrame, Error = Error>
        + Decoder<Item = Bytes, Error = Error>
        + Clone
        + Send
        + 'static
{
}

#[cfg(feature = "tcp")]
#[allow(clippy::cast_possible_truncation)]
fn u16_len(len: usize) -> u16 {
    // Bounded by MAX_CORE_SIZE.
    debug_assert!(len <= u16::MAX.into());
    len as u16
}

fn check_core_size(len: usize) -> Result<(), Error> {
    if len > MAX_CORE_SIZE {
        return Err(Error::Argument(format!(
            "frame of {len} bytes exceeds the maximum of {MAX_CORE_SIZE} bytes"
        )));
    }
    Ok(())
}
