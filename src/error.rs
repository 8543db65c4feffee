// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.

use std::{io, time::Duration};

use thiserror::Error;

use crate::{ExceptionCode, ExceptionResponse};

/// Specialized [`std::result::Result`] type for all operations of this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all _Modbus_ operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The rich-text address could not be parsed or is out of range.
    #[error("invalid address `{address}`: {reason}")]
    Address { address: String, reason: String },

    /// The request is malformed, e.g. a zero length or a quantity that
    /// exceeds the protocol limit.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// An offset or length points outside of the available bytes.
    #[error("out of bounds: offset {offset} + length {length} exceeds {available} bytes")]
    Bounds {
        offset: usize,
        length: usize,
        available: usize,
    },

    /// The bytes are not valid text in the requested encoding.
    #[error("invalid text: {0}")]
    Encoding(String),

    /// The server responded with a _Modbus_ exception.
    #[error(transparent)]
    Exception(#[from] ExceptionResponse),

    /// The CRC16 (RTU) or LRC (ASCII) of a received frame is wrong.
    #[error("checksum mismatch: expected 0x{expected:04X}, actual 0x{actual:04X}")]
    Checksum { expected: u16, actual: u16 },

    /// The received frame does not have the expected shape.
    #[error("invalid frame: {0}")]
    Framing(String),

    /// Connecting or receiving did not finish in time.
    ///
    /// The connection has been closed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The transport failed or has been closed by the remote side.
    #[error(transparent)]
    Transport(#[from] io::Error),

    /// The request has been cancelled while waiting for the connection.
    #[error("cancelled")]
    Cancelled,
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed address, argument or data.
    Parse,
    /// The server returned a valid exception frame.
    Protocol,
    /// CRC16 or LRC mismatch.
    Checksum,
    /// Unexpected length, marker or echo in a received frame.
    Framing,
    /// Connect, timeout, remote-closed or cancelled.
    Transport,
}

impl Error {
    pub(crate) fn address(address: &str, reason: impl Into<String>) -> Self {
        Self::Address {
            address: address.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn framing(message: impl Into<String>) -> Self {
        Self::Framing(message.into())
    }

    pub(crate) fn remote_closed() -> Self {
        io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by remote").into()
    }

    /// The class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Address { .. } | Self::Argument(_) | Self::Bounds { .. } | Self::Encoding(_) => {
                ErrorKind::Parse
            }
            Self::Exception(_) => ErrorKind::Protocol,
            Self::Checksum { .. } => ErrorKind::Checksum,
            Self::Framing(_) => ErrorKind::Framing,
            Self::Timeout(_) | Self::Transport(_) | Self::Cancelled => ErrorKind::Transport,
        }
    }

    /// The exception code if the server responded with an exception.
    #[must_use]
    pub const fn exception_code(&self) -> Option<ExceptionCode> {
        match self {
            Self::Exception(rsp) => Some(rsp.exception),
            _ => None,
        }
    }

    /// Whether the byte stream of the connection is in an unknown state
    /// after this error and the connection must be re-established.
    pub(crate) const fn breaks_connection(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout(_) | Self::Framing(_) | Self::Checksum { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FunctionCode;

    #[test]
    fn classify_errors() {
        assert_eq!(Error::Argument("x".into()).kind(), ErrorKind::Parse);
        assert_eq!(
            Error::Checksum {
                expected: 1,
                actual: 2
            }
            .kind(),
            ErrorKind::Checksum
        );
        assert_eq!(Error::remote_closed().kind(), ErrorKind::Transport);
        assert_eq!(
            Error::Timeout(Duration::from_secs(1)).kind(),
            ErrorKind::Transport
        );
    }

    #[test]
    fn exception_keeps_code() {
        let err: Error = ExceptionResponse {
            function: FunctionCode::ReadHoldingRegisters,
            exception: ExceptionCode::IllegalDataAddress,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.exception_code(), Some(ExceptionCode::IllegalDataAddress));
        assert!(!err.breaks_connection());
    }

    #[test]
    fn display_checksum() {
        let err = Error::Checksum {
            expected: 0x63B6,
            actual: 0x0001,
        };
        assert_eq!(
            err.to_string(),
            "checksum mismatch: expected 0x63B6, actual 0x0001"
        );
    }
}
