// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    error,
    fmt::{self, Display},
};

use bytes::{BufMut as _, Bytes, BytesMut};

/// A Modbus function code.
///
/// Only the function codes this client issues are represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// 01 (0x01) Read Coils.
    ReadCoils,

    /// 02 (0x02) Read Discrete Inputs
    ReadDiscreteInputs,

    /// 03 (0x03) Read Holding Registers
    ReadHoldingRegisters,

    /// 04 (0x04) Read Input Registers
    ReadInputRegisters,

    /// 05 (0x05) Write Single Coil
    WriteSingleCoil,

    /// 06 (0x06) Write Single Register
    WriteSingleRegister,

    /// 15 (0x0F) Write Multiple Coils
    WriteMultipleCoils,

    /// 16 (0x10) Write Multiple Registers
    WriteMultipleRegisters,

    /// 22 (0x16) Mask Write Register
    MaskWriteRegister,
}

impl FunctionCode {
    /// Create a new [`FunctionCode`] from its numeric `value`.
    ///
    /// Returns `None` for function codes that are not supported.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        Some(match value {
            0x01 => Self::ReadCoils,
            0x02 => Self::ReadDiscreteInputs,
            0x03 => Self::ReadHoldingRegisters,
            0x04 => Self::ReadInputRegisters,
            0x05 => Self::WriteSingleCoil,
            0x06 => Self::WriteSingleRegister,
            0x0F => Self::WriteMultipleCoils,
            0x10 => Self::WriteMultipleRegisters,
            0x16 => Self::MaskWriteRegister,
            _ => return None,
        })
    }

    /// Get the [`u8`] value of the current [`FunctionCode`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::ReadCoils => 0x01,
            Self::ReadDiscreteInputs => 0x02,
            Self::ReadHoldingRegisters => 0x03,
            Self::ReadInputRegisters => 0x04,
            Self::WriteSingleCoil => 0x05,
            Self::WriteSingleRegister => 0x06,
            Self::WriteMultipleCoils => 0x0F,
            Self::WriteMultipleRegisters => 0x10,
            Self::MaskWriteRegister => 0x16,
        }
    }

    /// Reads coils or discrete inputs.
    #[must_use]
    pub const fn is_bit_read(self) -> bool {
        matches!(self, Self::ReadCoils | Self::ReadDiscreteInputs)
    }

    /// Reads holding or input registers.
    #[must_use]
    pub const fn is_word_read(self) -> bool {
        matches!(self, Self::ReadHoldingRegisters | Self::ReadInputRegisters)
    }

    #[must_use]
    pub const fn is_read(self) -> bool {
        self.is_bit_read() || self.is_word_read()
    }
}

impl Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value().fmt(f)
    }
}

/// A Modbus protocol address is represented by 16 bit from `0` to `65535`.
///
/// This *protocol address* uses 0-based indexing. Rich-text addresses may
/// use 1-based indexing, see [`ModbusAddress::normalize`](crate::ModbusAddress::normalize).
pub type Address = u16;

/// Number of items to process.
pub type Quantity = u16;

/// A server (slave) exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    /// 0x01
    IllegalFunction,
    /// 0x02
    IllegalDataAddress,
    /// 0x03
    IllegalDataValue,
    /// 0x04
    ServerDeviceFailure,
    /// 0x05
    Acknowledge,
    /// 0x06
    ServerDeviceBusy,
    /// 0x08
    MemoryParityError,
    /// 0x0A
    GatewayPathUnavailable,
    /// 0x0B
    GatewayTargetDevice,
    /// None of the above.
    Custom(u8),
}

impl From<ExceptionCode> for u8 {
    fn from(from: ExceptionCode) -> Self {
        use crate::frame::ExceptionCode::*;
        match from {
            IllegalFunction => 0x01,
            IllegalDataAddress => 0x02,
            IllegalDataValue => 0x03,
            ServerDeviceFailure => 0x04,
            Acknowledge => 0x05,
            ServerDeviceBusy => 0x06,
            MemoryParityError => 0x08,
            GatewayPathUnavailable => 0x0A,
            GatewayTargetDevice => 0x0B,
            Custom(code) => code,
        }
    }
}

impl ExceptionCode {
    /// Create a new [`ExceptionCode`] with `value`.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        use crate::frame::ExceptionCode::*;

        match value {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            other => Custom(other),
        }
    }

    /// Textual reason of the exception.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        use crate::frame::ExceptionCode::*;

        match *self {
            IllegalFunction => "unsupported function",
            IllegalDataAddress => "address out of range",
            IllegalDataValue => "quantity exceeded",
            ServerDeviceFailure => "read/write exception",
            Acknowledge => "acknowledge",
            ServerDeviceBusy => "server device busy",
            MemoryParityError => "memory parity error",
            GatewayPathUnavailable => "gateway path unavailable",
            GatewayTargetDevice => "gateway target device failed to respond",
            Custom(_) => "unknown exception",
        }
    }
}

impl Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.description(), u8::from(*self))
    }
}

impl error::Error for ExceptionCode {}

/// A server (slave) exception response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function: FunctionCode,
    pub exception: ExceptionCode,
}

impl Display for ExceptionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Modbus function {}: {}", self.function, self.exception)
    }
}

impl error::Error for ExceptionResponse {}

/// The transport independent part of a request: station, function code and
/// the function specific payload.
///
/// Built fresh for every call and consumed by one of the framing codecs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    station: u8,
    function: FunctionCode,
    payload: Bytes,
}

impl CommandFrame {
    #[must_use]
    pub fn new(station: u8, function: FunctionCode, payload: impl Into<Bytes>) -> Self {
        Self {
            station,
            function,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub const fn station(&self) -> u8 {
        self.station
    }

    #[must_use]
    pub const fn function(&self) -> FunctionCode {
        self.function
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of bytes of the encoded frame.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        2 + self.payload.len()
    }

    /// Append `[station][function][payload]` to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_u8(self.station);
        buf.put_u8(self.function.value());
        buf.put_slice(&self.payload);
    }

    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }
}
