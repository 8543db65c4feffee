// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Construction of request frames and extraction of response payloads.
//!
//! Requests that exceed the per-frame protocol limit are split into
//! several frames. All frames of one request are meant to be executed
//! back to back while holding the connection.

use bytes::{BufMut as _, Bytes, BytesMut};

use crate::{
    address::{ModbusAddress, MAX_BIT},
    frame::{Address, Quantity},
    transform::encode_bits,
    CommandFrame, Error, ExceptionCode, ExceptionResponse, FunctionCode, Result,
};

/// Maximum number of coils or discrete inputs per read frame.
pub const MAX_READ_BITS: Quantity = 2000;

/// Maximum number of registers per read frame.
pub const MAX_READ_WORDS: Quantity = 125;

/// Maximum number of coils per write frame.
pub const MAX_WRITE_COILS: usize = 1968;

/// Maximum number of registers per write frame.
pub const MAX_WRITE_REGISTERS: usize = 123;

const COIL_ON: u16 = 0xFF00;
const COIL_OFF: u16 = 0x0000;

/// Station and addressing convention used to resolve rich-text addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addressing {
    pub station: u8,
    /// `false` if element addresses start at 1.
    pub zero_based: bool,
}

impl Addressing {
    /// Parse and normalize a rich-text address.
    pub fn resolve(&self, address: &str, default_function: FunctionCode) -> Result<ModbusAddress> {
        ModbusAddress::parse(address, self.station, default_function)?.normalize(self.zero_based)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn u16_len(len: usize) -> u16 {
    // Callers check the protocol limits beforehand.
    debug_assert!(len <= u16::MAX.into());
    len as u16
}

#[allow(clippy::cast_possible_truncation)]
fn u8_len(len: usize) -> u8 {
    debug_assert!(len <= u8::MAX.into());
    len as u8
}

fn check_range(start: Address, count: usize) -> Result<()> {
    if usize::from(start) + count > usize::from(u16::MAX) + 1 {
        return Err(Error::Argument(format!(
            "{count} items starting at {start} exceed the address space"
        )));
    }
    Ok(())
}

/// Split `length` items starting at `start` into contiguous chunks of at
/// most `max` items.
pub fn split_range(start: Address, length: usize, max: Quantity) -> Result<Vec<(Address, Quantity)>> {
    if length == 0 {
        return Err(Error::Argument("length must not be zero".to_owned()));
    }
    if max == 0 {
        return Err(Error::Argument("chunk size must not be zero".to_owned()));
    }
    check_range(start, length)?;
    let mut ranges = Vec::with_capacity(length.div_ceil(max.into()));
    let mut offset = 0;
    while offset < length {
        let quantity = (length - offset).min(max.into());
        ranges.push((u16_len(usize::from(start) + offset), u16_len(quantity)));
        offset += quantity;
    }
    Ok(ranges)
}

/// Frames reading `length` items at a resolved address.
///
/// The address must reference one of the read functions 1 to 4.
pub fn read_frames(address: &ModbusAddress, length: usize) -> Result<Vec<CommandFrame>> {
    let max = if address.function.is_bit_read() {
        MAX_READ_BITS
    } else if address.function.is_word_read() {
        MAX_READ_WORDS
    } else {
        return Err(Error::Argument(format!(
            "function {} is not a read function",
            address.function
        )));
    };
    let frames = split_range(address.address, length, max)?
        .into_iter()
        .map(|(start, quantity)| {
            let mut payload = BytesMut::with_capacity(4);
            payload.put_u16(start);
            payload.put_u16(quantity);
            CommandFrame::new(address.station, address.function, payload)
        })
        .collect();
    Ok(frames)
}

/// Parse `address` and build the frames that read `length` items.
pub fn build_read(
    address: &str,
    length: usize,
    addressing: Addressing,
    default_function: FunctionCode,
) -> Result<Vec<CommandFrame>> {
    let address = addressing.resolve(address, default_function)?;
    read_frames(&address, length)
}

/// Function 5
#[must_use]
pub fn build_write_one_coil(address: &ModbusAddress, value: bool) -> CommandFrame {
    let mut payload = BytesMut::with_capacity(4);
    payload.put_u16(address.address);
    payload.put_u16(if value { COIL_ON } else { COIL_OFF });
    CommandFrame::new(address.station, FunctionCode::WriteSingleCoil, payload)
}

/// Function 15, or function 5 for a single coil if the address asks for it
/// with `x=5`.
pub fn build_write_coils(address: &ModbusAddress, values: &[bool]) -> Result<CommandFrame> {
    if values.is_empty() {
        return Err(Error::Argument("no coils to write".to_owned()));
    }
    if values.len() > MAX_WRITE_COILS {
        return Err(Error::Argument(format!(
            "{} coils exceed the limit of {MAX_WRITE_COILS} per request",
            values.len()
        )));
    }
    check_range(address.address, values.len())?;
    if address.function == FunctionCode::WriteSingleCoil && values.len() == 1 {
        return Ok(build_write_one_coil(address, values[0]));
    }
    let packed = encode_bits(values);
    let mut payload = BytesMut::with_capacity(5 + packed.len());
    payload.put_u16(address.address);
    payload.put_u16(u16_len(values.len()));
    payload.put_u8(u8_len(packed.len()));
    payload.put_slice(&packed);
    Ok(CommandFrame::new(
        address.station,
        FunctionCode::WriteMultipleCoils,
        payload,
    ))
}

/// Function 6
#[must_use]
pub fn build_write_one_register(address: &ModbusAddress, word: u16) -> CommandFrame {
    let mut payload = BytesMut::with_capacity(4);
    payload.put_u16(address.address);
    payload.put_u16(word);
    CommandFrame::new(address.station, FunctionCode::WriteSingleRegister, payload)
}

/// Function 16 with already encoded register bytes, or function 6 if the
/// address asks for it with `x=6` and `data` holds exactly one register.
pub fn build_write_registers(address: &ModbusAddress, data: &[u8]) -> Result<CommandFrame> {
    if data.is_empty() {
        return Err(Error::Argument("no registers to write".to_owned()));
    }
    if data.len() % 2 != 0 {
        return Err(Error::Argument(format!(
            "odd number of bytes ({}) for register write",
            data.len()
        )));
    }
    let count = data.len() / 2;
    if count > MAX_WRITE_REGISTERS {
        return Err(Error::Argument(format!(
            "{count} registers exceed the limit of {MAX_WRITE_REGISTERS} per request"
        )));
    }
    check_range(address.address, count)?;
    if address.function == FunctionCode::WriteSingleRegister && count == 1 {
        return Ok(build_write_one_register(
            address,
            u16::from_be_bytes([data[0], data[1]]),
        ));
    }
    let mut payload = BytesMut::with_capacity(5 + data.len());
    payload.put_u16(address.address);
    payload.put_u16(u16_len(count));
    payload.put_u8(u8_len(data.len()));
    payload.put_slice(data);
    Ok(CommandFrame::new(
        address.station,
        FunctionCode::WriteMultipleRegisters,
        payload,
    ))
}

/// Function 22: `register = (register & and_mask) | (or_mask & !and_mask)`.
#[must_use]
pub fn build_mask_write(address: &ModbusAddress, and_mask: u16, or_mask: u16) -> CommandFrame {
    let mut payload = BytesMut::with_capacity(6);
    payload.put_u16(address.address);
    payload.put_u16(and_mask);
    payload.put_u16(or_mask);
    CommandFrame::new(address.station, FunctionCode::MaskWriteRegister, payload)
}

/// AND and OR mask that set a single `bit` of a register to `value`.
///
/// `None` if `bit` is outside of `0..=15`.
#[must_use]
pub const fn mask_for_bit(bit: u8, value: bool) -> Option<(u16, u16)> {
    if bit > MAX_BIT {
        return None;
    }
    let mask = 1_u16 << bit;
    Some((!mask, if value { mask } else { 0 }))
}

/// Write a single bit of a register, i.e. an address like `100.3`.
///
/// Always a mask write, the remaining bits of the register are kept by the
/// server.
pub fn build_write_bit(address: &ModbusAddress, value: bool) -> Result<CommandFrame> {
    let Some(bit) = address.bit else {
        return Err(Error::Argument(format!(
            "address {address} has no bit offset"
        )));
    };
    let Some((and_mask, or_mask)) = mask_for_bit(bit, value) else {
        return Err(Error::address(
            &address.to_string(),
            format!("invalid bit `{bit}`, expected 0..={MAX_BIT}"),
        ));
    };
    Ok(build_mask_write(address, and_mask, or_mask))
}

/// Validate a response against its request and extract the payload.
///
/// `response` is the transport independent part `[station][function][...]`.
/// Read responses yield the data bytes without the byte count, write
/// responses an empty payload.
pub fn extract_response(request: &CommandFrame, response: Bytes) -> Result<Bytes> {
    if response.len() < 2 {
        return Err(Error::framing(format!(
            "response too short: {} bytes",
            response.len()
        )));
    }
    if response[0] != request.station() {
        return Err(Error::framing(format!(
            "unexpected station {} in response, expected {}",
            response[0],
            request.station()
        )));
    }
    let function = request.function();
    let code = response[1];
    if code & 0x80 != 0 {
        if code & 0x7F != function.value() {
            return Err(Error::framing(format!(
                "exception for function {} in response to function {function}",
                code & 0x7F
            )));
        }
        let Some(&exception) = response.get(2) else {
            return Err(Error::framing("exception response without exception code"));
        };
        return Err(ExceptionResponse {
            function,
            exception: ExceptionCode::new(exception),
        }
        .into());
    }
    if code != function.value() {
        return Err(Error::framing(format!(
            "unexpected function {code} in response, expected {function}"
        )));
    }

    if function.is_read() {
        if response.len() < 3 {
            return Err(Error::framing("read response without byte count"));
        }
        let byte_count = usize::from(response[2]);
        if response.len() - 3 != byte_count {
            return Err(Error::framing(format!(
                "byte count {byte_count} does not match {} data bytes",
                response.len() - 3
            )));
        }
        let payload = request.payload();
        if payload.len() >= 4 {
            let quantity = usize::from(u16::from_be_bytes([payload[2], payload[3]]));
            let expected = if function.is_bit_read() {
                quantity.div_ceil(8)
            } else {
                quantity * 2
            };
            if byte_count != expected {
                return Err(Error::framing(format!(
                    "received {byte_count} data bytes, expected {expected}"
                )));
            }
        }
        return Ok(response.slice(3..));
    }

    let expected_len = if function == FunctionCode::MaskWriteRegister {
        8
    } else {
        6
    };
    if response.len() != expected_len {
        return Err(Error::framing(format!(
            "write response has {} bytes, expected {expected_len}",
            response.len()
        )));
    }
    if request.payload().get(..2) != Some(&response[2..4]) {
        return Err(Error::framing("write response echoes a different address"));
    }
    Ok(Bytes::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESSING: Addressing = Addressing {
        station: 1,
        zero_based: true,
    };

    fn resolve(address: &str) -> ModbusAddress {
        ADDRESSING
            .resolve(address, FunctionCode::ReadHoldingRegisters)
            .unwrap()
    }

    #[test]
    fn split_250_registers() {
        let ranges = split_range(10, 250, MAX_READ_WORDS).unwrap();
        assert_eq!(ranges, vec![(10, 125), (135, 125)]);
    }

    #[test]
    fn split_is_contiguous() {
        let ranges = split_range(0, 4501, MAX_READ_BITS).unwrap();
        assert_eq!(ranges, vec![(0, 2000), (2000, 2000), (4000, 501)]);
        let total: usize = ranges.iter().map(|(_, q)| usize::from(*q)).sum();
        assert_eq!(total, 4501);
    }

    #[test]
    fn split_rejects_invalid_ranges() {
        assert!(split_range(0, 0, MAX_READ_WORDS).is_err());
        assert!(split_range(65535, 2, MAX_READ_WORDS).is_err());
        assert!(split_range(65535, 1, MAX_READ_WORDS).is_ok());
    }

    #[test]
    fn build_split_read() {
        let frames = build_read(
            "s=3;x=4;100",
            250,
            ADDRESSING,
            FunctionCode::ReadHoldingRegisters,
        )
        .unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].station(), 3);
        assert_eq!(frames[0].function(), FunctionCode::ReadInputRegisters);
        assert_eq!(frames[0].payload(), &[0x00, 0x64, 0x00, 0x7D]);
        assert_eq!(frames[1].payload(), &[0x00, 0xE1, 0x00, 0x7D]);
    }

    #[test]
    fn build_read_one_based() {
        let addressing = Addressing {
            station: 1,
            zero_based: false,
        };
        let frames = build_read("1", 2, addressing, FunctionCode::ReadCoils).unwrap();
        assert_eq!(frames[0].function(), FunctionCode::ReadCoils);
        assert_eq!(frames[0].payload(), &[0x00, 0x00, 0x00, 0x02]);
        assert!(build_read("0", 2, addressing, FunctionCode::ReadCoils).is_err());
    }

    #[test]
    fn read_requires_read_function() {
        assert!(matches!(
            build_read("x=6;1", 1, ADDRESSING, FunctionCode::ReadHoldingRegisters),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn write_coils() {
        let frame = build_write_coils(&resolve("x=15;19"), &[true, false, true, true]).unwrap();
        assert_eq!(frame.function(), FunctionCode::WriteMultipleCoils);
        assert_eq!(frame.payload(), &[0x00, 0x13, 0x00, 0x04, 0x01, 0b_1101]);

        let frame = build_write_coils(&resolve("x=5;19"), &[true]).unwrap();
        assert_eq!(frame.function(), FunctionCode::WriteSingleCoil);
        assert_eq!(frame.payload(), &[0x00, 0x13, 0xFF, 0x00]);

        assert!(build_write_coils(&resolve("1"), &[]).is_err());
        assert!(build_write_coils(&resolve("1"), &[false; MAX_WRITE_COILS + 1]).is_err());
    }

    #[test]
    fn write_registers() {
        let frame = build_write_registers(&resolve("1"), &[0x12, 0x34, 0x56, 0x78]).unwrap();
        assert_eq!(frame.function(), FunctionCode::WriteMultipleRegisters);
        assert_eq!(
            frame.payload(),
            &[0x00, 0x01, 0x00, 0x02, 0x04, 0x12, 0x34, 0x56, 0x78]
        );

        let frame = build_write_registers(&resolve("x=6;1"), &[0x12, 0x34]).unwrap();
        assert_eq!(frame.function(), FunctionCode::WriteSingleRegister);
        assert_eq!(frame.payload(), &[0x00, 0x01, 0x12, 0x34]);

        assert!(build_write_registers(&resolve("1"), &[0x12]).is_err());
        assert!(build_write_registers(&resolve("1"), &[0; 2 * MAX_WRITE_REGISTERS + 2]).is_err());
    }

    #[test]
    fn bit_masks() {
        assert_eq!(mask_for_bit(3, true), Some((0xFFF7, 0x0008)));
        assert_eq!(mask_for_bit(3, false), Some((0xFFF7, 0x0000)));
        assert_eq!(mask_for_bit(15, true), Some((0x7FFF, 0x8000)));
        assert_eq!(mask_for_bit(16, true), None);
        for prior in [0x0000_u16, 0xFFFF, 0xA5A5, 0x1234] {
            for value in [true, false] {
                let (and_mask, or_mask) = mask_for_bit(3, value).unwrap();
                let result = (prior & and_mask) | or_mask;
                assert_eq!(result & !0x0008, prior & !0x0008);
                assert_eq!(result & 0x0008 != 0, value);
            }
        }
    }

    #[test]
    fn write_bit_is_mask_write() {
        let frame = build_write_bit(&resolve("s=2;100.3"), true).unwrap();
        assert_eq!(frame.station(), 2);
        assert_eq!(frame.function(), FunctionCode::MaskWriteRegister);
        assert_eq!(frame.payload(), &[0x00, 0x64, 0xFF, 0xF7, 0x00, 0x08]);
        assert!(build_write_bit(&resolve("100"), true).is_err());
    }

    #[test]
    fn write_bit_rejects_bit_beyond_register() {
        let mut address = resolve("100.3");
        for bit in [16, u8::MAX] {
            address.bit = Some(bit);
            assert!(matches!(
                build_write_bit(&address, true),
                Err(Error::Address { .. })
            ));
        }
    }

    #[test]
    fn extract_read_response() {
        let request = &read_frames(&resolve("0"), 2).unwrap()[0];
        let payload = extract_response(
            request,
            Bytes::from_static(&[0x01, 0x03, 0x04, 0x00, 0x0A, 0x00, 0x0B]),
        )
        .unwrap();
        assert_eq!(&payload[..], &[0x00, 0x0A, 0x00, 0x0B]);
    }

    #[test]
    fn extract_read_response_with_wrong_byte_count() {
        let request = &read_frames(&resolve("0"), 2).unwrap()[0];
        let err = extract_response(
            request,
            Bytes::from_static(&[0x01, 0x03, 0x04, 0x00, 0x0A, 0x00]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Framing(_)));
        let err = extract_response(request, Bytes::from_static(&[0x01, 0x03, 0x02, 0x00, 0x0A]))
            .unwrap_err();
        assert!(matches!(err, Error::Framing(_)));
    }

    #[test]
    fn extract_exception_response() {
        let request = &read_frames(&resolve("0"), 1).unwrap()[0];
        let err = extract_response(request, Bytes::from_static(&[0x01, 0x83, 0x02])).unwrap_err();
        assert_eq!(err.exception_code(), Some(ExceptionCode::IllegalDataAddress));
        assert_eq!(
            err.to_string(),
            "Modbus function 3: address out of range (0x02)"
        );
    }

    #[test]
    fn extract_mismatched_function() {
        let request = &read_frames(&resolve("0"), 1).unwrap()[0];
        let err = extract_response(request, Bytes::from_static(&[0x01, 0x04, 0x02, 0, 0]))
            .unwrap_err();
        assert!(matches!(err, Error::Framing(_)));
        let err = extract_response(request, Bytes::from_static(&[0x01, 0x84, 0x02])).unwrap_err();
        assert!(matches!(err, Error::Framing(_)));
        let err = extract_response(request, Bytes::from_static(&[0x02, 0x03, 0x02, 0, 0]))
            .unwrap_err();
        assert!(matches!(err, Error::Framing(_)));
    }

    #[test]
    fn extract_write_response() {
        let request = build_mask_write(&resolve("4"), 0x00F2, 0x0025);
        let echo = Bytes::from_static(&[0x01, 0x16, 0x00, 0x04, 0x00, 0xF2, 0x00, 0x25]);
        assert!(extract_response(&request, echo).unwrap().is_empty());

        let request = build_write_one_register(&resolve("1"), 3);
        let short = Bytes::from_static(&[0x01, 0x06, 0x00, 0x01]);
        assert!(extract_response(&request, short).is_err());
    }
}
