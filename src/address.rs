// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rich-text addresses
//!
//! Grammar: `(s=<station>;)?(x=<function>;)?<element>(.<bit>)?`
//!
//! The `s=` and `x=` parameters may appear in any order.

use std::{fmt, str::FromStr};

use crate::{frame::Address, Error, FunctionCode, Result};

/// Highest bit index inside a 16 bit register.
pub const MAX_BIT: u8 = 15;

/// A parsed rich-text address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModbusAddress {
    pub station: u8,
    pub function: FunctionCode,
    pub address: Address,
    /// Bit inside the register, `0..=15`.
    pub bit: Option<u8>,
}

impl ModbusAddress {
    /// Parse `address`, falling back to `default_station` and
    /// `default_function` for missing parameters.
    pub fn parse(address: &str, default_station: u8, default_function: FunctionCode) -> Result<Self> {
        let mut station = None;
        let mut function = None;

        let mut parts = address.split(';').map(str::trim).peekable();
        let mut element = "";
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                element = part;
                break;
            }
            let Some((key, value)) = part.split_once('=') else {
                return Err(Error::address(address, format!("malformed parameter `{part}`")));
            };
            match key.trim() {
                "s" => {
                    if station.is_some() {
                        return Err(Error::address(address, "duplicate station parameter"));
                    }
                    let value = value.trim().parse::<u8>().map_err(|err| {
                        Error::address(address, format!("invalid station `{value}`: {err}"))
                    })?;
                    station = Some(value);
                }
                "x" => {
                    if function.is_some() {
                        return Err(Error::address(address, "duplicate function parameter"));
                    }
                    let code = value.trim().parse::<u8>().ok().and_then(FunctionCode::new);
                    let Some(code) = code else {
                        return Err(Error::address(
                            address,
                            format!("unsupported function `{value}`"),
                        ));
                    };
                    function = Some(code);
                }
                key => {
                    return Err(Error::address(address, format!("unknown parameter `{key}`")));
                }
            }
        }

        let (element, bit) = match element.split_once('.') {
            Some((element, bit)) => (element, Some(bit)),
            None => (element, None),
        };
        if element.is_empty() {
            return Err(Error::address(address, "missing element address"));
        }
        let element = element.parse::<Address>().map_err(|err| {
            Error::address(address, format!("invalid element address `{element}`: {err}"))
        })?;
        let bit = bit
            .map(|bit| match bit.parse::<u8>() {
                Ok(bit) if bit <= MAX_BIT => Ok(bit),
                _ => Err(Error::address(
                    address,
                    format!("invalid bit `{bit}`, expected 0..={MAX_BIT}"),
                )),
            })
            .transpose()?;

        Ok(Self {
            station: station.unwrap_or(default_station),
            function: function.unwrap_or(default_function),
            address: element,
            bit,
        })
    }

    /// Convert to a 0-based protocol address.
    ///
    /// 1-based addresses must be at least `1` and are decremented by one.
    pub fn normalize(self, zero_based: bool) -> Result<Self> {
        if zero_based {
            return Ok(self);
        }
        let Some(address) = self.address.checked_sub(1) else {
            return Err(Error::address(
                &self.to_string(),
                "must be at least 1 with 1-based addressing",
            ));
        };
        Ok(Self { address, ..self })
    }
}

impl FromStr for ModbusAddress {
    type Err = Error;

    /// Parse with station `1` and holding registers as defaults.
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, 1, FunctionCode::ReadHoldingRegisters)
    }
}

impl fmt::Display for ModbusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s={};x={};{}", self.station, self.function, self.address)?;
        if let Some(bit) = self.bit {
            write!(f, ".{bit}")?;
        }
        Ok(())
    }
}
