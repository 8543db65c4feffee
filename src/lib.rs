// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A [Modbus](https://en.wikipedia.org/wiki/Modbus) client library
//! based on [tokio](https://tokio.rs).
//!
//! Registers, coils and bits are addressed with short rich-text addresses
//! and read or written as typed values:
//!
//! | address        | meaning                                              |
//! |----------------|------------------------------------------------------|
//! | `100`          | element 100 of the default station and function      |
//! | `s=2;100`      | element 100 of station 2                             |
//! | `s=2;x=4;100`  | input register 100 of station 2                      |
//! | `100.3`        | bit 3 of holding register 100                        |
//!
//! Modbus TCP, Modbus UDP, RTU and ASCII framings are supported on top of
//! TCP, datagram sockets, serial lines (feature `serial`) or any
//! user-supplied byte stream.
//!
//! ```no_run
//! # async fn run() -> modbus_link::Result<()> {
//! use modbus_link::prelude::*;
//!
//! let ctx = tcp::connect("192.168.0.222:502".parse().unwrap()).await?;
//! let temperature: f32 = ctx.read_value("s=2;x=4;100").await?;
//! ctx.write_bool("200.3", true).await?;
//! # Ok(())
//! # }
//! ```
//!
//! A connection is shared by all callers of a context. Concurrent requests
//! are serialized by a hybrid spin/wait lock, requests that exceed the frame
//! limits are split and executed back to back.

#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]

pub mod prelude;

pub mod address;
pub mod client;
pub mod codec;
pub mod command;
pub mod lock;
pub mod service;
pub mod transform;

#[cfg(feature = "tcp")]
pub mod transport;

mod error;
mod frame;
mod slave;

pub use self::{
    address::ModbusAddress,
    client::Config,
    error::{Error, ErrorKind, Result},
    frame::{Address, CommandFrame, ExceptionCode, ExceptionResponse, FunctionCode, Quantity},
    lock::{LockMetrics, LockStats},
    slave::{Slave, SlaveContext, SlaveId},
    transform::{ByteTransform, TextEncoding, TransformKind, WordOrder},
};
