// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus clients

use std::fmt::Debug;
#[cfg(any(feature = "ascii", feature = "rtu", feature = "tcp"))]
use std::{io, net::SocketAddr};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
#[cfg(any(feature = "ascii", feature = "rtu", feature = "tcp"))]
use futures_util::FutureExt as _;
#[cfg(any(feature = "ascii", feature = "rtu", feature = "tcp"))]
use tokio::net::TcpStream;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::{
    codec::FrameCodec,
    command::{self, Addressing},
    service::{Connector, Executor},
    slave::{Slave, SlaveContext},
    transform::{decode_bits, swap_word_bytes, TextEncoding, Value},
    CommandFrame, Error, FunctionCode, ModbusAddress, Result,
};

mod config;

pub use self::config::Config;

#[cfg(feature = "ascii")]
pub mod ascii;

#[cfg(feature = "rtu")]
pub mod rtu;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "tcp")]
pub mod udp;

#[cfg(feature = "sync")]
pub mod sync;

/// Transport independent asynchronous client trait
#[async_trait]
pub trait Client: Send + Sync + Debug {
    /// Execute all frames in order on one connection and concatenate the
    /// response payloads.
    async fn call(&self, requests: &[CommandFrame]) -> Result<BytesMut>;

    /// Like [`Client::call`], but stop waiting for the connection when
    /// `token` is cancelled.
    async fn call_cancellable(
        &self,
        requests: &[CommandFrame],
        token: &CancellationToken,
    ) -> Result<BytesMut>;

    /// Establish the connection if it is not established yet.
    async fn connect(&self) -> Result<()>;

    /// Close the connection. It is re-established by the next call.
    async fn disconnect(&self) -> Result<()>;
}

#[async_trait]
impl<T, C> Client for Executor<T, C>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    C: FrameCodec + Sync,
{
    async fn call(&self, requests: &[CommandFrame]) -> Result<BytesMut> {
        Executor::call(self, requests).await
    }

    async fn call_cancellable(
        &self,
        requests: &[CommandFrame],
        token: &CancellationToken,
    ) -> Result<BytesMut> {
        Executor::call_cancellable(self, requests, token).await
    }

    async fn connect(&self) -> Result<()> {
        Executor::connect(self).await
    }

    async fn disconnect(&self) -> Result<()> {
        Executor::disconnect(self).await
    }
}

/// A lazily connecting context on top of `connector`.
pub(crate) fn lazy_context<T, C>(connector: Connector<T>, codec: C, config: Config) -> Context
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    C: FrameCodec + Sync,
{
    let executor = Executor::new(
        connector,
        codec,
        config.connect_timeout,
        config.receive_timeout,
    );
    Context::new(Box::new(executor), config)
}

/// A context on top of an already connected transport.
pub(crate) fn attached_context<T, C>(transport: T, codec: C, config: Config) -> Context
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    C: FrameCodec + Sync,
{
    let executor = Executor::attach(transport, codec, config.receive_timeout);
    Context::new(Box::new(executor), config)
}

#[cfg(any(feature = "ascii", feature = "rtu", feature = "tcp"))]
pub(crate) fn tcp_connector(socket_addr: SocketAddr) -> Connector<TcpStream> {
    Box::new(move || {
        async move {
            let stream = TcpStream::connect(socket_addr).await?;
            stream.set_nodelay(true)?;
            log::debug!("Connected to {socket_addr}");
            Ok::<_, io::Error>(stream)
        }
        .boxed()
    })
}

#[cfg(feature = "serial")]
pub(crate) fn serial_connector(
    builder: &tokio_serial::SerialPortBuilder,
) -> Connector<tokio_serial::SerialStream> {
    let builder = builder.clone();
    Box::new(move || {
        let opened = tokio_serial::SerialStream::open(&builder).map_err(std::io::Error::from);
        async move { opened }.boxed()
    })
}

fn too_many(count: usize) -> Error {
    Error::Argument(format!("{count} items exceed the address space"))
}

/// Number of registers holding `count` values of type `T`.
pub(crate) fn registers_for<T: Value>(count: usize) -> Result<usize> {
    count
        .checked_mul(T::WIDTH)
        .map(|bytes| bytes.div_ceil(2))
        .ok_or_else(|| too_many(count))
}

/// Frames and post-processing of a bool read.
pub(crate) struct BoolRead {
    pub(crate) frames: Vec<CommandFrame>,
    /// Bit offset inside the first register of a dotted address.
    bit: Option<u8>,
    count: usize,
}

impl BoolRead {
    /// Coils and discrete inputs, or bits of registers for dotted addresses
    /// like `100.3`.
    pub(crate) fn new(addressing: Addressing, address: &str, count: usize) -> Result<Self> {
        let default_function = if address.contains('.') {
            FunctionCode::ReadHoldingRegisters
        } else {
            FunctionCode::ReadCoils
        };
        let resolved = addressing.resolve(address, default_function)?;
        let Some(bit) = resolved.bit else {
            if !resolved.function.is_bit_read() {
                return Err(Error::Argument(format!(
                    "function {} does not read bits",
                    resolved.function
                )));
            }
            return Ok(Self {
                frames: command::read_frames(&resolved, count)?,
                bit: None,
                count,
            });
        };
        if !resolved.function.is_word_read() {
            return Err(Error::Argument(format!(
                "bit address {address} requires a register read function"
            )));
        }
        if count == 0 {
            return Err(Error::Argument("length must not be zero".to_owned()));
        }
        let registers = count
            .checked_add(usize::from(bit))
            .ok_or_else(|| too_many(count))?
            .div_ceil(16);
        Ok(Self {
            frames: command::read_frames(&resolved, registers)?,
            bit: Some(bit),
            count,
        })
    }

    pub(crate) fn finish(&self, mut payload: BytesMut) -> Result<Vec<bool>> {
        match self.bit {
            None => decode_bits(&payload, 0, self.count),
            Some(bit) => {
                swap_word_bytes(&mut payload);
                decode_bits(&payload, bit.into(), self.count)
            }
        }
    }
}

/// A single coil or, for dotted addresses, a single register bit.
pub(crate) fn write_bool_frame(
    addressing: Addressing,
    address: &str,
    value: bool,
) -> Result<CommandFrame> {
    let default_function = if address.contains('.') {
        FunctionCode::MaskWriteRegister
    } else {
        FunctionCode::WriteSingleCoil
    };
    let resolved = addressing.resolve(address, default_function)?;
    match (resolved.function, resolved.bit) {
        (FunctionCode::MaskWriteRegister, Some(_)) => command::build_write_bit(&resolved, value),
        (FunctionCode::WriteSingleCoil, None) => {
            Ok(command::build_write_one_coil(&resolved, value))
        }
        (FunctionCode::WriteMultipleCoils, None) => command::build_write_coils(&resolved, &[value]),
        (function, Some(_)) => Err(Error::address(
            address,
            format!("function {function} cannot write a register bit"),
        )),
        (function, None) => Err(Error::address(
            address,
            format!("function {function} cannot write a coil"),
        )),
    }
}

pub(crate) fn write_bools_frame(
    addressing: Addressing,
    address: &str,
    values: &[bool],
) -> Result<CommandFrame> {
    let resolved = addressing.resolve(address, FunctionCode::WriteMultipleCoils)?;
    if resolved.bit.is_some() {
        return Err(Error::Argument(format!(
            "cannot write several bools to bit address {address}"
        )));
    }
    if !matches!(
        resolved.function,
        FunctionCode::WriteSingleCoil | FunctionCode::WriteMultipleCoils
    ) {
        return Err(Error::address(
            address,
            format!("function {} cannot write coils", resolved.function),
        ));
    }
    command::build_write_coils(&resolved, values)
}

pub(crate) fn resolve_write(addressing: Addressing, address: &str) -> Result<ModbusAddress> {
    addressing.resolve(address, FunctionCode::WriteMultipleRegisters)
}

/// Encoded text padded with a zero byte to whole registers.
///
/// The padding is part of the last register, so it takes part in the
/// string word reversal.
pub(crate) fn string_bytes(config: &Config, text: &str, encoding: TextEncoding) -> Vec<u8> {
    let mut data = encoding.encode(text);
    if data.len() % 2 != 0 {
        data.push(0);
    }
    if config.transform.reverse_string_words() {
        swap_word_bytes(&mut data);
    }
    data
}

/// Asynchronous Modbus client context
///
/// Shared by reference between tasks, concurrent calls are serialized on
/// the underlying connection.
#[derive(Debug)]
pub struct Context {
    client: Box<dyn Client>,
    config: Config,
}

impl Context {
    #[must_use]
    pub fn new(client: Box<dyn Client>, config: Config) -> Self {
        Self { client, config }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    const fn addressing(&self) -> Addressing {
        self.config.addressing()
    }

    /// Invoke prepared frames.
    pub async fn call(&self, requests: &[CommandFrame]) -> Result<BytesMut> {
        self.client.call(requests).await
    }

    pub async fn call_cancellable(
        &self,
        requests: &[CommandFrame],
        token: &CancellationToken,
    ) -> Result<BytesMut> {
        self.client.call_cancellable(requests, token).await
    }

    pub async fn connect(&self) -> Result<()> {
        self.client.connect().await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.client.disconnect().await
    }

    /// Read `length` registers (holding registers unless overridden with
    /// `x=`) as raw bytes.
    ///
    /// With `x=1` or `x=2` `length` counts bits, returned packed.
    pub async fn read(&self, address: &str, length: usize) -> Result<Bytes> {
        let frames = command::build_read(
            address,
            length,
            self.addressing(),
            FunctionCode::ReadHoldingRegisters,
        )?;
        Ok(self.call(&frames).await?.freeze())
    }

    pub async fn read_values<T: Value>(&self, address: &str, count: usize) -> Result<Vec<T>> {
        let data = self.read(address, registers_for::<T>(count)?).await?;
        self.config.transform.decode_array(&data, 0, count)
    }

    pub async fn read_value<T: Value>(&self, address: &str) -> Result<T> {
        let data = self.read(address, registers_for::<T>(1)?).await?;
        self.config.transform.decode(&data, 0)
    }

    /// Read `registers` registers as text.
    pub async fn read_string(
        &self,
        address: &str,
        registers: usize,
        encoding: TextEncoding,
    ) -> Result<String> {
        let data = self.read(address, registers).await?;
        self.config
            .transform
            .decode_string(&data, 0, data.len(), encoding)
    }

    pub async fn read_coils(&self, address: &str, count: usize) -> Result<Vec<bool>> {
        let frames =
            command::build_read(address, count, self.addressing(), FunctionCode::ReadCoils)?;
        let payload = self.call(&frames).await?;
        decode_bits(&payload, 0, count)
    }

    pub async fn read_discrete_inputs(&self, address: &str, count: usize) -> Result<Vec<bool>> {
        let frames = command::build_read(
            address,
            count,
            self.addressing(),
            FunctionCode::ReadDiscreteInputs,
        )?;
        let payload = self.call(&frames).await?;
        decode_bits(&payload, 0, count)
    }

    /// Read coils, or register bits for dotted addresses like `100.3`.
    pub async fn read_bools(&self, address: &str, count: usize) -> Result<Vec<bool>> {
        let read = BoolRead::new(self.addressing(), address, count)?;
        let payload = self.call(&read.frames).await?;
        read.finish(payload)
    }

    pub async fn read_bool(&self, address: &str) -> Result<bool> {
        let bools = self.read_bools(address, 1).await?;
        Ok(bools[0])
    }

    /// Write raw register bytes with function 16, or function 6 for a
    /// single register addressed with `x=6`.
    pub async fn write(&self, address: &str, data: &[u8]) -> Result<()> {
        let resolved = resolve_write(self.addressing(), address)?;
        let frame = command::build_write_registers(&resolved, data)?;
        self.call(&[frame]).await.map(drop)
    }

    pub async fn write_values<T: Value>(&self, address: &str, values: &[T]) -> Result<()> {
        let data = self.config.transform.encode(values);
        self.write(address, &data).await
    }

    pub async fn write_value<T: Value>(&self, address: &str, value: T) -> Result<()> {
        self.write_values(address, &[value]).await
    }

    /// Write text, padded with a zero byte to whole registers.
    pub async fn write_string(
        &self,
        address: &str,
        text: &str,
        encoding: TextEncoding,
    ) -> Result<()> {
        let data = string_bytes(&self.config, text, encoding);
        self.write(address, &data).await
    }

    /// Write a single register (function 6).
    pub async fn write_one_register(&self, address: &str, word: u16) -> Result<()> {
        let resolved = resolve_write(self.addressing(), address)?;
        let frame = command::build_write_one_register(&resolved, word);
        self.call(&[frame]).await.map(drop)
    }

    /// Modify a register with function 22.
    pub async fn write_mask(&self, address: &str, and_mask: u16, or_mask: u16) -> Result<()> {
        let resolved = resolve_write(self.addressing(), address)?;
        let frame = command::build_mask_write(&resolved, and_mask, or_mask);
        self.call(&[frame]).await.map(drop)
    }

    /// Write a single coil, or a single register bit for dotted addresses.
    ///
    /// Register bits are written with a mask write (function 22), servers
    /// without support for it respond with an exception.
    pub async fn write_bool(&self, address: &str, value: bool) -> Result<()> {
        let frame = write_bool_frame(self.addressing(), address, value)?;
        self.call(&[frame]).await.map(drop)
    }

    pub async fn write_bools(&self, address: &str, values: &[bool]) -> Result<()> {
        let frame = write_bools_frame(self.addressing(), address, values)?;
        self.call(&[frame]).await.map(drop)
    }
}

impl SlaveContext for Context {
    fn set_slave(&mut self, slave: Slave) {
        self.config.slave = slave;
    }
}

impl From<Context> for Box<dyn Client> {
    fn from(context: Context) -> Self {
        context.client
    }
}
