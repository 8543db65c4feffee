// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blocking Modbus clients
//!
//! Same surface as the asynchronous [`Context`](super::Context), but every
//! operation blocks the calling thread. A context can be shared between
//! threads, requests are serialized on its connection.

use std::{
    fmt::Debug,
    io::{Read, Write},
};
#[cfg(any(feature = "ascii", feature = "rtu", feature = "tcp"))]
use std::{
    io,
    net::{SocketAddr, TcpStream},
};

use bytes::{Bytes, BytesMut};

use super::{
    registers_for, resolve_write, string_bytes, write_bool_frame, write_bools_frame, BoolRead,
    Config,
};
use crate::{
    codec::FrameCodec,
    command::{self, Addressing},
    service::sync::{Connector, Executor},
    slave::{Slave, SlaveContext},
    transform::{decode_bits, TextEncoding, Value},
    CommandFrame, FunctionCode, Result,
};

#[cfg(feature = "ascii")]
pub mod ascii;

#[cfg(feature = "rtu")]
pub mod rtu;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "tcp")]
pub mod udp;

/// Transport independent blocking client trait
pub trait Client: Send + Sync + Debug {
    fn call(&self, requests: &[CommandFrame]) -> Result<BytesMut>;

    fn connect(&self) -> Result<()>;

    fn disconnect(&self) -> Result<()>;
}

impl<T, C> Client for Executor<T, C>
where
    T: Read + Write + Send + 'static,
    C: FrameCodec + Sync,
{
    fn call(&self, requests: &[CommandFrame]) -> Result<BytesMut> {
        Executor::call(self, requests)
    }

    fn connect(&self) -> Result<()> {
        Executor::connect(self)
    }

    fn disconnect(&self) -> Result<()> {
        Executor::disconnect(self)
    }
}

pub(crate) fn lazy_context<T, C>(connector: Connector<T>, codec: C, config: Config) -> Context
where
    T: Read + Write + Send + 'static,
    C: FrameCodec + Sync,
{
    let executor = Executor::new(connector, codec, config.receive_timeout);
    Context::new(Box::new(executor), config)
}

pub(crate) fn attached_context<T, C>(transport: T, codec: C, config: Config) -> Context
where
    T: Read + Write + Send + 'static,
    C: FrameCodec + Sync,
{
    let executor = Executor::attach(transport, codec, config.receive_timeout);
    Context::new(Box::new(executor), config)
}

/// Connects with the connect timeout and applies the receive timeout to
/// every read of the socket.
#[cfg(any(feature = "ascii", feature = "rtu", feature = "tcp"))]
pub(crate) fn tcp_connector(socket_addr: SocketAddr, config: &Config) -> Connector<TcpStream> {
    let connect_timeout = config.connect_timeout;
    let receive_timeout = config.receive_timeout;
    Box::new(move || {
        let stream = TcpStream::connect_timeout(&socket_addr, connect_timeout)?;
        stream.set_read_timeout(Some(receive_timeout))?;
        stream.set_write_timeout(Some(receive_timeout))?;
        stream.set_nodelay(true)?;
        log::debug!("Connected to {socket_addr}");
        Ok::<_, io::Error>(stream)
    })
}

/// Blocking Modbus client context
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

    pub fn call(&self, requests: &[CommandFrame]) -> Result<BytesMut> {
        self.client.call(requests)
    }

    pub fn connect(&self) -> Result<()> {
        self.client.connect()
    }

    pub fn disconnect(&self) -> Result<()> {
        self.client.disconnect()
    }

    pub fn read(&self, address: &str, length: usize) -> Result<Bytes> {
        let frames = command::build_read(
            address,
            length,
            self.addressing(),
            FunctionCode::ReadHoldingRegisters,
        )?;
        Ok(self.call(&frames)?.freeze())
    }

    pub fn read_values<T: Value>(&self, address: &str, count: usize) -> Result<Vec<T>> {
        let data = self.read(address, registers_for::<T>(count)?)?;
        self.config.transform.decode_array(&data, 0, count)
    }

    pub fn read_value<T: Value>(&self, address: &str) -> Result<T> {
        let data = self.read(address, registers_for::<T>(1)?)?;
        self.config.transform.decode(&data, 0)
    }

    pub fn read_string(
        &self,
        address: &str,
        registers: usize,
        encoding: TextEncoding,
    ) -> Result<String> {
        let data = self.read(address, registers)?;
        self.config
            .transform
            .decode_string(&data, 0, data.len(), encoding)
    }

    pub fn read_coils(&self, address: &str, count: usize) -> Result<Vec<bool>> {
        let frames =
            command::build_read(address, count, self.addressing(), FunctionCode::ReadCoils)?;
        decode_bits(&self.call(&frames)?, 0, count)
    }

    pub fn read_discrete_inputs(&self, address: &str, count: usize) -> Result<Vec<bool>> {
        let frames = command::build_read(
            address,
            count,
            self.addressing(),
            FunctionCode::ReadDiscreteInputs,
        )?;
        decode_bits(&self.call(&frames)?, 0, count)
    }

    pub fn read_bools(&self, address: &str, count: usize) -> Result<Vec<bool>> {
        let read = BoolRead::new(self.addressing(), address, count)?;
        let payload = self.call(&read.frames)?;
        read.finish(payload)
    }

    pub fn read_bool(&self, address: &str) -> Result<bool> {
        Ok(self.read_bools(address, 1)?[0])
    }

    pub fn write(&self, address: &str, data: &[u8]) -> Result<()> {
        let resolved = resolve_write(self.addressing(), address)?;
        let frame = command::build_write_registers(&resolved, data)?;
        self.call(&[frame]).map(drop)
    }

    pub fn write_values<T: Value>(&self, address: &str, values: &[T]) -> Result<()> {
        let data = self.config.transform.encode(values);
        self.write(address, &data)
    }

    pub fn write_value<T: Value>(&self, address: &str, value: T) -> Result<()> {
        self.write_values(address, &[value])
    }

    pub fn write_string(&self, address: &str, text: &str, encoding: TextEncoding) -> Result<()> {
        let data = string_bytes(&self.config, text, encoding);
        self.write(address, &data)
    }

    pub fn write_one_register(&self, address: &str, word: u16) -> Result<()> {
        let resolved = resolve_write(self.addressing(), address)?;
        self.call(&[command::build_write_one_register(&resolved, word)])
            .map(drop)
    }

    pub fn write_mask(&self, address: &str, and_mask: u16, or_mask: u16) -> Result<()> {
        let resolved = resolve_write(self.addressing(), address)?;
        self.call(&[command::build_mask_write(&resolved, and_mask, or_mask)])
            .map(drop)
    }

    /// Register bits are written with a mask write (function 22).
    pub fn write_bool(&self, address: &str, value: bool) -> Result<()> {
        let frame = write_bool_frame(self.addressing(), address, value)?;
        self.call(&[frame]).map(drop)
    }

    pub fn write_bools(&self, address: &str, values: &[bool]) -> Result<()> {
        let frame = write_bools_frame(self.addressing(), address, values)?;
        self.call(&[frame]).map(drop)
    }
}

impl SlaveContext for Context {
    fn set_slave(&mut self, slave: Slave) {
        self.config.slave = slave;
    }
}

#[cfg(all(test, feature = "rtu"))]
mod tests {
    use std::{collections::VecDeque, io, sync::Arc, thread};

    use super::*;
    use crate::{codec::rtu::{wrap, RtuCodec}, Error, ExceptionCode};

    /// Checks each request against a script and answers with the scripted
    /// response.
    #[derive(Debug)]
    struct Device {
        script: VecDeque<(Vec<u8>, Vec<u8>)>,
        response: Vec<u8>,
    }

    impl Device {
        fn new(script: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>) -> Self {
            Self {
                script: script.into_iter().collect(),
                response: Vec::new(),
            }
        }
    }

    impl Write for Device {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let (request, response) = self.script.pop_front().expect("unexpected request");
            assert_eq!(buf, &request[..]);
            self.response = response;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Read for Device {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = self.response.len().min(buf.len());
            buf[..len].copy_from_slice(&self.response[..len]);
            self.response.drain(..len);
            Ok(len)
        }
    }

    fn exchange(request: &[u8], response: &[u8]) -> (Vec<u8>, Vec<u8>) {
        (wrap(request).to_vec(), wrap(response).to_vec())
    }

    #[test]
    fn read_and_write_values() {
        let device = Device::new([
            exchange(
                &[0x01, 0x03, 0x00, 0x00, 0x00, 0x04],
                &[0x01, 0x03, 0x08, 0x40, 0x09, 0x21, 0xFB, 0x54, 0x44, 0x2D, 0x18],
            ),
            exchange(
                &[0x01, 0x10, 0x00, 0x04, 0x00, 0x01, 0x02, 0xFF, 0xFE],
                &[0x01, 0x10, 0x00, 0x04, 0x00, 0x01],
            ),
        ]);
        let ctx = attached_context(device, RtuCodec, Config::default());
        let pi: f64 = ctx.read_value("0").unwrap();
        assert_eq!(pi, std::f64::consts::PI);
        ctx.write_value("4", -2_i16).unwrap();
    }

    #[test]
    fn exception_is_reported() {
        let device = Device::new([exchange(
            &[0x02, 0x16, 0x00, 0x0A, 0xFF, 0xFE, 0x00, 0x01],
            &[0x02, 0x96, 0x01],
        )]);
        let mut ctx = attached_context(device, RtuCodec, Config::default());
        ctx.set_slave(Slave(2));
        let err = ctx.write_bool("10.0", true).unwrap_err();
        assert!(matches!(err, Error::Exception(_)));
        assert_eq!(err.exception_code(), Some(ExceptionCode::IllegalFunction));
    }

    #[test]
    fn shared_between_threads() {
        let script = (0..4).map(|i| {
            exchange(
                &[0x01, 0x06, 0x00, i, 0x00, i],
                &[0x01, 0x06, 0x00, i, 0x00, i],
            )
        });
        let ctx = Arc::new(attached_context(
            Device::new(script),
            RtuCodec,
            Config::default(),
        ));
        // Requests are matched in order, one thread at a time.
        for i in 0..4_u16 {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || ctx.write_one_register(&i.to_string(), i))
                .join()
                .unwrap()
                .unwrap();
        }
    }
}
