// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blocking transaction execution

use std::{
    fmt,
    io::{self, Read, Write},
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder as _, Encoder as _};

use crate::{
    codec::FrameCodec,
    command::extract_response,
    lock::{HybridLock, LockMetrics},
    CommandFrame, Error, Result,
};

/// Establishes a new blocking transport.
///
/// Read timeouts are configured on the transport by the connector, e.g.
/// with [`std::net::TcpStream::set_read_timeout`]. They bound a single
/// read, the executor bounds the whole response by its receive timeout.
pub type Connector<T> = Box<dyn Fn() -> io::Result<T> + Send + Sync>;

const READ_CHUNK_LEN: usize = 1024;

struct Channel<T, C> {
    transport: T,
    codec: C,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

/// Blocking counterpart of [`super::Executor`].
pub struct Executor<T, C> {
    channel: HybridLock<Option<Channel<T, C>>>,
    codec: C,
    connector: Connector<T>,
    receive_timeout: Duration,
}

impl<T, C> fmt::Debug for Executor<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("channel", &self.channel)
            .field("receive_timeout", &self.receive_timeout)
            .finish_non_exhaustive()
    }
}

impl<T, C> Executor<T, C>
where
    T: Read + Write + Send,
    C: FrameCodec + Sync,
{
    /// `receive_timeout` bounds the reception of each response.
    pub fn new(connector: Connector<T>, codec: C, receive_timeout: Duration) -> Self {
        Self {
            channel: HybridLock::new(None),
            codec,
            connector,
            receive_timeout,
        }
    }

    /// Use an already connected transport that cannot be re-established.
    pub fn attach(transport: T, codec: C, receive_timeout: Duration) -> Self {
        let connector: Connector<T> = Box::new(|| {
            Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "attached transport has been closed",
            ))
        });
        let mut executor = Self::new(connector, codec, receive_timeout);
        let channel = executor.open(transport);
        *executor.channel.get_mut() = Some(channel);
        executor
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<LockMetrics>) -> Self {
        self.channel = self.channel.with_metrics(metrics);
        self
    }

    /// Execute all `requests` in order and concatenate their payloads.
    pub fn call(&self, requests: &[CommandFrame]) -> Result<BytesMut> {
        let mut channel = self.channel.lock();
        let mut payload = BytesMut::new();
        for request in requests {
            log::debug!("Call {request:?}");
            match self.exchange(&mut channel, request) {
                Ok(data) => payload.extend_from_slice(&data),
                Err(err) => {
                    if err.breaks_connection() && channel.take().is_some() {
                        log::warn!("Closing connection: {err}");
                    }
                    return Err(err);
                }
            }
        }
        Ok(payload)
    }

    /// Establish the connection now instead of on the first call.
    pub fn connect(&self) -> Result<()> {
        let mut channel = self.channel.lock();
        if channel.is_none() {
            let transport = self.dial()?;
            *channel = Some(self.open(transport));
        }
        Ok(())
    }

    /// Close the connection. The next call connects again.
    pub fn disconnect(&self) -> Result<()> {
        if let Some(mut channel) = self.channel.lock().take() {
            log::debug!("Disconnecting");
            channel.transport.flush()?;
        }
        Ok(())
    }

    fn dial(&self) -> Result<T> {
        log::trace!("Connecting");
        let transport = (self.connector)().map_err(|err| self.map_io_error(err))?;
        log::trace!("Connected");
        Ok(transport)
    }

    fn open(&self, transport: T) -> Channel<T, C> {
        Channel {
            transport,
            codec: self.codec.clone(),
            read_buf: BytesMut::with_capacity(READ_CHUNK_LEN),
            write_buf: BytesMut::new(),
        }
    }

    fn exchange(&self, channel: &mut Option<Channel<T, C>>, request: &CommandFrame) -> Result<Bytes> {
        let current = match channel.take() {
            Some(current) => current,
            None => {
                let transport = self.dial()?;
                self.open(transport)
            }
        };
        let current = channel.insert(current);
        let response = self.transact(current, request)?;
        log::trace!("Decoding {response:?}");
        extract_response(request, response)
    }

    fn transact(&self, channel: &mut Channel<T, C>, request: &CommandFrame) -> Result<Bytes> {
        channel.read_buf.clear();
        channel.write_buf.clear();
        channel.codec.encode(request.clone(), &mut channel.write_buf)?;
        log::trace!("Sending");
        channel
            .transport
            .write_all(&channel.write_buf)
            .and_then(|()| channel.transport.flush())
            .map_err(|err| self.map_io_error(err))?;

        log::trace!("Awaiting response");
        let deadline = Instant::now() + self.receive_timeout;
        let mut chunk = [0; READ_CHUNK_LEN];
        loop {
            if let Some(response) = channel.codec.decode(&mut channel.read_buf)? {
                return Ok(response);
            }
            if Instant::now() >= deadline {
                log::debug!("Incomplete response after {:?}", self.receive_timeout);
                return Err(Error::Timeout(self.receive_timeout));
            }
            let len = match channel.transport.read(&mut chunk) {
                Ok(len) => len,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.map_io_error(err)),
            };
            if len == 0 {
                return Err(Error::remote_closed());
            }
            channel.read_buf.extend_from_slice(&chunk[..len]);
        }
    }

    fn map_io_error(&self, err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                Error::Timeout(self.receive_timeout)
            }
            _ => err.into(),
        }
    }
}
