// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transaction execution on a shared connection

use std::{fmt, io, sync::Arc, time::Duration};

use bytes::{Bytes, BytesMut};
use futures_util::{future::BoxFuture, FutureExt as _, SinkExt as _, StreamExt as _};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt as _};
use tokio_util::{codec::Framed, sync::CancellationToken};

use crate::{
    codec::FrameCodec,
    command::extract_response,
    lock::{AsyncHybridLock, LockMetrics},
    CommandFrame, Error, Result,
};

#[cfg(feature = "sync")]
pub mod sync;

/// Establishes a new transport.
pub type Connector<T> = Box<dyn Fn() -> BoxFuture<'static, io::Result<T>> + Send + Sync>;

/// Executes request/response transactions on a single connection.
///
/// Concurrent callers are serialized, all frames of one call are exchanged
/// without interleaving with other calls. The connection is established
/// lazily and dropped after every error that leaves the byte stream in an
/// unknown state. Failed transactions are never retried.
pub struct Executor<T, C> {
    channel: AsyncHybridLock<Option<Framed<T, C>>>,
    codec: C,
    connector: Connector<T>,
    connect_timeout: Duration,
    receive_timeout: Duration,
}

impl<T, C> fmt::Debug for Executor<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("channel", &self.channel)
            .field("connect_timeout", &self.connect_timeout)
            .field("receive_timeout", &self.receive_timeout)
            .finish_non_exhaustive()
    }
}

impl<T, C> Executor<T, C>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    C: FrameCodec + Sync,
{
    pub fn new(
        connector: Connector<T>,
        codec: C,
        connect_timeout: Duration,
        receive_timeout: Duration,
    ) -> Self {
        Self {
            channel: AsyncHybridLock::new(None),
            codec,
            connector,
            connect_timeout,
            receive_timeout,
        }
    }

    /// Use an already connected transport that cannot be re-established.
    pub fn attach(transport: T, codec: C, receive_timeout: Duration) -> Self {
        let framed = Framed::new(transport, codec.clone());
        let connector: Connector<T> = Box::new(|| {
            async {
                Err::<T, _>(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "attached transport has been closed",
                ))
            }
            .boxed()
        });
        let mut executor = Self::new(connector, codec, Duration::ZERO, receive_timeout);
        *executor.channel.get_mut() = Some(framed);
        executor
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<LockMetrics>) -> Self {
        self.channel = self.channel.with_metrics(metrics);
        self
    }

    /// Execute all `requests` in order and concatenate their payloads.
    pub async fn call(&self, requests: &[CommandFrame]) -> Result<BytesMut> {
        let mut channel = self.channel.lock().await;
        self.execute(&mut channel, requests).await
    }

    /// Like [`Self::call`], but gives up while waiting for the connection
    /// once `token` is cancelled.
    ///
    /// A transaction that has already been started is not interrupted.
    pub async fn call_cancellable(
        &self,
        requests: &[CommandFrame],
        token: &CancellationToken,
    ) -> Result<BytesMut> {
        let mut channel = self.channel.lock_cancellable(token).await?;
        self.execute(&mut channel, requests).await
    }

    /// Establish the connection now instead of on the first call.
    pub async fn connect(&self) -> Result<()> {
        let mut channel = self.channel.lock().await;
        if channel.is_none() {
            *channel = Some(self.open().await?);
        }
        Ok(())
    }

    /// Close the connection. The next call connects again.
    pub async fn disconnect(&self) -> Result<()> {
        let framed = self.channel.lock().await.take();
        if let Some(framed) = framed {
            log::debug!("Disconnecting");
            framed.into_inner().shutdown().await?;
        }
        Ok(())
    }

    async fn execute(
        &self,
        channel: &mut Option<Framed<T, C>>,
        requests: &[CommandFrame],
    ) -> Result<BytesMut> {
        let mut payload = BytesMut::new();
        for request in requests {
            log::debug!("Call {request:?}");
            match self.exchange(channel, request).await {
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

    async fn open(&self) -> Result<Framed<T, C>> {
        log::trace!("Connecting");
        let transport = tokio::time::timeout(self.connect_timeout, (self.connector)())
            .await
            .map_err(|_| Error::Timeout(self.connect_timeout))??;
        log::trace!("Connected");
        Ok(Framed::new(transport, self.codec.clone()))
    }

    async fn exchange(
        &self,
        channel: &mut Option<Framed<T, C>>,
        request: &CommandFrame,
    ) -> Result<Bytes> {
        let framed = match channel.take() {
            Some(framed) => framed,
            None => self.open().await?,
        };
        let framed = channel.insert(framed);
        let response = tokio::time::timeout(self.receive_timeout, transact(framed, request))
            .await
            .map_err(|_| Error::Timeout(self.receive_timeout))??;
        log::trace!("Decoding {response:?}");
        extract_response(request, response)
    }
}

async fn transact<T, C>(framed: &mut Framed<T, C>, request: &CommandFrame) -> Result<Bytes>
where
    T: AsyncRead + AsyncWrite + Unpin,
    C: FrameCodec,
{
    framed.read_buffer_mut().clear();
    log::trace!("Sending");
    framed.send(request.clone()).await?;
    log::trace!("Awaiting response");
    framed
        .next()
        .await
        .unwrap_or_else(|| Err(Error::remote_closed()))
}
