// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connecting a Modbus TCP context

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};

use super::{attached_context, lazy_context, tcp_connector, Config, Context};
use crate::{codec::tcp::TcpCodec, Result};

/// Create a context that connects on its first request.
#[must_use]
pub fn lazy(socket_addr: SocketAddr, config: Config) -> Context {
    lazy_context(
        tcp_connector(socket_addr),
        TcpCodec::new(config.check_transaction_id),
        config,
    )
}

/// Establish a direct connection to a Modbus TCP coupler.
pub async fn connect(socket_addr: SocketAddr) -> Result<Context> {
    connect_with(socket_addr, Config::default()).await
}

/// Connect to any kind of Modbus device, probably through a Modbus
/// TCP/RTU gateway that forwards requests to the station of each address.
pub async fn connect_with(socket_addr: SocketAddr, config: Config) -> Result<Context> {
    let context = lazy(socket_addr, config);
    context.connect().await?;
    Ok(context)
}

/// Speak Modbus TCP over an arbitrary, already connected stream.
pub fn attach<T>(transport: T, config: Config) -> Context
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    attached_context(transport, TcpCodec::new(config.check_transaction_id), config)
}
