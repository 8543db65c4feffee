// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connecting a Modbus ASCII context

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};

use super::{attached_context, lazy_context, tcp_connector, Config, Context};
use crate::{codec::ascii::AsciiCodec, Result};

#[must_use]
pub fn lazy_over_tcp(socket_addr: SocketAddr, config: Config) -> Context {
    lazy_context(tcp_connector(socket_addr), AsciiCodec, config)
}

pub async fn connect_over_tcp(socket_addr: SocketAddr, config: Config) -> Result<Context> {
    let context = lazy_over_tcp(socket_addr, config);
    context.connect().await?;
    Ok(context)
}

pub fn attach<T>(transport: T, config: Config) -> Context
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    attached_context(transport, AsciiCodec, config)
}

#[cfg(feature = "serial")]
#[must_use]
pub fn serial(builder: &tokio_serial::SerialPortBuilder, config: Config) -> Context {
    lazy_context(super::serial_connector(builder), AsciiCodec, config)
}
