// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connecting a Modbus RTU context

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};

use super::{attached_context, lazy_context, tcp_connector, Config, Context};
use crate::{codec::rtu::RtuCodec, Result};

/// RTU frames tunneled through TCP, e.g. to a serial device server.
#[must_use]
pub fn lazy_over_tcp(socket_addr: SocketAddr, config: Config) -> Context {
    lazy_context(tcp_connector(socket_addr), RtuCodec, config)
}

pub async fn connect_over_tcp(socket_addr: SocketAddr, config: Config) -> Result<Context> {
    let context = lazy_over_tcp(socket_addr, config);
    context.connect().await?;
    Ok(context)
}

/// Speak Modbus RTU over an arbitrary, already connected stream.
pub fn attach<T>(transport: T, config: Config) -> Context
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    attached_context(transport, RtuCodec, config)
}

/// RTU on a serial line. The port is opened on the first request and
/// reopened after failures.
#[cfg(feature = "serial")]
#[must_use]
pub fn serial(builder: &tokio_serial::SerialPortBuilder, config: Config) -> Context {
    lazy_context(super::serial_connector(builder), RtuCodec, config)
}
