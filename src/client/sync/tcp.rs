// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connecting a blocking Modbus TCP context

use std::{
    io::{Read, Write},
    net::SocketAddr,
};

use super::{attached_context, lazy_context, tcp_connector, Context};
use crate::{client::Config, codec::tcp::TcpCodec, Result};

#[must_use]
pub fn lazy(socket_addr: SocketAddr, config: Config) -> Context {
    lazy_context(
        tcp_connector(socket_addr, &config),
        TcpCodec::new(config.check_transaction_id),
        config,
    )
}

/// Establish a direct connection to a Modbus TCP coupler.
pub fn connect(socket_addr: SocketAddr) -> Result<Context> {
    connect_with(socket_addr, Config::default())
}

pub fn connect_with(socket_addr: SocketAddr, config: Config) -> Result<Context> {
    let context = lazy(socket_addr, config);
    context.connect()?;
    Ok(context)
}

/// The transport should carry a read timeout, a blocked read cannot be
/// interrupted otherwise.
pub fn attach<T>(transport: T, config: Config) -> Context
where
    T: Read + Write + Send + 'static,
{
    attached_context(transport, TcpCodec::new(config.check_transaction_id), config)
}
