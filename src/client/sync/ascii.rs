// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connecting a blocking Modbus ASCII context

use std::{
    io::{Read, Write},
    net::SocketAddr,
};

use super::{attached_context, lazy_context, tcp_connector, Context};
use crate::{client::Config, codec::ascii::AsciiCodec, Result};

#[must_use]
pub fn lazy_over_tcp(socket_addr: SocketAddr, config: Config) -> Context {
    lazy_context(tcp_connector(socket_addr, &config), AsciiCodec, config)
}

pub fn connect_over_tcp(socket_addr: SocketAddr, config: Config) -> Result<Context> {
    let context = lazy_over_tcp(socket_addr, config);
    context.connect()?;
    Ok(context)
}

pub fn attach<T>(transport: T, config: Config) -> Context
where
    T: Read + Write + Send + 'static,
{
    attached_context(transport, AsciiCodec, config)
}
