// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connecting a blocking Modbus UDP context

use std::net::SocketAddr;

use super::{lazy_context, Context};
use crate::{
    client::Config, codec::tcp::TcpCodec, service::sync::Connector, transport::sync::UdpStream,
    Result,
};

#[must_use]
pub fn lazy(peer: SocketAddr, config: Config) -> Context {
    let receive_timeout = config.receive_timeout;
    let connector: Connector<UdpStream> =
        Box::new(move || UdpStream::connect(peer, receive_timeout));
    lazy_context(connector, TcpCodec::new(config.check_transaction_id), config)
}

pub fn connect(peer: SocketAddr, config: Config) -> Result<Context> {
    let context = lazy(peer, config);
    context.connect()?;
    Ok(context)
}
