// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connecting a Modbus UDP context
//!
//! Modbus UDP carries the same MBAP frames as Modbus TCP, one per datagram.

use std::{io, net::SocketAddr};

use futures_util::FutureExt as _;

use super::{lazy_context, Config, Context};
use crate::{codec::tcp::TcpCodec, service::Connector, transport::UdpStream, Result};

fn udp_connector(peer: SocketAddr) -> Connector<UdpStream> {
    Box::new(move || {
        async move {
            let stream = UdpStream::connect(peer).await?;
            Ok::<_, io::Error>(stream)
        }
        .boxed()
    })
}

#[must_use]
pub fn lazy(peer: SocketAddr, config: Config) -> Context {
    lazy_context(
        udp_connector(peer),
        TcpCodec::new(config.check_transaction_id),
        config,
    )
}

/// Bind a local socket for talking to `peer`.
///
/// No datagram is exchanged, an unreachable peer only shows up as a
/// timeout of the first request.
pub async fn connect(peer: SocketAddr, config: Config) -> Result<Context> {
    let context = lazy(peer, config);
    context.connect().await?;
    Ok(context)
}
