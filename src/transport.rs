// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Datagram sockets as byte streams
//!
//! Every write sends one datagram and every read receives one. A frame must
//! therefore be written and received as a whole, which the executors do.

use std::{
    io,
    net::SocketAddr,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    net::UdpSocket,
};

fn unspecified_for(peer: SocketAddr) -> SocketAddr {
    if peer.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0_u16; 8], 0))
    }
}

/// A connected UDP socket implementing [`AsyncRead`] and [`AsyncWrite`].
#[derive(Debug)]
pub struct UdpStream {
    socket: UdpSocket,
}

impl UdpStream {
    /// Bind an ephemeral local port and connect it to `peer`.
    pub async fn connect(peer: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(unspecified_for(peer)).await?;
        socket.connect(peer).await?;
        Ok(Self { socket })
    }

    #[must_use]
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self { socket }
    }
}

impl AsyncRead for UdpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.socket.poll_recv(cx, buf)
    }
}

impl AsyncWrite for UdpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.socket.poll_send(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(feature = "sync")]
pub mod sync {
    //! Blocking datagram sockets

    use std::{
        io::{self, Read, Write},
        net::{SocketAddr, UdpSocket},
        time::Duration,
    };

    /// A connected blocking UDP socket implementing [`Read`] and [`Write`].
    #[derive(Debug)]
    pub struct UdpStream {
        socket: UdpSocket,
    }

    impl UdpStream {
        /// Bind an ephemeral local port and connect it to `peer`.
        pub fn connect(peer: SocketAddr, read_timeout: Duration) -> io::Result<Self> {
            let socket = UdpSocket::bind(super::unspecified_for(peer))?;
            socket.connect(peer)?;
            socket.set_read_timeout(Some(read_timeout))?;
            Ok(Self { socket })
        }
    }

    impl Read for UdpStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.socket.recv(buf)
        }
    }

    impl Write for UdpStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.socket.send(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
