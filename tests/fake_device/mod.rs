// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An in-process Modbus TCP/UDP device for driving the client facades.

use std::{
    io::{self, Read as _, Write as _},
    sync::{Arc, Mutex},
};

use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::{TcpListener, TcpStream, UdpSocket},
};

/// Number of elements of every table, addresses beyond are rejected with
/// exception code 2.
pub const SIZE: usize = 4000;

const ILLEGAL_FUNCTION: u8 = 0x01;
const ILLEGAL_DATA_ADDRESS: u8 = 0x02;

/// Coils and holding registers are writable. Discrete input `i` is set if
/// `i` is a multiple of three, input register `i` holds `i`.
#[derive(Debug)]
pub struct Device {
    pub coils: Vec<bool>,
    pub holding: Vec<u16>,
    /// Number of requests served.
    pub requests: usize,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            coils: vec![false; SIZE],
            holding: vec![0; SIZE],
            requests: 0,
        }
    }
}

pub type SharedDevice = Arc<Mutex<Device>>;

fn check(address: usize, count: usize) -> Result<(), u8> {
    if count == 0 || address + count > SIZE {
        return Err(ILLEGAL_DATA_ADDRESS);
    }
    Ok(())
}

fn pack(bits: impl Iterator<Item = bool>) -> Vec<u8> {
    let bits: Vec<bool> = bits.collect();
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0, |byte, (i, &bit)| byte | (u8::from(bit) << i))
        })
        .collect()
}

impl Device {
    /// Answer a `[station][function][data]` request.
    pub fn handle(&mut self, request: &[u8]) -> Vec<u8> {
        self.requests += 1;
        let (station, function) = (request[0], request[1]);
        let mut response = vec![station, function];
        match self.process(function, &request[2..], &mut response) {
            Ok(()) => response,
            Err(code) => vec![station, function | 0x80, code],
        }
    }

    fn process(&mut self, function: u8, data: &[u8], out: &mut Vec<u8>) -> Result<(), u8> {
        let word = |i: usize| u16::from_be_bytes([data[i], data[i + 1]]);
        let address = usize::from(word(0));
        match function {
            0x01 | 0x02 => {
                let count = usize::from(word(2));
                check(address, count)?;
                let range = address..address + count;
                let packed = if function == 0x01 {
                    pack(range.map(|i| self.coils[i]))
                } else {
                    pack(range.map(|i| i % 3 == 0))
                };
                out.push(packed.len() as u8);
                out.extend(packed);
            }
            0x03 | 0x04 => {
                let count = usize::from(word(2));
                check(address, count)?;
                out.push((count * 2) as u8);
                for i in address..address + count {
                    let value = if function == 0x03 {
                        self.holding[i]
                    } else {
                        i as u16
                    };
                    out.extend(value.to_be_bytes());
                }
            }
            0x05 => {
                check(address, 1)?;
                self.coils[address] = word(2) == 0xFF00;
                out.extend(&data[..4]);
            }
            0x06 => {
                check(address, 1)?;
                self.holding[address] = word(2);
                out.extend(&data[..4]);
            }
            0x0F => {
                let count = usize::from(word(2));
                check(address, count)?;
                for k in 0..count {
                    self.coils[address + k] = (data[5 + k / 8] >> (k % 8)) & 1 == 1;
                }
                out.extend(&data[..4]);
            }
            0x10 => {
                let count = usize::from(word(2));
                check(address, count)?;
                for k in 0..count {
                    self.holding[address + k] = word(5 + 2 * k);
                }
                out.extend(&data[..4]);
            }
            0x16 => {
                check(address, 1)?;
                let (and_mask, or_mask) = (word(2), word(4));
                let current = self.holding[address];
                self.holding[address] = (current & and_mask) | (or_mask & !and_mask);
                out.extend(&data[..6]);
            }
            _ => return Err(ILLEGAL_FUNCTION),
        }
        Ok(())
    }
}

/// Answer a complete MBAP frame.
fn answer(device: &SharedDevice, header: &[u8; 7], pdu: &[u8]) -> Vec<u8> {
    let mut request = vec![header[6]];
    request.extend_from_slice(pdu);
    let response = device.lock().unwrap().handle(&request);
    let mut frame = header[..4].to_vec();
    frame.extend((response.len() as u16).to_be_bytes());
    frame.extend(response);
    frame
}

fn pdu_len(header: &[u8; 7]) -> usize {
    usize::from(u16::from_be_bytes([header[4], header[5]])) - 1
}

/// Serve Modbus TCP connections until the listener fails.
pub async fn serve_tcp(listener: TcpListener, device: SharedDevice) -> io::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let device = Arc::clone(&device);
        tokio::spawn(async move {
            // Ends when the client disconnects.
            let _ = serve_connection(stream, device).await;
        });
    }
}

async fn serve_connection(mut stream: TcpStream, device: SharedDevice) -> io::Result<()> {
    loop {
        let mut header = [0; 7];
        stream.read_exact(&mut header).await?;
        let mut pdu = vec![0; pdu_len(&header)];
        stream.read_exact(&mut pdu).await?;
        let frame = answer(&device, &header, &pdu);
        stream.write_all(&frame).await?;
    }
}

/// Serve Modbus UDP datagrams.
pub async fn serve_udp(socket: UdpSocket, device: SharedDevice) -> io::Result<()> {
    let mut buf = [0; 260];
    loop {
        let (len, peer) = socket.recv_from(&mut buf).await?;
        let mut header = [0; 7];
        header.copy_from_slice(&buf[..7]);
        let frame = answer(&device, &header, &buf[7..len]);
        socket.send_to(&frame, peer).await?;
    }
}

/// Blocking variant of [`serve_tcp`], one thread per connection.
pub fn serve_tcp_blocking(listener: std::net::TcpListener, device: SharedDevice) {
    for stream in listener.incoming() {
        let Ok(mut stream) = stream else {
            return;
        };
        let device = Arc::clone(&device);
        std::thread::spawn(move || -> io::Result<()> {
            loop {
                let mut header = [0; 7];
                stream.read_exact(&mut header)?;
                let mut pdu = vec![0; pdu_len(&header)];
                stream.read_exact(&mut pdu)?;
                let frame = answer(&device, &header, &pdu);
                stream.write_all(&frame)?;
            }
        });
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
