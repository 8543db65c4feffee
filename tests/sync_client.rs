// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drive the blocking Modbus TCP client against a fake device.

#![cfg(all(feature = "sync", feature = "tcp"))]

#[allow(unused)]
mod fake_device;

use std::{
    net::{SocketAddr, TcpListener},
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use fake_device::{init_logging, serve_tcp_blocking, Device, SharedDevice};
use modbus_link::prelude::*;

fn start() -> anyhow::Result<(SocketAddr, SharedDevice)> {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let device = Arc::new(Mutex::new(Device::default()));
    let shared = Arc::clone(&device);
    thread::spawn(move || serve_tcp_blocking(listener, shared));
    Ok((addr, device))
}

#[test]
fn read_and_write() -> anyhow::Result<()> {
    let (addr, device) = start()?;
    let ctx = sync::tcp::connect(addr)?;

    ctx.write_value("100", -123_456_i32)?;
    assert_eq!(ctx.read_value::<i32>("100")?, -123_456);

    ctx.write_string("110", "héllo", TextEncoding::Utf8)?;
    assert_eq!(ctx.read_string("110", 3, TextEncoding::Utf8)?, "héllo");

    ctx.write_bool("120.15", true)?;
    assert_eq!(device.lock().unwrap().holding[120], 0x8000);
    assert_eq!(ctx.read_bools("120.14", 2)?, vec![false, true]);

    let values = ctx.read_values::<u16>("x=4;1000", 130)?;
    assert_eq!(values.first(), Some(&1000));
    assert_eq!(values.last(), Some(&1129));
    Ok(())
}

#[test]
fn exception_then_success() -> anyhow::Result<()> {
    let (addr, _device) = start()?;
    let ctx = sync::tcp::connect(addr)?;

    let err = ctx.write_bools("3999", &[true, true]).unwrap_err();
    assert_eq!(err.exception_code(), Some(ExceptionCode::IllegalDataAddress));
    ctx.write_bools("3998", &[true, true])?;
    assert_eq!(ctx.read_coils("3998", 2)?, vec![true, true]);
    Ok(())
}

#[test]
fn threads_share_a_context() -> anyhow::Result<()> {
    let (addr, device) = start()?;
    let config = Config::default().with_receive_timeout(Duration::from_secs(2));
    let ctx = Arc::new(sync::tcp::connect_with(addr, config)?);

    let handles: Vec<_> = (0..8_u16)
        .map(|i| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || -> modbus_link::Result<()> {
                let address = format!("{}", 200 + i);
                for n in 0..50 {
                    ctx.write_one_register(&address, n)?;
                    assert_eq!(ctx.read_value::<u16>(&address)?, n);
                }
                Ok(())
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread panicked")?;
    }
    assert_eq!(device.lock().unwrap().requests, 8 * 50 * 2);
    Ok(())
}

#[test]
fn lazy_context_connects_on_first_request() -> anyhow::Result<()> {
    let (addr, device) = start()?;
    let mut ctx = sync::tcp::lazy(addr, Config::default());
    ctx.set_slave(Slave(4));
    ctx.write_one_register("0", 1)?;
    ctx.disconnect()?;
    assert_eq!(ctx.read_value::<u16>("0")?, 1);
    assert_eq!(device.lock().unwrap().requests, 2);
    Ok(())
}
