// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use crate::{command::Addressing, slave::Slave, transform::ByteTransform};

/// Settings of a client context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Station used for addresses without `s=`.
    pub slave: Slave,
    /// `false` if element addresses start at 1.
    pub zero_based: bool,
    /// Layout of values that span registers.
    pub transform: ByteTransform,
    pub connect_timeout: Duration,
    /// Deadline of each request/response exchange.
    pub receive_timeout: Duration,
    /// Reject Modbus TCP responses with a foreign transaction id.
    pub check_transaction_id: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slave: Slave::default(),
            zero_based: true,
            transform: ByteTransform::default(),
            connect_timeout: Duration::from_secs(10),
            receive_timeout: Duration::from_secs(5),
            check_transaction_id: true,
        }
    }
}

impl Config {
    #[must_use]
    pub const fn with_slave(mut self, slave: Slave) -> Self {
        self.slave = slave;
        self
    }

    #[must_use]
    pub const fn with_zero_based(mut self, zero_based: bool) -> Self {
        self.zero_based = zero_based;
        self
    }

    #[must_use]
    pub const fn with_transform(mut self, transform: ByteTransform) -> Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_check_transaction_id(mut self, check: bool) -> Self {
        self.check_transaction_id = check;
        self
    }

    pub(crate) const fn addressing(&self) -> Addressing {
        Addressing {
            station: self.slave.0,
            zero_based: self.zero_based,
        }
    }
}
