// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Station addressing

use std::fmt;

/// Raw station (unit) identifier.
pub type SlaveId = u8;

/// The station a request is addressed to.
///
/// Rich-text addresses may override it per request with `s=<station>;`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slave(pub SlaveId);

/// Station `1`, the first single device address.
impl Default for Slave {
    fn default() -> Self {
        Self(1)
    }
}

impl From<SlaveId> for Slave {
    fn from(from: SlaveId) -> Self {
        Self(from)
    }
}

impl From<Slave> for SlaveId {
    fn from(from: Slave) -> Self {
        from.0
    }
}

impl fmt::Display for Slave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:0>2X})", self.0, self.0)
    }
}

/// Selects the default station of subsequent requests.
pub trait SlaveContext {
    fn set_slave(&mut self, slave: Slave);
}
