// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types and traits

///////////////////////////////////////////////////////////////////
/// Modules
///////////////////////////////////////////////////////////////////
pub use crate::client;

#[allow(missing_docs)]
#[cfg(feature = "ascii")]
pub mod ascii {
    pub use crate::client::ascii::*;
}

#[allow(missing_docs)]
#[cfg(feature = "rtu")]
pub mod rtu {
    pub use crate::client::rtu::*;
}

#[allow(missing_docs)]
#[cfg(feature = "tcp")]
pub mod tcp {
    pub use crate::client::tcp::*;
}

#[allow(missing_docs)]
#[cfg(feature = "tcp")]
pub mod udp {
    pub use crate::client::udp::*;
}

#[allow(missing_docs)]
#[cfg(feature = "sync")]
pub mod sync {
    pub use crate::client::sync::*;
}

///////////////////////////////////////////////////////////////////
/// Types
///////////////////////////////////////////////////////////////////
pub use crate::client::{Config, Context};
pub use crate::{ByteTransform, TextEncoding, TransformKind, WordOrder};
pub use crate::{Error, ErrorKind, ExceptionCode, Result};
pub use crate::{Slave, SlaveId};

#[cfg(feature = "sync")]
pub use crate::client::sync::Context as SyncContext;

///////////////////////////////////////////////////////////////////
/// Traits
///////////////////////////////////////////////////////////////////
pub use crate::client::Client;
pub use crate::slave::SlaveContext;
pub use crate::transform::Value;

#[cfg(feature = "sync")]
pub use crate::client::sync::Client as SyncClient;
