//! Validated network port used as the registry key.
//!
//! [`Port`] wraps a [`NonZeroU16`] so that port `0` (ephemeral) and values
//! outside the TCP range can never reach the transport layer.

use std::fmt;
use std::num::NonZeroU16;

use serde::{Deserialize, Serialize};

use crate::error::SharedWsError;

/// A positive TCP port number.
///
/// Immutable once created. Used as the key in
/// [`crate::server::Registry`] and as the bind target of a
/// [`crate::server::Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(NonZeroU16);

impl Port {
    /// Creates a `Port` from a raw `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`SharedWsError::BindFailure`] if `raw` is `0`.
    pub fn new(raw: u16) -> Result<Self, SharedWsError> {
        NonZeroU16::new(raw)
            .map(Self)
            .ok_or_else(|| SharedWsError::invalid_port(i64::from(raw)))
    }

    /// Returns the port as a plain `u16`.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0.get()
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = SharedWsError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

/// Hosts usually hand ports over as wide signed integers.
impl TryFrom<i64> for Port {
    type Error = SharedWsError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        let narrowed = u16::try_from(raw).map_err(|_| SharedWsError::invalid_port(raw))?;
        Self::new(narrowed)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.get()
    }
}
