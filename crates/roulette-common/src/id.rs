//! Connection identifiers.
//!
//! Every live client connection gets an opaque, globally unique id assigned
//! by the transport on accept. Partners reference each other by id only —
//! all resolution goes through the registry, never through direct references.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for one live connection, valid for its lifetime.
///
/// Serialized as the hyphenated UUID string on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Mint a fresh id. Random v4 — ids never repeat across reconnects.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
