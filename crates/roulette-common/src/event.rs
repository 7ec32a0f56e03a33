//! The wire protocol — framed JSON events exchanged with clients.
//!
//! Every frame is a JSON object carrying a `type` tag plus the event's
//! fields. Signaling payloads (`offer`, `answer`, `candidate`) are opaque
//! blobs the server forwards verbatim and never inspects. Unknown fields
//! are ignored for forward compatibility; a frame whose tag or required
//! fields don't parse is a protocol error and is dropped by the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ConnectionId;
use crate::profile::{PartnerInfo, Profile};

/// Opaque signaling blob, forwarded without interpretation.
pub type SignalPayload = serde_json::Value;

/// Events a client may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Enter the matching pool (or match instantly).
    JoinQueue {
        #[serde(flatten)]
        profile: Profile,
    },

    /// SDP offer for the current partner.
    Offer {
        offer: SignalPayload,
        target_id: ConnectionId,
    },

    /// SDP answer for the current partner.
    Answer {
        answer: SignalPayload,
        target_id: ConnectionId,
    },

    /// ICE candidate for the current partner.
    IceCandidate {
        candidate: SignalPayload,
        target_id: ConnectionId,
    },

    /// Text message relayed to the partner.
    Message { text: String },

    /// Abandon the current partner (or leave the queue) and go idle.
    Skip,

    /// Leave the waiting pool without a reply.
    LeaveQueue,
}

/// Events the server sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A pair formed; here is who you got.
    Matched {
        partner_id: ConnectionId,
        partner_info: PartnerInfo,
    },

    /// No eligible partner yet; you are in the pool.
    Waiting,

    /// Your own skip was processed.
    Skipped,

    /// Your partner skipped you. A re-match follows.
    PartnerSkipped,

    /// Your partner left or dropped. A re-match follows.
    PartnerDisconnected,

    /// Relayed SDP offer from your partner.
    Offer {
        offer: SignalPayload,
        from_id: ConnectionId,
    },

    /// Relayed SDP answer from your partner.
    Answer {
        answer: SignalPayload,
        from_id: ConnectionId,
    },

    /// Relayed ICE candidate from your partner.
    IceCandidate {
        candidate: SignalPayload,
        from_id: ConnectionId,
    },

    /// Relayed text message. The timestamp is stamped server-side;
    /// client-supplied timestamps are never trusted.
    Message {
        text: String,
        sender: ConnectionId,
        timestamp: DateTime<Utc>,
    },
}
