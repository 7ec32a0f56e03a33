//! Event relay along the partner edge.
//!
//! Signaling frames and text messages are only ever forwarded between the
//! two sides of a live pair. A `target_id` that is not the sender's current
//! partner is dropped without a reply — it is either a stale client or an
//! attempt to reach a third party, and neither deserves feedback.

use chrono::Utc;
use roulette_common::{ClientEvent, ConnectionId, ServerEvent};

use crate::registry::{Phase, Registry};
use crate::session::Outbox;

/// Forward an `offer`/`answer`/`ice-candidate` to the sender's partner.
/// `target_id` is stripped and replaced by `from_id` on the way through.
pub(crate) fn forward_signal(
    registry: &Registry,
    from: ConnectionId,
    event: ClientEvent,
    outbox: &mut Outbox,
) {
    let (target, forwarded) = match event {
        ClientEvent::Offer { offer, target_id } => {
            (target_id, ServerEvent::Offer { offer, from_id: from })
        }
        ClientEvent::Answer { answer, target_id } => {
            (target_id, ServerEvent::Answer { answer, from_id: from })
        }
        ClientEvent::IceCandidate { candidate, target_id } => (
            target_id,
            ServerEvent::IceCandidate { candidate, from_id: from },
        ),
        _ => return,
    };

    let Some(partner) = paired_partner(registry, from) else {
        tracing::debug!(conn = %from, "signaling while unpaired dropped");
        return;
    };
    if target != partner {
        tracing::debug!(conn = %from, target = %target, "signaling target is not the partner; dropped");
        return;
    }
    if let Some(peer) = registry.get(partner) {
        outbox.push(peer, forwarded);
    }
}

/// Forward a text message to the sender's partner, stamped with server time.
pub(crate) fn forward_message(
    registry: &Registry,
    from: ConnectionId,
    text: String,
    outbox: &mut Outbox,
) {
    let Some(partner) = paired_partner(registry, from) else {
        tracing::debug!(conn = %from, "message while unpaired dropped");
        return;
    };
    if let Some(peer) = registry.get(partner) {
        outbox.push(
            peer,
            ServerEvent::Message {
                text,
                sender: from,
                timestamp: Utc::now(),
            },
        );
    }
}

/// The sender's partner, provided the sender is actually paired.
fn paired_partner(registry: &Registry, id: ConnectionId) -> Option<ConnectionId> {
    let user = registry.get(id)?;
    if user.phase != Phase::Paired {
        return None;
    }
    user.partner
}
