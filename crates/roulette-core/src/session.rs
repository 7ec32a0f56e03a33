//! Session supervision — the engine that owns all shared matching state.
//!
//! One coarse mutex guards the registry and the queue set together, so every
//! pairing, teardown, and relay decision observes a single global order.
//! Critical sections never perform I/O: outbound events are collected in an
//! [`Outbox`] under the lock and handed to the per-connection channels only
//! after it is released. Within one connection, events therefore reach the
//! transport in the order the state machine produced them. A send that fails
//! marks that connection as gone and runs its disconnect teardown.
//!
//! Teardown follows one canonical sequence wherever it is triggered from
//! (skip, leave-queue, disconnect): unlink the pair atomically, notify both
//! sides, then run the abandoned partner back through the matcher as if they
//! had just joined. Re-matching is its own critical section, so the partner's
//! farewell notification always precedes their `matched`/`waiting`.

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use roulette_common::{ClientEvent, ConnectionId, Profile, ServerEvent};

use crate::matcher;
use crate::queue::{Bucket, QueueSet};
use crate::registry::{ConnectionSnapshot, Phase, Registry, User};
use crate::relay;

/// Why a pair is being torn down. Decides who gets told what.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
    /// The initiator skipped; they get `skipped`, the partner `partner-skipped`.
    Skip,
    /// The initiator left quietly; only the partner hears, as a disconnect.
    Leave,
    /// The initiator's connection dropped; the partner hears a disconnect.
    Drop,
}

impl Departure {
    fn partner_event(self) -> ServerEvent {
        match self {
            Self::Skip => ServerEvent::PartnerSkipped,
            Self::Leave | Self::Drop => ServerEvent::PartnerDisconnected,
        }
    }
}

/// Outbound events collected under the lock, dispatched after release.
///
/// Sender handles are cloned while the registry is readable; the actual
/// sends are non-blocking.
#[derive(Default)]
pub(crate) struct Outbox {
    pending: Vec<(ConnectionId, UnboundedSender<ServerEvent>, ServerEvent)>,
}

impl Outbox {
    pub(crate) fn push(&mut self, user: &User, event: ServerEvent) {
        self.pending.push((user.id, user.sender(), event));
    }

    /// Send everything, returning the connections whose transport refused
    /// delivery. Those connections are gone and still need their teardown.
    fn flush(self) -> Vec<ConnectionId> {
        let mut gone = Vec::new();
        for (id, sender, event) in self.pending {
            if sender.send(event).is_err() && !gone.contains(&id) {
                gone.push(id);
            }
        }
        gone
    }
}

struct CoreState {
    registry: Registry,
    queues: QueueSet,
}

/// The matching engine. One per process; shared behind an `Arc`.
pub struct Matchmaker {
    state: Mutex<CoreState>,
}

impl Default for Matchmaker {
    fn default() -> Self {
        Self::new()
    }
}

impl Matchmaker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CoreState {
                registry: Registry::new(),
                queues: QueueSet::new(),
            }),
        }
    }

    /// Accept a connection. The returned id keys every later call; the
    /// sender is where this connection's outbound events go.
    pub fn connect(&self, outbound: UnboundedSender<ServerEvent>) -> ConnectionId {
        let id = self.state.lock().registry.register(outbound);
        tracing::info!(conn = %id, "connection registered");
        id
    }

    /// A connection is gone. Remove it everywhere; if it was paired, tear
    /// the pair down and re-match the abandoned side.
    pub fn disconnect(&self, id: ConnectionId) {
        let mut outbox = Outbox::default();
        let mut abandoned = None;
        {
            let mut state = self.state.lock();
            let Some(phase) = state.registry.get(id).map(|u| u.phase) else {
                return;
            };
            match phase {
                Phase::Waiting => {
                    state.queues.remove(id);
                }
                Phase::Paired => {
                    abandoned = unlink(&mut state, id, Departure::Drop, &mut outbox);
                }
                Phase::Idle => {}
            }
            state.registry.remove(id);
        }
        self.dispatch(outbox);
        tracing::info!(conn = %id, "connection removed");

        if let Some(partner) = abandoned {
            self.rematch(partner);
        }
    }

    /// Dispatch one inbound client event.
    pub fn handle(&self, id: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::JoinQueue { profile } => self.join(id, profile.normalize()),
            ClientEvent::Skip => self.skip(id),
            ClientEvent::LeaveQueue => self.leave_queue(id),
            ClientEvent::Message { text } => self.message(id, text),
            signal @ (ClientEvent::Offer { .. }
            | ClientEvent::Answer { .. }
            | ClientEvent::IceCandidate { .. }) => self.signal(id, signal),
        }
    }

    /// `join-queue`: match instantly or start waiting. Ignored unless Idle —
    /// a second join while waiting or paired is a no-op.
    fn join(&self, id: ConnectionId, profile: Profile) {
        let mut outbox = Outbox::default();
        {
            let mut state = self.state.lock();
            let Some(user) = state.registry.get_mut(id) else {
                return;
            };
            if user.phase != Phase::Idle {
                tracing::debug!(conn = %id, phase = ?user.phase, "join-queue ignored");
                return;
            }
            user.profile = Some(profile);
            run_match(&mut state, id, &mut outbox);
        }
        self.dispatch(outbox);
    }

    /// `skip`: leave the pool (waiting) or abandon the partner (paired).
    /// Either way the skipper hears `skipped`; an abandoned partner is
    /// notified and immediately re-matched.
    fn skip(&self, id: ConnectionId) {
        let mut outbox = Outbox::default();
        let mut abandoned = None;
        {
            let mut state = self.state.lock();
            let Some(phase) = state.registry.get(id).map(|u| u.phase) else {
                return;
            };
            match phase {
                Phase::Waiting => {
                    state.queues.remove(id);
                    if let Some(user) = state.registry.get_mut(id) {
                        user.phase = Phase::Idle;
                        outbox.push(user, ServerEvent::Skipped);
                    }
                }
                Phase::Paired => {
                    abandoned = unlink(&mut state, id, Departure::Skip, &mut outbox);
                }
                Phase::Idle => {
                    tracing::debug!(conn = %id, "skip while idle ignored");
                }
            }
        }
        self.dispatch(outbox);

        if let Some(partner) = abandoned {
            self.rematch(partner);
        }
    }

    /// `leave-queue`: like skip, but silent towards the initiator.
    fn leave_queue(&self, id: ConnectionId) {
        let mut outbox = Outbox::default();
        let mut abandoned = None;
        {
            let mut state = self.state.lock();
            let Some(phase) = state.registry.get(id).map(|u| u.phase) else {
                return;
            };
            match phase {
                Phase::Waiting => {
                    state.queues.remove(id);
                    if let Some(user) = state.registry.get_mut(id) {
                        user.phase = Phase::Idle;
                    }
                }
                Phase::Paired => {
                    abandoned = unlink(&mut state, id, Departure::Leave, &mut outbox);
                }
                Phase::Idle => {}
            }
        }
        self.dispatch(outbox);

        if let Some(partner) = abandoned {
            self.rematch(partner);
        }
    }

    fn signal(&self, id: ConnectionId, event: ClientEvent) {
        let mut outbox = Outbox::default();
        {
            let state = self.state.lock();
            relay::forward_signal(&state.registry, id, event, &mut outbox);
        }
        self.dispatch(outbox);
    }

    fn message(&self, id: ConnectionId, text: String) {
        let mut outbox = Outbox::default();
        {
            let state = self.state.lock();
            relay::forward_message(&state.registry, id, text, &mut outbox);
        }
        self.dispatch(outbox);
    }

    /// Flush an outbox. A send that fails means that connection's transport
    /// is gone even though its read side never said so; it gets the same
    /// teardown as any other disconnect. Idempotent per connection — the
    /// recursive disconnect finds the registry entry already removed.
    fn dispatch(&self, outbox: Outbox) {
        for id in outbox.flush() {
            tracing::debug!(conn = %id, "outbound send failed; dropping connection");
            self.disconnect(id);
        }
    }

    /// Run an abandoned partner back through the matcher, exactly as if they
    /// had sent `join-queue` with their last-known profile. Skipped if they
    /// disconnected or re-joined on their own in the meantime.
    fn rematch(&self, id: ConnectionId) {
        let mut outbox = Outbox::default();
        {
            let mut state = self.state.lock();
            let eligible = state
                .registry
                .get(id)
                .is_some_and(|u| u.phase == Phase::Idle && u.profile.is_some());
            if eligible {
                run_match(&mut state, id, &mut outbox);
            }
        }
        self.dispatch(outbox);
    }

    /// Point-in-time counters for diagnostics.
    pub fn stats(&self) -> Stats {
        let state = self.state.lock();
        let mut stats = Stats {
            connections: state.registry.len(),
            waiting: 0,
            paired: 0,
        };
        for user in state.registry.iter() {
            match user.phase {
                Phase::Waiting => stats.waiting += 1,
                Phase::Paired => stats.paired += 1,
                Phase::Idle => {}
            }
        }
        stats
    }

    /// Diagnostic view of every connection.
    pub fn snapshot(&self) -> Vec<ConnectionSnapshot> {
        self.state.lock().registry.snapshot()
    }

    /// Panic if any structural invariant is broken. Test support: the suite
    /// runs this after every step so violations cannot ship; release code
    /// never calls it.
    pub fn check_invariants(&self) {
        let state = self.state.lock();

        for user in state.registry.iter() {
            let queued = state.queues.bucket_of(user.id).is_some();
            match user.phase {
                Phase::Idle => {
                    assert!(!queued, "idle connection {} is queued", user.id);
                    assert!(user.partner.is_none(), "idle connection {} has a partner", user.id);
                }
                Phase::Waiting => {
                    assert!(queued, "waiting connection {} is in no pool", user.id);
                    assert_eq!(
                        state.queues.occurrences(user.id),
                        1,
                        "waiting connection {} occupies more than one slot",
                        user.id
                    );
                    assert!(user.partner.is_none(), "waiting connection {} has a partner", user.id);
                }
                Phase::Paired => {
                    assert!(!queued, "paired connection {} is queued", user.id);
                    let partner_id = user
                        .partner
                        .unwrap_or_else(|| panic!("paired connection {} has no partner", user.id));
                    let partner = state
                        .registry
                        .get(partner_id)
                        .unwrap_or_else(|| panic!("partner {partner_id} of {} is gone", user.id));
                    assert_eq!(partner.phase, Phase::Paired);
                    assert_eq!(
                        partner.partner,
                        Some(user.id),
                        "partner pointers of {} and {partner_id} are asymmetric",
                        user.id
                    );
                }
            }
        }

        for waiter in state.queues.waiters().collect::<Vec<_>>() {
            let user = state
                .registry
                .get(waiter)
                .unwrap_or_else(|| panic!("queued connection {waiter} is not registered"));
            assert_eq!(user.phase, Phase::Waiting, "queued connection {waiter} is not waiting");
        }
    }
}

/// Match `id` or enqueue it. The single entry point used by both a fresh
/// `join-queue` and the mandatory re-match after a teardown.
///
/// Precondition: `id` is registered, Idle, and has a profile.
fn run_match(state: &mut CoreState, id: ConnectionId, outbox: &mut Outbox) {
    let CoreState { registry, queues } = state;

    let Some(profile) = registry.get(id).and_then(|u| u.profile.clone()) else {
        return;
    };

    match matcher::find_partner(registry, queues, id, &profile) {
        Some(waiter_id) => {
            let Some(waiter_profile) =
                registry.get(waiter_id).and_then(|u| u.profile.clone())
            else {
                return;
            };

            // The atomic half of the match: both partner pointers and both
            // phase transitions happen inside this same critical section.
            if let Some(user) = registry.get_mut(id) {
                user.partner = Some(waiter_id);
                user.phase = Phase::Paired;
                outbox.push(
                    user,
                    ServerEvent::Matched {
                        partner_id: waiter_id,
                        partner_info: waiter_profile.partner_info(),
                    },
                );
            }
            if let Some(waiter) = registry.get_mut(waiter_id) {
                waiter.partner = Some(id);
                waiter.phase = Phase::Paired;
                outbox.push(
                    waiter,
                    ServerEvent::Matched {
                        partner_id: id,
                        partner_info: profile.partner_info(),
                    },
                );
            }
            tracing::info!(conn = %id, partner = %waiter_id, "pair formed");
        }
        None => {
            let bucket = Bucket::for_profile(&profile);
            queues.enqueue(id, bucket);
            if let Some(user) = registry.get_mut(id) {
                user.phase = Phase::Waiting;
                outbox.push(user, ServerEvent::Waiting);
            }
            tracing::debug!(conn = %id, "no eligible partner; waiting");
        }
    }
}

/// Atomically dissolve the pair around `leaver`. Both partner pointers are
/// cleared and both sides go Idle before anything else happens; the farewell
/// events are queued for delivery after the lock drops. Returns the
/// abandoned partner so the caller can re-match them.
fn unlink(
    state: &mut CoreState,
    leaver: ConnectionId,
    departure: Departure,
    outbox: &mut Outbox,
) -> Option<ConnectionId> {
    let partner_id = state.registry.get(leaver).and_then(|u| u.partner)?;

    if let Some(user) = state.registry.get_mut(leaver) {
        user.partner = None;
        user.phase = Phase::Idle;
        if departure == Departure::Skip {
            outbox.push(user, ServerEvent::Skipped);
        }
    }

    if let Some(partner) = state.registry.get_mut(partner_id) {
        partner.partner = None;
        partner.phase = Phase::Idle;
        outbox.push(partner, departure.partner_event());
    }

    tracing::info!(conn = %leaver, partner = %partner_id, reason = ?departure, "pair dissolved");
    Some(partner_id)
}

/// Point-in-time engine counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Stats {
    pub connections: usize,
    pub waiting: usize,
    pub paired: usize,
}
