//! End-to-end engine scenarios driven through fake transports.
//!
//! Each "client" here is just the receiving half of the per-connection
//! channel the gateway would normally own, so every outbound event the
//! engine produces can be asserted in order. Structural edge cases beyond
//! these literal flows are covered by the property suite in `invariants.rs`.

use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};

use roulette_common::{
    ClientEvent, ConnectionId, Gender, GenderPreference, Profile, ServerEvent, Tier,
};
use roulette_core::Matchmaker;

struct Client {
    id: ConnectionId,
    rx: UnboundedReceiver<ServerEvent>,
}

impl Client {
    fn recv(&mut self) -> ServerEvent {
        self.rx.try_recv().expect("expected an outbound event")
    }

    fn assert_silent(&mut self) {
        assert!(
            matches!(self.rx.try_recv(), Err(TryRecvError::Empty)),
            "expected no outbound events"
        );
    }
}

fn connect(engine: &Matchmaker) -> Client {
    let (tx, rx) = mpsc::unbounded_channel();
    Client {
        id: engine.connect(tx),
        rx,
    }
}

fn profile(
    username: &str,
    gender: Gender,
    preferred: GenderPreference,
    tier: Tier,
    age: u32,
) -> Profile {
    Profile {
        user_id: format!("user-{username}"),
        username: username.to_string(),
        gender,
        age,
        preferred_gender: preferred,
        tier,
    }
}

fn join(engine: &Matchmaker, client: &Client, profile: Profile) {
    engine.handle(client.id, ClientEvent::JoinQueue { profile });
}

fn pair_free(engine: &Matchmaker, a: &mut Client, b: &mut Client) {
    join(
        engine,
        a,
        profile("A", Gender::Male, GenderPreference::Any, Tier::Free, 20),
    );
    expect_waiting(a);
    join(
        engine,
        b,
        profile("B", Gender::Female, GenderPreference::Any, Tier::Free, 21),
    );
    expect_matched(a, b.id);
    expect_matched(b, a.id);
}

fn expect_waiting(client: &mut Client) {
    assert!(matches!(client.recv(), ServerEvent::Waiting));
}

fn expect_matched(client: &mut Client, partner: ConnectionId) -> roulette_common::PartnerInfo {
    match client.recv() {
        ServerEvent::Matched {
            partner_id,
            partner_info,
        } => {
            assert_eq!(partner_id, partner);
            partner_info
        }
        other => panic!("expected matched, got {other:?}"),
    }
}

#[test]
fn instant_match_between_two_compatible_users() {
    let engine = Matchmaker::new();
    let mut ana = connect(&engine);
    let mut ben = connect(&engine);

    join(
        &engine,
        &ana,
        profile("Ana", Gender::Female, GenderPreference::Any, Tier::Free, 22),
    );
    expect_waiting(&mut ana);

    join(
        &engine,
        &ben,
        profile("Ben", Gender::Male, GenderPreference::Any, Tier::Free, 24),
    );

    let info = expect_matched(&mut ana, ben.id);
    assert_eq!(info.name, "Ben");
    assert_eq!(info.gender, Gender::Male);
    assert_eq!(info.age, 24);

    let info = expect_matched(&mut ben, ana.id);
    assert_eq!(info.name, "Ana");
    assert_eq!(info.gender, Gender::Female);
    assert_eq!(info.age, 22);

    // Neither side sees a stray `waiting` after the pair forms.
    ana.assert_silent();
    ben.assert_silent();
    engine.check_invariants();
}

#[test]
fn premium_preference_is_honored_over_queue_seniority() {
    let engine = Matchmaker::new();
    let mut seeker = connect(&engine);
    let mut free_man = connect(&engine);
    let mut free_woman = connect(&engine);

    // Premium man looking for women waits in the targeted pool.
    join(
        &engine,
        &seeker,
        profile(
            "Sam",
            Gender::Male,
            GenderPreference::Female,
            Tier::Premium,
            31,
        ),
    );
    expect_waiting(&mut seeker);

    // A free man cannot satisfy the premium preference; he waits too.
    join(
        &engine,
        &free_man,
        profile("Finn", Gender::Male, GenderPreference::Any, Tier::Free, 25),
    );
    expect_waiting(&mut free_man);

    // A free woman matches the premium waiter even though the free man has
    // waited longer in the `any` pool.
    join(
        &engine,
        &free_woman,
        profile("Wren", Gender::Female, GenderPreference::Any, Tier::Free, 27),
    );

    expect_matched(&mut free_woman, seeker.id);
    expect_matched(&mut seeker, free_woman.id);
    free_man.assert_silent();
    engine.check_invariants();
}

#[test]
fn skip_returns_both_sides_and_rematches_the_abandoned_partner() {
    let engine = Matchmaker::new();
    let mut a = connect(&engine);
    let mut b = connect(&engine);
    let mut c = connect(&engine);

    pair_free(&engine, &mut a, &mut b);

    join(
        &engine,
        &c,
        profile("C", Gender::Other, GenderPreference::Any, Tier::Free, 22),
    );
    expect_waiting(&mut c);

    engine.handle(a.id, ClientEvent::Skip);

    assert!(matches!(a.recv(), ServerEvent::Skipped));
    a.assert_silent();

    // The abandoned side hears the skip first, then its fresh match.
    assert!(matches!(b.recv(), ServerEvent::PartnerSkipped));
    expect_matched(&mut b, c.id);
    expect_matched(&mut c, b.id);
    engine.check_invariants();
}

#[test]
fn disconnect_requeues_the_abandoned_partner() {
    let engine = Matchmaker::new();
    let mut a = connect(&engine);
    let mut b = connect(&engine);

    pair_free(&engine, &mut a, &mut b);

    engine.disconnect(a.id);

    assert!(matches!(b.recv(), ServerEvent::PartnerDisconnected));
    // Nobody else is around, so the partner goes back to waiting.
    expect_waiting(&mut b);
    b.assert_silent();

    let stats = engine.stats();
    assert_eq!(stats.connections, 1);
    assert_eq!(stats.waiting, 1);
    assert_eq!(stats.paired, 0);
    engine.check_invariants();
}

#[test]
fn signaling_is_confined_to_the_partner_edge() {
    let engine = Matchmaker::new();
    let mut a = connect(&engine);
    let mut b = connect(&engine);
    let mut bystander = connect(&engine);

    pair_free(&engine, &mut a, &mut b);

    let blob = json!({ "sdp": "v=0 o=- 4611731400430051336" });
    engine.handle(
        a.id,
        ClientEvent::Offer {
            offer: blob.clone(),
            target_id: b.id,
        },
    );

    match b.recv() {
        ServerEvent::Offer { offer, from_id } => {
            assert_eq!(offer, blob);
            assert_eq!(from_id, a.id);
        }
        other => panic!("expected relayed offer, got {other:?}"),
    }

    // Aiming at anyone but the current partner is silently dropped.
    engine.handle(
        a.id,
        ClientEvent::Offer {
            offer: json!({ "sdp": "second" }),
            target_id: bystander.id,
        },
    );
    bystander.assert_silent();
    b.assert_silent();

    // Answers and candidates ride the same edge.
    engine.handle(
        b.id,
        ClientEvent::Answer {
            answer: json!({ "sdp": "answer" }),
            target_id: a.id,
        },
    );
    assert!(matches!(a.recv(), ServerEvent::Answer { from_id, .. } if from_id == b.id));

    engine.handle(
        b.id,
        ClientEvent::IceCandidate {
            candidate: json!({ "candidate": "candidate:1 1 UDP 2122252543" }),
            target_id: a.id,
        },
    );
    assert!(matches!(a.recv(), ServerEvent::IceCandidate { from_id, .. } if from_id == b.id));
    engine.check_invariants();
}

#[test]
fn message_timestamp_is_assigned_by_the_server() {
    let engine = Matchmaker::new();
    let mut a = connect(&engine);
    let mut b = connect(&engine);

    pair_free(&engine, &mut a, &mut b);

    let before = Utc::now();
    engine.handle(a.id, ClientEvent::Message { text: "hi".into() });
    let after = Utc::now();

    match b.recv() {
        ServerEvent::Message {
            text,
            sender,
            timestamp,
        } => {
            assert_eq!(text, "hi");
            assert_eq!(sender, a.id);
            assert!(timestamp >= before && timestamp <= after);
        }
        other => panic!("expected relayed message, got {other:?}"),
    }
}

#[test]
fn dead_outbound_transport_is_treated_as_a_disconnect() {
    let engine = Matchmaker::new();
    let mut a = connect(&engine);
    let mut b = connect(&engine);

    pair_free(&engine, &mut a, &mut b);

    // b's write half dies while its read half stays open.
    drop(b);

    // The first delivery attempt fails and runs b's teardown: the partner is
    // notified and re-queued, exactly as if b's socket had closed.
    engine.handle(a.id, ClientEvent::Message { text: "hi".into() });

    assert!(matches!(a.recv(), ServerEvent::PartnerDisconnected));
    expect_waiting(&mut a);
    a.assert_silent();

    let stats = engine.stats();
    assert_eq!(stats.connections, 1);
    assert_eq!(stats.waiting, 1);
    engine.check_invariants();
}
