//! Pairing rules: who may match whom, and in what order waiters are tried.
//!
//! Preferences are mutual. A premium user's specific preference constrains
//! the partner's gender in both directions: an incoming premium candidate
//! only takes waiters of the preferred gender, and a waiting premium user is
//! only taken by candidates of theirs. Free users' preferences are downgraded
//! to `any` before they reach this module (see `Profile::normalize`), so here
//! eligibility is simply mutual acceptance.

use roulette_common::{ConnectionId, Profile};

use crate::queue::{Bucket, QueueSet};
use crate::registry::Registry;

/// Two profiles may pair iff each one's preference accepts the other's
/// gender.
pub fn mutually_eligible(a: &Profile, b: &Profile) -> bool {
    a.preferred_gender.accepts(b.gender) && b.preferred_gender.accepts(a.gender)
}

/// Find and claim the longest-waiting eligible partner for `candidate`.
///
/// Scan order: the pool named by the candidate's own gender first — that is
/// where premium waiters who asked for this gender sit, so their paid
/// preference outranks plain seniority in `any` — then the `any` pool.
/// The remaining pools cannot hold an eligible waiter: a waiter in pool `g`
/// is premium with preference `g`, which the candidate's gender fails.
///
/// On success the waiter has already been removed from its pool; the caller
/// completes the pairing. Returns `None` when no waiter is eligible.
pub fn find_partner(
    registry: &Registry,
    queues: &mut QueueSet,
    candidate_id: ConnectionId,
    candidate: &Profile,
) -> Option<ConnectionId> {
    for bucket in [Bucket::seeking(candidate.gender), Bucket::Any] {
        let found = queues.scan(bucket, |waiter_id| {
            if waiter_id == candidate_id {
                return false;
            }
            registry
                .get(waiter_id)
                .and_then(|waiter| waiter.profile.as_ref())
                .is_some_and(|waiter| mutually_eligible(candidate, waiter))
        });
        if found.is_some() {
            return found;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use roulette_common::{Gender, GenderPreference, Tier};

    fn profile(gender: Gender, preferred: GenderPreference, tier: Tier) -> Profile {
        Profile {
            user_id: "u".into(),
            username: "n".into(),
            gender,
            age: 25,
            preferred_gender: preferred,
            tier,
        }
        .normalize()
    }

    #[test]
    fn free_users_accept_everyone() {
        let a = profile(Gender::Male, GenderPreference::Any, Tier::Free);
        let b = profile(Gender::Female, GenderPreference::Any, Tier::Free);
        assert!(mutually_eligible(&a, &b));
    }

    #[test]
    fn premium_preference_constrains_partner_gender() {
        let seeker = profile(Gender::Male, GenderPreference::Female, Tier::Premium);
        let woman = profile(Gender::Female, GenderPreference::Any, Tier::Free);
        let man = profile(Gender::Male, GenderPreference::Any, Tier::Free);

        assert!(mutually_eligible(&seeker, &woman));
        assert!(!mutually_eligible(&seeker, &man));
    }

    #[test]
    fn preference_cuts_both_ways() {
        // The waiter's premium preference must also accept the candidate.
        let candidate = profile(Gender::Male, GenderPreference::Any, Tier::Free);
        let waiter = profile(Gender::Female, GenderPreference::Female, Tier::Premium);
        assert!(!mutually_eligible(&candidate, &waiter));
    }

    #[test]
    fn two_premiums_match_when_both_prefs_hold() {
        let a = profile(Gender::Male, GenderPreference::Female, Tier::Premium);
        let b = profile(Gender::Female, GenderPreference::Male, Tier::Premium);
        assert!(mutually_eligible(&a, &b));

        // One-sided satisfaction is not enough.
        let c = profile(Gender::Female, GenderPreference::Female, Tier::Premium);
        assert!(!mutually_eligible(&a, &c));
    }

    #[test]
    fn normalized_free_preference_is_ignored() {
        // A free client claiming a specific preference is downgraded.
        let sneaky = profile(Gender::Male, GenderPreference::Female, Tier::Free);
        let man = profile(Gender::Male, GenderPreference::Any, Tier::Free);
        assert!(mutually_eligible(&sneaky, &man));
    }
}
