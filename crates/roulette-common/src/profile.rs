//! User profiles and the matching attributes they carry.
//!
//! A profile arrives on `join-queue` and is kept for the lifetime of the
//! connection so the matcher can re-queue an abandoned partner with their
//! last-known attributes. All identifier fields are opaque caller-supplied
//! strings; `age` is informational and merely echoed to the partner.

use serde::{Deserialize, Serialize};

/// Self-reported gender of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Which gender a user wants to be paired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderPreference {
    Any,
    Male,
    Female,
    Other,
}

impl GenderPreference {
    /// Does a partner of the given gender satisfy this preference?
    pub fn accepts(self, gender: Gender) -> bool {
        match self {
            Self::Any => true,
            Self::Male => gender == Gender::Male,
            Self::Female => gender == Gender::Female,
            Self::Other => gender == Gender::Other,
        }
    }

    /// The specific gender this preference names, if it names one.
    pub fn specific(self) -> Option<Gender> {
        match self {
            Self::Any => None,
            Self::Male => Some(Gender::Male),
            Self::Female => Some(Gender::Female),
            Self::Other => Some(Gender::Other),
        }
    }
}

/// Subscription tier. The service trusts the flag on the join message;
/// account storage and the subscription lifecycle live elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Premium,
}

/// The matching attributes attached to one connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub username: String,
    pub gender: Gender,
    pub age: u32,
    pub preferred_gender: GenderPreference,
    pub tier: Tier,
}

impl Profile {
    /// Enforce the tier rule server-side: a free user's specific preference
    /// is silently downgraded to `any`, whatever the client sent.
    pub fn normalize(mut self) -> Self {
        if self.tier == Tier::Free {
            self.preferred_gender = GenderPreference::Any;
        }
        self
    }

    /// The public subset a partner learns about this user on `matched`.
    pub fn partner_info(&self) -> PartnerInfo {
        PartnerInfo {
            name: self.username.clone(),
            gender: self.gender,
            age: self.age,
        }
    }
}

/// What each side of a fresh pair is told about the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerInfo {
    pub name: String,
    pub gender: Gender,
    pub age: u32,
}
