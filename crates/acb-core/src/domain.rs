use serde::{Deserialize, Serialize};

/// Stable numeric identity of a participant (Telegram user id).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn opposite(self) -> Gender {
        match self {
            Gender::Male => Gender::Female,
            Gender::Female => Gender::Male,
        }
    }
}

/// Registration progress. Only `Verified` users may search or be matched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verification {
    #[default]
    Unverified,
    PendingGender,
    PendingAge,
    Verified,
}

/// What the user is currently doing. The three states are mutually
/// exclusive; `Searching` implies queue membership, `Paired` implies a
/// partner link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activity {
    #[default]
    Idle,
    Searching,
    Paired,
}

/// Which candidate pool a search request targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchMode {
    /// Anyone eligible.
    Any,
    /// Only candidates of the opposite gender.
    OppositeGender,
}

impl SearchMode {
    pub const ALL: [SearchMode; 2] = [SearchMode::Any, SearchMode::OppositeGender];
}

/// Who wrote a logged chat line, from the owning user's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatOrigin {
    Own,
    Partner,
}
