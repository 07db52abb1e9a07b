//! Core entities: polls, their options, and the append-only vote ledger rows.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A question with a fixed option set. Immutable after creation; only the
/// owned options' counters ever change, and only through the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Poll {
    pub id: String,
    pub question: String,
    pub created_at: DateTime<Utc>,
    pub single_choice: bool,
    pub colour: DisplayColour,
}

impl Poll {
    pub fn new(question: String) -> Self {
        Self {
            id: new_id(),
            question,
            created_at: Utc::now(),
            single_choice: true,
            colour: DisplayColour::random(),
        }
    }
}

/// One selectable choice within a poll. `votes` is mutated exclusively by
/// the store's atomic increment, never written back wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollOption {
    pub id: String,
    pub owner: String,
    pub label: String,
    pub votes: u64,
}

impl PollOption {
    pub fn new(owner: &str, label: String) -> Self {
        Self {
            id: new_id(),
            owner: owner.to_string(),
            label,
            votes: 0,
        }
    }
}

/// Append-only ledger row binding a voter identity to their choice.
///
/// The identity is the caller's network origin address. It is a weak,
/// spoofable pseudo-identity kept for dedup only, not a security boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteRecord {
    pub poll_id: String,
    pub option_id: String,
    pub voter: String,
    pub created_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn new(poll_id: &str, option_id: &str, voter: &str) -> Self {
        Self {
            poll_id: poll_id.to_string(),
            option_id: option_id.to_string(),
            voter: voter.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Cosmetic accent colour assigned at creation, from the frontend palette.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DisplayColour {
    Red,
    Orange,
    Amber,
    Yellow,
    Lime,
    Green,
    Emerald,
    Teal,
    Cyan,
    Sky,
    Blue,
    Indigo,
    Violet,
    Purple,
    Fuchsia,
    Pink,
    Rose,
}

impl DisplayColour {
    pub const ALL: [DisplayColour; 17] = [
        DisplayColour::Red,
        DisplayColour::Orange,
        DisplayColour::Amber,
        DisplayColour::Yellow,
        DisplayColour::Lime,
        DisplayColour::Green,
        DisplayColour::Emerald,
        DisplayColour::Teal,
        DisplayColour::Cyan,
        DisplayColour::Sky,
        DisplayColour::Blue,
        DisplayColour::Indigo,
        DisplayColour::Violet,
        DisplayColour::Purple,
        DisplayColour::Fuchsia,
        DisplayColour::Pink,
        DisplayColour::Rose,
    ];

    pub fn random() -> Self {
        *Self::ALL
            .choose(&mut rand::thread_rng())
            .unwrap_or(&DisplayColour::Blue)
    }
}

/// Result of a vote submission. `AlreadyVoted` is a success, not a failure:
/// a retried or duplicate submission lands here and mutates nothing.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VoteOutcome {
    /// The vote was recorded; `option` carries the post-increment count.
    Voted { option: PollOption },
    /// This identity already voted on the poll; `option` is their prior choice.
    AlreadyVoted { option: PollOption },
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_defaults_to_single_choice() {
        let poll = Poll::new("Coffee or Tea?".to_string());
        assert!(poll.single_choice);
        assert_eq!(poll.id.len(), 32);
    }

    #[test]
    fn new_option_starts_at_zero() {
        let option = PollOption::new("p1", "Coffee".to_string());
        assert_eq!(option.votes, 0);
        assert_eq!(option.owner, "p1");
    }

    #[test]
    fn colour_serializes_lowercase() {
        let json = serde_json::to_string(&DisplayColour::Emerald).unwrap();
        assert_eq!(json, "\"emerald\"");
    }

    #[test]
    fn outcome_tags_snake_case() {
        let outcome = VoteOutcome::AlreadyVoted {
            option: PollOption::new("p1", "Tea".to_string()),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "already_voted");
    }
}
