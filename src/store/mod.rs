//! Durable entity storage behind a narrow contract.
//!
//! The ledger only ever needs four primitives: point reads, all-or-nothing
//! poll creation, a conditional vote insert, and an atomic counter
//! increment. Both backends provide each primitive atomically on its own;
//! no caller ever holds a lock across two of them.

use async_trait::async_trait;

use crate::{
    error::AppError,
    model::{Poll, PollOption, VoteRecord},
};

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Outcome of the conditional vote insert. `AlreadyExists` carries the row
/// that won the race, so callers can report the voter's prior choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists(VoteRecord),
}

/// Consistent page-load read: the poll, its options in creation order, and
/// this identity's prior vote if any.
#[derive(Debug, Clone)]
pub struct PollSnapshot {
    pub poll: Poll,
    pub options: Vec<PollOption>,
    pub prior_vote: Option<VoteRecord>,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_poll(&self, id: &str) -> Result<Option<Poll>, AppError>;

    /// Options in creation order. Empty when the poll is unknown.
    async fn get_options(&self, poll_id: &str) -> Result<Vec<PollOption>, AppError>;

    /// All-or-nothing: a poll must never be visible without its full,
    /// fixed option set.
    async fn create_poll_with_options(
        &self,
        poll: &Poll,
        options: &[PollOption],
    ) -> Result<(), AppError>;

    /// Conditional insert keyed by `(poll_id, voter)`. This is the single
    /// serialization point for duplicate detection: under concurrent
    /// submissions from one identity exactly one call observes `Inserted`.
    async fn insert_vote_if_absent(
        &self,
        record: &VoteRecord,
    ) -> Result<InsertOutcome, AppError>;

    /// Atomically bump an option's counter and return the new value.
    /// Never read-modify-write at the caller.
    async fn increment_votes(&self, option_id: &str, delta: u64) -> Result<u64, AppError>;

    async fn get_vote(
        &self,
        poll_id: &str,
        voter: &str,
    ) -> Result<Option<VoteRecord>, AppError>;

    /// Single read backing initial page load, so a viewer never sees counts
    /// that postdate their own vote paired with a stale dedup status.
    async fn poll_snapshot(
        &self,
        poll_id: &str,
        voter: &str,
    ) -> Result<Option<PollSnapshot>, AppError>;
}
