//! In-process store used for development and tests.
//!
//! Every primitive is atomic through DashMap's shard locking: the vote
//! entry API serializes duplicate detection per identity, and `get_mut`
//! holds the shard write guard across the counter bump.

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};

use super::{EntityStore, InsertOutcome, PollSnapshot};
use crate::{
    error::AppError,
    model::{Poll, PollOption, VoteRecord},
};

#[derive(Default)]
pub struct MemoryStore {
    polls: DashMap<String, Poll>,
    options: DashMap<String, PollOption>,
    /// Option ids per poll, in creation order.
    option_order: DashMap<String, Vec<String>>,
    votes: DashMap<(String, String), VoteRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger rows for one poll, used by invariant checks in tests.
    pub fn vote_count(&self, poll_id: &str) -> usize {
        self.votes.iter().filter(|e| e.key().0 == poll_id).count()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get_poll(&self, id: &str) -> Result<Option<Poll>, AppError> {
        Ok(self.polls.get(id).map(|p| p.clone()))
    }

    async fn get_options(&self, poll_id: &str) -> Result<Vec<PollOption>, AppError> {
        let ids = match self.option_order.get(poll_id) {
            Some(ids) => ids.clone(),
            None => return Ok(Vec::new()),
        };

        Ok(ids
            .iter()
            .filter_map(|id| self.options.get(id).map(|o| o.clone()))
            .collect())
    }

    async fn create_poll_with_options(
        &self,
        poll: &Poll,
        options: &[PollOption],
    ) -> Result<(), AppError> {
        for option in options {
            self.options.insert(option.id.clone(), option.clone());
        }
        self.option_order.insert(
            poll.id.clone(),
            options.iter().map(|o| o.id.clone()).collect(),
        );

        // The poll row lands last, so a reader never finds a poll whose
        // option set is missing or partial.
        self.polls.insert(poll.id.clone(), poll.clone());

        Ok(())
    }

    async fn insert_vote_if_absent(
        &self,
        record: &VoteRecord,
    ) -> Result<InsertOutcome, AppError> {
        let key = (record.poll_id.clone(), record.voter.clone());

        match self.votes.entry(key) {
            Entry::Occupied(existing) => {
                Ok(InsertOutcome::AlreadyExists(existing.get().clone()))
            }
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn increment_votes(&self, option_id: &str, delta: u64) -> Result<u64, AppError> {
        let mut option = self.options.get_mut(option_id).ok_or(AppError::NotFound)?;
        option.votes += delta;
        Ok(option.votes)
    }

    async fn get_vote(
        &self,
        poll_id: &str,
        voter: &str,
    ) -> Result<Option<VoteRecord>, AppError> {
        Ok(self
            .votes
            .get(&(poll_id.to_string(), voter.to_string()))
            .map(|v| v.clone()))
    }

    async fn poll_snapshot(
        &self,
        poll_id: &str,
        voter: &str,
    ) -> Result<Option<PollSnapshot>, AppError> {
        let poll = match self.get_poll(poll_id).await? {
            Some(poll) => poll,
            None => return Ok(None),
        };

        let options = self.get_options(poll_id).await?;
        if options.is_empty() {
            return Ok(None);
        }

        Ok(Some(PollSnapshot {
            poll,
            options,
            prior_vote: self.get_vote(poll_id, voter).await?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> (Poll, Vec<PollOption>) {
        let poll = Poll::new("Coffee or Tea?".to_string());
        let options = vec![
            PollOption::new(&poll.id, "Coffee".to_string()),
            PollOption::new(&poll.id, "Tea".to_string()),
        ];
        (poll, options)
    }

    #[tokio::test]
    async fn creation_preserves_option_order() {
        let store = MemoryStore::new();
        let (poll, options) = seed();
        store.create_poll_with_options(&poll, &options).await.unwrap();

        let read = store.get_options(&poll.id).await.unwrap();
        let labels: Vec<_> = read.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, ["Coffee", "Tea"]);
    }

    #[tokio::test]
    async fn conditional_insert_dedups() {
        let store = MemoryStore::new();
        let (poll, options) = seed();
        store.create_poll_with_options(&poll, &options).await.unwrap();

        let first = VoteRecord::new(&poll.id, &options[0].id, "1.2.3.4");
        assert_eq!(
            store.insert_vote_if_absent(&first).await.unwrap(),
            InsertOutcome::Inserted
        );

        let second = VoteRecord::new(&poll.id, &options[1].id, "1.2.3.4");
        match store.insert_vote_if_absent(&second).await.unwrap() {
            InsertOutcome::AlreadyExists(prior) => {
                assert_eq!(prior.option_id, options[0].id);
            }
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
        assert_eq!(store.vote_count(&poll.id), 1);
    }

    #[tokio::test]
    async fn increment_returns_new_value() {
        let store = MemoryStore::new();
        let (poll, options) = seed();
        store.create_poll_with_options(&poll, &options).await.unwrap();

        assert_eq!(store.increment_votes(&options[0].id, 1).await.unwrap(), 1);
        assert_eq!(store.increment_votes(&options[0].id, 1).await.unwrap(), 2);
        assert_eq!(store.increment_votes(&options[1].id, 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn snapshot_reports_prior_vote() {
        let store = MemoryStore::new();
        let (poll, options) = seed();
        store.create_poll_with_options(&poll, &options).await.unwrap();

        let record = VoteRecord::new(&poll.id, &options[0].id, "1.2.3.4");
        store.insert_vote_if_absent(&record).await.unwrap();

        let voted = store.poll_snapshot(&poll.id, "1.2.3.4").await.unwrap().unwrap();
        assert_eq!(
            voted.prior_vote.as_ref().map(|v| v.option_id.as_str()),
            Some(options[0].id.as_str())
        );

        let fresh = store.poll_snapshot(&poll.id, "5.6.7.8").await.unwrap().unwrap();
        assert!(fresh.prior_vote.is_none());
    }

    #[tokio::test]
    async fn snapshot_of_unknown_poll_is_none() {
        let store = MemoryStore::new();
        assert!(store.poll_snapshot("missing", "1.2.3.4").await.unwrap().is_none());
    }
}
