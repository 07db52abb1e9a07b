//! The vote-recording protocol: validate, dedup, increment, publish.
//!
//! Exactly-once counting per identity holds with no poll-wide lock because
//! the two mutating steps are independently atomic in the store. The
//! conditional insert is the single serialization point per identity:
//! of any number of concurrent submissions from one voter, exactly one
//! observes `Inserted` and proceeds to the increment; the rest stop at
//! `AlreadyExists`. Distinct identities never contend at the insert, and
//! concurrent increments to one option serialize inside the store.
//!
//! A client-side timeout does not roll the insert back, so a retried
//! submission from the same identity lands on `AlreadyVoted` instead of
//! double-counting. That idempotence is what makes retry-on-timeout safe.

use std::sync::Arc;

use tracing::{error, info};

use crate::{
    error::AppError,
    model::{PollOption, VoteOutcome, VoteRecord},
    notifier::ChangeNotifier,
    store::{EntityStore, InsertOutcome},
};

pub struct VoteLedger {
    store: Arc<dyn EntityStore>,
    notifier: Arc<ChangeNotifier>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn EntityStore>, notifier: Arc<ChangeNotifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn record_vote(
        &self,
        poll_id: &str,
        option_id: &str,
        voter: &str,
    ) -> Result<VoteOutcome, AppError> {
        let options = self.store.get_options(poll_id).await?;
        if options.is_empty() {
            return Err(AppError::NotFound);
        }

        let target = options
            .iter()
            .find(|o| o.id == option_id)
            .ok_or(AppError::InvalidOption)?
            .clone();

        let record = VoteRecord::new(poll_id, option_id, voter);
        match self.store.insert_vote_if_absent(&record).await? {
            InsertOutcome::AlreadyExists(prior) => {
                // Duplicate submissions are a success with zero effect; the
                // response carries what this identity actually chose.
                let prior_option = options
                    .into_iter()
                    .find(|o| o.id == prior.option_id)
                    .ok_or(AppError::NotFound)?;
                Ok(VoteOutcome::AlreadyVoted {
                    option: prior_option,
                })
            }
            InsertOutcome::Inserted => {
                // The dedup row is committed and never rolled back. A lost
                // increment response must not be replayed here: the bump may
                // have applied server-side, and a second apply would detach
                // the counter from the ledger for good. Surfacing the
                // failure is safe because the caller's retry lands on
                // `AlreadyVoted`.
                let new_count = match self.store.increment_votes(&target.id, 1).await {
                    Ok(count) => count,
                    Err(e) => {
                        error!(option_id, "counter increment failed after dedup insert: {e}");
                        return Err(e);
                    }
                };

                let updated = PollOption {
                    votes: new_count,
                    ..target
                };
                info!(poll_id, option_id, votes = new_count, "vote recorded");

                // Best-effort: the vote is committed regardless of whether
                // any viewer hears about it.
                self.notifier.publish(poll_id, updated.clone());

                Ok(VoteOutcome::Voted { option: updated })
            }
        }
    }
}
