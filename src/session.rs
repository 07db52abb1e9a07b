//! Client-side replica of a poll's options, reconciled from live updates.
//!
//! The replica is seeded from one consistent server read and then patched
//! by whole-option snapshots: each incoming event replaces the matching
//! local entry by id. Totals are always derived by summing the list, never
//! tracked separately, so the displayed total cannot drift from the
//! per-option counts.

use crate::{model::PollOption, store::PollSnapshot};

/// Client-visible vote progress. `Voted` is terminal: once an identity has
/// voted, a session never offers the vote flow again. On resume the state
/// is re-derived from the server's dedup lookup, not local memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteState {
    NotVoted,
    Selecting { option_id: String },
    Submitting { option_id: String },
    Voted { option_id: String },
}

pub struct ViewerSession {
    options: Vec<PollOption>,
    state: VoteState,
}

impl ViewerSession {
    /// Seed from the initial page-load snapshot. A recorded prior vote puts
    /// the session straight into `Voted`.
    pub fn from_snapshot(snapshot: &PollSnapshot) -> Self {
        let state = match &snapshot.prior_vote {
            Some(vote) => VoteState::Voted {
                option_id: vote.option_id.clone(),
            },
            None => VoteState::NotVoted,
        };

        Self {
            options: snapshot.options.clone(),
            state,
        }
    }

    pub fn options(&self) -> &[PollOption] {
        &self.options
    }

    pub fn state(&self) -> &VoteState {
        &self.state
    }

    /// Reconcile one published update: replace the local entry wholesale.
    /// Unknown ids are ignored; option sets are fixed at creation, so an
    /// unknown id can only be a stray event for another poll.
    pub fn apply(&mut self, update: PollOption) {
        if let Some(entry) = self.options.iter_mut().find(|o| o.id == update.id) {
            *entry = update;
        }
    }

    /// Derived on every call; no separate bookkeeping to drift.
    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|o| o.votes).sum()
    }

    /// Pick an option. Allowed while not yet submitted; re-picking while
    /// selecting just moves the highlight.
    pub fn select(&mut self, option_id: &str) -> bool {
        match self.state {
            VoteState::NotVoted | VoteState::Selecting { .. } => {
                self.state = VoteState::Selecting {
                    option_id: option_id.to_string(),
                };
                true
            }
            VoteState::Submitting { .. } | VoteState::Voted { .. } => false,
        }
    }

    /// Begin submitting the current selection.
    pub fn begin_submit(&mut self) -> Option<String> {
        if let VoteState::Selecting { option_id } = &self.state {
            let option_id = option_id.clone();
            self.state = VoteState::Submitting {
                option_id: option_id.clone(),
            };
            Some(option_id)
        } else {
            None
        }
    }

    /// Server acknowledged the vote (or reported a prior one); either way
    /// the session is terminal for this poll. `option_id` is what the
    /// ledger actually recorded, which wins over the local selection.
    pub fn confirm_voted(&mut self, option_id: &str) {
        self.state = VoteState::Voted {
            option_id: option_id.to_string(),
        };
    }

    /// Submission failed before committing; back to selecting for a retry.
    pub fn submit_failed(&mut self) {
        if let VoteState::Submitting { option_id } = &self.state {
            self.state = VoteState::Selecting {
                option_id: option_id.clone(),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Poll, VoteRecord};

    fn option(id: &str, votes: u64) -> PollOption {
        PollOption {
            id: id.to_string(),
            owner: "p1".to_string(),
            label: format!("option {id}"),
            votes,
        }
    }

    fn snapshot(prior_vote: Option<VoteRecord>) -> PollSnapshot {
        PollSnapshot {
            poll: Poll::new("Coffee or Tea?".to_string()),
            options: vec![option("1", 2), option("2", 1)],
            prior_vote,
        }
    }

    #[test]
    fn update_replaces_entry_and_total_is_derived() {
        let mut session = ViewerSession::from_snapshot(&snapshot(None));
        assert_eq!(session.total_votes(), 3);

        session.apply(option("2", 2));

        let counts: Vec<_> = session.options().iter().map(|o| o.votes).collect();
        assert_eq!(counts, [2, 2]);
        assert_eq!(session.total_votes(), 4);
    }

    #[test]
    fn unknown_update_is_ignored() {
        let mut session = ViewerSession::from_snapshot(&snapshot(None));
        session.apply(option("99", 7));

        assert_eq!(session.options().len(), 2);
        assert_eq!(session.total_votes(), 3);
    }

    #[test]
    fn stale_update_self_heals_on_next_delivery() {
        let mut session = ViewerSession::from_snapshot(&snapshot(None));

        // Deliveries arrive out of order; each is a full snapshot, so the
        // later one simply overwrites the stale count.
        session.apply(option("1", 5));
        session.apply(option("1", 4));
        assert_eq!(session.options()[0].votes, 4);

        session.apply(option("1", 6));
        assert_eq!(session.options()[0].votes, 6);
    }

    #[test]
    fn happy_path_reaches_terminal_voted() {
        let mut session = ViewerSession::from_snapshot(&snapshot(None));
        assert_eq!(*session.state(), VoteState::NotVoted);

        assert!(session.select("1"));
        assert!(session.select("2"));
        assert_eq!(session.begin_submit().as_deref(), Some("2"));
        session.confirm_voted("2");

        assert_eq!(
            *session.state(),
            VoteState::Voted {
                option_id: "2".to_string()
            }
        );
        assert!(!session.select("1"));
    }

    #[test]
    fn selecting_is_required_before_submitting() {
        let mut session = ViewerSession::from_snapshot(&snapshot(None));
        assert_eq!(session.begin_submit(), None);
    }

    #[test]
    fn failed_submit_returns_to_selecting() {
        let mut session = ViewerSession::from_snapshot(&snapshot(None));
        session.select("1");
        session.begin_submit();
        session.submit_failed();

        assert_eq!(
            *session.state(),
            VoteState::Selecting {
                option_id: "1".to_string()
            }
        );
    }

    #[test]
    fn resume_derives_voted_from_server_dedup() {
        let prior = VoteRecord::new("p1", "1", "10.0.0.1");
        let session = ViewerSession::from_snapshot(&snapshot(Some(prior)));

        assert_eq!(
            *session.state(),
            VoteState::Voted {
                option_id: "1".to_string()
            }
        );
    }

    #[test]
    fn already_voted_response_overrides_local_selection() {
        let mut session = ViewerSession::from_snapshot(&snapshot(None));
        session.select("2");
        session.begin_submit();

        // Server reports this identity already chose option 1 elsewhere.
        session.confirm_voted("1");
        assert_eq!(
            *session.state(),
            VoteState::Voted {
                option_id: "1".to_string()
            }
        );
    }
}
