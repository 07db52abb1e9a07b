//! Redis-backed store.
//!
//! Layout:
//! - `poll:{id}` — poll row as JSON
//! - `options:{poll_id}` — list of option ids in creation order
//! - `option:{id}` — hash `{owner, label, votes}`, counter bumped by HINCRBY
//! - `votes:{poll_id}` — hash voter identity -> VoteRecord JSON, guarded by
//!   HSETNX
//!
//! HSETNX and HINCRBY are each atomic server-side, which is the whole
//! contract: duplicate detection serializes per identity and counter bumps
//! serialize per option, with no cross-key locking.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, Client,
};

use super::{EntityStore, InsertOutcome, PollSnapshot};
use crate::{
    error::AppError,
    model::{Poll, PollOption, VoteRecord},
};

pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, AppError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(100));

        let client = Client::open(redis_url)?;
        let connection = client
            .get_connection_manager_with_config(config)
            .await?;

        Ok(Self { connection })
    }

    fn poll_key(id: &str) -> String {
        format!("poll:{id}")
    }

    fn order_key(poll_id: &str) -> String {
        format!("options:{poll_id}")
    }

    fn option_key(id: &str) -> String {
        format!("option:{id}")
    }

    fn votes_key(poll_id: &str) -> String {
        format!("votes:{poll_id}")
    }

    async fn fetch_options(
        &self,
        ids: &[String],
    ) -> Result<Vec<PollOption>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.connection.clone();
        let mut pipe = redis::pipe();
        for id in ids {
            pipe.hgetall(Self::option_key(id));
        }
        let rows: Vec<HashMap<String, String>> = pipe.query_async(&mut conn).await?;

        let mut options = Vec::with_capacity(ids.len());
        for (id, row) in ids.iter().zip(rows) {
            // Skip ids whose hash is gone; a poll's option set is fixed, so
            // this only happens if rows were removed out of band.
            if row.is_empty() {
                continue;
            }
            options.push(PollOption {
                id: id.clone(),
                owner: row.get("owner").cloned().unwrap_or_default(),
                label: row.get("label").cloned().unwrap_or_default(),
                votes: row
                    .get("votes")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_default(),
            });
        }

        Ok(options)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value).map_err(|e| AppError::Internal(Box::new(e)))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, AppError> {
    serde_json::from_str(raw).map_err(|e| AppError::Internal(Box::new(e)))
}

#[async_trait]
impl EntityStore for RedisStore {
    async fn get_poll(&self, id: &str) -> Result<Option<Poll>, AppError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(Self::poll_key(id)).await?;
        raw.as_deref().map(from_json).transpose()
    }

    async fn get_options(&self, poll_id: &str) -> Result<Vec<PollOption>, AppError> {
        let mut conn = self.connection.clone();
        let ids: Vec<String> = conn.lrange(Self::order_key(poll_id), 0, -1).await?;
        self.fetch_options(&ids).await
    }

    async fn create_poll_with_options(
        &self,
        poll: &Poll,
        options: &[PollOption],
    ) -> Result<(), AppError> {
        let mut conn = self.connection.clone();

        // One MULTI/EXEC commits poll, option rows, and the order list
        // together, so no reader ever observes a partial option set.
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.set(Self::poll_key(&poll.id), to_json(poll)?).ignore();
        for option in options {
            pipe.hset_multiple(
                Self::option_key(&option.id),
                &[
                    ("owner", option.owner.as_str()),
                    ("label", option.label.as_str()),
                    ("votes", "0"),
                ],
            )
            .ignore();
            pipe.rpush(Self::order_key(&poll.id), &option.id).ignore();
        }
        pipe.query_async::<()>(&mut conn).await?;

        Ok(())
    }

    async fn insert_vote_if_absent(
        &self,
        record: &VoteRecord,
    ) -> Result<InsertOutcome, AppError> {
        let mut conn = self.connection.clone();
        let key = Self::votes_key(&record.poll_id);

        let inserted: bool = conn
            .hset_nx(&key, &record.voter, to_json(record)?)
            .await?;
        if inserted {
            return Ok(InsertOutcome::Inserted);
        }

        let raw: Option<String> = conn.hget(&key, &record.voter).await?;
        match raw {
            Some(raw) => Ok(InsertOutcome::AlreadyExists(from_json(&raw)?)),
            // The row vanished between HSETNX and HGET; rows are append-only
            // so treat it as a transient store fault.
            None => Err(AppError::StoreUnavailable(
                "vote row disappeared during dedup read".to_string(),
            )),
        }
    }

    async fn increment_votes(&self, option_id: &str, delta: u64) -> Result<u64, AppError> {
        let mut conn = self.connection.clone();
        let new_value: i64 = conn
            .hincr(Self::option_key(option_id), "votes", delta as i64)
            .await?;
        Ok(new_value.max(0) as u64)
    }

    async fn get_vote(
        &self,
        poll_id: &str,
        voter: &str,
    ) -> Result<Option<VoteRecord>, AppError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.hget(Self::votes_key(poll_id), voter).await?;
        raw.as_deref().map(from_json).transpose()
    }

    async fn poll_snapshot(
        &self,
        poll_id: &str,
        voter: &str,
    ) -> Result<Option<PollSnapshot>, AppError> {
        let mut conn = self.connection.clone();

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.get(Self::poll_key(poll_id));
        pipe.lrange(Self::order_key(poll_id), 0, -1);
        pipe.hget(Self::votes_key(poll_id), voter);
        let (poll_raw, ids, vote_raw): (Option<String>, Vec<String>, Option<String>) =
            pipe.query_async(&mut conn).await?;

        let poll: Poll = match poll_raw.as_deref() {
            Some(raw) => from_json(raw)?,
            None => return Ok(None),
        };

        let options = self.fetch_options(&ids).await?;
        if options.is_empty() {
            return Ok(None);
        }

        Ok(Some(PollSnapshot {
            poll,
            options,
            prior_vote: vote_raw.as_deref().map(from_json).transpose()?,
        }))
    }
}
