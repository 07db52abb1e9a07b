use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, Path, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::{
    error::AppError,
    model::{DisplayColour, Poll, PollOption, VoteOutcome},
    state::AppState,
    utils::voter_identity,
};

pub const MAX_QUESTION_LEN: usize = 60;
pub const MIN_OPTIONS: usize = 2;

#[derive(Deserialize)]
pub struct CreatePollRequest {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Serialize)]
pub struct CreatePollResponse {
    pub error: Option<&'static str>,
    pub url: Option<String>,
}

#[derive(Serialize)]
pub struct OptionView {
    pub id: String,
    pub label: String,
    pub votes: u64,
}

impl From<PollOption> for OptionView {
    fn from(option: PollOption) -> Self {
        Self {
            id: option.id,
            label: option.label,
            votes: option.votes,
        }
    }
}

#[derive(Serialize)]
pub struct PollView {
    pub question: String,
    pub created_at: DateTime<Utc>,
    pub colour: DisplayColour,
    pub options: Vec<OptionView>,
    pub voted: bool,
}

pub fn valid_poll(question: &str, options: &[String]) -> bool {
    !question.is_empty()
        && question.chars().count() < MAX_QUESTION_LEN
        && options.len() >= MIN_OPTIONS
}

pub async fn create_poll_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreatePollRequest>,
) -> Result<Json<CreatePollResponse>, AppError> {
    if !valid_poll(&payload.question, &payload.options) {
        return Err(AppError::Validation);
    }

    let poll = Poll::new(payload.question);
    let options: Vec<PollOption> = payload
        .options
        .into_iter()
        .map(|label| PollOption::new(&poll.id, label))
        .collect();

    state.store.create_poll_with_options(&poll, &options).await?;
    info!(poll_id = %poll.id, options = options.len(), "poll created");

    Ok(Json(CreatePollResponse {
        error: None,
        url: Some(format!("{}/{}", state.config.public_host, poll.id)),
    }))
}

pub async fn poll_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<PollView>, AppError> {
    let voter = voter_identity(&headers, peer);

    let snapshot = state
        .store
        .poll_snapshot(&poll_id, &voter)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(PollView {
        question: snapshot.poll.question,
        created_at: snapshot.poll.created_at,
        colour: snapshot.poll.colour,
        options: snapshot.options.into_iter().map(OptionView::from).collect(),
        voted: snapshot.prior_vote.is_some(),
    }))
}

pub async fn vote_handler(
    State(state): State<Arc<AppState>>,
    Path((poll_id, option_id)): Path<(String, String)>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<VoteOutcome>, AppError> {
    let voter = voter_identity(&headers, peer);

    let outcome = state.ledger.record_vote(&poll_id, &option_id, &voter).await?;
    Ok(Json(outcome))
}

pub async fn live_handler(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    if state.store.get_poll(&poll_id).await?.is_none() {
        return Err(AppError::NotFound);
    }

    Ok(ws.on_upgrade(move |socket| live_feed(state, poll_id, socket)))
}

/// Forward published option snapshots to one viewer until either side
/// closes. Teardown is deterministic: the receiver drops here and the
/// channel entry is pruned, so no subscription outlives its session.
async fn live_feed(state: Arc<AppState>, poll_id: String, socket: WebSocket) {
    let (mut outbound, mut inbound) = socket.split();
    let mut updates = state.notifier.subscribe(&poll_id);
    info!(%poll_id, "viewer connected");

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(option) => {
                    let frame = json!({ "event": "UPDATE", "option": option });
                    if outbound.send(Message::Text(frame.to_string())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    // Best-effort channel: a slow viewer just misses events
                    // and self-heals on the next full snapshot.
                    warn!(%poll_id, missed, "viewer lagged behind updates");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = inbound.next() => match incoming {
                // The feed is one-way; client frames are only liveness.
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }

    drop(updates);
    state.notifier.prune(&poll_id);
    info!(%poll_id, "viewer disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_and_options_bounds() {
        let two = vec!["Coffee".to_string(), "Tea".to_string()];

        assert!(valid_poll("Coffee or Tea?", &two));
        assert!(valid_poll(&"a".repeat(59), &two));

        // Exactly 60 chars is already too long.
        assert!(!valid_poll(&"a".repeat(60), &two));
        assert!(!valid_poll("", &two));
        assert!(!valid_poll("Coffee or Tea?", &["Coffee".to_string()]));
        assert!(!valid_poll("Coffee or Tea?", &[]));
    }
}
