//! Poll endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::DateTime;
use opine_common::{AppError, AppResult};
use opine_core::{
    CastVoteInput, FeedQuery, PersonalizedCard, PollCard, PollStatus, ResultItem, ResultsSummary,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{extractors::AuthUser, middleware::AppState, response};

/// Create the polls router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/feed", get(feed))
        .route("/feed/personalized", get(personalized_feed))
        .route("/{slug}/results", get(results))
        .route("/{slug}/summary", get(summary))
        .route("/{slug}/votes", post(cast_vote))
}

/// Feed query parameters.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedParams {
    pub limit: Option<u64>,
    pub cursor: Option<String>,
    pub quorum: Option<u64>,
}

/// Quorum override for results and summary lookups.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuorumParams {
    pub quorum: Option<u64>,
}

/// Vote request body.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    #[validate(length(min = 1, message = "optionId must not be empty"))]
    pub option_id: String,
    #[validate(length(min = 1, max = 128))]
    pub idempotency_key: Option<String>,
}

/// Option row in a poll card.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOptionResponse {
    pub option_id: String,
    pub label: String,
}

/// One option's share of the results.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultItemResponse {
    pub option_id: String,
    pub label: String,
    pub count: u64,
    pub pct: f64,
}

/// Aggregated results embedded in a card.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsSummaryResponse {
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub warming_up: bool,
    pub items: Vec<ResultItemResponse>,
}

/// Card-ready poll representation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollCardResponse {
    pub poll_id: String,
    pub slug: String,
    pub question: String,
    pub status: PollStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<String>,
    pub created_at: String,
    pub options: Vec<PollOptionResponse>,
    pub results: ResultsSummaryResponse,
}

/// Feed page response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub items: Vec<PollCardResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Feed card annotated with the caller's current vote.
#[derive(Debug, Serialize)]
pub struct PersonalizedCardResponse {
    #[serde(flatten)]
    pub card: PollCardResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
}

/// Personalized feed page response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizedFeedResponse {
    pub items: Vec<PersonalizedCardResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Results snapshot response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    pub items: Vec<ResultItemResponse>,
    pub total: u64,
    pub status: PollStatus,
    pub updated_at: String,
    pub warming_up: bool,
    pub min_quorum: u64,
}

impl From<ResultItem> for ResultItemResponse {
    fn from(item: ResultItem) -> Self {
        Self {
            option_id: item.option_id,
            label: item.label,
            count: item.count,
            pct: item.pct,
        }
    }
}

impl From<ResultsSummary> for ResultsSummaryResponse {
    fn from(summary: ResultsSummary) -> Self {
        Self {
            total: summary.total,
            updated_at: summary.updated_at.map(|t| t.to_rfc3339()),
            warming_up: summary.warming_up,
            items: summary.items.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<PollCard> for PollCardResponse {
    fn from(card: PollCard) -> Self {
        Self {
            poll_id: card.poll_id,
            slug: card.slug,
            question: card.question,
            status: card.status,
            category: card.category,
            opened_at: card.opened_at.map(|t| t.to_rfc3339()),
            created_at: card.created_at.to_rfc3339(),
            options: card
                .options
                .into_iter()
                .map(|o| PollOptionResponse {
                    option_id: o.option_id,
                    label: o.label,
                })
                .collect(),
            results: card.results.into(),
        }
    }
}

impl From<PersonalizedCard> for PersonalizedCardResponse {
    fn from(item: PersonalizedCard) -> Self {
        Self {
            card: item.card.into(),
            current: item.current,
        }
    }
}

fn parse_cursor(cursor: Option<&str>) -> AppResult<Option<Timestamp>> {
    cursor
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw).map_err(|_| {
                AppError::Validation("cursor must be an RFC 3339 timestamp with offset".to_string())
            })
        })
        .transpose()
}

fn feed_query(params: FeedParams) -> AppResult<FeedQuery> {
    Ok(FeedQuery {
        limit: params.limit,
        cursor: parse_cursor(params.cursor.as_deref())?,
        quorum: params.quorum,
    })
}

/// One page of open polls, newest first.
async fn feed(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> AppResult<Json<FeedResponse>> {
    let page = state.feed_service.feed(feed_query(params)?).await?;

    Ok(Json(FeedResponse {
        items: page.items.into_iter().map(Into::into).collect(),
        next_cursor: page.next_cursor.map(|c| c.to_rfc3339()),
    }))
}

/// The feed with each card annotated with the caller's current vote.
async fn personalized_feed(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> AppResult<Json<PersonalizedFeedResponse>> {
    let page = state
        .feed_service
        .personalized_feed(&user_id, feed_query(params)?)
        .await?;

    Ok(Json(PersonalizedFeedResponse {
        items: page.items.into_iter().map(Into::into).collect(),
        next_cursor: page.next_cursor.map(|c| c.to_rfc3339()),
    }))
}

/// Point-in-time tally snapshot for one poll.
async fn results(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<QuorumParams>,
) -> AppResult<Json<ResultsResponse>> {
    let results = state.poll_service.results(&slug, params.quorum).await?;

    Ok(Json(ResultsResponse {
        items: results.items.into_iter().map(Into::into).collect(),
        total: results.total,
        status: results.status,
        updated_at: results.updated_at.to_rfc3339(),
        warming_up: results.warming_up,
        min_quorum: results.min_quorum,
    }))
}

/// One card-ready poll by slug, any status.
async fn summary(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<QuorumParams>,
) -> AppResult<Json<PollCardResponse>> {
    let card = state.poll_service.summary(&slug, params.quorum).await?;
    Ok(Json(card.into()))
}

/// Cast a vote. Succeeds with no body; a replayed idempotency key is
/// indistinguishable from the first request.
async fn cast_vote(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<CastVoteRequest>,
) -> AppResult<impl IntoResponse> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    state
        .poll_service
        .cast_vote(CastVoteInput {
            slug,
            option_id: body.option_id,
            user_id,
            idempotency_key: body.idempotency_key,
        })
        .await?;

    Ok(response::ok())
}
