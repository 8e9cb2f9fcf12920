//! Remote gateway to the Poptato REST API.
//!
//! The list controllers and the session refresher only see the
//! [`TodoGateway`] and [`AuthGateway`] traits; `http` and `auth` provide the
//! reqwest-backed implementations.

pub mod auth;
pub mod http;

use crate::config::Config;
use crate::data::{
    Category, CategoryId, ListDomain, TodoId, TodoItem, TokenPair, Weekday, YesterdayItem,
};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

/// Server error code for an expired access token that can be reissued.
pub const EXPIRED_TOKEN_CODE: &str = "AUTH-002";
/// Server error code for a token that can't be recovered; forces logout.
pub const INVALID_TOKEN_CODE: &str = "AUTH-008";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("access token expired and could not be reissued")]
    ExpiredToken,

    #[error("session token is invalid")]
    InvalidToken,

    #[error("not signed in")]
    Unauthenticated,

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// The server error code, when the failure came from the API envelope.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            Self::ExpiredToken => Some(EXPIRED_TOKEN_CODE),
            Self::InvalidToken => Some(INVALID_TOKEN_CODE),
            _ => None,
        }
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// JSON envelope every endpoint answers with.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub is_success: bool,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    pub result: Option<T>,
}

/// A page of list items.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub total_count: u32,
    pub total_page_count: u32,
}

impl<T> ListPage<T> {
    pub fn single(items: Vec<T>) -> Self {
        let total_count = items.len() as u32;
        Self {
            items,
            total_count,
            total_page_count: 1,
        }
    }
}

/// Token reissue request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReissueRequest {
    pub tokens: TokenPair,
    pub client_id: String,
    pub mobile_type: String,
}

/// To-do and category operations of the remote API.
///
/// Every mutating call is a suspension point for the list controllers;
/// success and failure are inspected locally and never escalate.
#[async_trait]
pub trait TodoGateway: Send + Sync {
    async fn create(
        &self,
        domain: ListDomain,
        content: &str,
        category: CategoryId,
    ) -> GatewayResult<TodoId>;
    async fn delete(&self, id: TodoId) -> GatewayResult<()>;
    async fn modify_content(&self, id: TodoId, content: &str) -> GatewayResult<()>;
    async fn toggle_bookmark(&self, id: TodoId) -> GatewayResult<()>;
    async fn toggle_repeat(&self, id: TodoId) -> GatewayResult<()>;
    async fn set_deadline(&self, id: TodoId, deadline: Option<NaiveDate>) -> GatewayResult<()>;
    async fn set_time(&self, id: TodoId, time: Option<NaiveTime>) -> GatewayResult<()>;
    async fn set_category(&self, id: TodoId, category: Option<CategoryId>) -> GatewayResult<()>;
    async fn set_routine(&self, id: TodoId, days: Option<Vec<Weekday>>) -> GatewayResult<()>;
    async fn reorder(&self, domain: ListDomain, ids: &[TodoId]) -> GatewayResult<()>;
    /// Move an item between backlog and today.
    async fn swipe(&self, id: TodoId) -> GatewayResult<()>;
    async fn toggle_completion(&self, id: TodoId) -> GatewayResult<()>;
    async fn complete_yesterdays(&self, ids: &[TodoId]) -> GatewayResult<()>;

    async fn fetch_backlogs(
        &self,
        category: CategoryId,
        page: u32,
        size: u32,
    ) -> GatewayResult<ListPage<TodoItem>>;
    async fn fetch_todays(&self, page: u32, size: u32) -> GatewayResult<ListPage<TodoItem>>;
    async fn fetch_yesterdays(&self, page: u32, size: u32)
        -> GatewayResult<ListPage<YesterdayItem>>;
    /// Server-side categories only; the pinned pseudo-categories are added by the caller.
    async fn fetch_categories(&self) -> GatewayResult<Vec<Category>>;
    async fn reorder_categories(&self, ids: &[CategoryId]) -> GatewayResult<()>;
    async fn delete_category(&self, id: CategoryId) -> GatewayResult<()>;
}

/// Session operations. Kept apart from [`TodoGateway`] because reissue must
/// never go through the expired-token retry path itself.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn reissue_token(&self, request: ReissueRequest) -> GatewayResult<TokenPair>;
}

/// Shared HTTP client settings for all API requests.
pub fn build_http_client(config: &Config) -> GatewayResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(config.api.timeout())
        .connect_timeout(config.api.connect_timeout())
        .pool_max_idle_per_host(5)
        .build()?;
    Ok(client)
}

/// Join the configured base URL with an endpoint path.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
