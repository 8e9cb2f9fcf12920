//! reqwest-backed [`TodoGateway`].
//!
//! Attaches the current access token to every request. When the server
//! answers with an authentication error code the response goes through the
//! [`TokenAuthenticator`]; a reissued token retransmits the request once.

use super::{
    endpoint, ApiResponse, GatewayError, GatewayResult, ListPage, TodoGateway,
    EXPIRED_TOKEN_CODE, INVALID_TOKEN_CODE,
};
use crate::data::{
    Category, CategoryId, CategoryRef, ListDomain, TodoId, TodoItem, TodoStatus, Weekday,
    YesterdayItem,
};
use crate::session::{AuthOutcome, TokenAuthenticator};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    authenticator: TokenAuthenticator,
}

impl HttpGateway {
    pub fn new(client: reqwest::Client, base_url: &str, authenticator: TokenAuthenticator) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            authenticator,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> GatewayResult<Option<T>> {
        let mut access = self
            .authenticator
            .session()
            .access_token()
            .ok_or(GatewayError::Unauthenticated)?;
        let mut retransmitted = false;

        loop {
            let mut request = self
                .client
                .request(method.clone(), endpoint(&self.base_url, path))
                .bearer_auth(&access);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;

            let failure = match interpret::<T>(status, &text) {
                Ok(result) => return Ok(result),
                Err(failure) => failure,
            };

            let code = failure.code().unwrap_or_default().to_string();
            let is_auth_code = code == EXPIRED_TOKEN_CODE || code == INVALID_TOKEN_CODE;
            if retransmitted || !is_auth_code {
                tracing::debug!("{} {} failed: {}", method, path, failure);
                return Err(failure);
            }

            match self.authenticator.authenticate(&code, Some(&access)).await {
                AuthOutcome::Reissued(tokens) => {
                    tracing::debug!("Retrying {} {} with reissued token", method, path);
                    access = tokens.access_token;
                    retransmitted = true;
                }
                AuthOutcome::Failed => return Err(GatewayError::ExpiredToken),
                AuthOutcome::LoggedOut => return Err(GatewayError::InvalidToken),
                AuthOutcome::Unhandled => return Err(failure),
            }
        }
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> GatewayResult<()> {
        self.call::<Value>(method, path, &[], body).await?;
        Ok(())
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> GatewayResult<T> {
        self.call::<T>(Method::GET, path, query, None)
            .await?
            .ok_or_else(|| GatewayError::Decode(format!("{} returned no result", path)))
    }
}

/// Turn a raw HTTP answer into the envelope's result or a typed failure.
pub(crate) fn interpret<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
) -> GatewayResult<Option<T>> {
    let envelope: ApiResponse<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => return Err(GatewayError::Decode(e.to_string())),
        Err(_) => {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                code: String::new(),
                message: body.chars().take(200).collect(),
            })
        }
    };

    if status.is_success() && envelope.is_success {
        return Ok(envelope.result);
    }

    Err(GatewayError::Api {
        status: status.as_u16(),
        code: envelope.code,
        message: envelope.message,
    })
}

// =============================================================================
// Wire models
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TodoItemResponse {
    todo_id: i64,
    #[serde(default)]
    content: String,
    today_status: Option<String>,
    #[serde(default)]
    is_bookmark: bool,
    #[serde(default)]
    is_repeat: bool,
    deadline: Option<String>,
    category_id: Option<i64>,
    category_name: Option<String>,
    image_url: Option<String>,
    time: Option<String>,
    routine_days: Option<Vec<String>>,
}

impl From<TodoItemResponse> for TodoItem {
    fn from(r: TodoItemResponse) -> Self {
        let category = r
            .category_name
            .filter(|name| !name.is_empty())
            .map(|name| CategoryRef {
                id: CategoryId(r.category_id.unwrap_or(-1)),
                name,
                emoji_url: r.image_url.filter(|url| !url.is_empty()),
            });

        TodoItem {
            id: TodoId(r.todo_id),
            content: r.content,
            status: parse_status(r.today_status.as_deref()),
            is_bookmark: r.is_bookmark,
            is_repeat: r.is_repeat,
            routine_days: r
                .routine_days
                .unwrap_or_default()
                .iter()
                .filter_map(|d| Weekday::from_wire_name(d))
                .collect(),
            deadline: r
                .deadline
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok()),
            time: r
                .time
                .as_deref()
                .and_then(|t| NaiveTime::parse_from_str(t, TIME_FORMAT).ok()),
            category,
        }
    }
}

fn parse_status(status: Option<&str>) -> TodoStatus {
    match status {
        Some("COMPLETED") => TodoStatus::Completed,
        _ => TodoStatus::Incomplete,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BacklogListResponse {
    #[serde(default)]
    backlogs: Vec<TodoItemResponse>,
    #[serde(default)]
    total_count: u32,
    #[serde(default)]
    total_page_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TodayListResponse {
    #[serde(default)]
    todays: Vec<TodoItemResponse>,
    #[serde(default)]
    total_page_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YesterdayItemResponse {
    todo_id: i64,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YesterdayListResponse {
    #[serde(default)]
    yesterdays: Vec<YesterdayItemResponse>,
    #[serde(default)]
    total_page_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryResponse {
    category_id: i64,
    #[serde(default)]
    category_name: String,
    category_img_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryListResponse {
    #[serde(default)]
    categories: Vec<CategoryResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TodoIdResponse {
    todo_id: i64,
}

fn todo_path(id: TodoId, suffix: &str) -> String {
    format!("/todo/{}{}", id, suffix)
}

#[async_trait]
impl TodoGateway for HttpGateway {
    async fn create(
        &self,
        domain: ListDomain,
        content: &str,
        category: CategoryId,
    ) -> GatewayResult<TodoId> {
        if domain != ListDomain::Backlog {
            return Err(GatewayError::Unsupported("items can only be created in the backlog"));
        }
        let body = json!({ "categoryId": category.0, "content": content });
        let created: TodoIdResponse = self
            .call(Method::POST, "/backlog", &[], Some(body))
            .await?
            .ok_or_else(|| GatewayError::Decode("create returned no id".to_string()))?;
        Ok(TodoId(created.todo_id))
    }

    async fn delete(&self, id: TodoId) -> GatewayResult<()> {
        self.send(Method::DELETE, &todo_path(id, ""), None).await
    }

    async fn modify_content(&self, id: TodoId, content: &str) -> GatewayResult<()> {
        let body = json!({ "content": content });
        self.send(Method::PATCH, &todo_path(id, "/content"), Some(body))
            .await
    }

    async fn toggle_bookmark(&self, id: TodoId) -> GatewayResult<()> {
        self.send(Method::PATCH, &todo_path(id, "/bookmark"), None).await
    }

    async fn toggle_repeat(&self, id: TodoId) -> GatewayResult<()> {
        self.send(Method::PATCH, &todo_path(id, "/repeat"), None).await
    }

    async fn set_deadline(&self, id: TodoId, deadline: Option<NaiveDate>) -> GatewayResult<()> {
        let deadline = deadline.map(|d| d.format(DATE_FORMAT).to_string());
        let body = json!({ "deadline": deadline });
        self.send(Method::PATCH, &todo_path(id, "/deadline"), Some(body))
            .await
    }

    async fn set_time(&self, id: TodoId, time: Option<NaiveTime>) -> GatewayResult<()> {
        let time = time.map(|t| t.format(TIME_FORMAT).to_string());
        let body = json!({ "todoTime": time });
        self.send(Method::PATCH, &todo_path(id, "/time"), Some(body))
            .await
    }

    async fn set_category(&self, id: TodoId, category: Option<CategoryId>) -> GatewayResult<()> {
        let body = json!({ "todoCategoryId": category.map(|c| c.0) });
        self.send(Method::PATCH, &todo_path(id, "/category"), Some(body))
            .await
    }

    async fn set_routine(&self, id: TodoId, days: Option<Vec<Weekday>>) -> GatewayResult<()> {
        let days: Option<Vec<&str>> =
            days.map(|days| days.iter().map(Weekday::wire_name).collect());
        let body = json!({ "routineDays": days });
        self.send(Method::PUT, &todo_path(id, "/routine"), Some(body))
            .await
    }

    async fn reorder(&self, domain: ListDomain, ids: &[TodoId]) -> GatewayResult<()> {
        let body = json!({ "type": domain, "todoIds": ids });
        self.send(Method::PATCH, "/dragAndDrop", Some(body)).await
    }

    async fn swipe(&self, id: TodoId) -> GatewayResult<()> {
        let body = json!({ "todoId": id });
        self.send(Method::PATCH, "/swipe", Some(body)).await
    }

    async fn toggle_completion(&self, id: TodoId) -> GatewayResult<()> {
        self.send(Method::PATCH, &todo_path(id, "/achieve"), None).await
    }

    async fn complete_yesterdays(&self, ids: &[TodoId]) -> GatewayResult<()> {
        let body = json!({ "todoIds": ids });
        self.send(Method::POST, "/yesterdays/completion", Some(body))
            .await
    }

    async fn fetch_backlogs(
        &self,
        category: CategoryId,
        page: u32,
        size: u32,
    ) -> GatewayResult<ListPage<TodoItem>> {
        let query = [
            ("category", category.0.to_string()),
            ("page", page.to_string()),
            ("size", size.to_string()),
        ];
        let response: BacklogListResponse = self.fetch("/backlogs", &query).await?;
        Ok(ListPage {
            items: response.backlogs.into_iter().map(TodoItem::from).collect(),
            total_count: response.total_count,
            total_page_count: response.total_page_count,
        })
    }

    async fn fetch_todays(&self, page: u32, size: u32) -> GatewayResult<ListPage<TodoItem>> {
        let query = [("page", page.to_string()), ("size", size.to_string())];
        let response: TodayListResponse = self.fetch("/todays", &query).await?;
        let items: Vec<TodoItem> = response.todays.into_iter().map(TodoItem::from).collect();
        Ok(ListPage {
            total_count: items.len() as u32,
            items,
            total_page_count: response.total_page_count,
        })
    }

    async fn fetch_yesterdays(
        &self,
        page: u32,
        size: u32,
    ) -> GatewayResult<ListPage<YesterdayItem>> {
        let query = [("page", page.to_string()), ("size", size.to_string())];
        let response: YesterdayListResponse = self.fetch("/yesterdays", &query).await?;
        let items: Vec<YesterdayItem> = response
            .yesterdays
            .into_iter()
            .map(|y| YesterdayItem {
                id: TodoId(y.todo_id),
                content: y.content,
                status: TodoStatus::Incomplete,
            })
            .collect();
        Ok(ListPage {
            total_count: items.len() as u32,
            items,
            total_page_count: response.total_page_count,
        })
    }

    async fn fetch_categories(&self) -> GatewayResult<Vec<Category>> {
        let query = [("page", "0".to_string()), ("size", "100".to_string())];
        let response: CategoryListResponse = self.fetch("/categories", &query).await?;
        Ok(response
            .categories
            .into_iter()
            // The server echoes the pseudo-categories on some versions.
            .filter(|c| !CategoryId(c.category_id).is_pinned())
            .map(|c| Category {
                id: CategoryId(c.category_id),
                name: c.category_name,
                emoji_url: c.category_img_url,
            })
            .collect())
    }

    async fn reorder_categories(&self, ids: &[CategoryId]) -> GatewayResult<()> {
        let body = json!({ "categoryIds": ids });
        self.send(Method::PATCH, "/category/dragAndDrop", Some(body))
            .await
    }

    async fn delete_category(&self, id: CategoryId) -> GatewayResult<()> {
        self.send(Method::DELETE, &format!("/category/{}", id.0), None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_interpret_success_with_result() {
        let body = r#"{"isSuccess":true,"code":"GLOBAL-200","message":"ok","result":{"todoId":42}}"#;
        let parsed: Option<TodoIdResponse> = interpret(StatusCode::OK, body).unwrap();
        assert_eq!(parsed.unwrap().todo_id, 42);
    }

    #[test]
    fn test_interpret_success_without_result() {
        let body = r#"{"isSuccess":true,"code":"GLOBAL-200","message":"ok"}"#;
        let parsed: Option<Value> = interpret(StatusCode::OK, body).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_interpret_auth_failure_keeps_code() {
        let body = r#"{"isSuccess":false,"code":"AUTH-002","message":"expired"}"#;
        let err = interpret::<Value>(StatusCode::UNAUTHORIZED, body).unwrap_err();
        assert_eq!(err.code(), Some(EXPIRED_TOKEN_CODE));
    }

    #[test]
    fn test_interpret_non_json_error_body() {
        let err = interpret::<Value>(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>")
            .unwrap_err();
        match err {
            GatewayError::Api { status, code, .. } => {
                assert_eq!(status, 502);
                assert!(code.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_interpret_garbage_success_is_decode_error() {
        let err = interpret::<Value>(StatusCode::OK, "not json").unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }

    #[test]
    fn test_todo_item_mapping() {
        let raw = serde_json::json!({
            "todoId": 7,
            "content": "write report",
            "todayStatus": "COMPLETED",
            "isBookmark": true,
            "isRepeat": false,
            "deadline": "2024-06-01",
            "categoryId": 3,
            "categoryName": "Work",
            "imageUrl": "https://cdn.example.com/work.png",
            "time": "09:30",
            "routineDays": ["월", "금", "??"]
        });
        let item: TodoItem = serde_json::from_value::<TodoItemResponse>(raw).unwrap().into();

        assert_eq!(item.id, TodoId(7));
        assert_eq!(item.status, TodoStatus::Completed);
        assert!(item.is_bookmark);
        assert_eq!(item.deadline, NaiveDate::from_ymd_opt(2024, 6, 1));
        assert_eq!(item.time, NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(item.routine_days, vec![Weekday::Mon, Weekday::Fri]);
        let category = item.category.unwrap();
        assert_eq!(category.id, CategoryId(3));
        assert_eq!(category.name, "Work");
    }

    #[test]
    fn test_todo_item_mapping_defaults() {
        let raw = serde_json::json!({ "todoId": 1, "content": "x", "categoryName": "" });
        let item: TodoItem = serde_json::from_value::<TodoItemResponse>(raw).unwrap().into();
        assert_eq!(item.status, TodoStatus::Incomplete);
        assert!(item.category.is_none());
        assert!(item.deadline.is_none());
        assert!(item.routine_days.is_empty());
    }
}
