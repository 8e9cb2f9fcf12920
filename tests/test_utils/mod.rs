//! Test utilities and fixtures for poptato tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use poptato::data::{
    Category, CategoryId, ListDomain, TodoId, TodoItem, TodoStatus, TokenPair, Weekday,
    YesterdayItem,
};
use poptato::integrations::{
    AuthGateway, GatewayError, GatewayResult, ListPage, ReissueRequest, TodoGateway,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A remote call as observed by [`FakeGateway`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create {
        domain: ListDomain,
        content: String,
        category: CategoryId,
    },
    Delete(TodoId),
    ModifyContent(TodoId, String),
    ToggleBookmark(TodoId),
    ToggleRepeat(TodoId),
    SetDeadline(TodoId, Option<NaiveDate>),
    SetTime(TodoId, Option<NaiveTime>),
    SetCategory(TodoId, Option<CategoryId>),
    SetRoutine(TodoId, Option<Vec<Weekday>>),
    Reorder(ListDomain, Vec<TodoId>),
    Swipe(TodoId),
    ToggleCompletion(TodoId),
    CompleteYesterdays(Vec<TodoId>),
    FetchBacklogs(CategoryId),
    FetchTodays,
    FetchYesterdays,
    FetchCategories,
    ReorderCategories(Vec<CategoryId>),
    DeleteCategory(CategoryId),
}

impl Call {
    fn op(&self) -> &'static str {
        match self {
            Call::Create { .. } => "create",
            Call::Delete(_) => "delete",
            Call::ModifyContent(..) => "modify_content",
            Call::ToggleBookmark(_) => "toggle_bookmark",
            Call::ToggleRepeat(_) => "toggle_repeat",
            Call::SetDeadline(..) => "set_deadline",
            Call::SetTime(..) => "set_time",
            Call::SetCategory(..) => "set_category",
            Call::SetRoutine(..) => "set_routine",
            Call::Reorder(..) => "reorder",
            Call::Swipe(_) => "swipe",
            Call::ToggleCompletion(_) => "toggle_completion",
            Call::CompleteYesterdays(_) => "complete_yesterdays",
            Call::FetchBacklogs(_) => "fetch_backlogs",
            Call::FetchTodays => "fetch_todays",
            Call::FetchYesterdays => "fetch_yesterdays",
            Call::FetchCategories => "fetch_categories",
            Call::ReorderCategories(_) => "reorder_categories",
            Call::DeleteCategory(_) => "delete_category",
        }
    }
}

/// In-memory [`TodoGateway`] that records every call and fails the
/// operations it's told to.
#[derive(Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<&'static str>>,
    next_id: AtomicI64,
    pub backlogs: Mutex<Vec<TodoItem>>,
    pub todays: Mutex<Vec<TodoItem>>,
    pub yesterdays: Mutex<Vec<YesterdayItem>>,
    pub categories: Mutex<Vec<Category>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI64::new(42),
            ..Self::default()
        })
    }

    /// Make every later call of `op` fail.
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.failing.lock().unwrap().remove(op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than list fetches.
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| !call.op().starts_with("fetch_"))
            .collect()
    }

    fn record(&self, call: Call) -> GatewayResult<()> {
        let op = call.op();
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(op) {
            return Err(GatewayError::Api {
                status: 500,
                code: "TEST-500".to_string(),
                message: format!("{} failed", op),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TodoGateway for FakeGateway {
    async fn create(
        &self,
        domain: ListDomain,
        content: &str,
        category: CategoryId,
    ) -> GatewayResult<TodoId> {
        self.record(Call::Create {
            domain,
            content: content.to_string(),
            category,
        })?;
        Ok(TodoId(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn delete(&self, id: TodoId) -> GatewayResult<()> {
        self.record(Call::Delete(id))
    }

    async fn modify_content(&self, id: TodoId, content: &str) -> GatewayResult<()> {
        self.record(Call::ModifyContent(id, content.to_string()))
    }

    async fn toggle_bookmark(&self, id: TodoId) -> GatewayResult<()> {
        self.record(Call::ToggleBookmark(id))
    }

    async fn toggle_repeat(&self, id: TodoId) -> GatewayResult<()> {
        self.record(Call::ToggleRepeat(id))
    }

    async fn set_deadline(&self, id: TodoId, deadline: Option<NaiveDate>) -> GatewayResult<()> {
        self.record(Call::SetDeadline(id, deadline))
    }

    async fn set_time(&self, id: TodoId, time: Option<NaiveTime>) -> GatewayResult<()> {
        self.record(Call::SetTime(id, time))
    }

    async fn set_category(&self, id: TodoId, category: Option<CategoryId>) -> GatewayResult<()> {
        self.record(Call::SetCategory(id, category))
    }

    async fn set_routine(&self, id: TodoId, days: Option<Vec<Weekday>>) -> GatewayResult<()> {
        self.record(Call::SetRoutine(id, days))
    }

    async fn reorder(&self, domain: ListDomain, ids: &[TodoId]) -> GatewayResult<()> {
        self.record(Call::Reorder(domain, ids.to_vec()))
    }

    async fn swipe(&self, id: TodoId) -> GatewayResult<()> {
        self.record(Call::Swipe(id))
    }

    async fn toggle_completion(&self, id: TodoId) -> GatewayResult<()> {
        self.record(Call::ToggleCompletion(id))
    }

    async fn complete_yesterdays(&self, ids: &[TodoId]) -> GatewayResult<()> {
        self.record(Call::CompleteYesterdays(ids.to_vec()))
    }

    async fn fetch_backlogs(
        &self,
        category: CategoryId,
        _page: u32,
        _size: u32,
    ) -> GatewayResult<ListPage<TodoItem>> {
        self.record(Call::FetchBacklogs(category))?;
        Ok(ListPage::single(self.backlogs.lock().unwrap().clone()))
    }

    async fn fetch_todays(&self, _page: u32, _size: u32) -> GatewayResult<ListPage<TodoItem>> {
        self.record(Call::FetchTodays)?;
        Ok(ListPage::single(self.todays.lock().unwrap().clone()))
    }

    async fn fetch_yesterdays(
        &self,
        _page: u32,
        _size: u32,
    ) -> GatewayResult<ListPage<YesterdayItem>> {
        self.record(Call::FetchYesterdays)?;
        Ok(ListPage::single(self.yesterdays.lock().unwrap().clone()))
    }

    async fn fetch_categories(&self) -> GatewayResult<Vec<Category>> {
        self.record(Call::FetchCategories)?;
        Ok(self.categories.lock().unwrap().clone())
    }

    async fn reorder_categories(&self, ids: &[CategoryId]) -> GatewayResult<()> {
        self.record(Call::ReorderCategories(ids.to_vec()))
    }

    async fn delete_category(&self, id: CategoryId) -> GatewayResult<()> {
        self.record(Call::DeleteCategory(id))?;
        self.categories.lock().unwrap().retain(|c| c.id != id);
        Ok(())
    }
}

/// [`AuthGateway`] that hands out a fixed pair after a delay.
pub struct FakeAuth {
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<ReissueRequest>>,
    delay: Duration,
    reply: Option<TokenPair>,
}

impl FakeAuth {
    pub fn issuing(tokens: TokenPair, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            delay,
            reply: Some(tokens),
        })
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            reply: None,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthGateway for FakeAuth {
    async fn reissue_token(&self, request: ReissueRequest) -> GatewayResult<TokenPair> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        tokio::time::sleep(self.delay).await;
        self.reply.clone().ok_or(GatewayError::Api {
            status: 401,
            code: "AUTH-008".to_string(),
            message: "refresh token rejected".to_string(),
        })
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn todo(id: i64, content: &str) -> TodoItem {
    TodoItem::new(TodoId(id), content)
}

pub fn done(id: i64, content: &str) -> TodoItem {
    let mut item = todo(id, content);
    item.status = TodoStatus::Completed;
    item
}

pub fn yesterday(id: i64, content: &str) -> YesterdayItem {
    YesterdayItem {
        id: TodoId(id),
        content: content.to_string(),
        status: TodoStatus::Incomplete,
    }
}

pub fn category(id: i64, name: &str) -> Category {
    Category {
        id: CategoryId(id),
        name: name.to_string(),
        emoji_url: None,
    }
}

pub fn contents(items: &[TodoItem]) -> Vec<String> {
    items.iter().map(|item| item.content.clone()).collect()
}

pub fn ids(items: &[TodoItem]) -> Vec<i64> {
    items.iter().map(|item| item.id.0).collect()
}

// =============================================================================
// Stub HTTP API
// =============================================================================

/// Minimal HTTP/1.1 server standing in for the REST API.
///
/// Requests carrying `Bearer {valid_token}` succeed; any other token gets the
/// expired-token envelope. `POST /auth/refresh` issues `valid_token` after
/// `reissue_delay`.
pub struct StubApi {
    pub base_url: String,
    pub reissues: Arc<AtomicUsize>,
    /// `(request line, authorization header)` of every non-auth request.
    pub requests: Arc<Mutex<Vec<(String, String)>>>,
}

pub async fn spawn_stub_api(valid_token: &'static str, reissue_delay: Duration) -> StubApi {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let reissues = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let (r, q) = (reissues.clone(), requests.clone());
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let (r, q) = (r.clone(), q.clone());
            tokio::spawn(async move {
                serve(stream, valid_token, reissue_delay, r, q).await;
            });
        }
    });

    StubApi {
        base_url: format!("http://{}", addr),
        reissues,
        requests,
    }
}

async fn serve(
    mut stream: TcpStream,
    valid_token: &str,
    reissue_delay: Duration,
    reissues: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default().to_string();
    let mut authorization = String::new();
    let mut content_length = 0usize;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "authorization" => authorization = value.trim().to_string(),
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                _ => {}
            }
        }
    }
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let (status, body) = if request_line.starts_with("POST /auth/refresh") {
        reissues.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(reissue_delay).await;
        (
            "200 OK",
            format!(
                r#"{{"isSuccess":true,"code":"GLOBAL-200","message":"ok","result":{{"accessToken":"{}","refreshToken":"new-refresh"}}}}"#,
                valid_token
            ),
        )
    } else {
        requests
            .lock()
            .unwrap()
            .push((request_line.clone(), authorization.clone()));
        if authorization == format!("Bearer {}", valid_token) {
            (
                "200 OK",
                r#"{"isSuccess":true,"code":"GLOBAL-200","message":"ok"}"#.to_string(),
            )
        } else {
            (
                "401 Unauthorized",
                r#"{"isSuccess":false,"code":"AUTH-002","message":"expired"}"#.to_string(),
            )
        }
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
