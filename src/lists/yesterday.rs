use super::{ListEventSender, OptimisticList, Pending};
use crate::data::{TodoId, YesterdayItem};
use crate::integrations::{GatewayResult, TodoGateway};
use futures::future::FutureExt;
use std::sync::{Arc, Mutex};

/// "Did you finish these yesterday?" screen.
///
/// Checks are local until [`YesterdayController::commit_completions`] sends
/// all of them in one call.
pub struct YesterdayController {
    list: OptimisticList<YesterdayItem>,
    gateway: Arc<dyn TodoGateway>,
    completed: Arc<Mutex<Vec<TodoId>>>,
    page_size: u32,
}

impl YesterdayController {
    pub fn new(gateway: Arc<dyn TodoGateway>, events: ListEventSender, page_size: u32) -> Self {
        Self {
            list: OptimisticList::new("Yesterday", events),
            gateway,
            completed: Arc::new(Mutex::new(Vec::new())),
            page_size,
        }
    }

    pub fn list(&self) -> &OptimisticList<YesterdayItem> {
        &self.list
    }

    pub fn items(&self) -> Vec<YesterdayItem> {
        self.list.visible()
    }

    /// Ids checked since the last commit, in the order they were checked.
    pub fn completed_ids(&self) -> Vec<TodoId> {
        self.completed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub async fn load(&self) -> GatewayResult<()> {
        let page = self.gateway.fetch_yesterdays(0, self.page_size).await?;
        tracing::debug!("Loaded {} yesterday items", page.items.len());
        self.list.replace_all(page.items);
        self.completed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        Ok(())
    }

    /// Flip an item's check mark locally.
    pub fn toggle_completion(&self, id: TodoId) -> bool {
        let toggled = self.list.edit_local(move |draft| {
            draft.update(id, |item| item.status = item.status.toggled())
        });
        let Some(item) = self.list.find(id).filter(|_| toggled) else {
            return false;
        };

        let mut completed = self.completed.lock().unwrap_or_else(|e| e.into_inner());
        if item.status.is_completed() {
            if !completed.contains(&id) {
                completed.push(id);
            }
        } else {
            completed.retain(|done| *done != id);
        }
        true
    }

    /// Send every checked id in one batch. On failure the check marks are
    /// undone and the pending set is cleared.
    pub fn commit_completions(&self) -> Pending {
        let ids = self.completed_ids();
        let gateway = Arc::clone(&self.gateway);
        let completed = Arc::clone(&self.completed);
        let pending = self
            .list
            .sync(async move { gateway.complete_yesterdays(&ids).await });

        async move {
            let outcome = pending.await;
            completed
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clear();
            outcome
        }
        .boxed()
    }
}
