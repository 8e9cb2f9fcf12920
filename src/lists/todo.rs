//! Item operations shared by the backlog and today lists.

use super::{
    rejected, Draft, ListEvent, ListEventSender, MutationOutcome, OptimisticList, Pending,
};
use crate::data::{reorder, Category, ListDomain, TodoId, TodoItem, Weekday};
use crate::integrations::{GatewayResult, TodoGateway};
use crate::util::non_blank;
use chrono::{NaiveDate, NaiveTime};
use futures::future::FutureExt;
use std::future::Future;
use std::sync::Arc;

/// A backlog or today list bound to its remote gateway.
///
/// Every method applies its change before returning and hands back the future
/// that syncs it. Dropping that future leaves the change visible but never
/// committed, so callers normally spawn or await it.
#[derive(Clone)]
pub struct TodoList {
    domain: ListDomain,
    list: OptimisticList<TodoItem>,
    gateway: Arc<dyn TodoGateway>,
}

impl TodoList {
    pub fn new(domain: ListDomain, gateway: Arc<dyn TodoGateway>, events: ListEventSender) -> Self {
        Self {
            domain,
            list: OptimisticList::new(domain.display_name(), events),
            gateway,
        }
    }

    pub fn domain(&self) -> ListDomain {
        self.domain
    }

    pub fn list(&self) -> &OptimisticList<TodoItem> {
        &self.list
    }

    pub(crate) fn gateway(&self) -> &Arc<dyn TodoGateway> {
        &self.gateway
    }

    pub fn items(&self) -> Vec<TodoItem> {
        self.list.visible()
    }

    pub fn select(&self, id: TodoId) -> Option<TodoItem> {
        self.list.select(id)
    }

    pub fn selected(&self) -> Option<TodoItem> {
        self.list.selected()
    }

    /// Edit one item in place. Temporary ids have no server counterpart yet
    /// and are refused.
    fn update_item<F>(
        &self,
        id: TodoId,
        edit: impl Fn(&mut TodoItem) + Send + Sync + 'static,
        remote: F,
    ) -> Pending
    where
        F: Future<Output = GatewayResult<()>> + Send + 'static,
    {
        self.list.mutate(
            move |draft| !id.is_temporary() && draft.update(id, &edit),
            remote,
        )
    }

    /// Take an item off this list.
    fn remove_item<F>(
        &self,
        id: TodoId,
        remote: F,
    ) -> Pending
    where
        F: Future<Output = GatewayResult<()>> + Send + 'static,
    {
        self.list.mutate(
            move |draft: &mut Draft<'_, TodoItem>| {
                if id.is_temporary() || draft.remove(id).is_none() {
                    return false;
                }
                if draft.selected.as_ref().is_some_and(|s| s.id == id) {
                    *draft.selected = None;
                }
                true
            },
            remote,
        )
    }

    pub fn delete(&self, id: TodoId) -> Pending {
        let gateway = Arc::clone(&self.gateway);
        let pending = self.remove_item(id, async move { gateway.delete(id).await });
        let list = self.list.clone();
        async move {
            let outcome = pending.await;
            if outcome == MutationOutcome::Committed {
                list.emit(ListEvent::DeleteSucceeded(id));
            }
            outcome
        }
        .boxed()
    }

    /// Move an item to the other list (backlog to today or back).
    pub fn swipe(&self, id: TodoId) -> Pending {
        let gateway = Arc::clone(&self.gateway);
        self.remove_item(id, async move { gateway.swipe(id).await })
    }

    /// Blank content is refused; surrounding whitespace is trimmed.
    pub fn modify_content(
        &self,
        id: TodoId,
        content: &str,
    ) -> Pending {
        let content = non_blank(content).map(str::to_string);
        let gateway = Arc::clone(&self.gateway);
        let remote_content = content.clone().unwrap_or_default();
        self.list.mutate(
            move |draft| match &content {
                Some(content) if !id.is_temporary() => {
                    draft.update(id, |item| item.content = content.clone())
                }
                _ => false,
            },
            async move { gateway.modify_content(id, &remote_content).await },
        )
    }

    pub fn toggle_bookmark(&self, id: TodoId) -> Pending {
        let gateway = Arc::clone(&self.gateway);
        self.update_item(
            id,
            |item| item.is_bookmark = !item.is_bookmark,
            async move { gateway.toggle_bookmark(id).await },
        )
    }

    /// Turning repeat on drops any weekday routine.
    pub fn toggle_repeat(&self, id: TodoId) -> Pending {
        let gateway = Arc::clone(&self.gateway);
        self.update_item(
            id,
            |item| {
                item.is_repeat = !item.is_repeat;
                if item.is_repeat {
                    item.routine_days.clear();
                }
            },
            async move { gateway.toggle_repeat(id).await },
        )
    }

    pub fn set_deadline(
        &self,
        id: TodoId,
        deadline: Option<NaiveDate>,
    ) -> Pending {
        let gateway = Arc::clone(&self.gateway);
        self.update_item(
            id,
            move |item| item.deadline = deadline,
            async move { gateway.set_deadline(id, deadline).await },
        )
    }

    pub fn set_time(
        &self,
        id: TodoId,
        time: Option<NaiveTime>,
    ) -> Pending {
        let gateway = Arc::clone(&self.gateway);
        self.update_item(
            id,
            move |item| item.time = time,
            async move { gateway.set_time(id, time).await },
        )
    }

    /// Assign a real category, or clear it with `None`. Pinned
    /// pseudo-categories can't be assigned.
    pub fn set_category(
        &self,
        id: TodoId,
        category: Option<&Category>,
    ) -> Pending {
        let pinned = category.is_some_and(|c| c.id.is_pinned());
        let category_ref = category.map(Category::as_ref);
        let category_id = category.map(|c| c.id);
        let gateway = Arc::clone(&self.gateway);
        self.list.mutate(
            move |draft| {
                !pinned
                    && !id.is_temporary()
                    && draft.update(id, |item| item.category = category_ref.clone())
            },
            async move { gateway.set_category(id, category_id).await },
        )
    }

    /// A non-empty routine replaces repeat; `None` or no days clears it.
    pub fn set_routine(
        &self,
        id: TodoId,
        days: Option<Vec<Weekday>>,
    ) -> Pending {
        let days = days.filter(|days| !days.is_empty()).map(|mut days| {
            days.sort();
            days.dedup();
            days
        });
        let local = days.clone().unwrap_or_default();
        let gateway = Arc::clone(&self.gateway);
        self.update_item(
            id,
            move |item| {
                item.routine_days = local.clone();
                if item.has_routine() {
                    item.is_repeat = false;
                }
            },
            async move { gateway.set_routine(id, days).await },
        )
    }

    /// One drag step. Local only; call [`TodoList::finish_drag`] on release.
    pub fn move_item(&self, from: usize, to: usize) -> bool {
        self.list
            .rearrange(|items| reorder::move_item(items, from, to))
    }

    /// Send the current order after a drag. An order that still holds an
    /// unsaved item can't be sent; the drag is undone instead.
    pub fn finish_drag(&self) -> Pending {
        let ids: Vec<TodoId> = self.items().iter().map(|item| item.id).collect();
        self.send_order(ids)
    }

    pub(crate) fn send_order(
        &self,
        ids: Vec<TodoId>,
    ) -> Pending {
        if ids.iter().any(TodoId::is_temporary) {
            tracing::debug!("{}: order holds unsaved items, not sending", self.list.name());
            self.list.discard_staged();
            return rejected();
        }
        let gateway = Arc::clone(&self.gateway);
        let domain = self.domain;
        self.list
            .sync(async move { gateway.reorder(domain, &ids).await })
    }
}
