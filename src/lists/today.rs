use super::{ListEvent, ListEventSender, Pending, TodoList};
use crate::data::{reorder, ListDomain, TodoId, TodoItem};
use crate::integrations::{GatewayResult, TodoGateway};
use std::sync::Arc;

/// Today screen. Incomplete items always precede completed ones.
pub struct TodayController {
    todos: TodoList,
    page_size: u32,
}

impl TodayController {
    pub fn new(gateway: Arc<dyn TodoGateway>, events: ListEventSender, page_size: u32) -> Self {
        Self {
            todos: TodoList::new(ListDomain::Today, gateway, events),
            page_size,
        }
    }

    pub fn todos(&self) -> &TodoList {
        &self.todos
    }

    pub fn items(&self) -> Vec<TodoItem> {
        self.todos.items()
    }

    pub async fn load(&self) -> GatewayResult<()> {
        let page = self
            .todos
            .gateway()
            .fetch_todays(0, self.page_size)
            .await?;
        tracing::debug!("Loaded {} today items", page.items.len());
        self.todos.list().replace_all(page.items);
        Ok(())
    }

    /// Check or uncheck an item. It moves to the end of its new group;
    /// [`ListEvent::AllChecked`] fires when nothing is left to do.
    pub fn toggle_completion(&self, id: TodoId) -> Pending {
        let list = self.todos.list();
        let gateway = Arc::clone(self.todos.gateway());
        let known = !id.is_temporary() && list.find(id).is_some();

        let pending = list.mutate(
            move |draft| {
                if id.is_temporary() {
                    return false;
                }
                let Some(mut item) = draft.remove(id) else {
                    return false;
                };
                item.status = item.status.toggled();
                if let Some(selected) = draft.selected.as_mut().filter(|s| s.id == id) {
                    selected.status = item.status;
                }

                let (mut incomplete, mut completed): (Vec<_>, Vec<_>) = draft
                    .items
                    .drain(..)
                    .partition(|item| !item.status.is_completed());
                if item.status.is_completed() {
                    completed.push(item);
                } else {
                    incomplete.push(item);
                }
                incomplete.append(&mut completed);
                *draft.items = incomplete;
                true
            },
            async move { gateway.toggle_completion(id).await },
        );

        if known && self.incomplete_count() == 0 {
            list.emit(ListEvent::AllChecked);
        }
        pending
    }

    fn incomplete_count(&self) -> usize {
        self.items()
            .iter()
            .take_while(|item| !item.status.is_completed())
            .count()
    }

    /// One drag step, confined to the incomplete section.
    pub fn move_item(&self, from: usize, to: usize) -> bool {
        let limit = self.incomplete_count();
        self.todos
            .list()
            .rearrange(|items| reorder::move_within(items, from, to, limit))
    }

    /// Send the order of the incomplete items after a drag.
    pub fn finish_drag(&self) -> Pending {
        let ids: Vec<TodoId> = self
            .items()
            .iter()
            .filter(|item| !item.status.is_completed())
            .map(|item| item.id)
            .collect();
        self.todos.send_order(ids)
    }
}
