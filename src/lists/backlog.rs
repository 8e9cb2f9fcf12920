use super::{
    rejected, CategoryList, ListEvent, ListEventSender, MutationOutcome, Pending, TodoList,
};
use crate::data::{Category, CategoryId, ListDomain, TodoId, TodoItem};
use crate::integrations::{GatewayResult, TodoGateway};
use crate::util::non_blank;
use std::sync::{Arc, Mutex};

/// Backlog screen: the backlog list filtered by the selected category.
pub struct BacklogController {
    todos: TodoList,
    categories: CategoryList,
    selected_category: Mutex<CategoryId>,
    page_size: u32,
}

impl BacklogController {
    pub fn new(gateway: Arc<dyn TodoGateway>, events: ListEventSender, page_size: u32) -> Self {
        Self {
            todos: TodoList::new(ListDomain::Backlog, Arc::clone(&gateway), events.clone()),
            categories: CategoryList::new(gateway, events),
            selected_category: Mutex::new(CategoryId::ALL),
            page_size,
        }
    }

    /// Item operations (delete, swipe, toggles, drag).
    pub fn todos(&self) -> &TodoList {
        &self.todos
    }

    pub fn categories(&self) -> &CategoryList {
        &self.categories
    }

    pub fn items(&self) -> Vec<TodoItem> {
        self.todos.items()
    }

    fn selected_category_id(&self) -> CategoryId {
        *self
            .selected_category
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// The active filter. Falls back to "All" if the selected category has
    /// disappeared from the strip.
    pub fn selected_category(&self) -> Category {
        self.categories
            .find(self.selected_category_id())
            .unwrap_or_else(Category::all)
    }

    /// Fetch the backlog for the active filter.
    pub async fn load(&self) -> GatewayResult<()> {
        let category = self.selected_category_id();
        let page = self
            .todos
            .gateway()
            .fetch_backlogs(category, 0, self.page_size)
            .await?;
        tracing::debug!(
            "Loaded {} of {} backlog items for category {:?}",
            page.items.len(),
            page.total_count,
            category
        );
        self.todos.list().replace_all(page.items);
        Ok(())
    }

    /// Switch the filter to the category at `index` in the strip and reload.
    pub async fn select_category(&self, index: usize) -> GatewayResult<()> {
        let Some(category) = self.categories.get(index) else {
            tracing::debug!("No category at index {}", index);
            return Ok(());
        };
        *self
            .selected_category
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = category.id;
        self.load().await
    }

    /// Add a backlog item.
    ///
    /// The item shows up at the head of the list immediately under a
    /// temporary id. It's bookmarked when the bookmark filter is active and
    /// takes the active real category otherwise. Once the server answers, the
    /// temporary id is replaced by the assigned one.
    pub fn create(&self, content: &str) -> Pending {
        let Some(content) = non_blank(content).map(str::to_string) else {
            tracing::debug!("Ignoring blank backlog item");
            return rejected();
        };
        let category = self.selected_category();
        let gateway = Arc::clone(self.todos.gateway());

        let mut item = TodoItem::new(TodoId::temporary(), content.clone());
        item.is_bookmark = category.id == CategoryId::BOOKMARK;
        item.category = category.id.as_filter().map(|_| category.as_ref());
        let category_id = category.id;
        self.todos.list().insert_pending(item, async move {
            gateway
                .create(ListDomain::Backlog, &content, category_id)
                .await
        })
    }

    /// Delete the active category on the server, then reload the strip and
    /// fall back to the "All" filter. The pinned pseudo-categories can't be
    /// deleted.
    pub async fn delete_category(&self) -> MutationOutcome {
        let category = self.selected_category();
        if category.id.is_pinned() {
            tracing::debug!("Refusing to delete pinned category {:?}", category.id);
            return MutationOutcome::Rejected;
        }

        if let Err(e) = self.todos.gateway().delete_category(category.id).await {
            tracing::warn!("Failed to delete category {:?}: {}", category.id, e);
            self.todos.list().emit(ListEvent::MutationFailed);
            return MutationOutcome::RolledBack;
        }
        tracing::info!("Deleted category {}", category.name);

        *self
            .selected_category
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = CategoryId::ALL;
        if let Err(e) = self.categories.load().await {
            tracing::warn!("Failed to reload categories: {}", e);
        }
        if let Err(e) = self.load().await {
            tracing::warn!("Failed to reload backlog: {}", e);
        }
        MutationOutcome::Committed
    }
}
