use super::{ListEventSender, OptimisticList, Pending};
use crate::data::reorder::{self, PINNED_CATEGORY_SLOTS};
use crate::data::{Category, CategoryId};
use crate::integrations::{GatewayResult, TodoGateway};
use std::sync::Arc;

/// The category strip: "All" and "Bookmarked" pinned in front of the
/// server's categories.
#[derive(Clone)]
pub struct CategoryList {
    list: OptimisticList<Category>,
    gateway: Arc<dyn TodoGateway>,
}

impl CategoryList {
    pub fn new(gateway: Arc<dyn TodoGateway>, events: ListEventSender) -> Self {
        let list = OptimisticList::new("Categories", events);
        list.replace_all(with_pinned(Vec::new()));
        Self { list, gateway }
    }

    pub fn list(&self) -> &OptimisticList<Category> {
        &self.list
    }

    pub fn categories(&self) -> Vec<Category> {
        self.list.visible()
    }

    pub fn get(&self, index: usize) -> Option<Category> {
        self.list.get(index)
    }

    pub fn find(&self, id: CategoryId) -> Option<Category> {
        self.list.find(id)
    }

    pub async fn load(&self) -> GatewayResult<()> {
        let categories = self.gateway.fetch_categories().await?;
        tracing::debug!("Loaded {} categories", categories.len());
        self.list.replace_all(with_pinned(categories));
        Ok(())
    }

    /// One drag step. Pinned slots neither move nor accept drops.
    pub fn move_category(&self, from: usize, to: usize) -> bool {
        self.list
            .rearrange(|items| reorder::move_category(items, from, to))
    }

    /// Send the server-side order after a drag; the previous order comes back
    /// if the server refuses it.
    pub fn finish_drag(&self) -> Pending {
        let ids: Vec<CategoryId> = self
            .categories()
            .iter()
            .skip(PINNED_CATEGORY_SLOTS)
            .map(|category| category.id)
            .collect();
        let gateway = Arc::clone(&self.gateway);
        self.list
            .sync(async move { gateway.reorder_categories(&ids).await })
    }
}

fn with_pinned(categories: Vec<Category>) -> Vec<Category> {
    let mut all = Vec::with_capacity(categories.len() + PINNED_CATEGORY_SLOTS);
    all.push(Category::all());
    all.push(Category::bookmarked());
    all.extend(categories.into_iter().filter(|c| !c.id.is_pinned()));
    all
}
