//! Optimistic list state.
//!
//! Every list screen (backlog, today, yesterday, categories) follows the
//! same protocol for user-initiated changes:
//!
//! 1. apply the change to the in-memory list right away (no I/O);
//! 2. fire the matching remote call;
//! 3. on success, commit: the change is applied to the snapshot;
//! 4. on failure, roll back: the change is dropped, the visible list is
//!    rebuilt from the snapshot plus whatever is still in flight, and a
//!    [`ListEvent::MutationFailed`] is emitted.
//!
//! Each change is kept as a replayable edit until its call resolves, so the
//! snapshot only ever holds acknowledged state and every change keeps its own
//! outcome, whatever else is in flight. Two changes to the same id are not
//! serialized: both calls go out and each edit is committed or dropped on its
//! own.
//!
//! Local-only edits (drag steps, yesterday check marks) are staged and ride
//! along with the next [`OptimisticList::sync`].

pub mod backlog;
pub mod category;
pub mod today;
pub mod todo;
pub mod yesterday;

pub use backlog::BacklogController;
pub use category::CategoryList;
pub use today::TodayController;
pub use todo::TodoList;
pub use yesterday::YesterdayController;

use crate::data::{Category, CategoryId, TodoId, TodoItem, YesterdayItem};
use crate::integrations::{GatewayError, GatewayResult};
use crate::util::emit_or_log;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Events a list controller reports to its screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEvent {
    /// A remote call failed and its change was rolled back.
    MutationFailed,
    /// The server confirmed a delete.
    DeleteSucceeded(TodoId),
    /// Every item on today's list is completed.
    AllChecked,
}

pub type ListEventSender = mpsc::UnboundedSender<ListEvent>;
pub type ListEventReceiver = mpsc::UnboundedReceiver<ListEvent>;

pub fn event_channel() -> (ListEventSender, ListEventReceiver) {
    mpsc::unbounded_channel()
}

/// Result of one optimistic mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The server accepted the change; the snapshot now includes it.
    Committed,
    /// The server refused the change; it was taken back out.
    RolledBack,
    /// Local validation refused the change; nothing happened.
    Rejected,
}

/// The sync half of a mutation. The local half has already happened by the
/// time one of these is handed out.
pub type Pending = BoxFuture<'static, MutationOutcome>;

pub(crate) fn rejected() -> Pending {
    futures::future::ready(MutationOutcome::Rejected).boxed()
}

/// Something an [`OptimisticList`] can hold.
pub trait ListItem: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + fmt::Debug + Send + Sync + 'static;

    fn id(&self) -> Self::Id;
    fn set_id(&mut self, id: Self::Id);
}

impl ListItem for TodoItem {
    type Id = TodoId;

    fn id(&self) -> TodoId {
        self.id
    }

    fn set_id(&mut self, id: TodoId) {
        self.id = id;
    }
}

impl ListItem for YesterdayItem {
    type Id = TodoId;

    fn id(&self) -> TodoId {
        self.id
    }

    fn set_id(&mut self, id: TodoId) {
        self.id = id;
    }
}

impl ListItem for Category {
    type Id = CategoryId;

    fn id(&self) -> CategoryId {
        self.id
    }

    fn set_id(&mut self, id: CategoryId) {
        self.id = id;
    }
}

/// Mutable view handed to edits: the list plus the detail copy of the
/// currently selected item. When an edit is replayed onto the snapshot or a
/// rebuilt list, `selected` is a detached empty slot.
pub struct Draft<'a, T: ListItem> {
    pub items: &'a mut Vec<T>,
    pub selected: &'a mut Option<T>,
}

impl<T: ListItem> Draft<'_, T> {
    pub fn position(&self, id: T::Id) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    /// Apply `f` to the entry with `id` and, when it is the selected item, to
    /// the detail copy too. Returns `false` if no entry has that id.
    pub fn update(&mut self, id: T::Id, mut f: impl FnMut(&mut T)) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        f(&mut self.items[pos]);
        if let Some(selected) = self.selected.as_mut().filter(|s| s.id() == id) {
            f(selected);
        }
        true
    }

    pub fn remove(&mut self, id: T::Id) -> Option<T> {
        let pos = self.position(id)?;
        Some(self.items.remove(pos))
    }

    /// Swap a placeholder id for the one the server assigned.
    pub fn replace_id(&mut self, from: T::Id, to: T::Id) -> bool {
        self.update(from, |item| item.set_id(to))
    }

    /// Put the entries named in `order` into that order, reusing the slots
    /// they already occupy. Entries not named stay where they are; ids not
    /// present are skipped.
    pub fn arrange(&mut self, order: &[T::Id]) -> bool {
        let slots: Vec<usize> = (0..self.items.len())
            .filter(|&i| order.contains(&self.items[i].id()))
            .collect();
        let arranged: Vec<T> = order
            .iter()
            .filter_map(|id| self.items.iter().find(|item| item.id() == *id).cloned())
            .collect();
        if arranged.len() != slots.len() {
            return false;
        }
        for (slot, item) in slots.into_iter().zip(arranged) {
            self.items[slot] = item;
        }
        true
    }
}

type EditFn<T> = Box<dyn Fn(&mut Draft<'_, T>) -> bool + Send + Sync>;

/// An edit applied to the visible list but not to the snapshot. `op` is
/// `None` while the edit is staged and not yet part of any sync.
struct PendingEdit<T: ListItem> {
    op: Option<u64>,
    edit: EditFn<T>,
}

struct ListState<T: ListItem> {
    snapshot: Vec<T>,
    visible: Vec<T>,
    selected: Option<T>,
    pending: Vec<PendingEdit<T>>,
    last_op: u64,
}

fn replay<T: ListItem>(items: &mut Vec<T>, edit: &EditFn<T>) -> bool {
    let mut detached = None;
    edit(&mut Draft {
        items,
        selected: &mut detached,
    })
}

impl<T: ListItem> ListState<T> {
    fn apply(&mut self, edit: &EditFn<T>) -> bool {
        edit(&mut Draft {
            items: &mut self.visible,
            selected: &mut self.selected,
        })
    }

    fn next_op(&mut self) -> u64 {
        self.last_op += 1;
        self.last_op
    }

    /// Remove and return every edit tagged `op`, in application order.
    fn take(&mut self, op: u64) -> Vec<EditFn<T>> {
        let (taken, kept): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|pending| pending.op == Some(op));
        self.pending = kept;
        taken.into_iter().map(|pending| pending.edit).collect()
    }

    /// visible := snapshot + every edit still pending.
    fn rebuild(&mut self) {
        let mut visible = self.snapshot.clone();
        for pending in &self.pending {
            replay(&mut visible, &pending.edit);
        }
        self.visible = visible;
        self.refresh_selected();
    }

    fn refresh_selected(&mut self) {
        let Some(id) = self.selected.as_ref().map(ListItem::id) else {
            return;
        };
        if let Some(fresh) = self.visible.iter().find(|item| item.id() == id) {
            self.selected = Some(fresh.clone());
        }
    }
}

/// One screen's list with optimistic mutation and per-change rollback.
///
/// Cloning is cheap and yields a handle to the same list. The state lock is
/// never held across an `.await`.
pub struct OptimisticList<T: ListItem> {
    name: &'static str,
    state: Arc<Mutex<ListState<T>>>,
    events: ListEventSender,
}

impl<T: ListItem> Clone for OptimisticList<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            state: Arc::clone(&self.state),
            events: self.events.clone(),
        }
    }
}

impl<T: ListItem> OptimisticList<T> {
    pub fn new(name: &'static str, events: ListEventSender) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(ListState {
                snapshot: Vec::new(),
                visible: Vec::new(),
                selected: None,
                pending: Vec::new(),
                last_op: 0,
            })),
            events,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, ListState<T>> {
        // Every critical section leaves the state whole.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The list as the user currently sees it.
    pub fn visible(&self) -> Vec<T> {
        self.lock().visible.clone()
    }

    /// The last server-acknowledged list.
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().snapshot.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().visible.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.lock().visible.get(index).cloned()
    }

    pub fn find(&self, id: T::Id) -> Option<T> {
        self.lock().visible.iter().find(|item| item.id() == id).cloned()
    }

    /// Number of edits not yet acknowledged, staged ones included.
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn selected(&self) -> Option<T> {
        self.lock().selected.clone()
    }

    /// Open the detail copy for `id`.
    pub fn select(&self, id: T::Id) -> Option<T> {
        let mut state = self.lock();
        let item = state.visible.iter().find(|item| item.id() == id).cloned();
        state.selected = item.clone();
        item
    }

    pub fn clear_selection(&self) {
        self.lock().selected = None;
    }

    /// Load a freshly fetched list as both the visible state and the
    /// snapshot. A reload supersedes every pending edit; calls still in
    /// flight resolve without touching the list.
    pub fn replace_all(&self, items: Vec<T>) {
        let mut state = self.lock();
        state.pending.clear();
        state.snapshot = items.clone();
        state.visible = items;
        state.refresh_selected();
    }

    /// Stage a local-only edit. Returns whatever `f` returns; `false` means
    /// the edit was refused and nothing was staged.
    ///
    /// `f` must be replayable: it runs again whenever the visible list is
    /// rebuilt and once more on the snapshot when the staged edits are synced.
    pub fn edit_local<F>(&self, f: F) -> bool
    where
        F: Fn(&mut Draft<'_, T>) -> bool + Send + Sync + 'static,
    {
        let edit: EditFn<T> = Box::new(f);
        let mut state = self.lock();
        if !state.apply(&edit) {
            return false;
        }
        state.pending.push(PendingEdit { op: None, edit });
        true
    }

    /// Stage a positional move. `f` runs once on a copy of the visible list;
    /// the resulting order is what gets staged, so replays act on ids rather
    /// than indexes.
    pub fn rearrange(&self, f: impl FnOnce(&mut Vec<T>) -> bool) -> bool {
        let mut state = self.lock();
        let mut items = state.visible.clone();
        if !f(&mut items) {
            return false;
        }
        let order: Vec<T::Id> = items.iter().map(ListItem::id).collect();
        let edit: EditFn<T> = Box::new(move |draft: &mut Draft<'_, T>| draft.arrange(&order));
        state.apply(&edit);
        state.pending.push(PendingEdit { op: None, edit });
        true
    }

    /// Drop every staged edit and rebuild the visible list without them.
    pub fn discard_staged(&self) {
        let mut state = self.lock();
        let before = state.pending.len();
        state.pending.retain(|pending| pending.op.is_some());
        let dropped = before - state.pending.len();
        if dropped > 0 {
            state.rebuild();
            tracing::debug!("{}: discarded {} staged edits", self.name, dropped);
        }
    }

    /// Swap a placeholder id in the snapshot, the visible list and the
    /// selected copy.
    pub fn replace_id(&self, from: T::Id, to: T::Id) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        if let Some(item) = state.snapshot.iter_mut().find(|item| item.id() == from) {
            item.set_id(to);
        }
        Draft {
            items: &mut state.visible,
            selected: &mut state.selected,
        }
        .replace_id(from, to)
    }

    pub fn emit(&self, event: ListEvent) {
        emit_or_log(&self.events, event, self.name);
    }

    fn resolve(&self, op: u64, result: GatewayResult<()>) -> MutationOutcome {
        match result {
            Ok(()) => {
                let mut state = self.lock();
                for edit in state.take(op) {
                    replay(&mut state.snapshot, &edit);
                }
                tracing::debug!("{}: committed op {}", self.name, op);
                MutationOutcome::Committed
            }
            Err(e) => {
                tracing::warn!("{}: update failed, rolling back: {}", self.name, e);
                {
                    let mut state = self.lock();
                    if !state.take(op).is_empty() {
                        state.rebuild();
                    }
                }
                self.emit(ListEvent::MutationFailed);
                MutationOutcome::RolledBack
            }
        }
    }

    /// Send the staged edits to the server with `remote`. The edits staged
    /// at the time of the call are committed or dropped together; anything
    /// staged afterwards waits for the next sync.
    pub fn sync<F>(&self, remote: F) -> Pending
    where
        F: Future<Output = GatewayResult<()>> + Send + 'static,
    {
        let op = {
            let mut state = self.lock();
            let op = state.next_op();
            for pending in state.pending.iter_mut().filter(|p| p.op.is_none()) {
                pending.op = Some(op);
            }
            op
        };
        let list = self.clone();
        async move { list.resolve(op, remote.await) }.boxed()
    }

    /// Apply `edit` now and return the future that syncs it.
    ///
    /// The local change is visible as soon as this returns, before anything
    /// is awaited. If `edit` refuses the change, `remote` is dropped without
    /// being polled and the future resolves to [`MutationOutcome::Rejected`].
    pub fn mutate<E, F>(&self, edit: E, remote: F) -> Pending
    where
        E: Fn(&mut Draft<'_, T>) -> bool + Send + Sync + 'static,
        F: Future<Output = GatewayResult<()>> + Send + 'static,
    {
        let edit: EditFn<T> = Box::new(edit);
        let op = {
            let mut state = self.lock();
            if !state.apply(&edit) {
                return rejected();
            }
            let op = state.next_op();
            state.pending.push(PendingEdit { op: Some(op), edit });
            op
        };
        let list = self.clone();
        async move { list.resolve(op, remote.await) }.boxed()
    }

    /// Insert `item` (carrying a placeholder id) at the head of the list now;
    /// once `remote` returns the real id, the item enters the snapshot under
    /// that id.
    pub fn insert_pending<F>(&self, item: T, remote: F) -> Pending
    where
        F: Future<Output = GatewayResult<T::Id>> + Send + 'static,
    {
        let placeholder = item.id();
        let mut acknowledged = item.clone();
        let edit: EditFn<T> = Box::new(move |draft: &mut Draft<'_, T>| {
            draft.items.insert(0, item.clone());
            true
        });
        let op = {
            let mut state = self.lock();
            state.apply(&edit);
            let op = state.next_op();
            state.pending.push(PendingEdit { op: Some(op), edit });
            op
        };

        let list = self.clone();
        async move {
            let id = match remote.await {
                Ok(id) => id,
                Err(e) => return list.resolve(op, Err::<(), GatewayError>(e)),
            };
            {
                let mut guard = list.lock();
                let state = &mut *guard;
                if state.take(op).is_empty() {
                    return MutationOutcome::Committed;
                }
                acknowledged.set_id(id);
                state.snapshot.insert(0, acknowledged);
                Draft {
                    items: &mut state.visible,
                    selected: &mut state.selected,
                }
                .replace_id(placeholder, id);
            }
            tracing::debug!("{}: {:?} acknowledged as {:?}", list.name, placeholder, id);
            MutationOutcome::Committed
        }
        .boxed()
    }
}
