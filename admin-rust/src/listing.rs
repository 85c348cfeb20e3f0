use crate::{
    opentelemetry::{trace_operation, AdminSpanMethod},
    AdminError, AdminResult, DeleteOutcome, ResourceCoordinator, ResourceList, RetryPolicy,
};
use folio_sdk::{FolioResult, Record, RecordId, RecordStore, ResourceKind};
use futures::future::{AbortHandle, Abortable};
use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::debug;

#[derive(Clone, Copy)]
enum Slot {
    List,
    Detail,
}

struct PendingFetch {
    generation: u64,
    handle: AbortHandle,
}

#[derive(Default)]
struct ListingState {
    generation: u64,
    pending_list: Option<PendingFetch>,
    pending_detail: Option<PendingFetch>,
    detail: Option<Record>,
}

impl ListingState {
    fn pending(&mut self, slot: Slot) -> &mut Option<PendingFetch> {
        match slot {
            Slot::List => &mut self.pending_list,
            Slot::Detail => &mut self.pending_detail,
        }
    }

    /// Clear `slot` if `generation` still owns it. `false` means a newer
    /// fetch took the slot over.
    fn release(&mut self, slot: Slot, generation: u64) -> bool {
        let pending = self.pending(slot);
        if pending
            .as_ref()
            .is_some_and(|pending| pending.generation == generation)
        {
            *pending = None;
            return true;
        }
        false
    }
}

/// Releases the slot of a fetch whose future is dropped before it resolves.
struct PendingGuard<'a> {
    state: &'a Mutex<ListingState>,
    slot: Slot,
    generation: u64,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .release(self.slot, self.generation);
        }
    }
}

/// A list (and detail) view of one resource kind.
///
/// Each new `load` supersedes the previous one still in flight, and likewise
/// for `load_detail`: the older call resolves to `AdminError::Cancelled` and
/// never writes its result into the view. Dropping a `load` future, for
/// example when the host tears the view down, cancels its fetch and clears
/// the loading state.
pub struct ListingView {
    kind: ResourceKind,
    records: Arc<dyn RecordStore>,
    retry: RetryPolicy,
    list: Mutex<ResourceList>,
    state: Mutex<ListingState>,
}

impl ListingView {
    pub fn new(kind: ResourceKind, records: Arc<dyn RecordStore>) -> Self {
        Self {
            kind,
            records,
            retry: RetryPolicy::none(),
            list: Mutex::new(ResourceList::new(kind)),
            state: Mutex::new(ListingState::default()),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Copy of the list as last loaded.
    #[must_use]
    pub fn list(&self) -> ResourceList {
        self.lock_list().clone()
    }

    #[must_use]
    pub fn detail(&self) -> Option<Record> {
        self.lock_state().detail.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock_state().pending_list.is_some()
    }

    pub fn select(&self, id: impl Into<RecordId>) {
        self.lock_list().select(id);
    }

    /// Fetch the list, replacing what the view shows.
    pub async fn load(&self) -> AdminResult<Vec<Record>> {
        let records = &self.records;
        let kind = self.kind;
        let fetch = self.retry.run(move |_| records.list(kind));

        trace_operation(
            AdminSpanMethod::LoadList,
            Some(kind),
            self.run_latest(Slot::List, fetch, |_, records| {
                self.lock_list().replace(records.clone());
            }),
        )
        .await
    }

    /// Fetch one record for the detail pane.
    pub async fn load_detail(&self, id: &RecordId) -> AdminResult<Record> {
        let kind = self.kind;
        let fetch = self.records.get_by_id(kind, id);

        trace_operation(
            AdminSpanMethod::LoadDetail,
            Some(kind),
            self.run_latest(Slot::Detail, fetch, |state, record| {
                state.detail = Some(record.clone());
            }),
        )
        .await
    }

    /// Delete the selected record through `coordinator` and drop it from the
    /// view once the record is gone.
    pub async fn delete_selected(
        &self,
        coordinator: &ResourceCoordinator,
    ) -> AdminResult<DeleteOutcome> {
        let selected = self.lock_list().selected().cloned();
        let outcome = coordinator.delete(self.kind, selected.as_ref()).await?;

        let mut list = self.lock_list();
        list.remove(&outcome.id);
        list.clear_selection();
        Ok(outcome)
    }

    /// Run `fetch` as the newest request of `slot`, aborting the one it
    /// replaces. `commit` stores the result and only runs if no newer request
    /// started meanwhile.
    async fn run_latest<T, Fut, C>(&self, slot: Slot, fetch: Fut, commit: C) -> AdminResult<T>
    where
        Fut: Future<Output = FolioResult<T>>,
        C: FnOnce(&mut ListingState, &T),
    {
        let (handle, registration) = AbortHandle::new_pair();
        let generation = {
            let mut state = self.lock_state();
            state.generation += 1;
            let generation = state.generation;
            let pending = PendingFetch { generation, handle };
            if let Some(previous) = state.pending(slot).replace(pending) {
                debug!(kind = %self.kind, "superseding fetch in flight");
                previous.handle.abort();
            }
            generation
        };
        let mut guard = PendingGuard {
            state: &self.state,
            slot,
            generation,
            armed: true,
        };

        let result = Abortable::new(fetch, registration).await;

        let mut state = self.lock_state();
        guard.armed = false;
        if !state.release(slot, generation) {
            return Err(AdminError::Cancelled);
        }

        let value = result.map_err(|_| AdminError::Cancelled)??;
        commit(&mut state, &value);
        Ok(value)
    }

    fn lock_list(&self) -> MutexGuard<'_, ResourceList> {
        self.list.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, ListingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
