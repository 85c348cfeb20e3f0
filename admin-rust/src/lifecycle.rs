use folio_sdk::ResourceKind;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Where a single resource stands while it is being created or deleted.
///
/// Creation walks `Absent → Uploading → Creating → Present`, deletion walks
/// `Present → DeletingRecord → DeletingImage → Absent`. A failed upload or
/// a refused record creation falls back to `Absent`, while a creation with an
/// unknown outcome stays in `Creating`. A failed record deletion falls back
/// to `Present`. A failed image deletion still ends in `Absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecyclePhase {
    Absent,
    Uploading,
    Creating,
    Present,
    DeletingRecord,
    DeletingImage,
}

/// Hears every phase change made by the coordinator. Hosts use it to drive
/// progress indicators.
pub trait LifecycleObserver: Send + Sync {
    fn on_transition(&self, kind: ResourceKind, from: LifecyclePhase, to: LifecyclePhase);
}

pub(crate) struct Lifecycle {
    kind: ResourceKind,
    phase: LifecyclePhase,
    observer: Option<Arc<dyn LifecycleObserver>>,
}

impl Lifecycle {
    pub(crate) fn new(
        kind: ResourceKind,
        phase: LifecyclePhase,
        observer: Option<Arc<dyn LifecycleObserver>>,
    ) -> Self {
        Self {
            kind,
            phase,
            observer,
        }
    }

    pub(crate) fn advance(&mut self, next: LifecyclePhase) {
        let previous = std::mem::replace(&mut self.phase, next);
        debug!(kind = %self.kind, from = ?previous, to = ?next, "lifecycle transition");
        if let Some(observer) = &self.observer {
            observer.on_transition(self.kind, previous, next);
        }
    }
}
