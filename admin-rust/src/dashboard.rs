use crate::{
    opentelemetry::{trace_operation, AdminSpanMethod},
    AdminResult, RetryPolicy,
};
use folio_sdk::{FolioError, FolioResult, RecordStore, ResourceKind, Session};
use futures::future::join_all;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

/// Banner text shown while the backend is throttling the dashboard.
pub const RATE_LIMIT_GUIDANCE: &str =
    "Too many requests. Please wait a moment before refreshing again.";

/// Tunables of the dashboard.
/// # Default Values
/// - `retry`: 3 attempts, 1000 ms base delay
/// - `cooldown`: 5 s
/// - `auto_refresh`: 5 min
/// - `kinds`: every resource kind
#[derive(Debug, Clone)]
pub struct DashboardOptions {
    /// Backoff of per-card retries.
    pub retry: RetryPolicy,
    /// How long the manual refresh stays disabled after a refresh completes.
    pub cooldown: Duration,
    /// Period of the background refresh while mounted.
    pub auto_refresh: Duration,
    pub kinds: Vec<ResourceKind>,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            cooldown: Duration::from_secs(5),
            auto_refresh: Duration::from_secs(5 * 60),
            kinds: ResourceKind::ALL.to_vec(),
        }
    }
}

/// Count card of one resource kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CardState {
    pub loading: bool,
    /// Last known count. Kept when a later fetch fails.
    pub count: Option<usize>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub cards: BTreeMap<ResourceKind, CardState>,
    /// Set when any kind was rate limited during the last refresh.
    pub global_error: Option<String>,
}

impl DashboardSnapshot {
    #[must_use]
    pub fn card(&self, kind: ResourceKind) -> Option<&CardState> {
        self.cards.get(&kind)
    }

    #[must_use]
    pub fn count(&self, kind: ResourceKind) -> Option<usize> {
        self.card(kind).and_then(|card| card.count)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.cards.values().any(|card| card.loading)
    }
}

/// What a call to `refresh_all` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed,
    /// Another refresh was running; nothing was queued.
    InFlight,
    /// A refresh completed recently; try again after the remaining time.
    CoolingDown(Duration),
}

struct DashboardInner {
    records: Arc<dyn RecordStore>,
    session: Arc<Session>,
    options: DashboardOptions,
    snapshot: watch::Sender<DashboardSnapshot>,
    in_flight: AtomicBool,
    cooldown_until: Mutex<Option<Instant>>,
}

/// Record counts per resource kind, each card loading and failing on its
/// own. Cloning yields another handle to the same dashboard.
#[derive(Clone)]
pub struct DashboardAggregator {
    inner: Arc<DashboardInner>,
}

/// Background refresh of a mounted dashboard. Dropping it unmounts the
/// dashboard and cancels the refresh.
pub struct DashboardMount {
    handle: JoinHandle<()>,
}

impl DashboardMount {
    /// Same as dropping the handle.
    pub fn unmount(self) {}

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DashboardMount {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Clears the `loading` flag of cards a dropped refresh never reached.
/// `None` covers every card.
struct LoadingGuard<'a> {
    snapshot: &'a watch::Sender<DashboardSnapshot>,
    kind: Option<ResourceKind>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.snapshot.send_if_modified(|snapshot| {
            let mut modified = false;
            for (kind, card) in &mut snapshot.cards {
                if card.loading && self.kind.is_none_or(|only| only == *kind) {
                    card.loading = false;
                    modified = true;
                }
            }
            modified
        });
    }
}

impl DashboardAggregator {
    pub fn new(records: Arc<dyn RecordStore>, session: Arc<Session>) -> Self {
        Self::with_options(records, session, DashboardOptions::default())
    }

    pub fn with_options(
        records: Arc<dyn RecordStore>,
        session: Arc<Session>,
        options: DashboardOptions,
    ) -> Self {
        let cards = options
            .kinds
            .iter()
            .map(|&kind| (kind, CardState::default()))
            .collect();
        let (snapshot, _) = watch::channel(DashboardSnapshot {
            cards,
            global_error: None,
        });

        Self {
            inner: Arc::new(DashboardInner {
                records,
                session,
                options,
                snapshot,
                in_flight: AtomicBool::new(false),
                cooldown_until: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Watch the dashboard change as cards load.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.inner.snapshot.subscribe()
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Time left before a manual refresh is accepted again.
    #[must_use]
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let until = (*self
            .inner
            .cooldown_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner))?;
        let remaining = until.saturating_duration_since(Instant::now());
        (!remaining.is_zero()).then_some(remaining)
    }

    /// Manual refresh of every card, one fetch per kind in parallel. Ignored
    /// while a refresh is running and during the cool-down that follows one.
    pub async fn refresh_all(&self) -> AdminResult<RefreshOutcome> {
        if let Some(remaining) = self.cooldown_remaining() {
            debug!(?remaining, "refresh ignored during cool-down");
            return Ok(RefreshOutcome::CoolingDown(remaining));
        }
        trace_operation(AdminSpanMethod::RefreshAll, None, self.inner.refresh()).await
    }

    /// Refresh one card, retrying transient failures. The last failure
    /// becomes the card's error.
    pub async fn refresh_one(&self, kind: ResourceKind) -> AdminResult<()> {
        trace_operation(
            AdminSpanMethod::RefreshOne,
            Some(kind),
            self.inner.refresh_one(kind),
        )
        .await
    }

    /// Refresh now and then periodically until the returned handle is
    /// dropped. Periodic refreshes skip while another refresh is running
    /// and ignore the manual cool-down.
    #[must_use]
    pub fn mount(&self) -> DashboardMount {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.options.auto_refresh);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match inner.refresh().await {
                    Ok(RefreshOutcome::InFlight) => debug!("background refresh skipped"),
                    Ok(_) => {}
                    Err(error) => warn!(%error, "background refresh failed"),
                }
            }
        });
        DashboardMount { handle }
    }
}

impl DashboardInner {
    async fn refresh(&self) -> AdminResult<RefreshOutcome> {
        self.session.require_admin()?;
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("refresh already in flight");
            return Ok(RefreshOutcome::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        self.snapshot.send_modify(|snapshot| {
            snapshot.global_error = None;
            for card in snapshot.cards.values_mut() {
                card.loading = true;
            }
        });
        let _loading = LoadingGuard {
            snapshot: &self.snapshot,
            kind: None,
        };

        let fetches = self.options.kinds.iter().map(|&kind| async move {
            let result = self.records.list(kind).await.map(|records| records.len());
            self.apply(kind, result);
        });
        join_all(fetches).await;

        let cooldown_until = Instant::now() + self.options.cooldown;
        *self
            .cooldown_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(cooldown_until);
        info!("dashboard refreshed");
        Ok(RefreshOutcome::Completed)
    }

    async fn refresh_one(&self, kind: ResourceKind) -> AdminResult<()> {
        self.session.require_admin()?;
        self.snapshot.send_modify(|snapshot| {
            snapshot.cards.entry(kind).or_default().loading = true;
        });
        let _loading = LoadingGuard {
            snapshot: &self.snapshot,
            kind: Some(kind),
        };

        let result = self
            .options
            .retry
            .run(move |_| async move { self.records.list(kind).await.map(|records| records.len()) })
            .await;
        self.apply(kind, result);
        Ok(())
    }

    fn apply(&self, kind: ResourceKind, result: FolioResult<usize>) {
        self.snapshot.send_modify(|snapshot| {
            let rate_limited = matches!(&result, Err(FolioError::RateLimited(_)));
            let card = snapshot.cards.entry(kind).or_default();
            card.loading = false;
            match result {
                Ok(count) => {
                    card.count = Some(count);
                    card.error = None;
                }
                Err(error) => {
                    warn!(%kind, %error, "could not load count");
                    card.error = Some(error.to_string());
                }
            }
            if rate_limited {
                snapshot.global_error = Some(RATE_LIMIT_GUIDANCE.to_string());
            }
        });
    }
}
