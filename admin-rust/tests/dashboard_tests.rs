use folio_admin::{
    AdminError, DashboardAggregator, DashboardOptions, RefreshOutcome, RATE_LIMIT_GUIDANCE,
};
use folio_sdk::{
    FolioError, FolioResult, Record, RecordId, RecordStore, ResourceKind, Session, SessionUser,
};
use serde_json::Value;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{sync::Semaphore, time::Instant};

/// Answers `list` with scripted counts per kind (one record by default) and
/// records when each call arrived. A gated store holds every call until
/// permits are added.
#[derive(Default)]
struct ScriptedStore {
    scripted: Mutex<HashMap<ResourceKind, VecDeque<FolioResult<usize>>>>,
    calls: Mutex<Vec<(ResourceKind, Instant)>>,
    gate: Option<Semaphore>,
}

impl ScriptedStore {
    fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    fn script(&self, kind: ResourceKind, result: FolioResult<usize>) -> &Self {
        self.scripted
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(result);
        self
    }

    fn open_gate(&self, permits: usize) {
        self.gate.as_ref().unwrap().add_permits(permits);
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn calls_for(&self, kind: ResourceKind) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(called, _)| *called == kind)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait::async_trait]
impl RecordStore for ScriptedStore {
    async fn list(&self, kind: ResourceKind) -> FolioResult<Vec<Record>> {
        self.calls.lock().unwrap().push((kind, Instant::now()));
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);
        let count = scripted.unwrap_or(Ok(1))?;
        Ok((0..count)
            .map(|i| Record::new(format!("{kind}-{i}")))
            .collect())
    }

    async fn get_by_id(&self, kind: ResourceKind, _id: &RecordId) -> FolioResult<Record> {
        Err(FolioError::Unsupported(kind, "scripted store"))
    }

    async fn create(&self, kind: ResourceKind, _payload: Value) -> FolioResult<Record> {
        Err(FolioError::Unsupported(kind, "scripted store"))
    }

    async fn delete(&self, kind: ResourceKind, _id: &RecordId) -> FolioResult<()> {
        Err(FolioError::Unsupported(kind, "scripted store"))
    }

    async fn mark_read(&self, kind: ResourceKind, _id: &RecordId) -> FolioResult<()> {
        Err(FolioError::Unsupported(kind, "scripted store"))
    }
}

fn admin_session() -> Arc<Session> {
    Arc::new(Session::with_user(SessionUser {
        email: "admin@example.com".to_string(),
        is_admin: true,
        token: "tok".to_string(),
    }))
}

fn throttled() -> FolioError {
    FolioError::RateLimited("Too many requests, please try again later.".into())
}

#[tokio::test(start_paused = true)]
async fn refresh_all_tracks_each_card_independently() {
    let store = Arc::new(ScriptedStore::default());
    store
        .script(ResourceKind::Blog, Ok(3))
        .script(ResourceKind::Slide, Ok(2))
        .script(ResourceKind::Slide, Err(FolioError::Validation("bad query".into())))
        .script(ResourceKind::Contact, Ok(7));
    let dashboard = DashboardAggregator::new(store.clone(), admin_session());
    let mut changes = dashboard.subscribe();

    assert_eq!(dashboard.refresh_all().await.unwrap(), RefreshOutcome::Completed);
    assert!(changes.has_changed().unwrap());
    let snapshot = dashboard.snapshot();
    assert_eq!(snapshot.count(ResourceKind::Blog), Some(3));
    assert_eq!(snapshot.count(ResourceKind::Slide), Some(2));
    assert_eq!(snapshot.count(ResourceKind::Testimonial), Some(1));
    assert_eq!(snapshot.count(ResourceKind::Contact), Some(7));
    assert!(!snapshot.is_loading());
    assert_eq!(store.total_calls(), 5);

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(dashboard.refresh_all().await.unwrap(), RefreshOutcome::Completed);

    let snapshot = dashboard.snapshot();
    let slides = snapshot.card(ResourceKind::Slide).unwrap();
    assert_eq!(slides.count, Some(2));
    assert_eq!(slides.error.as_deref(), Some("Validation error: bad query"));
    assert!(!slides.loading);
    assert_eq!(snapshot.count(ResourceKind::Blog), Some(1));
    assert!(snapshot.card(ResourceKind::Blog).unwrap().error.is_none());
    assert!(snapshot.global_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn rate_limiting_raises_the_global_banner() {
    let store = Arc::new(ScriptedStore::default());
    store.script(ResourceKind::Contact, Err(throttled()));
    let dashboard = DashboardAggregator::new(store.clone(), admin_session());

    dashboard.refresh_all().await.unwrap();
    let snapshot = dashboard.snapshot();
    assert_eq!(snapshot.global_error.as_deref(), Some(RATE_LIMIT_GUIDANCE));
    assert!(snapshot.card(ResourceKind::Contact).unwrap().error.is_some());
    assert!(snapshot.card(ResourceKind::Blog).unwrap().error.is_none());
    assert_eq!(snapshot.count(ResourceKind::Blog), Some(1));

    tokio::time::advance(Duration::from_secs(5)).await;
    dashboard.refresh_all().await.unwrap();
    assert!(dashboard.snapshot().global_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn refresh_within_cooldown_is_ignored() {
    let store = Arc::new(ScriptedStore::default());
    let dashboard = DashboardAggregator::new(store.clone(), admin_session());

    assert_eq!(dashboard.refresh_all().await.unwrap(), RefreshOutcome::Completed);
    assert_eq!(store.total_calls(), 5);

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(
        dashboard.refresh_all().await.unwrap(),
        RefreshOutcome::CoolingDown(Duration::from_secs(3))
    );
    assert_eq!(store.total_calls(), 5);

    tokio::time::advance(Duration::from_secs(3)).await;
    assert!(dashboard.cooldown_remaining().is_none());
    assert_eq!(dashboard.refresh_all().await.unwrap(), RefreshOutcome::Completed);
    assert_eq!(store.total_calls(), 10);
}

#[tokio::test(start_paused = true)]
async fn refresh_while_in_flight_is_not_queued() {
    let store = Arc::new(ScriptedStore::gated());
    let dashboard = DashboardAggregator::new(store.clone(), admin_session());

    let first = tokio::spawn({
        let dashboard = dashboard.clone();
        async move { dashboard.refresh_all().await }
    });
    while !dashboard.is_refreshing() {
        tokio::task::yield_now().await;
    }

    assert_eq!(dashboard.refresh_all().await.unwrap(), RefreshOutcome::InFlight);
    assert!(dashboard.snapshot().is_loading());

    store.open_gate(5);
    assert_eq!(first.await.unwrap().unwrap(), RefreshOutcome::Completed);
    assert_eq!(store.total_calls(), 5);
    assert!(!dashboard.is_refreshing());
}

#[tokio::test(start_paused = true)]
async fn refresh_one_backs_off_and_keeps_the_last_error() {
    let store = Arc::new(ScriptedStore::default());
    for _ in 0..5 {
        store.script(ResourceKind::Testimonial, Err(throttled()));
    }
    let dashboard = DashboardAggregator::new(store.clone(), admin_session());
    let start = Instant::now();

    dashboard
        .refresh_one(ResourceKind::Testimonial)
        .await
        .expect("refresh_one records the failure on the card");

    let offsets: Vec<Duration> = store
        .calls_for(ResourceKind::Testimonial)
        .into_iter()
        .map(|at| at - start)
        .collect();
    assert_eq!(
        offsets,
        vec![
            Duration::ZERO,
            Duration::from_millis(1000),
            Duration::from_millis(3000),
        ]
    );
    assert_eq!(start.elapsed(), Duration::from_millis(3000));

    let snapshot = dashboard.snapshot();
    let card = snapshot.card(ResourceKind::Testimonial).unwrap();
    assert!(!card.loading);
    assert!(card.count.is_none());
    assert!(card.error.is_some());
    assert_eq!(snapshot.global_error.as_deref(), Some(RATE_LIMIT_GUIDANCE));
    assert_eq!(store.total_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn refresh_one_recovers_after_a_transient_failure() {
    let store = Arc::new(ScriptedStore::default());
    store
        .script(ResourceKind::ClientLogo, Err(throttled()))
        .script(ResourceKind::ClientLogo, Ok(4));
    let dashboard = DashboardAggregator::new(store.clone(), admin_session());

    dashboard.refresh_one(ResourceKind::ClientLogo).await.unwrap();

    let snapshot = dashboard.snapshot();
    let card = snapshot.card(ResourceKind::ClientLogo).unwrap();
    assert_eq!(card.count, Some(4));
    assert!(card.error.is_none());
    assert_eq!(store.calls_for(ResourceKind::ClientLogo).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn refresh_one_retries_permanent_failures_too() {
    let store = Arc::new(ScriptedStore::default());
    for _ in 0..3 {
        store.script(
            ResourceKind::Slide,
            Err(FolioError::NotFound("record not found".into())),
        );
    }
    let dashboard = DashboardAggregator::new(store.clone(), admin_session());

    dashboard.refresh_one(ResourceKind::Slide).await.unwrap();

    assert_eq!(store.calls_for(ResourceKind::Slide).len(), 3);
    let snapshot = dashboard.snapshot();
    assert_eq!(
        snapshot.card(ResourceKind::Slide).unwrap().error.as_deref(),
        Some("Not found: record not found")
    );
}

#[tokio::test(start_paused = true)]
async fn dropped_refresh_clears_loading_cards() {
    let store = Arc::new(ScriptedStore::gated());
    let dashboard = DashboardAggregator::new(store.clone(), admin_session());

    let timed_out = tokio::time::timeout(Duration::from_secs(1), dashboard.refresh_all()).await;
    assert!(timed_out.is_err());
    assert!(!dashboard.is_refreshing());
    assert!(!dashboard.snapshot().is_loading());
    assert!(dashboard.cooldown_remaining().is_none());

    let timed_out = tokio::time::timeout(
        Duration::from_secs(1),
        dashboard.refresh_one(ResourceKind::Blog),
    )
    .await;
    assert!(timed_out.is_err());
    assert!(!dashboard.snapshot().is_loading());
}

#[tokio::test(start_paused = true)]
async fn mounted_dashboard_refreshes_until_unmounted() {
    let store = Arc::new(ScriptedStore::default());
    let options = DashboardOptions {
        cooldown: Duration::from_secs(600),
        ..DashboardOptions::default()
    };
    let dashboard = DashboardAggregator::with_options(store.clone(), admin_session(), options);

    let mount = dashboard.mount();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(store.total_calls(), 5);
    assert!(matches!(
        dashboard.refresh_all().await.unwrap(),
        RefreshOutcome::CoolingDown(_)
    ));

    tokio::time::sleep(Duration::from_secs(5 * 60)).await;
    assert_eq!(store.total_calls(), 10);

    mount.unmount();
    tokio::time::sleep(Duration::from_secs(15 * 60)).await;
    assert_eq!(store.total_calls(), 10);
}

#[tokio::test]
async fn dashboard_requires_an_admin_session() {
    let store = Arc::new(ScriptedStore::default());
    let dashboard = DashboardAggregator::new(store.clone(), Arc::new(Session::new()));

    let error = dashboard.refresh_all().await.expect_err("no session");
    assert!(matches!(error, AdminError::Client(FolioError::AuthRequired)));
    let error = dashboard
        .refresh_one(ResourceKind::Blog)
        .await
        .expect_err("no session");
    assert!(error.is_auth_failure());
    assert_eq!(store.total_calls(), 0);
}
