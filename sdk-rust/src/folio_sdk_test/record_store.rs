use super::CallLog;
use crate::{FolioError, FolioResult, Record, RecordId, RecordStore, ResourceKind};
use serde_json::Value;
use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

/// Record store operations, used to target enqueued errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    List,
    GetById,
    Create,
    Delete,
    MarkRead,
}

impl MockOp {
    fn log_name(self) -> &'static str {
        match self {
            Self::List => "records.list",
            Self::GetById => "records.get_by_id",
            Self::Create => "records.create",
            Self::Delete => "records.delete",
            Self::MarkRead => "records.mark_read",
        }
    }
}

/// A call received by the mock, with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordStoreCall {
    List(ResourceKind),
    GetById(ResourceKind, RecordId),
    Create(ResourceKind, Value),
    Delete(ResourceKind, RecordId),
    MarkRead(ResourceKind, RecordId),
}

impl RecordStoreCall {
    pub fn op(&self) -> MockOp {
        match self {
            Self::List(_) => MockOp::List,
            Self::GetById(..) => MockOp::GetById,
            Self::Create(..) => MockOp::Create,
            Self::Delete(..) => MockOp::Delete,
            Self::MarkRead(..) => MockOp::MarkRead,
        }
    }
}

#[derive(Default)]
struct MockRecordStoreState {
    tables: HashMap<ResourceKind, Vec<Record>>,
    mocked_errors: HashMap<MockOp, VecDeque<FolioError>>,
    tracked_calls: Vec<RecordStoreCall>,
    next_id: u64,
}

impl MockRecordStoreState {
    fn reset(&mut self) {
        self.tracked_calls.clear();
    }

    fn restore(&mut self) {
        self.tables.clear();
        self.mocked_errors.clear();
        self.next_id = 0;
        self.reset();
    }

    /// Track the call, then hand back the next enqueued error for it, if any.
    fn track(&mut self, call: RecordStoreCall) -> FolioResult<()> {
        let op = call.op();
        self.tracked_calls.push(call);
        match self.mocked_errors.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn find_mut(&mut self, kind: ResourceKind, id: &RecordId) -> FolioResult<&mut Record> {
        self.tables
            .get_mut(&kind)
            .and_then(|records| records.iter_mut().find(|record| &record.id == id))
            .ok_or_else(|| FolioError::NotFound(format!("{kind} {id} not found")))
    }
}

/// A record store that keeps its tables in memory. Writes are reflected by
/// later reads; errors can be enqueued per operation and are returned in
/// order before the in-memory behaviour resumes.
#[derive(Default)]
pub struct MockRecordStore {
    state: Mutex<MockRecordStoreState>,
    call_log: Option<CallLog>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also append every call to a shared log.
    #[must_use]
    pub fn with_call_log(mut self, call_log: CallLog) -> Self {
        self.call_log = Some(call_log);
        self
    }

    /// Add records to a kind's table.
    pub fn seed<I>(&self, kind: ResourceKind, records: I) -> &Self
    where
        I: IntoIterator<Item = Record>,
    {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.tables.entry(kind).or_default().extend(records);
        drop(state);
        self
    }

    /// Make the next call of `op` fail with `error`.
    pub fn enqueue_error(&self, op: MockOp, error: FolioError) -> &Self {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.mocked_errors.entry(op).or_default().push_back(error);
        drop(state);
        self
    }

    /// Current content of a kind's table.
    pub fn records(&self, kind: ResourceKind) -> Vec<Record> {
        let state = self.state.lock().expect("mock state poisoned");
        state.tables.get(&kind).cloned().unwrap_or_default()
    }

    /// Retrieve the tracked calls accumulated so far.
    pub fn tracked_calls(&self) -> Vec<RecordStoreCall> {
        let state = self.state.lock().expect("mock state poisoned");
        state.tracked_calls.clone()
    }

    /// Number of tracked calls of one operation.
    pub fn call_count(&self, op: MockOp) -> usize {
        let state = self.state.lock().expect("mock state poisoned");
        state
            .tracked_calls
            .iter()
            .filter(|call| call.op() == op)
            .count()
    }

    /// Reset tracked calls without touching tables or enqueued errors.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.reset();
    }

    /// Clear tables, enqueued errors and tracked calls.
    pub fn restore(&self) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.restore();
    }

    fn log(&self, op: MockOp) {
        if let Some(call_log) = &self.call_log {
            call_log.push(op.log_name());
        }
    }
}

#[async_trait::async_trait]
impl RecordStore for MockRecordStore {
    async fn list(&self, kind: ResourceKind) -> FolioResult<Vec<Record>> {
        self.log(MockOp::List);
        let mut state = self.state.lock().expect("mock state poisoned");
        state.track(RecordStoreCall::List(kind))?;
        Ok(state.tables.get(&kind).cloned().unwrap_or_default())
    }

    async fn get_by_id(&self, kind: ResourceKind, id: &RecordId) -> FolioResult<Record> {
        self.log(MockOp::GetById);
        let mut state = self.state.lock().expect("mock state poisoned");
        state.track(RecordStoreCall::GetById(kind, id.clone()))?;
        state.find_mut(kind, id).map(|record| record.clone())
    }

    async fn create(&self, kind: ResourceKind, payload: Value) -> FolioResult<Record> {
        self.log(MockOp::Create);
        let mut state = self.state.lock().expect("mock state poisoned");
        state.track(RecordStoreCall::Create(kind, payload.clone()))?;

        let Value::Object(mut fields) = payload else {
            return Err(FolioError::Validation("payload must be an object".into()));
        };
        state.next_id += 1;
        fields.insert("id".into(), Value::String(format!("mock-{}", state.next_id)));
        let record: Record = serde_json::from_value(Value::Object(fields))
            .map_err(|e| FolioError::Invariant("mock", e.to_string()))?;

        state.tables.entry(kind).or_default().push(record.clone());
        Ok(record)
    }

    async fn delete(&self, kind: ResourceKind, id: &RecordId) -> FolioResult<()> {
        self.log(MockOp::Delete);
        let mut state = self.state.lock().expect("mock state poisoned");
        state.track(RecordStoreCall::Delete(kind, id.clone()))?;

        let records = state.tables.entry(kind).or_default();
        let before = records.len();
        records.retain(|record| &record.id != id);
        if records.len() == before {
            return Err(FolioError::NotFound(format!("{kind} {id} not found")));
        }
        Ok(())
    }

    async fn mark_read(&self, kind: ResourceKind, id: &RecordId) -> FolioResult<()> {
        self.log(MockOp::MarkRead);
        let mut state = self.state.lock().expect("mock state poisoned");
        state.track(RecordStoreCall::MarkRead(kind, id.clone()))?;

        let record = state.find_mut(kind, id)?;
        record.fields.insert("isRead".into(), Value::Bool(true));
        Ok(())
    }
}
