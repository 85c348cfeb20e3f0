use folio_sdk::{Record, RecordId, ResourceKind};

/// The records of one kind as shown in a list view, with at most one
/// selected for deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceList {
    kind: ResourceKind,
    records: Vec<Record>,
    selected: Option<RecordId>,
}

impl ResourceList {
    #[must_use]
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            records: Vec::new(),
            selected: None,
        }
    }

    #[must_use]
    pub fn with_records(kind: ResourceKind, records: Vec<Record>) -> Self {
        Self {
            kind,
            records,
            selected: None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|record| &record.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &RecordId) -> bool {
        self.get(id).is_some()
    }

    /// Mark `id` as the deletion target. The id is not checked here; a
    /// selection that is not in the list resolves to no target.
    pub fn select(&mut self, id: impl Into<RecordId>) {
        self.selected = Some(id.into());
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    #[must_use]
    pub fn selected_id(&self) -> Option<&RecordId> {
        self.selected.as_ref()
    }

    /// The selected record, if the selection points into the list.
    #[must_use]
    pub fn selected(&self) -> Option<&Record> {
        self.selected.as_ref().and_then(|id| self.get(id))
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Remove a record, clearing the selection if it pointed at it.
    pub fn remove(&mut self, id: &RecordId) -> Option<Record> {
        let index = self.records.iter().position(|record| &record.id == id)?;
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        Some(self.records.remove(index))
    }

    /// Replace the content with a fresh fetch. A selection that no longer
    /// exists is dropped.
    pub fn replace(&mut self, records: Vec<Record>) {
        self.records = records;
        if self.selected.as_ref().is_some_and(|id| !self.contains(id)) {
            self.selected = None;
        }
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}
