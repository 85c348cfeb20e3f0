//! In-memory stand-ins for the backend clients, for tests of code built on
//! top of them.

mod image_store;
mod record_store;

pub use image_store::{MockImageStore, MockUploadResult};
pub use record_store::{MockOp, MockRecordStore, RecordStoreCall};

use std::sync::{Arc, Mutex};

/// Ordered log shared by several mocks, to assert the interleaving of calls
/// across them.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().expect("call log poisoned").push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().expect("call log poisoned").clone()
    }

    pub fn clear(&self) {
        self.0.lock().expect("call log poisoned").clear();
    }
}
