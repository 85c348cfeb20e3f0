use crate::{
    client_utils::{ensure_success, envelope, read_json, send_authed, send_json},
    FolioConfig, FolioError, FolioResult, Record, RecordId, ResourceKind, TokenProvider,
};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// CRUD access to the backend's resource collections.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// All records of a kind. A reply without a list yields an empty vec.
    async fn list(&self, kind: ResourceKind) -> FolioResult<Vec<Record>>;

    /// A single record with its full body. Only offered for blogs.
    async fn get_by_id(&self, kind: ResourceKind, id: &RecordId) -> FolioResult<Record>;

    async fn create(&self, kind: ResourceKind, payload: Value) -> FolioResult<Record>;

    async fn delete(&self, kind: ResourceKind, id: &RecordId) -> FolioResult<()>;

    /// Flip a contact message's `isRead` flag to true.
    async fn mark_read(&self, kind: ResourceKind, id: &RecordId) -> FolioResult<()>;
}

/// `RecordStore` backed by the REST API.
pub struct HttpRecordStore {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpRecordStore {
    pub fn new(config: &FolioConfig, tokens: Arc<dyn TokenProvider>) -> FolioResult<Self> {
        Ok(Self {
            client: config.http_client()?,
            base_url: config.api_base_url.clone(),
            tokens,
        })
    }

    fn url(&self, kind: ResourceKind, suffix: &str) -> String {
        format!("{}/{}/{suffix}", self.base_url, kind.path())
    }

    async fn authed_json(&self, request: RequestBuilder) -> FolioResult<Value> {
        let response = send_authed(self.tokens.as_ref(), request).await?;
        read_json(response).await
    }
}

#[async_trait::async_trait]
impl RecordStore for HttpRecordStore {
    async fn list(&self, kind: ResourceKind) -> FolioResult<Vec<Record>> {
        let body = send_json(self.client.get(self.url(kind, "get-all"))).await?;
        Ok(records_from_body(kind, body))
    }

    async fn get_by_id(&self, kind: ResourceKind, id: &RecordId) -> FolioResult<Record> {
        if kind != ResourceKind::Blog {
            return Err(FolioError::Unsupported(kind, "get_by_id"));
        }
        let body = send_json(self.client.post(self.url(kind, &format!("get-by-id/{id}")))).await?;
        ensure_success(&body)?;
        record_from_body(body)
    }

    /// A 2xx reply the record cannot be read from fails with `Unconfirmed`:
    /// the backend accepted the write, so the record most likely exists.
    async fn create(&self, kind: ResourceKind, payload: Value) -> FolioResult<Record> {
        let body = self
            .authed_json(self.client.post(self.url(kind, "new")).json(&payload))
            .await?;
        ensure_success(&body)?;
        let record = record_from_body(body).map_err(|error| {
            warn!(%kind, %error, "create accepted but the reply carried no record");
            FolioError::Unconfirmed(error.to_string())
        })?;
        debug!(%kind, id = %record.id, "record created");
        Ok(record)
    }

    async fn delete(&self, kind: ResourceKind, id: &RecordId) -> FolioResult<()> {
        let body = self
            .authed_json(self.client.delete(self.url(kind, &format!("delete/{id}"))))
            .await?;
        ensure_success(&body)?;
        debug!(%kind, %id, "record deleted");
        Ok(())
    }

    async fn mark_read(&self, kind: ResourceKind, id: &RecordId) -> FolioResult<()> {
        if kind != ResourceKind::Contact {
            return Err(FolioError::Unsupported(kind, "mark_read"));
        }
        let body = self
            .authed_json(self.client.put(self.url(kind, &format!("{id}/mark-read"))))
            .await?;
        ensure_success(&body)
    }
}

/// Pull the record list out of `{ data: [...] }`. Anything that is not a
/// list yields nothing; elements that do not look like records are dropped.
pub(crate) fn records_from_body(kind: ResourceKind, body: Value) -> Vec<Record> {
    let Some(Value::Array(items)) = envelope(&body).data else {
        return vec![];
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Record>(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(%kind, error = %e, "dropping malformed record");
                None
            }
        })
        .collect()
}

/// The record in `data` if present, else the body itself.
pub(crate) fn record_from_body(body: Value) -> FolioResult<Record> {
    let value = match envelope(&body).data {
        Some(data @ Value::Object(_)) => data,
        _ => body,
    };
    serde_json::from_value(value)
        .map_err(|e| FolioError::Invariant("record store", format!("unexpected record: {e}")))
}
