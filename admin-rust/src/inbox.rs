use crate::{
    opentelemetry::{trace_operation, AdminSpanMethod},
    AdminError, AdminResult,
};
use folio_sdk::{ContactMessage, RecordId, RecordStore, ResourceKind, Session};
use std::sync::Arc;
use tracing::{info, warn};

/// Messages sent through the public contact form.
pub struct ContactInbox {
    records: Arc<dyn RecordStore>,
    session: Arc<Session>,
    messages: Vec<ContactMessage>,
}

impl ContactInbox {
    pub fn new(records: Arc<dyn RecordStore>, session: Arc<Session>) -> Self {
        Self {
            records,
            session,
            messages: Vec::new(),
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[ContactMessage] {
        &self.messages
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.messages.iter().filter(|message| !message.is_read).count()
    }

    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<&ContactMessage> {
        self.messages.iter().find(|message| &message.id == id)
    }

    /// Fetch every message, newest first when the backend provides dates.
    pub async fn load(&mut self) -> AdminResult<&[ContactMessage]> {
        let records = self.records.list(ResourceKind::Contact).await?;
        let mut messages: Vec<ContactMessage> = records
            .iter()
            .filter_map(|record| match record.decode::<ContactMessage>() {
                Ok(message) => Some(message),
                Err(error) => {
                    warn!(id = %record.id, %error, "skipping malformed contact message");
                    None
                }
            })
            .collect();
        // RFC 3339 timestamps sort lexically.
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        self.messages = messages;
        Ok(&self.messages)
    }

    /// Mark a message as read. Returns `false` without contacting the backend
    /// when it is already read; a message never goes back to unread.
    pub async fn mark_read(&mut self, id: &RecordId) -> AdminResult<bool> {
        let Some(index) = self.position(id) else {
            return Err(unknown_message(id));
        };
        if self.messages[index].is_read {
            return Ok(false);
        }

        let records = self.records.clone();
        let session = self.session.clone();
        trace_operation(
            AdminSpanMethod::MarkRead,
            Some(ResourceKind::Contact),
            async move {
                session.require_admin()?;
                records.mark_read(ResourceKind::Contact, id).await?;
                Ok::<_, AdminError>(())
            },
        )
        .await?;

        self.messages[index].is_read = true;
        info!(%id, "contact message marked read");
        Ok(true)
    }

    /// Delete a message. Contact messages own no image, so this is a single
    /// record deletion.
    pub async fn delete(&mut self, id: &RecordId) -> AdminResult<()> {
        let Some(index) = self.position(id) else {
            return Err(unknown_message(id));
        };

        let records = self.records.clone();
        let session = self.session.clone();
        trace_operation(
            AdminSpanMethod::DeleteMessage,
            Some(ResourceKind::Contact),
            async move {
                session.require_admin()?;
                records.delete(ResourceKind::Contact, id).await?;
                Ok::<_, AdminError>(())
            },
        )
        .await?;

        self.messages.remove(index);
        info!(%id, "contact message deleted");
        Ok(())
    }

    fn position(&self, id: &RecordId) -> Option<usize> {
        self.messages.iter().position(|message| &message.id == id)
    }
}

fn unknown_message(id: &RecordId) -> AdminError {
    AdminError::InvalidState(format!("no contact message with id {id}"))
}
