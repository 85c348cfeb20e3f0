use crate::{
    lifecycle::Lifecycle,
    opentelemetry::{trace_operation, AdminSpanMethod},
    AdminError, AdminResult, LifecycleObserver, LifecyclePhase, ResourceList,
};
use folio_sdk::{
    AssetPayload, FolioError, ImageDeletion, ImageFile, ImageStore, Record, RecordId,
    RecordStore, ResourceKind, Session,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// What to do with a freshly uploaded image when the record that should
/// reference it could not be created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Leave the image on the host.
    #[default]
    Keep,
    /// Try to delete the image. A failure is logged and otherwise ignored.
    Compensate,
}

/// What happened to the image of a deleted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "camelCase")]
pub enum ImageCleanup {
    /// The image host deleted this public id.
    Deleted(String),
    /// The URL does not point at the image host; nothing was sent.
    Skipped,
    /// The record had no image URL.
    NoImage,
    /// The image could not be deleted. The record is gone regardless.
    Failed(String),
}

/// Result of a successful delete. Image cleanup is best effort, so a failed
/// cleanup still counts as a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub kind: ResourceKind,
    pub id: RecordId,
    pub image: ImageCleanup,
}

impl DeleteOutcome {
    /// Reason the image was left behind, to show as a warning.
    #[must_use]
    pub fn image_warning(&self) -> Option<&str> {
        match &self.image {
            ImageCleanup::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Keeps records and their hosted images consistent.
///
/// Creation uploads the image first and only then creates the record that
/// references it, so a record never points at an image that does not exist.
/// Deletion removes the record first and only then its image, so a record
/// never outlives its image.
pub struct ResourceCoordinator {
    records: Arc<dyn RecordStore>,
    images: Arc<dyn ImageStore>,
    session: Arc<Session>,
    orphan_policy: OrphanPolicy,
    observer: Option<Arc<dyn LifecycleObserver>>,
}

impl ResourceCoordinator {
    pub fn new(
        records: Arc<dyn RecordStore>,
        images: Arc<dyn ImageStore>,
        session: Arc<Session>,
    ) -> Self {
        Self {
            records,
            images,
            session,
            orphan_policy: OrphanPolicy::default(),
            observer: None,
        }
    }

    #[must_use]
    pub fn with_orphan_policy(mut self, orphan_policy: OrphanPolicy) -> Self {
        self.orphan_policy = orphan_policy;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Validate, upload the image, then create the record with its
    /// `imageUrl`. Nothing is sent when validation fails, and no record is
    /// created when the upload fails.
    ///
    /// The orphan policy only applies when the backend refused the record.
    /// When the outcome is unknown, say after a 5xx or an `Unconfirmed`
    /// reply, the image is always kept.
    pub async fn create<P: AssetPayload>(
        &self,
        payload: &P,
        image: Option<ImageFile>,
    ) -> AdminResult<Record> {
        trace_operation(
            AdminSpanMethod::Create,
            Some(P::KIND),
            self.create_inner(payload, image),
        )
        .await
    }

    /// Like `create`, and appends the new record to `list`.
    pub async fn create_into<P: AssetPayload>(
        &self,
        payload: &P,
        image: Option<ImageFile>,
        list: &mut ResourceList,
    ) -> AdminResult<Record> {
        if list.kind() != P::KIND {
            return Err(AdminError::InvalidState(format!(
                "cannot add {} to a list of {}",
                P::KIND.label(),
                list.kind().label()
            )));
        }
        let record = self.create(payload, image).await?;
        list.push(record.clone());
        Ok(record)
    }

    async fn create_inner<P: AssetPayload>(
        &self,
        payload: &P,
        image: Option<ImageFile>,
    ) -> AdminResult<Record> {
        let kind = P::KIND;
        payload.validate()?;
        let image = image
            .filter(|image| !image.is_empty())
            .ok_or(FolioError::MissingField("image"))?;
        self.session.require_admin()?;

        let mut lifecycle = Lifecycle::new(kind, LifecyclePhase::Absent, self.observer.clone());
        lifecycle.advance(LifecyclePhase::Uploading);
        let uploaded = match self.images.upload(image).await {
            Ok(uploaded) => uploaded,
            Err(error) => {
                lifecycle.advance(LifecyclePhase::Absent);
                return Err(error.into());
            }
        };

        lifecycle.advance(LifecyclePhase::Creating);
        let (created, sent) = match payload.to_body(&uploaded.url) {
            Ok(body) => (self.records.create(kind, body).await, true),
            Err(error) => (Err(error), false),
        };
        match created {
            Ok(record) => {
                lifecycle.advance(LifecyclePhase::Present);
                info!(%kind, id = %record.id, "resource created");
                Ok(record)
            }
            Err(error) if !sent || error.is_rejection() => {
                lifecycle.advance(LifecyclePhase::Absent);
                self.handle_orphan(kind, &uploaded.url).await;
                Err(error.into())
            }
            Err(error) => {
                // The record may exist and point at the image, so it stays.
                warn!(
                    %kind,
                    url = %uploaded.url,
                    %error,
                    "record creation not confirmed, uploaded image kept"
                );
                Err(error.into())
            }
        }
    }

    async fn handle_orphan(&self, kind: ResourceKind, image_url: &str) {
        match self.orphan_policy {
            OrphanPolicy::Keep => {
                warn!(%kind, url = %image_url, "record creation failed, uploaded image left on the host");
            }
            OrphanPolicy::Compensate => match self.images.delete_by_url(image_url).await {
                Ok(_) => info!(%kind, url = %image_url, "removed image of failed creation"),
                Err(error) => {
                    warn!(%kind, url = %image_url, %error, "could not remove image of failed creation");
                }
            },
        }
    }

    /// Delete the record, then its image. Fails with `InvalidState` when
    /// there is no target. An image that cannot be deleted is reported in
    /// the outcome instead of failing the call.
    pub async fn delete(
        &self,
        kind: ResourceKind,
        target: Option<&Record>,
    ) -> AdminResult<DeleteOutcome> {
        trace_operation(
            AdminSpanMethod::Delete,
            Some(kind),
            self.delete_inner(kind, target),
        )
        .await
    }

    /// Delete the selected record of `list` and remove it from the list. The
    /// list is left untouched when the record deletion fails.
    pub async fn delete_selected(&self, list: &mut ResourceList) -> AdminResult<DeleteOutcome> {
        let Some(record) = list.selected().cloned() else {
            return Err(no_target(list.kind()));
        };
        let outcome = self.delete(list.kind(), Some(&record)).await?;
        list.remove(&record.id);
        list.clear_selection();
        Ok(outcome)
    }

    async fn delete_inner(
        &self,
        kind: ResourceKind,
        target: Option<&Record>,
    ) -> AdminResult<DeleteOutcome> {
        let record = target.ok_or_else(|| no_target(kind))?;
        self.session.require_admin()?;

        let mut lifecycle = Lifecycle::new(kind, LifecyclePhase::Present, self.observer.clone());
        lifecycle.advance(LifecyclePhase::DeletingRecord);
        if let Err(error) = self.records.delete(kind, &record.id).await {
            lifecycle.advance(LifecyclePhase::Present);
            return Err(error.into());
        }

        let image = match record.image_url.as_deref().filter(|url| !url.trim().is_empty()) {
            None => ImageCleanup::NoImage,
            Some(image_url) => {
                lifecycle.advance(LifecyclePhase::DeletingImage);
                match self.images.delete_by_url(image_url).await {
                    Ok(ImageDeletion::Deleted(public_id)) => ImageCleanup::Deleted(public_id),
                    Ok(ImageDeletion::Skipped) => ImageCleanup::Skipped,
                    Err(error) => {
                        warn!(%kind, id = %record.id, url = %image_url, %error, "record deleted but its image was not");
                        ImageCleanup::Failed(error.to_string())
                    }
                }
            }
        };
        lifecycle.advance(LifecyclePhase::Absent);
        info!(%kind, id = %record.id, "resource deleted");

        Ok(DeleteOutcome {
            kind,
            id: record.id.clone(),
            image,
        })
    }
}

fn no_target(kind: ResourceKind) -> AdminError {
    AdminError::InvalidState(format!("no {} selected for deletion", kind.label()))
}
