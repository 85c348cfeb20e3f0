use crate::{
    types::ApiEnvelope, BlogPayload, ClientLogoPayload, FolioError, FolioResult, ImageFile,
    Record, RecordId, ResourceKind, SlidePayload, TestimonialPayload,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;

impl ResourceKind {
    /// Every kind, in the order the dashboard shows them.
    pub const ALL: [Self; 5] = [
        Self::Blog,
        Self::Slide,
        Self::Testimonial,
        Self::ClientLogo,
        Self::Contact,
    ];

    /// Path segment of the kind on the REST backend.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Blog => "blogs",
            Self::Slide => "slides",
            Self::Testimonial => "testimonials",
            Self::ClientLogo => "client-logos",
            Self::Contact => "contacts",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Blog => "Blogs",
            Self::Slide => "Slider Images",
            Self::Testimonial => "Testimonials",
            Self::ClientLogo => "Client Logos",
            Self::Contact => "Contact Messages",
        }
    }

    /// Whether records of this kind own exactly one hosted image.
    #[must_use]
    pub fn is_asset_backed(self) -> bool {
        !matches!(self, Self::Contact)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(value) => f.write_str(value),
            Self::Number(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl Record {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            image_url: None,
            created_at: None,
            fields: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// String value of a kind-specific field, if present.
    #[must_use]
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Re-read the record as a kind-specific type.
    pub fn decode<T: DeserializeOwned>(&self) -> FolioResult<T> {
        let value = serde_json::to_value(self)
            .map_err(|e| FolioError::Invariant("record", e.to_string()))?;
        serde_json::from_value(value).map_err(|e| FolioError::Invariant("record", e.to_string()))
    }
}

/// A payload for one of the asset-backed kinds. The coordinator validates it,
/// uploads its image, then sends it with `imageUrl` merged in.
pub trait AssetPayload: Serialize + Send + Sync {
    const KIND: ResourceKind;

    /// Required string fields as `(wire name, value)`, in form order.
    fn required_fields(&self) -> Vec<(&'static str, &str)>;

    /// Fails with the first required field that is empty after trimming.
    fn validate(&self) -> FolioResult<()> {
        check_required(&self.required_fields())
    }

    /// The JSON body sent to `{kind}/new`.
    fn to_body(&self, image_url: &str) -> FolioResult<Value> {
        let mut body = serde_json::to_value(self)
            .map_err(|e| FolioError::Invariant("payload", e.to_string()))?;
        let object = body.as_object_mut().ok_or_else(|| {
            FolioError::Invariant("payload", "payload must serialize to an object".to_string())
        })?;
        object.insert("imageUrl".to_string(), Value::String(image_url.to_string()));
        Ok(body)
    }
}

fn check_required(fields: &[(&'static str, &str)]) -> FolioResult<()> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(FolioError::MissingField(*name)),
        None => Ok(()),
    }
}

impl AssetPayload for BlogPayload {
    const KIND: ResourceKind = ResourceKind::Blog;

    fn required_fields(&self) -> Vec<(&'static str, &str)> {
        vec![("title", self.title.as_str()), ("content", self.content.as_str())]
    }
}

impl AssetPayload for TestimonialPayload {
    const KIND: ResourceKind = ResourceKind::Testimonial;

    fn required_fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("description", self.description.as_str()),
            ("clientName", self.client_name.as_str()),
            ("companyName", self.company_name.as_str()),
        ]
    }

    fn validate(&self) -> FolioResult<()> {
        check_required(&self.required_fields())?;
        if !(1..=5).contains(&self.rating) {
            return Err(FolioError::Validation(
                "rating must be between 1 and 5".to_string(),
            ));
        }
        Ok(())
    }
}

impl AssetPayload for SlidePayload {
    const KIND: ResourceKind = ResourceKind::Slide;

    fn required_fields(&self) -> Vec<(&'static str, &str)> {
        vec![]
    }
}

impl AssetPayload for ClientLogoPayload {
    const KIND: ResourceKind = ResourceKind::ClientLogo;

    fn required_fields(&self) -> Vec<(&'static str, &str)> {
        vec![]
    }
}

impl BlogPayload {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn published(mut self) -> Self {
        self.status = crate::BlogStatus::Published;
        self
    }
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
            mime_type: None,
        }
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The declared MIME type, or one guessed from the extension.
    #[must_use]
    pub fn content_type(&self) -> &str {
        if let Some(mime_type) = &self.mime_type {
            return mime_type;
        }
        let extension = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "svg" => "image/svg+xml",
            "avif" => "image/avif",
            _ => "application/octet-stream",
        }
    }
}

impl ApiEnvelope {
    /// The human readable reason given by the backend, if any.
    pub fn reason(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .filter(|reason| !reason.trim().is_empty())
    }
}
