use crate::{
    client_utils::{send_authed, status_error},
    FolioConfig, FolioError, FolioResult, ImageDeletion, ImageFile, TokenProvider, UploadedImage,
};
use reqwest::{
    multipart::{Form, Part},
    Client, Url,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Hosting for the images referenced by asset-backed records.
#[async_trait::async_trait]
pub trait ImageStore: Send + Sync {
    /// Upload an image with the configured unsigned preset and return its
    /// public delivery URL.
    async fn upload(&self, file: ImageFile) -> FolioResult<UploadedImage>;

    /// Delete the image behind a delivery URL. URLs that are not served by
    /// the image host are skipped without any request.
    async fn delete_by_url(&self, image_url: &str) -> FolioResult<ImageDeletion>;
}

/// `ImageStore` that uploads straight to Cloudinary and deletes through the
/// backend's signed proxy.
pub struct CloudinaryImageStore {
    client: Client,
    upload_url: String,
    upload_preset: String,
    api_key: Option<String>,
    destroy_url: String,
    delivery_host: String,
    tokens: Arc<dyn TokenProvider>,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

impl CloudinaryImageStore {
    pub fn new(config: &FolioConfig, tokens: Arc<dyn TokenProvider>) -> FolioResult<Self> {
        Ok(Self {
            client: config.http_client()?,
            upload_url: config.upload_url(),
            upload_preset: config.upload_preset.clone(),
            api_key: config.api_key.clone(),
            destroy_url: format!("{}/cloudinary/destroy", config.api_base_url),
            delivery_host: config.delivery_host.clone(),
            tokens,
        })
    }

    fn form(&self, file: ImageFile) -> FolioResult<Form> {
        let content_type = file.content_type().to_string();
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&content_type)
            .map_err(|e| FolioError::Upload(format!("invalid content type: {e}")))?;

        let mut form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());
        if let Some(api_key) = &self.api_key {
            form = form.text("api_key", api_key.clone());
        }
        Ok(form)
    }
}

#[async_trait::async_trait]
impl ImageStore for CloudinaryImageStore {
    async fn upload(&self, file: ImageFile) -> FolioResult<UploadedImage> {
        let file_name = file.file_name.clone();
        let form = self.form(file)?;

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| FolioError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FolioError::Upload(failure_reason(status_error(response).await)));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| FolioError::Upload(format!("unreadable upload response: {e}")))?;
        let url = body
            .secure_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| FolioError::Upload("response did not include a delivery URL".into()))?;

        debug!(file = %file_name, %url, "image uploaded");
        Ok(UploadedImage { url })
    }

    async fn delete_by_url(&self, image_url: &str) -> FolioResult<ImageDeletion> {
        let Some(public_id) = public_id_from_url(image_url, &self.delivery_host) else {
            debug!(url = %image_url, "not a hosted image, skipping deletion");
            return Ok(ImageDeletion::Skipped);
        };

        let request = self
            .client
            .delete(format!("{}/{public_id}", self.destroy_url));
        if let Err(error) = send_authed(self.tokens.as_ref(), request).await {
            return Err(match error {
                FolioError::AuthRequired => FolioError::AuthRequired,
                error => FolioError::ImageDelete(failure_reason(error)),
            });
        }

        debug!(%public_id, "image deleted");
        Ok(ImageDeletion::Deleted(public_id))
    }
}

/// The backend's own words for a failed request, without our prefixes.
fn failure_reason(error: FolioError) -> String {
    match error {
        FolioError::Validation(reason)
        | FolioError::Unauthorized(reason)
        | FolioError::NotFound(reason)
        | FolioError::RateLimited(reason)
        | FolioError::StatusCode(_, reason) => reason,
        FolioError::Transport(error) => error.to_string(),
        other => other.to_string(),
    }
}

/// Public id of a hosted image: the last path segment of its delivery URL
/// without the extension. `None` for URLs on any other host.
///
/// ```
/// use folio_sdk::public_id_from_url;
///
/// assert_eq!(
///     public_id_from_url(
///         "https://res.cloudinary.com/acct/image/upload/v1/abc123.jpg",
///         "res.cloudinary.com",
///     ),
///     Some("abc123".to_string())
/// );
/// assert_eq!(public_id_from_url("https://placehold.co/600x400.png", "res.cloudinary.com"), None);
/// ```
#[must_use]
pub fn public_id_from_url(image_url: &str, delivery_host: &str) -> Option<String> {
    let url = Url::parse(image_url.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let delivery_host = delivery_host.to_ascii_lowercase();
    let on_host = host == delivery_host || host.ends_with(&format!(".{delivery_host}"));
    if !on_host {
        return None;
    }

    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let stem = match segment.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => segment,
    };
    (!stem.is_empty()).then(|| stem.to_string())
}
