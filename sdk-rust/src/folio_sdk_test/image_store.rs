use super::CallLog;
use crate::{
    public_id_from_url, FolioError, FolioResult, ImageDeletion, ImageFile, ImageStore,
    UploadedImage,
};
use std::{collections::VecDeque, sync::Mutex};

const MOCK_DELIVERY_HOST: &str = "res.cloudinary.com";

/// Result for a mocked `upload` call.
/// It can either be an uploaded image or an error to return.
pub enum MockUploadResult {
    Uploaded(UploadedImage),
    Error(FolioError),
}

impl MockUploadResult {
    /// Construct a result that yields an image at `url`.
    pub fn url(url: impl Into<String>) -> Self {
        Self::Uploaded(UploadedImage { url: url.into() })
    }

    /// Construct a result that yields the provided error.
    pub fn error(error: FolioError) -> Self {
        Self::Error(error)
    }
}

impl From<UploadedImage> for MockUploadResult {
    fn from(image: UploadedImage) -> Self {
        Self::Uploaded(image)
    }
}

impl From<FolioError> for MockUploadResult {
    fn from(error: FolioError) -> Self {
        Self::Error(error)
    }
}

#[derive(Default)]
struct MockImageStoreState {
    mocked_upload_results: VecDeque<MockUploadResult>,
    mocked_delete_errors: VecDeque<FolioError>,
    tracked_uploads: Vec<ImageFile>,
    tracked_deletes: Vec<String>,
    skipped_deletes: Vec<String>,
}

impl MockImageStoreState {
    fn reset(&mut self) {
        self.tracked_uploads.clear();
        self.tracked_deletes.clear();
        self.skipped_deletes.clear();
    }

    fn restore(&mut self) {
        self.mocked_upload_results.clear();
        self.mocked_delete_errors.clear();
        self.reset();
    }
}

/// An image store that never leaves the process.
///
/// Uploads without an enqueued result succeed with a delivery URL derived
/// from the file name. Deletions apply the same host check as the real
/// client: foreign URLs are recorded as skipped and never count as a request.
#[derive(Default)]
pub struct MockImageStore {
    state: Mutex<MockImageStoreState>,
    call_log: Option<CallLog>,
}

impl MockImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also append every request to a shared log.
    #[must_use]
    pub fn with_call_log(mut self, call_log: CallLog) -> Self {
        self.call_log = Some(call_log);
        self
    }

    /// Enqueue the result of the next upload.
    pub fn enqueue_upload<R>(&self, result: R) -> &Self
    where
        R: Into<MockUploadResult>,
    {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.mocked_upload_results.push_back(result.into());
        drop(state);
        self
    }

    /// Make the next deletion that reaches the host fail.
    pub fn enqueue_delete_error(&self, error: FolioError) -> &Self {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.mocked_delete_errors.push_back(error);
        drop(state);
        self
    }

    /// Files received by `upload`.
    pub fn tracked_uploads(&self) -> Vec<ImageFile> {
        let state = self.state.lock().expect("mock state poisoned");
        state.tracked_uploads.clone()
    }

    /// Public ids sent for deletion.
    pub fn tracked_deletes(&self) -> Vec<String> {
        let state = self.state.lock().expect("mock state poisoned");
        state.tracked_deletes.clone()
    }

    /// URLs that were skipped because they are not hosted images.
    pub fn skipped_deletes(&self) -> Vec<String> {
        let state = self.state.lock().expect("mock state poisoned");
        state.skipped_deletes.clone()
    }

    /// Reset tracked calls without touching enqueued results.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.reset();
    }

    /// Clear both tracked calls and enqueued results.
    pub fn restore(&self) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.restore();
    }

    fn log(&self, entry: &str) {
        if let Some(call_log) = &self.call_log {
            call_log.push(entry);
        }
    }
}

#[async_trait::async_trait]
impl ImageStore for MockImageStore {
    async fn upload(&self, file: ImageFile) -> FolioResult<UploadedImage> {
        self.log("image.upload");
        let mut state = self.state.lock().expect("mock state poisoned");
        let default_url = format!(
            "https://{MOCK_DELIVERY_HOST}/mock/image/upload/v1/{}",
            file.file_name
        );
        state.tracked_uploads.push(file);

        match state.mocked_upload_results.pop_front() {
            Some(MockUploadResult::Uploaded(image)) => Ok(image),
            Some(MockUploadResult::Error(error)) => Err(error),
            None => Ok(UploadedImage { url: default_url }),
        }
    }

    async fn delete_by_url(&self, image_url: &str) -> FolioResult<ImageDeletion> {
        let mut state = self.state.lock().expect("mock state poisoned");
        let Some(public_id) = public_id_from_url(image_url, MOCK_DELIVERY_HOST) else {
            state.skipped_deletes.push(image_url.to_string());
            return Ok(ImageDeletion::Skipped);
        };

        self.log("image.delete");
        state.tracked_deletes.push(public_id.clone());
        match state.mocked_delete_errors.pop_front() {
            Some(error) => Err(error),
            None => Ok(ImageDeletion::Deleted(public_id)),
        }
    }
}
