mod auth;
mod client_utils;
mod config;
mod errors;
pub mod folio_sdk_test;
mod image_store;
mod record_store;
mod session;
mod types;
mod types_ext;

pub use auth::AuthClient;
pub use config::FolioConfig;
pub use errors::*;
pub use image_store::{public_id_from_url, CloudinaryImageStore, ImageStore};
pub use record_store::{HttpRecordStore, RecordStore};
pub use reqwest::StatusCode;
pub use session::{Session, SessionListener, TokenProvider};
pub use types::*;
pub use types_ext::AssetPayload;
