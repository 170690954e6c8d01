use std::time::Duration;

use serde::{Deserialize, Serialize};
use spdlog::{info, warn};

use crate::content::{self, ContentFormat};
use crate::error::{PublishError, Result};
use crate::page_id::PageId;
use crate::page_store::PageStore;

/// Ids tried before giving up on an upload.
pub const MAX_ID_ATTEMPTS: u32 = 5;
const BASE_BACKOFF: Duration = Duration::from_millis(10);

/// Upload body as it arrives on the wire. Everything is optional here so
/// missing fields come back as a validation error instead of a parse error.
#[derive(Debug, Default, Deserialize)]
pub struct UploadRequest {
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    #[serde(rename = "themeCSS")]
    pub theme_css: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
}

/// A checked upload, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub content: String,
    pub format: ContentFormat,
    pub theme_css: Option<String>,
}

impl TryFrom<UploadRequest> for Upload {
    type Error = PublishError;

    fn try_from(req: UploadRequest) -> Result<Upload> {
        let content = match req.content {
            Some(content) if !content.is_empty() => content,
            _ => return Err(PublishError::Validation("content is required".to_string())),
        };
        let format = match req.content_type.as_deref() {
            None | Some("") => return Err(PublishError::Validation("type is required".to_string())),
            Some(content_type) => content_type.parse()?,
        };

        Ok(Upload {
            content,
            format,
            theme_css: req.theme_css,
        })
    }
}

pub async fn publish(store: &PageStore, upload: &Upload) -> Result<PageId> {
    publish_with(store, upload, PageId::generate).await
}

/// Renders the upload and stores it under a fresh id from `next_id`.
///
/// When the id is already taken on disk another one is drawn, waiting
/// 10ms, 20ms, 40ms... in between, up to [`MAX_ID_ATTEMPTS`] ids.
pub async fn publish_with<F>(store: &PageStore, upload: &Upload, mut next_id: F) -> Result<PageId>
where
    F: FnMut() -> Result<PageId>,
{
    let page = content::render(&upload.content, upload.format, upload.theme_css.as_deref())?;

    let mut attempt = 0;
    loop {
        let id = next_id()?;
        match store.create(&id, &page.raw, &page.html) {
            Ok(()) => {
                info!("Published {} page {}", upload.format, id);
                return Ok(id);
            }
            Err(PublishError::IdCollision(taken)) if attempt + 1 < MAX_ID_ATTEMPTS => {
                warn!("Page id {} already taken, drawing another", taken);
                tokio::time::sleep(BASE_BACKOFF * 2u32.pow(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
