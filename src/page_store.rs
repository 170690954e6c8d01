use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use spdlog::{info, warn};

use crate::error::{PublishError, Result};
use crate::page_id::PageId;

/// Raw submission, kept so the operator can download what they pasted.
pub const SOURCE_FILE: &str = "source.txt";
/// Rendered document, served verbatim at `/<id>/`.
pub const INDEX_FILE: &str = "index.html";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageEntry {
    pub id: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Pages on disk, one directory per page under `root_dir`:
///
/// ```text
/// <root_dir>/<id>/source.txt
/// <root_dir>/<id>/index.html
/// ```
///
/// There is no locking. Concurrent operations on the same id race at the
/// filesystem level.
pub struct PageStore {
    root_dir: PathBuf,
}

impl PageStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> PageStore {
        PageStore { root_dir: root_dir.into() }
    }

    /// Like [`PageStore::new`], creating the storage root when it is missing.
    pub fn open(root_dir: impl Into<PathBuf>) -> Result<PageStore> {
        let store = Self::new(root_dir);
        fs::create_dir_all(&store.root_dir)
            .map_err(|e| PublishError::io("failed to create storage root", &store.root_dir, e))?;
        Ok(store)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Writes a new page. Fails with [`PublishError::IdCollision`] when the
    /// directory already exists, so the caller can pick another id.
    ///
    /// The two writes are not atomic: a failure on the second leaves a page
    /// with only its source behind (see [`PageStore::find_incomplete`]).
    pub fn create(&self, id: &PageId, raw: &str, rendered: &str) -> Result<()> {
        let page_dir = self.root_dir.join(id.as_str());
        if let Err(e) = fs::create_dir(&page_dir) {
            return Err(match e.kind() {
                ErrorKind::AlreadyExists => PublishError::IdCollision(id.to_string()),
                _ => PublishError::io("failed to create content directory", page_dir, e),
            });
        }

        let source_path = page_dir.join(SOURCE_FILE);
        fs::write(&source_path, raw.as_bytes())
            .map_err(|e| PublishError::io("failed to write raw source file", &source_path, e))?;

        let index_path = page_dir.join(INDEX_FILE);
        fs::write(&index_path, rendered.as_bytes())
            .map_err(|e| PublishError::io("failed to write rendered html file", &index_path, e))?;

        Ok(())
    }

    /// Every page directory with its modification time, oldest first.
    ///
    /// Entries that disappear or can't be inspected while listing (a delete
    /// running at the same time) are logged and left out.
    pub fn list(&self) -> Result<Vec<PageEntry>> {
        let mut pages = vec![];
        for path in self.page_dirs()? {
            let Some(id) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let modified = match fs::metadata(&path).and_then(|meta| meta.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("Error getting info for {}: {}", path.display(), e);
                    continue;
                }
            };
            pages.push(PageEntry {
                id: id.to_string(),
                created_at: DateTime::<Utc>::from(modified),
            });
        }

        pages.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
        });
        Ok(pages)
    }

    /// Removes a page and everything in it. Not reversible.
    pub fn delete(&self, id: &str) -> Result<()> {
        let id = PageId::parse(id)?;
        let page_dir = self.root_dir.join(id.as_str());
        if !page_dir.is_dir() {
            return Err(PublishError::NotFound("Page not found".to_string()));
        }

        fs::remove_dir_all(&page_dir)
            .map_err(|e| PublishError::io("failed to delete page", page_dir, e))
    }

    /// Location of the raw source for a page.
    pub fn source_path(&self, id: &str) -> Result<PathBuf> {
        self.page_file(id, SOURCE_FILE, "Source file not found")
    }

    /// Location of the rendered document for a page.
    pub fn rendered_path(&self, id: &str) -> Result<PathBuf> {
        self.page_file(id, INDEX_FILE, "Page not found")
    }

    /// Ids of pages missing their source or their rendered document, which is
    /// what an interrupted [`PageStore::create`] leaves behind. Only directories
    /// named like a generated id are considered; anything else in the root
    /// belongs to the operator.
    pub fn find_incomplete(&self) -> Result<Vec<String>> {
        let mut incomplete = vec![];
        for path in self.page_dirs()? {
            let Some(id) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !PageId::is_generated(id) {
                continue;
            }
            if path.join(SOURCE_FILE).is_file() && path.join(INDEX_FILE).is_file() {
                continue;
            }
            incomplete.push(id.to_string());
        }
        incomplete.sort();
        Ok(incomplete)
    }

    /// Deletes whatever [`PageStore::find_incomplete`] reports and returns the
    /// ids actually removed. A page that can't be removed is logged and kept.
    pub fn prune_incomplete(&self) -> Result<Vec<String>> {
        let mut removed = vec![];
        for id in self.find_incomplete()? {
            match self.delete(&id) {
                Ok(()) => {
                    info!("Removed incomplete page {}", id);
                    removed.push(id);
                }
                Err(e) => warn!("Could not remove incomplete page {}: {}", id, e),
            }
        }
        Ok(removed)
    }

    fn page_file(&self, id: &str, file_name: &str, not_found: &str) -> Result<PathBuf> {
        let id = PageId::parse(id)?;
        let path = self.root_dir.join(id.as_str()).join(file_name);
        if !path.is_file() {
            return Err(PublishError::NotFound(not_found.to_string()));
        }
        Ok(path)
    }

    // Immediate subdirectories of the root. A stray `index.html` directory is
    // never a page.
    fn page_dirs(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.root_dir)
            .map_err(|e| PublishError::io("failed to read storage root", &self.root_dir, e))?;

        let mut dirs = vec![];
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error reading entry in {}: {}", self.root_dir.display(), e);
                    continue;
                }
            };
            if entry.file_name() == INDEX_FILE {
                continue;
            }
            match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => dirs.push(entry.path()),
                Ok(_) => {}
                Err(e) => warn!("Error getting info for {}: {}", entry.path().display(), e),
            }
        }
        Ok(dirs)
    }
}
