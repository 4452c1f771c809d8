//! Data access layer for the media gallery.
//!
//! [`Gallery`] keeps the in-memory item list for the current filter and sort,
//! turns caller intents into [`Backend`] calls, and reconciles the responses
//! through the [`state`] reducer.

pub mod optimistic;
pub mod state;
mod storage;
mod upload;

pub use state::{
    build_query, Action, CategoryFilter, Filters, GalleryState, PageRequest, SortOrder, Status,
    Transition, PAGE_SIZE,
};
pub use storage::{storage_path_from_url, unique_object_name};
pub use upload::{MediaBlob, NewMediaItem};

use api_client::{Backend, MediaItem, MediaPatch, DEFAULT_BUCKET};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("List Error: {0}")]
    ListFailed(String),
    #[error("Could not determine file path from URL: {0}")]
    PathResolution(String),
    #[error("Upload Error: {0}")]
    UploadFailed(String),
    #[error("Insert Error: {0}")]
    InsertFailed(String),
    #[error("Update Error: {0}")]
    UpdateFailed(String),
    #[error("Delete Error: {0}")]
    DeleteFailed(String),
    #[error("Download Count Error: {0}")]
    IncrementFailed(String),
    #[error("Invalid Input: {0}")]
    InvalidInput(String),
}

impl GalleryError {
    /// Short stable code for log fields.
    pub fn code(&self) -> &'static str {
        match self {
            GalleryError::ListFailed(_) => "list",
            GalleryError::PathResolution(_) => "path",
            GalleryError::UploadFailed(_) => "upload",
            GalleryError::InsertFailed(_) => "insert",
            GalleryError::UpdateFailed(_) => "update",
            GalleryError::DeleteFailed(_) => "delete",
            GalleryError::IncrementFailed(_) => "increment",
            GalleryError::InvalidInput(_) => "input",
        }
    }
}

/// Conditions worth showing to the user that do not fail an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum GalleryNotice {
    /// The blob could not be removed during a delete; the row was still deleted.
    BlobRemovalFailed { path: String, error: String },
    /// The optimistic download increment was rolled back.
    DownloadRolledBack { id: String, error: String },
}

/// Result of a list-level operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { added: usize, has_more: bool },
    /// Nothing to do: a load is already running or there are no more pages.
    Skipped,
    /// A newer list request was issued while this one was in flight.
    Superseded,
}

pub struct Gallery<B: Backend> {
    backend: Arc<B>,
    bucket: String,
    state: Mutex<GalleryState>,
    notices: Option<mpsc::UnboundedSender<GalleryNotice>>,
}

impl<B: Backend> Gallery<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Gallery {
            backend,
            bucket: DEFAULT_BUCKET.to_string(),
            state: Mutex::new(GalleryState::default()),
            notices: None,
        }
    }

    /// Storage bucket whose name marks the path inside blob URLs.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Initial filters and sort, applied without fetching.
    pub fn with_view(self, filters: Filters, sort: SortOrder) -> Self {
        {
            let mut state = self.lock();
            state.filters = filters;
            state.sort = sort;
        }
        self
    }

    pub fn with_notices(mut self, tx: mpsc::UnboundedSender<GalleryNotice>) -> Self {
        self.notices = Some(tx);
        self
    }

    fn lock(&self) -> MutexGuard<'_, GalleryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn dispatch(&self, action: Action) -> Transition {
        self.lock().update(action)
    }

    fn notify(&self, notice: GalleryNotice) {
        if let Some(tx) = &self.notices {
            if let Err(e) = tx.send(notice) {
                tracing::error!("Failed to forward notice: {}", e);
            }
        }
    }

    /// Copy of the current list state.
    pub fn snapshot(&self) -> GalleryState {
        self.lock().clone()
    }

    pub fn items(&self) -> Vec<MediaItem> {
        self.lock().items.clone()
    }

    pub fn has_more(&self) -> bool {
        self.lock().has_more
    }

    pub fn is_loading(&self) -> bool {
        self.lock().is_loading()
    }

    async fn run(&self, transition: Transition) -> Result<LoadOutcome, GalleryError> {
        let request = match transition {
            Transition::Fetch(request) => request,
            _ => return Ok(LoadOutcome::Skipped),
        };

        match self.backend.select(&request.query).await {
            Ok(result) => {
                let rows = result.rows.len();
                match self.dispatch(Action::PageLoaded {
                    generation: request.generation,
                    page: request.page,
                    result,
                }) {
                    Transition::Loaded { added, has_more } => {
                        tracing::info!(page = request.page, rows, added, has_more, "Loaded page");
                        Ok(LoadOutcome::Loaded { added, has_more })
                    }
                    _ => {
                        tracing::debug!(
                            page = request.page,
                            generation = request.generation,
                            "Discarded superseded page"
                        );
                        Ok(LoadOutcome::Superseded)
                    }
                }
            }
            Err(e) => {
                let current = self.dispatch(Action::PageFailed {
                    generation: request.generation,
                }) != Transition::Stale;
                tracing::error!(page = request.page, error = %e, "Failed to fetch media items");
                if current {
                    Err(GalleryError::ListFailed(e.to_string()))
                } else {
                    Ok(LoadOutcome::Superseded)
                }
            }
        }
    }

    /// Reload page 1 for the current filters and sort.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn refresh(&self) -> Result<LoadOutcome, GalleryError> {
        let transition = self.dispatch(Action::Refresh);
        self.run(transition).await
    }

    /// Replace the filters and reload from page 1.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn set_filters(&self, filters: Filters) -> Result<LoadOutcome, GalleryError> {
        let transition = self.dispatch(Action::SetFilters(filters));
        self.run(transition).await
    }

    /// Change only the search text, keeping the category.
    pub async fn set_search(&self, search: Option<String>) -> Result<LoadOutcome, GalleryError> {
        let mut filters = self.lock().filters.clone();
        filters.search = search;
        self.set_filters(filters).await
    }

    /// Change only the category, keeping the search text.
    pub async fn set_category(
        &self,
        category: CategoryFilter,
    ) -> Result<LoadOutcome, GalleryError> {
        let mut filters = self.lock().filters.clone();
        filters.category = category;
        self.set_filters(filters).await
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn set_sort(&self, sort: SortOrder) -> Result<LoadOutcome, GalleryError> {
        let transition = self.dispatch(Action::SetSort(sort));
        self.run(transition).await
    }

    /// Append the next page. Skipped while loading or when no pages remain.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn load_more(&self) -> Result<LoadOutcome, GalleryError> {
        let transition = self.dispatch(Action::LoadMore);
        self.run(transition).await
    }

    /// Upload `blob`, insert its metadata row and prepend the stored item.
    ///
    /// If the insert fails after the upload succeeded the blob stays in
    /// storage; nothing is added to the list. An item added while page 1 is
    /// loading stays at the front when that page arrives.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, blob)))]
    pub async fn add(&self, item: NewMediaItem, blob: MediaBlob) -> Result<MediaItem, GalleryError> {
        if blob.data.is_empty() {
            return Err(GalleryError::InvalidInput(format!(
                "no file content for {}",
                blob.file_name
            )));
        }

        let path = unique_object_name(&blob.file_name);
        self.backend
            .upload_blob(&path, &blob.content_type, blob.data)
            .await
            .map_err(|e| {
                tracing::error!(path = %path, error = %e, "Error uploading file");
                GalleryError::UploadFailed(e.to_string())
            })?;

        let url = self.backend.public_url(&path).map_err(|e| {
            tracing::error!(path = %path, error = %e, "Could not get public URL for uploaded file");
            GalleryError::UploadFailed(e.to_string())
        })?;

        let stored = self
            .backend
            .insert(&item.into_row(url))
            .await
            .map_err(|e| {
                tracing::warn!(path = %path, error = %e, "Insert failed, uploaded blob left in storage");
                GalleryError::InsertFailed(e.to_string())
            })?;

        tracing::info!(id = %stored.id, path = %path, "Uploaded media item");
        self.dispatch(Action::Prepend(stored.clone()));
        Ok(stored)
    }

    /// Update the given fields and replace the local item with the stored row.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, patch)))]
    pub async fn edit(&self, id: &str, patch: MediaPatch) -> Result<MediaItem, GalleryError> {
        if patch.is_empty() {
            return Err(GalleryError::InvalidInput("no fields to update".into()));
        }

        let updated = self.backend.update(id, &patch).await.map_err(|e| {
            tracing::error!(id, error = %e, "Error updating item");
            GalleryError::UpdateFailed(e.to_string())
        })?;

        self.dispatch(Action::Replace(updated.clone()));
        Ok(updated)
    }

    /// Count a download: bump the local counter now, roll it back if the
    /// server-side increment fails.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn increment_downloads(&self, id: &str) -> Result<(), GalleryError> {
        let backend = Arc::clone(&self.backend);
        let result = optimistic::mutate(
            1,
            |delta| {
                self.dispatch(Action::AdjustDownloads {
                    id: id.to_string(),
                    delta,
                });
            },
            backend.increment_downloads(id),
        )
        .await;

        result.map_err(|e| {
            tracing::error!(id, error = %e, "Error incrementing downloads");
            self.notify(GalleryNotice::DownloadRolledBack {
                id: id.to_string(),
                error: e.to_string(),
            });
            GalleryError::IncrementFailed(e.to_string())
        })
    }

    /// Delete the blob behind `url` and then the row `id`.
    ///
    /// A failed blob removal is reported as a notice and the row is still
    /// deleted. A failed row deletion leaves the item in place.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn delete(&self, id: &str, url: &str) -> Result<(), GalleryError> {
        let path = storage_path_from_url(url, &self.bucket).ok_or_else(|| {
            tracing::error!(id, url, "Could not determine file path from URL");
            GalleryError::PathResolution(url.to_string())
        })?;

        if let Err(e) = self.backend.remove_blob(&path).await {
            tracing::warn!(id, path = %path, error = %e, "Error deleting file from storage, continuing");
            self.notify(GalleryNotice::BlobRemovalFailed {
                path: path.clone(),
                error: e.to_string(),
            });
        }

        self.backend.delete_row(id).await.map_err(|e| {
            tracing::error!(id, error = %e, "Error deleting item from database");
            GalleryError::DeleteFailed(e.to_string())
        })?;

        self.dispatch(Action::Remove(id.to_string()));
        tracing::info!(id, path = %path, "Deleted media item");
        Ok(())
    }
}
