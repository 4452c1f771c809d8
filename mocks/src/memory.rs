use api_client::{
    ApiClientError, Backend, Category, Column, CountMode, Filter, MediaItem, MediaKind,
    MediaPatch, NewMediaRow, Order, RowPage, RowQuery, Tags, Visibility,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

pub const MOCK_BASE_URL: &str = "https://mock.local";

/// Backend operations, used for failure injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Select,
    Insert,
    Update,
    DeleteRow,
    Increment,
    Upload,
    RemoveBlob,
}

/// Holds a `select` until the test releases it.
#[derive(Clone, Default)]
pub struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    /// Wait until the gated request has reached the backend.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Default)]
struct Inner {
    rows: Vec<MediaItem>,
    blobs: HashMap<String, Vec<u8>>,
    failures: HashSet<Op>,
    calls: Vec<Op>,
    next_id: u64,
    gate: Option<Gate>,
}

/// In-memory stand-in for the hosted backend.
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<MediaItem>) -> Self {
        let backend = Self::default();
        backend.lock().rows = items;
        backend
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every subsequent call of `op` fail with a 500.
    pub fn fail(&self, op: Op) {
        self.lock().failures.insert(op);
    }

    pub fn recover(&self, op: Op) {
        self.lock().failures.remove(&op);
    }

    /// Gate the next `select`; it will not answer until [`Gate::release`].
    pub fn hold_next_select(&self) -> Gate {
        let gate = Gate::default();
        self.lock().gate = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Op> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| **c == op).count()
    }

    pub fn rows(&self) -> Vec<MediaItem> {
        self.lock().rows.clone()
    }

    pub fn row(&self, id: &str) -> Option<MediaItem> {
        self.lock().rows.iter().find(|r| r.id == id).cloned()
    }

    pub fn blob_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.lock().blobs.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn put_blob(&self, path: &str, data: &[u8]) {
        self.lock().blobs.insert(path.to_string(), data.to_vec());
    }

    fn enter(&self, op: Op) -> Result<(), ApiClientError> {
        let mut inner = self.lock();
        inner.calls.push(op);
        if inner.failures.contains(&op) {
            return Err(ApiClientError::BackendError {
                status: 500,
                message: format!("injected {:?} failure", op),
            });
        }
        Ok(())
    }
}

fn column_text(item: &MediaItem, column: Column) -> String {
    match column {
        Column::Id => item.id.clone(),
        Column::Title => item.title.clone(),
        Column::Uploader => item.uploader.clone(),
        Column::Category => item.category.to_string(),
        Column::Tags => item.tags.as_slice().join(","),
        Column::CreatedAt => item.created_at.to_rfc3339(),
        Column::Likes => item.likes.to_string(),
        Column::Downloads => item.downloads.to_string(),
    }
}

fn matches(item: &MediaItem, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(column, value) => column_text(item, *column) == *value,
        Filter::ILike(column, needle) => column_text(item, *column)
            .to_lowercase()
            .contains(&needle.to_lowercase()),
        Filter::Contains(Column::Tags, values) => values.iter().all(|v| item.tags.contains(v)),
        Filter::Contains(_, _) => false,
        Filter::Or(inner) => inner.iter().any(|f| matches(item, f)),
    }
}

fn compare(a: &MediaItem, b: &MediaItem, order: &Order) -> Ordering {
    let ord = match order.column {
        Column::CreatedAt => a.created_at.cmp(&b.created_at),
        Column::Likes => a.likes.cmp(&b.likes),
        Column::Downloads => a.downloads.cmp(&b.downloads),
        column => column_text(a, column).cmp(&column_text(b, column)),
    };
    if order.descending {
        ord.reverse()
    } else {
        ord
    }
}

fn select_rows(all: &[MediaItem], query: &RowQuery) -> RowPage {
    let mut rows: Vec<MediaItem> = all
        .iter()
        .filter(|item| query.filters.iter().all(|f| matches(item, f)))
        .cloned()
        .collect();
    rows.sort_by(|a, b| {
        query
            .order
            .iter()
            .map(|o| compare(a, b, o))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    let total = match query.count {
        CountMode::Exact | CountMode::Planned => Some(rows.len() as u64),
        CountMode::None => None,
    };
    let rows = rows
        .into_iter()
        .skip(query.offset)
        .take(query.limit)
        .collect();
    RowPage { rows, total }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select(&self, query: &RowQuery) -> Result<RowPage, ApiClientError> {
        self.enter(Op::Select)?;
        let (page, gate) = {
            let mut inner = self.lock();
            (select_rows(&inner.rows, query), inner.gate.take())
        };
        // A gated select answers with the rows as they were when it arrived.
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        Ok(page)
    }

    async fn insert(&self, row: &NewMediaRow) -> Result<MediaItem, ApiClientError> {
        self.enter(Op::Insert)?;
        let mut inner = self.lock();
        inner.next_id += 1;
        let item = MediaItem {
            id: format!("new-{:04}", inner.next_id),
            kind: row.kind,
            url: row.url.clone(),
            thumbnail_url: row.thumbnail_url.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            uploader: row.uploader.clone(),
            created_at: Utc::now(),
            category: row.category.clone(),
            tags: row.tags.clone(),
            external_link: row.external_link.clone(),
            allow_download: row.allow_download,
            visibility: row.visibility,
            likes: 0,
            downloads: 0,
            comments: Vec::new(),
        };
        inner.rows.push(item.clone());
        Ok(item)
    }

    async fn update(&self, id: &str, patch: &MediaPatch) -> Result<MediaItem, ApiClientError> {
        self.enter(Op::Update)?;
        let mut inner = self.lock();
        let row = inner
            .rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ApiClientError::NotFound(id.to_string()))?;
        patch.apply_to(row);
        Ok(row.clone())
    }

    async fn delete_row(&self, id: &str) -> Result<(), ApiClientError> {
        self.enter(Op::DeleteRow)?;
        self.lock().rows.retain(|r| r.id != id);
        Ok(())
    }

    async fn increment_downloads(&self, id: &str) -> Result<(), ApiClientError> {
        self.enter(Op::Increment)?;
        if let Some(row) = self.lock().rows.iter_mut().find(|r| r.id == id) {
            row.downloads += 1;
        }
        Ok(())
    }

    async fn upload_blob(
        &self,
        path: &str,
        _content_type: &str,
        data: Vec<u8>,
    ) -> Result<(), ApiClientError> {
        self.enter(Op::Upload)?;
        let mut inner = self.lock();
        if inner.blobs.contains_key(path) {
            return Err(ApiClientError::BackendError {
                status: 409,
                message: "The resource already exists".into(),
            });
        }
        inner.blobs.insert(path.to_string(), data);
        Ok(())
    }

    fn public_url(&self, path: &str) -> Result<String, ApiClientError> {
        if path.is_empty() {
            return Err(ApiClientError::InvalidPath("empty storage path".into()));
        }
        Ok(format!(
            "{}/storage/v1/object/public/media/{}",
            MOCK_BASE_URL,
            path.replace(' ', "%20")
        ))
    }

    async fn remove_blob(&self, path: &str) -> Result<(), ApiClientError> {
        self.enter(Op::RemoveBlob)?;
        self.lock().blobs.remove(path);
        Ok(())
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Deterministic item number `n`; higher `n` is newer.
pub fn sample_item(n: u32) -> MediaItem {
    let id = format!("item-{:02}", n);
    let url = format!("{}/storage/v1/object/public/media/{}.jpg", MOCK_BASE_URL, id);
    MediaItem {
        id: id.clone(),
        kind: if n % 5 == 0 { MediaKind::Video } else { MediaKind::Image },
        url: url.clone(),
        thumbnail_url: url,
        title: format!("Landscape {}", n),
        description: format!("Sample item {}", n),
        uploader: format!("user{}", n % 3),
        created_at: base_time() + Duration::minutes(n as i64),
        category: Category::ALL[(n as usize) % Category::ALL.len()].clone(),
        tags: Tags::new([format!("tag{}", n % 4), "sample".to_string()]),
        external_link: None,
        allow_download: true,
        visibility: Visibility::Public,
        likes: u64::from((n * 7) % 11),
        downloads: u64::from((n * 3) % 13),
        comments: Vec::new(),
    }
}

/// Items `1..=count`.
pub fn sample_items(count: u32) -> Vec<MediaItem> {
    (1..=count).map(sample_item).collect()
}
