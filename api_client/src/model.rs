//! Media rows as they travel between the gallery and the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel used by callers to mean "no category filter".
pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify an upload by its MIME type; anything that is not `video/*` is an image.
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("video") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(format!("unknown visibility: {}", other)),
        }
    }
}

/// Item category. The named variants are the ones offered for uploads and
/// filters; any other value stored on a row is kept as [`Category::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    #[default]
    Art,
    Photography,
    Nature,
    Technology,
    Abstract,
    Other,
    Custom(String),
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Art,
        Category::Photography,
        Category::Nature,
        Category::Technology,
        Category::Abstract,
        Category::Other,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Category::Art => "Art",
            Category::Photography => "Photography",
            Category::Nature => "Nature",
            Category::Technology => "Technology",
            Category::Abstract => "Abstract",
            Category::Other => "Other",
            Category::Custom(name) => name,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse for user input: only the named variants are accepted.
impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        value.parse().unwrap_or(Category::Custom(value))
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        match value {
            Category::Custom(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// Ordered set of tags. Entries are trimmed, never empty and never repeated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.as_ref().trim();
            if !tag.is_empty() && !out.iter().any(|t| t == tag) {
                out.push(tag.to_string());
            }
        }
        Tags(out)
    }

    /// Parse comma-separated user input, e.g. `"sunset, beach"`.
    pub fn parse_list(input: &str) -> Self {
        Tags::new(input.split(','))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Tags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<Vec<String>> = Option::deserialize(deserializer)?;
        Ok(Tags::new(raw.unwrap_or_default()))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub likes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<Comment>>,
}

/// A media item as stored in the `media_items` table.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MediaItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
    pub thumbnail_url: String,
    pub title: String,
    pub description: String,
    pub uploader: String,
    pub created_at: DateTime<Utc>,
    pub category: Category,
    pub tags: Tags,
    pub external_link: Option<String>,
    pub allow_download: bool,
    pub visibility: Visibility,
    pub likes: u64,
    pub downloads: u64,
    pub comments: Vec<Comment>,
}

#[derive(Deserialize)]
struct MediaRow {
    id: String,
    #[serde(rename = "type")]
    kind: MediaKind,
    url: String,
    thumbnail_url: Option<String>,
    title: String,
    description: Option<String>,
    uploader: String,
    created_at: DateTime<Utc>,
    category: Category,
    #[serde(default)]
    tags: Tags,
    external_link: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    allow_download: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    visibility: Visibility,
    #[serde(default, deserialize_with = "null_as_default")]
    likes: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    downloads: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    comments: Vec<Comment>,
}

impl<'de> Deserialize<'de> for MediaItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let row = MediaRow::deserialize(deserializer)?;
        let thumbnail_url = row
            .thumbnail_url
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| row.url.clone());
        Ok(MediaItem {
            id: row.id,
            kind: row.kind,
            url: row.url,
            thumbnail_url,
            title: row.title,
            description: row.description.unwrap_or_default(),
            uploader: row.uploader,
            created_at: row.created_at,
            category: row.category,
            tags: row.tags,
            external_link: row.external_link,
            allow_download: row.allow_download,
            visibility: row.visibility,
            likes: row.likes,
            downloads: row.downloads,
            comments: row.comments,
        })
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Row sent on insert. Identity, timestamps and counters are assigned by the backend.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct NewMediaRow {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
    pub thumbnail_url: String,
    pub title: String,
    pub description: String,
    pub uploader: String,
    pub category: Category,
    pub tags: Tags,
    pub external_link: Option<String>,
    pub allow_download: bool,
    pub visibility: Visibility,
}

/// Partial update of the mutable columns. Only `Some` fields are sent.
///
/// `external_link` distinguishes "leave alone" (`None`) from "clear"
/// (`Some(None)`), which is sent as JSON `null`.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct MediaPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_link: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_download: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

impl MediaPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.tags.is_none()
            && self.external_link.is_none()
            && self.allow_download.is_none()
            && self.visibility.is_none()
    }

    /// Apply the patch to a local copy, the way the backend applies it to the row.
    pub fn apply_to(&self, item: &mut MediaItem) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(category) = &self.category {
            item.category = category.clone();
        }
        if let Some(tags) = &self.tags {
            item.tags = tags.clone();
        }
        if let Some(link) = &self.external_link {
            item.external_link = link.clone();
        }
        if let Some(allow) = self.allow_download {
            item.allow_download = allow;
        }
        if let Some(visibility) = self.visibility {
            item.visibility = visibility;
        }
    }
}
