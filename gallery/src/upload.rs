use api_client::{Category, MediaKind, NewMediaRow, Tags, Visibility};
use std::path::Path;

/// The binary file of an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaBlob {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl MediaBlob {
    /// Build a blob, guessing its content type from the file extension.
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        MediaBlob {
            file_name,
            content_type,
            data,
        }
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.content_type)
    }

    /// File name without its final extension, e.g. `a.b` for `a.b.jpg`.
    pub fn stem(&self) -> String {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name)
            .to_string()
    }
}

/// Caller-supplied metadata for a new item.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMediaItem {
    pub kind: MediaKind,
    pub title: String,
    pub description: String,
    pub uploader: String,
    pub category: Category,
    pub tags: Tags,
    pub external_link: Option<String>,
    pub allow_download: bool,
    pub visibility: Visibility,
}

impl NewMediaItem {
    /// Defaults for an upload of `blob`: titled after the file, public, downloadable.
    pub fn for_blob(blob: &MediaBlob, uploader: impl Into<String>) -> Self {
        NewMediaItem {
            kind: blob.kind(),
            title: blob.stem(),
            description: String::new(),
            uploader: uploader.into(),
            category: Category::default(),
            tags: Tags::default(),
            external_link: None,
            allow_download: true,
            visibility: Visibility::Public,
        }
    }

    pub(crate) fn into_row(self, url: String) -> NewMediaRow {
        NewMediaRow {
            kind: self.kind,
            thumbnail_url: url.clone(),
            url,
            title: self.title,
            description: self.description,
            uploader: self.uploader,
            category: self.category,
            tags: self.tags,
            external_link: self.external_link.filter(|l| !l.trim().is_empty()),
            allow_download: self.allow_download,
            visibility: self.visibility,
        }
    }
}
