//! Mapping between blob URLs and storage paths.

use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Microseconds since the epoch, strictly increasing within the process.
fn next_stamp() -> i64 {
    let now = Utc::now().timestamp_micros();
    let mut last = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let next = if now > last { now } else { last + 1 };
        match LAST_STAMP.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Storage name for a new upload: a unique stamp plus the original extension.
pub fn unique_object_name(file_name: &str) -> String {
    let stamp = next_stamp();
    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", stamp, ext),
        _ => stamp.to_string(),
    }
}

/// Recover the storage path of a blob from its public URL.
///
/// The path is everything after the first `/<bucket>/`, percent-decoded.
/// Returns `None` when the marker is missing or nothing follows it.
pub fn storage_path_from_url(url: &str, bucket: &str) -> Option<String> {
    let marker = format!("/{}/", bucket);
    let start = url.find(&marker)? + marker.len();
    let decoded = urlencoding::decode(&url[start..]).ok()?;
    if decoded.is_empty() {
        None
    } else {
        Some(decoded.into_owned())
    }
}
