//! Test doubles for the media backend.
//!
//! [`MemoryBackend`] implements [`api_client::Backend`] in memory with failure
//! injection, call accounting and response gating. The `http` helpers stand up
//! `httptest` servers that speak the REST surface used by `ApiClient`.

mod http;
mod memory;

pub use http::{
    backend_server, expect_delete_row, expect_increment, expect_insert, expect_remove_blob,
    expect_select, expect_update, expect_upload, row_json, Server,
};
pub use httptest::{all_of, matchers, responders, Expectation};
pub use memory::{sample_item, sample_items, Gate, MemoryBackend, Op, MOCK_BASE_URL};
