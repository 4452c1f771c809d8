use httptest::{matchers::*, responders::*, Expectation};
use serde_json::{json, Value};

pub use httptest::Server;

const ROWS_PATH: &str = "/rest/v1/media_items";

/// Start an empty mock server for the backend REST surface.
pub fn backend_server() -> Server {
    Server::run()
}

/// A complete `media_items` row as the backend returns it.
pub fn row_json(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "type": "image",
        "url": format!("https://mock.local/storage/v1/object/public/media/{}.jpg", id),
        "thumbnail_url": format!("https://mock.local/storage/v1/object/public/media/{}.jpg", id),
        "title": title,
        "description": "desc",
        "uploader": "tester",
        "created_at": "2024-01-01T00:00:00Z",
        "category": "Art",
        "tags": ["one", "two"],
        "external_link": null,
        "allow_download": true,
        "visibility": "public",
        "likes": 1,
        "downloads": 2,
        "comments": []
    })
}

/// Expect one `GET /rest/v1/media_items` and answer with `rows` and a `Content-Range` header.
pub fn expect_select(server: &Server, rows: Vec<Value>, content_range: &str) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", ROWS_PATH),
            request::headers(contains(key("apikey"))),
        ])
        .respond_with(
            status_code(200)
                .append_header("content-type", "application/json")
                .append_header("content-range", content_range.to_string())
                .body(Value::Array(rows).to_string()),
        ),
    );
}

pub fn expect_insert(server: &Server, returned: Value) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", ROWS_PATH),
            request::headers(contains(key("prefer"))),
        ])
        .respond_with(status_code(201).body(json!([returned]).to_string())),
    );
}

pub fn expect_update(server: &Server, id: &str, returned: Value) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PATCH", ROWS_PATH),
            request::query(url_decoded(contains(("id", eq(format!("eq.{}", id)))))),
        ])
        .respond_with(status_code(200).body(json!([returned]).to_string())),
    );
}

pub fn expect_delete_row(server: &Server, id: &str, status: u16) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("DELETE", ROWS_PATH),
            request::query(url_decoded(contains(("id", eq(format!("eq.{}", id)))))),
        ])
        .respond_with(status_code(status)),
    );
}

pub fn expect_increment(server: &Server, id: &str, status: u16) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/rest/v1/rpc/increment_downloads"),
            request::body(json_decoded(eq(json!({ "item_id": id })))),
        ])
        .respond_with(status_code(status)),
    );
}

pub fn expect_upload(server: &Server, path: &str, status: u16) {
    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path(eq(format!("/storage/v1/object/media/{}", path))),
        ])
        .respond_with(status_code(status).body(json!({ "Key": format!("media/{}", path) }).to_string())),
    );
}

pub fn expect_remove_blob(server: &Server, path: &str, status: u16) {
    server.expect(
        Expectation::matching(all_of![
            request::method_path("DELETE", "/storage/v1/object/media"),
            request::body(json_decoded(eq(json!({ "prefixes": [path] })))),
        ])
        .respond_with(status_code(status).body("[]")),
    );
}
