use api_client::{
    ApiClient, ApiClientError, Backend, Category, ClientConfig, Column, Filter, MediaKind,
    MediaPatch, NewMediaRow, Order, RowQuery, Tags, Visibility,
};
use mocks::matchers::*;
use mocks::responders::*;
use mocks::{all_of, backend_server, row_json, Expectation, Server};

fn client_for(server: &Server) -> ApiClient {
    ApiClient::new(ClientConfig::new(server.url_str("/"), "test-key"))
}

#[tokio::test]
async fn test_select_reads_rows_and_total() {
    let server = backend_server();
    mocks::expect_select(
        &server,
        vec![row_json("1", "First"), row_json("2", "Second")],
        "0-1/15",
    );

    let client = client_for(&server);
    let query = RowQuery::new(0, 12).order_by(Order::desc(Column::CreatedAt));
    let page = client.select(&query).await.unwrap();
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.rows[0].title, "First");
    assert_eq!(page.total, Some(15));
}

#[tokio::test]
async fn test_select_keeps_rows_with_unlisted_category() {
    let server = backend_server();
    let mut travel = row_json("2", "Trip");
    travel["category"] = serde_json::json!("Travel");
    mocks::expect_select(&server, vec![row_json("1", "First"), travel], "0-1/2");

    let client = client_for(&server);
    let page = client.select(&RowQuery::new(0, 12)).await.unwrap();
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.rows[0].category, Category::Art);
    assert_eq!(page.rows[1].category, Category::Custom("Travel".into()));
    assert_eq!(page.rows[1].category.to_string(), "Travel");
}

#[tokio::test]
async fn test_select_sends_filters_and_range() {
    let server = backend_server();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/rest/v1/media_items"),
            request::headers(contains(key("authorization"))),
            request::query(url_decoded(contains(("category", "eq.Nature")))),
            request::query(url_decoded(contains(("order", "downloads.desc,id.desc")))),
            request::query(url_decoded(contains(("offset", "12")))),
            request::query(url_decoded(contains(("limit", "12")))),
        ])
        .respond_with(status_code(200).body("[]")),
    );

    let client = client_for(&server);
    let query = RowQuery::new(12, 12)
        .filter(Filter::Eq(Column::Category, "Nature".into()))
        .order_by(Order::desc(Column::Downloads))
        .order_by(Order::desc(Column::Id));
    let page = client.select(&query).await.unwrap();
    assert!(page.rows.is_empty());
    assert_eq!(page.total, None);
}

#[tokio::test]
async fn test_insert_returns_stored_row() {
    let server = backend_server();
    mocks::expect_insert(&server, row_json("9", "Uploaded"));

    let client = client_for(&server);
    let row = NewMediaRow {
        kind: MediaKind::Image,
        url: "u".into(),
        thumbnail_url: "u".into(),
        title: "Uploaded".into(),
        description: String::new(),
        uploader: "tester".into(),
        category: Category::Art,
        tags: Tags::new(["one"]),
        external_link: None,
        allow_download: true,
        visibility: Visibility::Public,
    };
    let stored = client.insert(&row).await.unwrap();
    assert_eq!(stored.id, "9");
}

#[tokio::test]
async fn test_update_missing_row_is_not_found() {
    let server = backend_server();
    server.expect(
        Expectation::matching(request::method_path("PATCH", "/rest/v1/media_items"))
            .respond_with(status_code(200).body("[]")),
    );

    let client = client_for(&server);
    let patch = MediaPatch {
        title: Some("x".into()),
        ..Default::default()
    };
    let err = client.update("missing", &patch).await.unwrap_err();
    assert!(matches!(err, ApiClientError::NotFound(id) if id == "missing"));
}

#[tokio::test]
async fn test_update_returns_server_row() {
    let server = backend_server();
    mocks::expect_update(&server, "3", row_json("3", "Renamed"));

    let client = client_for(&server);
    let patch = MediaPatch {
        title: Some("Renamed".into()),
        ..Default::default()
    };
    let item = client.update("3", &patch).await.unwrap();
    assert_eq!(item.title, "Renamed");
}

#[tokio::test]
async fn test_increment_and_delete_row() {
    let server = backend_server();
    mocks::expect_increment(&server, "4", 204);
    mocks::expect_delete_row(&server, "4", 204);

    let client = client_for(&server);
    client.increment_downloads("4").await.unwrap();
    client.delete_row("4").await.unwrap();
}

#[tokio::test]
async fn test_blob_upload_and_remove() {
    let server = backend_server();
    mocks::expect_upload(&server, "1700000000000000.jpg", 200);
    mocks::expect_remove_blob(&server, "1700000000000000.jpg", 200);

    let client = client_for(&server);
    client
        .upload_blob("1700000000000000.jpg", "image/jpeg", b"img".to_vec())
        .await
        .unwrap();
    client.remove_blob("1700000000000000.jpg").await.unwrap();
}

#[tokio::test]
async fn test_backend_error_carries_status() {
    let server = backend_server();
    server.expect(
        Expectation::matching(request::method_path("POST", "/rest/v1/rpc/increment_downloads"))
            .respond_with(status_code(403).body("permission denied")),
    );

    let client = client_for(&server);
    let err = client.increment_downloads("1").await.unwrap_err();
    match err {
        ApiClientError::BackendError { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "permission denied");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
