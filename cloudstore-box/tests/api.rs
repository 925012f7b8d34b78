use std::sync::Arc;
use std::time::Duration;

use cloudstore_box::{BoxApi, BoxItemType, RemoteItems, list_all_items};
use cloudstore_core::{AuthorizedTransport, CloudStorageError, Credentials, TokenProvider};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> BoxApi {
    let tokens = TokenProvider::new(Credentials::new("token", None), None);
    let transport = AuthorizedTransport::new(Arc::new(tokens), Duration::from_secs(5)).unwrap();
    BoxApi::with_base_urls(Arc::new(transport), &server.uri(), &format!("{}/upload", server.uri()))
        .unwrap()
}

fn page(offset: u64, names: &[&str]) -> serde_json::Value {
    let entries: Vec<_> = names
        .iter()
        .map(|name| json!({ "type": "file", "id": format!("id-{name}"), "name": name }))
        .collect();
    json!({ "total_count": 5, "entries": entries, "offset": offset, "limit": 2 })
}

#[tokio::test]
async fn drains_listing_page_by_page() {
    let server = MockServer::start().await;
    for (offset, names) in [(0, vec!["a", "b"]), (2, vec!["c", "d"]), (4, vec!["e"])] {
        Mock::given(method("GET"))
            .and(path("/folders/7/items"))
            .and(query_param("limit", "2"))
            .and(query_param("offset", offset.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(offset, &names)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let api = api_for(&server);
    let items = list_all_items(&api, "7", 2, 0).await.unwrap();
    let names: Vec<_> = items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, ["a", "b", "c", "d", "e"]);
}

#[tokio::test]
async fn short_final_page_ends_the_drain() {
    let server = MockServer::start().await;
    // The remote reports more items than it actually returns.
    Mock::given(method("GET"))
        .and(path("/folders/7/items"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(0, &["a"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/folders/7/items"))
        .and(query_param("offset", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(1, &[])))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let items = list_all_items(&api, "7", 2, 0).await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn not_found_names_the_missing_item() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{\"code\":\"not_found\"}"))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let err = api.get_file("404").await.unwrap_err();
    match err {
        CloudStorageError::ItemNotFound(message) => assert_eq!(message, "could not find file 404"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn create_folder_posts_name_and_parent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/folders"))
        .and(body_partial_json(json!({ "name": "New", "parent": { "id": "0" } })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "type": "folder", "id": "12", "name": "New"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let folder = api.create_folder("0", "New").await.unwrap();
    assert_eq!(folder.item_type, BoxItemType::Folder);
    assert_eq!(folder.id, "12");
}

#[tokio::test]
async fn duplicate_folder_is_a_request_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/folders"))
        .respond_with(ResponseTemplate::new(409).set_body_string("item_name_in_use"))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let err = api.create_folder("0", "Dup").await.unwrap_err();
    assert_eq!(err.status(), Some(reqwest::StatusCode::CONFLICT));
}

#[tokio::test]
async fn upload_without_entries_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/files/content"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "total_count": 0, "entries": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let err = api.upload_new("0", "x.bin", vec![1, 2, 3]).await.unwrap_err();
    assert!(matches!(err, CloudStorageError::RequestFailed { status: None, .. }));
}
