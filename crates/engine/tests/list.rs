mod common;

use common::{ScriptedServer, engine, json_reply};
use serde_json::json;
use tether_engine::{EngineError, PrivateStore};
use tether_types::{ListConfig, Locator, Query};
use tokio_util::sync::CancellationToken;

fn paged() -> ListConfig {
    let mut config = ListConfig::new("/things");
    config.selector = Some("value".into());
    config.next_link_locator = Some(Locator::Body("nextLink".into()));
    config
}

#[tokio::test]
async fn follows_next_links_across_pages() {
    let server = ScriptedServer::new([
        json_reply(200, json!({ "value": [{ "id": "a" }, { "id": "b" }], "nextLink": "http://api.test/things?page=2" })),
        json_reply(200, json!({ "value": [{ "id": "c" }] })),
    ]);
    let engine = engine(&server);

    let listed = engine.list_resources(&CancellationToken::new(), &paged()).await.unwrap();

    let ids: Vec<_> = listed.iter().map(|item| item.spec.id.as_str()).collect();
    assert_eq!(ids, ["/things/a", "/things/b", "/things/c"]);
    assert_eq!(server.calls(), ["GET /things", "GET /things?page=2"]);
    assert_eq!(listed[2].value, json!({ "id": "c" }));
}

#[tokio::test]
async fn listed_identities_import_back() {
    let server = ScriptedServer::new([
        json_reply(200, json!([{ "id": "a", "name": "first" }])),
        json_reply(200, json!({ "id": "a", "name": "first", "etag": "e" })),
    ]);
    let engine = engine(&server);
    let mut config = ListConfig::new("/things");
    config.query = Query::from_iter([("api-version".to_string(), vec!["2".to_string()])]);

    let listed = engine.list_resources(&CancellationToken::new(), &config).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].spec.query, Some(config.query.clone()));

    let imported = engine
        .import_resource(&CancellationToken::new(), &listed[0].import_id, &PrivateStore::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(imported.id, "/things/a");
    assert_eq!(imported.config.body, json!({ "id": "a", "name": "first", "etag": "e" }));

    let read = &server.requests()[1];
    assert_eq!(read.path, "/things/a");
    assert_eq!(read.query.get("api-version"), Some(&vec!["2".to_string()]));
}

#[tokio::test]
async fn missing_selection_is_an_empty_page() {
    let server = ScriptedServer::new([json_reply(200, json!({ "count": 0 }))]);
    let engine = engine(&server);

    let listed = engine.list_resources(&CancellationToken::new(), &paged()).await.unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn non_array_selection_is_an_error() {
    let server = ScriptedServer::new([json_reply(200, json!({ "value": { "id": "a" } }))]);
    let engine = engine(&server);

    let error = engine.list_resources(&CancellationToken::new(), &paged()).await.unwrap_err();
    assert!(matches!(error, EngineError::Selection { ref selector } if selector == "value"));
}

#[tokio::test]
async fn page_limit_stops_pagination() {
    let page = |n: u32| json_reply(200, json!({ "value": [{ "id": n.to_string() }], "nextLink": format!("/things?page={}", n + 1) }));
    let server = ScriptedServer::new([page(1), page(2), page(3)]);
    let engine = engine(&server);
    let mut config = paged();
    config.max_pages = 2;

    let listed = engine.list_resources(&CancellationToken::new(), &config).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(server.calls(), ["GET /things", "GET /things?page=2"]);
    assert_eq!(server.remaining(), 1);
}
