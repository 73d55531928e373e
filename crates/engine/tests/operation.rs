mod common;

use common::{ScriptedServer, engine, json_reply, reply};
use serde_json::json;
use tether_engine::{EngineError, PartialState, PrivateState, PrivateStore, operation_output_changes, private_state::keys};
use tether_types::{ActionConfig, HttpMethod, Locator, OperationConfig, PollOptions};
use tokio_util::sync::CancellationToken;

fn deployment() -> OperationConfig {
    let mut config = OperationConfig::new("/deployments", HttpMethod::Post);
    config.body = Some(json!({ "image": "web:1" }));
    config.id_builder = Some("$(path)/$(body.name)".into());
    config.output_attrs = vec!["name".into(), "status".into()];
    config
}

#[tokio::test]
async fn create_builds_the_id_and_filters_output() {
    let server = ScriptedServer::new([json_reply(201, json!({ "name": "d1", "status": "queued", "internal": 1 }))]);
    let engine = engine(&server);

    let state = engine
        .create_operation(&CancellationToken::new(), &deployment(), &mut PrivateStore::new())
        .await
        .unwrap();

    assert_eq!(state.id, "/deployments/d1");
    assert_eq!(state.output, json!({ "name": "d1", "status": "queued" }));
    assert_eq!(server.calls(), ["POST /deployments"]);
    assert_eq!(server.requests()[0].body, Some(json!({ "image": "web:1" })));
}

#[tokio::test]
async fn operation_without_body_sends_none() {
    let server = ScriptedServer::new([reply(204, "")]);
    let engine = engine(&server);
    let config = OperationConfig::new("/caches/purge", HttpMethod::Post);

    let state = engine
        .create_operation(&CancellationToken::new(), &config, &mut PrivateStore::new())
        .await
        .unwrap();
    assert_eq!(state.id, "/caches/purge");
    assert_eq!(state.output, serde_json::Value::Null);
    assert_eq!(server.requests()[0].body, None);
}

#[tokio::test(start_paused = true)]
async fn poll_failure_keeps_the_operation_identifier() {
    let server = ScriptedServer::new([
        json_reply(202, json!({ "name": "d1", "status": "Running" })),
        json_reply(200, json!({ "status": "Failed" })),
    ]);
    let engine = engine(&server);
    let mut config = deployment();
    config.poll = Some(
        PollOptions::new(Locator::Body("status".into()), "Succeeded", vec!["Running".into()]).with_default_delay(1),
    );

    let error = engine
        .create_operation(&CancellationToken::new(), &config, &mut PrivateStore::new())
        .await
        .unwrap_err();
    let Some(PartialState::Operation(kept)) = error.partial_state() else {
        panic!("expected partial state, got {error:?}");
    };
    assert_eq!(kept.id, "/deployments/d1");
    assert!(matches!(error, EngineError::Partial { .. }));
}

#[tokio::test]
async fn update_is_skipped_when_nothing_changed() {
    let server = ScriptedServer::new([json_reply(201, json!({ "name": "d1", "status": "queued" }))]);
    let engine = engine(&server);
    let config = deployment();
    let mut private = PrivateStore::new();

    let created = engine
        .create_operation(&CancellationToken::new(), &config, &mut private)
        .await
        .unwrap();
    let updated = engine
        .update_operation(&CancellationToken::new(), &created, &config, &mut private)
        .await
        .unwrap();

    assert_eq!(updated, created);
    assert_eq!(server.calls().len(), 1);
}

#[tokio::test]
async fn changed_body_reruns_the_operation() {
    let server = ScriptedServer::new([
        json_reply(201, json!({ "name": "d1", "status": "queued" })),
        json_reply(201, json!({ "name": "d2", "status": "queued" })),
    ]);
    let engine = engine(&server);
    let mut private = PrivateStore::new();
    let created = engine
        .create_operation(&CancellationToken::new(), &deployment(), &mut private)
        .await
        .unwrap();

    let mut config = deployment();
    config.body = Some(json!({ "image": "web:2" }));
    let updated = engine
        .update_operation(&CancellationToken::new(), &created, &config, &mut private)
        .await
        .unwrap();
    assert_eq!(updated.id, "/deployments/d2");
    assert_eq!(server.calls(), ["POST /deployments", "POST /deployments"]);
}

#[tokio::test]
async fn ephemeral_body_drives_output_changes() {
    let server = ScriptedServer::new([json_reply(201, json!({ "name": "d1", "token": "t1" }))]);
    let engine = engine(&server);
    let mut config = deployment();
    config.output_attrs.clear();
    config.ephemeral_body = Some(json!({ "token": "t1" }));
    let mut private = PrivateStore::new();

    assert!(operation_output_changes(&private, config.ephemeral_body.as_ref()).unwrap());
    let state = engine
        .create_operation(&CancellationToken::new(), &config, &mut private)
        .await
        .unwrap();

    assert_eq!(server.requests()[0].body, Some(json!({ "image": "web:1", "token": "t1" })));
    assert_eq!(state.output, json!({ "name": "d1" }));
    assert!(state.config.ephemeral_body.is_none());
    assert!(!operation_output_changes(&private, config.ephemeral_body.as_ref()).unwrap());
    assert!(operation_output_changes(&private, Some(&json!({ "token": "t2" }))).unwrap());
}

#[tokio::test]
async fn delete_without_a_delete_call_only_forgets_private_state() {
    let server = ScriptedServer::new([json_reply(201, json!({ "name": "d1" }))]);
    let engine = engine(&server);
    let mut config = deployment();
    config.ephemeral_body = Some(json!({ "token": "t" }));
    let mut private = PrivateStore::new();
    let state = engine
        .create_operation(&CancellationToken::new(), &config, &mut private)
        .await
        .unwrap();
    assert!(private.get(keys::EPHEMERAL_BODY).is_some());

    engine
        .delete_operation(&CancellationToken::new(), &state, &mut private)
        .await
        .unwrap();
    assert_eq!(server.calls().len(), 1);
    assert!(private.is_empty());
}

#[tokio::test]
async fn configured_delete_expands_against_the_output() {
    let server = ScriptedServer::new([json_reply(201, json!({ "name": "d1", "status": "queued" })), reply(204, "")]);
    let engine = engine(&server);
    let mut config = deployment();
    config.delete_path = Some("/deployments/$(body.name)/cancel".into());
    config.delete_method = Some(HttpMethod::Post);

    let state = engine
        .create_operation(&CancellationToken::new(), &config, &mut PrivateStore::new())
        .await
        .unwrap();
    engine
        .delete_operation(&CancellationToken::new(), &state, &mut PrivateStore::new())
        .await
        .unwrap();
    assert_eq!(server.calls(), ["POST /deployments", "POST /deployments/d1/cancel"]);
}

#[tokio::test(start_paused = true)]
async fn action_returns_the_filtered_response_after_polling() {
    let server = ScriptedServer::new([
        json_reply(202, json!({ "job": "j1", "status": "Running", "noise": true })),
        json_reply(200, json!({ "status": "Succeeded" })),
    ]);
    let engine = engine(&server);
    let config: ActionConfig = serde_json::from_value(json!({
        "path": "/servers/s1/restart",
        "body": { "force": true },
        "output_attrs": ["job", "status"],
        "poll": {
            "status_locator": "body.status",
            "success": "Succeeded",
            "pending": ["Running"],
            "default_delay_sec": 1
        }
    }))
    .unwrap();

    let result = engine.run_action(&CancellationToken::new(), &config).await.unwrap();
    assert_eq!(result, json!({ "job": "j1", "status": "Running" }));
    assert_eq!(server.calls(), ["POST /servers/s1/restart", "GET /servers/s1/restart"]);
}
