mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use common::{ScriptedServer, engine, reply};
use serde_json::{Value, json};
use tether_api::RequestOptions;
use tether_engine::{EngineError, LockRegistry};
use tether_types::{Headers, Locator, PollOptions, PrecheckApi, PrecheckStep, Query};
use tokio_util::sync::CancellationToken;

fn code_probe(path: &str) -> PrecheckStep {
    PrecheckStep::Api(PrecheckApi {
        path: path.to_string(),
        query: Query::new(),
        poll: PollOptions::new(Locator::Code, "200", vec!["409".into()]).with_default_delay(1),
    })
}

#[tokio::test]
async fn shared_mutex_serializes_concurrent_chains() {
    let server = ScriptedServer::new([]);
    let engine = engine(&server);
    let steps = vec![PrecheckStep::Mutex("network".into())];
    let inside = Arc::new(AtomicUsize::new(0));
    let interleaved = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let engine = engine.clone();
        let steps = steps.clone();
        let inside = inside.clone();
        let interleaved = interleaved.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..5 {
                let guard = engine
                    .precheck(&CancellationToken::new(), &steps, &RequestOptions::default(), "/vnets", &Value::Null)
                    .await
                    .unwrap();
                if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                    interleaved.fetch_add(1, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
                guard.unlock();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(interleaved.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn engines_sharing_a_registry_share_locks() {
    let server = ScriptedServer::new([]);
    let locks = Arc::new(LockRegistry::new());
    let first = engine(&server).with_locks(locks.clone());
    let second = engine(&server).with_locks(locks);
    let steps = vec![PrecheckStep::Mutex("subnet".into())];
    let cancel = CancellationToken::new();

    let held = first
        .precheck(&cancel, &steps, &RequestOptions::default(), "/", &Value::Null)
        .await
        .unwrap();
    let waiting = tokio::time::timeout(
        Duration::from_millis(50),
        second.precheck(&cancel, &steps, &RequestOptions::default(), "/", &Value::Null),
    )
    .await;
    assert!(waiting.is_err());

    drop(held);
    second
        .precheck(&cancel, &steps, &RequestOptions::default(), "/", &Value::Null)
        .await
        .unwrap();
}

#[tokio::test]
async fn mutex_names_expand_against_the_body() {
    let server = ScriptedServer::new([]);
    let engine = engine(&server);
    let steps = vec![PrecheckStep::Mutex("vnet-$(body.network)".into())];

    let guard = engine
        .precheck(
            &CancellationToken::new(),
            &steps,
            &RequestOptions::default(),
            "/subnets",
            &json!({ "network": "core" }),
        )
        .await
        .unwrap();
    assert_eq!(guard.names().collect::<Vec<_>>(), ["vnet-core"]);
}

#[tokio::test(start_paused = true)]
async fn api_probe_polls_until_success() {
    let server = ScriptedServer::new([reply(409, ""), reply(409, ""), reply(200, "{}")]);
    let engine = engine(&server);
    let overlay = RequestOptions::default().with_header(Headers::from_iter([("x-tenant".to_string(), "t".to_string())]));

    engine
        .precheck(
            &CancellationToken::new(),
            &[code_probe("/locks/$(body.name)")],
            &overlay,
            "/things",
            &json!({ "name": "a b" }),
        )
        .await
        .unwrap();

    assert_eq!(server.calls(), vec!["GET /locks/a%20b"; 3]);
    assert_eq!(server.requests()[0].header_value("x-tenant"), Some("t"));
}

#[tokio::test(start_paused = true)]
async fn failing_step_releases_locks_taken_before_it() {
    let server = ScriptedServer::new([reply(500, "")]);
    let engine = engine(&server);
    let steps = vec![PrecheckStep::Mutex("m".into()), code_probe("/locks/m")];
    let cancel = CancellationToken::new();

    let error = engine
        .precheck(&cancel, &steps, &RequestOptions::default(), "/", &Value::Null)
        .await
        .unwrap_err();
    let EngineError::Precheck { step, source } = error else {
        panic!("expected a precheck error");
    };
    assert_eq!(step, "api /locks/m");
    assert!(matches!(*source, EngineError::PollFailure { ref status } if status == "500"));

    let relock = tokio::time::timeout(Duration::from_secs(1), engine.locks().acquire("m", &cancel)).await;
    assert!(relock.is_ok());
}
