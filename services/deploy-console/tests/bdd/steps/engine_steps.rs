//! BDD step definitions for the console engine

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cucumber::{given, then, when};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use deploy_console::api::BackendApi;
use deploy_console::channel::{LoopbackChannel, PushChannel};
use deploy_console::engine::{Command, Engine, EngineEvent};
use deploy_console::model::{ListContext, RowKey, Status};
use deploy_console::protocol::topics;
use deploy_console::surface::ToastKind;
use deploy_console::view::{new_view_handle, SnapshotSurface};
use deploy_console::Config;

use crate::world::{parse_keys, parse_rows, parse_status, Console, ConsoleWorld, ScriptedBackend};

async fn process_events(console: &mut Console, count: usize) {
    for _ in 0..count {
        let stepped = tokio::time::timeout(Duration::from_secs(5), console.engine.step())
            .await
            .expect("timed out waiting for engine event");
        assert!(stepped, "engine stopped");
    }
}

#[given(expr = "a console with batches {string}")]
async fn console_with_batches(world: &mut ConsoleWorld, listing: String) {
    let backend = Arc::new(ScriptedBackend::default());
    let records: Vec<Value> = parse_rows(&listing, Status::Pending)
        .into_iter()
        .map(|r| json!({"id": r.key.as_str(), "priority": r.priority, "status": "pending"}))
        .collect();
    *backend.batches.lock().unwrap() = Value::Array(records);

    let config = Config::default();
    let view = new_view_handle(20);
    let channel = LoopbackChannel::new();
    let published = Arc::new(Mutex::new(Vec::new()));
    for topic in [
        topics::REQUEST_STATS,
        topics::REQUEST_SYSTEM_STATUS,
        topics::REQUEST_DEPLOYMENTS,
    ] {
        let sink = Arc::clone(&published);
        channel.subscribe(
            topic,
            Arc::new(move |_: Value| sink.lock().unwrap().push(topic.to_string())),
        );
    }

    let api = Arc::new(BackendApi::new(&config.backend, backend.clone()));
    let mut engine = Engine::new(
        &config,
        api,
        Arc::new(SnapshotSurface::new(Arc::clone(&view))),
        Arc::new(channel.clone()),
        CancellationToken::new(),
    );
    engine.subscribe();
    engine
        .process(EngineEvent::Command(Command::Resync(ListContext::Batches)))
        .await;

    let mut console = Console {
        engine,
        view,
        channel,
        backend,
        published,
    };
    process_events(&mut console, 1).await;
    world.console = Some(console);
}

#[given(expr = "the backend rejects changes with {string}")]
fn backend_rejects(world: &mut ConsoleWorld, message: String) {
    *world.console().backend.reject_with.lock().unwrap() = Some(message);
}

#[when(expr = "the operator drops batch {string} at position {int}")]
async fn operator_drops(world: &mut ConsoleWorld, key: String, new_index: usize) {
    world
        .console()
        .engine
        .process(EngineEvent::Command(Command::Reorder {
            key: RowKey::from(key),
            new_index,
        }))
        .await;
}

#[when(expr = "the operator starts batch {string}")]
async fn operator_starts(world: &mut ConsoleWorld, key: String) {
    world
        .console()
        .engine
        .process(EngineEvent::Command(Command::Start(RowKey::from(key))))
        .await;
}

#[when(expr = "the server pushes {string} with {string}")]
fn server_pushes(world: &mut ConsoleWorld, topic: String, payload: String) {
    let payload: Value = serde_json::from_str(&payload).expect("payload json");
    world.console().channel.deliver(&topic, payload);
}

#[when("the push channel connects")]
fn channel_connects(world: &mut ConsoleWorld) {
    world.console().channel.deliver(topics::CONNECTED, Value::Null);
}

#[when(expr = "the console processes {int} event(s)")]
async fn console_processes(world: &mut ConsoleWorld, count: usize) {
    process_events(world.console(), count).await;
}

#[then(expr = "the batch order is {string}")]
async fn batch_order(world: &mut ConsoleWorld, listing: String) {
    let expected = parse_keys(&listing);
    let console = world.console();
    assert_eq!(console.engine.rows(ListContext::Batches).keys(), expected);
    let view = console.view.read().await;
    let shown: Vec<RowKey> = view.batches.iter().map(|r| r.key.clone()).collect();
    assert_eq!(shown, expected);
}

#[then(expr = "the operator sees a(n) {word} notification {string}")]
async fn operator_sees(world: &mut ConsoleWorld, kind: String, message: String) {
    let kind = match kind.as_str() {
        "success" => ToastKind::Success,
        "info" => ToastKind::Info,
        "warning" => ToastKind::Warning,
        "danger" => ToastKind::Danger,
        other => panic!("Unknown notification kind: {}", other),
    };
    let view = world.console().view.read().await;
    assert!(
        view.toasts
            .iter()
            .any(|t| t.kind == kind && t.message == message),
        "{:?}",
        view.toasts
    );
}

#[then(expr = "batch {string} is displayed as {string}")]
async fn batch_displayed_as(world: &mut ConsoleWorld, key: String, status: String) {
    let view = world.console().view.read().await;
    let row = view
        .row(ListContext::Batches, &RowKey::from(key))
        .expect("batch displayed");
    assert_eq!(row.status, parse_status(&status));
}

#[then(expr = "{string} was published")]
fn was_published(world: &mut ConsoleWorld, topic: String) {
    let published = world.console().published.lock().unwrap().clone();
    assert!(published.contains(&topic), "{published:?}");
}

#[then("the console shows as connected")]
async fn shows_connected(world: &mut ConsoleWorld) {
    assert!(world.console().view.read().await.connected);
}

#[then(expr = "the backend received {int} request(s) matching {string}")]
fn backend_received(world: &mut ConsoleWorld, count: usize, needle: String) {
    let requests = world.console().backend.requests.lock().unwrap().clone();
    let matching = requests.iter().filter(|r| r.contains(&needle)).count();
    assert_eq!(matching, count, "{requests:?}");
}
