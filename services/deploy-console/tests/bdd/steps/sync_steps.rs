//! BDD step definitions for live state synchronization

use std::time::Duration;

use cucumber::{given, then, when};

use deploy_console::model::{ListContext, RowKey};
use deploy_console::surface::{Toast, ToastKind};
use deploy_console::sync::{Effect, Outcome, SyncEvent, Synchronizer};

use crate::world::{parse_keys, parse_status, parse_statuses, ConsoleWorld};

fn synchronizer() -> Synchronizer {
    Synchronizer::new(Duration::from_secs(2))
}

fn apply(world: &mut ConsoleWorld, context: ListContext, event: SyncEvent) {
    world.snapshot = world.collection(context).rows().to_vec();
    let applied = synchronizer().apply(context, event, world.collection(context));
    world.applied = Some(applied);
}

fn effects(world: &ConsoleWorld) -> &[Effect] {
    &world.applied.as_ref().expect("no event applied").effects
}

#[given(expr = "the batch list {string}")]
fn batch_list(world: &mut ConsoleWorld, listing: String) {
    world.batches.replace_all(parse_statuses(&listing));
}

#[given(expr = "the deployment list {string}")]
fn deployment_list(world: &mut ConsoleWorld, listing: String) {
    world.deployments.replace_all(parse_statuses(&listing));
}

#[when(expr = "progress for batch {string} reports {int} remaining of {int}")]
fn progress_reported(world: &mut ConsoleWorld, key: String, remaining: u64, total: u64) {
    apply(
        world,
        ListContext::Batches,
        SyncEvent::ProgressUpdate {
            key: RowKey::from(key),
            remaining,
            total,
        },
    );
}

#[when(expr = "batch {string} changes status to {string}")]
fn batch_status_changes(world: &mut ConsoleWorld, key: String, status: String) {
    apply(
        world,
        ListContext::Batches,
        SyncEvent::StatusChange {
            key: RowKey::from(key),
            status: parse_status(&status),
            details: None,
        },
    );
}

#[when(expr = "deployment {string} changes status to {string}")]
fn deployment_status_changes(world: &mut ConsoleWorld, key: String, status: String) {
    apply(
        world,
        ListContext::Deployments,
        SyncEvent::StatusChange {
            key: RowKey::from(key),
            status: parse_status(&status),
            details: None,
        },
    );
}

#[when(expr = "the batch list is refreshed with {string}")]
fn batch_list_refreshed(world: &mut ConsoleWorld, listing: String) {
    apply(
        world,
        ListContext::Batches,
        SyncEvent::FullRefresh {
            rows: parse_statuses(&listing),
        },
    );
}

#[then(expr = "batch {string} shows {int} percent")]
fn batch_shows_percent(world: &mut ConsoleWorld, key: String, percent: u8) {
    let row = world.batches.get(&RowKey::from(key)).expect("batch listed");
    assert_eq!(row.percent(), Some(percent));
}

#[then(expr = "the row {string} is highlighted")]
fn row_highlighted(world: &mut ConsoleWorld, key: String) {
    assert!(effects(world).contains(&Effect::Highlight(RowKey::from(key))));
}

#[then(expr = "the batch list has {int} rows")]
fn batch_list_has_rows(world: &mut ConsoleWorld, count: usize) {
    assert_eq!(world.batches.len(), count);
}

#[then("nothing changed")]
fn nothing_changed(world: &mut ConsoleWorld) {
    let applied = world.applied.as_ref().expect("no event applied");
    assert!(matches!(
        applied.outcome,
        Outcome::MissingTarget | Outcome::Skipped
    ));
    assert!(applied.effects.is_empty());
    assert_eq!(world.batches.rows(), world.snapshot.as_slice());
}

#[then(expr = "batch {string} has status {string}")]
fn batch_has_status(world: &mut ConsoleWorld, key: String, status: String) {
    let row = world.batches.get(&RowKey::from(key)).expect("batch listed");
    assert_eq!(row.status, parse_status(&status));
}

#[then(expr = "the operator is notified {string}")]
fn operator_notified(world: &mut ConsoleWorld, message: String) {
    let toast = Effect::Notify(Toast::new(ToastKind::Info, message));
    assert!(effects(world).contains(&toast), "{:?}", effects(world));
}

#[then("a batch reload is scheduled")]
fn reload_scheduled(world: &mut ConsoleWorld) {
    assert!(effects(world)
        .iter()
        .any(|e| matches!(e, Effect::ScheduleResync(_))));
}

#[then("no reload is scheduled")]
fn no_reload_scheduled(world: &mut ConsoleWorld) {
    assert!(!effects(world)
        .iter()
        .any(|e| matches!(e, Effect::ScheduleResync(_))));
}

#[then(expr = "the deployment list order is {string}")]
fn deployment_order(world: &mut ConsoleWorld, listing: String) {
    assert_eq!(world.deployments.keys(), parse_keys(&listing));
}

#[then(expr = "the batch list order is {string}")]
fn batch_order(world: &mut ConsoleWorld, listing: String) {
    assert_eq!(world.batches.keys(), parse_keys(&listing));
}
