//! BDD step definitions for priority reordering

use cucumber::{given, then, when};

use deploy_console::model::{RowKey, Status};
use deploy_console::reorder::{plan_reorder, PriorityPlan};
use deploy_console::rows::RowCollection;

use crate::world::{parse_rows, ConsoleWorld};

fn plan(world: &ConsoleWorld) -> &PriorityPlan {
    match world.plan.as_ref().expect("no drop performed") {
        Ok(plan) => plan,
        Err(e) => panic!("drop was rejected: {e}"),
    }
}

#[given(expr = "batches with priorities {string}")]
fn batches_with_priorities(world: &mut ConsoleWorld, listing: String) {
    world.rows = parse_rows(&listing, Status::Pending);
}

#[when(expr = "batch {string} is dropped at position {int}")]
fn batch_dropped(world: &mut ConsoleWorld, key: String, index: usize) {
    world.plan = Some(plan_reorder(
        &world.rows,
        &RowKey::from(key),
        index,
        world.policy,
    ));
}

#[then(expr = "the new priority of {string} is {int}")]
fn new_priority_is(world: &mut ConsoleWorld, key: String, expected: i64) {
    let plan = plan(world);
    assert_eq!(plan.moved_key(), &RowKey::from(key));
    assert_eq!(plan.moved_priority(), expected);
}

#[then(expr = "only batch {string} changes priority")]
fn only_batch_changes(world: &mut ConsoleWorld, key: String) {
    let assignments = plan(world).assignments();
    assert_eq!(assignments.len(), 1, "{assignments:?}");
    assert_eq!(assignments[0].0, RowKey::from(key));
}

#[then("the batches are renumbered")]
fn batches_renumbered(world: &mut ConsoleWorld) {
    assert!(plan(world).is_renumber());
}

#[then(expr = "the priorities in order are {string}")]
fn priorities_in_order(world: &mut ConsoleWorld, listing: String) {
    let mut collection = RowCollection::from_rows(world.rows.clone());
    collection.apply_priorities(&plan(world).assignments());
    let actual: Vec<(RowKey, i64)> = collection
        .iter()
        .map(|r| (r.key.clone(), r.priority))
        .collect();
    let expected: Vec<(RowKey, i64)> = parse_rows(&listing, Status::Pending)
        .into_iter()
        .map(|r| (r.key, r.priority))
        .collect();
    assert_eq!(actual, expected);
}

#[then("the drop is rejected")]
fn drop_rejected(world: &mut ConsoleWorld) {
    assert!(
        matches!(world.plan, Some(Err(_))),
        "expected rejection, got {:?}",
        world.plan
    );
}
