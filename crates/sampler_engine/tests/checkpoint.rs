use std::fs;

use pretty_assertions::assert_eq;
use sampler_core::{SizeRange, StratumState};
use sampler_engine::{CheckpointStore, HarvestError};
use tempfile::TempDir;

#[test]
fn missing_file_loads_empty() {
    let temp = TempDir::new().unwrap();
    let store = CheckpointStore::load(temp.path().join("sampling.jsonl")).unwrap();
    assert!(store.is_empty());
}

#[test]
fn recorded_rows_survive_a_reload() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sampling.jsonl");

    let mut store = CheckpointStore::load(&path).unwrap();
    store
        .record(SizeRange::new(1, 4), StratumState::Done, false)
        .unwrap();
    store
        .record(SizeRange::new(5, 8), StratumState::InProgress, false)
        .unwrap();
    store
        .record(SizeRange::new(9, 9), StratumState::Done, true)
        .unwrap();

    let reloaded = CheckpointStore::load(&path).unwrap();
    assert_eq!(
        reloaded.planner_seed(),
        vec![
            (SizeRange::new(1, 4), StratumState::Done, false),
            (SizeRange::new(5, 8), StratumState::InProgress, false),
            (SizeRange::new(9, 9), StratumState::Done, true),
        ]
    );
}

#[test]
fn record_upserts_by_range() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sampling.jsonl");

    let mut store = CheckpointStore::load(&path).unwrap();
    let range = SizeRange::new(1, 4);
    store.record(range, StratumState::InProgress, false).unwrap();
    store.record(range, StratumState::Done, false).unwrap();

    let reloaded = CheckpointStore::load(&path).unwrap();
    assert_eq!(
        reloaded.planner_seed(),
        vec![(range, StratumState::Done, false)]
    );
    // One row on disk, not two.
    let lines = fs::read_to_string(&path).unwrap().lines().count();
    assert_eq!(lines, 1);
}

#[test]
fn record_split_lands_children_and_parent_in_one_transition() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sampling.jsonl");

    let mut store = CheckpointStore::load(&path).unwrap();
    let parent = SizeRange::new(5, 8);
    store.record(parent, StratumState::InProgress, false).unwrap();
    store
        .record_split(parent, SizeRange::new(5, 6), SizeRange::new(7, 8))
        .unwrap();

    // After the single rewrite the file never shows a half-written split:
    // both children are Pending and the parent is Split.
    let reloaded = CheckpointStore::load(&path).unwrap();
    assert_eq!(
        reloaded.planner_seed(),
        vec![
            (SizeRange::new(5, 6), StratumState::Pending, false),
            (parent, StratumState::Split, false),
            (SizeRange::new(7, 8), StratumState::Pending, false),
        ]
    );
}

#[test]
fn corrupt_line_is_fatal_with_position() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sampling.jsonl");
    fs::write(
        &path,
        "{\"low\":1,\"high\":4,\"state\":\"done\",\"timestamp\":0}\nnot json\n",
    )
    .unwrap();

    let err = CheckpointStore::load(&path).err().expect("load should fail");
    match err {
        HarvestError::CheckpointCorrupt { line, .. } => assert_eq!(line, 2),
        other => panic!("expected corrupt checkpoint, got {other}"),
    }
}

#[test]
fn inverted_range_is_corrupt() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sampling.jsonl");
    fs::write(
        &path,
        "{\"low\":8,\"high\":5,\"state\":\"done\",\"timestamp\":0}\n",
    )
    .unwrap();

    assert!(matches!(
        CheckpointStore::load(&path),
        Err(HarvestError::CheckpointCorrupt { .. })
    ));
}
