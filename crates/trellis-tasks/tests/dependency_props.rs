//! Property tests for dependency set replacement.

#![allow(unused_results)]

use std::collections::BTreeSet;

use proptest::prelude::*;
use rusqlite::Connection;
use trellis_tasks::migrations::run_migrations;
use trellis_tasks::{DependencyGraph, TaskCreateParams, TaskRepository};

const POOL: usize = 6;

fn setup() -> (Connection, String, Vec<String>) {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    run_migrations(&conn).unwrap();

    let create = |title: String| {
        TaskRepository::create_task(
            &conn,
            &TaskCreateParams {
                title,
                ..Default::default()
            },
        )
        .unwrap()
        .id
    };
    let owner = create("owner".into());
    let candidates = (0..POOL).map(|i| create(format!("dep {i}"))).collect();
    (conn, owner, candidates)
}

fn pick(candidates: &[String], indexes: &[usize]) -> Vec<String> {
    indexes.iter().map(|&i| candidates[i].clone()).collect()
}

fn stored(conn: &Connection, owner: &str) -> BTreeSet<String> {
    DependencyGraph::dependencies_of(conn, owner)
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sync_yields_exact_set(indexes in prop::collection::vec(0..POOL, 0..10)) {
        let (conn, owner, candidates) = setup();
        let ids = pick(&candidates, &indexes);

        DependencyGraph::sync(&conn, &owner, &ids).unwrap();

        let expected: BTreeSet<String> = ids.iter().cloned().collect();
        let deps = DependencyGraph::dependencies_of(&conn, &owner).unwrap();
        prop_assert_eq!(deps.len(), expected.len());
        prop_assert_eq!(stored(&conn, &owner), expected);
    }

    #[test]
    fn sync_is_idempotent(indexes in prop::collection::vec(0..POOL, 0..10)) {
        let (conn, owner, candidates) = setup();
        let ids = pick(&candidates, &indexes);

        DependencyGraph::sync(&conn, &owner, &ids).unwrap();
        let once = stored(&conn, &owner);
        DependencyGraph::sync(&conn, &owner, &ids).unwrap();
        prop_assert_eq!(stored(&conn, &owner), once);
    }

    #[test]
    fn last_sync_wins(
        first in prop::collection::vec(0..POOL, 0..10),
        second in prop::collection::vec(0..POOL, 0..10),
    ) {
        let (conn, owner, candidates) = setup();
        DependencyGraph::sync(&conn, &owner, &pick(&candidates, &first)).unwrap();
        let ids = pick(&candidates, &second);
        DependencyGraph::sync(&conn, &owner, &ids).unwrap();

        let expected: BTreeSet<String> = ids.into_iter().collect();
        prop_assert_eq!(stored(&conn, &owner), expected);
    }
}
