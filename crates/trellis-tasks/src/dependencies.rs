//! The directed "depends on" relation between tasks.
//!
//! An edge `(task_id, dependency_id)` means `task_id` cannot complete until
//! `dependency_id` has. Self loops and cycles are rejected on insert, and
//! duplicate ids collapse to one edge.
//!
//! `attach` and `sync` issue several statements; callers that need them to be
//! atomic run them inside a transaction (the service always does).

use std::collections::{HashSet, VecDeque};

use rusqlite::{Connection, params};
use tracing::debug;

use crate::errors::{Result, TaskError};
use crate::repository::{TaskRepository, now_iso, task_from_row};
use crate::types::Task;

/// Dependency edge accessor.
pub struct DependencyGraph;

impl DependencyGraph {
    /// Add one edge per id. Ids already attached, or repeated in the input,
    /// are skipped.
    pub fn attach(conn: &Connection, task_id: &str, dependency_ids: &[String]) -> Result<()> {
        let wanted = dedup(dependency_ids);
        Self::validate_targets(conn, task_id, &wanted)?;

        for dependency_id in wanted {
            if Self::would_create_cycle(conn, task_id, dependency_id)? {
                return Err(TaskError::CircularDependency {
                    task_id: task_id.to_string(),
                    dependency_id: dependency_id.to_string(),
                });
            }
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO task_dependencies (task_id, dependency_id, created_at) \
                 VALUES (?1, ?2, ?3)",
                params![task_id, dependency_id, now_iso()],
            )?;
            if inserted > 0 {
                debug!(task_id, dependency_id, "dependency attached");
            }
        }
        Ok(())
    }

    /// Replace the dependency set of `task_id` with exactly `dependency_ids`.
    pub fn sync(conn: &Connection, task_id: &str, dependency_ids: &[String]) -> Result<()> {
        let wanted = dedup(dependency_ids);
        Self::validate_targets(conn, task_id, &wanted)?;

        let keep: HashSet<&str> = wanted.iter().copied().collect();
        for current in Self::dependency_ids(conn, task_id)? {
            if !keep.contains(current.as_str()) {
                let _ = conn.execute(
                    "DELETE FROM task_dependencies WHERE task_id = ?1 AND dependency_id = ?2",
                    params![task_id, current],
                )?;
                debug!(task_id, dependency_id = %current, "dependency detached");
            }
        }

        let owned: Vec<String> = wanted.into_iter().map(str::to_owned).collect();
        Self::attach(conn, task_id, &owned)
    }

    /// Full task records this task depends on.
    pub fn dependencies_of(conn: &Connection, task_id: &str) -> Result<Vec<Task>> {
        let mut stmt = conn.prepare(
            "SELECT t.* FROM tasks t \
             JOIN task_dependencies d ON d.dependency_id = t.id \
             WHERE d.task_id = ?1 ORDER BY t.created_at, t.id",
        )?;
        let tasks = stmt
            .query_map(params![task_id], |row| Ok(task_from_row(row)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Full task records that depend on this task.
    pub fn dependents_of(conn: &Connection, task_id: &str) -> Result<Vec<Task>> {
        let mut stmt = conn.prepare(
            "SELECT t.* FROM tasks t \
             JOIN task_dependencies d ON d.task_id = t.id \
             WHERE d.dependency_id = ?1 ORDER BY t.created_at, t.id",
        )?;
        let tasks = stmt
            .query_map(params![task_id], |row| Ok(task_from_row(row)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// IDs this task depends on.
    pub fn dependency_ids(conn: &Connection, task_id: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT dependency_id FROM task_dependencies WHERE task_id = ?1 ORDER BY dependency_id",
        )?;
        let ids = stmt
            .query_map(params![task_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Whether adding `task_id → dependency_id` would close a cycle.
    ///
    /// BFS over existing edges starting at `dependency_id`; reaching
    /// `task_id` means the new edge would make it depend on itself.
    pub fn would_create_cycle(conn: &Connection, task_id: &str, dependency_id: &str) -> Result<bool> {
        let mut stmt =
            conn.prepare("SELECT dependency_id FROM task_dependencies WHERE task_id = ?1")?;
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(dependency_id.to_string());

        while let Some(current) = queue.pop_front() {
            if current == task_id {
                return Ok(true);
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            let next = stmt
                .query_map(params![current], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            queue.extend(next);
        }
        Ok(false)
    }

    /// Number of direct dependencies whose status is not `completed`.
    pub fn incomplete_dependency_count(conn: &Connection, task_id: &str) -> Result<u32> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM task_dependencies d \
             JOIN tasks t ON t.id = d.dependency_id \
             WHERE d.task_id = ?1 AND t.status != 'completed'",
            params![task_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Every referenced task must exist and none may be the task itself.
    fn validate_targets(conn: &Connection, task_id: &str, ids: &[&str]) -> Result<()> {
        if !TaskRepository::task_exists(conn, task_id)? {
            return Err(TaskError::task_not_found(task_id));
        }
        for &id in ids {
            if id == task_id {
                return Err(TaskError::CircularDependency {
                    task_id: task_id.to_string(),
                    dependency_id: id.to_string(),
                });
            }
            if !TaskRepository::task_exists(conn, id)? {
                return Err(TaskError::task_not_found(id));
            }
        }
        Ok(())
    }
}

/// Drop repeated ids, keeping first occurrence order.
fn dedup(ids: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
