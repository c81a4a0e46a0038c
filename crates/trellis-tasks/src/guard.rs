//! Status transition guard.
//!
//! One rule: a task may move into `completed` only when every **direct**
//! dependency is already `completed`. Every other transition is allowed,
//! including reopening a completed task.

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::dependencies::DependencyGraph;
use crate::errors::{Result, TaskError};
use crate::repository::TaskRepository;
use crate::types::{Task, TaskStatus};

/// Reason carried by a blocked transition.
pub const PENDING_DEPENDENCIES: &str = "pending dependencies";

/// Pure form of the rule.
pub fn can_transition(target: TaskStatus, incomplete_dependencies: u32) -> bool {
    !(target == TaskStatus::Completed && incomplete_dependencies > 0)
}

/// Check the rule against stored dependencies.
pub fn check(conn: &Connection, task: &Task, target: TaskStatus) -> Result<()> {
    if target != TaskStatus::Completed {
        return Ok(());
    }
    let pending = DependencyGraph::incomplete_dependency_count(conn, &task.id)?;
    if can_transition(target, pending) {
        return Ok(());
    }
    warn!(task_id = %task.id, pending, "completion blocked by pending dependencies");
    Err(TaskError::Transition {
        reason: PENDING_DEPENDENCIES.to_string(),
        pending,
    })
}

/// Check, then write the new status. Nothing is written when the check fails.
pub fn apply(conn: &Connection, task: &Task, target: TaskStatus) -> Result<Task> {
    check(conn, task, target)?;
    let updated = TaskRepository::set_status(conn, &task.id, target)?;
    debug!(task_id = %task.id, from = %task.status, to = %target, "status changed");
    Ok(updated)
}
