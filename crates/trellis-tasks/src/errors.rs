//! Task error types.
//!
//! Every variant is a structured failure the caller is expected to handle;
//! the HTTP layer maps each one to a status code and response envelope.

use thiserror::Error;

use crate::authz::TaskAction;

/// Errors from task store, dependency graph, guard and service operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type ("Task" or "User").
        entity: &'static str,
        /// The ID that was looked up.
        id: String,
    },

    /// Malformed or impossible input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The actor lacks the capability for the action.
    #[error("Not authorized to {action} this task")]
    Authorization {
        /// The action that was denied.
        action: TaskAction,
    },

    /// A status change was blocked by the transition guard.
    #[error("Cannot mark task as completed: {reason} ({pending} incomplete)")]
    Transition {
        /// Why the transition was refused.
        reason: String,
        /// Number of direct dependencies that are not completed.
        pending: u32,
    },

    /// Adding the edge would make a task (transitively) depend on itself.
    #[error("Circular dependency: {task_id} → {dependency_id}")]
    CircularDependency {
        /// The dependent task.
        task_id: String,
        /// The dependency that closes the cycle.
        dependency_id: String,
    },

    /// Database operation failed.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failed.
    #[error("Migration error: {message}")]
    Migration {
        /// Which migration failed and why.
        message: String,
    },
}

impl TaskError {
    /// Create a not-found error for a task.
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Task",
            id: id.into(),
        }
    }

    /// Create a not-found error for a user.
    pub fn user_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "User",
            id: id.into(),
        }
    }

    /// Whether the error was caused by caller input rather than storage.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::Sqlite(_) | Self::Pool(_) | Self::Migration { .. }
        )
    }
}

/// Convenience type alias for task results.
pub type Result<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_not_found_display() {
        let err = TaskError::task_not_found("task-123");
        assert_eq!(err.to_string(), "Task not found: task-123");
    }

    #[test]
    fn user_not_found_display() {
        let err = TaskError::user_not_found("user-9");
        assert_eq!(err.to_string(), "User not found: user-9");
    }

    #[test]
    fn authorization_display_names_action() {
        let err = TaskError::Authorization {
            action: TaskAction::ChangeStatus,
        };
        assert_eq!(err.to_string(), "Not authorized to change_status this task");
    }

    #[test]
    fn transition_display_carries_count() {
        let err = TaskError::Transition {
            reason: "pending dependencies".into(),
            pending: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("pending dependencies"));
        assert!(msg.contains('2'));
    }

    #[test]
    fn client_error_classification() {
        assert!(TaskError::Validation("x".into()).is_client_error());
        assert!(TaskError::task_not_found("t").is_client_error());
        assert!(!TaskError::Sqlite(rusqlite::Error::QueryReturnedNoRows).is_client_error());
        assert!(
            !TaskError::Migration {
                message: "boom".into()
            }
            .is_client_error()
        );
    }
}
