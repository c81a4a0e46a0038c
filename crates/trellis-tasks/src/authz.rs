//! Capability checks for task operations.
//!
//! The service asks an [`Authorizer`] before every operation, passing the
//! acting user explicitly. [`RolePolicy`] is the default: managers may do
//! anything, members may view and progress tasks assigned to them.

use serde::{Deserialize, Serialize};

use crate::types::{Role, Task, User};

/// The authenticated identity performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// User ID.
    pub id: String,
    /// User role.
    pub role: Role,
}

impl Actor {
    /// Build an actor from parts.
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// Whether this actor is the assignee of `task`.
    pub fn is_assignee_of(&self, task: &Task) -> bool {
        task.assigned_to.as_deref() == Some(self.id.as_str())
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self::new(user.id.clone(), user.role)
    }
}

/// An action on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAction {
    /// Create a new task.
    Create,
    /// View a single task.
    Show,
    /// Edit fields or dependencies.
    Update,
    /// Delete a task.
    Delete,
    /// Change the assignee.
    Assign,
    /// Move through the status workflow.
    ChangeStatus,
}

impl TaskAction {
    /// Stable name, used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Show => "show",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Assign => "assign",
            Self::ChangeStatus => "change_status",
        }
    }
}

impl std::fmt::Display for TaskAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an action targets: the task type as a whole, or one task.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    /// The task kind (used for `create`).
    Kind,
    /// A specific stored task.
    Task(&'a Task),
}

/// Decides whether an actor may perform an action on a resource.
pub trait Authorizer: Send + Sync {
    /// `true` to allow.
    fn can(&self, actor: &Actor, action: TaskAction, resource: Resource<'_>) -> bool;
}

/// Role-based policy.
///
/// | action                  | manager | member                |
/// |-------------------------|---------|-----------------------|
/// | create/update/delete/assign | yes | no                    |
/// | show, change_status     | yes     | only if assigned      |
#[derive(Debug, Clone, Copy, Default)]
pub struct RolePolicy;

impl Authorizer for RolePolicy {
    fn can(&self, actor: &Actor, action: TaskAction, resource: Resource<'_>) -> bool {
        match actor.role {
            Role::Manager => true,
            Role::Member => match (action, resource) {
                (TaskAction::Show | TaskAction::ChangeStatus, Resource::Task(task)) => {
                    actor.is_assignee_of(task)
                }
                _ => false,
            },
        }
    }
}

/// Allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn can(&self, _actor: &Actor, _action: TaskAction, _resource: Resource<'_>) -> bool {
        true
    }
}
