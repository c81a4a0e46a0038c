//! Core types for tasks, users and dependency views.
//!
//! Wire format is `snake_case` throughout, matching the JSON bodies the HTTP
//! layer accepts and returns.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Maximum title length in characters.
pub const MAX_TITLE_CHARS: usize = 255;

// ─────────────────────────────────────────────────────────────────────────────
// Enums
// ─────────────────────────────────────────────────────────────────────────────

/// Task status in the workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Pending,
    /// Currently being worked on.
    InProgress,
    /// Done.
    Completed,
    /// Abandoned.
    Canceled,
}

impl TaskStatus {
    /// All statuses, in workflow order.
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Canceled,
    ];

    /// SQL string representation (matches the `SQLite` CHECK constraint values).
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_sql() == s)
            .ok_or_else(|| {
                format!("invalid status '{s}': expected pending, in_progress, completed or canceled")
            })
    }
}

/// User role, used by the default authorization policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full control over every task.
    Manager,
    /// May view and progress tasks assigned to them.
    #[default]
    Member,
}

impl Role {
    /// SQL string representation.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Member => "member",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manager" => Ok(Self::Manager),
            "member" => Ok(Self::Member),
            other => Err(format!("invalid role '{other}': expected manager or member")),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entities
// ─────────────────────────────────────────────────────────────────────────────

/// A stored task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (`task-<uuid v7>`).
    pub id: String,
    /// Short title, 1 to 255 characters.
    pub title: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Workflow status.
    pub status: TaskStatus,
    /// Calendar due date.
    pub due_date: NaiveDate,
    /// Assigned user ID, if any.
    pub assigned_to: Option<String>,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 timestamp of the last write.
    pub updated_at: String,
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier (`user-<uuid v7>`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Unique email address.
    pub email: String,
    /// Authorization role.
    pub role: Role,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Params
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskCreateParams {
    /// Task title (required).
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Due date (required).
    pub due_date: NaiveDate,
    /// Optional assignee user ID.
    pub assigned_to: Option<String>,
    /// Initial status (defaults to `pending`).
    pub status: Option<TaskStatus>,
}

/// Partial update of a task. Only `Some` fields are written.
///
/// An empty string for `description` or `assigned_to` clears the column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdateParams {
    /// New title.
    pub title: Option<String>,
    /// New description (empty clears).
    pub description: Option<String>,
    /// New due date.
    pub due_date: Option<NaiveDate>,
    /// New assignee (empty clears).
    pub assigned_to: Option<String>,
    /// New status.
    pub status: Option<TaskStatus>,
}

impl TaskUpdateParams {
    /// Whether no field would change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.assigned_to.is_none()
            && self.status.is_none()
    }
}

/// Parameters for creating a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserCreateParams {
    /// Display name.
    pub name: String,
    /// Email address (must be unique).
    pub email: String,
    /// Role.
    pub role: Role,
}

// ─────────────────────────────────────────────────────────────────────────────
// Listing
// ─────────────────────────────────────────────────────────────────────────────

/// Filter for task listing. Every field combines with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    /// Exact status match.
    pub status: Option<TaskStatus>,
    /// Exact assignee match.
    pub assigned_to: Option<String>,
    /// Inclusive lower due-date bound. Only applied together with `due_to`.
    pub due_from: Option<NaiveDate>,
    /// Inclusive upper due-date bound. Only applied together with `due_from`.
    pub due_to: Option<NaiveDate>,
}

impl TaskFilter {
    /// The due-date range, if both bounds are present.
    pub fn due_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.due_from.zip(self.due_to)
    }
}

/// Caller-supplied pagination, before limits are applied.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: Option<u32>,
    /// Requested page size.
    pub limit: Option<u32>,
}

/// A resolved page: 1-based number and a size within limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    /// Rows per page.
    pub per_page: u32,
}

impl Page {
    /// Row offset for this page.
    pub fn offset(self) -> u32 {
        self.number.saturating_sub(1).saturating_mul(self.per_page)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: 1,
            per_page: 10,
        }
    }
}

/// Default and maximum page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Page size when the caller gives none.
    pub default_per_page: u32,
    /// Upper bound for a caller-supplied page size.
    pub max_per_page: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_per_page: 10,
            max_per_page: 100,
        }
    }
}

impl PageLimits {
    /// Resolve a request into a concrete page, clamping the size to
    /// `1..=max_per_page` and the number to at least 1.
    pub fn resolve(self, request: PageRequest) -> Page {
        let max = self.max_per_page.max(1);
        Page {
            number: request.page.unwrap_or(1).max(1),
            per_page: request
                .limit
                .unwrap_or(self.default_per_page)
                .clamp(1, max),
        }
    }
}

/// One page of results plus pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Items on this page.
    pub data: Vec<T>,
    /// Total matching rows across all pages.
    pub total: u32,
    /// 1-based page number.
    pub page: u32,
    /// Rows per page.
    pub per_page: u32,
    /// Number of the last page (at least 1).
    pub last_page: u32,
}

impl<T> Paginated<T> {
    /// Build a page and derive `last_page`.
    pub fn new(data: Vec<T>, total: u32, page: Page) -> Self {
        let last_page = total.div_ceil(page.per_page.max(1)).max(1);
        Self {
            data,
            total,
            page: page.number,
            per_page: page.per_page,
            last_page,
        }
    }

    /// Transform each item, keeping the metadata.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Paginated<U>, E> {
        Ok(Paginated {
            data: self.data.into_iter().map(f).collect::<Result<_, _>>()?,
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            last_page: self.last_page,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Views
// ─────────────────────────────────────────────────────────────────────────────

/// Public summary of a user, embedded in task views and returned as profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    /// User ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Lightweight summary of a dependency task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySummary {
    /// Task ID.
    pub id: String,
    /// Task title.
    pub title: String,
    /// Task status.
    pub status: TaskStatus,
    /// Task due date.
    pub due_date: NaiveDate,
}

impl From<Task> for DependencySummary {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            status: task.status,
            due_date: task.due_date,
        }
    }
}

/// A task with its assignee and direct dependencies resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    /// The stored task fields.
    #[serde(flatten)]
    pub task: Task,
    /// The assigned user, if any.
    pub assignee: Option<UserSummary>,
    /// Direct dependencies.
    pub dependencies: Vec<DependencySummary>,
}
