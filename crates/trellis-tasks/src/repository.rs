//! SQL data access for tasks.
//!
//! All methods take a `&Connection` and are stateless: they translate between
//! Rust types and SQL and nothing else. IDs are prefixed UUID v7 strings, so
//! they sort by creation time.

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;
use uuid::Uuid;

use crate::errors::{Result, TaskError};
use crate::types::{
    MAX_TITLE_CHARS, Page, Paginated, Task, TaskCreateParams, TaskFilter, TaskStatus,
    TaskUpdateParams,
};

/// Generate a prefixed UUID v7 ID.
pub(crate) fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::now_v7())
}

/// Current UTC timestamp as ISO 8601.
pub(crate) fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(TaskError::Validation("title must not be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(TaskError::Validation(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(())
}

/// Empty strings mean "no value" for optional text and FK columns.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Task repository for SQL CRUD operations.
pub struct TaskRepository;

impl TaskRepository {
    // ─────────────────────────────────────────────────────────────────────
    // CRUD
    // ─────────────────────────────────────────────────────────────────────

    /// Create a task. Status defaults to `pending`.
    pub fn create_task(conn: &Connection, params: &TaskCreateParams) -> Result<Task> {
        validate_title(&params.title)?;

        let id = generate_id("task");
        let now = now_iso();
        let status = params.status.unwrap_or_default();

        let _ = conn.execute(
            "INSERT INTO tasks (id, title, description, status, due_date, assigned_to,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                id,
                params.title,
                non_empty(params.description.as_deref()),
                status.as_sql(),
                params.due_date,
                non_empty(params.assigned_to.as_deref()),
                now,
            ],
        )?;

        debug!(task_id = %id, %status, "task created");
        Self::get_task(conn, &id)
    }

    /// Get a task by ID, or `None` if absent.
    pub fn find_task(conn: &Connection, id: &str) -> Result<Option<Task>> {
        let task = conn
            .query_row("SELECT * FROM tasks WHERE id = ?1", params![id], |row| {
                Ok(task_from_row(row))
            })
            .optional()?;
        Ok(task)
    }

    /// Get a task by ID. Fails with `NotFound` if absent.
    pub fn get_task(conn: &Connection, id: &str) -> Result<Task> {
        Self::find_task(conn, id)?.ok_or_else(|| TaskError::task_not_found(id))
    }

    /// Whether a task with this ID exists.
    pub fn task_exists(conn: &Connection, id: &str) -> Result<bool> {
        let exists = conn
            .query_row("SELECT 1 FROM tasks WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?
            .is_some();
        Ok(exists)
    }

    /// Apply a partial update. Only supplied fields change; `updated_at` is
    /// refreshed whenever anything is written.
    pub fn update_task(conn: &Connection, id: &str, updates: &TaskUpdateParams) -> Result<Task> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref title) = updates.title {
            validate_title(title)?;
            sets.push("title = ?");
            values.push(Box::new(title.clone()));
        }
        if let Some(ref desc) = updates.description {
            sets.push("description = ?");
            values.push(Box::new(non_empty(Some(desc.as_str())).map(str::to_owned)));
        }
        if let Some(status) = updates.status {
            sets.push("status = ?");
            values.push(Box::new(status.as_sql()));
        }
        if let Some(due) = updates.due_date {
            sets.push("due_date = ?");
            values.push(Box::new(due));
        }
        if let Some(ref assignee) = updates.assigned_to {
            sets.push("assigned_to = ?");
            values.push(Box::new(non_empty(Some(assignee.as_str())).map(str::to_owned)));
        }

        if sets.is_empty() {
            return Self::get_task(conn, id);
        }

        sets.push("updated_at = ?");
        values.push(Box::new(now_iso()));
        values.push(Box::new(id.to_string()));

        let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            values.iter().map(AsRef::as_ref).collect();
        let changed = conn.execute(&sql, params_refs.as_slice())?;

        if changed == 0 {
            return Err(TaskError::task_not_found(id));
        }
        Self::get_task(conn, id)
    }

    /// Set only the status column.
    pub fn set_status(conn: &Connection, id: &str, status: TaskStatus) -> Result<Task> {
        Self::update_task(
            conn,
            id,
            &TaskUpdateParams {
                status: Some(status),
                ..Default::default()
            },
        )
    }

    /// Delete a task and every dependency edge touching it.
    pub fn delete_task(conn: &Connection, id: &str) -> Result<()> {
        let edges = conn.execute(
            "DELETE FROM task_dependencies WHERE task_id = ?1 OR dependency_id = ?1",
            params![id],
        )?;
        let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(TaskError::task_not_found(id));
        }
        debug!(task_id = id, edges, "task deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// List tasks matching `filter`, one page at a time, oldest first.
    ///
    /// The due-date range applies only when both bounds are given; a lone
    /// bound is ignored.
    pub fn list_tasks(conn: &Connection, filter: &TaskFilter, page: Page) -> Result<Paginated<Task>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            values.push(Box::new(status.as_sql()));
        }
        if let Some(ref assignee) = filter.assigned_to {
            conditions.push("assigned_to = ?");
            values.push(Box::new(assignee.clone()));
        }
        match filter.due_range() {
            Some((from, to)) => {
                conditions.push("due_date BETWEEN ? AND ?");
                values.push(Box::new(from));
                values.push(Box::new(to));
            }
            None if filter.due_from.is_some() || filter.due_to.is_some() => {
                debug!(
                    from = ?filter.due_from,
                    to = ?filter.due_to,
                    "ignoring due-date bound without its counterpart"
                );
            }
            None => {}
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM tasks {where_clause}");
        let count_params: Vec<&dyn rusqlite::types::ToSql> =
            values.iter().map(AsRef::as_ref).collect();
        let total: u32 = conn.query_row(&count_sql, count_params.as_slice(), |row| row.get(0))?;

        let data_sql = format!(
            "SELECT * FROM tasks {where_clause} ORDER BY created_at, id LIMIT ? OFFSET ?"
        );
        let mut data_values = values;
        data_values.push(Box::new(page.per_page));
        data_values.push(Box::new(page.offset()));
        let data_params: Vec<&dyn rusqlite::types::ToSql> =
            data_values.iter().map(AsRef::as_ref).collect();

        let mut stmt = conn.prepare(&data_sql)?;
        let tasks = stmt
            .query_map(data_params.as_slice(), |row| Ok(task_from_row(row)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Paginated::new(tasks, total, page))
    }

    /// Every task assigned to `user_id`, oldest first.
    pub fn tasks_assigned_to(conn: &Connection, user_id: &str) -> Result<Vec<Task>> {
        let mut stmt =
            conn.prepare("SELECT * FROM tasks WHERE assigned_to = ?1 ORDER BY created_at, id")?;
        let tasks = stmt
            .query_map(params![user_id], |row| Ok(task_from_row(row)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }
}

// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn task_from_row(row: &rusqlite::Row<'_>) -> Task {
    let status_str: String = row.get_unwrap("status");

    Task {
        id: row.get_unwrap("id"),
        title: row.get_unwrap("title"),
        description: row.get_unwrap("description"),
        status: status_str.parse().unwrap_or_default(),
        due_date: row.get_unwrap("due_date"),
        assigned_to: row.get_unwrap("assigned_to"),
        created_at: row.get_unwrap("created_at"),
        updated_at: row.get_unwrap("updated_at"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
