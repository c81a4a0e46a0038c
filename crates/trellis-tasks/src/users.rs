//! SQL data access for users.
//!
//! Users are referenced by tasks as assignees and resolved into actors by the
//! HTTP layer. Registration and credentials live outside this crate.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::{Result, TaskError};
use crate::repository::{generate_id, now_iso};
use crate::types::{User, UserCreateParams};

/// User repository.
pub struct UserRepository;

impl UserRepository {
    /// Create a user. Email must be unique.
    pub fn create_user(conn: &Connection, params: &UserCreateParams) -> Result<User> {
        let name = params.name.trim();
        let email = params.email.trim();
        if name.is_empty() {
            return Err(TaskError::Validation("name must not be empty".into()));
        }
        if !email.contains('@') {
            return Err(TaskError::Validation(format!("invalid email '{email}'")));
        }
        if Self::find_by_email(conn, email)?.is_some() {
            return Err(TaskError::Validation(format!("email '{email}' is already taken")));
        }

        let id = generate_id("user");
        let _ = conn.execute(
            "INSERT INTO users (id, name, email, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, name, email, params.role.as_sql(), now_iso()],
        )?;
        Self::get_user(conn, &id)
    }

    /// Get a user by ID, or `None` if absent.
    pub fn find_user(conn: &Connection, id: &str) -> Result<Option<User>> {
        let user = conn
            .query_row("SELECT * FROM users WHERE id = ?1", params![id], |row| {
                Ok(user_from_row(row))
            })
            .optional()?;
        Ok(user)
    }

    /// Get a user by ID. Fails with `NotFound` if absent.
    pub fn get_user(conn: &Connection, id: &str) -> Result<User> {
        Self::find_user(conn, id)?.ok_or_else(|| TaskError::user_not_found(id))
    }

    /// Look a user up by email.
    pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
        let user = conn
            .query_row("SELECT * FROM users WHERE email = ?1", params![email], |row| {
                Ok(user_from_row(row))
            })
            .optional()?;
        Ok(user)
    }

    /// All users, oldest first.
    pub fn list_users(conn: &Connection) -> Result<Vec<User>> {
        let mut stmt = conn.prepare("SELECT * FROM users ORDER BY created_at, id")?;
        let users = stmt
            .query_map([], |row| Ok(user_from_row(row)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> User {
    let role_str: String = row.get_unwrap("role");
    User {
        id: row.get_unwrap("id"),
        name: row.get_unwrap("name"),
        email: row.get_unwrap("email"),
        role: role_str.parse().unwrap_or_default(),
        created_at: row.get_unwrap("created_at"),
    }
}
