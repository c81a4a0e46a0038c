//! # trellis-tasks
//!
//! Task store, dependency graph, status transition guard and the task
//! service that coordinates them, persisted in `SQLite`.
//!
//! - [`repository::TaskRepository`]: task CRUD and listing
//! - [`dependencies::DependencyGraph`]: the directed "depends on" relation
//! - [`guard`]: completion is blocked while a direct dependency is incomplete
//! - [`service::TaskService`]: authorized, transactional use cases
//! - [`authz`]: actors, actions and the [`authz::Authorizer`] seam

#![deny(unsafe_code)]

pub mod authz;
pub mod connection;
pub mod dependencies;
pub mod errors;
pub mod guard;
pub mod migrations;
pub mod repository;
pub mod service;
pub mod types;
pub mod users;

pub use authz::{Actor, AllowAll, Authorizer, Resource, RolePolicy, TaskAction};
pub use connection::{ConnectionConfig, ConnectionPool};
pub use dependencies::DependencyGraph;
pub use errors::{Result, TaskError};
pub use repository::TaskRepository;
pub use service::TaskService;
pub use types::*;
pub use users::UserRepository;
