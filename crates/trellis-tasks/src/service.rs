//! Task use cases.
//!
//! [`TaskService`] owns the connection pool and an injected [`Authorizer`].
//! Every operation:
//!
//! - takes the acting user explicitly,
//! - runs in a single `BEGIN IMMEDIATE` transaction, so the guard's
//!   read-decide-write and any dependency sync commit or roll back together,
//! - returns a [`TaskView`] with assignee and dependencies resolved.

use std::sync::Arc;

use rusqlite::{Connection, TransactionBehavior};
use tracing::{info, instrument, warn};

use crate::authz::{Actor, Authorizer, Resource, TaskAction};
use crate::connection::ConnectionPool;
use crate::dependencies::DependencyGraph;
use crate::errors::{Result, TaskError};
use crate::guard;
use crate::repository::TaskRepository;
use crate::types::{
    DependencySummary, PageLimits, PageRequest, Paginated, Task, TaskCreateParams, TaskFilter,
    TaskStatus, TaskUpdateParams, TaskView, User, UserSummary,
};
use crate::users::UserRepository;

/// Task service with authorization and transactional orchestration.
#[derive(Clone)]
pub struct TaskService {
    pool: ConnectionPool,
    authorizer: Arc<dyn Authorizer>,
    limits: PageLimits,
}

impl TaskService {
    /// Create a service over `pool` using `authorizer` for capability checks.
    pub fn new(pool: ConnectionPool, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            pool,
            authorizer,
            limits: PageLimits::default(),
        }
    }

    /// Override the default and maximum page sizes.
    #[must_use]
    pub fn with_page_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    // ─────────────────────────────────────────────────────────────────────
    // Task operations
    // ─────────────────────────────────────────────────────────────────────

    /// Create a task, optionally attaching dependencies.
    #[instrument(skip_all, fields(actor = %actor.id))]
    pub fn create_task(
        &self,
        actor: &Actor,
        params: &TaskCreateParams,
        dependency_ids: Option<&[String]>,
    ) -> Result<TaskView> {
        self.authorize(actor, TaskAction::Create, Resource::Kind)?;
        self.in_transaction(|conn| {
            ensure_assignee(conn, params.assigned_to.as_deref())?;
            let task = TaskRepository::create_task(conn, params)?;
            if let Some(ids) = dependency_ids {
                DependencyGraph::attach(conn, &task.id, ids)?;
            }
            // A task created as completed must satisfy the guard like any other.
            guard::check(conn, &task, task.status)?;
            info!(task_id = %task.id, "task created");
            Self::resolve(conn, task)
        })
    }

    /// Show one task.
    #[instrument(skip_all, fields(actor = %actor.id, task_id = id))]
    pub fn get_task(&self, actor: &Actor, id: &str) -> Result<TaskView> {
        self.in_transaction(|conn| {
            let task = TaskRepository::get_task(conn, id)?;
            self.authorize(actor, TaskAction::Show, Resource::Task(&task))?;
            Self::resolve(conn, task)
        })
    }

    /// Apply a partial update. `Some(ids)` (even empty) replaces the
    /// dependency set. A status change still goes through the guard, judged
    /// against the dependency set after the replacement.
    #[instrument(skip_all, fields(actor = %actor.id, task_id = id))]
    pub fn update_task(
        &self,
        actor: &Actor,
        id: &str,
        params: &TaskUpdateParams,
        dependency_ids: Option<&[String]>,
    ) -> Result<TaskView> {
        self.in_transaction(|conn| {
            let task = TaskRepository::get_task(conn, id)?;
            self.authorize(actor, TaskAction::Update, Resource::Task(&task))?;
            ensure_assignee(conn, params.assigned_to.as_deref())?;

            if let Some(ids) = dependency_ids {
                DependencyGraph::sync(conn, id, ids)?;
            }
            if let Some(status) = params.status {
                guard::check(conn, &task, status)?;
            }
            let updated = TaskRepository::update_task(conn, id, params)?;
            info!(task_id = id, "task updated");
            Self::resolve(conn, updated)
        })
    }

    /// Assign a task to an existing user.
    #[instrument(skip_all, fields(actor = %actor.id, task_id = id))]
    pub fn assign_task(&self, actor: &Actor, id: &str, assignee: &str) -> Result<TaskView> {
        if assignee.is_empty() {
            return Err(TaskError::Validation("assigned_to is required".into()));
        }
        self.in_transaction(|conn| {
            let task = TaskRepository::get_task(conn, id)?;
            self.authorize(actor, TaskAction::Assign, Resource::Task(&task))?;
            let _ = UserRepository::get_user(conn, assignee)?;
            let updated = TaskRepository::update_task(
                conn,
                id,
                &TaskUpdateParams {
                    assigned_to: Some(assignee.to_string()),
                    ..Default::default()
                },
            )?;
            info!(task_id = id, assignee, "task assigned");
            Self::resolve(conn, updated)
        })
    }

    /// Move a task to `status`, subject to the transition guard.
    #[instrument(skip_all, fields(actor = %actor.id, task_id = id, status = %status))]
    pub fn change_status(&self, actor: &Actor, id: &str, status: TaskStatus) -> Result<TaskView> {
        self.in_transaction(|conn| {
            let task = TaskRepository::get_task(conn, id)?;
            self.authorize(actor, TaskAction::ChangeStatus, Resource::Task(&task))?;
            let updated = guard::apply(conn, &task, status)?;
            info!(task_id = id, from = %task.status, to = %status, "task status changed");
            Self::resolve(conn, updated)
        })
    }

    /// Delete a task and every edge touching it.
    #[instrument(skip_all, fields(actor = %actor.id, task_id = id))]
    pub fn delete_task(&self, actor: &Actor, id: &str) -> Result<()> {
        self.in_transaction(|conn| {
            let task = TaskRepository::get_task(conn, id)?;
            self.authorize(actor, TaskAction::Delete, Resource::Task(&task))?;
            TaskRepository::delete_task(conn, id)?;
            info!(task_id = id, "task deleted");
            Ok(())
        })
    }

    /// Filtered, paginated listing. No per-item authorization.
    #[instrument(skip_all, fields(actor = %actor.id))]
    pub fn list_tasks(
        &self,
        actor: &Actor,
        filter: &TaskFilter,
        request: PageRequest,
    ) -> Result<Paginated<TaskView>> {
        let page = self.limits.resolve(request);
        self.in_transaction(|conn| {
            TaskRepository::list_tasks(conn, filter, page)?
                .try_map(|task| Self::resolve(conn, task))
        })
    }

    /// Every task assigned to the actor.
    #[instrument(skip_all, fields(actor = %actor.id))]
    pub fn my_tasks(&self, actor: &Actor) -> Result<Vec<TaskView>> {
        self.in_transaction(|conn| {
            TaskRepository::tasks_assigned_to(conn, &actor.id)?
                .into_iter()
                .map(|task| Self::resolve(conn, task))
                .collect()
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────

    /// Load the user behind a verified token subject.
    pub fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        let conn = self.pool.get()?;
        UserRepository::find_user(&conn, user_id)
    }

    /// The acting user's own record.
    pub fn profile(&self, actor: &Actor) -> Result<User> {
        let conn = self.pool.get()?;
        UserRepository::get_user(&conn, &actor.id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────

    /// Hydrate a stored task with its assignee and direct dependencies.
    pub fn resolve(conn: &Connection, task: Task) -> Result<TaskView> {
        let assignee = match task.assigned_to.as_deref() {
            Some(user_id) => UserRepository::find_user(conn, user_id)?
                .as_ref()
                .map(UserSummary::from),
            None => None,
        };
        let dependencies = DependencyGraph::dependencies_of(conn, &task.id)?
            .into_iter()
            .map(DependencySummary::from)
            .collect();
        Ok(TaskView {
            task,
            assignee,
            dependencies,
        })
    }

    fn authorize(&self, actor: &Actor, action: TaskAction, resource: Resource<'_>) -> Result<()> {
        if self.authorizer.can(actor, action, resource) {
            return Ok(());
        }
        warn!(actor = %actor.id, role = %actor.role, %action, "action denied");
        Err(TaskError::Authorization { action })
    }

    fn in_transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&*tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// A non-empty assignee must name an existing user.
fn ensure_assignee(conn: &Connection, assignee: Option<&str>) -> Result<()> {
    match assignee {
        Some(user_id) if !user_id.is_empty() => {
            let _ = UserRepository::get_user(conn, user_id)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    use super::*;
    use crate::authz::{AllowAll, RolePolicy};
    use crate::connection::{self, ConnectionConfig};
    use crate::types::{Role, UserCreateParams};

    struct Fixture {
        service: TaskService,
        manager: Actor,
        member: Actor,
    }

    fn fixture() -> Fixture {
        let pool = connection::open(":memory:", &ConnectionConfig::default()).unwrap();
        let (manager, member) = {
            let conn = pool.get().unwrap();
            let m = UserRepository::create_user(
                &conn,
                &UserCreateParams {
                    name: "Manager".into(),
                    email: "manager@example.com".into(),
                    role: Role::Manager,
                },
            )
            .unwrap();
            let u = UserRepository::create_user(
                &conn,
                &UserCreateParams {
                    name: "Member".into(),
                    email: "member@example.com".into(),
                    role: Role::Member,
                },
            )
            .unwrap();
            (Actor::from(&m), Actor::from(&u))
        };
        Fixture {
            service: TaskService::new(pool, Arc::new(RolePolicy)),
            manager,
            member,
        }
    }

    fn params(title: &str) -> TaskCreateParams {
        TaskCreateParams {
            title: title.into(),
            due_date: NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn create_resolves_dependencies() {
        let f = fixture();
        let a = f.service.create_task(&f.manager, &params("A"), None).unwrap();
        let b = f
            .service
            .create_task(&f.manager, &params("B"), Some(&[a.task.id.clone()]))
            .unwrap();

        assert_eq!(a.task.status, TaskStatus::Pending);
        assert_eq!(b.dependencies.len(), 1);
        assert_eq!(b.dependencies[0].id, a.task.id);
        assert_eq!(b.dependencies[0].title, "A");
        assert!(b.assignee.is_none());
    }

    #[test]
    fn create_with_missing_dependency_rolls_back() {
        let f = fixture();
        let result = f.service.create_task(
            &f.manager,
            &params("Orphan"),
            Some(&["task-missing".to_string()]),
        );
        assert_matches!(result, Err(TaskError::NotFound { .. }));

        let page = f
            .service
            .list_tasks(&f.manager, &TaskFilter::default(), PageRequest::default())
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[test]
    fn create_with_unknown_assignee_is_not_found() {
        let f = fixture();
        let result = f.service.create_task(
            &f.manager,
            &TaskCreateParams {
                assigned_to: Some("user-ghost".into()),
                ..params("A")
            },
            None,
        );
        assert_matches!(result, Err(TaskError::NotFound { entity: "User", .. }));
    }

    #[test]
    fn create_completed_with_pending_dependency_is_blocked() {
        let f = fixture();
        let a = f.service.create_task(&f.manager, &params("A"), None).unwrap();
        let result = f.service.create_task(
            &f.manager,
            &TaskCreateParams {
                status: Some(TaskStatus::Completed),
                ..params("B")
            },
            Some(&[a.task.id.clone()]),
        );
        assert_matches!(result, Err(TaskError::Transition { pending: 1, .. }));
    }

    #[test]
    fn member_cannot_create() {
        let f = fixture();
        let result = f.service.create_task(&f.member, &params("A"), None);
        assert_matches!(
            result,
            Err(TaskError::Authorization {
                action: TaskAction::Create
            })
        );
    }

    #[test]
    fn member_sees_only_assigned_tasks() {
        let f = fixture();
        let task = f.service.create_task(&f.manager, &params("A"), None).unwrap();
        assert_matches!(
            f.service.get_task(&f.member, &task.task.id),
            Err(TaskError::Authorization { .. })
        );

        let assigned = f
            .service
            .assign_task(&f.manager, &task.task.id, &f.member.id)
            .unwrap();
        assert_eq!(assigned.assignee.as_ref().unwrap().email, "member@example.com");

        let view = f.service.get_task(&f.member, &task.task.id).unwrap();
        assert_eq!(view.task.assigned_to.as_deref(), Some(f.member.id.as_str()));
    }

    #[test]
    fn member_can_progress_assigned_task() {
        let f = fixture();
        let task = f
            .service
            .create_task(
                &f.manager,
                &TaskCreateParams {
                    assigned_to: Some(f.member.id.clone()),
                    ..params("A")
                },
                None,
            )
            .unwrap();
        let view = f
            .service
            .change_status(&f.member, &task.task.id, TaskStatus::InProgress)
            .unwrap();
        assert_eq!(view.task.status, TaskStatus::InProgress);

        assert_matches!(
            f.service.delete_task(&f.member, &task.task.id),
            Err(TaskError::Authorization {
                action: TaskAction::Delete
            })
        );
    }

    #[test]
    fn update_syncs_dependencies_and_fields() {
        let f = fixture();
        let a = f.service.create_task(&f.manager, &params("A"), None).unwrap();
        let b = f.service.create_task(&f.manager, &params("B"), None).unwrap();
        let t = f
            .service
            .create_task(&f.manager, &params("T"), Some(&[a.task.id.clone()]))
            .unwrap();

        let updated = f
            .service
            .update_task(
                &f.manager,
                &t.task.id,
                &TaskUpdateParams {
                    title: Some("T2".into()),
                    ..Default::default()
                },
                Some(&[b.task.id.clone()]),
            )
            .unwrap();
        assert_eq!(updated.task.title, "T2");
        let dep_ids: Vec<_> = updated.dependencies.iter().map(|d| d.id.clone()).collect();
        assert_eq!(dep_ids, vec![b.task.id.clone()]);

        let cleared = f
            .service
            .update_task(&f.manager, &t.task.id, &TaskUpdateParams::default(), Some(&[]))
            .unwrap();
        assert!(cleared.dependencies.is_empty());
    }

    #[test]
    fn update_without_dependency_ids_keeps_edges() {
        let f = fixture();
        let a = f.service.create_task(&f.manager, &params("A"), None).unwrap();
        let t = f
            .service
            .create_task(&f.manager, &params("T"), Some(&[a.task.id.clone()]))
            .unwrap();
        let updated = f
            .service
            .update_task(
                &f.manager,
                &t.task.id,
                &TaskUpdateParams {
                    description: Some("more".into()),
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(updated.dependencies.len(), 1);
    }

    #[test]
    fn update_cycle_rolls_back_field_changes() {
        let f = fixture();
        let a = f.service.create_task(&f.manager, &params("A"), None).unwrap();
        let b = f
            .service
            .create_task(&f.manager, &params("B"), Some(&[a.task.id.clone()]))
            .unwrap();

        let result = f.service.update_task(
            &f.manager,
            &a.task.id,
            &TaskUpdateParams {
                title: Some("renamed".into()),
                ..Default::default()
            },
            Some(&[b.task.id.clone()]),
        );
        assert_matches!(result, Err(TaskError::CircularDependency { .. }));

        let a_now = f.service.get_task(&f.manager, &a.task.id).unwrap();
        assert_eq!(a_now.task.title, "A");
        assert!(a_now.dependencies.is_empty());
    }

    #[test]
    fn update_status_goes_through_guard() {
        let f = fixture();
        let a = f.service.create_task(&f.manager, &params("A"), None).unwrap();
        let t = f
            .service
            .create_task(&f.manager, &params("T"), Some(&[a.task.id.clone()]))
            .unwrap();
        let result = f.service.update_task(
            &f.manager,
            &t.task.id,
            &TaskUpdateParams {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
            None,
        );
        assert_matches!(result, Err(TaskError::Transition { .. }));

        // Dropping the dependency in the same update unblocks completion.
        let done = f
            .service
            .update_task(
                &f.manager,
                &t.task.id,
                &TaskUpdateParams {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
                Some(&[]),
            )
            .unwrap();
        assert_eq!(done.task.status, TaskStatus::Completed);
    }

    #[test]
    fn change_status_blocked_then_allowed() {
        let f = fixture();
        let a = f.service.create_task(&f.manager, &params("A"), None).unwrap();
        let b = f
            .service
            .create_task(&f.manager, &params("B"), Some(&[a.task.id.clone()]))
            .unwrap();

        assert_matches!(
            f.service
                .change_status(&f.manager, &b.task.id, TaskStatus::Completed),
            Err(TaskError::Transition { .. })
        );
        f.service
            .change_status(&f.manager, &a.task.id, TaskStatus::Completed)
            .unwrap();
        let b_done = f
            .service
            .change_status(&f.manager, &b.task.id, TaskStatus::Completed)
            .unwrap();
        assert_eq!(b_done.task.status, TaskStatus::Completed);
        assert_eq!(b_done.dependencies[0].status, TaskStatus::Completed);
    }

    #[test]
    fn assign_requires_existing_user() {
        let f = fixture();
        let t = f.service.create_task(&f.manager, &params("T"), None).unwrap();
        assert_matches!(
            f.service.assign_task(&f.manager, &t.task.id, "user-ghost"),
            Err(TaskError::NotFound { entity: "User", .. })
        );
        assert_matches!(
            f.service.assign_task(&f.manager, &t.task.id, ""),
            Err(TaskError::Validation(_))
        );
    }

    #[test]
    fn delete_removes_task_and_edges() {
        let f = fixture();
        let a = f.service.create_task(&f.manager, &params("A"), None).unwrap();
        let b = f
            .service
            .create_task(&f.manager, &params("B"), Some(&[a.task.id.clone()]))
            .unwrap();
        f.service.delete_task(&f.manager, &a.task.id).unwrap();

        assert_matches!(
            f.service.get_task(&f.manager, &a.task.id),
            Err(TaskError::NotFound { .. })
        );
        let b_now = f.service.get_task(&f.manager, &b.task.id).unwrap();
        assert!(b_now.dependencies.is_empty());
    }

    #[test]
    fn list_uses_page_limits() {
        let f = fixture();
        let service = f.service.clone().with_page_limits(PageLimits {
            default_per_page: 2,
            max_per_page: 3,
        });
        for i in 0..5 {
            service
                .create_task(&f.manager, &params(&format!("T{i}")), None)
                .unwrap();
        }
        let first = service
            .list_tasks(&f.manager, &TaskFilter::default(), PageRequest::default())
            .unwrap();
        assert_eq!(first.data.len(), 2);
        assert_eq!(first.total, 5);
        assert_eq!(first.last_page, 3);

        let clamped = service
            .list_tasks(
                &f.manager,
                &TaskFilter::default(),
                PageRequest {
                    page: Some(1),
                    limit: Some(50),
                },
            )
            .unwrap();
        assert_eq!(clamped.per_page, 3);
        assert_eq!(clamped.data.len(), 3);
    }

    #[test]
    fn my_tasks_returns_only_actor_tasks() {
        let f = fixture();
        let mine = f
            .service
            .create_task(
                &f.manager,
                &TaskCreateParams {
                    assigned_to: Some(f.member.id.clone()),
                    ..params("Mine")
                },
                None,
            )
            .unwrap();
        f.service.create_task(&f.manager, &params("Other"), None).unwrap();

        let tasks = f.service.my_tasks(&f.member).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task.id, mine.task.id);
        assert!(f.service.my_tasks(&f.manager).unwrap().is_empty());
    }

    #[test]
    fn allow_all_lets_members_manage() {
        let f = fixture();
        let service = TaskService::new(f.service.pool().clone(), Arc::new(AllowAll));
        let view = service.create_task(&f.member, &params("A"), None).unwrap();
        service.delete_task(&f.member, &view.task.id).unwrap();
    }

    #[test]
    fn profile_and_find_user() {
        let f = fixture();
        let me = f.service.profile(&f.member).unwrap();
        assert_eq!(me.email, "member@example.com");
        assert!(f.service.find_user("user-ghost").unwrap().is_none());
        assert_matches!(
            f.service.profile(&Actor::new("user-ghost", Role::Member)),
            Err(TaskError::NotFound { .. })
        );
    }
}
