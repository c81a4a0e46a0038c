//! Request bodies and query strings, and their validation into service params.
//!
//! Bodies deserialize leniently (every field optional, strings for dates and
//! statuses) so that a bad request reports every offending field at once
//! instead of failing on the first serde error.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use trellis_tasks::{
    MAX_TITLE_CHARS, PageRequest, TaskCreateParams, TaskFilter, TaskStatus, TaskUpdateParams,
};

use crate::error::{ApiError, FieldErrors};

/// Accepted due-date format.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Distinguish an explicit `null` (`Some(None)`) from an absent key (`None`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Collects field errors while a request is checked.
#[derive(Debug, Default)]
struct Checker {
    errors: FieldErrors,
}

impl Checker {
    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    fn title(&mut self, value: &str) -> String {
        let title = value.trim();
        if title.is_empty() {
            self.fail("title", "The title field is required.");
        } else if title.chars().count() > MAX_TITLE_CHARS {
            self.fail(
                "title",
                format!("The title may not be greater than {MAX_TITLE_CHARS} characters."),
            );
        }
        title.to_string()
    }

    fn date(&mut self, field: &str, value: &str) -> Option<NaiveDate> {
        let parsed = parse_date(value);
        if parsed.is_none() {
            self.fail(field, format!("The {field} is not a valid date (YYYY-MM-DD)."));
        }
        parsed
    }

    fn status(&mut self, value: &str) -> Option<TaskStatus> {
        match value.parse() {
            Ok(status) => Some(status),
            Err(_) => {
                self.fail("status", "The selected status is invalid.");
                None
            }
        }
    }

    fn dependency_ids(&mut self, ids: &[String]) {
        if ids.iter().any(|id| id.trim().is_empty()) {
            self.fail("dependency_ids", "Dependency ids must be non-empty strings.");
        }
    }

    fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation {
                errors: self.errors,
            })
        }
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Bodies
// ─────────────────────────────────────────────────────────────────────────────

/// `POST /api/tasks`
#[derive(Debug, Default, Deserialize)]
pub struct CreateTaskBody {
    /// Required.
    pub title: Option<String>,
    /// Optional.
    pub description: Option<String>,
    /// Required, `YYYY-MM-DD`.
    pub due_date: Option<String>,
    /// Optional user id.
    pub assigned_to: Option<String>,
    /// Optional initial status.
    pub status: Option<String>,
    /// Tasks the new task depends on.
    pub dependency_ids: Option<Vec<String>>,
}

impl CreateTaskBody {
    /// Validate into create params plus the dependency ids to attach.
    pub fn validate(self) -> Result<(TaskCreateParams, Option<Vec<String>>), ApiError> {
        let mut check = Checker::default();

        let title = match self.title.as_deref() {
            Some(title) => check.title(title),
            None => {
                check.fail("title", "The title field is required.");
                String::new()
            }
        };
        let due_date = match self.due_date.as_deref() {
            Some(raw) => check.date("due_date", raw),
            None => {
                check.fail("due_date", "The due_date field is required.");
                None
            }
        };
        let status = self.status.as_deref().and_then(|raw| check.status(raw));
        if let Some(ids) = &self.dependency_ids {
            check.dependency_ids(ids);
        }
        check.finish()?;

        let params = TaskCreateParams {
            title,
            description: self.description,
            due_date: due_date.unwrap_or_default(),
            assigned_to: self.assigned_to,
            status,
        };
        Ok((params, self.dependency_ids))
    }
}

/// `PUT /api/tasks/{id}`
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskBody {
    /// New title.
    pub title: Option<String>,
    /// New description; `null` clears it.
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    /// New due date.
    pub due_date: Option<String>,
    /// New assignee; `null` unassigns.
    #[serde(default, deserialize_with = "nullable")]
    pub assigned_to: Option<Option<String>>,
    /// New status, still subject to the completion guard.
    pub status: Option<String>,
    /// Replacement dependency set; `null` leaves it alone, `[]` clears it.
    pub dependency_ids: Option<Vec<String>>,
}

impl UpdateTaskBody {
    /// Validate into update params plus an optional replacement dependency set.
    pub fn validate(self) -> Result<(TaskUpdateParams, Option<Vec<String>>), ApiError> {
        let mut check = Checker::default();

        let title = self.title.as_deref().map(|title| check.title(title));
        let due_date = self
            .due_date
            .as_deref()
            .and_then(|raw| check.date("due_date", raw));
        let status = self.status.as_deref().and_then(|raw| check.status(raw));
        if let Some(ids) = &self.dependency_ids {
            check.dependency_ids(ids);
        }
        check.finish()?;

        let params = TaskUpdateParams {
            title,
            description: self.description.map(Option::unwrap_or_default),
            due_date,
            assigned_to: self.assigned_to.map(Option::unwrap_or_default),
            status,
        };
        Ok((params, self.dependency_ids))
    }
}

/// `PUT /api/tasks/{id}/change-status`
#[derive(Debug, Default, Deserialize)]
pub struct ChangeStatusBody {
    /// Target status.
    pub status: Option<String>,
}

impl ChangeStatusBody {
    /// The requested status.
    pub fn validate(self) -> Result<TaskStatus, ApiError> {
        let mut check = Checker::default();
        let status = match self.status.as_deref() {
            Some(raw) => check.status(raw),
            None => {
                check.fail("status", "The status field is required.");
                None
            }
        };
        check.finish()?;
        status.ok_or_else(|| ApiError::field("status", "The status field is required."))
    }
}

/// `PUT /api/tasks/{id}/assign`
#[derive(Debug, Default, Deserialize)]
pub struct AssignTaskBody {
    /// User id to assign.
    pub assigned_to: Option<String>,
}

impl AssignTaskBody {
    /// The assignee id.
    pub fn validate(self) -> Result<String, ApiError> {
        match self.assigned_to.map(|id| id.trim().to_string()) {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(ApiError::field(
                "assigned_to",
                "The assigned_to field is required.",
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Query strings
// ─────────────────────────────────────────────────────────────────────────────

/// `GET /api/tasks?status=&assigned_to=&from=&to=&limit=&page=`
#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    /// Exact status.
    pub status: Option<String>,
    /// Exact assignee id.
    pub assigned_to: Option<String>,
    /// Inclusive due-date lower bound.
    pub from: Option<String>,
    /// Inclusive due-date upper bound.
    pub to: Option<String>,
    /// Page size.
    pub limit: Option<String>,
    /// 1-based page.
    pub page: Option<String>,
}

impl ListTasksQuery {
    /// Validate into a filter and page request.
    pub fn validate(self) -> Result<(TaskFilter, PageRequest), ApiError> {
        let mut check = Checker::default();

        let status = self.status.as_deref().and_then(|raw| check.status(raw));
        let due_from = self.from.as_deref().and_then(|raw| check.date("from", raw));
        let due_to = self.to.as_deref().and_then(|raw| check.date("to", raw));
        let limit = self
            .limit
            .as_deref()
            .and_then(|raw| positive(&mut check, "limit", raw));
        let page = self
            .page
            .as_deref()
            .and_then(|raw| positive(&mut check, "page", raw));
        check.finish()?;

        let filter = TaskFilter {
            status,
            assigned_to: self.assigned_to.filter(|id| !id.is_empty()),
            due_from,
            due_to,
        };
        Ok((filter, PageRequest { page, limit }))
    }
}

fn positive(check: &mut Checker, field: &str, raw: &str) -> Option<u32> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            check.fail(field, format!("The {field} must be a positive integer."));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn field_errors(err: ApiError) -> FieldErrors {
        match err {
            ApiError::Validation { errors } => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn create_body_valid() {
        let body: CreateTaskBody = serde_json::from_value(json!({
            "title": "  Write docs ",
            "due_date": "2025-09-30",
            "dependency_ids": ["task-a"],
        }))
        .unwrap();
        let (params, deps) = body.validate().unwrap();
        assert_eq!(params.title, "Write docs");
        assert_eq!(params.due_date, NaiveDate::from_ymd_opt(2025, 9, 30).unwrap());
        assert_eq!(params.status, None);
        assert_eq!(deps, Some(vec!["task-a".to_string()]));
    }

    #[test]
    fn create_body_reports_every_field() {
        let body: CreateTaskBody = serde_json::from_value(json!({
            "status": "archived",
            "due_date": "30/09/2025",
        }))
        .unwrap();
        let errors = field_errors(body.validate().unwrap_err());
        assert!(errors.contains_key("title"));
        assert!(errors.contains_key("due_date"));
        assert!(errors.contains_key("status"));
    }

    #[test]
    fn title_length_is_bounded_by_chars() {
        let at_limit = "é".repeat(MAX_TITLE_CHARS);
        let body = CreateTaskBody {
            title: Some(at_limit),
            due_date: Some("2025-01-01".into()),
            ..Default::default()
        };
        assert!(body.validate().is_ok());

        let over = CreateTaskBody {
            title: Some("x".repeat(MAX_TITLE_CHARS + 1)),
            due_date: Some("2025-01-01".into()),
            ..Default::default()
        };
        let errors = field_errors(over.validate().unwrap_err());
        assert!(errors["title"][0].contains("255"));
    }

    #[test]
    fn blank_dependency_id_rejected() {
        let body = CreateTaskBody {
            title: Some("t".into()),
            due_date: Some("2025-01-01".into()),
            dependency_ids: Some(vec![" ".into()]),
            ..Default::default()
        };
        let errors = field_errors(body.validate().unwrap_err());
        assert!(errors.contains_key("dependency_ids"));
    }

    #[test]
    fn update_body_distinguishes_null_from_absent() {
        let body: UpdateTaskBody =
            serde_json::from_value(json!({ "description": null, "title": "New" })).unwrap();
        let (params, deps) = body.validate().unwrap();
        assert_eq!(params.description.as_deref(), Some(""));
        assert_eq!(params.title.as_deref(), Some("New"));
        assert!(params.assigned_to.is_none());
        assert!(deps.is_none());
    }

    #[test]
    fn update_body_empty_dependency_list_is_kept() {
        let body: UpdateTaskBody =
            serde_json::from_value(json!({ "dependency_ids": [] })).unwrap();
        let (params, deps) = body.validate().unwrap();
        assert!(params.is_empty());
        assert_eq!(deps, Some(vec![]));
    }

    #[test]
    fn update_body_rejects_blank_title() {
        let body: UpdateTaskBody = serde_json::from_value(json!({ "title": "   " })).unwrap();
        let errors = field_errors(body.validate().unwrap_err());
        assert!(errors.contains_key("title"));
    }

    #[test]
    fn change_status_body() {
        let ok = ChangeStatusBody {
            status: Some("completed".into()),
        };
        assert_eq!(ok.validate().unwrap(), TaskStatus::Completed);

        assert_matches!(
            ChangeStatusBody { status: None }.validate(),
            Err(ApiError::Validation { .. })
        );
        assert_matches!(
            ChangeStatusBody {
                status: Some("done".into())
            }
            .validate(),
            Err(ApiError::Validation { .. })
        );
    }

    #[test]
    fn assign_body_requires_id() {
        assert_eq!(
            AssignTaskBody {
                assigned_to: Some(" user-1 ".into())
            }
            .validate()
            .unwrap(),
            "user-1"
        );
        assert_matches!(
            AssignTaskBody {
                assigned_to: Some(String::new())
            }
            .validate(),
            Err(ApiError::Validation { .. })
        );
    }

    #[test]
    fn list_query_parses_filters() {
        let query = ListTasksQuery {
            status: Some("pending".into()),
            assigned_to: Some("user-1".into()),
            from: Some("2025-09-01".into()),
            to: Some("2025-09-30".into()),
            limit: Some("5".into()),
            page: Some("2".into()),
        };
        let (filter, page) = query.validate().unwrap();
        assert_eq!(filter.status, Some(TaskStatus::Pending));
        assert_eq!(filter.assigned_to.as_deref(), Some("user-1"));
        assert!(filter.due_range().is_some());
        assert_eq!(page.limit, Some(5));
        assert_eq!(page.page, Some(2));
    }

    #[test]
    fn list_query_rejects_bad_numbers_and_dates() {
        let query = ListTasksQuery {
            limit: Some("0".into()),
            page: Some("abc".into()),
            from: Some("yesterday".into()),
            ..Default::default()
        };
        let errors = field_errors(query.validate().unwrap_err());
        assert!(errors.contains_key("limit"));
        assert!(errors.contains_key("page"));
        assert!(errors.contains_key("from"));
    }
}
