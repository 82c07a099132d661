use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How urgent a task is. New tasks default to `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Every priority, lowest first. Used to render select options.
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    /// Returns the lowercase name stored in the database and sent over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Returns the capitalised name shown to users.
    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(TaskError::UnknownPriority(s.to_string())),
        }
    }
}

/// Validation errors for task fields.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    #[error("Task title must not be empty")]
    EmptyTitle,
    #[error("Unknown priority '{0}'")]
    UnknownPriority(String),
    #[error("Unknown filter '{0}'")]
    UnknownFilter(String),
}

/// A stored task record.
///
/// `id`, `created_at` and `updated_at` are assigned by the record store, never by callers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Builds the record for freshly created `fields`, stamping both timestamps with `now`.
    pub fn from_new(id: Uuid, fields: NewTask, now: DateTime<Utc>) -> Self {
        Task {
            id,
            title: fields.title,
            description: fields.description,
            completed: fields.completed,
            priority: fields.priority,
            due_date: fields.due_date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges `changes` into this task and refreshes `updated_at`.
    ///
    /// `id` and `created_at` are never touched.
    pub fn apply(&mut self, changes: TaskChanges, now: DateTime<Utc>) {
        changes.apply_to(self);
        self.updated_at = next_update_stamp(self.updated_at, now);
    }
}

/// Current time truncated to the microsecond precision PostgreSQL keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Returns `now`, or one microsecond past `previous` if the clock has not moved beyond it.
pub fn next_update_stamp(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + Duration::microseconds(1);
    if now < floor { floor } else { now }
}

/// Fields supplied by a caller when creating a task.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    /// Creates an incomplete, medium priority task with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Trims the title and description. A blank description becomes `None`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::EmptyTitle`] if the title is blank after trimming.
    pub fn normalized(mut self) -> Result<Self, TaskError> {
        self.title = normalize_title(&self.title)?;
        self.description = normalize_description(self.description);
        Ok(self)
    }
}

/// A partial update. `None` leaves a field as it is.
///
/// The nullable fields use a nested `Option`: `Some(None)` clears the value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl TaskChanges {
    /// A change that only sets the completion flag.
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Default::default()
        }
    }

    /// Returns true when no field would change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }

    /// Trims a supplied title and description, rejecting a blank title.
    pub fn normalized(mut self) -> Result<Self, TaskError> {
        if let Some(title) = self.title.take() {
            self.title = Some(normalize_title(&title)?);
        }
        if let Some(description) = self.description.take() {
            self.description = Some(normalize_description(description));
        }
        Ok(self)
    }

    /// Writes every supplied field onto `task`. Does not touch timestamps.
    pub fn apply_to(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
    }
}

fn normalize_title(title: &str) -> Result<String, TaskError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TaskError::EmptyTitle);
    }
    Ok(trimmed.to_string())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_task() -> Task {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        Task::from_new(
            Uuid::new_v4(),
            NewTask::new("Buy milk").with_priority(Priority::Low),
            created,
        )
    }

    #[test]
    fn can_create_task_with_defaults() {
        let task = sample_task();

        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.priority, Priority::Low);
        assert!(!task.completed);
        assert_eq!(task.description, None);
        assert_eq!(task.due_date, None);
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn can_parse_priority_names() {
        assert_eq!("low".parse::<Priority>(), Ok(Priority::Low));
        assert_eq!(" Medium ".parse::<Priority>(), Ok(Priority::Medium));
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert_eq!(
            "urgent".parse::<Priority>(),
            Err(TaskError::UnknownPriority("urgent".to_string()))
        );
    }

    #[test]
    fn can_default_priority_to_medium() {
        assert_eq!(NewTask::new("x").priority, Priority::Medium);
    }

    #[test]
    fn can_normalize_new_task_fields() {
        let fields = NewTask::new("  Write report  ")
            .with_description("   ")
            .normalized()
            .unwrap();

        assert_eq!(fields.title, "Write report");
        assert_eq!(fields.description, None);
    }

    #[test]
    fn cannot_normalize_blank_title() {
        assert_eq!(
            NewTask::new(" \t ").normalized(),
            Err(TaskError::EmptyTitle)
        );
        let changes = TaskChanges {
            title: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(changes.normalized(), Err(TaskError::EmptyTitle));
    }

    #[test]
    fn can_apply_partial_changes_without_touching_identity() {
        let mut task = sample_task();
        let original = task.clone();
        let later = original.updated_at + Duration::minutes(5);

        task.apply(
            TaskChanges {
                title: Some("Buy oat milk".to_string()),
                description: Some(Some("From the corner shop".to_string())),
                ..Default::default()
            },
            later,
        );

        assert_eq!(task.id, original.id);
        assert_eq!(task.created_at, original.created_at);
        assert_eq!(task.title, "Buy oat milk");
        assert_eq!(task.description.as_deref(), Some("From the corner shop"));
        assert_eq!(task.priority, original.priority);
        assert_eq!(task.updated_at, later);
    }

    #[test]
    fn can_clear_nullable_fields() {
        let mut task = sample_task();
        task.description = Some("note".to_string());
        task.due_date = Some(task.created_at);

        TaskChanges {
            description: Some(None),
            due_date: Some(None),
            ..Default::default()
        }
        .apply_to(&mut task);

        assert_eq!(task.description, None);
        assert_eq!(task.due_date, None);
    }

    #[test]
    fn can_bump_update_stamp_when_clock_has_not_advanced() {
        let mut task = sample_task();
        let before = task.updated_at;

        task.apply(TaskChanges::default(), before);

        assert!(task.updated_at > before);
        assert_eq!(task.updated_at - before, Duration::microseconds(1));
    }

    #[test]
    fn can_detect_empty_changes() {
        assert!(TaskChanges::default().is_empty());
        assert!(!TaskChanges::completed(true).is_empty());
    }
}
