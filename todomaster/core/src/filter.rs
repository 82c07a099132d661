use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskError};

/// Which tasks a list view shows. Never alters the underlying data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FilterMode {
    #[default]
    All,
    Active,
    Completed,
}

impl FilterMode {
    /// Every mode, in the order the filter tabs are shown.
    pub const ALL: [FilterMode; 3] = [FilterMode::All, FilterMode::Active, FilterMode::Completed];

    /// Returns true if `task` belongs in this view.
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Active => !task.completed,
            FilterMode::Completed => task.completed,
        }
    }

    /// Returns the query-string value for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::All => "all",
            FilterMode::Active => "active",
            FilterMode::Completed => "completed",
        }
    }

    /// Returns the tab label for this mode.
    pub fn label(&self) -> &'static str {
        match self {
            FilterMode::All => "All",
            FilterMode::Active => "Active",
            FilterMode::Completed => "Completed",
        }
    }

    /// Heading shown when the view is empty.
    pub fn empty_heading(&self) -> &'static str {
        match self {
            FilterMode::All => "No tasks yet",
            FilterMode::Active => "No active tasks",
            FilterMode::Completed => "No completed tasks",
        }
    }

    /// Hint shown under the empty heading.
    pub fn empty_hint(&self) -> &'static str {
        match self {
            FilterMode::All => "Start by adding your first task above!",
            FilterMode::Active => "All tasks are completed. Great job!",
            FilterMode::Completed => "Complete some tasks to see them here.",
        }
    }

    /// Projects `tasks` onto this view, keeping their order.
    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        tasks.iter().filter(|task| self.matches(task)).collect()
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterMode {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(FilterMode::All),
            "active" => Ok(FilterMode::Active),
            "completed" => Ok(FilterMode::Completed),
            _ => Err(TaskError::UnknownFilter(s.to_string())),
        }
    }
}

/// Counts over a whole collection, independent of any filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TodoStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

impl TodoStats {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        tasks
            .into_iter()
            .fold(TodoStats::default(), |mut stats, task| {
                stats.total += 1;
                if task.completed {
                    stats.completed += 1;
                } else {
                    stats.active += 1;
                }
                stats
            })
    }

    /// Number of tasks the given view would show.
    pub fn count_for(&self, mode: FilterMode) -> usize {
        match mode {
            FilterMode::All => self.total,
            FilterMode::Active => self.active,
            FilterMode::Completed => self.completed,
        }
    }
}
