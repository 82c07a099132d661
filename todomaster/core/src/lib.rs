//! Core domain models and display rules for TodoMaster.
pub mod display;
pub mod filter;
pub mod task;

pub use display::{DueLabel, format_due_date, is_overdue, priority_classes, short_date};
pub use filter::{FilterMode, TodoStats};
pub use task::{NewTask, Priority, Task, TaskChanges, TaskError};
