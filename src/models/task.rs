//! Task reference model
//!
//! Tasks and projects are owned by the surrounding project-management system.
//! Time entries only keep the task id and resolve the rest through [`TaskRef`].

use serde::{Deserialize, Serialize};

/// Resolved task reference: the owning project and display title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub task_id: i64,
    pub task_title: String,
    pub project_id: i64,
    pub project_name: String,
}
