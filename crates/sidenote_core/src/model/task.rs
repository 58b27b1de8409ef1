//! Task records and named task lists.
//!
//! # Responsibility
//! - Define the `task_lists` / `active_task_list` part of the data file.
//! - Provide list and task management used by the task panel.
//!
//! # Invariants
//! - After `normalize()` there is at least one list and `active` names one
//!   of them.
//! - List names are unique and non-blank; iteration order is sorted by name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Name used for the list created on first run or after repair.
pub const DEFAULT_TASK_LIST: &str = "Default";

/// One task; identity is its position in the owning list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

impl TaskRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: false,
        }
    }
}

/// Display filter for the active list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Open,
    Completed,
}

impl TaskFilter {
    fn accepts(self, task: &TaskRecord) -> bool {
        match self {
            Self::All => true,
            Self::Open => !task.completed,
            Self::Completed => task.completed,
        }
    }
}

/// Errors from task list management.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskListError {
    /// List name is blank after trim.
    BlankName,
    /// Task text is blank after trim.
    BlankTask,
    /// A list with this name already exists.
    DuplicateName(String),
    /// No list with this name exists.
    UnknownList(String),
    /// The only remaining list cannot be deleted.
    LastList,
    /// Task index does not exist in the active list.
    TaskIndexOutOfRange(usize),
}

impl Display for TaskListError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "task list name must not be blank"),
            Self::BlankTask => write!(f, "task text must not be blank"),
            Self::DuplicateName(name) => write!(f, "task list already exists: {name}"),
            Self::UnknownList(name) => write!(f, "task list not found: {name}"),
            Self::LastList => write!(f, "the last task list cannot be deleted"),
            Self::TaskIndexOutOfRange(index) => write!(f, "task index out of range: {index}"),
        }
    }
}

impl Error for TaskListError {}

/// All task lists plus the remembered active list name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListCollection {
    #[serde(rename = "task_lists")]
    pub lists: BTreeMap<String, Vec<TaskRecord>>,
    #[serde(rename = "active_task_list")]
    pub active: String,
}

impl Default for TaskListCollection {
    fn default() -> Self {
        let mut lists = BTreeMap::new();
        lists.insert(DEFAULT_TASK_LIST.to_string(), Vec::new());
        Self {
            lists,
            active: DEFAULT_TASK_LIST.to_string(),
        }
    }
}

impl TaskListCollection {
    /// Builds a collection and repairs it with [`Self::normalize`].
    pub fn new(lists: BTreeMap<String, Vec<TaskRecord>>, active: impl Into<String>) -> Self {
        let mut collection = Self {
            lists,
            active: active.into(),
        };
        collection.normalize();
        collection
    }

    /// Restores the collection invariants. Returns whether anything changed.
    pub fn normalize(&mut self) -> bool {
        let mut changed = false;
        if self.lists.is_empty() {
            self.lists.insert(DEFAULT_TASK_LIST.to_string(), Vec::new());
            changed = true;
        }
        if !self.lists.contains_key(&self.active) {
            if let Some(first) = self.lists.keys().next() {
                self.active = first.clone();
                changed = true;
            }
        }
        changed
    }

    /// Sorted list names.
    pub fn list_names(&self) -> Vec<&str> {
        self.lists.keys().map(String::as_str).collect()
    }

    pub fn active_name(&self) -> &str {
        &self.active
    }

    pub fn active_tasks(&self) -> &[TaskRecord] {
        self.lists
            .get(&self.active)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Active-list tasks matching `filter`, paired with their list index.
    pub fn filtered_tasks(&self, filter: TaskFilter) -> Vec<(usize, &TaskRecord)> {
        self.active_tasks()
            .iter()
            .enumerate()
            .filter(|(_, task)| filter.accepts(task))
            .collect()
    }

    /// Creates an empty list and makes it active.
    pub fn add_list(&mut self, name: &str) -> Result<(), TaskListError> {
        let name = normalize_name(name)?;
        if self.lists.contains_key(&name) {
            return Err(TaskListError::DuplicateName(name));
        }
        self.lists.insert(name.clone(), Vec::new());
        self.active = name;
        Ok(())
    }

    /// Makes an existing list active.
    pub fn select(&mut self, name: &str) -> Result<(), TaskListError> {
        if !self.lists.contains_key(name) {
            return Err(TaskListError::UnknownList(name.to_string()));
        }
        self.active = name.to_string();
        Ok(())
    }

    /// Renames the active list, keeping its tasks.
    pub fn rename_active(&mut self, new_name: &str) -> Result<(), TaskListError> {
        let new_name = normalize_name(new_name)?;
        if new_name == self.active {
            return Ok(());
        }
        if self.lists.contains_key(&new_name) {
            return Err(TaskListError::DuplicateName(new_name));
        }
        let tasks = self.lists.remove(&self.active).unwrap_or_default();
        self.lists.insert(new_name.clone(), tasks);
        self.active = new_name;
        Ok(())
    }

    /// Deletes the active list; the previous list in sorted order becomes
    /// active.
    pub fn delete_active(&mut self) -> Result<(), TaskListError> {
        if self.lists.len() <= 1 {
            return Err(TaskListError::LastList);
        }
        let index = self
            .lists
            .keys()
            .position(|name| name == &self.active)
            .ok_or_else(|| TaskListError::UnknownList(self.active.clone()))?;
        self.lists.remove(&self.active);
        let next_index = index.saturating_sub(1);
        if let Some(next) = self.lists.keys().nth(next_index) {
            self.active = next.clone();
        }
        Ok(())
    }

    /// Moves the active list by `offset` positions, wrapping around.
    ///
    /// Returns `false` when there is nothing to switch to.
    pub fn switch_active(&mut self, offset: isize) -> bool {
        let count = self.lists.len();
        if count < 2 {
            return false;
        }
        let current = self
            .lists
            .keys()
            .position(|name| name == &self.active)
            .unwrap_or(0);
        let next = (current as isize + offset).rem_euclid(count as isize) as usize;
        if let Some(name) = self.lists.keys().nth(next) {
            self.active = name.clone();
        }
        true
    }

    /// Appends a task to the active list.
    pub fn add_task(&mut self, text: &str) -> Result<usize, TaskListError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TaskListError::BlankTask);
        }
        let tasks = self.active_tasks_mut();
        tasks.push(TaskRecord::new(text));
        Ok(tasks.len() - 1)
    }

    pub fn edit_task(&mut self, index: usize, text: &str) -> Result<(), TaskListError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TaskListError::BlankTask);
        }
        let task = self.task_mut(index)?;
        task.text = text.to_string();
        Ok(())
    }

    /// Flips the completion flag and returns the new value.
    pub fn toggle_task(&mut self, index: usize) -> Result<bool, TaskListError> {
        let task = self.task_mut(index)?;
        task.completed = !task.completed;
        Ok(task.completed)
    }

    pub fn remove_task(&mut self, index: usize) -> Result<TaskRecord, TaskListError> {
        let tasks = self.active_tasks_mut();
        if index >= tasks.len() {
            return Err(TaskListError::TaskIndexOutOfRange(index));
        }
        Ok(tasks.remove(index))
    }

    fn active_tasks_mut(&mut self) -> &mut Vec<TaskRecord> {
        self.lists.entry(self.active.clone()).or_default()
    }

    fn task_mut(&mut self, index: usize) -> Result<&mut TaskRecord, TaskListError> {
        self.active_tasks_mut()
            .get_mut(index)
            .ok_or(TaskListError::TaskIndexOutOfRange(index))
    }
}

fn normalize_name(value: &str) -> Result<String, TaskListError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TaskListError::BlankName);
    }
    Ok(trimmed.to_string())
}
