//! Task registry
//!
//! Tasks are registered once during a definition phase and looked up by
//! name afterwards. Registration order is retained because the resolver
//! uses it to break topological ties deterministically.

use std::collections::HashMap;

use tracing::debug;

use crate::task::Task;

/// Errors from task registration and lookup
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A task with this name is already registered
    #[error("Task '{0}' is already registered")]
    DuplicateTask(String),

    /// No task with this name is registered
    #[error("Unknown task '{0}'")]
    UnknownTask(String),
}

/// Registry of all defined tasks, in registration order
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task, failing if its name is already taken
    pub fn define(&mut self, task: Task) -> Result<(), RegistryError> {
        let name = task.name().to_string();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateTask(name));
        }

        debug!(task = %name, "task registered");
        self.index.insert(name, self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    /// Look up a task by name
    pub fn get(&self, name: &str) -> Result<&Task, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.tasks[i])
            .ok_or_else(|| RegistryError::UnknownTask(name.to_string()))
    }

    /// Registration position of a task, if registered
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Iterate tasks in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Number of registered tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
