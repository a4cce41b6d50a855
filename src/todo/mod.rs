//! In-memory to-do list
//!
//! The store owns an append-only list of items and the counter used to mint
//! their identifiers. Operations never fail with an `Err`: every outcome,
//! including bad input, is returned as a [`TodoOutcome`] carrying a display
//! message and a snapshot of the list.


use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Prefix used for every generated item identifier
pub const TODO_ID_PREFIX: &str = "todo-";

/// Store shared between request handlers. The mutex guards `items` and
/// `next_id` together.
pub type SharedTodoStore = Arc<Mutex<TodoStore>>;

/// A single to-do entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

/// Why an operation was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TodoErrorKind {
    /// A required argument was empty or absent
    MissingInput,
    /// The supplied id does not match any stored item
    NotFound,
}

/// Success/error tag of a store operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoStatus {
    Success,
    Error(TodoErrorKind),
}

/// Result of an `add` or `complete` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoOutcome {
    pub status: TodoStatus,
    pub message: String,
    pub items: Vec<TodoItem>,
}

impl TodoOutcome {
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self.status, TodoStatus::Error(_))
    }

    #[inline]
    pub fn error_kind(&self) -> Option<TodoErrorKind> {
        match self.status {
            TodoStatus::Success => None,
            TodoStatus::Error(kind) => Some(kind),
        }
    }
}

/// Ordered to-do list with a monotonically increasing id counter
#[derive(Debug, Clone)]
pub struct TodoStore {
    items: Vec<TodoItem>,
    next_id: u64,
}

impl TodoStore {
    #[inline]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            next_id: 1,
        }
    }

    /// Wrap a fresh store for sharing across handlers
    #[inline]
    pub fn shared() -> SharedTodoStore {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Add an item with the trimmed `title`
    #[inline]
    pub fn add(&mut self, title: &str) -> TodoOutcome {
        let title = title.trim();
        if title.is_empty() {
            return self.rejected(TodoErrorKind::MissingInput, "Missing title.".to_string());
        }

        let item = TodoItem {
            id: format!("{}{}", TODO_ID_PREFIX, self.next_id),
            title: title.to_string(),
            completed: false,
        };
        self.items.push(item);
        self.next_id += 1;

        self.accepted(format!("Added \"{}\".", title))
    }

    /// Mark the item with exactly this `id` as completed.
    ///
    /// Completing an already completed item succeeds with the same message.
    #[inline]
    pub fn complete(&mut self, id: &str) -> TodoOutcome {
        if id.is_empty() {
            return self.rejected(
                TodoErrorKind::MissingInput,
                "Missing todo id.".to_string(),
            );
        }

        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            return self.rejected(
                TodoErrorKind::NotFound,
                format!("Todo {} was not found.", id),
            );
        };
        item.completed = true;
        let message = format!("Completed \"{}\".", item.title);

        self.accepted(message)
    }

    /// Snapshot of the current items in insertion order
    #[inline]
    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    /// Counter value the next created item will use
    #[inline]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn accepted(&self, message: String) -> TodoOutcome {
        TodoOutcome {
            status: TodoStatus::Success,
            message,
            items: self.items.clone(),
        }
    }

    fn rejected(&self, kind: TodoErrorKind, message: String) -> TodoOutcome {
        TodoOutcome {
            status: TodoStatus::Error(kind),
            message,
            items: self.items.clone(),
        }
    }
}

impl Default for TodoStore {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
