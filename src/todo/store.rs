//! In-memory to-do store
//!
//! Entries keep their insertion order across deletions. Ids are v4 UUIDs and
//! are never handed out twice, even after the entry they named is deleted.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single to-do item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

/// Outcome of [`TodoStore::complete`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompleteOutcome {
    NotFound,
    AlreadyCompleted,
    Completed { title: String },
}

/// Outcome of [`TodoStore::delete`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    NotFound,
    Deleted { title: String },
}

#[derive(Debug, Default)]
pub struct TodoStore {
    /// Entries keyed by insertion sequence
    entries: BTreeMap<u64, Todo>,
    /// id -> insertion sequence, live entries only
    index: HashMap<String, u64>,
    /// Every id ever issued. Grows for the life of the store so a deleted
    /// id can never come back, at one string per add.
    issued: HashSet<String>,
    next_seq: u64,
}

impl TodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new, not yet completed item
    pub fn add(&mut self, title: impl Into<String>) -> Todo {
        let id = loop {
            let candidate = Uuid::new_v4().to_string();
            if self.issued.insert(candidate.clone()) {
                break candidate;
            }
        };

        let todo = Todo {
            id: id.clone(),
            title: title.into(),
            completed: false,
            created_at: Utc::now(),
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(id, seq);
        self.entries.insert(seq, todo.clone());

        tracing::debug!(id = %todo.id, title = %todo.title, "Added todo");
        todo
    }

    /// Mark an item completed. Completing twice leaves it unchanged.
    pub fn complete(&mut self, id: &str) -> CompleteOutcome {
        let Some(todo) = self.lookup_mut(id) else {
            return CompleteOutcome::NotFound;
        };

        if todo.completed {
            return CompleteOutcome::AlreadyCompleted;
        }

        todo.completed = true;
        CompleteOutcome::Completed {
            title: todo.title.clone(),
        }
    }

    pub fn delete(&mut self, id: &str) -> DeleteOutcome {
        let removed = self
            .index
            .remove(id)
            .and_then(|seq| self.entries.remove(&seq));

        match removed {
            Some(todo) => {
                tracing::debug!(id = %todo.id, "Deleted todo");
                DeleteOutcome::Deleted { title: todo.title }
            }
            None => DeleteOutcome::NotFound,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Todo> {
        self.index.get(id).and_then(|seq| self.entries.get(seq))
    }

    /// Snapshot of all live items in insertion order
    pub fn list(&self) -> Vec<Todo> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup_mut(&mut self, id: &str) -> Option<&mut Todo> {
        let seq = self.index.get(id)?;
        self.entries.get_mut(seq)
    }
}
