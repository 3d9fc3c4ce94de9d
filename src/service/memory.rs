//! In-process todo backend
//!
//! Implements the same contract as the REST API, keeping records in
//! insertion order. It also records how often each operation was called and
//! can be told to fail or hold upcoming calls, which is what the cache
//! protocol tests drive it with.

use crate::error::{TallyError, TallyResult};
use crate::service::TodoService;
use crate::todo::{Todo, TodoPatch};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;
use tracing::debug;
use uuid::Uuid;

/// Service operations, for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl Operation {
    fn failure_label(self) -> &'static str {
        match self {
            Self::List | Self::Get => "Fetch Failed",
            Self::Create => "Create Todo Failed",
            Self::Update => "Update Todo Failed",
            Self::Delete => "Delete Todo Failed",
        }
    }
}

/// Holds `update` calls until released
///
/// Each `release` lets one waiting (or future) update through; `open` lets
/// all of them through for good.
#[derive(Clone)]
pub struct UpdateGate {
    permits: Arc<Semaphore>,
}

impl UpdateGate {
    pub fn release(&self) {
        self.permits.add_permits(1);
    }

    pub fn open(&self) {
        self.permits.close();
    }
}

#[derive(Default)]
struct State {
    todos: Vec<Todo>,
    calls: HashMap<Operation, usize>,
    pending_failures: HashMap<Operation, usize>,
    next_seq: Option<u64>,
    gate: Option<Arc<Semaphore>>,
}

impl State {
    fn new_id(&mut self) -> String {
        match self.next_seq.as_mut() {
            Some(seq) => {
                let id = seq.to_string();
                *seq += 1;
                id
            }
            None => Uuid::new_v4().simple().to_string()[..8].to_string(),
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.todos.iter().position(|todo| todo.id == id)
    }

    fn not_found(operation: Operation, id: &str) -> TallyError {
        TallyError::service(operation.failure_label(), format!("todo {} not found", id))
    }
}

/// `TodoService` that keeps todos in memory
#[derive(Default)]
pub struct MemoryTodoService {
    state: Mutex<State>,
}

impl MemoryTodoService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `todos` already on the "server"
    pub fn with_todos(todos: Vec<Todo>) -> Self {
        Self {
            state: Mutex::new(State {
                todos,
                ..State::default()
            }),
        }
    }

    /// Assign ids "1", "2", ... continuing after the largest numeric id seen
    pub fn with_sequential_ids(self) -> Self {
        {
            let mut state = self.lock();
            let max = state
                .todos
                .iter()
                .filter_map(|todo| todo.id.parse::<u64>().ok())
                .max()
                .unwrap_or(0);
            state.next_seq = Some(max + 1);
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next call of `operation` fail
    pub fn fail_next(&self, operation: Operation) {
        *self.lock().pending_failures.entry(operation).or_default() += 1;
    }

    /// Hold every subsequent `update` until the returned gate releases it
    pub fn gate_updates(&self) -> UpdateGate {
        let permits = Arc::new(Semaphore::new(0));
        self.lock().gate = Some(Arc::clone(&permits));
        UpdateGate { permits }
    }

    /// Number of times `operation` was called, failed calls included
    pub fn calls(&self, operation: Operation) -> usize {
        self.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Snapshot of the server-side records
    pub fn todos(&self) -> Vec<Todo> {
        self.lock().todos.clone()
    }

    /// Count the call and consume a pending failure, if any
    fn enter(&self, operation: Operation) -> TallyResult<()> {
        let mut state = self.lock();
        *state.calls.entry(operation).or_default() += 1;

        if let Some(remaining) = state.pending_failures.get_mut(&operation) {
            if *remaining > 0 {
                *remaining -= 1;
                debug!("injected failure for {:?}", operation);
                return Err(TallyError::service(
                    operation.failure_label(),
                    "simulated server error",
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TodoService for MemoryTodoService {
    async fn list(&self) -> TallyResult<Vec<Todo>> {
        self.enter(Operation::List)?;
        Ok(self.lock().todos.clone())
    }

    async fn get_by_id(&self, id: &str) -> TallyResult<Todo> {
        self.enter(Operation::Get)?;
        let state = self.lock();
        state
            .position(id)
            .map(|index| state.todos[index].clone())
            .ok_or_else(|| State::not_found(Operation::Get, id))
    }

    async fn create(&self, content: &str) -> TallyResult<Todo> {
        self.enter(Operation::Create)?;
        let mut state = self.lock();
        let todo = Todo {
            id: state.new_id(),
            content: content.to_string(),
            is_done: false,
        };
        state.todos.push(todo.clone());
        Ok(todo)
    }

    async fn update(&self, id: &str, patch: &TodoPatch) -> TallyResult<Todo> {
        let gate = self.lock().gate.clone();
        if let Some(gate) = gate {
            // A closed gate lets everything through
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.enter(Operation::Update)?;
        let mut state = self.lock();
        let index = state
            .position(id)
            .ok_or_else(|| State::not_found(Operation::Update, id))?;
        let merged = state.todos[index].merged(patch);
        state.todos[index] = merged.clone();
        Ok(merged)
    }

    async fn delete(&self, id: &str) -> TallyResult<Todo> {
        self.enter(Operation::Delete)?;
        let mut state = self.lock();
        let index = state
            .position(id)
            .ok_or_else(|| State::not_found(Operation::Delete, id))?;
        Ok(state.todos.remove(index))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
