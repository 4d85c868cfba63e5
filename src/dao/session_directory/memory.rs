//! Session directory kept in process memory and seeded from the configuration file.

use std::sync::Arc;

use dashmap::DashMap;
use futures::{FutureExt, future::BoxFuture};
use indexmap::IndexMap;
use tracing::debug;

use crate::{
    config::AppConfig,
    dao::{
        session_directory::SessionDirectory,
        storage::{DirectoryError, StorageResult},
    },
};

/// Drill list and relayed writes of one session.
#[derive(Debug, Clone, Default)]
pub struct SessionRecord {
    /// Ordered drill identifiers.
    pub drill_order: Vec<String>,
    /// Last completion flag written per drill.
    pub completions: IndexMap<String, bool>,
    /// Last note written per drill.
    pub notes: IndexMap<String, String>,
}

impl SessionRecord {
    /// Record with the given drill order and nothing written yet.
    pub fn new(drill_order: Vec<String>) -> Self {
        Self {
            drill_order,
            ..Self::default()
        }
    }
}

/// In-memory [`SessionDirectory`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    sessions: Arc<DashMap<String, SessionRecord>>,
}

impl InMemoryDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding every session listed in the configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        let directory = Self::new();
        for (session_id, drills) in config.sessions() {
            directory.insert_session(session_id.clone(), drills.clone());
        }
        directory
    }

    /// Register (or replace) a session.
    pub fn insert_session(&self, session_id: impl Into<String>, drill_order: Vec<String>) {
        self.sessions
            .insert(session_id.into(), SessionRecord::new(drill_order));
    }

    /// Builder-style variant of [`Self::insert_session`].
    pub fn with_session(self, session_id: impl Into<String>, drill_order: &[&str]) -> Self {
        self.insert_session(
            session_id,
            drill_order.iter().map(|drill| drill.to_string()).collect(),
        );
        self
    }

    /// Last completion flag recorded for a drill.
    pub fn completion(&self, session_id: &str, drill_id: &str) -> Option<bool> {
        self.sessions
            .get(session_id)
            .and_then(|record| record.completions.get(drill_id).copied())
    }

    /// Last note recorded for a drill.
    pub fn note(&self, session_id: &str, drill_id: &str) -> Option<String> {
        self.sessions
            .get(session_id)
            .and_then(|record| record.notes.get(drill_id).cloned())
    }

    fn update<F>(&self, session_id: &str, update: F) -> StorageResult<()>
    where
        F: FnOnce(&mut SessionRecord),
    {
        let mut record = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| DirectoryError::UnknownSession(session_id.to_string()))?;
        update(record.value_mut());
        Ok(())
    }
}

impl SessionDirectory for InMemoryDirectory {
    fn drill_order(
        &self,
        session_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<Vec<String>>>> {
        let order = self
            .sessions
            .get(&session_id)
            .map(|record| record.drill_order.clone());
        async move { Ok(order) }.boxed()
    }

    fn record_completion(
        &self,
        session_id: String,
        drill_id: String,
        completed: bool,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.update(&session_id, |record| {
            record.completions.insert(drill_id.clone(), completed);
        });
        debug!(%session_id, %drill_id, completed, "completion recorded in memory");
        async move { result }.boxed()
    }

    fn record_note(
        &self,
        session_id: String,
        drill_id: String,
        text: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.update(&session_id, |record| {
            record.notes.insert(drill_id.clone(), text);
        });
        debug!(%session_id, %drill_id, "note recorded in memory");
        async move { result }.boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        async { Ok(()) }.boxed()
    }
}
