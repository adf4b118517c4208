//! Per-session dependency scope.

use crate::config::{GateConfig, ToolgateConfig};
use crate::filter::ToolCallFilter;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// The dependencies owned by one chat session.
///
/// Each scope holds its own [`ToolCallFilter`]. Clones share it, so the UI
/// layer can subscribe through one clone while the client built from
/// another clone consults it.
#[derive(Debug, Clone)]
pub struct SessionScope {
    id: Uuid,
    filter: Arc<ToolCallFilter>,
    created_at: DateTime<Utc>,
}

impl Default for SessionScope {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionScope {
    /// Creates a scope with a fresh filter and the default gate configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(GateConfig::default())
    }

    /// Creates a scope whose filter uses `config`.
    #[must_use]
    pub fn with_config(config: GateConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            filter: Arc::new(ToolCallFilter::with_config(config)),
            created_at: Utc::now(),
        }
    }

    /// Creates a scope using the gate section of `config`.
    #[must_use]
    pub fn from_config(config: &ToolgateConfig) -> Self {
        Self::with_config(config.gate.clone())
    }

    /// Returns the session ID.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the session's filter.
    #[must_use]
    pub fn filter(&self) -> &Arc<ToolCallFilter> {
        &self.filter
    }

    /// Returns when the scope was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
