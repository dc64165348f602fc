//! In-memory configuration store for tests.

use std::time::SystemTime;

use parking_lot::Mutex;

use crate::error::{ConfigError, Result};
use crate::types::LoadedConfig;
use crate::ConfigStore;

/// A configuration store holding a replaceable in-memory snapshot.
#[derive(Debug)]
pub struct MockConfigStore {
    state: Mutex<MockState>,
}

#[derive(Debug)]
struct MockState {
    config: LoadedConfig,
    changed: bool,
    fail_next_load: Option<String>,
    loads: usize,
}

impl MockConfigStore {
    /// Create a store serving `config`.
    #[must_use]
    pub fn new(config: LoadedConfig) -> Self {
        Self {
            state: Mutex::new(MockState {
                config,
                changed: false,
                fail_next_load: None,
                loads: 0,
            }),
        }
    }

    /// Replace the served configuration and flag it as changed.
    pub fn replace(&self, config: LoadedConfig) {
        let mut state = self.state.lock();
        state.config = config;
        state.changed = true;
    }

    /// Flag the configuration as changed and make the next load fail.
    pub fn break_next_load(&self, reason: impl Into<String>) {
        let mut state = self.state.lock();
        state.changed = true;
        state.fail_next_load = Some(reason.into());
    }

    /// Number of load calls so far.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.state.lock().loads
    }
}

impl ConfigStore for MockConfigStore {
    fn load(&self) -> Result<LoadedConfig> {
        let mut state = self.state.lock();
        state.loads += 1;
        state.changed = false;
        if let Some(reason) = state.fail_next_load.take() {
            return Err(ConfigError::InvalidManager(reason));
        }
        Ok(state.config.clone())
    }

    fn changed_since(&self, _since: SystemTime) -> Result<bool> {
        Ok(self.state.lock().changed)
    }
}
