//! The process-wide store owner.
//!
//! A [`Runtime`] owns the state every context of one program shares: the
//! backup context registry and the probed capabilities of each engine. It is
//! created explicitly and handed to every context; dropping the last handle
//! tears the state down.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use unisono_engine::{ContextId, EngineProfile, NativeContext};

use crate::backup::BackupContextRegistry;
use crate::capabilities::Capabilities;

struct RuntimeState {
    backups: RefCell<BackupContextRegistry>,
    capabilities: RefCell<HashMap<String, Capabilities>>,
}

/// Shared state for a family of contexts. Clones share the same state.
#[derive(Clone)]
pub struct Runtime {
    state: Rc<RuntimeState>,
}

impl Runtime {
    /// Creates an empty runtime.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RuntimeState {
                backups: RefCell::new(BackupContextRegistry::new()),
                capabilities: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Capabilities of the engine described by `profile`, probed on first use.
    ///
    /// Results are cached by profile name.
    pub fn capabilities(&self, profile: &EngineProfile) -> Capabilities {
        if let Some(cached) = self.state.capabilities.borrow().get(&profile.name) {
            return *cached;
        }
        let probed = Capabilities::probe(profile);
        self.state
            .capabilities
            .borrow_mut()
            .insert(profile.name.clone(), probed);
        probed
    }

    /// Substitute construction target for a closed context, if one is needed.
    pub fn backup_for(&self, live: &NativeContext) -> Option<NativeContext> {
        let capabilities = self.capabilities(live.profile());
        self.state
            .backups
            .borrow_mut()
            .get_or_create_backup(live, &capabilities)
    }

    pub(crate) fn release_backup(&self, id: ContextId) {
        self.state.backups.borrow_mut().release(id);
    }

    /// Number of substitute contexts currently held.
    pub fn backup_count(&self) -> usize {
        self.state.backups.borrow().len()
    }

    /// Drops every cached probe result and substitute context.
    pub fn clear(&self) {
        self.state.backups.borrow_mut().clear();
        self.state.capabilities.borrow_mut().clear();
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("backups", &self.state.backups.borrow().len())
            .field(
                "probed_engines",
                &self.state.capabilities.borrow().keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}
