//! Substitute contexts for engines that refuse construction once closed.
//!
//! Some engines reject every node constructor after their context closed.
//! The registry hands out one minimal substitute context per closed context
//! so construction can be redirected there instead of failing.

use std::collections::HashMap;

use unisono_engine::{ContextId, NativeContext};

use crate::capabilities::Capabilities;

const BACKUP_OFFLINE_SAMPLE_RATE: f32 = 44100.0;

/// Closed context id → substitute context.
#[derive(Debug, Default)]
pub struct BackupContextRegistry {
    backups: HashMap<ContextId, NativeContext>,
}

impl BackupContextRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the substitute for `live`, creating it on first use.
    ///
    /// Returns `None` when `live` is not closed or the engine still constructs
    /// nodes on closed contexts. Repeated calls for the same closed context
    /// return the same substitute.
    pub fn get_or_create_backup(
        &mut self,
        live: &NativeContext,
        capabilities: &Capabilities,
    ) -> Option<NativeContext> {
        if !live.is_closed() || capabilities.constructs_on_closed_context {
            return None;
        }
        if let Some(backup) = self.backups.get(&live.id()) {
            return Some(backup.clone());
        }

        let created = if live.is_offline() {
            NativeContext::offline(1, 1, BACKUP_OFFLINE_SAMPLE_RATE, live.profile().clone())
        } else {
            NativeContext::realtime(live.sample_rate(), live.profile().clone())
        };
        match created {
            Ok(backup) => {
                tracing::debug!("backup: {} -> {}", live.id(), backup.id());
                self.backups.insert(live.id(), backup.clone());
                Some(backup)
            }
            Err(err) => {
                tracing::warn!("backup: cannot create substitute for {}: {err}", live.id());
                None
            }
        }
    }

    /// Forgets the substitute of a context that is gone.
    pub fn release(&mut self, id: ContextId) {
        if self.backups.remove(&id).is_some() {
            tracing::trace!("backup: released {id}");
        }
    }

    /// Number of substitutes held.
    pub fn len(&self) -> usize {
        self.backups.len()
    }

    /// Returns `true` if no substitutes are held.
    pub fn is_empty(&self) -> bool {
        self.backups.is_empty()
    }

    /// Drops every substitute.
    pub fn clear(&mut self) {
        self.backups.clear();
    }
}
