use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use objspace_kernel::{PlayerDirectory, Viewer};

use crate::session::Session;

/// Errors from directory bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("player directory full ({capacity} slots)")]
    Full { capacity: usize },
}

/// Fixed-capacity table of connected sessions.
///
/// Slots are reused after disconnect, so the table routinely has holes; only
/// occupied slots are ever handed out.
#[derive(Debug)]
pub struct SlotDirectory {
    slots: RwLock<Vec<Option<Arc<Session>>>>,
}

impl SlotDirectory {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: RwLock::new(vec![None; capacity]),
        }
    }

    pub fn capacity(&self) -> usize {
        self.read().len()
    }

    /// Place `session` in the lowest free slot and return its index.
    pub fn connect(&self, session: Arc<Session>) -> Result<usize, DirectoryError> {
        let mut slots = self.write();
        let capacity = slots.len();
        let Some(index) = slots.iter().position(Option::is_none) else {
            return Err(DirectoryError::Full { capacity });
        };
        tracing::debug!(player = %session.id(), slot = index, "session connected");
        slots[index] = Some(session);
        Ok(index)
    }

    /// Free `slot`, returning the session that held it.
    pub fn disconnect(&self, slot: usize) -> Option<Arc<Session>> {
        let session = self.write().get_mut(slot)?.take()?;
        tracing::debug!(player = %session.id(), slot, "session disconnected");
        Some(session)
    }

    pub fn get(&self, slot: usize) -> Option<Arc<Session>> {
        self.read().get(slot)?.clone()
    }

    pub fn connected_count(&self) -> usize {
        self.read().iter().flatten().count()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Option<Arc<Session>>>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Option<Arc<Session>>>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PlayerDirectory for SlotDirectory {
    fn for_each_connected(&self, visit: &mut dyn FnMut(&dyn Viewer)) {
        for session in self.read().iter().flatten() {
            visit(session.as_ref());
        }
    }
}
