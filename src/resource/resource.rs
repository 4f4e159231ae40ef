// ABOUTME: Exclusive resource shared by two neighboring agents in the ring.
// ABOUTME: Non-blocking acquire, holder-checked release, and release notifications.

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::sync::futures::Notified;

use crate::error::ResourceError;

/// Position of an agent in the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AgentId(pub usize);

impl AgentId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position of a resource in the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ResourceId(pub usize);

impl ResourceId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// An exclusive lock with an identifiable holder.
///
/// # Lock Semantics
///
/// - **Single source of truth:** the holder lives inside the resource's own
///   mutex. It is held if and only if the holder is `Some`.
/// - **Non-blocking acquire:** `try_acquire()` never waits. Retry policy
///   belongs to the caller.
/// - **Ownership verification:** `release()` fails unless the requester is
///   the current holder.
/// - **Release notification:** every release wakes all `released()` futures
///   created before it.
#[derive(Debug)]
pub struct Resource {
    id: ResourceId,
    holder: Mutex<Option<AgentId>>,
    freed: Notify,
}

impl Resource {
    /// Create a free resource.
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            holder: Mutex::new(None),
            freed: Notify::new(),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Attempt to take the resource for `agent` without waiting.
    ///
    /// Returns `true` if the resource was free and is now held by `agent`.
    /// Returns `false` if someone else holds it.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `agent` already holds the resource.
    pub fn try_acquire(&self, agent: AgentId) -> bool {
        let mut holder = self.holder.lock();

        match *holder {
            None => {
                *holder = Some(agent);
                true
            }
            Some(current) => {
                debug_assert_ne!(
                    current, agent,
                    "agent {} acquired resource {} twice",
                    agent, self.id
                );
                false
            }
        }
    }

    /// Release the resource held by `agent` and wake waiters.
    ///
    /// Returns `Err(ResourceError::NotHolder)` if `agent` is not the holder,
    /// including when the resource is free.
    pub fn release(&self, agent: AgentId) -> Result<(), ResourceError> {
        {
            let mut holder = self.holder.lock();
            if *holder != Some(agent) {
                return Err(ResourceError::NotHolder {
                    resource: self.id,
                    holder: *holder,
                    requester: agent,
                });
            }
            *holder = None;
        }

        self.freed.notify_waiters();
        Ok(())
    }

    /// Current holder, read under the resource's lock.
    pub fn holder(&self) -> Option<AgentId> {
        *self.holder.lock()
    }

    pub fn is_free(&self) -> bool {
        self.holder().is_none()
    }

    /// Future that resolves on the next release.
    ///
    /// Create it *before* attempting to acquire: a release that happens
    /// between the failed attempt and the first poll is still observed.
    pub fn released(&self) -> Notified<'_> {
        self.freed.notified()
    }
}
