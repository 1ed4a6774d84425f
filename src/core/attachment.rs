//=========================================================================
// Attachment Points
//=========================================================================
//
// Exclusive ownership of named mount locations.
//
// A host claims its attachment point before starting an engine and holds
// the claim until that engine is destroyed. Dropping the claim releases
// the name.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

//=== AttachmentRegistry ==================================================

/// Set of attachment points currently bound to a host.
///
/// Shared by cloning, like [`crate::core::event_channel::EventChannel`].
#[derive(Clone, Default)]
pub struct AttachmentRegistry {
    claimed: Arc<Mutex<HashSet<String>>>,
}

impl AttachmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn claimed(&self) -> MutexGuard<'_, HashSet<String>> {
        self.claimed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims `container`, or returns `None` if it is already bound.
    pub fn claim(&self, container: &str) -> Option<AttachmentClaim> {
        if !self.claimed().insert(container.to_owned()) {
            warn!("Attachment point '{}' is already bound", container);
            return None;
        }

        debug!("Claimed attachment point '{}'", container);
        Some(AttachmentClaim {
            registry: self.clone(),
            container: container.to_owned(),
        })
    }

    pub fn is_claimed(&self, container: &str) -> bool {
        self.claimed().contains(container)
    }

    pub fn len(&self) -> usize {
        self.claimed().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//=== AttachmentClaim =====================================================

/// Exclusive hold on one attachment point; released on drop.
#[derive(Debug)]
pub struct AttachmentClaim {
    registry: AttachmentRegistry,
    container: String,
}

impl AttachmentClaim {
    pub fn container(&self) -> &str {
        &self.container
    }
}

impl Drop for AttachmentClaim {
    fn drop(&mut self) {
        self.registry.claimed().remove(&self.container);
        debug!("Released attachment point '{}'", self.container);
    }
}

impl std::fmt::Debug for AttachmentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentRegistry")
            .field("claimed", &self.len())
            .finish()
    }
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_exclusive_until_dropped() {
        let registry = AttachmentRegistry::new();

        let claim = registry.claim("game-container").unwrap();
        assert_eq!(claim.container(), "game-container");
        assert!(registry.is_claimed("game-container"));
        assert!(registry.claim("game-container").is_none());

        drop(claim);
        assert!(!registry.is_claimed("game-container"));
        assert!(registry.claim("game-container").is_some());
    }

    #[test]
    fn distinct_points_are_independent() {
        let registry = AttachmentRegistry::new();

        let _a = registry.claim("left").unwrap();
        let _b = registry.claim("right").unwrap();

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn clones_share_claims() {
        let registry = AttachmentRegistry::new();
        let clone = registry.clone();

        let _claim = registry.claim("c1").unwrap();
        assert!(clone.is_claimed("c1"));
        assert!(clone.claim("c1").is_none());
    }

    #[test]
    fn new_registry_is_empty() {
        assert!(AttachmentRegistry::new().is_empty());
    }
}
