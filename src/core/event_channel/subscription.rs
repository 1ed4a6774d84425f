//=========================================================================
// Subscriptions
//=========================================================================
//
// Callback types and registration records held by the EventChannel.
//
// Identity of a callback is the address of its `Arc` allocation, so the
// same closure registered twice is two entries but one identity.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Arc;

//=== Callback Types ======================================================

/// Subscriber invoked with the payload of a named event.
pub type Callback<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Subscriber invoked for every event, with the event name and payload.
pub type WildcardCallback<P> = Arc<dyn Fn(&str, &P) + Send + Sync>;

//=== SubscriptionToken ===================================================

/// Receipt returned by [`super::EventChannel::subscribe`].
///
/// Removes exactly the registration it was issued for, even when the same
/// callback is registered several times under one name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    event: String,
    id: u64,
}

impl SubscriptionToken {
    pub(super) fn new(event: &str, id: u64) -> Self {
        Self {
            event: event.to_owned(),
            id,
        }
    }

    /// Event name this registration listens to.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Channel-unique registration id.
    pub fn id(&self) -> u64 {
        self.id
    }
}

//=== Registration Records ================================================

pub(super) struct Subscription<P> {
    pub(super) id: u64,
    pub(super) callback: Callback<P>,
}

impl<P> Subscription<P> {
    pub(super) fn is_callback(&self, callback: &Callback<P>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.callback), Arc::as_ptr(callback))
    }
}

pub(super) fn same_wildcard<P>(a: &WildcardCallback<P>, b: &WildcardCallback<P>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

//=========================================================================
// Tests
//=========================================================================
