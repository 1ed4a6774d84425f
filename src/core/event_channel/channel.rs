//=========================================================================
// EventChannel
//=========================================================================
//
// Named-event publish/subscribe with snapshot delivery.
//
// Pattern: subscribe → publish (snapshot, registration order) → unsubscribe
//
// Invariants:
// - Delivery order is registration order within one name, then wildcard
//   subscribers in their registration order.
// - A publish call delivers to the subscribers present when it started;
//   changes made by callbacks apply to the next publish.
// - The registry lock is never held while a callback runs.
// - A panicking subscriber is logged and skipped; the rest still receive
//   the event.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, trace};

//=== Internal Dependencies ===============================================

use super::subscription::{same_wildcard, Subscription};
use super::{Callback, SubscriptionToken, WildcardCallback};

//=== Registry ============================================================

struct Registry<P> {
    named: HashMap<String, Vec<Subscription<P>>>,
    wildcard: Vec<WildcardCallback<P>>,
}

impl<P> Registry<P> {
    fn new() -> Self {
        Self {
            named: HashMap::new(),
            wildcard: Vec::new(),
        }
    }

    /// Removes the first entry matching `pred` under `event`.
    fn remove_first(&mut self, event: &str, pred: impl Fn(&Subscription<P>) -> bool) -> bool {
        let Some(entries) = self.named.get_mut(event) else {
            return false;
        };
        let Some(pos) = entries.iter().position(pred) else {
            return false;
        };

        entries.remove(pos);
        if entries.is_empty() {
            self.named.remove(event);
        }
        true
    }
}

struct Shared<P> {
    registry: Mutex<Registry<P>>,
    next_id: AtomicU64,
}

//=== EventChannel ========================================================

/// Publish/subscribe channel keyed by event name.
///
/// Cloning is cheap and yields a handle to the same channel; create one per
/// process (or per test) and hand clones to every party that publishes or
/// listens.
///
/// # Examples
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use aetheric_bridge::core::event_channel::{Callback, EventChannel};
///
/// let channel = EventChannel::<i32>::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let sink = Arc::clone(&seen);
/// let cb: Callback<i32> = Arc::new(move |v: &i32| sink.lock().unwrap().push(*v));
/// channel.subscribe("score", cb.clone());
///
/// channel.publish("score", &5);
/// channel.unsubscribe("score", &cb);
/// channel.publish("score", &6);
///
/// assert_eq!(*seen.lock().unwrap(), vec![5]);
/// ```
pub struct EventChannel<P> {
    shared: Arc<Shared<P>>,
}

impl<P> Clone for EventChannel<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: 'static> EventChannel<P> {
    /// Creates an empty channel.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry<P>> {
        // Callbacks never run under this lock, so a poisoned guard still
        // holds a consistent registry.
        self.shared
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    //--- Registration -----------------------------------------------------

    /// Registers `callback` for `event`.
    ///
    /// Registering the same callback twice yields two deliveries per
    /// publish, one per registration.
    pub fn subscribe(&self, event: &str, callback: Callback<P>) -> SubscriptionToken {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);

        self.registry()
            .named
            .entry(event.to_owned())
            .or_default()
            .push(Subscription { id, callback });

        trace!("Subscribed #{} to '{}'", id, event);
        SubscriptionToken::new(event, id)
    }

    /// Removes the earliest registration of `callback` under `event`.
    ///
    /// Returns `false` (and changes nothing) when no registration matches.
    pub fn unsubscribe(&self, event: &str, callback: &Callback<P>) -> bool {
        let removed = self.registry().remove_first(event, |s| s.is_callback(callback));
        if !removed {
            trace!("Unsubscribe from '{}' matched no registration", event);
        }
        removed
    }

    /// Removes exactly the registration `token` was issued for.
    pub fn unsubscribe_token(&self, token: &SubscriptionToken) -> bool {
        self.registry()
            .remove_first(token.event(), |s| s.id == token.id())
    }

    /// Registers a callback that receives every published event.
    pub fn subscribe_all(&self, callback: WildcardCallback<P>) {
        self.registry().wildcard.push(callback);
    }

    /// Removes the earliest wildcard registration of `callback`.
    pub fn unsubscribe_all(&self, callback: &WildcardCallback<P>) -> bool {
        let mut registry = self.registry();
        match registry.wildcard.iter().position(|c| same_wildcard(c, callback)) {
            Some(pos) => {
                registry.wildcard.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Drops every registration for `event`.
    pub fn clear(&self, event: &str) {
        if let Some(entries) = self.registry().named.remove(event) {
            debug!("Cleared {} subscriber(s) from '{}'", entries.len(), event);
        }
    }

    /// Drops every registration, named and wildcard.
    pub fn reset(&self) {
        let mut registry = self.registry();
        registry.named.clear();
        registry.wildcard.clear();
        debug!("Event channel reset");
    }

    //--- Delivery ---------------------------------------------------------

    /// Delivers `payload` to every subscriber of `event`.
    ///
    /// Runs synchronously on the caller's thread. Returns the number of
    /// callbacks invoked, including ones that panicked.
    pub fn publish(&self, event: &str, payload: &P) -> usize {
        let (named, wildcard) = {
            let registry = self.registry();
            let named: Vec<Callback<P>> = registry
                .named
                .get(event)
                .map(|entries| entries.iter().map(|s| Arc::clone(&s.callback)).collect())
                .unwrap_or_default();
            (named, registry.wildcard.clone())
        };

        trace!(
            "Publishing '{}' to {} subscriber(s), {} wildcard",
            event,
            named.len(),
            wildcard.len()
        );

        for callback in &named {
            guard_delivery(event, || callback(payload));
        }
        for callback in &wildcard {
            guard_delivery(event, || callback(event, payload));
        }

        named.len() + wildcard.len()
    }

    //--- Query API --------------------------------------------------------

    /// Number of registrations under `event` (wildcards excluded).
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.registry().named.get(event).map_or(0, Vec::len)
    }

    /// Number of wildcard registrations.
    pub fn wildcard_count(&self) -> usize {
        self.registry().wildcard.len()
    }

    /// True if both handles refer to the same channel.
    pub fn same_channel(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<P: 'static> Default for EventChannel<P> {
    fn default() -> Self {
        Self::new()
    }
}

//=== Internal Helpers ====================================================

fn guard_delivery(event: &str, deliver: impl FnOnce()) {
    if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(deliver)) {
        error!(
            "Subscriber to '{}' panicked during delivery: {}",
            event,
            panic_message(cause.as_ref())
        );
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(msg) = cause.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = cause.downcast_ref::<String>() {
        msg
    } else {
        "<non-string panic payload>"
    }
}

//=========================================================================
// Tests
//=========================================================================
