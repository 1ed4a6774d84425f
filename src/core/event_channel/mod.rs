//=========================================================================
// Event Channel
//=========================================================================
//
// Process-scoped publish/subscribe bus between engine-internal code and
// the host layer.
//
// Architecture:
//   Scene (engine thread) → publish(name, &payload)
//                               ↓ snapshot of subscribers
//   Callback 1 → Callback 2 → ... → wildcard callbacks
//
// The channel knows nothing about engines or hosts. It is constructed
// explicitly and shared by cloning.
//
//=========================================================================

//=== Module Declarations =================================================

mod channel;
mod subscription;

//=== Public API ==========================================================

pub use channel::EventChannel;
pub use subscription::{Callback, SubscriptionToken, WildcardCallback};
