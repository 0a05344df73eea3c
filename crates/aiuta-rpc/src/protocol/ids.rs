//! Message id generation.
//!
//! Every request and event carries an `id` that must be unique per connection
//! for as long as the request is in flight.  Responses are correlated to their
//! request purely by this string, so two live requests sharing an id would
//! resolve each other's callers.
//!
//! # Format
//!
//! ```text
//! <timestamp ms, hex>-<counter, hex>-<8 random hex chars>
//! 18b7a3f0c21-0-9f3c1a2b
//! ```
//!
//! - The **timestamp** keeps ids from two page loads apart.
//! - The **counter** guarantees uniqueness within one generator even when many
//!   ids are produced in the same millisecond.
//! - The **random suffix** separates the two sides of the channel, which each
//!   run their own generator starting at zero.
//!
//! This is collision-safe for the message volume of a widget session.  It is
//! not a cryptographic token and must never be used as one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

/// A thread-safe generator of connection-unique message ids.
///
/// # Examples
///
/// ```rust
/// use aiuta_rpc::protocol::MessageIdGenerator;
///
/// let ids = MessageIdGenerator::new();
/// let a = ids.next_id();
/// let b = ids.next_id();
/// assert_ne!(a, b);
/// ```
pub struct MessageIdGenerator {
    /// Monotonic part of the id.
    counter: AtomicU64,
}

impl MessageIdGenerator {
    /// Creates a new generator whose counter starts at 0.
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Returns a fresh id and advances the counter.
    ///
    /// The counter wraps from `u64::MAX` to 0 without panicking; by then the
    /// timestamp component has long moved on.
    pub fn next_id(&self) -> String {
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed);
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{:x}-{:x}-{}", now_millis(), sequence, &suffix[..8])
    }

    /// Returns how many ids have been handed out (modulo wrap-around).
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for MessageIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Milliseconds since the Unix epoch, the unit of the envelope `timestamp`.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
