//! # Event subscribers.
//!
//! ```text
//! worker / retrier ── publish(Event) ──► Bus ──► subscriber_listener
//!                                                     │
//!                                               SubscriberSet::emit
//!                                          ┌──────────┼──────────┐
//!                                          ▼          ▼          ▼
//!                                       metrics     audit      tests
//! ```

mod set;
mod subscribe;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;
