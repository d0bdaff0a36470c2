//! Trigger lifecycle controllers.
//!
//! Triggers answer "how does this piece learn about new events?". Either
//! a vendor pushes deliveries to a registered webhook, or the piece polls a
//! listing endpoint and deduplicates against a stored cursor. The
//! [`TriggerRunner`] drives both through the same enable/disable/run
//! lifecycle.

mod dedupe;
mod filter;
mod polling;
mod runner;
mod signature;
mod webhook;

pub use dedupe::{dedupe, seed_cursor, DedupeOutcome};
pub use filter::EventFilter;
pub use polling::{PollingTrigger, CURSOR_KEY};
pub use runner::{TriggerInstance, TriggerRunner};
pub use signature::{SignatureEncoding, SignatureError, SignatureScheme};
pub use webhook::{WebhookTrigger, SUBSCRIPTION_KEY};
