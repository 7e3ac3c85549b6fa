//! The job bus (C2): a durable FIFO queue of pending fetches plus a
//! fire-and-forget publish/subscribe event channel.
//!
//! Both channels are in-process. The `jobs` queue's durability guarantee
//! comes from the scheduler's `next_run_at` bookkeeping in the store, not
//! from the queue itself surviving a restart — see §4.2 of the spec this
//! pipeline implements.

pub mod events;
pub mod jobs;

pub use events::{Event, EventBus, EventEnvelope};
pub use jobs::{Job, JobQueue};
