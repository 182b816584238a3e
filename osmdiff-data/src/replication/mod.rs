//! Polling source for the augmented diff replication feed.
//!
//! [`ReplicationSource`] walks the feed one sequence number at a time,
//! frames each payload with start/end markers and hands the caller the
//! processed sequence for checkpointing. Transport and clock are traits
//! so tests can script upstream behaviour and skip real waits.

mod clock;
mod error;
mod frame;
mod source;
mod transport;
mod types;

#[doc(hidden)]
pub mod test_support;

pub use clock::{Clock, TokioClock};
pub use error::{ReplicationError, TransportError};
pub use frame::{FramedPayload, RECORD_SEPARATOR, decode_body};
pub use source::{Checkpoint, ReplicationOptions, ReplicationSource, SourceState};
pub use transport::{
    DEFAULT_DIFF_PATH, DEFAULT_STATUS_PATH, DEFAULT_USER_AGENT, HttpReplicationTransport,
    HttpTransportConfig, ReplicationTransport,
};
pub use types::{BaseUrl, DEFAULT_BASE_URL};

#[cfg(test)]
mod tests;
