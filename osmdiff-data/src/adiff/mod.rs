//! Streaming parser for augmented diff XML.
//!
//! [`DiffParser`] accepts the framed byte stream produced by the
//! replication source in arbitrarily split chunks. Complete markup is
//! decoded with `quick-xml`; anything cut mid-token stays buffered until
//! the next chunk arrives. Every `<osm>` block scopes its own element
//! caches, and sequence marker comments become [`DiffEvent`]s.

mod attrs;
mod error;
mod framer;
mod parser;
mod state;

pub use error::AdiffParseError;
pub use framer::complete_prefix_len;
pub use parser::{DiffEvent, DiffParser, MAX_PENDING_BYTES};

#[cfg(test)]
mod tests;
