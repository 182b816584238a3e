//! Errors raised by the augmented diff parser.

use std::str::Utf8Error;

use quick_xml::events::attributes::AttrError;
use thiserror::Error;

/// Fatal parse failures.
///
/// Any of these halts the parser: later input is rejected with
/// [`AdiffParseError::Halted`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdiffParseError {
    /// The markup could not be tokenised.
    #[error("malformed XML near byte {position}: {source}")]
    Xml {
        /// Offset within the decoded chunk.
        position: usize,
        /// Tokeniser error.
        source: quick_xml::Error,
    },
    /// An attribute list could not be decoded.
    #[error("malformed attribute on <{element}>: {source}")]
    Attribute {
        /// Element carrying the attribute.
        element: String,
        /// Attribute error.
        source: AttrError,
    },
    /// An attribute value held an unknown or malformed entity.
    #[error("bad escape in attribute of <{element}>: {source}")]
    Escape {
        /// Element carrying the attribute.
        element: String,
        /// Unescaping error.
        source: quick_xml::Error,
    },
    /// A name or value was not valid UTF-8.
    #[error("invalid UTF-8 in markup: {source}")]
    Encoding {
        /// Decoder error.
        source: Utf8Error,
    },
    /// An element lacked an attribute it cannot do without.
    #[error("<{element}> is missing its {attribute} attribute")]
    MissingAttribute {
        /// Element name.
        element: String,
        /// Missing attribute name.
        attribute: &'static str,
    },
    /// An end tag closed a different element than the one open.
    #[error("expected </{expected}> but found </{found}>")]
    MismatchedEnd {
        /// Innermost open element.
        expected: String,
        /// Element actually closed.
        found: String,
    },
    /// An end tag appeared with no element open.
    #[error("unexpected </{found}> with no open element")]
    UnexpectedEnd {
        /// Element closed.
        found: String,
    },
    /// Input ended inside markup or inside an open element.
    #[error("input ended {context}")]
    UnexpectedEof {
        /// Where the input stopped.
        context: String,
    },
    /// Markup stayed incomplete past the buffering limit.
    #[error("unterminated markup exceeds {limit} buffered bytes")]
    PendingOverflow {
        /// Buffering limit in bytes.
        limit: usize,
    },
    /// An earlier error stopped the parser.
    #[error("parser halted after an earlier error")]
    Halted,
}
