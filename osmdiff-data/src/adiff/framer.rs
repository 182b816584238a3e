//! Locating complete markup in a partially received buffer.

const COMMENT_OPEN: &[u8] = b"<!--";
const COMMENT_CLOSE: &[u8] = b"-->";
const CDATA_OPEN: &[u8] = b"<![CDATA[";
const CDATA_CLOSE: &[u8] = b"]]>";
const PI_OPEN: &[u8] = b"<?";
const PI_CLOSE: &[u8] = b"?>";

/// Length of the longest prefix of `buffer` made only of complete
/// markup units.
///
/// Tags may contain `>` inside quoted attribute values; comments, CDATA
/// sections and processing instructions end at their own terminators.
/// A text run counts as complete once the next `<` is visible.
///
/// # Examples
/// ```
/// use osmdiff_data::adiff::complete_prefix_len;
///
/// assert_eq!(complete_prefix_len(b"<osm><node id=\"1"), 5);
/// assert_eq!(complete_prefix_len(b"<tag v=\"a>b\"/>  <"), 16);
/// assert_eq!(complete_prefix_len(b"<!-- partial"), 0);
/// ```
#[must_use]
pub fn complete_prefix_len(buffer: &[u8]) -> usize {
    let mut complete = 0;
    while let Some(rest) = buffer.get(complete..).filter(|rest| !rest.is_empty()) {
        let unit = if rest.starts_with(b"<") {
            markup_len(rest)
        } else {
            rest.iter().position(|&byte| byte == b'<')
        };
        match unit {
            Some(len) => complete += len,
            None => break,
        }
    }
    complete
}

fn markup_len(rest: &[u8]) -> Option<usize> {
    if rest.starts_with(COMMENT_OPEN) {
        delimited_len(rest, COMMENT_OPEN.len(), COMMENT_CLOSE)
    } else if rest.starts_with(CDATA_OPEN) {
        delimited_len(rest, CDATA_OPEN.len(), CDATA_CLOSE)
    } else if rest.starts_with(PI_OPEN) {
        delimited_len(rest, PI_OPEN.len(), PI_CLOSE)
    } else {
        tag_len(rest)
    }
}

fn delimited_len(rest: &[u8], skip: usize, close: &[u8]) -> Option<usize> {
    rest.get(skip..)?
        .windows(close.len())
        .position(|window| window == close)
        .map(|offset| skip + offset + close.len())
}

fn tag_len(rest: &[u8]) -> Option<usize> {
    let mut quote = None;
    for (index, &byte) in rest.iter().enumerate().skip(1) {
        match quote {
            Some(open) if byte == open => quote = None,
            Some(_) => {}
            None if byte == b'"' || byte == b'\'' => quote = Some(byte),
            None if byte == b'>' => return Some(index + 1),
            None => {}
        }
    }
    None
}
