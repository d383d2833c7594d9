//! Byte-level scanning helpers for the placeholder rewriter.
//!
//! The rewriter walks SQL text byte by byte; these helpers recognize the
//! regions it must not rewrite inside (literals, quoted identifiers,
//! comments, dollar-quoted blocks) and the token shapes it cares about.

#[derive(Clone)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// Recognize `$tag$` at `start` (which points at the opening `$`). Returns
/// the tag and the index of the closing `$` of the opener.
pub(super) fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    // Tags follow identifier rules: `$1$` is not a quote opener.
    let first = *bytes.get(start + 1)?;
    if first != b'$' && !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        if !(b.is_ascii_alphanumeric() || b == b'_') {
            return None;
        }
        idx += 1;
    }

    if idx < bytes.len() && bytes[idx] == b'$' {
        let tag = String::from_utf8(bytes[start + 1..idx].to_vec()).ok()?;
        Some((tag, idx))
    } else {
        None
    }
}

/// True when the `$` at `idx` closes a dollar-quoted block opened with `tag`.
pub(super) fn matches_tag(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    end < bytes.len()
        && bytes[idx + 1..=end].starts_with(tag.as_bytes())
        && bytes.get(end) == Some(&b'$')
}

/// Scan an identifier (`[A-Za-z_][A-Za-z0-9_]*`) starting at `start`.
/// Returns the end index (one past the last identifier byte) and the name.
pub(super) fn scan_identifier(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    let first = *bytes.get(start)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let mut idx = start + 1;
    while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
        idx += 1;
    }
    std::str::from_utf8(&bytes[start..idx])
        .ok()
        .map(|name| (idx, name))
}

/// Scan a run of ASCII digits starting at `start`. Used to spot positional
/// `$N` placeholders, which this crate rejects.
pub(super) fn scan_digits(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == start {
        None
    } else {
        std::str::from_utf8(&bytes[start..idx])
            .ok()
            .map(|digits| (idx, digits))
    }
}
