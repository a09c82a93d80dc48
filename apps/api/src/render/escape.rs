//! Markup escaping codec.
//!
//! Maps display text to text that can be embedded in the typesetting source
//! without being interpreted as control characters, and back again.
//! Only the reserved set below is touched; everything else passes through,
//! including `\`, `{` and `}`. Text containing those still reaches the
//! compiler as commands.
//!
//! `escape` must run exactly once, at the boundary where data leaves for the
//! compiler. Running it on already-escaped text doubles the markers.

use std::borrow::Cow;

/// Marker placed in front of every reserved character.
pub const ESCAPE_MARKER: char = '\\';

/// Characters the compiler treats as control characters in running text.
pub const RESERVED: [char; 5] = ['&', '%', '$', '#', '_'];

fn is_reserved(c: char) -> bool {
    RESERVED.contains(&c)
}

/// Escapes every reserved character. Borrows the input when nothing changes.
pub fn escape(input: &str) -> Cow<'_, str> {
    let reserved = input.chars().filter(|c| is_reserved(*c)).count();
    if reserved == 0 {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len() + reserved);
    for c in input.chars() {
        if is_reserved(c) {
            out.push(ESCAPE_MARKER);
        }
        out.push(c);
    }
    Cow::Owned(out)
}

/// Literal inverse of [`escape`]: drops the marker in front of a reserved character.
pub fn unescape(input: &str) -> Cow<'_, str> {
    if !input.contains(ESCAPE_MARKER) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ESCAPE_MARKER {
            if let Some(&next) = chars.peek() {
                if is_reserved(next) {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    Cow::Owned(out)
}
