//! Rich-text bridge between the editor's HTML and inline markup commands.
//!
//! Supported constructs: bold spans (`<b>`, `<strong>` ⇄ `\textbf{…}`) and
//! line breaks (`<br>`, block wrappers ⇄ `\n`). Anything else the editing
//! surface produces (spans, italics, stray wrappers) is stripped with its
//! content kept. The conversion is lossy outside the supported constructs.
//!
//! Known limitation: nested bold (`<b>a<b>b</b></b>`, or a `}` inside a
//! `\textbf{…}` body) is not handled. The output for such input is whatever
//! falls out of the first-close-wins matching below and should not be relied on.
//!
//! Neither this bridge nor the escaping codec touches `\`, `{` or `}`. Text
//! containing them reaches the compiler as live markup, and the compiler runs
//! with `-shell-escape`. Only trusted users' records should be built.

const BOLD_OPEN: &str = "\\textbf{";
const BOLD_CLOSE: char = '}';
const LINE_BREAK: char = '\n';

const ENTITIES: [(&str, &str); 6] = [
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&nbsp;", " "),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Bold,
    Break,
    Block,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tag {
    kind: TagKind,
    closing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Tag(Tag),
}

// ────────────────────────────────────────────────────────────────────────────
// HTML → markup
// ────────────────────────────────────────────────────────────────────────────

/// Converts editor HTML into inline markup. A bold tag without a partner is
/// dropped, so every emitted `\textbf{` gets its closing brace. Braces in the
/// text itself pass through, so `<b>a}b</b>` becomes `\textbf{a}b}`.
pub fn html_to_markup(html: &str) -> String {
    let tokens = tokenize(html);
    let mut out = String::with_capacity(html.len());
    let mut in_bold = false;

    for (i, token) in tokens.iter().enumerate() {
        match *token {
            Token::Text(text) => decode_entities(text, &mut out),
            Token::Tag(Tag {
                kind: TagKind::Bold,
                closing: false,
            }) => {
                if !in_bold && has_bold_close(&tokens[i + 1..]) {
                    out.push_str(BOLD_OPEN);
                    in_bold = true;
                }
            }
            Token::Tag(Tag {
                kind: TagKind::Bold,
                closing: true,
            }) => {
                if in_bold {
                    out.push(BOLD_CLOSE);
                    in_bold = false;
                }
            }
            Token::Tag(Tag {
                kind: TagKind::Break,
                ..
            }) => out.push(LINE_BREAK),
            // Editors wrap each new line in a block element.
            Token::Tag(Tag {
                kind: TagKind::Block,
                closing,
            }) => {
                if !closing {
                    out.push(LINE_BREAK);
                }
            }
            Token::Tag(Tag {
                kind: TagKind::Other,
                ..
            }) => {}
        }
    }

    out
}

fn has_bold_close(tokens: &[Token<'_>]) -> bool {
    tokens.iter().any(|t| {
        matches!(
            t,
            Token::Tag(Tag {
                kind: TagKind::Bold,
                closing: true
            })
        )
    })
}

fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut cursor = 0;

    while let Some(offset) = html[cursor..].find('<') {
        let at = cursor + offset;
        match parse_tag(&html[at..]) {
            Some((tag, len)) => {
                if at > text_start {
                    tokens.push(Token::Text(&html[text_start..at]));
                }
                tokens.push(Token::Tag(tag));
                cursor = at + len;
                text_start = cursor;
            }
            None => cursor = at + 1,
        }
    }

    if text_start < html.len() {
        tokens.push(Token::Text(&html[text_start..]));
    }
    tokens
}

/// Recognizes `<name …>`, `</name>` and `<name/>` at the start of `input`.
/// Returns the tag and its byte length, or `None` when `<` is plain text.
fn parse_tag(input: &str) -> Option<(Tag, usize)> {
    let bytes = input.as_bytes();
    let mut pos = 1;

    let closing = bytes.get(pos) == Some(&b'/');
    if closing {
        pos += 1;
    }

    let name_start = pos;
    if !bytes.get(pos).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }
    while bytes.get(pos).is_some_and(u8::is_ascii_alphanumeric) {
        pos += 1;
    }
    let name = &input[name_start..pos];

    match bytes.get(pos) {
        Some(b'>') | Some(b'/') => {}
        Some(b) if b.is_ascii_whitespace() => {}
        _ => return None,
    }

    let rest = &input[pos..];
    let end = rest.find(['>', '<'])?;
    if rest.as_bytes()[end] != b'>' {
        return None;
    }

    let kind = match name.to_ascii_lowercase().as_str() {
        "b" | "strong" => TagKind::Bold,
        "br" => TagKind::Break,
        "div" | "p" => TagKind::Block,
        _ => TagKind::Other,
    };

    Some((Tag { kind, closing }, pos + end + 1))
}

fn decode_entities(text: &str, out: &mut String) {
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match ENTITIES.iter().find(|(entity, _)| tail.starts_with(entity)) {
            Some((entity, decoded)) => {
                out.push_str(decoded);
                rest = &tail[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
}

// ────────────────────────────────────────────────────────────────────────────
// markup → HTML
// ────────────────────────────────────────────────────────────────────────────

/// Converts inline markup back into editor HTML. The first `}` after
/// `\textbf{` ends the bold span.
pub fn markup_to_html(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;

    while let Some(pos) = rest.find(BOLD_OPEN) {
        let body = &rest[pos + BOLD_OPEN.len()..];
        let Some(end) = body.find(BOLD_CLOSE) else {
            break;
        };
        encode_text(&rest[..pos], &mut out);
        out.push_str("<b>");
        encode_text(&body[..end], &mut out);
        out.push_str("</b>");
        rest = &body[end + 1..];
    }

    encode_text(rest, &mut out);
    out
}

fn encode_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            LINE_BREAK => out.push_str("<br>"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bold_to_markup() {
        assert_eq!(html_to_markup("Led a <b>team</b> of 5"), r"Led a \textbf{team} of 5");
    }

    #[test]
    fn test_strong_is_bold() {
        assert_eq!(html_to_markup("<strong>Rust</strong>"), r"\textbf{Rust}");
        assert_eq!(html_to_markup("<B class=\"x\">Go</B>"), r"\textbf{Go}");
    }

    #[test]
    fn test_breaks_and_blocks() {
        assert_eq!(html_to_markup("one<br>two<br/>three"), "one\ntwo\nthree");
        assert_eq!(html_to_markup("first<div>second</div>"), "first\nsecond");
    }

    #[test]
    fn test_incidental_wrappers_stripped() {
        assert_eq!(
            html_to_markup("<span style=\"color: red\">Shipped</span> <i>v2</i>"),
            "Shipped v2"
        );
    }

    #[test]
    fn test_unpaired_bold_dropped() {
        assert_eq!(html_to_markup("<b>never closed"), "never closed");
        assert_eq!(html_to_markup("stray</b> close"), "stray close");
    }

    #[test]
    fn test_braces_in_text_pass_through() {
        assert_eq!(html_to_markup("<b>a}b</b>"), r"\textbf{a}b}");
        assert_eq!(html_to_markup(r"\input{x}"), r"\input{x}");
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(html_to_markup("R&amp;D &lt;core&gt;"), "R&D <core>");
        assert_eq!(html_to_markup("AT&T"), "AT&T");
    }

    #[test]
    fn test_angle_brackets_in_text_kept() {
        assert_eq!(html_to_markup("a < b and c > d"), "a < b and c > d");
        assert_eq!(html_to_markup("x <3"), "x <3");
    }

    #[test]
    fn test_markup_to_html() {
        assert_eq!(
            markup_to_html("Led a \\textbf{team}\nof 5 & more"),
            "Led a <b>team</b><br>of 5 &amp; more"
        );
    }

    #[test]
    fn test_markup_to_html_unclosed_bold_is_text() {
        assert_eq!(markup_to_html(r"\textbf{open"), r"\textbf{open");
    }

    #[test]
    fn test_empty() {
        assert_eq!(html_to_markup(""), "");
        assert_eq!(markup_to_html(""), "");
    }

    fn rich_fragment() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-zA-Z0-9 ,.]{1,12}",
            "[a-zA-Z0-9 ,.]{0,12}".prop_map(|s| format!("<b>{s}</b>")),
            Just("<br>".to_string()),
        ]
    }

    proptest! {
        #[test]
        fn prop_rich_text_round_trip(parts in prop::collection::vec(rich_fragment(), 0..8)) {
            let html = parts.concat();
            prop_assert_eq!(markup_to_html(&html_to_markup(&html)), html);
        }
    }
}
