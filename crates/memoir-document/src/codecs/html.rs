//! Serialized HTML bodies
//!
//! Image nodes are `<img>` elements; only their `src` attribute value is
//! read or rewritten. Start tags are tokenized with quoting respected; comments
//! and `script`/`style` content are skipped.

use super::{splice, DocumentCodec, Rewrite};
use crate::body::DocumentFormat;
use crate::error::DocumentResult;
use std::ops::Range;

/// Elements whose content is raw text, never markup
const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

/// A located `src` attribute value
struct SrcSlot {
    /// Byte range of the raw value (inside quotes, if any)
    range: Range<usize>,
    /// Quote character around the value
    quote: Option<char>,
    /// Entity-decoded value
    value: String,
}

/// One attribute of a start tag
struct Attribute<'a> {
    name: &'a str,
    /// Raw value range and its quote character
    value: Option<(Range<usize>, Option<char>)>,
}

/// Codec for serialized HTML
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlCodec;

impl HtmlCodec {
    fn slots(source: &str) -> Vec<SrcSlot> {
        let mut slots = Vec::new();
        let mut cursor = 0;

        while let Some(offset) = source[cursor..].find('<') {
            let start = cursor + offset;
            let rest = &source[start..];

            if let Some(comment) = rest.strip_prefix("<!--") {
                cursor = comment
                    .find("-->")
                    .map_or(source.len(), |end| start + 4 + end + 3);
                continue;
            }

            let name_len = rest[1..]
                .bytes()
                .take_while(u8::is_ascii_alphanumeric)
                .count();
            if name_len == 0 || !rest.as_bytes()[1].is_ascii_alphabetic() {
                cursor = start + 1;
                continue;
            }
            let name = &rest[1..=name_len];
            let (attributes, tag_end) = scan_attributes(source, start + 1 + name_len);
            cursor = tag_end;

            if name.eq_ignore_ascii_case("img") {
                slots.extend(src_slot(source, &attributes));
            } else if let Some(element) = RAW_TEXT_ELEMENTS
                .iter()
                .find(|element| name.eq_ignore_ascii_case(element))
            {
                let closing = format!("</{element}");
                cursor = source[cursor..]
                    .to_ascii_lowercase()
                    .find(&closing)
                    .map_or(source.len(), |end| cursor + end);
            }
        }
        slots
    }
}

/// Read the attributes of a start tag beginning at `pos`
///
/// Quoted values are skipped as a whole, so `>` or `src=` inside them never
/// ends the tag or starts an attribute. Returns the attributes and the
/// offset just past the closing `>`.
fn scan_attributes(source: &str, mut pos: usize) -> (Vec<Attribute<'_>>, usize) {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let skip_space = |mut pos: usize| {
        while pos < len && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        pos
    };
    let mut attributes = Vec::new();

    loop {
        while pos < len && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b'/') {
            pos += 1;
        }
        if pos >= len {
            return (attributes, len);
        }
        if bytes[pos] == b'>' {
            return (attributes, pos + 1);
        }

        let name_start = pos;
        while pos < len && !matches!(bytes[pos], b'=' | b'>' | b'/') && !bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        let name = &source[name_start..pos];
        pos = skip_space(pos);

        if pos >= len || bytes[pos] != b'=' {
            attributes.push(Attribute { name, value: None });
            continue;
        }
        pos = skip_space(pos + 1);

        let value = match bytes.get(pos) {
            Some(&quote @ (b'"' | b'\'')) => {
                let value_start = pos + 1;
                let value_end = source[value_start..]
                    .find(char::from(quote))
                    .map_or(len, |end| value_start + end);
                pos = (value_end + 1).min(len);
                (value_start..value_end, Some(char::from(quote)))
            }
            _ => {
                let value_start = pos;
                while pos < len && bytes[pos] != b'>' && !bytes[pos].is_ascii_whitespace() {
                    pos += 1;
                }
                (value_start..pos, None)
            }
        };
        attributes.push(Attribute {
            name,
            value: Some(value),
        });
    }
}

/// The first `src` attribute with a non-blank value
fn src_slot(source: &str, attributes: &[Attribute<'_>]) -> Option<SrcSlot> {
    let (range, quote) = attributes
        .iter()
        .find(|attr| attr.name.eq_ignore_ascii_case("src"))?
        .value
        .clone()?;
    let value = decode_entities(&source[range.clone()]);
    if value.trim().is_empty() {
        return None;
    }
    Some(SrcSlot {
        range,
        quote,
        value,
    })
}

impl DocumentCodec for HtmlCodec {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Html
    }

    fn image_sources(&self, source: &str) -> DocumentResult<Vec<String>> {
        Ok(Self::slots(source).into_iter().map(|slot| slot.value).collect())
    }

    fn rewrite_sources(
        &self,
        source: &str,
        replace: &dyn Fn(&str) -> Option<String>,
    ) -> DocumentResult<Rewrite> {
        let edits: Vec<(Range<usize>, String)> = Self::slots(source)
            .into_iter()
            .filter_map(|slot| {
                let new_src = replace(&slot.value)?;
                Some((slot.range, encode_attr(&new_src, slot.quote)))
            })
            .collect();

        let rewritten = edits.len();
        if rewritten == 0 {
            return Ok(Rewrite {
                source: source.to_string(),
                rewritten,
            });
        }
        Ok(Rewrite {
            source: splice(source, edits),
            rewritten,
        })
    }

    fn append_image(&self, source: &str, src: &str, alt: &str) -> DocumentResult<String> {
        let mut out = source.to_string();
        out.push_str(&format!(
            "<p><img src=\"{}\" alt=\"{}\"></p>",
            encode_attr(src, Some('"')),
            encode_attr(alt, Some('"'))
        ));
        Ok(out)
    }

    fn extensions(&self) -> &[&str] {
        &["html", "htm"]
    }
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn encode_attr(value: &str, quote: Option<char>) -> String {
    let escaped = value.replace('&', "&amp;");
    match quote {
        Some('\'') => escaped.replace('\'', "&#39;"),
        Some(_) => escaped.replace('"', "&quot;"),
        // Unquoted slot: emit a quoted value in its place
        None => format!("\"{}\"", escaped.replace('"', "&quot;")),
    }
}
