//! CommonMark bodies
//!
//! Uses pulldown-cmark offsets to locate image destinations, both inline
//! (`![alt](dest)`) and through reference definitions (`[id]: dest`).

use super::{splice, DocumentCodec, Rewrite};
use crate::body::DocumentFormat;
use crate::error::{DocumentError, DocumentResult};
use pulldown_cmark::{Event, LinkType, Parser as MdParser, Tag};
use std::ops::Range;

/// Codec for Markdown bodies
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownCodec;

/// An image destination and where its text lives
struct Destination {
    url: String,
    range: Range<usize>,
}

impl MarkdownCodec {
    /// Image destinations with the byte range of their raw text
    fn destinations(source: &str) -> DocumentResult<Vec<Destination>> {
        let mut iter = MdParser::new(source).into_offset_iter();
        let mut out = Vec::new();

        while let Some((event, span)) = iter.next() {
            let Event::Start(Tag::Image {
                link_type,
                dest_url,
                id,
                ..
            }) = event
            else {
                continue;
            };
            if dest_url.is_empty() {
                continue;
            }

            let range = match link_type {
                LinkType::Reference | LinkType::Collapsed | LinkType::Shortcut => iter
                    .reference_definitions()
                    .get(&id)
                    .and_then(|def| locate_in_definition(source, def.span.clone(), &dest_url)),
                _ => locate_inline(source, span, &dest_url),
            }
            .ok_or_else(|| DocumentError::source_not_located(DocumentFormat::Markdown, &*dest_url))?;

            out.push(Destination {
                url: dest_url.to_string(),
                range,
            });
        }

        Ok(out)
    }
}

/// Find `dest` inside `![alt](dest "title")`, skipping matches in the alt text
fn locate_inline(source: &str, span: Range<usize>, dest: &str) -> Option<Range<usize>> {
    let text = &source[span.clone()];
    text.match_indices(dest).find_map(|(at, _)| {
        let before = text[..at].trim_end();
        (before.ends_with('(') || before.ends_with('<'))
            .then(|| span.start + at..span.start + at + dest.len())
    })
}

/// Find `dest` after the `]:` of a reference definition
fn locate_in_definition(source: &str, span: Range<usize>, dest: &str) -> Option<Range<usize>> {
    let text = &source[span.clone()];
    let colon = text.find("]:")? + 2;
    let at = text[colon..].find(dest)? + colon;
    Some(span.start + at..span.start + at + dest.len())
}

impl DocumentCodec for MarkdownCodec {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Markdown
    }

    fn image_sources(&self, source: &str) -> DocumentResult<Vec<String>> {
        Ok(MdParser::new(source)
            .filter_map(|event| match event {
                Event::Start(Tag::Image { dest_url, .. }) if !dest_url.is_empty() => {
                    Some(dest_url.to_string())
                }
                _ => None,
            })
            .collect())
    }

    fn rewrite_sources(
        &self,
        source: &str,
        replace: &dyn Fn(&str) -> Option<String>,
    ) -> DocumentResult<Rewrite> {
        let mut rewritten = 0;
        let mut edits = Vec::new();
        for dest in Self::destinations(source)? {
            if let Some(new_url) = replace(&dest.url) {
                rewritten += 1;
                edits.push((dest.range, new_url));
            }
        }

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
        let mut out = source.trim_end().to_string();
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        let alt = alt.replace('[', "\\[").replace(']', "\\]");
        if src.contains(char::is_whitespace) {
            out.push_str(&format!("![{alt}](<{src}>)\n"));
        } else {
            out.push_str(&format!("![{alt}]({src})\n"));
        }
        Ok(out)
    }

    fn extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BODY: &str = r#"# Summer of 1968

We moved to blob:memoir/a that year.

![the house](blob:memoir/a "our house")

`![not an image](blob:memoir/code)`

![again][house] and ![kept](https://cdn.test/k.jpg)

[house]: blob:memoir/a
"#;

    #[test]
    fn finds_inline_and_reference_images() {
        assert_eq!(
            MarkdownCodec.image_sources(BODY).unwrap(),
            vec!["blob:memoir/a", "blob:memoir/a", "https://cdn.test/k.jpg"]
        );
    }

    #[test]
    fn rewrite_updates_inline_and_definition() {
        let rewrite = MarkdownCodec
            .rewrite_sources(BODY, &|src| {
                (src == "blob:memoir/a").then(|| "https://cdn.test/a.jpg".to_string())
            })
            .unwrap();

        assert_eq!(rewrite.rewritten, 2);
        assert!(rewrite.source.contains("We moved to blob:memoir/a that year."));
        assert!(rewrite.source.contains("![the house](https://cdn.test/a.jpg \"our house\")"));
        assert!(rewrite.source.contains("[house]: https://cdn.test/a.jpg"));
        assert!(rewrite.source.contains("blob:memoir/code"));
    }

    #[test]
    fn alt_text_containing_destination_is_skipped() {
        let body = "![blob:memoir/a](blob:memoir/a)";
        let rewrite = MarkdownCodec
            .rewrite_sources(body, &|_| Some("https://cdn.test/a.jpg".to_string()))
            .unwrap();
        assert_eq!(rewrite.source, "![blob:memoir/a](https://cdn.test/a.jpg)");
    }

    #[test]
    fn append_image_round_trips() {
        let out = MarkdownCodec.append_image("Intro.", "blob:memoir/n", "a [b]").unwrap();
        assert_eq!(out, "Intro.\n\n![a \\[b\\]](blob:memoir/n)\n");
        assert_eq!(MarkdownCodec.image_sources(&out).unwrap(), vec!["blob:memoir/n"]);
    }
}
