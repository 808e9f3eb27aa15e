//! ProseMirror-style JSON document trees
//!
//! Image nodes look like `{"type": "image", "attrs": {"src": "..."}}` at
//! any depth of the `content` hierarchy.

use super::{DocumentCodec, Rewrite};
use crate::body::DocumentFormat;
use crate::error::{DocumentError, DocumentResult};
use serde_json::{json, Value};

const IMAGE_NODE_TYPE: &str = "image";

/// Codec for JSON node trees
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTreeCodec;

impl JsonTreeCodec {
    fn parse(source: &str) -> DocumentResult<Value> {
        if source.trim().is_empty() {
            return Ok(json!({ "type": "doc", "content": [] }));
        }
        serde_json::from_str(source)
            .map_err(|e| DocumentError::malformed(DocumentFormat::Json, e.to_string()))
    }

    fn is_image_node(node: &serde_json::Map<String, Value>) -> bool {
        node.get("type").and_then(Value::as_str) == Some(IMAGE_NODE_TYPE)
    }

    fn visit<'a>(node: &'a Value, out: &mut Vec<&'a str>) {
        match node {
            Value::Object(map) => {
                if Self::is_image_node(map) {
                    if let Some(src) = map
                        .get("attrs")
                        .and_then(|attrs| attrs.get("src"))
                        .and_then(Value::as_str)
                    {
                        out.push(src);
                    }
                }
                // Only descend into children, attrs never hold nested nodes
                if let Some(children) = map.get("content") {
                    Self::visit(children, out);
                }
            }
            Value::Array(items) => {
                for item in items {
                    Self::visit(item, out);
                }
            }
            _ => {}
        }
    }

    fn visit_mut(node: &mut Value, replace: &dyn Fn(&str) -> Option<String>) -> usize {
        match node {
            Value::Object(map) => {
                let mut count = 0;
                if Self::is_image_node(map) {
                    if let Some(src) = map
                        .get_mut("attrs")
                        .and_then(|attrs| attrs.get_mut("src"))
                    {
                        if let Some(new_src) = src.as_str().and_then(replace) {
                            *src = Value::String(new_src);
                            count += 1;
                        }
                    }
                }
                if let Some(children) = map.get_mut("content") {
                    count += Self::visit_mut(children, replace);
                }
                count
            }
            Value::Array(items) => items
                .iter_mut()
                .map(|item| Self::visit_mut(item, replace))
                .sum(),
            _ => 0,
        }
    }

    fn serialize(value: &Value) -> DocumentResult<String> {
        serde_json::to_string(value)
            .map_err(|e| DocumentError::malformed(DocumentFormat::Json, e.to_string()))
    }
}

impl DocumentCodec for JsonTreeCodec {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Json
    }

    fn image_sources(&self, source: &str) -> DocumentResult<Vec<String>> {
        let root = Self::parse(source)?;
        let mut out = Vec::new();
        Self::visit(&root, &mut out);
        Ok(out.into_iter().map(str::to_string).collect())
    }

    fn rewrite_sources(
        &self,
        source: &str,
        replace: &dyn Fn(&str) -> Option<String>,
    ) -> DocumentResult<Rewrite> {
        let mut root = Self::parse(source)?;
        let rewritten = Self::visit_mut(&mut root, replace);
        if rewritten == 0 {
            return Ok(Rewrite {
                source: source.to_string(),
                rewritten,
            });
        }
        Ok(Rewrite {
            source: Self::serialize(&root)?,
            rewritten,
        })
    }

    fn append_image(&self, source: &str, src: &str, alt: &str) -> DocumentResult<String> {
        let mut root = Self::parse(source)?;
        let node = json!({ "type": IMAGE_NODE_TYPE, "attrs": { "src": src, "alt": alt } });

        match &mut root {
            Value::Array(items) => items.push(node),
            Value::Object(map) => match map
                .entry("content")
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                Value::Array(items) => items.push(node),
                _ => {
                    return Err(DocumentError::malformed(
                        DocumentFormat::Json,
                        "root `content` is not an array",
                    ))
                }
            },
            _ => {
                return Err(DocumentError::malformed(
                    DocumentFormat::Json,
                    "root is neither a node nor a node list",
                ))
            }
        }

        Self::serialize(&root)
    }

    fn extensions(&self) -> &[&str] {
        &["json"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc() -> &'static str {
        r#"{"type":"doc","content":[
            {"type":"paragraph","content":[{"type":"text","text":"blob:memoir/a in prose"}]},
            {"type":"image","attrs":{"src":"blob:memoir/a","alt":"first"}},
            {"type":"blockquote","content":[
                {"type":"image","attrs":{"src":"https://cdn.test/old.jpg"}}
            ]},
            {"type":"image","attrs":{"src":"blob:memoir/a"}}
        ]}"#
    }

    #[test]
    fn finds_nested_images_in_order() {
        let sources = JsonTreeCodec.image_sources(doc()).unwrap();
        assert_eq!(
            sources,
            vec!["blob:memoir/a", "https://cdn.test/old.jpg", "blob:memoir/a"]
        );
    }

    #[test]
    fn rewrite_touches_image_nodes_only() {
        let rewrite = JsonTreeCodec
            .rewrite_sources(doc(), &|src| {
                (src == "blob:memoir/a").then(|| "https://cdn.test/a.jpg".to_string())
            })
            .unwrap();

        assert_eq!(rewrite.rewritten, 2);
        assert!(rewrite.source.contains("blob:memoir/a in prose"));
        let sources = JsonTreeCodec.image_sources(&rewrite.source).unwrap();
        assert_eq!(
            sources,
            vec!["https://cdn.test/a.jpg", "https://cdn.test/old.jpg", "https://cdn.test/a.jpg"]
        );
    }

    #[test]
    fn rewrite_without_match_keeps_source() {
        let rewrite = JsonTreeCodec.rewrite_sources(doc(), &|_| None).unwrap();
        assert_eq!(rewrite.rewritten, 0);
        assert_eq!(rewrite.source, doc());
    }

    #[test]
    fn empty_body_is_an_empty_doc() {
        assert!(JsonTreeCodec.image_sources("  ").unwrap().is_empty());
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = JsonTreeCodec.image_sources("{\"type\":").unwrap_err();
        assert!(matches!(err, DocumentError::Malformed { format: DocumentFormat::Json, .. }));
    }

    #[test]
    fn append_image_adds_root_child() {
        let out = JsonTreeCodec
            .append_image("", "blob:memoir/new", "grandma")
            .unwrap();
        assert_eq!(
            JsonTreeCodec.image_sources(&out).unwrap(),
            vec!["blob:memoir/new"]
        );
    }
}
