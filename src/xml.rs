//! Declarative tree construction over the node registry (spec §4.7). Pure:
//! parsing never ticks anything, and a malformed document fails with
//! `ParseError` carrying the offending line/column.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{BtError, BtResult};
use crate::node::{Node, NodeConfig};
use crate::registry::NodeRegistry;

const RESERVED: &[&str] = &["BehaviorTree", "BehaviorForest", "Middleware"];

struct Frame {
    tag: String,
    attrs: HashMap<String, String>,
    children: Vec<Node>,
    /// `Some(name)` marks this frame as the sentinel pushed for a
    /// `<BehaviorTree name="...">` wrapper rather than a registry-resolved
    /// node — its one child is the tree's actual root, not a node to build.
    tree_name: Option<String>,
}

/// A parsed `<Middleware kind="..." name="..."/>` reference. The XML loader
/// only records the reference — actual middleware wiring is a programmatic
/// `Forest::add_middleware` call, since middleware state (handlers, routing
/// tables) has no textual representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareRef {
    pub kind: String,
    pub name: String,
}

/// Result of parsing a `BehaviorForest` document: one or more named trees
/// plus the middleware references declared alongside them.
#[derive(Default)]
pub struct ForestDocument {
    pub trees: Vec<(String, Node)>,
    pub middlewares: Vec<MiddlewareRef>,
}

/// Parses a document whose root element is `BehaviorTree` and returns the
/// single node under it (the tree's actual root — `BehaviorTree` itself is
/// a reserved wrapper, not a registry-resolved node).
pub fn load_tree(source: &str, registry: &NodeRegistry) -> BtResult<Node> {
    let mut doc = parse(source, registry, false)?;
    match doc.trees.pop() {
        Some((_, root)) => Ok(root),
        None => Err(BtError::ParseError {
            message: "BehaviorTree element has no child node".into(),
            line: 1,
            column: 1,
        }),
    }
}

/// Parses a document whose root element is `BehaviorForest`: zero or more
/// `BehaviorTree` children plus `Middleware` references.
pub fn load_forest(source: &str, registry: &NodeRegistry) -> BtResult<ForestDocument> {
    parse(source, registry, true)
}

fn parse(source: &str, registry: &NodeRegistry, expect_forest: bool) -> BtResult<ForestDocument> {
    let mut reader = Reader::from_str(source);
    reader.trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut document = ForestDocument::default();
    let mut saw_root = false;
    let mut buf = Vec::new();

    loop {
        let position = reader.buffer_position();
        buf.clear();
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|err| parse_error(source, position, err.to_string()))?;

        match event {
            Event::Eof => break,

            Event::Start(tag) => {
                let name = tag_name(&tag, source, position)?;
                let attrs = read_attrs(&tag, &reader, source, position)?;

                if !saw_root {
                    saw_root = true;
                    let is_forest = name == "BehaviorForest";
                    if is_forest != expect_forest {
                        return Err(parse_error(
                            source,
                            position,
                            format!("expected root element '{}', found '{name}'", if expect_forest { "BehaviorForest" } else { "BehaviorTree" }),
                        ));
                    }
                    if !is_forest {
                        // The document's single tree: give it a sentinel frame so its
                        // root child has somewhere to attach when it closes.
                        stack.push(Frame {
                            tag: "BehaviorTree".to_string(),
                            tree_name: Some(attrs.get("name").cloned().unwrap_or_default()),
                            attrs,
                            children: Vec::new(),
                        });
                    }
                    continue;
                }

                if name == "BehaviorTree" {
                    stack.push(Frame {
                        tag: "BehaviorTree".to_string(),
                        tree_name: Some(attrs.get("name").cloned().unwrap_or_default()),
                        attrs,
                        children: Vec::new(),
                    });
                    continue;
                }

                if name == "Middleware" {
                    document.middlewares.push(MiddlewareRef {
                        kind: attrs.get("kind").cloned().unwrap_or_default(),
                        name: attrs.get("name").cloned().unwrap_or_default(),
                    });
                    continue;
                }

                stack.push(Frame {
                    tag: name,
                    attrs,
                    children: Vec::new(),
                    tree_name: None,
                });
            }

            Event::Empty(tag) => {
                let name = tag_name(&tag, source, position)?;
                let attrs = read_attrs(&tag, &reader, source, position)?;

                if name == "Middleware" {
                    document.middlewares.push(MiddlewareRef {
                        kind: attrs.get("kind").cloned().unwrap_or_default(),
                        name: attrs.get("name").cloned().unwrap_or_default(),
                    });
                    continue;
                }

                let node = build_node(&name, attrs, Vec::new(), registry, source, position)?;
                attach(&mut stack, node);
            }

            Event::End(tag) => {
                let name = std::str::from_utf8(tag.name().as_ref())
                    .map_err(|_| parse_error(source, position, "non-UTF-8 tag name".into()))?
                    .to_string();

                if name == "Middleware" {
                    continue;
                }

                if name == "BehaviorTree" {
                    let frame = stack.pop().ok_or_else(|| {
                        parse_error(source, position, "unmatched closing tag 'BehaviorTree'".to_string())
                    })?;
                    let tree_name = frame.tree_name.unwrap_or_default();
                    let mut children = frame.children;
                    if children.len() != 1 {
                        return Err(parse_error(
                            source,
                            position,
                            format!("BehaviorTree '{tree_name}' must have exactly one root child, found {}", children.len()),
                        ));
                    }
                    document.trees.push((tree_name, children.pop().unwrap()));
                    continue;
                }

                if name == "BehaviorForest" {
                    continue;
                }

                let frame = stack.pop().ok_or_else(|| {
                    parse_error(source, position, format!("unmatched closing tag '{name}'"))
                })?;
                let node = build_node(&frame.tag, frame.attrs, frame.children, registry, source, position)?;
                attach(&mut stack, node);
            }

            _ => {}
        }
    }

    Ok(document)
}

fn attach(stack: &mut [Frame], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn build_node(
    tag: &str,
    attrs: HashMap<String, String>,
    children: Vec<Node>,
    registry: &NodeRegistry,
    source: &str,
    position: usize,
) -> BtResult<Node> {
    if RESERVED.contains(&tag) {
        return Err(parse_error(source, position, format!("'{tag}' is a reserved element name")));
    }

    let node = registry
        .create(tag, NodeConfig::from_attrs(attrs))?
        .with_children(children);
    node.validate()?;
    Ok(node)
}

fn tag_name(tag: &quick_xml::events::BytesStart<'_>, source: &str, position: usize) -> BtResult<String> {
    std::str::from_utf8(tag.name().as_ref())
        .map(str::to_string)
        .map_err(|_| parse_error(source, position, "non-UTF-8 tag name".into()))
}

fn read_attrs(
    tag: &quick_xml::events::BytesStart<'_>,
    reader: &Reader<&[u8]>,
    source: &str,
    position: usize,
) -> BtResult<HashMap<String, String>> {
    let mut attrs = HashMap::new();
    for attr in tag.attributes() {
        let attr = attr.map_err(|err| parse_error(source, position, err.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|_| parse_error(source, position, "non-UTF-8 attribute name".into()))?
            .to_string();
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| parse_error(source, position, err.to_string()))?
            .into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn parse_error(source: &str, byte_offset: usize, message: String) -> BtError {
    let (line, column) = line_col(source, byte_offset);
    BtError::ParseError { message, line, column }
}

/// Converts a byte offset into 1-based (line, column), matching where a text
/// editor would place the cursor.
fn line_col(source: &str, byte_offset: usize) -> (usize, usize) {
    let offset = byte_offset.min(source.len());
    let mut line = 1;
    let mut column = 1;
    for ch in source[..offset].chars() {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}
