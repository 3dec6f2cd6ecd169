//! C5: a small XML tree for building the output document (spec.md §4.5).
//!
//! The teacher's `xml.rs` parses XML into an arena of linked nodes — the
//! right shape for a DOM that is built once by a streaming parser and
//! then walked many times with sibling/parent links. The SVG builder
//! (C14) instead grows a tree top-down while handling DVI events and
//! only ever needs to serialise it once at the end, so a conventional
//! owned recursive tree (children as a `Vec`, the way `pdf::object::Object`
//! owns its `Dictionary`'s pairs) is the better fit; the escaping and
//! deferred-serialisation design still follows the teacher's `Node`/`NodeData`
//! split between structure and payload.

use std::io::{self, Write};

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Element { name: name.into(), attributes: Vec::new(), children: Vec::new() }
    }

    /// Attributes are written in insertion order; setting an existing
    /// attribute again updates it in place rather than duplicating it.
    pub fn set_attr<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.attributes.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            self.attributes.push((key, value));
        }
        self
    }

    pub fn set_attr_num<K: Into<String>>(&mut self, key: K, value: f64, precision: u8) -> &mut Self {
        self.set_attr(key, format_number(value, precision))
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    /// Text nodes merge when appended adjacently (spec.md §4.5).
    pub fn append_text<S: AsRef<str>>(&mut self, text: S) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text.as_ref());
        } else {
            self.children.push(Node::Text(text.as_ref().to_string()));
        }
    }

    pub fn append_child(&mut self, node: Node) {
        self.children.push(node);
    }

    pub fn prepend_child(&mut self, node: Node) {
        self.children.insert(0, node);
    }

    pub fn append_element(&mut self, element: Element) -> &mut Element {
        self.children.push(Node::Element(element));
        match self.children.last_mut().unwrap() {
            Node::Element(e) => e,
            _ => unreachable!(),
        }
    }

    pub fn find_child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }
}

fn format_number(value: f64, precision: u8) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let s = format!("{:.*}", precision as usize, value);
    // Strip trailing zeros, then a trailing decimal point.
    let s = if s.contains('.') {
        let trimmed = s.trim_end_matches('0');
        trimmed.trim_end_matches('.').to_string()
    } else {
        s
    };
    if s.is_empty() || s == "-0" { "0".to_string() } else { s }
}

fn escape(text: &str, out: &mut impl Write) -> io::Result<()> {
    for c in text.chars() {
        match c {
            '&' => write!(out, "&amp;")?,
            '<' => write!(out, "&lt;")?,
            '>' => write!(out, "&gt;")?,
            '"' => write!(out, "&quot;")?,
            '\'' => write!(out, "&apos;")?,
            _ => write!(out, "{}", c)?,
        }
    }
    Ok(())
}

impl Node {
    pub fn serialize(&self, out: &mut impl Write) -> io::Result<()> {
        match self {
            Node::Element(e) => e.serialize(out),
            Node::Text(t) => escape(t, out),
            Node::CData(t) => write!(out, "<![CDATA[{}]]>", t),
            Node::Comment(t) => write!(out, "<!--{}-->", t),
        }
    }
}

impl Element {
    pub fn serialize(&self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "<{}", self.name)?;
        for (k, v) in &self.attributes {
            write!(out, " {}=\"", k)?;
            escape(v, out)?;
            write!(out, "\"")?;
        }
        if self.children.is_empty() {
            write!(out, "/>")
        } else {
            write!(out, ">")?;
            for child in &self.children {
                child.serialize(out)?;
            }
            write!(out, "</{}>", self.name)
        }
    }
}

/// The document-level wrapper: prolog, optional doctype, root element
/// (spec.md §4.5 / §6).
pub struct Document {
    pub doctype: Option<String>,
    pub root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Document { doctype: None, root }
    }

    pub fn serialize(&self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "<?xml version='1.0'?>\n")?;
        if let Some(doctype) = &self.doctype {
            write!(out, "{}\n", doctype)?;
        }
        self.root.serialize(out)?;
        writeln!(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_serialize_in_insertion_order() {
        let mut e = Element::new("rect");
        e.set_attr("y", "1");
        e.set_attr("x", "2");
        let mut buf = Vec::new();
        e.serialize(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), r#"<rect y="1" x="2"/>"#);
    }

    #[test]
    fn text_escapes_special_characters() {
        let mut e = Element::new("text");
        e.append_text("a < b & c > d \"e\" 'f'");
        let mut buf = Vec::new();
        e.serialize(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            r#"<text>a &lt; b &amp; c &gt; d &quot;e&quot; &apos;f&apos;</text>"#
        );
    }

    #[test]
    fn adjacent_text_nodes_merge() {
        let mut e = Element::new("text");
        e.append_text("foo");
        e.append_text("bar");
        assert_eq!(e.children().len(), 1);
    }

    #[test]
    fn numeric_attribute_precision_strips_trailing_zeros() {
        assert_eq!(format_number(1.5, 6), "1.5");
        assert_eq!(format_number(1.0, 6), "1");
        assert_eq!(format_number(0.1234567, 6), "0.123457");
    }
}
