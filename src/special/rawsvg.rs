//! Raw-SVG handler (`dvisvgm:`, spec.md §4.13).

use std::collections::HashMap;

use crate::geometry::Point;
use crate::xml::{Element, Node};

use super::{SpecialActions, SpecialHandler};

pub struct RawSvgHandler {
    prefixes: [&'static str; 1],
    macros: HashMap<String, String>,
    recording: Option<(String, String)>,
}

impl RawSvgHandler {
    pub fn new() -> Self {
        RawSvgHandler { prefixes: ["dvisvgm:"], macros: HashMap::new(), recording: None }
    }

    /// `{?name}` and `{?bbox name}` substitution (spec.md §4.13).
    fn substitute(text: &str, actions: &dyn SpecialActions) -> String {
        let mut out = String::new();
        let mut pos = 0;
        while pos < text.len() {
            let Some(rel_start) = text[pos..].find('{') else {
                out.push_str(&text[pos..]);
                break;
            };
            let start = pos + rel_start;
            out.push_str(&text[pos..start]);
            let Some(rel_end) = text[start..].find('}') else {
                out.push_str(&text[start..]);
                break;
            };
            let end = start + rel_end;
            let inner = &text[start + 1..end];
            if let Some(name) = inner.strip_prefix("?bbox ") {
                if let Some(bbox) = actions.named_box(name.trim()) {
                    out.push_str(&format!("{} {} {} {}", bbox.min().x, bbox.min().y, bbox.width(), bbox.height()));
                }
            } else if let Some(var) = inner.strip_prefix('?') {
                match var {
                    "x" => out.push_str(&actions.cursor().x.to_string()),
                    "y" => out.push_str(&actions.cursor().y.to_string()),
                    "color" => out.push_str(&actions.current_color().to_string()),
                    "nl" => out.push('\n'),
                    _ => {}
                }
            } else {
                out.push('{');
                out.push_str(inner);
                out.push('}');
            }
            pos = end + 1;
        }
        out
    }
}

impl Default for RawSvgHandler {
    fn default() -> Self {
        RawSvgHandler::new()
    }
}

impl SpecialHandler for RawSvgHandler {
    fn prefixes(&self) -> &[&str] {
        &self.prefixes
    }

    fn process(&mut self, _prefix: &str, payload: &str, actions: &mut dyn SpecialActions) -> bool {
        let (command, rest) = payload.split_once(char::is_whitespace).unwrap_or((payload, ""));
        match command {
            "raw" | "rawdef" => {
                if let Some((_, buf)) = &mut self.recording {
                    buf.push_str(rest);
                    buf.push(' ');
                    return true;
                }
                let text = Self::substitute(rest, actions);
                let node = Node::CData(text);
                if command == "raw" {
                    actions.append_to_page(node);
                } else {
                    actions.append_to_defs(node);
                }
                true
            }
            "bbox" => {
                let mut parts = rest.splitn(2, char::is_whitespace);
                let mode = parts.next().unwrap_or("");
                let args = parts.next().unwrap_or("").trim();
                match mode {
                    "n" => {
                        actions.set_named_box(args, "0 0 0 0");
                        true
                    }
                    "a" | "f" => {
                        actions.set_named_box("__page__", args);
                        true
                    }
                    "r" => {
                        let p = actions.cursor();
                        actions.embed_named_box("__page__", p);
                        let _ = args;
                        true
                    }
                    _ => false,
                }
            }
            "img" => {
                let mut nums = rest.split_whitespace();
                let (Some(w), Some(h)) = (nums.next().and_then(|s| s.parse::<f64>().ok()), nums.next().and_then(|s| s.parse::<f64>().ok())) else {
                    return false;
                };
                let filename = rest.splitn(3, char::is_whitespace).nth(2).unwrap_or("").trim();
                let pos: Point = actions.cursor();
                let mut element = Element::new("image");
                element.set_attr_num("x", pos.x, 4);
                element.set_attr_num("y", pos.y, 4);
                element.set_attr_num("width", w, 4);
                element.set_attr_num("height", h, 4);
                element.set_attr("xlink:href", filename);
                actions.append_to_page(Node::Element(element));
                true
            }
            "rawset" => {
                let name = rest.trim().to_string();
                self.recording = Some((name, String::new()));
                true
            }
            "endrawset" => {
                if let Some((name, buf)) = self.recording.take() {
                    self.macros.insert(name, buf);
                    true
                } else {
                    false
                }
            }
            "rawput" => {
                let name = rest.trim();
                if let Some(buf) = self.macros.get(name).cloned() {
                    let text = Self::substitute(&buf, actions);
                    actions.append_to_page(Node::CData(text));
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::geometry::{BoundingBox, Matrix};

    struct TestActions {
        cursor: Point,
    }
    impl SpecialActions for TestActions {
        fn cursor(&self) -> Point {
            self.cursor
        }
        fn set_cursor(&mut self, p: Point) {
            self.cursor = p;
        }
        fn finish_line(&mut self) {}
        fn current_color(&self) -> Color {
            Color::BLACK
        }
        fn push_color(&mut self, _c: Color) {}
        fn pop_color(&mut self) {}
        fn reset_and_set_color(&mut self, _c: Color) {}
        fn set_background(&mut self, _c: Color) {}
        fn matrix(&self) -> Matrix {
            Matrix::IDENTITY
        }
        fn set_matrix(&mut self, _m: Matrix) {}
        fn page_matrix(&self) -> Matrix {
            Matrix::IDENTITY
        }
        fn append_to_page(&mut self, _node: Node) {}
        fn prepend_to_page(&mut self, _node: Node) {}
        fn append_to_defs(&mut self, _node: Node) {}
        fn push_context_element(&mut self, _element: Element) {}
        fn pop_context_element(&mut self) {}
        fn page_box(&self) -> BoundingBox {
            BoundingBox::new()
        }
        fn embed_page_box(&mut self, _p: Point) {}
        fn named_box(&self, _name: &str) -> Option<BoundingBox> {
            None
        }
        fn embed_named_box(&mut self, _name: &str, _p: Point) {}
        fn set_named_box(&mut self, _name: &str, _text: &str) {}
        fn report_progress(&mut self, _message: &str) {}
    }

    #[test]
    fn substitutes_cursor_variables() {
        let actions = TestActions { cursor: Point::new(12.0, 34.0) };
        let out = RawSvgHandler::substitute("x={?x} y={?y}", &actions);
        assert_eq!(out, "x=12 y=34");
    }

    #[test]
    fn rawset_records_until_endrawset() {
        let mut handler = RawSvgHandler::new();
        let mut actions = TestActions { cursor: Point::new(0.0, 0.0) };
        handler.process("dvisvgm:", "rawset m1", &mut actions);
        handler.process("dvisvgm:", "raw <circle/>", &mut actions);
        handler.process("dvisvgm:", "endrawset", &mut actions);
        assert!(handler.macros.get("m1").unwrap().contains("<circle/>"));
    }
}
