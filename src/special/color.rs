//! Colour special handler (spec.md §4.13, §8 Scenario 1).

use crate::color::Color;

use super::{SpecialActions, SpecialHandler};

pub struct ColorSpecialHandler {
    prefixes: [&'static str; 1],
}

impl ColorSpecialHandler {
    pub fn new() -> Self {
        ColorSpecialHandler { prefixes: ["color"] }
    }
}

impl Default for ColorSpecialHandler {
    fn default() -> Self {
        ColorSpecialHandler::new()
    }
}

/// Parses `rgb r g b`, `hsb h s b`, `cmyk c m y k`, `gray g`, or a bare
/// dvips colour name.
pub fn parse_color_spec(tokens: &[&str]) -> Option<Color> {
    match tokens {
        [] => None,
        ["rgb", r, g, b] => {
            let (r, g, b) = (r.parse().ok()?, g.parse().ok()?, b.parse().ok()?);
            Some(Color::from_rgb8(to_u8(r), to_u8(g), to_u8(b)))
        }
        ["hsb", h, s, v] => Some(Color::from_hsb(h.parse().ok()?, s.parse().ok()?, v.parse().ok()?)),
        ["cmyk", c, m, y, k] => Some(Color::from_cmyk(c.parse().ok()?, m.parse().ok()?, y.parse().ok()?, k.parse().ok()?)),
        ["gray", g] | ["grey", g] => Some(Color::from_gray(g.parse().ok()?)),
        [name] if name.starts_with('#') => Color::from_hex(name),
        [name] => Color::from_name(name),
        _ => None,
    }
}

fn to_u8(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl SpecialHandler for ColorSpecialHandler {
    fn prefixes(&self) -> &[&str] {
        &self.prefixes
    }

    fn process(&mut self, _prefix: &str, payload: &str, actions: &mut dyn SpecialActions) -> bool {
        let tokens: Vec<&str> = payload.split_whitespace().collect();
        match tokens.as_slice() {
            ["pop"] => {
                actions.pop_color();
                true
            }
            ["push", rest @ ..] => {
                if let Some(c) = parse_color_spec(rest) {
                    actions.push_color(c);
                    true
                } else {
                    false
                }
            }
            rest => {
                if let Some(c) = parse_color_spec(rest) {
                    actions.reset_and_set_color(c);
                    true
                } else {
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BoundingBox, Matrix, Point};
    use crate::xml::{Element, Node};

    struct TestActions {
        stack: crate::color::ColorStack,
    }

    impl SpecialActions for TestActions {
        fn cursor(&self) -> Point {
            Point::new(0.0, 0.0)
        }
        fn set_cursor(&mut self, _p: Point) {}
        fn finish_line(&mut self) {}
        fn current_color(&self) -> Color {
            self.stack.top()
        }
        fn push_color(&mut self, c: Color) {
            self.stack.push(c);
        }
        fn pop_color(&mut self) {
            self.stack.pop();
        }
        fn reset_and_set_color(&mut self, c: Color) {
            self.stack.reset_and_set(c);
        }
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
    fn scenario_1_color_stack_sequence() {
        let mut handler = ColorSpecialHandler::new();
        let mut actions = TestActions { stack: crate::color::ColorStack::new() };
        handler.process("color", "push Red", &mut actions);
        handler.process("color", "push rgb 0 1 0", &mut actions);
        handler.process("color", "pop", &mut actions);
        handler.process("color", "Blue", &mut actions);
        handler.process("color", "pop", &mut actions);
        assert_eq!(actions.current_color(), Color::from_name("Blue").unwrap());
    }
}
