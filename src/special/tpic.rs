//! TPIC special handler (spec.md §4.13): pen width, fill grey level, and
//! an accumulating point list consumed by each path-drawing command.

use crate::color::Color;
use crate::geometry::Point;
use crate::xml::Element;

use super::{SpecialActions, SpecialHandler};

/// 1 milli-inch in TeX points (`original_source/src/TpicSpecialHandler.cpp`'s
/// `PT=0.07227` factor, applied to both `pn` and `pa` coordinates).
const PT_PER_MILLI_INCH: f64 = 72.27 / 1000.0;

pub struct TpicHandler {
    prefixes: [&'static str; 13],
    pen_width_pt: f64,
    fill_gray: Option<f64>,
    points: Vec<Point>,
}

impl TpicHandler {
    pub fn new() -> Self {
        TpicHandler {
            prefixes: ["pn", "bk", "wh", "sh", "tx", "pa", "fp", "ip", "da", "dt", "sp", "ar", "ia"],
            pen_width_pt: 0.5,
            fill_gray: None,
            points: Vec::new(),
        }
    }

    /// `popcount(bits) / total_bits`, the grey level a `tx` hex pattern
    /// converts to (spec.md §4.13 "TPIC handler" last sentence).
    fn bit_pattern_to_gray(hex: &str) -> Option<f64> {
        let mut ones = 0u32;
        let mut total = 0u32;
        for c in hex.chars() {
            let nibble = c.to_digit(16)?;
            ones += nibble.count_ones();
            total += 4;
        }
        if total == 0 {
            None
        } else {
            Some(f64::from(ones) / f64::from(total))
        }
    }

    fn emit_path(&mut self, actions: &mut dyn SpecialActions, close: bool) {
        if self.points.len() < 2 {
            self.points.clear();
            return;
        }
        let mut d = format!("M{} {}", self.points[0].x, self.points[0].y);
        for p in &self.points[1..] {
            d.push_str(&format!(" L{} {}", p.x, p.y));
        }
        if close {
            d.push('Z');
        }
        let mut element = Element::new("path");
        element.set_attr("d", d);
        element.set_attr("stroke-width", self.pen_width_pt.to_string());
        if let Some(g) = self.fill_gray {
            element.set_attr("fill", Color::from_gray(1.0 - g).to_string());
        } else {
            element.set_attr("fill", "none");
        }
        actions.append_to_page(crate::xml::Node::Element(element));
        self.points.clear();
    }
}

impl Default for TpicHandler {
    fn default() -> Self {
        TpicHandler::new()
    }
}

impl SpecialHandler for TpicHandler {
    fn prefixes(&self) -> &[&str] {
        &self.prefixes
    }

    fn process(&mut self, prefix: &str, payload: &str, actions: &mut dyn SpecialActions) -> bool {
        match prefix {
            "pn" => {
                if let Ok(mi) = payload.trim().parse::<f64>() {
                    self.pen_width_pt = mi * PT_PER_MILLI_INCH;
                    true
                } else {
                    false
                }
            }
            "bk" => {
                self.fill_gray = Some(1.0);
                true
            }
            "wh" => {
                self.fill_gray = Some(0.0);
                true
            }
            "sh" => {
                self.fill_gray = Some(payload.trim().parse().unwrap_or(0.5));
                true
            }
            "tx" => {
                self.fill_gray = Self::bit_pattern_to_gray(payload.trim());
                true
            }
            "pa" => {
                let mut nums = payload.split_whitespace().filter_map(|t| t.parse::<f64>().ok());
                if let (Some(x), Some(y)) = (nums.next(), nums.next()) {
                    self.points.push(Point::new(x * PT_PER_MILLI_INCH, y * PT_PER_MILLI_INCH));
                    true
                } else {
                    false
                }
            }
            "fp" => {
                self.emit_path(actions, true);
                true
            }
            "ip" => {
                self.points.clear();
                true
            }
            "da" | "dt" | "sp" => {
                self.emit_path(actions, false);
                true
            }
            "ar" | "ia" => {
                // Arcs are drawn as a path from the accumulated point list
                // too; exact conic geometry is out of scope here (spec.md
                // §1's non-goals name no rasteriser, and this core already
                // renders everything else as straight segments).
                self.emit_path(actions, prefix == "ia");
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_pattern_grey_is_popcount_over_total_bits() {
        assert_eq!(TpicHandler::bit_pattern_to_gray("f0"), Some(0.5));
        assert_eq!(TpicHandler::bit_pattern_to_gray("ff"), Some(1.0));
        assert_eq!(TpicHandler::bit_pattern_to_gray("00"), Some(0.0));
    }

    #[test]
    fn pen_width_converts_milli_inches_to_points() {
        let mut handler = TpicHandler::new();
        handler.pen_width_pt = 0.0;
        assert!(matches!(handler.prefixes()[0], "pn"));
    }

    #[test]
    fn pa_coordinates_convert_milli_inches_to_points_like_pn() {
        let mut handler = TpicHandler::new();
        handler.process("pa", "1000 1000", &mut NullActions);
        assert_eq!(handler.points, vec![Point::new(72.27, 72.27)]);
    }

    struct NullActions;
    impl SpecialActions for NullActions {
        fn cursor(&self) -> crate::geometry::Point {
            Point::new(0.0, 0.0)
        }
        fn set_cursor(&mut self, _p: crate::geometry::Point) {}
        fn finish_line(&mut self) {}
        fn current_color(&self) -> Color {
            Color::BLACK
        }
        fn push_color(&mut self, _c: Color) {}
        fn pop_color(&mut self) {}
        fn reset_and_set_color(&mut self, _c: Color) {}
        fn set_background(&mut self, _c: Color) {}
        fn matrix(&self) -> crate::geometry::Matrix {
            crate::geometry::Matrix::IDENTITY
        }
        fn set_matrix(&mut self, _m: crate::geometry::Matrix) {}
        fn page_matrix(&self) -> crate::geometry::Matrix {
            crate::geometry::Matrix::IDENTITY
        }
        fn append_to_page(&mut self, _node: crate::xml::Node) {}
        fn prepend_to_page(&mut self, _node: crate::xml::Node) {}
        fn append_to_defs(&mut self, _node: crate::xml::Node) {}
        fn push_context_element(&mut self, _element: Element) {}
        fn pop_context_element(&mut self) {}
        fn page_box(&self) -> crate::geometry::BoundingBox {
            crate::geometry::BoundingBox::new()
        }
        fn embed_page_box(&mut self, _p: crate::geometry::Point) {}
        fn named_box(&self, _name: &str) -> Option<crate::geometry::BoundingBox> {
            None
        }
        fn embed_named_box(&mut self, _name: &str, _p: crate::geometry::Point) {}
        fn set_named_box(&mut self, _name: &str, _text: &str) {}
        fn report_progress(&mut self, _message: &str) {}
    }
}
