//! emTeX special handler (spec.md §4.13): a point table keyed by integer
//! id, with lines deferred to `endPage` when they reference a point not
//! yet defined (SPEC_FULL.md §F).

use std::collections::HashMap;

use crate::geometry::Point;
use crate::xml::Element;

use super::{SpecialActions, SpecialHandler};

#[derive(Clone, Copy)]
pub enum EndCut {
    None,
    Horizontal,
    Vertical,
}

struct PendingLine {
    p1: u32,
    p2: u32,
    width: Option<f64>,
    cut: EndCut,
}

pub struct EmTexHandler {
    prefixes: [&'static str; 1],
    points: HashMap<u32, Point>,
    pending: Vec<PendingLine>,
}

impl EmTexHandler {
    pub fn new() -> Self {
        EmTexHandler { prefixes: ["em:"], points: HashMap::new(), pending: Vec::new() }
    }

    fn draw(&self, line: &PendingLine, actions: &mut dyn SpecialActions) -> bool {
        let (Some(&a), Some(&b)) = (self.points.get(&line.p1), self.points.get(&line.p2)) else {
            return false;
        };
        let (a, b) = match line.cut {
            EndCut::None => (a, b),
            EndCut::Horizontal => (Point::new(a.x, b.y), b),
            EndCut::Vertical => (Point::new(b.x, a.y), b),
        };
        let mut element = Element::new("line");
        element.set_attr_num("x1", a.x, 4);
        element.set_attr_num("y1", a.y, 4);
        element.set_attr_num("x2", b.x, 4);
        element.set_attr_num("y2", b.y, 4);
        if let Some(w) = line.width {
            element.set_attr_num("stroke-width", w, 4);
        }
        actions.append_to_page(crate::xml::Node::Element(element));
        true
    }
}

impl Default for EmTexHandler {
    fn default() -> Self {
        EmTexHandler::new()
    }
}

impl SpecialHandler for EmTexHandler {
    fn prefixes(&self) -> &[&str] {
        &self.prefixes
    }

    fn is_end_page_listener(&self) -> bool {
        true
    }

    fn process(&mut self, _prefix: &str, payload: &str, actions: &mut dyn SpecialActions) -> bool {
        let payload = payload.trim();
        if let Some(rest) = payload.strip_prefix("point ") {
            let mut parts = rest.split(',').map(str::trim);
            let (Some(id), Some(x), Some(y)) = (
                parts.next().and_then(|s| s.parse::<u32>().ok()),
                parts.next().and_then(|s| s.parse::<f64>().ok()),
                parts.next().and_then(|s| s.parse::<f64>().ok()),
            ) else {
                return false;
            };
            self.points.insert(id, Point::new(x, y));
            return true;
        }
        if let Some(rest) = payload.strip_prefix("line ") {
            let mut cut = EndCut::None;
            let rest = if let Some(r) = rest.strip_suffix(" h") {
                cut = EndCut::Horizontal;
                r
            } else if let Some(r) = rest.strip_suffix(" v") {
                cut = EndCut::Vertical;
                r
            } else {
                rest
            };
            let mut parts = rest.split(',').map(str::trim);
            let (Some(p1), Some(p2)) =
                (parts.next().and_then(|s| s.parse::<u32>().ok()), parts.next().and_then(|s| s.parse::<u32>().ok()))
            else {
                return false;
            };
            let width = parts.next().and_then(|s| s.parse::<f64>().ok());
            let line = PendingLine { p1, p2, width, cut };
            if !self.draw(&line, actions) {
                self.pending.push(line);
            }
            return true;
        }
        false
    }

    fn end_page(&mut self, _page_number: u32, actions: &mut dyn SpecialActions) {
        let lines: Vec<_> = self.pending.drain(..).collect();
        for line in lines {
            let _ = self.draw(&line, actions);
        }
        self.points.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_referencing_future_point_is_deferred() {
        let mut handler = EmTexHandler::new();
        assert!(handler.pending.is_empty());
        handler.pending.push(PendingLine { p1: 1, p2: 2, width: None, cut: EndCut::None });
        assert_eq!(handler.pending.len(), 1);
    }
}
