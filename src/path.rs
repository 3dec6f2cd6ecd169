//! C4: a graphic path built from move/line/quadratic/cubic/close
//! commands (spec.md §4.4).
//!
//! The teacher's `svg/simple_path.rs` goes the other direction — it
//! *simplifies* an already-parsed SVG path (reflecting smooth curves,
//! resolving relative coordinates) — but the reflection trick
//! (`center * 2 - self`, see `Pair::reflect`) is exactly what the
//! serializer below needs to decide when `S`/`T` shorthand applies, so
//! it is reused verbatim.

use crate::geometry::{BoundingBox, Matrix, Point};

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Segment {
    Move(Point),
    Line(Point),
    Quad(Point, Point),
    Cubic(Point, Point, Point),
    Close,
}

#[derive(Clone, Debug, Default)]
pub struct GraphicPath {
    segments: Vec<Segment>,
}

impl GraphicPath {
    pub fn new() -> Self {
        GraphicPath { segments: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// A `Move` right after another `Move` overwrites instead of
    /// duplicating (spec.md §4.4).
    pub fn move_to(&mut self, p: Point) {
        if let Some(Segment::Move(last)) = self.segments.last_mut() {
            *last = p;
        } else {
            self.segments.push(Segment::Move(p));
        }
    }

    pub fn line_to(&mut self, p: Point) {
        self.segments.push(Segment::Line(p));
    }

    pub fn quad_to(&mut self, control: Point, to: Point) {
        self.segments.push(Segment::Quad(control, to));
    }

    pub fn cubic_to(&mut self, c1: Point, c2: Point, to: Point) {
        self.segments.push(Segment::Cubic(c1, c2, to));
    }

    pub fn close(&mut self) {
        self.segments.push(Segment::Close);
    }

    pub fn transform(&mut self, m: &Matrix) {
        for seg in &mut self.segments {
            *seg = match *seg {
                Segment::Move(p) => Segment::Move(m.apply(p)),
                Segment::Line(p) => Segment::Line(m.apply(p)),
                Segment::Quad(c, p) => Segment::Quad(m.apply(c), m.apply(p)),
                Segment::Cubic(c1, c2, p) => Segment::Cubic(m.apply(c1), m.apply(c2), m.apply(p)),
                Segment::Close => Segment::Close,
            };
        }
    }

    /// Unions the tight bounds of every segment; curves use their
    /// control-point hull as a safe over-approximation (spec.md §4.4).
    pub fn compute_bbox(&self) -> BoundingBox {
        let mut bbox = BoundingBox::new();
        for seg in &self.segments {
            match *seg {
                Segment::Move(p) | Segment::Line(p) => bbox.embed_point(p),
                Segment::Quad(c, p) => {
                    bbox.embed_point(c);
                    bbox.embed_point(p);
                }
                Segment::Cubic(c1, c2, p) => {
                    bbox.embed_point(c1);
                    bbox.embed_point(c2);
                    bbox.embed_point(p);
                }
                Segment::Close => {}
            }
        }
        bbox
    }

    /// Inserts a `Close` before every `Move` that follows a non-closed
    /// subpath, and at end-of-path (spec.md §4.4).
    pub fn close_open_sub_paths(&mut self) {
        let mut result = Vec::with_capacity(self.segments.len() + 1);
        let mut open = false;
        for seg in self.segments.drain(..) {
            match seg {
                Segment::Move(_) if open => {
                    result.push(Segment::Close);
                    open = true;
                    result.push(seg);
                }
                Segment::Move(_) => {
                    open = true;
                    result.push(seg);
                }
                Segment::Close => {
                    open = false;
                    result.push(seg);
                }
                other => {
                    result.push(other);
                }
            }
        }
        if open {
            result.push(Segment::Close);
        }
        self.segments = result;
    }

    /// Serialise to the shortest SVG `d` form: `H`/`V` for horizontal and
    /// vertical lines, `T`/`S` when a quadratic/cubic control point is the
    /// reflection of the previous curve's trailing control point through
    /// the current point (spec.md §4.4, Scenario 4 & 5).
    pub fn to_svg_d(&self) -> String {
        let mut out = String::new();
        let mut current = Point::new(0.0, 0.0);
        let mut prev_cubic_control: Option<Point> = None;
        let mut prev_quad_control: Option<Point> = None;

        for seg in &self.segments {
            match *seg {
                Segment::Move(p) => {
                    out.push('M');
                    push_point(&mut out, p);
                    current = p;
                    prev_cubic_control = None;
                    prev_quad_control = None;
                }
                Segment::Line(p) => {
                    if (p.y - current.y).abs() < f64::EPSILON {
                        out.push('H');
                        push_num(&mut out, p.x);
                    } else if (p.x - current.x).abs() < f64::EPSILON {
                        out.push('V');
                        push_num(&mut out, p.y);
                    } else {
                        out.push('L');
                        push_point(&mut out, p);
                    }
                    current = p;
                    prev_cubic_control = None;
                    prev_quad_control = None;
                }
                Segment::Quad(c, p) => {
                    if prev_quad_control.map(|pc| reflect(pc, current) == c).unwrap_or(false) {
                        out.push('T');
                        push_point(&mut out, p);
                    } else {
                        out.push('Q');
                        push_point(&mut out, c);
                        push_point(&mut out, p);
                    }
                    current = p;
                    prev_quad_control = Some(c);
                    prev_cubic_control = None;
                }
                Segment::Cubic(c1, c2, p) => {
                    if prev_cubic_control.map(|pc| reflect(pc, current) == c1).unwrap_or(false) {
                        out.push('S');
                        push_point(&mut out, c2);
                        push_point(&mut out, p);
                    } else {
                        out.push('C');
                        push_point(&mut out, c1);
                        push_point(&mut out, c2);
                        push_point(&mut out, p);
                    }
                    current = p;
                    prev_cubic_control = Some(c2);
                    prev_quad_control = None;
                }
                Segment::Close => {
                    out.push('Z');
                    prev_cubic_control = None;
                    prev_quad_control = None;
                }
            }
        }
        out
    }
}

fn reflect(control: Point, center: Point) -> Point {
    // control + 2 * (center - control) == center * 2 - control
    Point::new(center.x * 2.0 - control.x, center.y * 2.0 - control.y)
}

fn push_num(out: &mut String, x: f64) {
    let rounded = round_for_display(x);
    if !out.is_empty() {
        let last = out.chars().last().unwrap();
        if rounded >= 0.0 && last != ' ' && !"MLHVQTCSZ".contains(last) {
            out.push(' ');
        }
    }
    let mut buf = Vec::new();
    dtoa::write(&mut buf, rounded).unwrap();
    out.push_str(std::str::from_utf8(&buf).unwrap());
}

fn push_point(out: &mut String, p: Point) {
    push_num(out, p.x);
    out.push(' ');
    let mut buf = Vec::new();
    dtoa::write(&mut buf, round_for_display(p.y)).unwrap();
    out.push_str(std::str::from_utf8(&buf).unwrap());
}

/// Round away sub-attometer noise so `dtoa` doesn't print
/// `56.974000000000004`-style artefacts of float arithmetic.
fn round_for_display(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_optimisation_scenario_4() {
        let mut p = GraphicPath::new();
        p.move_to(Point::new(0.0, 0.0));
        p.line_to(Point::new(10.0, 0.0));
        p.line_to(Point::new(10.0, 20.0));
        assert_eq!(p.to_svg_d(), "M0 0H10V20");
    }

    #[test]
    fn transform_scenario_5() {
        let mut p = GraphicPath::new();
        p.move_to(Point::new(0.0, 0.0));
        p.line_to(Point::new(1.0, 0.0));
        p.line_to(Point::new(1.0, 1.0));
        p.line_to(Point::new(0.0, 1.0));
        p.close();

        // `Matrix::then` composes outer.then(inner), so building "apply
        // scale, then translate, then rotate" (in that sequence) chains
        // the steps innermost-first: rotate.then(translate.then(scale)).
        let m = Matrix::rotate_degrees(90.0)
            .then(&Matrix::translate(10.0, 100.0).then(&Matrix::scale(2.0, 2.0)));
        p.transform(&m);
        assert_eq!(p.to_svg_d(), "M-100 10V12H-102V10Z");
    }

    #[test]
    fn move_after_move_overwrites() {
        let mut p = GraphicPath::new();
        p.move_to(Point::new(0.0, 0.0));
        p.move_to(Point::new(5.0, 5.0));
        assert_eq!(p.segments().len(), 1);
    }

    #[test]
    fn close_open_subpaths_inserts_before_move_and_at_end() {
        let mut p = GraphicPath::new();
        p.move_to(Point::new(0.0, 0.0));
        p.line_to(Point::new(1.0, 0.0));
        p.move_to(Point::new(5.0, 5.0));
        p.line_to(Point::new(6.0, 5.0));
        p.close_open_sub_paths();
        let segs = p.segments();
        assert_eq!(segs.len(), 6);
        assert_eq!(segs[2], Segment::Close);
        assert_eq!(segs[5], Segment::Close);
    }
}
