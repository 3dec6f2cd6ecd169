//! C2: 2D points, affine matrices and bounding boxes (spec.md §4.2).
//!
//! `Point` and `Angle` are adapted from `victor/src/svg/geometry.rs`
//! (`Pair`/`Angle`); `Matrix` and `BoundingBox` are new, grounded on the
//! same file's small-vector-math style (plain `f64` fields, no generic
//! unit parameter — unlike `victor/src/primitives.rs`'s `euclid`-typed
//! lengths, the DVI core works in a single unit, TeX points, throughout,
//! so a bare `f64` carries less incidental complexity).

use std::f64::consts::PI;
use std::fmt;

use crate::error::{DviErrorKind, Fatal, Result};

/// 1 TeX point in big points / SVG user units (spec.md §3: "conversion
/// to the SVG user unit (bp) applies only at output"). Every internal
/// computation — cursor math, bounding boxes, matrices — stays in TeX
/// points; this factor is applied exactly once, where page content is
/// emitted into the final document.
pub const BP_PER_PT: f64 = 72.0 / 72.27;

#[derive(Copy, Clone, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.x as f32, self.y as f32)
    }
}

impl std::ops::Add for Point {
    type Output = Point;
    fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;
    fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

#[derive(Copy, Clone, PartialEq)]
pub struct Angle {
    radians: f64,
}

impl Angle {
    pub fn from_degrees(degrees: f64) -> Self {
        Angle { radians: degrees * PI / 180.0 }
    }

    pub fn as_radians(self) -> f64 {
        self.radians
    }

    pub fn sin(self) -> f64 {
        self.radians.sin()
    }

    pub fn cos(self) -> f64 {
        self.radians.cos()
    }
}

/// A 3×3 affine matrix whose last row is implicitly `(0, 0, 1)`.
///
/// Fields are named `a..f` in SVG's own convention
/// (`matrix(a b c d e f)`), so serialisation (spec.md §4.2, Scenario 10)
/// is a direct field read with no repacking.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    pub fn translate(tx: f64, ty: f64) -> Self {
        Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: tx, f: ty }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Matrix { a: sx, b: 0.0, c: 0.0, d: sy, e: 0.0, f: 0.0 }
    }

    pub fn rotate_degrees(degrees: f64) -> Self {
        let angle = Angle::from_degrees(degrees);
        let (sin, cos) = (angle.sin(), angle.cos());
        Matrix { a: cos, b: sin, c: -sin, d: cos, e: 0.0, f: 0.0 }
    }

    pub fn is_identity(&self) -> bool {
        *self == Matrix::IDENTITY
    }

    /// `self * other`: applying the result to a point is the same as
    /// applying `other` first, then `self`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: other.a * self.a + other.b * self.c,
            b: other.a * self.b + other.b * self.d,
            c: other.c * self.a + other.d * self.c,
            d: other.c * self.b + other.d * self.d,
            e: other.e * self.a + other.f * self.c + self.e,
            f: other.e * self.b + other.f * self.d + self.f,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    pub fn inverse(&self) -> Result<Matrix> {
        let det = self.determinant();
        if det.abs() < 1e-12 {
            return Err(Fatal::new(DviErrorKind::SingularMatrix));
        }
        let inv_det = 1.0 / det;
        Ok(Matrix {
            a: self.d * inv_det,
            b: -self.b * inv_det,
            c: -self.c * inv_det,
            d: self.a * inv_det,
            e: (self.c * self.f - self.d * self.e) * inv_det,
            f: (self.b * self.e - self.a * self.f) * inv_det,
        })
    }

    /// dvips column-major packing: `matrix(a b c d e f)` (spec.md Scenario 10).
    pub fn to_svg_string(&self) -> String {
        format!(
            "matrix({} {} {} {} {} {})",
            fmt_num(self.a), fmt_num(self.b), fmt_num(self.c),
            fmt_num(self.d), fmt_num(self.e), fmt_num(self.f),
        )
    }
}

fn fmt_num(x: f64) -> String {
    let mut buf = Vec::new();
    dtoa::write(&mut buf, x).unwrap();
    String::from_utf8(buf).unwrap()
}

/// A two-corner, growable bounding box (spec.md §3 "Bounding box").
#[derive(Copy, Clone, Debug)]
pub struct BoundingBox {
    min: Point,
    max: Point,
    valid: bool,
    locked: bool,
}

impl Default for BoundingBox {
    fn default() -> Self {
        BoundingBox::new()
    }
}

impl BoundingBox {
    pub fn new() -> Self {
        BoundingBox {
            min: Point::new(0.0, 0.0),
            max: Point::new(0.0, 0.0),
            valid: false,
            locked: false,
        }
    }

    pub fn from_corners(min: Point, max: Point) -> Self {
        BoundingBox { min, max, valid: true, locked: false }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn min(&self) -> Point {
        self.min
    }

    pub fn max(&self) -> Point {
        self.max
    }

    pub fn width(&self) -> f64 {
        if self.valid { self.max.x - self.min.x } else { 0.0 }
    }

    pub fn height(&self) -> f64 {
        if self.valid { self.max.y - self.min.y } else { 0.0 }
    }

    pub fn embed_point(&mut self, p: Point) {
        if self.locked {
            return;
        }
        if !self.valid {
            self.min = p;
            self.max = p;
            self.valid = true;
            return;
        }
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn embed(&mut self, other: &BoundingBox) {
        if self.locked || !other.valid {
            return;
        }
        self.embed_point(other.min);
        self.embed_point(other.max);
    }

    pub fn intersect(&mut self, other: &BoundingBox) {
        if self.locked || !self.valid || !other.valid {
            return;
        }
        let new_min = Point::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y));
        let new_max = Point::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y));
        if new_min.x <= new_max.x && new_min.y <= new_max.y {
            self.min = new_min;
            self.max = new_max;
        } else {
            self.valid = false;
        }
    }

    /// Replace this box with the bounding box of the four image corners
    /// under `m` (a conservative over-approximation for rotations).
    pub fn transform(&self, m: &Matrix) -> BoundingBox {
        if !self.valid {
            return *self;
        }
        let corners = [
            Point::new(self.min.x, self.min.y),
            Point::new(self.max.x, self.min.y),
            Point::new(self.max.x, self.max.y),
            Point::new(self.min.x, self.max.y),
        ];
        let mut result = BoundingBox::new();
        for &c in &corners {
            result.embed_point(m.apply(c));
        }
        result
    }

    /// Parse the textual form used by raw-SVG `bbox` specials (spec.md
    /// §8, Scenario 7): either four lengths `"x0 y0 x1 y1"` (each with an
    /// optional unit suffix, only `pt` recognised here since the core
    /// only ever deals in points) setting the box outright, or one length
    /// expanding the existing box isotropically outward on every side.
    pub fn set_from_str(&mut self, text: &str) {
        let values: Vec<f64> = text
            .split_whitespace()
            .map(|tok| tok.trim_end_matches("pt").parse::<f64>().unwrap_or(0.0))
            .collect();
        match values.as_slice() {
            [x0, y0, x1, y1] => {
                self.min = Point::new(*x0, *y0);
                self.max = Point::new(*x1, *y1);
                self.valid = true;
            }
            [d] => {
                if self.valid {
                    self.min = Point::new(self.min.x - d, self.min.y - d);
                    self.max = Point::new(self.max.x + d, self.max.y + d);
                } else {
                    self.min = Point::new(-d, -d);
                    self.max = Point::new(*d, *d);
                    self.valid = true;
                }
            }
            _ => {}
        }
    }
}

/// Variables a matrix script's numbers may reference instead of a literal,
/// resolved at expansion time against the running page bounding box
/// (spec.md §4.2).
#[derive(Copy, Clone, Debug, Default)]
pub struct ScriptContext {
    pub ux: f64,
    pub uy: f64,
    pub w: f64,
    pub h: f64,
}

impl ScriptContext {
    fn resolve(&self, token: &str) -> Option<f64> {
        match token {
            "ux" => Some(self.ux),
            "uy" => Some(self.uy),
            "w" => Some(self.w),
            "h" => Some(self.h),
            _ => None,
        }
    }
}

/// Unit suffixes accepted after a number, all converted to TeX points.
fn unit_factor(suffix: &str) -> f64 {
    match suffix {
        "pt" | "" => 1.0,
        "in" => 72.27,
        "cm" => 72.27 / 2.54,
        "mm" => 72.27 / 25.4,
        _ => 1.0,
    }
}

fn parse_value(token: &str, ctx: &ScriptContext) -> f64 {
    if let Some(v) = ctx.resolve(token) {
        return v;
    }
    let split_at = token.find(|c: char| c.is_alphabetic()).unwrap_or(token.len());
    let (number, suffix) = token.split_at(split_at);
    number.parse::<f64>().unwrap_or(0.0) * unit_factor(suffix)
}

/// Compile a textual matrix script of the form
/// `R<angle>[,cx,cy] T<tx>,<ty> S<sx>,<sy> M<a b c d e f>` (concatenable,
/// space-separated) into a single `Matrix`, applied left to right.
pub fn parse_matrix_script(script: &str, ctx: &ScriptContext) -> Matrix {
    let mut result = Matrix::IDENTITY;
    for token in script.split_whitespace() {
        if token.is_empty() {
            continue;
        }
        let (kind, rest) = token.split_at(1);
        let args: Vec<f64> = rest
            .split(|c| c == ',' || c == ' ')
            .filter(|s| !s.is_empty())
            .map(|s| parse_value(s, ctx))
            .collect();
        let step = match kind {
            "R" => match args.as_slice() {
                [angle] => Matrix::rotate_degrees(*angle),
                [angle, cx, cy] => Matrix::translate(*cx, *cy)
                    .then(&Matrix::rotate_degrees(*angle))
                    .then(&Matrix::translate(-cx, -cy)),
                _ => Matrix::IDENTITY,
            },
            "T" => match args.as_slice() {
                [tx, ty] => Matrix::translate(*tx, *ty),
                _ => Matrix::IDENTITY,
            },
            "S" => match args.as_slice() {
                [sx, sy] => Matrix::scale(*sx, *sy),
                [s] => Matrix::scale(*s, *s),
                _ => Matrix::IDENTITY,
            },
            "M" => match args.as_slice() {
                [a, b, c, d, e, f] => Matrix { a: *a, b: *b, c: *c, d: *d, e: *e, f: *f },
                _ => Matrix::IDENTITY,
            },
            _ => Matrix::IDENTITY,
        };
        result = step.then(&result);
    }
    result
}
