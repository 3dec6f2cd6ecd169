//! C9: glyph outline tracer with an on-disk cache (spec.md §4.9).
//!
//! Grounded on `victor/src/fonts/tables.rs`'s callback-style glyph
//! reading (`glyf` outlines are walked point by point into caller
//! state) for the outline-font path, and on `original_source/src/Bitmap.cpp`'s
//! square/Moore-neighbour contour tracer for the GF bitmap path, which
//! the teacher has no analogue for at all.

use std::collections::HashMap;
use std::io::{self, Read};
use std::path::Path;

use crate::geometry::Point;
use crate::path::GraphicPath;

/// Callback sink an outline font library emits move/line/quad/cubic
/// events into while tracing one glyph (spec.md §4.9).
pub trait OutlineSink {
    fn move_to(&mut self, p: Point);
    fn line_to(&mut self, p: Point);
    fn quad_to(&mut self, control: Point, p: Point);
    fn cubic_to(&mut self, c1: Point, c2: Point, p: Point);
    fn close(&mut self);
}

impl OutlineSink for GraphicPath {
    fn move_to(&mut self, p: Point) {
        GraphicPath::move_to(self, p)
    }
    fn line_to(&mut self, p: Point) {
        GraphicPath::line_to(self, p)
    }
    fn quad_to(&mut self, control: Point, p: Point) {
        GraphicPath::quad_to(self, control, p)
    }
    fn cubic_to(&mut self, c1: Point, c2: Point, p: Point) {
        GraphicPath::cubic_to(self, c1, c2, p)
    }
    fn close(&mut self) {
        GraphicPath::close(self)
    }
}

/// An outline font library, seen only through this interface (spec.md §1:
/// "the actual decoders ... the core sees them only through a uniform
/// font-metrics and outline-tracing interface").
pub trait OutlineFont {
    fn trace_glyph(&self, char_code: u32, sink: &mut dyn OutlineSink) -> bool;
}

/// Decodes an outline font file into a tracer (spec.md §1, §4.8.2); an
/// opaque external collaborator the same way `VfLoader`/`MetafontInvoker`
/// are in `font.rs`.
pub trait FontProgramLoader {
    fn load_outline(
        &self,
        path: &Path,
        format: crate::font::OutlineFormat,
        ttc_index: Option<u32>,
    ) -> Option<std::rc::Rc<dyn OutlineFont>>;
}

/// Decodes one GF-style bitmap glyph, in device pixels, plus the font's
/// units-per-em (spec.md §4.9 "Bitmap font path"); the actual GF reader
/// lives outside the core, same role as `FontProgramLoader` for outlines.
pub trait BitmapFontLoader {
    fn glyph_bitmap(&self, gf_path: &Path, code: u32) -> Option<(Vec<Vec<bool>>, f64)>;
}

/// Adapts a [`BitmapFontLoader`] to the [`OutlineFont`] interface by
/// tracing each glyph's bitmap contour on demand (spec.md §4.9, second
/// paragraph); lets the SVG builder treat bitmap and outline fonts
/// uniformly once resolved.
pub struct BitmapOutlineFont {
    loader: std::rc::Rc<dyn BitmapFontLoader>,
    gf_path: std::path::PathBuf,
}

impl BitmapOutlineFont {
    pub fn new(loader: std::rc::Rc<dyn BitmapFontLoader>, gf_path: std::path::PathBuf) -> Self {
        BitmapOutlineFont { loader, gf_path }
    }
}

impl OutlineFont for BitmapOutlineFont {
    fn trace_glyph(&self, char_code: u32, sink: &mut dyn OutlineSink) -> bool {
        // The loader hands back a bitmap already rasterised onto the
        // glyph's em-fraction grid, so no further raster-to-em scaling
        // is needed here (`units_per_em = design_size = 1.0`).
        let Some((bitmap, _units_per_em)) = self.loader.glyph_bitmap(&self.gf_path, char_code) else {
            return false;
        };
        let path = trace_bitmap_glyph(&bitmap, 1.0, 1.0);
        if path.is_empty() {
            return false;
        }
        for seg in path.segments() {
            match *seg {
                crate::path::Segment::Move(p) => sink.move_to(p),
                crate::path::Segment::Line(p) => sink.line_to(p),
                crate::path::Segment::Quad(c, p) => sink.quad_to(c, p),
                crate::path::Segment::Cubic(c1, c2, p) => sink.cubic_to(c1, c2, p),
                crate::path::Segment::Close => sink.close(),
            }
        }
        true
    }
}

const CACHE_FORMAT_VERSION: u32 = 1;

/// Glyph cache keyed by `(font unique name, char code)`, persisted as one
/// binary file per font (spec.md §3 "Glyph cache entry", §4.9 "Cache").
#[derive(Default)]
pub struct GlyphCache {
    entries: HashMap<(String, u32), GraphicPath>,
}

impl GlyphCache {
    pub fn new() -> Self {
        GlyphCache::default()
    }

    pub fn get(&self, font_name: &str, code: u32) -> Option<&GraphicPath> {
        self.entries.get(&(font_name.to_string(), code))
    }

    pub fn insert(&mut self, font_name: &str, code: u32, path: GraphicPath) {
        self.entries.insert((font_name.to_string(), code), path);
    }

    /// Load a previously-saved cache file for one font. If the embedded
    /// checksum does not match `expected_checksum`, the cache is treated
    /// as empty rather than returning stale outlines (spec.md §4.9).
    pub fn load(path: &Path, font_name: &str, expected_checksum: u32) -> io::Result<GlyphCache> {
        let mut cache = GlyphCache::new();
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(cache),
            Err(e) => return Err(e),
        };
        let mut r = &bytes[..];
        let version = read_u32(&mut r)?;
        let checksum = read_u32(&mut r)?;
        if version != CACHE_FORMAT_VERSION || checksum != expected_checksum {
            return Ok(cache);
        }
        let count = read_u32(&mut r)?;
        for _ in 0..count {
            let code = read_u32(&mut r)?;
            let path = read_path(&mut r)?;
            cache.entries.insert((font_name.to_string(), code), path);
        }
        Ok(cache)
    }

    pub fn save(&self, path: &Path, font_name: &str, checksum: u32) -> io::Result<()> {
        let mut out = Vec::new();
        out.extend_from_slice(&CACHE_FORMAT_VERSION.to_be_bytes());
        out.extend_from_slice(&checksum.to_be_bytes());
        let matching: Vec<_> = self.entries.iter().filter(|((name, _), _)| name == font_name).collect();
        out.extend_from_slice(&(matching.len() as u32).to_be_bytes());
        for ((_, code), path) in matching {
            out.extend_from_slice(&code.to_be_bytes());
            write_path(&mut out, path);
        }
        std::fs::write(path, out)
    }
}

fn read_u32(r: &mut &[u8]) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_f64(r: &mut &[u8]) -> io::Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_be_bytes(buf))
}

fn read_point(r: &mut &[u8]) -> io::Result<Point> {
    Ok(Point::new(read_f64(r)?, read_f64(r)?))
}

fn read_path(r: &mut &[u8]) -> io::Result<GraphicPath> {
    let mut path = GraphicPath::new();
    let count = read_u32(r)?;
    for _ in 0..count {
        let mut tag = [0u8; 1];
        r.read_exact(&mut tag)?;
        match tag[0] {
            0 => path.move_to(read_point(r)?),
            1 => path.line_to(read_point(r)?),
            2 => {
                let c = read_point(r)?;
                path.quad_to(c, read_point(r)?);
            }
            3 => {
                let c1 = read_point(r)?;
                let c2 = read_point(r)?;
                path.cubic_to(c1, c2, read_point(r)?);
            }
            4 => path.close(),
            _ => return Err(io::Error::new(io::ErrorKind::InvalidData, "bad glyph cache segment tag")),
        }
    }
    Ok(path)
}

fn write_path(out: &mut Vec<u8>, path: &GraphicPath) {
    use crate::path::Segment;
    let segments = path.segments();
    out.extend_from_slice(&(segments.len() as u32).to_be_bytes());
    let mut write_point = |out: &mut Vec<u8>, p: Point| {
        out.extend_from_slice(&p.x.to_be_bytes());
        out.extend_from_slice(&p.y.to_be_bytes());
    };
    for seg in segments {
        match *seg {
            Segment::Move(p) => {
                out.push(0);
                write_point(out, p);
            }
            Segment::Line(p) => {
                out.push(1);
                write_point(out, p);
            }
            Segment::Quad(c, p) => {
                out.push(2);
                write_point(out, c);
                write_point(out, p);
            }
            Segment::Cubic(c1, c2, p) => {
                out.push(3);
                write_point(out, c1);
                write_point(out, c2);
                write_point(out, p);
            }
            Segment::Close => out.push(4),
        }
    }
}

/// Traces an outline font's glyph into a `GraphicPath`, consulting and
/// populating `cache` (spec.md §4.9, first paragraph).
pub fn trace_outline_glyph(font: &dyn OutlineFont, font_name: &str, code: u32, cache: &mut GlyphCache) -> GraphicPath {
    if let Some(path) = cache.get(font_name, code) {
        return path.clone();
    }
    let mut path = GraphicPath::new();
    font.trace_glyph(code, &mut path);
    path.close_open_sub_paths();
    cache.insert(font_name, code, path.clone());
    path
}

/// Boustrophedon square-tracing over a GF-style bitmap (spec.md §4.9,
/// second paragraph): walks the boundary between set and unset pixels,
/// in em-units scaled by `units_per_em / design_size`.
pub fn trace_bitmap_glyph(bitmap: &[Vec<bool>], units_per_em: f64, design_size: f64) -> GraphicPath {
    let scale = if design_size == 0.0 { 1.0 } else { units_per_em / design_size };
    let height = bitmap.len();
    let width = if height == 0 { 0 } else { bitmap[0].len() };
    let get = |x: i64, y: i64| -> bool {
        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            false
        } else {
            bitmap[y as usize][x as usize]
        }
    };

    // Every boundary edge of every filled pixel, oriented so that the
    // filled region stays on the edge's right-hand side; consistent
    // orientation lets adjacent edges chain head-to-tail into loops.
    let mut next: HashMap<(i64, i64), (i64, i64)> = HashMap::new();
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            if !get(x, y) {
                continue;
            }
            if !get(x, y - 1) {
                next.insert((x, y), (x + 1, y));
            }
            if !get(x + 1, y) {
                next.insert((x + 1, y), (x + 1, y + 1));
            }
            if !get(x, y + 1) {
                next.insert((x + 1, y + 1), (x, y + 1));
            }
            if !get(x - 1, y) {
                next.insert((x, y + 1), (x, y));
            }
        }
    }

    let mut path = GraphicPath::new();
    let mut visited: std::collections::HashSet<(i64, i64)> = std::collections::HashSet::new();
    let mut starts: Vec<(i64, i64)> = next.keys().copied().collect();
    starts.sort();
    for start in starts {
        if visited.contains(&start) {
            continue;
        }
        let mut current = start;
        path.move_to(Point::new(current.0 as f64 * scale, current.1 as f64 * scale));
        visited.insert(current);
        loop {
            let Some(&n) = next.get(&current) else { break };
            if n == start {
                path.close();
                break;
            }
            path.line_to(Point::new(n.0 as f64 * scale, n.1 as f64 * scale));
            if !visited.insert(n) {
                break;
            }
            current = n;
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SquareFont;
    impl OutlineFont for SquareFont {
        fn trace_glyph(&self, _code: u32, sink: &mut dyn OutlineSink) -> bool {
            sink.move_to(Point::new(0.0, 0.0));
            sink.line_to(Point::new(1.0, 0.0));
            sink.line_to(Point::new(1.0, 1.0));
            sink.line_to(Point::new(0.0, 1.0));
            true
        }
    }

    #[test]
    fn outline_trace_is_cached() {
        let font = SquareFont;
        let mut cache = GlyphCache::new();
        let first = trace_outline_glyph(&font, "cmr10", 65, &mut cache);
        assert!(!first.is_empty());
        assert!(cache.get("cmr10", 65).is_some());
    }

    #[test]
    fn outline_trace_closes_open_subpaths() {
        let font = SquareFont;
        let mut cache = GlyphCache::new();
        let path = trace_outline_glyph(&font, "cmr10", 65, &mut cache);
        assert!(path.segments().last().map(|s| matches!(s, crate::path::Segment::Close)).unwrap_or(false));
    }

    #[test]
    fn bitmap_trace_produces_a_closed_square() {
        let bitmap = vec![vec![true]];
        let path = trace_bitmap_glyph(&bitmap, 1000.0, 10.0);
        assert!(!path.is_empty());
        assert!(path.segments().iter().any(|s| matches!(s, crate::path::Segment::Close)));
    }

    #[test]
    fn cache_round_trips_through_bytes() {
        let mut cache = GlyphCache::new();
        let font = SquareFont;
        let traced = trace_outline_glyph(&font, "cmr10", 65, &mut cache);

        let dir = std::env::temp_dir().join("dvi2svg-glyph-cache-test");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("cmr10.cache");
        cache.save(&file, "cmr10", 0xABCD).unwrap();

        let loaded = GlyphCache::load(&file, "cmr10", 0xABCD).unwrap();
        assert_eq!(loaded.get("cmr10", 65).unwrap().segments().len(), traced.segments().len());

        let stale = GlyphCache::load(&file, "cmr10", 0xDEAD).unwrap();
        assert!(stale.get("cmr10", 65).is_none());

        let _ = std::fs::remove_file(&file);
    }
}
