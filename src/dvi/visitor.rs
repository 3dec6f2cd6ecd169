//! The interface the interpreter drives on every page-level event
//! (spec.md §4.11, §4.14). Implemented by the SVG builder (C14); the
//! interpreter itself holds only cursor/stack/font-number state and
//! knows nothing about SVG.

use crate::error::Result;
use crate::geometry::Point;

use super::WritingMode;

/// Per-`bop` page counters (`\count0..9`).
pub type PageCounters = [i32; 10];

pub trait DviVisitor {
    fn begin_page(&mut self, page_number: u32, counters: PageCounters);
    fn end_page(&mut self, page_number: u32);

    /// A `fnt_def`: register the font and return nothing — resolution
    /// failures are logged by the implementation and degrade to
    /// `NullMetrics`/an empty outline, never abort (spec.md §7).
    fn define_font(&mut self, fontnum: u32, checksum: u32, scaled_size_pt: f64, design_size_pt: f64, name: &str);

    fn set_font(&mut self, fontnum: u32) -> Result<()>;

    /// Returns `true` if `fontnum` names a virtual font, in which case
    /// the interpreter fetches the nested byte sequence via
    /// `virtual_font_body` instead of calling `set_char` directly
    /// (spec.md §4.11 "Character dispatch").
    fn is_virtual_font(&self, fontnum: u32) -> bool;
    fn virtual_font_body(&self, fontnum: u32, code: u32) -> Option<Vec<u8>>;
    fn virtual_font_scale_pt(&self, fontnum: u32) -> f64;

    /// Draw glyph `code` at `pos` (already `(h + ?, v + ?)` per the
    /// cursor, spec.md §8 universal property). Returns the advance
    /// width in pt so the interpreter can move the cursor, or `None`
    /// if no metric is available (treated as zero advance).
    fn set_char(&mut self, pos: Point, code: u32, vertical: bool, fontnum: u32) -> Option<f64>;

    fn set_rule(&mut self, pos: Point, height: f64, width: f64);

    /// Fired whenever a horizontal/vertical displacement opcode runs
    /// outside of ordinary character advance, so the builder can open a
    /// new `tspan` (spec.md §4.14 `moveToX`/`moveToY`).
    fn move_to_x(&mut self);
    fn move_to_y(&mut self);

    fn special(&mut self, payload: &[u8]);

    fn writing_mode_changed(&mut self, _mode: WritingMode) {}

    /// Brackets a virtual font's nested execution (spec.md §4.10): the
    /// font manager pushes/pops a fresh local font-number table here.
    /// No-op for implementations that don't track font-number scope.
    fn enter_vf(&mut self) {}
    fn leave_vf(&mut self) {}
}
