//! C7 (part): font metrics lookup (spec.md §4.7).
//!
//! Grounded on the teacher's `victor/src/fonts/tables.rs`, which exposes
//! TrueType tables (`hmtx`, `glyf`) behind small accessor methods rather
//! than a trait object; here a trait is warranted because the same
//! lookups must work uniformly across TFM, native sfnt metrics, and a
//! "nothing known" fallback (spec.md §4.8's checksum-mismatch path still
//! needs *some* width to lay text out with).

/// Advance widths, heights and depths in TeX's `design-size` units
/// (design_size = 1.0). A `FontMetrics` answers purely in those units;
/// converting to output units is the caller's job (spec.md §4.2's DVI
/// scale factor).
pub trait FontMetrics {
    fn design_size(&self) -> f64;
    fn first_char(&self) -> u32;
    fn last_char(&self) -> u32;
    fn checksum(&self) -> u32;

    fn char_width(&self, code: u32) -> Option<f64>;
    fn char_height(&self, code: u32) -> Option<f64>;
    fn char_depth(&self, code: u32) -> Option<f64>;
    fn italic_correction(&self, code: u32) -> Option<f64> {
        let _ = code;
        None
    }
}

/// Resolves a TeX font name to its parsed metrics; an opaque external
/// collaborator the same way `FileFinder`/`MetafontInvoker` are (spec.md
/// §1: TFM is a font-container format decoded outside the core).
pub trait MetricsLoader {
    fn load(&self, tex_name: &str) -> Option<std::rc::Rc<dyn FontMetrics>>;
}

/// Fallback used when no metrics source could be found for a font
/// (spec.md §4.8, "missing metrics are a warning, not a fatal error").
/// Every width/height/depth reads as zero so DVI interpretation can
/// continue without advancing the cursor incorrectly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMetrics;

impl FontMetrics for NullMetrics {
    fn design_size(&self) -> f64 {
        1.0
    }
    fn first_char(&self) -> u32 {
        0
    }
    fn last_char(&self) -> u32 {
        0
    }
    fn checksum(&self) -> u32 {
        0
    }
    fn char_width(&self, _code: u32) -> Option<f64> {
        Some(0.0)
    }
    fn char_height(&self, _code: u32) -> Option<f64> {
        Some(0.0)
    }
    fn char_depth(&self, _code: u32) -> Option<f64> {
        Some(0.0)
    }
}

/// Metrics parsed from a TFM file (spec.md §4.7): fixed tables of
/// widths/heights/depths/italic-corrections indexed indirectly through a
/// per-character 4-byte info word, same layout tex implementations share.
#[derive(Debug, Clone)]
pub struct TfmMetrics {
    pub design_size: f64,
    pub first_char: u32,
    pub last_char: u32,
    pub checksum: u32,
    pub widths: Vec<f64>,
    pub heights: Vec<f64>,
    pub depths: Vec<f64>,
    pub italics: Vec<f64>,
    pub char_info: Vec<(u8, u8, u8, u8)>, // (width_idx, height_idx<<4|depth_idx, italic_idx<<2|tag, remainder)
}

impl TfmMetrics {
    fn info(&self, code: u32) -> Option<(u8, u8, u8, u8)> {
        if code < self.first_char || code > self.last_char {
            return None;
        }
        self.char_info.get((code - self.first_char) as usize).copied()
    }
}

impl FontMetrics for TfmMetrics {
    fn design_size(&self) -> f64 {
        self.design_size
    }
    fn first_char(&self) -> u32 {
        self.first_char
    }
    fn last_char(&self) -> u32 {
        self.last_char
    }
    fn checksum(&self) -> u32 {
        self.checksum
    }
    fn char_width(&self, code: u32) -> Option<f64> {
        let (w, ..) = self.info(code)?;
        self.widths.get(w as usize).copied()
    }
    fn char_height(&self, code: u32) -> Option<f64> {
        let (_, hd, ..) = self.info(code)?;
        self.heights.get((hd >> 4) as usize).copied()
    }
    fn char_depth(&self, code: u32) -> Option<f64> {
        let (_, hd, ..) = self.info(code)?;
        self.depths.get((hd & 0x0f) as usize).copied()
    }
    fn italic_correction(&self, code: u32) -> Option<f64> {
        let (_, _, it, _) = self.info(code)?;
        self.italics.get((it >> 2) as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_metrics_are_all_zero() {
        let m = NullMetrics;
        assert_eq!(m.char_width(65), Some(0.0));
        assert_eq!(m.char_height(65), Some(0.0));
        assert_eq!(m.italic_correction(65), None);
    }

    #[test]
    fn tfm_metrics_look_up_by_code() {
        let tfm = TfmMetrics {
            design_size: 10.0,
            first_char: 65,
            last_char: 66,
            checksum: 0x1234,
            widths: vec![0.0, 0.5, 0.6],
            heights: vec![0.0, 0.7],
            depths: vec![0.0, 0.1],
            italics: vec![0.0],
            char_info: vec![(1, 0x10, 0, 0), (2, 0x01, 0, 0)],
        };
        assert_eq!(tfm.char_width(65), Some(0.5));
        assert_eq!(tfm.char_height(65), Some(0.7));
        assert_eq!(tfm.char_depth(66), Some(0.1));
        assert_eq!(tfm.char_width(67), None);
    }
}
