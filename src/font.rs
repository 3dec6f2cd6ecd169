//! C8: font resolver (spec.md §4.8).
//!
//! The teacher has no analogue for "resolve a logical name through an
//! external search path to a concrete file" — `victor`'s `fonts2` module
//! is handed paths directly by its caller — so this is grounded on the
//! shape of `victor/src/fonts/mod.rs`'s `FontHandle`-like union (one
//! variant per concrete font kind) generalised to the variants spec.md
//! §3 "Font table" names, plus the resolution algorithm from
//! `original_source/src/FontManager.cpp`/`PhysicalFont.cpp` read for
//! the suffix-search order and the checksum-mismatch-is-a-warning rule.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::warn;

use crate::fontmap::FontMap;

/// A decoded virtual font, seen only through this interface (spec.md §1:
/// VF is a font-container format like TFM/GF/PFB, decoded externally).
/// `char_program` returns the nested DVI byte sequence for one character
/// code (spec.md §3 "Virtual font character").
pub trait VirtualFontProgram {
    fn char_program(&self, code: u32) -> Option<Vec<u8>>;
    /// The scale factor nested commands are interpreted under, replacing
    /// the document's own preamble scale while this VF runs (spec.md
    /// §4.11 "Character dispatch").
    fn scale_pt_per_dvi_unit(&self) -> f64;
}

/// Decodes a `.vf` file at `path` into a `VirtualFontProgram` (spec.md §1,
/// §4.8: an opaque external collaborator, the same role `MetafontInvoker`
/// plays for Metafont).
pub trait VfLoader {
    fn load(&self, path: &Path) -> Option<Rc<dyn VirtualFontProgram>>;
}

/// Returns a filesystem path for `(basename, extension)`; the concrete
/// search-path logic (kpathsea or similar) lives outside the core
/// (spec.md §1, §6).
pub trait FileFinder {
    fn find(&self, basename: &str, extension: &str) -> Option<PathBuf>;
}

/// Invokes Metafont to turn a `.mf` source into a `.gf` bitmap font at a
/// given resolution; an opaque external collaborator (spec.md §4.8.3).
pub trait MetafontInvoker {
    fn generate(&self, font_name: &str, dpi: u32) -> Option<PathBuf>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineFormat {
    Type1,
    TrueType,
    OpenType,
    TrueTypeCollection,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FontStyle {
    pub bold: bool,
    pub slant: Option<f64>,
    pub extend: Option<f64>,
}

/// One of the four handle shapes named in spec.md §3 "Font table".
#[derive(Clone)]
pub enum FontVariant {
    Bitmap { gf_path: PathBuf },
    Outline { format: OutlineFormat, path: PathBuf, ttc_index: Option<u32> },
    Virtual(Rc<dyn VirtualFontProgram>),
    Native { descriptor: String },
}

impl std::fmt::Debug for FontVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FontVariant::Bitmap { gf_path } => f.debug_struct("Bitmap").field("gf_path", gf_path).finish(),
            FontVariant::Outline { format, path, ttc_index } => {
                f.debug_struct("Outline").field("format", format).field("path", path).field("ttc_index", ttc_index).finish()
            }
            FontVariant::Virtual(_) => f.write_str("Virtual(..)"),
            FontVariant::Native { descriptor } => f.debug_struct("Native").field("descriptor", descriptor).finish(),
        }
    }
}

/// The unique underlying font object: identity is by `name` (spec.md §3,
/// "two handles whose name matches share a unique underlying font
/// object"). `scaled_size` lives on the registration (C10), not here —
/// this struct is what every same-named registration shares.
#[derive(Debug, Clone)]
pub struct FontHandle {
    pub name: String,
    pub checksum: u32,
    pub design_size: f64,
    pub style: FontStyle,
    pub variant: FontVariant,
}

const OUTLINE_SUFFIXES: &[(&str, OutlineFormat)] = &[
    ("pfb", OutlineFormat::Type1),
    ("otf", OutlineFormat::OpenType),
    ("ttf", OutlineFormat::TrueType),
    ("ttc", OutlineFormat::TrueTypeCollection),
];

#[derive(Debug)]
pub enum ResolveError {
    FontNotFound,
}

/// Resolve `tex_name` at `scaled_size` pt (design size `design_size` pt,
/// metrics checksum `metrics_checksum`) to a `FontHandle` (spec.md §4.8).
pub fn resolve(
    tex_name: &str,
    design_size: f64,
    metrics_checksum: u32,
    font_map: &mut FontMap,
    finder: &dyn FileFinder,
    metafont: Option<&dyn MetafontInvoker>,
    vf_loader: Option<&dyn VfLoader>,
    may_run_metafont: bool,
) -> Result<FontHandle, ResolveError> {
    font_map.mark_used(tex_name);
    let lookup_name = font_map
        .get(tex_name)
        .and_then(|entry| entry.font_file.clone())
        .unwrap_or_else(|| tex_name.to_string());
    let style = font_map
        .get(tex_name)
        .map(|entry| FontStyle { bold: entry.bold, slant: entry.slant, extend: entry.extend })
        .unwrap_or_default();

    for (suffix, format) in OUTLINE_SUFFIXES {
        if let Some(path) = finder.find(&lookup_name, suffix) {
            let ttc_index = font_map.get(tex_name).and_then(|e| e.ttc_index);
            return Ok(FontHandle {
                name: tex_name.to_string(),
                checksum: metrics_checksum,
                design_size,
                style,
                variant: FontVariant::Outline { format: *format, path, ttc_index },
            });
        }
    }
    if let Some(vf_path) = finder.find(&lookup_name, "vf") {
        let program = vf_loader.and_then(|loader| loader.load(&vf_path)).ok_or(ResolveError::FontNotFound)?;
        return Ok(FontHandle {
            name: tex_name.to_string(),
            checksum: metrics_checksum,
            design_size,
            style,
            variant: FontVariant::Virtual(program),
        });
    }
    if finder.find(&lookup_name, "mf").is_some() {
        if !may_run_metafont {
            return Err(ResolveError::FontNotFound);
        }
        let dpi = (scaled_size_to_dpi(design_size)).round() as u32;
        let gf_path = metafont.and_then(|mf| mf.generate(&lookup_name, dpi));
        return match gf_path {
            Some(gf_path) => Ok(FontHandle {
                name: tex_name.to_string(),
                checksum: metrics_checksum,
                design_size,
                style,
                variant: FontVariant::Bitmap { gf_path },
            }),
            None => Err(ResolveError::FontNotFound),
        };
    }
    Err(ResolveError::FontNotFound)
}

fn scaled_size_to_dpi(design_size: f64) -> f64 {
    // Metafont's conventional base resolution for a 10pt design size.
    (design_size / 10.0) * 300.0
}

/// Compares the metrics checksum against the one embedded in the font
/// file itself; mismatches are a warning, never fatal (spec.md §4.8.4).
pub fn check_checksum(tex_name: &str, metrics_checksum: u32, file_checksum: u32) {
    if metrics_checksum != 0 && file_checksum != 0 && metrics_checksum != file_checksum {
        warn!(
            "checksum mismatch for font {}: metrics say {:#x}, file says {:#x}",
            tex_name, metrics_checksum, file_checksum
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fontmap::{ApplyMode, FontMapEntry};

    struct FakeFinder {
        available: Vec<(&'static str, &'static str)>,
    }

    impl FileFinder for FakeFinder {
        fn find(&self, basename: &str, extension: &str) -> Option<PathBuf> {
            self.available
                .iter()
                .find(|(b, e)| *b == basename && *e == extension)
                .map(|(b, e)| PathBuf::from(format!("{}.{}", b, e)))
        }
    }

    #[test]
    fn resolves_outline_font_by_suffix_order() {
        let mut map = FontMap::new();
        let finder = FakeFinder { available: vec![("cmr10", "ttf"), ("cmr10", "pfb")] };
        let handle = resolve("cmr10", 10.0, 0x1234, &mut map, &finder, None, None, false).unwrap();
        match handle.variant {
            FontVariant::Outline { format, .. } => assert_eq!(format, OutlineFormat::Type1),
            _ => panic!("expected outline"),
        }
    }

    #[test]
    fn uses_font_map_replacement_name() {
        let mut map = FontMap::new();
        map.apply(
            FontMapEntry { tex_name: "cmr10".into(), font_file: Some("ptmr8r".into()), ..Default::default() },
            ApplyMode::Append,
        );
        let finder = FakeFinder { available: vec![("ptmr8r", "pfb")] };
        let handle = resolve("cmr10", 10.0, 0, &mut map, &finder, None, None, false).unwrap();
        assert!(matches!(handle.variant, FontVariant::Outline { .. }));
    }

    #[test]
    fn missing_everything_fails_not_found() {
        let mut map = FontMap::new();
        let finder = FakeFinder { available: vec![] };
        assert!(matches!(
            resolve("nope", 10.0, 0, &mut map, &finder, None, None, false),
            Err(ResolveError::FontNotFound)
        ));
    }
}
