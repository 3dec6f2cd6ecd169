//! C16: a thin smoke-test binary (spec.md §1 scopes the real command-line
//! driver and option parser out of this core; see `SPEC_FULL.md` §A).
//!
//! Takes the input path and an optional output path positionally, wires
//! a filesystem-backed `FileFinder` to the driver (C15), and writes the
//! result with default conversion options. Real TFM/VF/outline decoding
//! stays behind the opaque collaborator traits (spec.md §1) — this
//! binary supplies the one collaborator that *is* in scope (finding
//! files by name) and leaves the rest as no-ops.

extern crate dvi2svg;
extern crate env_logger;
extern crate log;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use dvi2svg::driver::Driver;
use dvi2svg::error::ConversionStatus;
use dvi2svg::font::{FileFinder, OutlineFormat, VfLoader, VirtualFontProgram};
use dvi2svg::glyph_tracer::{FontProgramLoader, OutlineFont};
use dvi2svg::metrics::{FontMetrics, MetricsLoader};
use dvi2svg::svg_builder::{BuilderConfig, GlyphMode};
use dvi2svg::Options;

/// Looks for `{basename}.{extension}` next to the input file; the real
/// search-path logic (kpathsea or similar) lives outside this core
/// (spec.md §1, §6).
struct DirFileFinder {
    dir: PathBuf,
}

impl FileFinder for DirFileFinder {
    fn find(&self, basename: &str, extension: &str) -> Option<PathBuf> {
        let candidate = self.dir.join(format!("{}.{}", basename, extension));
        candidate.is_file().then_some(candidate)
    }
}

/// No decoder is wired in by default; every font degrades to a missing
/// metrics/outline pair and `SvgBuilder::define_font` falls back to a
/// metrics-only rendering (spec.md §4.8).
struct NoMetrics;
impl MetricsLoader for NoMetrics {
    fn load(&self, _tex_name: &str) -> Option<Rc<dyn FontMetrics>> {
        None
    }
}
struct NoOutlines;
impl FontProgramLoader for NoOutlines {
    fn load_outline(&self, _path: &Path, _format: OutlineFormat, _ttc_index: Option<u32>) -> Option<Rc<dyn OutlineFont>> {
        None
    }
}
struct NoVf;
impl VfLoader for NoVf {
    fn load(&self, _path: &Path) -> Option<Rc<dyn VirtualFontProgram>> {
        None
    }
}

fn main() {
    env_logger::init();

    let mut args = env::args_os().skip(1);
    let input_path = match args.next() {
        Some(arg) => PathBuf::from(arg),
        None => {
            eprintln!("usage: dvi2svg INPUT.dvi [OUTPUT.svg]");
            process::exit(2);
        }
    };
    let output_path = args.next().map(PathBuf::from).unwrap_or_else(|| input_path.with_extension("svg"));

    let bytes = match fs::read(&input_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: could not read {}: {}", input_path.display(), e);
            process::exit(1);
        }
    };

    let dir = input_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let builder = BuilderConfig {
        finder: Rc::new(DirFileFinder { dir }),
        metafont: None,
        vf_loader: Rc::new(NoVf),
        metrics_loader: Rc::new(NoMetrics),
        font_programs: Rc::new(NoOutlines),
        may_run_metafont: false,
        exact_bboxes: false,
        glyph_mode: GlyphMode::Path,
    };
    let options = Options::new(builder);

    let driver = Driver::new(bytes, options);
    let (document, status) = driver.convert(None);

    match &status {
        ConversionStatus::Ok => {}
        ConversionStatus::Cancelled => log::warn!("conversion cancelled"),
        ConversionStatus::Failed(fatal) => {
            eprintln!("error: {}", fatal);
            process::exit(1);
        }
    }

    let mut out = match fs::File::create(&output_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: could not create {}: {}", output_path.display(), e);
            process::exit(1);
        }
    };
    if let Err(e) = document.serialize(&mut out) {
        eprintln!("error: could not write {}: {}", output_path.display(), e);
        process::exit(1);
    }
}
