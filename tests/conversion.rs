//! End-to-end conversion tests built on procedurally-assembled in-memory
//! DVI byte streams (no external `.dvi` fixtures are used; see
//! `SPEC_FULL.md` §E).

use std::rc::Rc;

use dvi2svg::driver::Driver;
use dvi2svg::dvi::opcodes::*;
use dvi2svg::error::ConversionStatus;
use dvi2svg::font::{FileFinder, OutlineFormat, VfLoader, VirtualFontProgram};
use dvi2svg::glyph_tracer::{FontProgramLoader, OutlineFont};
use dvi2svg::metrics::NullMetrics;
use dvi2svg::svg_builder::{BuilderConfig, GlyphMode};
use dvi2svg::{Options, ViewBoxPolicy};
use std::path::Path;

struct NoFiles;
impl FileFinder for NoFiles {
    fn find(&self, _basename: &str, _extension: &str) -> Option<std::path::PathBuf> {
        None
    }
}
struct NoVf;
impl VfLoader for NoVf {
    fn load(&self, _path: &Path) -> Option<Rc<dyn VirtualFontProgram>> {
        None
    }
}
struct NoOutlines;
impl FontProgramLoader for NoOutlines {
    fn load_outline(&self, _path: &Path, _format: OutlineFormat, _ttc_index: Option<u32>) -> Option<Rc<dyn OutlineFont>> {
        None
    }
}

fn default_options() -> Options {
    Options::new(BuilderConfig {
        finder: Rc::new(NoFiles),
        metafont: None,
        vf_loader: Rc::new(NoVf),
        metrics_loader: Rc::new(NullMetrics),
        font_programs: Rc::new(NoOutlines),
        may_run_metafont: false,
        exact_bboxes: false,
        glyph_mode: GlyphMode::Path,
    })
}

fn push_preamble(out: &mut Vec<u8>) {
    out.push(PRE);
    out.push(2);
    out.extend_from_slice(&25_400_000u32.to_be_bytes());
    out.extend_from_slice(&7_227_000u32.to_be_bytes());
    out.extend_from_slice(&1000u32.to_be_bytes());
    out.push(0);
}

fn push_bop(out: &mut Vec<u8>, prev_bop: i64) {
    out.push(BOP);
    for _ in 0..10 {
        out.extend_from_slice(&0i32.to_be_bytes());
    }
    out.extend_from_slice(&(prev_bop as i32).to_be_bytes());
}

fn push_postamble(out: &mut Vec<u8>, prev_bop: u32, total_pages: u16) {
    out.push(POST);
    out.extend_from_slice(&prev_bop.to_be_bytes());
    out.extend_from_slice(&25_400_000u32.to_be_bytes());
    out.extend_from_slice(&7_227_000u32.to_be_bytes());
    out.extend_from_slice(&1000u32.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&100u16.to_be_bytes());
    out.extend_from_slice(&total_pages.to_be_bytes());
}

fn push_post_post(out: &mut Vec<u8>, post_ptr: u32) {
    out.push(POST_POST);
    out.extend_from_slice(&post_ptr.to_be_bytes());
    out.push(2);
    for _ in 0..4 {
        out.push(0xDF);
    }
}

fn push_fnt_def(out: &mut Vec<u8>, fontnum: u8, name: &str) {
    out.push(FNT_DEF1);
    out.push(fontnum);
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&655_360u32.to_be_bytes());
    out.extend_from_slice(&655_360u32.to_be_bytes());
    out.push(0);
    out.push(name.len() as u8);
    out.extend_from_slice(name.as_bytes());
}

fn push_xxx(out: &mut Vec<u8>, payload: &str) {
    out.push(XXX1);
    out.push(payload.len() as u8);
    out.extend_from_slice(payload.as_bytes());
}

/// Two pages, each drawing a rule in a different pushed color, the
/// second page also carrying a `papersize` special.
fn two_page_document() -> Vec<u8> {
    let mut out = Vec::new();
    push_preamble(&mut out);

    let bop1 = out.len() as u32;
    push_bop(&mut out, -1);
    push_fnt_def(&mut out, 0, "cmr10");
    out.push(FNT_NUM_0);
    push_xxx(&mut out, "color push rgb 1 0 0");
    out.push(SET_RULE);
    out.extend_from_slice(&10i32.to_be_bytes());
    out.extend_from_slice(&20i32.to_be_bytes());
    push_xxx(&mut out, "color pop");
    out.push(EOP);

    let bop2 = out.len() as u32;
    push_bop(&mut out, bop1 as i64);
    out.push(FNT_NUM_0);
    push_xxx(&mut out, "papersize=595pt,842pt");
    push_xxx(&mut out, "totally:unrecognised special payload");
    out.push(SET_RULE);
    out.extend_from_slice(&5i32.to_be_bytes());
    out.extend_from_slice(&5i32.to_be_bytes());
    out.push(EOP);

    let post_offset = out.len() as u32;
    push_postamble(&mut out, bop2, 2);
    push_post_post(&mut out, post_offset);
    out
}

#[test]
fn converts_every_page_into_its_own_group() {
    let driver = Driver::new(two_page_document(), default_options());
    let (doc, status) = driver.convert(None);
    assert!(matches!(status, ConversionStatus::Ok));
    let pages = doc.root.children();
    assert_eq!(pages.len(), 2);
}

#[test]
fn page_range_selects_a_single_page() {
    let mut options = default_options();
    options.page_range = Some((2, 2));
    let driver = Driver::new(two_page_document(), options);
    let (doc, status) = driver.convert(None);
    assert!(matches!(status, ConversionStatus::Ok));
    assert_eq!(doc.root.children().len(), 1);
}

#[test]
fn named_paper_size_from_a_papersize_special_wins_over_min_viewbox() {
    let mut options = default_options();
    options.viewbox_policy = ViewBoxPolicy::Dvi;
    let driver = Driver::new(two_page_document(), options);
    let (doc, status) = driver.convert(None);
    assert!(matches!(status, ConversionStatus::Ok));
    // ViewBoxPolicy::Dvi prefers the dvi-declared box (here, the
    // papersize special's box from the second page) over the tight
    // content bounding box.
    assert!(doc.root.attr("viewBox").is_some());
}

#[test]
fn unrecognised_special_does_not_abort_conversion() {
    // `two_page_document` already embeds an unmatched `xxx` payload on
    // page 2; conversion must still complete successfully.
    let driver = Driver::new(two_page_document(), default_options());
    let (_, status) = driver.convert(None);
    assert!(matches!(status, ConversionStatus::Ok));
}

#[test]
fn truncated_stream_after_preamble_fails_cleanly() {
    let mut out = Vec::new();
    push_preamble(&mut out);
    out.truncate(out.len() - 1);
    let driver = Driver::new(out, default_options());
    let (_, status) = driver.convert(None);
    assert!(matches!(status, ConversionStatus::Failed(_)));
}
