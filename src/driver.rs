//! C15: the conversion driver (spec.md §4.15 / §6 "Running a conversion").
//!
//! Ties the interpreter (C11) and the SVG builder (C14) together: scans
//! the document once, executes the requested page range, assembles the
//! standard special-handler registry (C12/C13), and derives the root
//! `<svg>` element's `viewBox`/`width`/`height` from the chosen
//! [`ViewBoxPolicy`]. Grounded on `original_source/src/DVIToSVG.cpp`'s
//! top-level `convert()` entry point for the scan-then-iterate shape,
//! expressed here as a single `Driver` owning both collaborators rather
//! than a free function, since most of its state (the interpreter, the
//! builder, the page range) is reused across every page.

use std::sync::atomic::AtomicBool;

use crate::dvi::interpreter::{Interpreter, PageOutcome};
use crate::error::ConversionStatus;
use crate::geometry::{BoundingBox, Point};
use crate::special::{
    BackgroundColorHandler, ColorSpecialHandler, EmTexHandler, HyperlinkHandler, PapersizeHandler,
    PostScriptHandler, RawSvgHandler, SpecialDispatcher, TpicHandler,
};
use crate::svg_builder::SvgBuilder;
use crate::xml::{Document, Element, Node};
use crate::{Options, ViewBoxPolicy};

/// Common paper sizes in TeX points (spec.md §4.15 `ViewBoxPolicy::Named`),
/// width then height, portrait orientation. Millimetre figures match the
/// ISO 216 / US paper-size standards; converted with the same `mm` factor
/// `geometry::parse_matrix_script` uses.
const MM_PER_PT: f64 = 25.4 / 72.27;
fn named_paper_size(name: &str) -> Option<(f64, f64)> {
    let mm = |w: f64, h: f64| Some((w / MM_PER_PT, h / MM_PER_PT));
    match name.to_ascii_lowercase().as_str() {
        "a4" => mm(210.0, 297.0),
        "a3" => mm(297.0, 420.0),
        "a5" => mm(148.0, 210.0),
        "letter" => Some((612.0 * 72.27 / 72.0, 792.0 * 72.27 / 72.0)),
        "legal" => Some((612.0 * 72.27 / 72.0, 1008.0 * 72.27 / 72.0)),
        _ => None,
    }
}

fn build_dispatcher(options: &Options) -> SpecialDispatcher {
    let mut dispatcher = SpecialDispatcher::new();
    dispatcher.register(Box::new(ColorSpecialHandler::new()));
    dispatcher.register(Box::new(BackgroundColorHandler::new()));
    dispatcher.register(Box::new(PapersizeHandler::new()));
    dispatcher.register(Box::new(HyperlinkHandler::new(options.hyperlink_overlay)));
    dispatcher.register(Box::new(EmTexHandler::new()));
    dispatcher.register(Box::new(RawSvgHandler::new()));
    dispatcher.register(Box::new(TpicHandler::new()));
    dispatcher
}

/// Runs one conversion end to end and returns the assembled document
/// (spec.md §7 "End-to-end outcome"). Always returns a usable document,
/// even a degraded one (missing fonts, unrecognised specials); only a
/// malformed DVI stream itself (bad preamble, broken `bop` chain, ...)
/// turns `status` into `ConversionStatus::Failed`.
pub struct Driver {
    interpreter: Interpreter,
    builder: SvgBuilder,
    page_range: Option<(u32, u32)>,
    viewbox_policy: ViewBoxPolicy,
}

impl Driver {
    pub fn new(bytes: impl Into<std::rc::Rc<[u8]>>, mut options: Options) -> Self {
        let mut dispatcher = build_dispatcher(&options);
        match options.postscript.take() {
            Some(collaborator) => dispatcher.register(Box::new(PostScriptHandler::new(collaborator))),
            None => dispatcher.register(Box::new(PostScriptHandler::new(
                crate::special::NullPostScriptCollaborator,
            ))),
        };
        let page_range = options.page_range;
        let viewbox_policy = options.viewbox_policy.clone();
        let builder = SvgBuilder::new(options.builder_config_taken(), dispatcher);
        Driver { interpreter: Interpreter::new(bytes), builder, page_range, viewbox_policy }
    }

    pub fn builder_mut(&mut self) -> &mut SvgBuilder {
        &mut self.builder
    }

    /// Scans the preamble/postamble/page index, then executes every page
    /// in the configured page range (clamped to what the document
    /// actually has; an empty or out-of-order range converts zero pages,
    /// not an error, per spec.md §4.15's degrade-don't-abort philosophy),
    /// assembling the final `<svg>` document.
    pub fn convert(mut self, cancel: Option<&AtomicBool>) -> (Document, ConversionStatus) {
        if let Err(fatal) = self.interpreter.scan(&mut self.builder) {
            return (empty_document(), ConversionStatus::Failed(fatal));
        }

        let total = self.interpreter.total_pages();
        let (first, last) = self.page_range.unwrap_or((1, total as u32));
        let first = first.max(1);
        let last = last.min(total as u32);

        let mut pages = Vec::new();
        let mut overall_box = BoundingBox::new();
        let mut named_box = None;
        let mut status = ConversionStatus::Ok;

        if first <= last {
            for page_number in first..=last {
                let index = (page_number - 1) as usize;
                match self.interpreter.execute_page(index, &mut self.builder, cancel) {
                    Ok(PageOutcome::Completed) => {
                        let finished = self.builder.finish_page();
                        overall_box.embed(&finished.page_box);
                        if let Some(b) = finished.named_boxes.get("__papersize__") {
                            named_box = Some(*b);
                        }
                        pages.push(finished.group);
                    }
                    Ok(PageOutcome::Cancelled) => {
                        status = ConversionStatus::Cancelled;
                        break;
                    }
                    Err(fatal) => {
                        return (empty_document(), ConversionStatus::Failed(fatal));
                    }
                }
            }
        }

        let defs = self.builder.take_defs();
        let document = assemble_document(defs, pages, overall_box, named_box, &self.viewbox_policy);
        (document, status)
    }
}

/// `original_source/src/SVGTree.cpp`'s `XMLDocTypeNode("svg", "PUBLIC", ...)`.
const SVG_DOCTYPE: &str =
    "<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">";

fn empty_document() -> Document {
    let mut doc = Document::new(Element::new("svg"));
    doc.doctype = Some(SVG_DOCTYPE.to_string());
    doc
}

/// Builds the root `<svg>` element: a `<defs>` holding every traced glyph
/// once, followed by one `<g id="pageN">` per converted page, sized
/// according to `policy` (spec.md §4.15 / §6).
fn assemble_document(
    defs: Vec<Node>,
    pages: Vec<Element>,
    content_box: BoundingBox,
    dvi_box: Option<BoundingBox>,
    policy: &ViewBoxPolicy,
) -> Document {
    let mut root = Element::new("svg");
    root.set_attr("version", "1.1");
    root.set_attr("xmlns", "http://www.w3.org/2000/svg");
    root.set_attr("xmlns:xlink", "http://www.w3.org/1999/xlink");

    if !defs.is_empty() {
        let mut defs_el = Element::new("defs");
        for node in defs {
            defs_el.append_child(node);
        }
        root.append_child(Node::Element(defs_el));
    }
    for page in pages {
        root.append_child(Node::Element(page));
    }

    match policy {
        ViewBoxPolicy::None => {
            if let Some(dvi_box) = dvi_box {
                set_dimensions(&mut root, dvi_box.min(), dvi_box.max());
            }
        }
        ViewBoxPolicy::Dvi => {
            let box_ = dvi_box.unwrap_or(content_box);
            set_viewbox(&mut root, box_.min(), box_.max());
        }
        ViewBoxPolicy::Min => {
            set_viewbox(&mut root, content_box.min(), content_box.max());
        }
        ViewBoxPolicy::Margin(margin) => {
            let mut box_ = content_box;
            box_.embed_point(Point::new(box_.min().x - margin, box_.min().y - margin));
            box_.embed_point(Point::new(box_.max().x + margin, box_.max().y + margin));
            set_viewbox(&mut root, box_.min(), box_.max());
        }
        ViewBoxPolicy::Named(name) => {
            if let Some((w, h)) = named_paper_size(name) {
                let min = Point::new(0.0, 0.0);
                let max = Point::new(w, h);
                set_viewbox(&mut root, min, max);
            } else {
                set_viewbox(&mut root, content_box.min(), content_box.max());
            }
        }
    }

    let mut document = Document::new(root);
    document.doctype = Some(SVG_DOCTYPE.to_string());
    document
}

fn set_viewbox(root: &mut Element, min: Point, max: Point) {
    use crate::geometry::BP_PER_PT;
    let min = Point::new(min.x * BP_PER_PT, min.y * BP_PER_PT);
    let max = Point::new(max.x * BP_PER_PT, max.y * BP_PER_PT);
    let width = (max.x - min.x).max(0.0);
    let height = (max.y - min.y).max(0.0);
    root.set_attr("width", trimmed(width));
    root.set_attr("height", trimmed(height));
    root.set_attr(
        "viewBox",
        format!("{} {} {} {}", trimmed(min.x), trimmed(min.y), trimmed(width), trimmed(height)),
    );
}

fn set_dimensions(root: &mut Element, min: Point, max: Point) {
    use crate::geometry::BP_PER_PT;
    let width = (max.x - min.x).max(0.0) * BP_PER_PT;
    let height = (max.y - min.y).max(0.0) * BP_PER_PT;
    root.set_attr("width", trimmed(width));
    root.set_attr("height", trimmed(height));
}

fn trimmed(x: f64) -> String {
    let mut buf = Vec::new();
    dtoa::write(&mut buf, x).unwrap();
    String::from_utf8(buf).unwrap()
}

// Helper on `Options`, defined here rather than in `lib.rs` so `Driver`
// is the only thing that needs to reach into `Options.builder` by value
// (it is consumed once, at `Driver::new`).
impl crate::Options {
    fn builder_config_taken(&mut self) -> crate::svg_builder::BuilderConfig {
        std::mem::replace(
            &mut self.builder,
            crate::svg_builder::BuilderConfig {
                finder: std::rc::Rc::new(NoFiles),
                metafont: None,
                vf_loader: std::rc::Rc::new(NoVf),
                metrics_loader: std::rc::Rc::new(crate::metrics::NullMetrics),
                font_programs: std::rc::Rc::new(NoOutlines),
                may_run_metafont: false,
                exact_bboxes: false,
                glyph_mode: crate::svg_builder::GlyphMode::Path,
            },
        )
    }
}

struct NoFiles;
impl crate::font::FileFinder for NoFiles {
    fn find(&self, _basename: &str, _extension: &str) -> Option<std::path::PathBuf> {
        None
    }
}
struct NoVf;
impl crate::font::VfLoader for NoVf {
    fn load(&self, _path: &std::path::Path) -> Option<std::rc::Rc<dyn crate::font::VirtualFontProgram>> {
        None
    }
}
struct NoOutlines;
impl crate::glyph_tracer::FontProgramLoader for NoOutlines {
    fn load_outline(
        &self,
        _path: &std::path::Path,
        _format: crate::font::OutlineFormat,
        _ttc_index: Option<u32>,
    ) -> Option<std::rc::Rc<dyn crate::glyph_tracer::OutlineFont>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dvi::opcodes::*;

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

    fn push_fnt_def(out: &mut Vec<u8>) {
        out.push(FNT_DEF1);
        out.push(0); // fontnum 0
        out.extend_from_slice(&0u32.to_be_bytes()); // checksum
        out.extend_from_slice(&655_360u32.to_be_bytes()); // scaled_size
        out.extend_from_slice(&655_360u32.to_be_bytes()); // design_size
        out.push(0); // path_len
        out.push(5); // name_len
        out.extend_from_slice(b"cmr10");
    }

    fn one_rule_document() -> Vec<u8> {
        let mut out = Vec::new();
        push_preamble(&mut out);
        let bop_offset = out.len() as u32;
        push_bop(&mut out, -1);
        push_fnt_def(&mut out);
        out.push(FNT_NUM_0);
        out.push(SET_RULE);
        out.extend_from_slice(&10i32.to_be_bytes());
        out.extend_from_slice(&20i32.to_be_bytes());
        out.push(EOP);
        let post_offset = out.len() as u32;
        push_postamble(&mut out, bop_offset, 1);
        push_post_post(&mut out, post_offset);
        out
    }

    fn default_options() -> Options {
        Options::new(crate::svg_builder::BuilderConfig {
            finder: std::rc::Rc::new(NoFiles),
            metafont: None,
            vf_loader: std::rc::Rc::new(NoVf),
            metrics_loader: std::rc::Rc::new(crate::metrics::NullMetrics),
            font_programs: std::rc::Rc::new(NoOutlines),
            may_run_metafont: false,
            exact_bboxes: false,
            glyph_mode: crate::svg_builder::GlyphMode::Path,
        })
    }

    #[test]
    fn converts_single_page_and_assembles_svg() {
        let bytes = one_rule_document();
        let driver = Driver::new(bytes, default_options());
        let (doc, status) = driver.convert(None);
        assert!(matches!(status, ConversionStatus::Ok));
        assert_eq!(doc.root.name, "svg");
        assert_eq!(doc.root.children().len(), 1);
        assert!(doc.root.attr("viewBox").is_some());
    }

    #[test]
    fn out_of_range_page_range_converts_nothing() {
        let bytes = one_rule_document();
        let mut options = default_options();
        options.page_range = Some((5, 2));
        let driver = Driver::new(bytes, options);
        let (doc, status) = driver.convert(None);
        assert!(matches!(status, ConversionStatus::Ok));
        assert!(doc.root.children().is_empty());
    }

    #[test]
    fn malformed_preamble_fails_conversion() {
        let driver = Driver::new(vec![0u8; 4], default_options());
        let (_, status) = driver.convert(None);
        assert!(matches!(status, ConversionStatus::Failed(_)));
    }

    #[test]
    fn named_paper_size_sets_fixed_dimensions() {
        let bytes = one_rule_document();
        let mut options = default_options();
        options.viewbox_policy = ViewBoxPolicy::Named("a4".to_string());
        let driver = Driver::new(bytes, options);
        let (doc, _) = driver.convert(None);
        let (w, h) = named_paper_size("a4").unwrap();
        assert_eq!(doc.root.attr("width"), Some(trimmed(w * crate::geometry::BP_PER_PT)).as_deref());
        assert_eq!(doc.root.attr("height"), Some(trimmed(h * crate::geometry::BP_PER_PT)).as_deref());
    }

    #[test]
    fn unknown_named_paper_size_falls_back_to_content_box() {
        let bytes = one_rule_document();
        let mut options = default_options();
        options.viewbox_policy = ViewBoxPolicy::Named("bogus".to_string());
        let driver = Driver::new(bytes, options);
        let (doc, _) = driver.convert(None);
        assert!(doc.root.attr("viewBox").is_some());
    }
}
