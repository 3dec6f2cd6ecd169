//! C12: the special-command dispatcher (spec.md §4.12).
//!
//! Grounded on `victor/src/fonts2/select.rs`'s registry-of-trait-objects
//! pattern (a `Vec<Box<dyn Trait>>` searched linearly, since the handler
//! count here is a dozen at most and dispatch happens once per `xxx`
//! opcode, not per byte).

mod bgcolor;
mod color;
mod emtex;
mod hyperlink;
mod papersize;
mod postscript;
mod rawsvg;
mod tpic;

pub use bgcolor::BackgroundColorHandler;
pub use color::ColorSpecialHandler;
pub use emtex::EmTexHandler;
pub use hyperlink::HyperlinkHandler;
pub use papersize::PapersizeHandler;
pub use postscript::{NullPostScriptCollaborator, PostScriptCollaborator, PostScriptHandler};
pub use rawsvg::RawSvgHandler;
pub use tpic::TpicHandler;

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::color::Color;
use crate::geometry::{BoundingBox, Matrix, Point};
use crate::xml::{Element, Node};

/// The abstract view of conversion state every handler is given
/// (spec.md §6 "SpecialActions facade"). Implemented by the SVG builder
/// (C14).
pub trait SpecialActions {
    fn cursor(&self) -> Point;
    fn set_cursor(&mut self, p: Point);
    /// Breaks cursor continuity: the next character starts a new `tspan`
    /// even if x/y did not otherwise change (spec.md §6).
    fn finish_line(&mut self);

    fn current_color(&self) -> Color;
    fn push_color(&mut self, c: Color);
    fn pop_color(&mut self);
    fn reset_and_set_color(&mut self, c: Color);
    fn set_background(&mut self, c: Color);

    fn matrix(&self) -> Matrix;
    fn set_matrix(&mut self, m: Matrix);
    fn page_matrix(&self) -> Matrix;

    fn append_to_page(&mut self, node: Node);
    fn prepend_to_page(&mut self, node: Node);
    fn append_to_defs(&mut self, node: Node);
    /// Opens a group that subsequent `append_to_page` calls nest inside,
    /// until the matching `pop_context_element`.
    fn push_context_element(&mut self, element: Element);
    fn pop_context_element(&mut self);

    fn page_box(&self) -> BoundingBox;
    fn embed_page_box(&mut self, p: Point);
    fn named_box(&self, name: &str) -> Option<BoundingBox>;
    /// Creates the named box on first write (spec.md §3 "Named boxes").
    fn embed_named_box(&mut self, name: &str, p: Point);
    fn set_named_box(&mut self, name: &str, text: &str);

    fn report_progress(&mut self, message: &str);
}

/// A concrete special handler (spec.md §4.12 "Handler contract").
pub trait SpecialHandler {
    /// Prefixes this handler claims, e.g. `["color"]` or `["ps:", "ps::", "!"]`.
    fn prefixes(&self) -> &[&str];

    fn is_end_page_listener(&self) -> bool {
        false
    }
    fn is_position_listener(&self) -> bool {
        false
    }

    /// Returns whether the payload was recognised and handled.
    fn process(&mut self, prefix: &str, payload: &str, actions: &mut dyn SpecialActions) -> bool;

    fn begin_page(&mut self, _page_number: u32, _actions: &mut dyn SpecialActions) {}
    fn end_page(&mut self, _page_number: u32, _actions: &mut dyn SpecialActions) {}
    fn position_changed(&mut self, _actions: &mut dyn SpecialActions) {}
}

#[derive(Default)]
pub struct SpecialDispatcher {
    handlers: Vec<Box<dyn SpecialHandler>>,
}

impl SpecialDispatcher {
    pub fn new() -> Self {
        SpecialDispatcher::default()
    }

    pub fn register(&mut self, handler: Box<dyn SpecialHandler>) {
        self.handlers.push(handler);
    }

    /// Longest-prefix match across every registered handler's prefix
    /// list; silently ignores anything that matches nothing (spec.md
    /// §4.12). Panics from a handler are caught, logged with the
    /// offending text, and do not abort conversion (spec.md §7).
    pub fn dispatch(&mut self, payload: &[u8], actions: &mut dyn SpecialActions) {
        let text = String::from_utf8_lossy(payload);
        let mut best: Option<(usize, usize)> = None;
        for (idx, handler) in self.handlers.iter().enumerate() {
            for prefix in handler.prefixes() {
                if text.starts_with(prefix) && best.map(|(_, len)| prefix.len() > len).unwrap_or(true) {
                    best = Some((idx, prefix.len()));
                }
            }
        }
        let Some((idx, len)) = best else {
            log::debug!("no special handler matched {:?}", text);
            return;
        };
        let prefix = text[..len].to_string();
        let rest = text[len..].trim_start().to_string();
        let handler = &mut self.handlers[idx];
        let outcome = catch_unwind(AssertUnwindSafe(|| handler.process(&prefix, &rest, actions)));
        match outcome {
            Ok(true) => {}
            Ok(false) => log::warn!("special not handled: {:?}", text),
            Err(_) => log::warn!("special handler panicked on {:?}", text),
        }
    }

    pub fn begin_page(&mut self, page_number: u32, actions: &mut dyn SpecialActions) {
        for handler in &mut self.handlers {
            handler.begin_page(page_number, actions);
        }
    }

    pub fn end_page(&mut self, page_number: u32, actions: &mut dyn SpecialActions) {
        for handler in &mut self.handlers {
            if handler.is_end_page_listener() {
                handler.end_page(page_number, actions);
            }
        }
    }

    pub fn position_changed(&mut self, actions: &mut dyn SpecialActions) {
        for handler in &mut self.handlers {
            if handler.is_position_listener() {
                handler.position_changed(actions);
            }
        }
    }
}
