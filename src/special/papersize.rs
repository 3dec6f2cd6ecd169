//! Papersize special handler (spec.md §4.13 last bullet).
//!
//! `papersize=W,H` records an entry; at `endPage` the latest entry whose
//! page number is `<=` the current page wins. Grounded on the teacher's
//! preference for plain sorted `Vec` lookups over a full map when entries
//! are few and queried in page order (see `fontmap.rs`'s linear search).

use super::{SpecialActions, SpecialHandler};

pub struct PapersizeHandler {
    prefixes: [&'static str; 1],
    /// `(page_number, width_pt, height_pt)`, in the order recorded.
    entries: Vec<(u32, f64, f64)>,
    current_page: u32,
}

impl PapersizeHandler {
    pub fn new() -> Self {
        PapersizeHandler { prefixes: ["papersize"], entries: Vec::new(), current_page: 0 }
    }

    fn winning_size(&self) -> Option<(f64, f64)> {
        self.entries
            .iter()
            .filter(|(page, _, _)| *page <= self.current_page)
            .max_by_key(|(page, _, _)| *page)
            .map(|(_, w, h)| (*w, *h))
    }
}

impl Default for PapersizeHandler {
    fn default() -> Self {
        PapersizeHandler::new()
    }
}

impl SpecialHandler for PapersizeHandler {
    fn prefixes(&self) -> &[&str] {
        &self.prefixes
    }

    fn is_end_page_listener(&self) -> bool {
        true
    }

    fn process(&mut self, _prefix: &str, payload: &str, _actions: &mut dyn SpecialActions) -> bool {
        let payload = payload.trim_start_matches('=');
        let mut parts = payload.split(',').map(|s| s.trim().trim_end_matches("pt"));
        let (Some(w), Some(h)) = (parts.next().and_then(|s| s.parse().ok()), parts.next().and_then(|s| s.parse().ok())) else {
            return false;
        };
        self.entries.push((self.current_page, w, h));
        true
    }

    fn begin_page(&mut self, page_number: u32, _actions: &mut dyn SpecialActions) {
        self.current_page = page_number;
    }

    fn end_page(&mut self, _page_number: u32, actions: &mut dyn SpecialActions) {
        if let Some((w, h)) = self.winning_size() {
            actions.set_named_box("__papersize__", &format!("0 0 {} {}", w, h));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_entry_up_to_current_page_wins() {
        let mut handler = PapersizeHandler::new();
        handler.current_page = 1;
        handler.entries.push((1, 100.0, 200.0));
        handler.current_page = 3;
        handler.entries.push((3, 300.0, 400.0));
        handler.current_page = 2;
        assert_eq!(handler.winning_size(), Some((100.0, 200.0)));
        handler.current_page = 3;
        assert_eq!(handler.winning_size(), Some((300.0, 400.0)));
    }
}
