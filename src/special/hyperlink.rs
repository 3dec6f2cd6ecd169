//! Hyperlink special handler (`html:`, spec.md §4.13).
//!
//! Tracks an anchor stack so a malformed `</a>` (stack-depth underrun)
//! or an anchor left open past the last one closes implicitly rather
//! than panicking (spec.md §7 "special-payload errors").

use crate::xml::{Element, Node};

use super::{SpecialActions, SpecialHandler};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum LinkOverlay {
    None,
    Underline,
    Box,
    Background,
}

pub struct HyperlinkHandler {
    prefixes: [&'static str; 1],
    overlay: LinkOverlay,
    open: Vec<String>,
}

impl HyperlinkHandler {
    pub fn new(overlay: LinkOverlay) -> Self {
        HyperlinkHandler { prefixes: ["html:"], overlay, open: Vec::new() }
    }

    fn open_anchor(&mut self, href_or_name: &str, is_name: bool, actions: &mut dyn SpecialActions) {
        let mut element = Element::new("a");
        if is_name {
            element.set_attr("id", href_or_name);
        } else {
            element.set_attr("xlink:href", href_or_name);
            match self.overlay {
                LinkOverlay::Underline => {
                    element.set_attr("style", "text-decoration: underline");
                }
                LinkOverlay::Box => {
                    element.set_attr("style", "outline: 1px solid");
                }
                LinkOverlay::Background => {
                    element.set_attr("style", "background: rgba(0,0,255,0.1)");
                }
                LinkOverlay::None => {}
            }
        }
        actions.push_context_element(element);
        self.open.push(href_or_name.to_string());
    }

    fn close_anchor(&mut self, actions: &mut dyn SpecialActions) {
        if self.open.pop().is_some() {
            actions.pop_context_element();
        }
    }
}

impl SpecialHandler for HyperlinkHandler {
    fn prefixes(&self) -> &[&str] {
        &self.prefixes
    }

    fn process(&mut self, _prefix: &str, payload: &str, actions: &mut dyn SpecialActions) -> bool {
        let payload = payload.trim();
        if let Some(rest) = payload.strip_prefix("<a ") {
            let rest = rest.trim_end_matches('>');
            if !self.open.is_empty() {
                self.close_anchor(actions);
            }
            if let Some(href) = extract_quoted(rest, "href") {
                self.open_anchor(&href, false, actions);
            } else if let Some(name) = extract_quoted(rest, "name") {
                self.open_anchor(&name, true, actions);
            } else {
                return false;
            }
            true
        } else if payload == "</a>" {
            self.close_anchor(actions);
            true
        } else {
            false
        }
    }
}

fn extract_quoted(text: &str, attr: &str) -> Option<String> {
    let needle = format!("{}=\"", attr);
    let start = text.find(&needle)? + needle.len();
    let end = text[start..].find('"')? + start;
    Some(text[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_href_attribute() {
        assert_eq!(extract_quoted(r#"href="http://example.com""#, "href"), Some("http://example.com".to_string()));
    }

    #[test]
    fn closing_without_open_anchor_is_a_noop() {
        let mut handler = HyperlinkHandler::new(LinkOverlay::None);
        assert!(handler.open.is_empty());
    }
}
