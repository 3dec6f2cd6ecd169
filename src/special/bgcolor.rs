//! Background-colour special handler (spec.md §4.13).

use super::color::parse_color_spec;
use super::{SpecialActions, SpecialHandler};

pub struct BackgroundColorHandler {
    prefixes: [&'static str; 1],
}

impl BackgroundColorHandler {
    pub fn new() -> Self {
        BackgroundColorHandler { prefixes: ["background"] }
    }
}

impl Default for BackgroundColorHandler {
    fn default() -> Self {
        BackgroundColorHandler::new()
    }
}

impl SpecialHandler for BackgroundColorHandler {
    fn prefixes(&self) -> &[&str] {
        &self.prefixes
    }

    fn process(&mut self, _prefix: &str, payload: &str, actions: &mut dyn SpecialActions) -> bool {
        let tokens: Vec<&str> = payload.split_whitespace().collect();
        match parse_color_spec(&tokens) {
            Some(c) => {
                actions.set_background(c);
                true
            }
            None => false,
        }
    }
}
