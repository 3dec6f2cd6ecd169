//! PostScript special handler (spec.md §4.13 last-but-one bullet, §1
//! "optional PostScript interpreter ... an opaque collaborator").

use super::{SpecialActions, SpecialHandler};

/// The PostScript engine is out of this core's scope (spec.md §1); it is
/// seen only through this trait, whose callbacks paint into the same SVG
/// tree via the `SpecialActions` facade passed back in.
pub trait PostScriptCollaborator {
    fn execute(&mut self, program: &str, actions: &mut dyn SpecialActions);
}

impl PostScriptCollaborator for Box<dyn PostScriptCollaborator> {
    fn execute(&mut self, program: &str, actions: &mut dyn SpecialActions) {
        (**self).execute(program, actions)
    }
}

/// Used when no PostScript engine is configured (spec.md §1): `ps:`
/// programs are accepted but have no visible effect.
pub struct NullPostScriptCollaborator;

impl PostScriptCollaborator for NullPostScriptCollaborator {
    fn execute(&mut self, _program: &str, _actions: &mut dyn SpecialActions) {}
}

pub struct PostScriptHandler<C: PostScriptCollaborator> {
    prefixes: [&'static str; 3],
    collaborator: C,
    headers: Vec<String>,
}

impl<C: PostScriptCollaborator> PostScriptHandler<C> {
    pub fn new(collaborator: C) -> Self {
        PostScriptHandler { prefixes: ["ps:", "ps::", "!"], collaborator, headers: Vec::new() }
    }
}

impl<C: PostScriptCollaborator> SpecialHandler for PostScriptHandler<C> {
    fn prefixes(&self) -> &[&str] {
        &self.prefixes
    }

    fn process(&mut self, prefix: &str, payload: &str, actions: &mut dyn SpecialActions) -> bool {
        if prefix == "!" || payload.starts_with("header=") {
            let header = payload.strip_prefix("header=").unwrap_or(payload);
            self.headers.push(header.to_string());
            return true;
        }
        self.collaborator.execute(payload, actions);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::geometry::{BoundingBox, Matrix, Point};
    use crate::xml::{Element, Node};

    struct NullActions;
    impl SpecialActions for NullActions {
        fn cursor(&self) -> Point {
            Point::new(0.0, 0.0)
        }
        fn set_cursor(&mut self, _p: Point) {}
        fn finish_line(&mut self) {}
        fn current_color(&self) -> Color {
            Color::BLACK
        }
        fn push_color(&mut self, _c: Color) {}
        fn pop_color(&mut self) {}
        fn reset_and_set_color(&mut self, _c: Color) {}
        fn set_background(&mut self, _c: Color) {}
        fn matrix(&self) -> Matrix {
            Matrix::IDENTITY
        }
        fn set_matrix(&mut self, _m: Matrix) {}
        fn page_matrix(&self) -> Matrix {
            Matrix::IDENTITY
        }
        fn append_to_page(&mut self, _node: Node) {}
        fn prepend_to_page(&mut self, _node: Node) {}
        fn append_to_defs(&mut self, _node: Node) {}
        fn push_context_element(&mut self, _element: Element) {}
        fn pop_context_element(&mut self) {}
        fn page_box(&self) -> BoundingBox {
            BoundingBox::new()
        }
        fn embed_page_box(&mut self, _p: Point) {}
        fn named_box(&self, _name: &str) -> Option<BoundingBox> {
            None
        }
        fn embed_named_box(&mut self, _name: &str, _p: Point) {}
        fn set_named_box(&mut self, _name: &str, _text: &str) {}
        fn report_progress(&mut self, _message: &str) {}
    }

    struct CountingCollaborator {
        calls: usize,
    }
    impl PostScriptCollaborator for CountingCollaborator {
        fn execute(&mut self, _program: &str, _actions: &mut dyn SpecialActions) {
            self.calls += 1;
        }
    }

    #[test]
    fn header_special_is_collected_not_executed() {
        let mut handler = PostScriptHandler::new(CountingCollaborator { calls: 0 });
        let mut actions = NullActions;
        handler.process("ps:", "header=preamble.ps", &mut actions);
        assert_eq!(handler.collaborator.calls, 0);
        assert_eq!(handler.headers, vec!["preamble.ps".to_string()]);
    }

    #[test]
    fn plain_program_is_executed() {
        let mut handler = PostScriptHandler::new(CountingCollaborator { calls: 0 });
        let mut actions = NullActions;
        handler.process("ps:", "0 0 moveto", &mut actions);
        assert_eq!(handler.collaborator.calls, 1);
    }
}
