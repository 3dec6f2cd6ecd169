//! C11: the DVI interpreter (spec.md §4.11).
//!
//! Split the way the teacher splits its larger subsystems
//! (`victor/src/fonts2/` separates `parsing.rs` from the table types
//! it produces): `opcodes.rs` is pure data (byte ranges), `visitor.rs`
//! is the interface the interpreter drives, `interpreter.rs` is the
//! state machine itself.

pub mod interpreter;
pub mod opcodes;
pub mod visitor;

pub use interpreter::{Interpreter, Preamble};
pub use visitor::DviVisitor;

/// DVI identification byte (spec.md §6): standard = 2, pTeX = 3, XDV = 5 or 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DviFormat {
    Standard,
    PTeX,
    Xdv,
}

impl DviFormat {
    pub fn from_id_byte(id: u8) -> Option<DviFormat> {
        match id {
            2 => Some(DviFormat::Standard),
            3 => Some(DviFormat::PTeX),
            5 | 6 => Some(DviFormat::Xdv),
            _ => None,
        }
    }
}

/// The writing-mode tag `d` of spec.md §3 "Cursor state".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritingMode {
    LR,
    TB,
    BT,
}

/// `(h, v, w, x, y, z, d)` (spec.md §3). Pushed/popped as a whole by the
/// stack opcodes; reset at each `bop`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorState {
    pub h: f64,
    pub v: f64,
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub d: WritingMode,
}

impl CursorState {
    pub fn zero() -> Self {
        CursorState { h: 0.0, v: 0.0, w: 0.0, x: 0.0, y: 0.0, z: 0.0, d: WritingMode::LR }
    }

    /// `LR -> h += dist, TB -> v += dist, BT -> v -= dist` (spec.md §9
    /// "Coordinate and unit traps").
    pub fn advance_main_axis(&mut self, dist: f64) {
        match self.d {
            WritingMode::LR => self.h += dist,
            WritingMode::TB => self.v += dist,
            WritingMode::BT => self.v -= dist,
        }
    }
}
