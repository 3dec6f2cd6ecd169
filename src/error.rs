//! Error types for the DVI → SVG core.
//!
//! Grounded on `victor`'s `error_enum!` macro (see the teacher's
//! `errors.rs`): a small enum with `From` impls for the error types of
//! the collaborators the core actually touches, so `?` works across
//! module boundaries without a blanket `Box<dyn Error>`.

use std::fmt;
use std::io;

macro_rules! error_enum {
    ($( $(#[$doc:meta])* $Variant: ident ($Type: ty), )+) => {
        #[derive(Debug)]
        pub enum DviError {
            $(
                $(#[$doc])*
                $Variant($Type),
            )+
        }

        $(
            impl From<$Type> for DviError {
                fn from(e: $Type) -> Self {
                    DviError::$Variant(e)
                }
            }
        )+
    }
}

error_enum! {
    Io(io::Error),
}

/// Input-format and protocol errors from spec.md §4.11 / §7.
///
/// These are the only errors that abort a conversion; everything else
/// (missing font file, bad special payload, ...) is logged with `log::warn!`
/// and conversion continues with a degraded result.
#[derive(Debug, Clone, PartialEq)]
pub enum DviErrorKind {
    /// Fewer bytes were available than the opcode required.
    TruncatedInput,
    /// A seek went outside the stream or failed at the OS level.
    SeekFailed,
    /// Opcode outside the defined ranges for the declared DVI format,
    /// bad preamble identification byte, or otherwise malformed input.
    InvalidDviFile(String),
    /// `pop` on an empty cursor stack.
    StackUnderflow,
    /// The cursor stack was non-empty at `eop`.
    StackNotEmpty,
    /// A character or rule operation happened with no font selected.
    FontNotSelected,
    /// Selection of a font number with no matching `fnt_def`.
    UnknownFont(u32),
    /// A `Matrix` has no inverse.
    SingularMatrix,
    /// A CMap (or virtual font) inclusion chain referenced itself.
    CircularReference(String),
}

impl fmt::Display for DviErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DviErrorKind::TruncatedInput => write!(f, "truncated DVI input"),
            DviErrorKind::SeekFailed => write!(f, "seek failed"),
            DviErrorKind::InvalidDviFile(msg) => write!(f, "invalid DVI file: {}", msg),
            DviErrorKind::StackUnderflow => write!(f, "stack underflow"),
            DviErrorKind::StackNotEmpty => write!(f, "stack not empty at eop"),
            DviErrorKind::FontNotSelected => write!(f, "no font selected"),
            DviErrorKind::UnknownFont(n) => write!(f, "unknown font number {}", n),
            DviErrorKind::SingularMatrix => write!(f, "matrix has no inverse"),
            DviErrorKind::CircularReference(what) => write!(f, "circular reference: {}", what),
        }
    }
}

impl std::error::Error for DviErrorKind {}

/// A fatal error report as required by spec.md §7: `(kind, message, offset)`.
#[derive(Debug, Clone)]
pub struct Fatal {
    pub kind: DviErrorKind,
    pub byte_offset: Option<u64>,
}

impl Fatal {
    pub fn new(kind: DviErrorKind) -> Self {
        Fatal { kind, byte_offset: None }
    }

    pub fn at(kind: DviErrorKind, byte_offset: u64) -> Self {
        Fatal { kind, byte_offset: Some(byte_offset) }
    }
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.byte_offset {
            Some(off) => write!(f, "{} (at byte {})", self.kind, off),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Fatal {}

/// The end-to-end result of a conversion (spec.md §7).
#[derive(Debug)]
pub enum ConversionStatus {
    Ok,
    Cancelled,
    Failed(Fatal),
}

pub type Result<T> = std::result::Result<T, Fatal>;
