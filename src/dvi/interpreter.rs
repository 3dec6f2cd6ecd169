//! C11: the DVI interpreter core (spec.md §4.11).
//!
//! The reader needs to be rebuilt on the fly whenever execution jumps
//! into a virtual font's nested byte sequence, which rules out storing
//! a `ByteReader<'a>` borrowing the document for the whole interpreter's
//! lifetime (a nested virtual-font body is a freshly-owned `Vec<u8>`
//! with its own, shorter lifetime). Grounded on `victor/src/fonts2/parsing.rs`'s
//! `Position<T>` pattern of "a cursor plus an accessor that hands out a
//! transient reader", adapted here to rebuild a `ByteReader` from an
//! owned `Rc<[u8]>` on every access instead of keeping one alive.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{DviErrorKind, Fatal, Result};
use crate::geometry::Point;
use crate::stream::ByteReader;

use super::opcodes::*;
use super::visitor::{DviVisitor, PageCounters};
use super::{CursorState, DviFormat, WritingMode};

#[derive(Debug, Clone)]
pub struct Preamble {
    pub format: DviFormat,
    pub num: u32,
    pub den: u32,
    pub mag: u32,
    pub comment: String,
    /// `(num/den) * (7227/25400000) * (mag/1000)` (SPEC_FULL.md §G).
    pub scale_pt_per_dvi_unit: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Postamble {
    pub max_v: u32,
    pub max_h: u32,
    pub max_stack_depth: u16,
    pub total_pages: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Completed,
    Cancelled,
}

pub struct Interpreter {
    bytes: Rc<[u8]>,
    pos: u64,
    pub preamble: Option<Preamble>,
    pub postamble: Postamble,
    page_offsets: Vec<u64>,
    cursor: CursorState,
    stack: Vec<CursorState>,
    current_font: Option<u32>,
    /// Scale factors for nested virtual-font bodies currently being
    /// executed; the innermost (last) entry overrides the document
    /// scale from the preamble (spec.md §4.10: a virtual font's own
    /// `fnt_def` carries its own design/scaled size).
    scale_stack: Vec<f64>,
}

impl Interpreter {
    pub fn new(bytes: impl Into<Rc<[u8]>>) -> Self {
        Interpreter {
            bytes: bytes.into(),
            pos: 0,
            preamble: None,
            postamble: Postamble::default(),
            page_offsets: Vec::new(),
            cursor: CursorState::zero(),
            stack: Vec::new(),
            current_font: None,
            scale_stack: Vec::new(),
        }
    }

    pub fn total_pages(&self) -> usize {
        self.page_offsets.len()
    }

    fn with_reader<R>(&mut self, f: impl FnOnce(&mut ByteReader) -> Result<R>) -> Result<R> {
        let mut reader = ByteReader::new(&self.bytes);
        reader.seek(self.pos)?;
        let result = f(&mut reader)?;
        self.pos = reader.tell();
        Ok(result)
    }

    fn scale(&self) -> f64 {
        self.scale_stack
            .last()
            .copied()
            .or_else(|| self.preamble.as_ref().map(|p| p.scale_pt_per_dvi_unit))
            .unwrap_or(1.0)
    }

    /// Multi-pass scan (spec.md §4.11 "Multi-pass strategy"): read the
    /// preamble, locate the postamble via the post-postamble's 223-byte
    /// tail, read font definitions found there, then chase the `bop`
    /// back-pointer chain to index every page in file order.
    pub fn scan(&mut self, visitor: &mut dyn DviVisitor) -> Result<()> {
        self.read_preamble()?;
        let post_ptr = self.find_post_post()?;
        self.pos = post_ptr;
        let prev_bop = self.read_postamble_header()?;
        self.read_postamble_font_defs(visitor)?;
        self.chase_bop_chain(prev_bop)?;
        Ok(())
    }

    fn read_preamble(&mut self) -> Result<()> {
        self.pos = 0;
        let (format, num, den, mag, comment) = self.with_reader(|r| {
            let op = r.read_u8()?;
            if op != PRE {
                return Err(Fatal::new(DviErrorKind::InvalidDviFile("missing pre opcode".into())));
            }
            let id = r.read_u8()?;
            let format = DviFormat::from_id_byte(id)
                .ok_or_else(|| Fatal::new(DviErrorKind::InvalidDviFile(format!("unknown id byte {}", id))))?;
            let num = r.read_unsigned(4)?;
            let den = r.read_unsigned(4)?;
            let mag = r.read_unsigned(4)?;
            let k = r.read_u8()? as usize;
            let comment = r.read_string(k)?;
            Ok((format, num, den, mag, comment))
        })?;
        let scale_pt_per_dvi_unit = (f64::from(num) / f64::from(den)) * (7227.0 / 25_400_000.0) * (f64::from(mag) / 1000.0);
        self.preamble = Some(Preamble { format, num, den, mag, comment, scale_pt_per_dvi_unit });
        Ok(())
    }

    /// Walk backward from EOF over the 223-byte fill to find `post_post`
    /// and return the postamble's byte offset.
    fn find_post_post(&mut self) -> Result<u64> {
        let len = self.bytes.len() as u64;
        // Scan back from the end for the post_post(249) opcode, skipping
        // trailing 223-fill bytes (each guaranteed to be 0xDF).
        let mut i = len;
        while i > 0 {
            i -= 1;
            if self.bytes[i as usize] == POST_POST {
                self.pos = i + 1;
                return self.with_reader(|r| r.read_unsigned(4)).map(u64::from);
            }
            if self.bytes[i as usize] != 0xDF {
                break;
            }
        }
        Err(Fatal::new(DviErrorKind::InvalidDviFile("post_post not found".into())))
    }

    fn read_postamble_header(&mut self) -> Result<u64> {
        self.with_reader(|r| {
            let op = r.read_u8()?;
            if op != POST {
                return Err(Fatal::new(DviErrorKind::InvalidDviFile("missing post opcode".into())));
            }
            let prev_bop = r.read_unsigned(4)?;
            let _num = r.read_unsigned(4)?;
            let _den = r.read_unsigned(4)?;
            let _mag = r.read_unsigned(4)?;
            Ok(u64::from(prev_bop))
        })
        .and_then(|prev_bop| {
            self.with_reader(|r| {
                let max_v = r.read_unsigned(4)?;
                let max_h = r.read_unsigned(4)?;
                let max_stack_depth = r.read_unsigned(2)? as u16;
                let total_pages = r.read_unsigned(2)? as u16;
                Ok((prev_bop, max_v, max_h, max_stack_depth, total_pages))
            })
        })
        .map(|(prev_bop, max_v, max_h, max_stack_depth, total_pages)| {
            self.postamble = Postamble { max_v, max_h, max_stack_depth, total_pages };
            prev_bop
        })
    }

    /// The postamble's tail is a run of `fnt_def`s (and, for XDV, native
    /// font defs); consume them until the `post_post` opcode reappears.
    fn read_postamble_font_defs(&mut self, visitor: &mut dyn DviVisitor) -> Result<()> {
        loop {
            let op = self.with_reader(|r| r.read_u8())?;
            if op == POST_POST {
                self.pos -= 1;
                return Ok(());
            }
            if (FNT_DEF1..=FNT_DEF4).contains(&op) {
                self.read_fnt_def(op, visitor)?;
            } else if op == NOP {
                continue;
            } else {
                return Err(Fatal::new(DviErrorKind::InvalidDviFile(format!(
                    "unexpected opcode {} in postamble",
                    op
                ))));
            }
        }
    }

    fn read_fnt_def(&mut self, op: u8, visitor: &mut dyn DviVisitor) -> Result<()> {
        let n = (op - FNT_DEF1) as usize + 1;
        let (fontnum, checksum, scaled_size, design_size, name) = self.with_reader(|r| {
            let fontnum = r.read_unsigned(n)?;
            let checksum = r.read_unsigned(4)?;
            let scaled_size = r.read_unsigned(4)?;
            let design_size = r.read_unsigned(4)?;
            let path_len = r.read_u8()? as usize;
            let name_len = r.read_u8()? as usize;
            let _path = r.read_string(path_len)?;
            let name = r.read_string(name_len)?;
            Ok((fontnum, checksum, scaled_size, design_size, name))
        })?;
        let scale = self.scale();
        visitor.define_font(
            fontnum,
            checksum,
            f64::from(scaled_size) * scale,
            f64::from(design_size) * scale,
            &name,
        );
        Ok(())
    }

    /// Follow `prev_bop` pointers backward, collecting page offsets, then
    /// reverse them into file order (spec.md §4.11).
    fn chase_bop_chain(&mut self, mut prev_bop: u64) -> Result<()> {
        let mut offsets = Vec::with_capacity(self.postamble.total_pages as usize);
        while prev_bop != u64::from(u32::MAX) {
            offsets.push(prev_bop);
            self.pos = prev_bop;
            let next_prev = self.with_reader(|r| {
                let op = r.read_u8()?;
                if op != BOP {
                    return Err(Fatal::new(DviErrorKind::InvalidDviFile("bop chain broken".into())));
                }
                for _ in 0..10 {
                    r.read_signed(4)?;
                }
                r.read_unsigned(4)
            })?;
            prev_bop = u64::from(next_prev);
        }
        offsets.reverse();
        self.page_offsets = offsets;
        Ok(())
    }

    /// Execute the `index`-th page (0-based, in file order) against
    /// `visitor` (spec.md §4.11 "Page-execution semantics").
    pub fn execute_page(&mut self, index: usize, visitor: &mut dyn DviVisitor, cancel: Option<&AtomicBool>) -> Result<PageOutcome> {
        let offset = *self
            .page_offsets
            .get(index)
            .ok_or_else(|| Fatal::new(DviErrorKind::InvalidDviFile(format!("page index {} out of range", index))))?;
        self.pos = offset;
        self.cursor = CursorState::zero();
        self.stack.clear();
        self.current_font = None;

        let counters = self.with_reader(|r| {
            let op = r.read_u8()?;
            if op != BOP {
                return Err(Fatal::new(DviErrorKind::InvalidDviFile("expected bop".into())));
            }
            let mut counters: PageCounters = [0; 10];
            for c in counters.iter_mut() {
                *c = r.read_signed(4)?;
            }
            r.read_signed(4)?; // prev_bop pointer, unused here
            Ok(counters)
        })?;
        let page_number = (index + 1) as u32;
        visitor.begin_page(page_number, counters);

        loop {
            if let Some(flag) = cancel {
                if flag.load(Ordering::Relaxed) {
                    return Ok(PageOutcome::Cancelled);
                }
            }
            let op = self.with_reader(|r| r.read_u8())?;
            if op == EOP {
                break;
            }
            self.dispatch(op, visitor)?;
        }
        if !self.stack.is_empty() {
            return Err(Fatal::new(DviErrorKind::StackNotEmpty));
        }
        visitor.end_page(page_number);
        Ok(PageOutcome::Completed)
    }

    fn dispatch(&mut self, op: u8, visitor: &mut dyn DviVisitor) -> Result<()> {
        if is_set_char(op) {
            self.put_char(visitor, u32::from(op), true)?;
            return Ok(());
        }
        if is_fnt_num(op) {
            let fontnum = u32::from(op - FNT_NUM_0);
            self.current_font = Some(fontnum);
            visitor.set_font(fontnum)?;
            return Ok(());
        }
        match op {
            SET1..=SET4 => {
                let n = (op - SET1) as usize + 1;
                let code = self.with_reader(|r| r.read_unsigned(n))?;
                self.put_char(visitor, code, true)?;
            }
            PUT1..=PUT4 => {
                let n = (op - PUT1) as usize + 1;
                let code = self.with_reader(|r| r.read_unsigned(n))?;
                self.put_char(visitor, code, false)?;
            }
            SET_RULE => self.put_rule(visitor, true)?,
            PUT_RULE => self.put_rule(visitor, false)?,
            NOP => {}
            BOP => return Err(Fatal::new(DviErrorKind::InvalidDviFile("nested bop".into()))),
            PUSH => self.stack.push(self.cursor),
            POP => {
                self.cursor = self.stack.pop().ok_or_else(|| Fatal::new(DviErrorKind::StackUnderflow))?;
            }
            RIGHT1..=RIGHT4 => {
                let n = (op - RIGHT1) as usize + 1;
                let dist = self.read_signed_pt(n)?;
                self.cursor.advance_main_axis(dist);
                visitor.move_to_x();
            }
            W0 => {
                let dist = self.cursor.w;
                self.cursor.advance_main_axis(dist);
                visitor.move_to_x();
            }
            W1..=W4 => {
                let n = (op - W1) as usize + 1;
                let dist = self.read_signed_pt(n)?;
                self.cursor.w = dist;
                self.cursor.advance_main_axis(dist);
                visitor.move_to_x();
            }
            X0 => {
                let dist = self.cursor.x;
                self.cursor.advance_main_axis(dist);
                visitor.move_to_x();
            }
            X1..=X4 => {
                let n = (op - X1) as usize + 1;
                let dist = self.read_signed_pt(n)?;
                self.cursor.x = dist;
                self.cursor.advance_main_axis(dist);
                visitor.move_to_x();
            }
            DOWN1..=DOWN4 => {
                let n = (op - DOWN1) as usize + 1;
                let dist = self.read_signed_pt(n)?;
                self.cursor.v += dist;
                visitor.move_to_y();
            }
            Y0 => {
                self.cursor.v += self.cursor.y;
                visitor.move_to_y();
            }
            Y1..=Y4 => {
                let n = (op - Y1) as usize + 1;
                let dist = self.read_signed_pt(n)?;
                self.cursor.y = dist;
                self.cursor.v += dist;
                visitor.move_to_y();
            }
            Z0 => {
                self.cursor.v += self.cursor.z;
                visitor.move_to_y();
            }
            Z1..=Z4 => {
                let n = (op - Z1) as usize + 1;
                let dist = self.read_signed_pt(n)?;
                self.cursor.z = dist;
                self.cursor.v += dist;
                visitor.move_to_y();
            }
            FNT1..=FNT4 => {
                let n = (op - FNT1) as usize + 1;
                let fontnum = self.with_reader(|r| r.read_unsigned(n))?;
                self.current_font = Some(fontnum);
                visitor.set_font(fontnum)?;
            }
            XXX1..=XXX4 => {
                let n = (op - XXX1) as usize + 1;
                let len = self.with_reader(|r| r.read_unsigned(n))? as usize;
                let payload = self.with_reader(|r| Ok(r.read_bytes(len)?.to_vec()))?;
                visitor.special(&payload);
            }
            FNT_DEF1..=FNT_DEF4 => self.read_fnt_def(op, visitor)?,
            XDV_PICTURE | XDV_NATIVE_FONT_DEF | XDV_GLYPH_ARRAY | XDV_GLYPH_ARRAY_NO_Y => {
                self.skip_xdv_extension(op)?;
            }
            PTEX_DIR => {
                let mode = match self.with_reader(|r| r.read_u8())? {
                    0 => WritingMode::LR,
                    1 => WritingMode::TB,
                    _ => WritingMode::BT,
                };
                self.cursor.d = mode;
                visitor.writing_mode_changed(mode);
            }
            _ => return Err(Fatal::new(DviErrorKind::InvalidDviFile(format!("unknown opcode {}", op)))),
        }
        Ok(())
    }

    /// XDV extension payloads are out of this core's rendering scope
    /// (spec.md §1's non-goals do not name them, but no visitor hook
    /// exists for native glyph arrays either); their length-prefixed
    /// bodies are consumed so the stream stays aligned.
    fn skip_xdv_extension(&mut self, _op: u8) -> Result<()> {
        let len = self.with_reader(|r| r.read_unsigned(4))? as usize;
        self.with_reader(|r| r.read_bytes(len).map(|_| ()))
    }

    fn read_signed_pt(&mut self, n: usize) -> Result<f64> {
        let raw = self.with_reader(|r| r.read_signed(n))?;
        Ok(f64::from(raw) * self.scale())
    }

    fn put_char(&mut self, visitor: &mut dyn DviVisitor, code: u32, advance: bool) -> Result<()> {
        let fontnum = self.current_font.ok_or_else(|| Fatal::new(DviErrorKind::FontNotSelected))?;
        if visitor.is_virtual_font(fontnum) {
            let body = visitor.virtual_font_body(fontnum, code).unwrap_or_default();
            self.execute_virtual(visitor, fontnum, body)?;
            return Ok(());
        }
        let vertical = matches!(self.cursor.d, WritingMode::TB | WritingMode::BT);
        let pos = Point::new(self.cursor.h, self.cursor.v);
        let width = visitor.set_char(pos, code, vertical, fontnum);
        if advance {
            if let Some(w) = width {
                self.cursor.advance_main_axis(w);
            }
        }
        Ok(())
    }

    fn put_rule(&mut self, visitor: &mut dyn DviVisitor, advance: bool) -> Result<()> {
        self.current_font.ok_or_else(|| Fatal::new(DviErrorKind::FontNotSelected))?;
        let height = self.read_signed_pt(4)?;
        let width = self.read_signed_pt(4)?;
        let pos = Point::new(self.cursor.h, self.cursor.v);
        if height > 0.0 && width > 0.0 {
            visitor.set_rule(pos, height, width);
        }
        if advance {
            self.cursor.advance_main_axis(width);
        }
        Ok(())
    }

    /// Run a virtual font's nested DVI command sequence (spec.md §4.11
    /// "Character dispatch", §4.10, §5 "Lifecycle of scoped resources").
    /// Every piece of outer state this touches is restored via an RAII
    /// guard so a `?`-propagated error still leaves the outer
    /// interpreter consistent.
    fn execute_virtual(&mut self, visitor: &mut dyn DviVisitor, fontnum: u32, body: Vec<u8>) -> Result<()> {
        struct Restore {
            bytes: Rc<[u8]>,
            pos: u64,
            cursor: CursorState,
            font: Option<u32>,
        }
        let guard = Restore { bytes: self.bytes.clone(), pos: self.pos, cursor: self.cursor, font: self.current_font };

        self.bytes = Rc::from(body.into_boxed_slice());
        self.pos = 0;
        self.cursor.w = 0.0;
        self.cursor.x = 0.0;
        self.cursor.y = 0.0;
        self.cursor.z = 0.0;
        self.current_font = None;
        self.scale_stack.push(visitor.virtual_font_scale_pt(fontnum));
        visitor.enter_vf();

        let result = (|| -> Result<()> {
            let len = self.bytes.len() as u64;
            while self.pos < len {
                let op = self.with_reader(|r| r.read_u8())?;
                self.dispatch(op, visitor)?;
            }
            Ok(())
        })();

        visitor.leave_vf();
        self.scale_stack.pop();
        self.bytes = guard.bytes;
        self.pos = guard.pos;
        self.cursor = guard.cursor;
        self.current_font = guard.font;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn push_preamble(out: &mut Vec<u8>, comment: &[u8]) {
        out.push(PRE);
        out.push(2);
        out.extend_from_slice(&25_400_000u32.to_be_bytes());
        out.extend_from_slice(&7_227_000u32.to_be_bytes());
        out.extend_from_slice(&1000u32.to_be_bytes());
        out.push(comment.len() as u8);
        out.extend_from_slice(comment);
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

    #[derive(Default)]
    struct RecordingVisitor {
        begins: RefCell<Vec<u32>>,
        ends: RefCell<Vec<u32>>,
        chars: RefCell<Vec<(u32, u32)>>,
    }

    impl DviVisitor for RecordingVisitor {
        fn begin_page(&mut self, page_number: u32, _counters: PageCounters) {
            self.begins.borrow_mut().push(page_number);
        }
        fn end_page(&mut self, page_number: u32) {
            self.ends.borrow_mut().push(page_number);
        }
        fn define_font(&mut self, _fontnum: u32, _checksum: u32, _scaled_size_pt: f64, _design_size_pt: f64, _name: &str) {}
        fn set_font(&mut self, _fontnum: u32) -> Result<()> {
            Ok(())
        }
        fn is_virtual_font(&self, _fontnum: u32) -> bool {
            false
        }
        fn virtual_font_body(&self, _fontnum: u32, _code: u32) -> Option<Vec<u8>> {
            None
        }
        fn virtual_font_scale_pt(&self, _fontnum: u32) -> f64 {
            1.0
        }
        fn set_char(&mut self, pos: Point, code: u32, _vertical: bool, fontnum: u32) -> Option<f64> {
            self.chars.borrow_mut().push((fontnum, code));
            let _ = pos;
            Some(1.0)
        }
        fn set_rule(&mut self, _pos: Point, _height: f64, _width: f64) {}
        fn move_to_x(&mut self) {}
        fn move_to_y(&mut self) {}
        fn special(&mut self, _payload: &[u8]) {}
    }

    fn one_page_document() -> Vec<u8> {
        let mut out = Vec::new();
        push_preamble(&mut out, b"test");
        let bop_offset = out.len() as u32;
        push_bop(&mut out, -1);
        out.push(FNT_NUM_0);
        out.push(SET_CHAR_0 + 65);
        out.push(EOP);
        let post_offset = out.len() as u32;
        push_postamble(&mut out, bop_offset, 1);
        push_post_post(&mut out, post_offset);
        out
    }

    #[test]
    fn scans_preamble_and_locates_one_page() {
        let bytes = one_page_document();
        let mut interp = Interpreter::new(bytes);
        let mut visitor = RecordingVisitor::default();
        interp.scan(&mut visitor).unwrap();
        assert_eq!(interp.total_pages(), 1);
        assert!(interp.preamble.as_ref().unwrap().scale_pt_per_dvi_unit > 0.0);
    }

    #[test]
    fn executes_page_and_calls_visitor_in_order() {
        let bytes = one_page_document();
        let mut interp = Interpreter::new(bytes);
        let mut visitor = RecordingVisitor::default();
        interp.scan(&mut visitor).unwrap();
        let outcome = interp.execute_page(0, &mut visitor, None).unwrap();
        assert_eq!(outcome, PageOutcome::Completed);
        assert_eq!(*visitor.begins.borrow(), vec![1]);
        assert_eq!(*visitor.ends.borrow(), vec![1]);
        assert_eq!(*visitor.chars.borrow(), vec![(0, 65)]);
    }

    #[test]
    fn pop_on_empty_stack_is_an_error() {
        let mut out = Vec::new();
        push_preamble(&mut out, b"");
        let bop_offset = out.len() as u32;
        push_bop(&mut out, -1);
        out.push(POP);
        out.push(EOP);
        let post_offset = out.len() as u32;
        push_postamble(&mut out, bop_offset, 1);
        push_post_post(&mut out, post_offset);

        let mut interp = Interpreter::new(out);
        let mut visitor = RecordingVisitor::default();
        interp.scan(&mut visitor).unwrap();
        let err = interp.execute_page(0, &mut visitor, None).unwrap_err();
        assert_eq!(err.kind, DviErrorKind::StackUnderflow);
    }

    #[test]
    fn unbalanced_push_leaves_stack_not_empty() {
        let mut out = Vec::new();
        push_preamble(&mut out, b"");
        let bop_offset = out.len() as u32;
        push_bop(&mut out, -1);
        out.push(PUSH);
        out.push(EOP);
        let post_offset = out.len() as u32;
        push_postamble(&mut out, bop_offset, 1);
        push_post_post(&mut out, post_offset);

        let mut interp = Interpreter::new(out);
        let mut visitor = RecordingVisitor::default();
        interp.scan(&mut visitor).unwrap();
        let err = interp.execute_page(0, &mut visitor, None).unwrap_err();
        assert_eq!(err.kind, DviErrorKind::StackNotEmpty);
    }

    #[test]
    fn char_without_font_selected_is_an_error() {
        let mut out = Vec::new();
        push_preamble(&mut out, b"");
        let bop_offset = out.len() as u32;
        push_bop(&mut out, -1);
        out.push(SET_CHAR_0 + 65);
        out.push(EOP);
        let post_offset = out.len() as u32;
        push_postamble(&mut out, bop_offset, 1);
        push_post_post(&mut out, post_offset);

        let mut interp = Interpreter::new(out);
        let mut visitor = RecordingVisitor::default();
        interp.scan(&mut visitor).unwrap();
        let err = interp.execute_page(0, &mut visitor, None).unwrap_err();
        assert_eq!(err.kind, DviErrorKind::FontNotSelected);
    }

    #[test]
    fn cancellation_flag_aborts_page_execution() {
        let bytes = one_page_document();
        let mut interp = Interpreter::new(bytes);
        let mut visitor = RecordingVisitor::default();
        interp.scan(&mut visitor).unwrap();
        let flag = AtomicBool::new(true);
        let outcome = interp.execute_page(0, &mut visitor, Some(&flag)).unwrap();
        assert_eq!(outcome, PageOutcome::Cancelled);
    }
}
