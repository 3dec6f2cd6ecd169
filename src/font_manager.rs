//! C10: process-wide font identity (spec.md §4.10).
//!
//! Grounded on spec.md §9's "ownership graph" design note (proxies carry
//! an index into the manager's table rather than a direct pointer) and
//! on the teacher's general preference for arena-style ownership
//! (`arena.rs`'s `RefCell`-backed node storage) over `Rc` everywhere;
//! here `Rc<FontHandle>` is still the simplest faithful model of
//! "canonical handle shared by every proxy", matching spec.md §3's
//! "Identity" rule directly rather than re-deriving it through indices.

use std::collections::HashMap;
use std::rc::Rc;

use crate::font::FontHandle;

#[derive(Debug, Clone)]
pub struct RegisteredFont {
    pub local_id: u32,
    pub fontnum: u32,
    pub handle: Rc<FontHandle>,
    pub scaled_size: f64,
    pub is_proxy: bool,
}

impl RegisteredFont {
    /// `scaledSize / unitsPerEm`-style ratio callers need for proxy
    /// `<use>` emission (spec.md §4.14); `design_size` is in the same pt
    /// unit as `scaled_size`, so the ratio is dimensionless.
    pub fn scale_factor(&self) -> f64 {
        if self.handle.design_size == 0.0 {
            1.0
        } else {
            self.scaled_size / self.handle.design_size
        }
    }
}

#[derive(Default)]
struct VfFrame {
    by_fontnum: HashMap<u32, usize>,
}

/// Assigns `localId`s in registration order and a stable `globalId` per
/// distinct underlying font name; owns a stack of nested font-number
/// tables for virtual-font execution (spec.md §4.10).
#[derive(Default)]
pub struct FontManager {
    registered: Vec<RegisteredFont>,
    canonical_by_name: HashMap<String, Rc<FontHandle>>,
    global_ids: HashMap<String, u32>,
    next_global_id: u32,
    frames: Vec<VfFrame>,
}

impl FontManager {
    pub fn new() -> Self {
        let mut manager = FontManager { frames: Vec::new(), ..Default::default() };
        manager.frames.push(VfFrame::default());
        manager
    }

    /// Register `fontnum -> (name, checksum, design_size, scaled_size)` in
    /// the currently active (possibly nested) font-number table, returning
    /// the freshly assigned `localId` (spec.md §8 Scenario 6).
    pub fn register(&mut self, fontnum: u32, handle: FontHandle, scaled_size: f64) -> u32 {
        let name = handle.name.clone();
        let is_proxy = self.canonical_by_name.contains_key(&name);
        let canonical = self.canonical_by_name.entry(name.clone()).or_insert_with(|| Rc::new(handle)).clone();
        self.global_ids.entry(name).or_insert_with(|| {
            let id = self.next_global_id;
            self.next_global_id += 1;
            id
        });

        let local_id = self.registered.len() as u32;
        let index = self.registered.len();
        self.registered.push(RegisteredFont { local_id, fontnum, handle: canonical, scaled_size, is_proxy });
        self.current_frame_mut().by_fontnum.insert(fontnum, index);
        local_id
    }

    pub fn get_font(&self, fontnum: u32) -> Option<&RegisteredFont> {
        let index = *self.current_frame().by_fontnum.get(&fontnum)?;
        self.registered.get(index)
    }

    pub fn global_id(&self, name: &str) -> Option<u32> {
        self.global_ids.get(name).copied()
    }

    pub fn unique_font(&self, fontnum: u32) -> Option<&Rc<FontHandle>> {
        self.get_font(fontnum).map(|r| &r.handle)
    }

    /// Push a fresh, empty font-number table for a virtual font's nested
    /// execution (spec.md §4.10 / §5 "Lifecycle of scoped resources").
    pub fn enter_vf(&mut self) {
        self.frames.push(VfFrame::default());
    }

    /// Restore the outer font-number table. Must be called on every exit
    /// path from virtual-font execution, including error paths.
    pub fn leave_vf(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    fn current_frame(&self) -> &VfFrame {
        self.frames.last().expect("FontManager always has a base frame")
    }

    fn current_frame_mut(&mut self) -> &mut VfFrame {
        self.frames.last_mut().expect("FontManager always has a base frame")
    }
}
