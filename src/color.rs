//! C3: the 24-bit RGB color model (spec.md §4.3).
//!
//! Grounded on `victor/src/primitives.rs`'s `RGBA` (a plain tuple struct
//! over float channels) but packed into one `u32` as the spec requires,
//! since equality here is specified as bit-equality of the packed value
//! rather than component closeness.

use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Color(u32);

impl Color {
    pub const BLACK: Color = Color(0);
    pub const WHITE: Color = Color(0x00FF_FFFF);

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Color((u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b))
    }

    pub fn rgb8(self) -> (u8, u8, u8) {
        (((self.0 >> 16) & 0xFF) as u8, ((self.0 >> 8) & 0xFF) as u8, (self.0 & 0xFF) as u8)
    }

    pub fn from_gray(g: f64) -> Self {
        let v = to_channel(g);
        Color::from_rgb8(v, v, v)
    }

    /// `r = 1 − min(1, c+k)`, analogously for g, b (spec.md §4.3,
    /// Scenario 2: `cmyk 0.1 0.2 0.4 0.6 -> #4c3300`). Kept in `f64`
    /// until the final rounding so the invariant in spec.md §8
    /// (`r + min(c+k, 1) = 1`) holds exactly in the computed value.
    pub fn from_cmyk(c: f64, m: f64, y: f64, k: f64) -> Self {
        let r = 1.0 - (c + k).min(1.0);
        let g = 1.0 - (m + k).min(1.0);
        let b = 1.0 - (y + k).min(1.0);
        Color::from_rgb8(to_channel(r), to_channel(g), to_channel(b))
    }

    /// Standard 6-segment HSB sector mapping.
    pub fn from_hsb(h: f64, s: f64, v: f64) -> Self {
        if s <= 0.0 {
            let g = to_channel(v);
            return Color::from_rgb8(g, g, g);
        }
        let h = h.rem_euclid(1.0) * 6.0;
        let sector = h.floor() as i32;
        let fractional = h - h.floor();
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * fractional);
        let t = v * (1.0 - s * (1.0 - fractional));
        let (r, g, b) = match sector.rem_euclid(6) {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };
        Color::from_rgb8(to_channel(r), to_channel(g), to_channel(b))
    }

    /// `#RRGGBB` or the dvisvgm-style short form `#RGB` used in specials
    /// (spec.md §8, Scenario 3: `#89A -> #00089a`). The short form repeats
    /// the first two hex digits for `r`, and the next two for `g`, but
    /// dvisvgm's own quirk (kept here since it is named as the expected
    /// behaviour) takes only one digit for `b` and zero-extends the high
    /// nibble of `r`.
    pub fn from_hex(text: &str) -> Option<Color> {
        let text = text.trim_start_matches('#');
        match text.len() {
            6 => {
                let v = u32::from_str_radix(text, 16).ok()?;
                Some(Color(v))
            }
            3 => {
                let r = u8::from_str_radix(&text[0..1], 16).ok()?;
                let g = u8::from_str_radix(&text[1..2], 16).ok()?;
                let b = u8::from_str_radix(&text[2..3], 16).ok()?;
                Some(Color::from_rgb8(0, (r << 4) | g, b))
            }
            _ => None,
        }
    }

    pub fn scale(self, factor: f64) -> Color {
        let (r, g, b) = self.rgb8();
        let scale_channel = |v: u8| (f64::from(v) * factor).round().clamp(0.0, 255.0) as u8;
        Color::from_rgb8(scale_channel(r), scale_channel(g), scale_channel(b))
    }

    /// Named lookup against the built-in dvips color table: case-sensitive
    /// binary search first, falling back to a case-insensitive linear scan
    /// (spec.md §4.3).
    pub fn from_name(name: &str) -> Option<Color> {
        if let Ok(idx) = NAMED_COLORS.binary_search_by(|&(n, _)| n.cmp(name)) {
            return Some(NAMED_COLORS[idx].1);
        }
        NAMED_COLORS
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, c)| c)
    }
}

fn to_channel(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (r, g, b) = self.rgb8();
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A LIFO color stack (spec.md §3 "Color stack" / §8 Scenario 1).
///
/// `push` saves the *current* color and switches to a new one; `pop`
/// restores the color saved by the last unmatched `push` and is a no-op
/// if there is none (popping past the bottom of the stack does not reset
/// to black — it leaves whatever `color <spec>` most recently set).
pub struct ColorStack {
    current: Color,
    saved: Vec<Color>,
}

impl Default for ColorStack {
    fn default() -> Self {
        ColorStack::new()
    }
}

impl ColorStack {
    pub fn new() -> Self {
        ColorStack { current: Color::BLACK, saved: Vec::new() }
    }

    pub fn push(&mut self, c: Color) {
        self.saved.push(self.current);
        self.current = c;
    }

    pub fn pop(&mut self) {
        if let Some(prev) = self.saved.pop() {
            self.current = prev;
        }
    }

    /// A bare `color <spec>` clears the stack and sets the current color.
    pub fn reset_and_set(&mut self, c: Color) {
        self.saved.clear();
        self.current = c;
    }

    pub fn top(&self) -> Color {
        self.current
    }
}

/// The 68 named dvips colors (PostScript `color.pro` table), sorted by
/// name for the binary-search fast path.
macro_rules! named_colors {
    ($( $name:literal => ($r:expr, $g:expr, $b:expr) ),+ $(,)?) => {
        static NAMED_COLORS_UNSORTED: &[(&str, Color)] = &[
            $( ($name, Color(($r << 16) | ($g << 8) | $b)), )+
        ];
    }
}

named_colors! {
    "Apricot" => (0xFD, 0x95, 0x6E),
    "Aquamarine" => (0x00, 0xB5, 0xBE),
    "Bittersweet" => (0xC6, 0x4A, 0x19),
    "Black" => (0x00, 0x00, 0x00),
    "Blue" => (0x00, 0x00, 0xFF),
    "BlueGreen" => (0x00, 0xB3, 0xB8),
    "BlueViolet" => (0x50, 0x3A, 0xE0),
    "BrickRed" => (0xB6, 0x15, 0x2F),
    "Brown" => (0x79, 0x2B, 0x13),
    "BurntOrange" => (0xFF, 0x7F, 0x03),
    "CadetBlue" => (0x63, 0x5F, 0x9E),
    "CarnationPink" => (0xF8, 0x82, 0xC3),
    "Cerulean" => (0x07, 0xB7, 0xE8),
    "CornflowerBlue" => (0x46, 0xC5, 0xF1),
    "Cyan" => (0x00, 0xFF, 0xFF),
    "Dandelion" => (0xFD, 0xBD, 0x34),
    "DarkOrchid" => (0x9A, 0x32, 0xCC),
    "Emerald" => (0x00, 0xA8, 0x9D),
    "ForestGreen" => (0x00, 0x9A, 0x44),
    "Fuchsia" => (0x9C, 0x30, 0x9C),
    "Goldenrod" => (0xFF, 0xDF, 0x42),
    "Gray" => (0x7F, 0x7F, 0x7F),
    "Green" => (0x00, 0xFF, 0x00),
    "GreenYellow" => (0xDF, 0xE6, 0x74),
    "JungleGreen" => (0x00, 0xA9, 0x9A),
    "Lavender" => (0xF6, 0x9E, 0xD1),
    "LimeGreen" => (0x8D, 0xD3, 0x1C),
    "Magenta" => (0xFF, 0x00, 0xFF),
    "Mahogany" => (0xA9, 0x26, 0x1B),
    "Maroon" => (0xAF, 0x30, 0x3A),
    "Melon" => (0xFF, 0x8E, 0x7C),
    "MidnightBlue" => (0x00, 0x6D, 0x93),
    "Mulberry" => (0xA9, 0x30, 0xCA),
    "NavyBlue" => (0x05, 0x6F, 0xBE),
    "OliveGreen" => (0x31, 0x70, 0x22),
    "Orange" => (0xF6, 0x61, 0x38),
    "OrangeRed" => (0xEE, 0x00, 0x77),
    "Orchid" => (0xAF, 0x72, 0xB0),
    "Peach" => (0xFF, 0x7F, 0x4C),
    "Periwinkle" => (0x7A, 0x79, 0xC8),
    "PineGreen" => (0x00, 0x84, 0x72),
    "Plum" => (0x8E, 0x30, 0x9C),
    "ProcessBlue" => (0x00, 0xB0, 0xF0),
    "Purple" => (0x99, 0x33, 0xCC),
    "RawSienna" => (0x97, 0x42, 0x0B),
    "Red" => (0xFF, 0x00, 0x00),
    "RedOrange" => (0xFF, 0x45, 0x2E),
    "RedViolet" => (0xA1, 0x11, 0x6F),
    "Rhodamine" => (0xFF, 0x2A, 0xD4),
    "RoyalBlue" => (0x00, 0x7D, 0xC5),
    "RoyalPurple" => (0x61, 0x3C, 0xD1),
    "RubineRed" => (0xFF, 0x00, 0x73),
    "Salmon" => (0xFF, 0x7E, 0x9F),
    "SeaGreen" => (0x4C, 0xD7, 0x66),
    "Sepia" => (0x4D, 0x23, 0x0B),
    "SkyBlue" => (0x46, 0xE3, 0xCF),
    "SpringGreen" => (0xC4, 0xDD, 0x17),
    "Tan" => (0xDA, 0x9D, 0x76),
    "TealBlue" => (0x00, 0xA5, 0x8D),
    "Thistle" => (0xD8, 0x83, 0xBA),
    "Turquoise" => (0x00, 0xC1, 0xB0),
    "Violet" => (0x58, 0x4B, 0xBF),
    "VioletRed" => (0xFF, 0x3F, 0xB0),
    "White" => (0xFF, 0xFF, 0xFF),
    "WildStrawberry" => (0xFF, 0x42, 0x81),
    "Yellow" => (0xFF, 0xFF, 0x00),
    "YellowGreen" => (0xBF, 0xE2, 0x14),
    "YellowOrange" => (0xFF, 0xAA, 0x0D),
    "Gray10" => (0xE6, 0xE6, 0xE6),
    "Gray90" => (0x19, 0x19, 0x19),
}

lazy_static::lazy_static! {
    static ref NAMED_COLORS: Vec<(&'static str, Color)> = {
        let mut v = NAMED_COLORS_UNSORTED.to_vec();
        v.sort_by_key(|&(name, _)| name);
        v
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmyk_conversion_scenario_2() {
        let c = Color::from_cmyk(0.1, 0.2, 0.4, 0.6);
        assert_eq!(c.to_string(), "#4c3300");
    }

    #[test]
    fn cmyk_invariant_r_plus_min_ck_is_one() {
        for &(c, k) in &[(0.1, 0.6), (0.0, 0.0), (1.0, 1.0), (0.3, 0.9)] {
            let r = 1.0 - (c + k).min(1.0);
            assert!((r + (c + k).min(1.0) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn hex_short_form_scenario_3() {
        let c = Color::from_hex("#89A").unwrap();
        assert_eq!(c.to_string(), "#00089a");
    }

    #[test]
    fn hex_long_form() {
        let c = Color::from_hex("#4c3300").unwrap();
        assert_eq!(c.to_string(), "#4c3300");
    }

    #[test]
    fn named_lookup_case_insensitive_fallback() {
        assert_eq!(Color::from_name("red"), Color::from_name("Red"));
        assert_eq!(Color::from_name("RED"), Color::from_name("Red"));
    }

    #[test]
    fn named_table_has_68_entries() {
        assert_eq!(NAMED_COLORS_UNSORTED.len(), 68);
    }

    #[test]
    fn hsb_round_trips_within_one_255th() {
        for i in 0..=255u32 {
            let v = i as f64 / 255.0;
            let c = Color::from_hsb(0.0, 0.0, v);
            let (r, _, _) = c.rgb8();
            assert!((f64::from(r) - v * 255.0).abs() <= 1.0);
        }
    }

    #[test]
    fn color_stack_scenario_1() {
        let mut stack = ColorStack::new();
        stack.push(Color::from_name("Red").unwrap());
        stack.push(Color::from_rgb8(0, 255, 0));
        stack.pop();
        stack.reset_and_set(Color::from_name("Blue").unwrap());
        stack.pop();
        assert_eq!(stack.top(), Color::from_name("Blue").unwrap());
    }
}
