//! C6: font-map file parsing (spec.md §4.6).
//!
//! Grounded on the teacher's general approach to small line-oriented
//! text formats (`victor/src/style/declaration_block.rs` tokenizes CSS
//! declarations field by field); map files here are simpler still —
//! whitespace/quote tokenized lines — so this module hand-rolls a small
//! tokenizer rather than pulling in a parser-combinator crate, matching
//! the teacher's general bias toward small hand-written parsers over
//! external parsing crates for formats this size.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct FontMapEntry {
    pub tex_name: String,
    pub ps_name: Option<String>,
    pub font_file: Option<String>,
    pub encoding_file: Option<String>,
    pub slant: Option<f64>,
    pub extend: Option<f64>,
    pub bold: bool,
    pub no_embed: bool,
    pub ttc_index: Option<u32>,
    pub locked: bool,
}

impl FontMapEntry {
    fn new(tex_name: impl Into<String>) -> Self {
        FontMapEntry { tex_name: tex_name.into(), ..Default::default() }
    }
}

#[derive(Default)]
pub struct FontMap {
    entries: HashMap<String, FontMapEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    Append,
    Replace,
    Remove,
}

impl FontMap {
    pub fn new() -> Self {
        FontMap::default()
    }

    pub fn get(&self, tex_name: &str) -> Option<&FontMapEntry> {
        self.entries.get(tex_name)
    }

    /// Called by the font resolver (C8) the first time a name is looked
    /// up; locked entries can no longer be replaced or removed by a
    /// later, lower-priority map file (spec.md §4.6, supplemented per
    /// `original_source/src/FontMap.cpp`).
    pub fn mark_used(&mut self, tex_name: &str) {
        if let Some(e) = self.entries.get_mut(tex_name) {
            e.locked = true;
        }
    }

    pub fn apply(&mut self, entry: FontMapEntry, mode: ApplyMode) {
        match mode {
            ApplyMode::Append => {
                self.entries.entry(entry.tex_name.clone()).or_insert(entry);
            }
            ApplyMode::Replace => {
                let locked = self.entries.get(&entry.tex_name).map(|e| e.locked).unwrap_or(false);
                if !locked {
                    self.entries.insert(entry.tex_name.clone(), entry);
                }
            }
            ApplyMode::Remove => {
                let locked = self.entries.get(&entry.tex_name).map(|e| e.locked).unwrap_or(false);
                if !locked {
                    self.entries.remove(&entry.tex_name);
                }
            }
        }
    }

    /// Parse a whole map file's text and apply every line under `mode`.
    pub fn load_str(&mut self, text: &str, mode: ApplyMode) {
        for line in text.lines() {
            if let Some(entry) = parse_line(line) {
                self.apply(entry, mode);
            }
        }
    }
}

fn is_comment(line: &str) -> bool {
    matches!(line.trim_start().chars().next(), Some('#') | Some('%') | Some(';') | Some('*') | None)
}

fn parse_line(line: &str) -> Option<FontMapEntry> {
    if is_comment(line) {
        return None;
    }
    let tokens = tokenize(line);
    if tokens.is_empty() {
        return None;
    }
    if looks_like_dvipdfm(&tokens) {
        parse_dvipdfm_line(&tokens)
    } else {
        parse_dvips_line(&tokens)
    }
}

/// Split a line into whitespace-separated tokens, keeping `"..."`
/// quoted PostScript fragments and `<...` filename tokens intact.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    let mut current = String::new();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            '"' => {
                chars.next();
                current.push('"');
                for c in chars.by_ref() {
                    current.push(c);
                    if c == '"' {
                        break;
                    }
                }
                tokens.push(std::mem::take(&mut current));
            }
            _ => {
                current.push(c);
                chars.next();
            }
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// dvipdfm-style lines always carry an explicit encoding-name token in
/// second position, distinguishing them from dvips lines where the
/// second token (if any) is a PostScript font name.
fn looks_like_dvipdfm(tokens: &[String]) -> bool {
    tokens.len() >= 3
        && tokens
            .iter()
            .skip(1)
            .any(|t| t.starts_with('-') && t.len() == 2 && "seboripumvw".contains(t.chars().nth(1).unwrap()))
}

fn parse_dvips_line(tokens: &[String]) -> Option<FontMapEntry> {
    let mut entry = FontMapEntry::new(tokens.first()?.clone());
    for tok in &tokens[1..] {
        if tok.starts_with('<') {
            let rest = tok.trim_start_matches('<').trim_start_matches('[');
            if tok.starts_with("<[") {
                entry.encoding_file = Some(rest.to_string());
            } else if rest.ends_with(".enc") {
                entry.encoding_file = Some(rest.to_string());
            } else {
                entry.font_file = Some(rest.to_string());
            }
        } else if tok.starts_with('"') {
            parse_ps_ops(tok.trim_matches('"'), &mut entry);
        } else {
            entry.ps_name = Some(tok.clone());
        }
    }
    Some(entry)
}

fn parse_ps_ops(ops: &str, entry: &mut FontMapEntry) {
    let words: Vec<&str> = ops.split_whitespace().collect();
    for pair in words.windows(2) {
        if let [value, op] = pair {
            if let Ok(v) = value.parse::<f64>() {
                match *op {
                    "SlantFont" => entry.slant = Some(v),
                    "ExtendFont" => entry.extend = Some(v),
                    _ => {}
                }
            }
        }
    }
}

fn parse_dvipdfm_line(tokens: &[String]) -> Option<FontMapEntry> {
    let mut entry = FontMapEntry::new(tokens.first()?.clone());
    entry.encoding_file = Some(tokens.get(1)?.clone());
    let mut iter = tokens[2..].iter().peekable();
    while let Some(tok) = iter.next() {
        match tok.as_str() {
            "-s" => entry.slant = iter.next().and_then(|v| v.parse().ok()),
            "-e" => entry.extend = iter.next().and_then(|v| v.parse().ok()),
            "-b" => entry.bold = true,
            "-r" => {}
            "-i" => entry.ttc_index = iter.next().and_then(|v| v.parse().ok()),
            "-p" | "-u" | "-v" | "-m" | "-w" => {
                iter.next();
            }
            filename => parse_font_filename(filename, &mut entry),
        }
    }
    Some(entry)
}

fn parse_font_filename(token: &str, entry: &mut FontMapEntry) {
    let mut name = token;
    if let Some(rest) = name.strip_prefix('!') {
        entry.no_embed = true;
        name = rest;
    }
    // `file:INDEX:` selects a face within a TrueType collection.
    if let Some(colon) = name.find(':') {
        let (base, rest) = name.split_at(colon);
        if let Some(index_str) = rest.trim_start_matches(':').split(':').next() {
            if let Ok(index) = index_str.parse() {
                entry.ttc_index = Some(index);
            }
        }
        name = base;
    }
    // Strip `,Bold|Italic|BoldItalic` decorations and `/CSI`.
    let name = name.split('/').next().unwrap_or(name);
    let name = name.split(',').next().unwrap_or(name);
    entry.font_file = Some(name.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dvips_style_line() {
        let mut map = FontMap::new();
        map.load_str(r#"cmr10 CMR10 <cmr10.pfb"#, ApplyMode::Append);
        let e = map.get("cmr10").unwrap();
        assert_eq!(e.ps_name.as_deref(), Some("CMR10"));
        assert_eq!(e.font_file.as_deref(), Some("cmr10.pfb"));
    }

    #[test]
    fn dvips_style_with_ps_ops() {
        let mut map = FontMap::new();
        map.load_str(r#"foo Bar <foo.pfb "0.167 SlantFont""#, ApplyMode::Append);
        let e = map.get("foo").unwrap();
        assert_eq!(e.slant, Some(0.167));
    }

    #[test]
    fn dvipdfm_style_line() {
        let mut map = FontMap::new();
        map.load_str("foo unicode foo.ttf -s 0.2 -e 1.1 -b", ApplyMode::Append);
        let e = map.get("foo").unwrap();
        assert_eq!(e.encoding_file.as_deref(), Some("unicode"));
        assert_eq!(e.font_file.as_deref(), Some("foo.ttf"));
        assert_eq!(e.slant, Some(0.2));
        assert_eq!(e.extend, Some(1.1));
        assert!(e.bold);
    }

    #[test]
    fn comments_are_skipped() {
        let mut map = FontMap::new();
        map.load_str("# comment\n% also a comment\n; and this\n* and this", ApplyMode::Append);
        assert!(map.get("#").is_none());
    }

    #[test]
    fn append_does_not_overwrite_existing() {
        let mut map = FontMap::new();
        map.load_str("foo a.pfb", ApplyMode::Append);
        map.load_str("foo b.pfb", ApplyMode::Append);
        assert_eq!(map.get("foo").unwrap().ps_name.as_deref(), Some("a.pfb"));
    }

    #[test]
    fn locked_entry_resists_replace_and_remove() {
        let mut map = FontMap::new();
        map.load_str("foo a.pfb", ApplyMode::Append);
        map.mark_used("foo");
        map.load_str("foo b.pfb", ApplyMode::Replace);
        assert_eq!(map.get("foo").unwrap().ps_name.as_deref(), Some("a.pfb"));
        map.load_str("foo", ApplyMode::Remove);
        assert!(map.get("foo").is_some());
    }

    #[test]
    fn replace_overwrites_unlocked_entry() {
        let mut map = FontMap::new();
        map.load_str("foo a.pfb", ApplyMode::Append);
        map.load_str("foo b.pfb", ApplyMode::Replace);
        assert_eq!(map.get("foo").unwrap().ps_name.as_deref(), Some("b.pfb"));
    }
}
