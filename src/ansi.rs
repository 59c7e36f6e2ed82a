//! ANSI SGR decoding into per-character display attributes.
//!
//! Log payloads frequently carry color escapes. The fetcher decodes each raw
//! line into an [`AttrString`]: the visible characters plus one [`CharAttr`]
//! per character. Escape bytes never reach the character array; unsupported
//! CSI sequences are consumed and dropped. Invalid UTF-8 becomes replacement
//! characters.

/// Color as expressed by SGR parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnsiColor {
    /// Terminal default.
    #[default]
    Default,
    /// 3-bit base palette, 0..=7.
    Base(u8),
    /// Bright variant of the base palette, 0..=7.
    Bright(u8),
    /// 256-color palette index (from `38;5;n` / `48;5;n`).
    Indexed(u8),
}

/// Display attributes attached to a single character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharAttr {
    pub fg: AnsiColor,
    pub bg: AnsiColor,
    pub bold: bool,
    pub underline: bool,
    pub reverse: bool,
}

/// A decoded line: characters and their attributes, index for index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrString {
    pub chars: Vec<char>,
    pub attrs: Vec<CharAttr>,
}

impl AttrString {
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

/// Decode one raw line (without its trailing newline) into characters and
/// attributes, interpreting SGR sequences along the way.
pub fn decode(bytes: &[u8]) -> AttrString {
    let text = String::from_utf8_lossy(bytes);
    let mut out = AttrString {
        chars: Vec::with_capacity(text.len()),
        attrs: Vec::with_capacity(text.len()),
    };
    let mut attr = CharAttr::default();

    let mut iter = text.chars().peekable();
    while let Some(ch) = iter.next() {
        if ch != '\u{1b}' {
            out.chars.push(ch);
            out.attrs.push(attr);
            continue;
        }
        match iter.peek() {
            Some('[') => {
                iter.next();
                let mut params = String::new();
                let mut terminator = None;
                for c in iter.by_ref() {
                    // Parameter and intermediate bytes accumulate; the final
                    // byte of a CSI sequence is in 0x40..=0x7e.
                    if ('\u{40}'..='\u{7e}').contains(&c) {
                        terminator = Some(c);
                        break;
                    }
                    params.push(c);
                }
                if terminator == Some('m') {
                    apply_sgr(&mut attr, &params);
                }
            }
            // A bare escape (or a non-CSI sequence introducer) is dropped.
            _ => {}
        }
    }
    out
}

fn apply_sgr(attr: &mut CharAttr, params: &str) {
    let mut codes = params
        .split(';')
        .map(|p| p.parse::<u16>().unwrap_or(0))
        .collect::<Vec<_>>();
    if codes.is_empty() {
        codes.push(0);
    }

    let mut i = 0;
    while i < codes.len() {
        match codes[i] {
            0 => *attr = CharAttr::default(),
            1 => attr.bold = true,
            4 => attr.underline = true,
            7 => attr.reverse = true,
            22 => attr.bold = false,
            24 => attr.underline = false,
            27 => attr.reverse = false,
            30..=37 => attr.fg = AnsiColor::Base((codes[i] - 30) as u8),
            39 => attr.fg = AnsiColor::Default,
            40..=47 => attr.bg = AnsiColor::Base((codes[i] - 40) as u8),
            49 => attr.bg = AnsiColor::Default,
            90..=97 => attr.fg = AnsiColor::Bright((codes[i] - 90) as u8),
            100..=107 => attr.bg = AnsiColor::Bright((codes[i] - 100) as u8),
            38 | 48 => {
                // 256-color form: {38|48};5;n. Truecolor (;2;r;g;b) is
                // consumed but mapped to the default color.
                let target_fg = codes[i] == 38;
                if codes.get(i + 1) == Some(&5) {
                    if let Some(&n) = codes.get(i + 2) {
                        let color = AnsiColor::Indexed(n.min(255) as u8);
                        if target_fg {
                            attr.fg = color;
                        } else {
                            attr.bg = color;
                        }
                    }
                    i += 2;
                } else if codes.get(i + 1) == Some(&2) {
                    i += 4;
                }
            }
            _ => {}
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn plain_text_gets_default_attrs() {
        let decoded = decode(b"hello");
        assert_eq!(decoded.chars, plain("hello"));
        assert!(decoded.attrs.iter().all(|a| *a == CharAttr::default()));
    }

    #[test]
    fn escape_bytes_are_stripped() {
        let decoded = decode(b"\x1b[31mred\x1b[0m plain");
        assert_eq!(decoded.chars, plain("red plain"));
    }

    #[test]
    fn sgr_state_recovers_per_char() {
        let decoded = decode(b"a\x1b[31;1mb\x1b[0mc");
        assert_eq!(decoded.chars, plain("abc"));

        assert_eq!(decoded.attrs[0], CharAttr::default());
        assert_eq!(decoded.attrs[1].fg, AnsiColor::Base(1));
        assert!(decoded.attrs[1].bold);
        assert_eq!(decoded.attrs[2], CharAttr::default());
    }

    #[test]
    fn background_and_bright_colors() {
        let decoded = decode(b"\x1b[44mx\x1b[93my");
        assert_eq!(decoded.attrs[0].bg, AnsiColor::Base(4));
        assert_eq!(decoded.attrs[1].fg, AnsiColor::Bright(3));
        // The background persists until reset.
        assert_eq!(decoded.attrs[1].bg, AnsiColor::Base(4));
    }

    #[test]
    fn indexed_256_colors() {
        let decoded = decode(b"\x1b[38;5;208mx\x1b[48;5;17my");
        assert_eq!(decoded.attrs[0].fg, AnsiColor::Indexed(208));
        assert_eq!(decoded.attrs[1].bg, AnsiColor::Indexed(17));
    }

    #[test]
    fn attribute_toggles() {
        let decoded = decode(b"\x1b[4ma\x1b[24m\x1b[7mb\x1b[27mc");
        assert!(decoded.attrs[0].underline);
        assert!(!decoded.attrs[1].underline);
        assert!(decoded.attrs[1].reverse);
        assert!(!decoded.attrs[2].reverse);
    }

    #[test]
    fn unsupported_csi_sequences_are_dropped() {
        let decoded = decode(b"a\x1b[2Kb\x1b[10;20Hc");
        assert_eq!(decoded.chars, plain("abc"));
        assert!(decoded.attrs.iter().all(|a| *a == CharAttr::default()));
    }

    #[test]
    fn invalid_utf8_becomes_replacement_chars() {
        let decoded = decode(b"ok\xff\xfe!");
        assert_eq!(decoded.chars[0], 'o');
        assert_eq!(decoded.chars[1], 'k');
        assert!(decoded.chars[2..4].iter().all(|&c| c == '\u{fffd}'));
        assert_eq!(decoded.chars[4], '!');
    }

    #[test]
    fn empty_input() {
        let decoded = decode(b"");
        assert!(decoded.is_empty());
        assert_eq!(decoded.len(), 0);
    }
}
