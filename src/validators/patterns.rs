//! XSD regular expressions
//!
//! The pattern facet uses the XML Schema regex dialect: implicitly
//! anchored, no anchors of its own, and with the `\i`/`\c` name classes,
//! Unicode block escapes and character class subtraction. Patterns are
//! translated once, at schema compile time, to the `regex` crate syntax.

use regex::Regex;

const NAME_START: &str = r"A-Z_a-z:\x{C0}-\x{D6}\x{D8}-\x{F6}\x{F8}-\x{2FF}\x{370}-\x{37D}\x{37F}-\x{1FFF}\x{200C}-\x{200D}\x{2070}-\x{218F}\x{2C00}-\x{2FEF}\x{3001}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFFD}\x{10000}-\x{EFFFF}";
const NAME_EXTRA: &str = r"\-.0-9\x{B7}\x{300}-\x{36F}\x{203F}-\x{2040}";
const SPACE: &str = r" \t\n\r";

/// Unicode blocks addressable with `\p{IsName}`
const BLOCKS: &[(&str, u32, u32)] = &[
    ("BasicLatin", 0x0000, 0x007F),
    ("Latin-1Supplement", 0x0080, 0x00FF),
    ("LatinExtended-A", 0x0100, 0x017F),
    ("LatinExtended-B", 0x0180, 0x024F),
    ("IPAExtensions", 0x0250, 0x02AF),
    ("SpacingModifierLetters", 0x02B0, 0x02FF),
    ("CombiningDiacriticalMarks", 0x0300, 0x036F),
    ("Greek", 0x0370, 0x03FF),
    ("Cyrillic", 0x0400, 0x04FF),
    ("Armenian", 0x0530, 0x058F),
    ("Hebrew", 0x0590, 0x05FF),
    ("Arabic", 0x0600, 0x06FF),
    ("Devanagari", 0x0900, 0x097F),
    ("Thai", 0x0E00, 0x0E7F),
    ("LatinExtendedAdditional", 0x1E00, 0x1EFF),
    ("GreekExtended", 0x1F00, 0x1FFF),
    ("GeneralPunctuation", 0x2000, 0x206F),
    ("SuperscriptsandSubscripts", 0x2070, 0x209F),
    ("CurrencySymbols", 0x20A0, 0x20CF),
    ("LetterlikeSymbols", 0x2100, 0x214F),
    ("NumberForms", 0x2150, 0x218F),
    ("Arrows", 0x2190, 0x21FF),
    ("MathematicalOperators", 0x2200, 0x22FF),
    ("BoxDrawing", 0x2500, 0x257F),
    ("CJKSymbolsandPunctuation", 0x3000, 0x303F),
    ("Hiragana", 0x3040, 0x309F),
    ("Katakana", 0x30A0, 0x30FF),
    ("CJKUnifiedIdeographs", 0x4E00, 0x9FFF),
    ("HangulSyllables", 0xAC00, 0xD7A3),
    ("PrivateUse", 0xE000, 0xF8FF),
    ("AlphabeticPresentationForms", 0xFB00, 0xFB4F),
    ("HalfwidthandFullwidthForms", 0xFF00, 0xFFEF),
    ("Specials", 0xFFF0, 0xFFFF),
];

/// A compiled pattern facet value
#[derive(Debug, Clone)]
pub struct XsdPattern {
    source: String,
    regex: Regex,
}

impl XsdPattern {
    /// Translate and compile an XSD pattern
    pub fn new(source: &str) -> Result<Self, String> {
        let translated = translate(source)?;
        let regex = Regex::new(&translated)
            .map_err(|e| format!("The pattern '{}' is not a valid regular expression: {}", source, e))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// The pattern as written in the schema
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the whole value matches
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// Translate an XSD regex to an anchored `regex` crate pattern
pub fn translate(pattern: &str) -> Result<String, String> {
    let mut translator = Translator {
        chars: pattern.chars().collect(),
        pos: 0,
        source: pattern,
    };
    let body = translator.branch_sequence()?;
    Ok(format!("^(?:{})$", body))
}

struct Translator<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl Translator<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn error(&self, detail: &str) -> String {
        format!(
            "The pattern '{}' is invalid at offset {}: {}",
            self.source, self.pos, detail
        )
    }

    fn branch_sequence(&mut self) -> Result<String, String> {
        let mut out = String::new();
        while let Some(c) = self.next() {
            match c {
                '\\' => out.push_str(&self.escape()?),
                '[' => out.push_str(&self.class()?),
                '.' => out.push_str(r"[^\n\r]"),
                '^' => out.push_str(r"\^"),
                '$' => out.push_str(r"\$"),
                '(' => out.push_str("(?:"),
                ']' => return Err(self.error("unbalanced ']'")),
                other => out.push(other),
            }
        }
        Ok(out)
    }

    /// Translate the escape after a backslash
    ///
    /// Multi-character escapes become bracketed classes, which the `regex`
    /// crate also accepts nested inside another class.
    fn escape(&mut self) -> Result<String, String> {
        let c = self.next().ok_or_else(|| self.error("dangling escape"))?;
        let translated = match c {
            'i' => format!("[{}]", NAME_START),
            'I' => format!("[^{}]", NAME_START),
            'c' => format!("[{}{}]", NAME_START, NAME_EXTRA),
            'C' => format!("[^{}{}]", NAME_START, NAME_EXTRA),
            's' => format!("[{}]", SPACE),
            'S' => format!("[^{}]", SPACE),
            'd' | 'D' | 'w' | 'W' => format!("\\{}", c),
            'p' | 'P' => self.property(c == 'P')?,
            'n' | 'r' | 't' | '\\' | '|' | '.' | '-' | '^' | '?' | '*' | '+' | '{' | '}'
            | '(' | ')' | '[' | ']' => format!("\\{}", c),
            '$' => r"\$".to_string(),
            _ => return Err(self.error(&format!("unknown escape '\\{}'", c))),
        };
        Ok(translated)
    }

    fn property(&mut self, negated: bool) -> Result<String, String> {
        if self.next() != Some('{') {
            return Err(self.error("expected '{' after \\p"));
        }
        let mut name = String::new();
        loop {
            match self.next() {
                Some('}') => break,
                Some(c) => name.push(c),
                None => return Err(self.error("unterminated property name")),
            }
        }

        if let Some(block) = name.strip_prefix("Is") {
            let (_, start, end) = BLOCKS
                .iter()
                .find(|(n, _, _)| *n == block)
                .ok_or_else(|| self.error(&format!("unknown block '{}'", block)))?;
            let caret = if negated { "^" } else { "" };
            return Ok(format!("[{}\\x{{{:X}}}-\\x{{{:X}}}]", caret, start, end));
        }
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(self.error(&format!("unknown property '{}'", name)));
        }
        Ok(format!("\\{}{{{}}}", if negated { 'P' } else { 'p' }, name))
    }

    /// Translate a class; the opening '[' has been consumed
    fn class(&mut self) -> Result<String, String> {
        let mut out = String::from("[");
        if self.peek() == Some('^') {
            self.pos += 1;
            out.push('^');
        }
        let mut first = true;
        loop {
            let c = self.next().ok_or_else(|| self.error("unterminated character class"))?;
            match c {
                ']' if !first => break,
                '\\' => out.push_str(&self.escape()?),
                '-' if self.peek() == Some('[') => {
                    self.pos += 1;
                    let subtracted = self.class()?;
                    out.push_str("--");
                    out.push_str(&subtracted);
                    if self.next() != Some(']') {
                        return Err(self.error("subtraction must end the class"));
                    }
                    break;
                }
                '-' if first || self.peek() == Some(']') => out.push_str(r"\-"),
                '[' => out.push_str(r"\["),
                '&' | '~' => {
                    out.push('\\');
                    out.push(c);
                }
                '^' => out.push_str(r"\^"),
                other => out.push(other),
            }
            first = false;
        }
        out.push(']');
        Ok(out)
    }
}
