//! Lexical scanner for TSQL.
//!
//! The scanner reads runes from a buffered [`Reader`] and produces
//! `(Pos, Token, String)` triples. Regular expressions need their own scan
//! entry point because `/` is ambiguous between division and the start of a
//! regex literal, so the parser calls [`Scanner::scan_regex`] only where a
//! regex is grammatically possible.

use crate::token::{is_digit, is_ident_char, is_letter, is_whitespace, Pos, Token};

/// Marker code point signifying that the reader can't read any more.
pub const EOF_CHAR: char = '\0';

//=============================================================================
// Rune reader
//=============================================================================

/// A buffered rune reader with a fixed 3-slot unread ring.
///
/// Carriage returns are normalized away: `\r\n` and a lone `\r` both read as
/// a single `\n`. Once EOF has been returned it is sticky and the character
/// position stops advancing.
pub struct Reader {
    runes: Vec<char>,
    idx: usize,
    i: usize, // ring index
    n: usize, // unread count
    pos: Pos,
    buf: [(char, Pos); 3],
    eof: bool,
}

impl Reader {
    pub fn new(input: &str) -> Reader {
        Reader {
            runes: input.chars().collect(),
            idx: 0,
            i: 0,
            n: 0,
            pos: Pos::default(),
            buf: [(EOF_CHAR, Pos::default()); 3],
            eof: false,
        }
    }

    /// Reads the next rune, replaying unread runes first.
    pub fn read(&mut self) -> (char, Pos) {
        if self.n > 0 {
            self.n -= 1;
            return self.curr();
        }

        let mut ch = match self.runes.get(self.idx) {
            Some(&c) => {
                self.idx += 1;
                c
            }
            None => EOF_CHAR,
        };
        if ch == '\r' {
            // Normalize to a newline; swallow a following '\n' but leave any
            // other rune for the next read.
            if self.runes.get(self.idx) == Some(&'\n') {
                self.idx += 1;
            }
            ch = '\n';
        }

        self.i = (self.i + 1) % self.buf.len();
        self.buf[self.i] = (ch, self.pos);

        if ch == '\n' {
            self.pos.line += 1;
            self.pos.char = 0;
        } else if !self.eof {
            self.pos.char += 1;
        }
        if ch == EOF_CHAR {
            self.eof = true;
        }

        self.curr()
    }

    /// Pushes the previously read rune back onto the buffer.
    pub fn unread(&mut self) {
        self.n += 1;
    }

    /// Returns the last read rune and its position.
    pub fn curr(&self) -> (char, Pos) {
        let i = (self.i + self.buf.len() - self.n) % self.buf.len();
        self.buf[i]
    }
}

//=============================================================================
// Scanner
//=============================================================================

/// A lexical scanner over a rune reader.
pub struct Scanner {
    pub(crate) r: Reader,
}

impl Scanner {
    pub fn new(input: &str) -> Scanner {
        Scanner {
            r: Reader::new(input),
        }
    }

    /// Returns the next token and its starting position. The literal text is
    /// populated for identifiers, numbers, durations, strings, regexes and
    /// bound parameters, and empty otherwise.
    pub fn scan(&mut self) -> (Pos, Token, String) {
        let (ch0, pos) = self.r.read();

        if is_whitespace(ch0) {
            return self.scan_whitespace();
        } else if is_letter(ch0) || ch0 == '_' {
            self.r.unread();
            return self.scan_ident(true);
        } else if is_digit(ch0) {
            return self.scan_number();
        }

        match ch0 {
            EOF_CHAR => (pos, Token::Eof, String::new()),
            '"' => {
                self.r.unread();
                self.scan_ident(true)
            }
            '\'' => self.scan_string_tok(),
            '.' => {
                let (ch1, _) = self.r.read();
                self.r.unread();
                if is_digit(ch1) {
                    self.scan_number()
                } else {
                    (pos, Token::Dot, String::new())
                }
            }
            '$' => {
                let (_, tok, lit) = self.scan_ident(false);
                if tok != Token::Ident {
                    return (pos, tok, format!("${}", lit));
                }
                (pos, Token::BoundParam, format!("${}", lit))
            }
            '+' => (pos, Token::Add, String::new()),
            '-' => {
                let (ch1, _) = self.r.read();
                if ch1 == '-' {
                    self.skip_until_newline();
                    return (pos, Token::Comment, String::new());
                }
                self.r.unread();
                (pos, Token::Sub, String::new())
            }
            '*' => (pos, Token::Mul, String::new()),
            '/' => {
                let (ch1, _) = self.r.read();
                if ch1 == '*' {
                    if self.skip_until_end_comment().is_err() {
                        return (pos, Token::Illegal, String::new());
                    }
                    return (pos, Token::Comment, String::new());
                }
                self.r.unread();
                (pos, Token::Div, String::new())
            }
            '%' => (pos, Token::Mod, String::new()),
            '&' => (pos, Token::BitAnd, String::new()),
            '|' => (pos, Token::BitOr, String::new()),
            '^' => (pos, Token::BitXor, String::new()),
            '=' => {
                let (ch1, _) = self.r.read();
                if ch1 == '~' {
                    return (pos, Token::EqRegex, String::new());
                }
                self.r.unread();
                (pos, Token::Eq, String::new())
            }
            '!' => {
                let (ch1, _) = self.r.read();
                if ch1 == '=' {
                    return (pos, Token::Neq, String::new());
                } else if ch1 == '~' {
                    return (pos, Token::NeqRegex, String::new());
                }
                self.r.unread();
                (pos, Token::Illegal, "!".to_string())
            }
            '>' => {
                let (ch1, _) = self.r.read();
                if ch1 == '=' {
                    return (pos, Token::Gte, String::new());
                }
                self.r.unread();
                (pos, Token::Gt, String::new())
            }
            '<' => {
                let (ch1, _) = self.r.read();
                if ch1 == '=' {
                    return (pos, Token::Lte, String::new());
                } else if ch1 == '>' {
                    return (pos, Token::Neq, String::new());
                }
                self.r.unread();
                (pos, Token::Lt, String::new())
            }
            '(' => (pos, Token::LParen, String::new()),
            ')' => (pos, Token::RParen, String::new()),
            ',' => (pos, Token::Comma, String::new()),
            ';' => (pos, Token::Semicolon, String::new()),
            ':' => {
                let (ch1, _) = self.r.read();
                if ch1 == ':' {
                    return (pos, Token::DoubleColon, String::new());
                }
                self.r.unread();
                (pos, Token::Colon, String::new())
            }
            _ => (pos, Token::Illegal, ch0.to_string()),
        }
    }

    /// Scans a regex literal of the form `/…/` with `\/` as the only escape;
    /// other backslashes pass through verbatim.
    pub fn scan_regex(&mut self) -> (Pos, Token, String) {
        let (_, pos) = self.r.curr();

        match scan_delimited(&mut self.r, '/', '/', &[('/', '/')], true) {
            Ok(lit) => (pos, Token::Regex, lit),
            Err(DelimitedError::BadEscape(_)) => {
                let (_, pos) = self.r.curr();
                (pos, Token::BadEscape, String::new())
            }
            Err(_) => (pos, Token::BadRegex, String::new()),
        }
    }

    // Consumes the current rune and all contiguous whitespace.
    fn scan_whitespace(&mut self) -> (Pos, Token, String) {
        let (ch, pos) = self.r.curr();
        let mut buf = String::new();
        buf.push(ch);

        loop {
            let (ch, _) = self.r.read();
            if ch == EOF_CHAR {
                break;
            } else if !is_whitespace(ch) {
                self.r.unread();
                break;
            }
            buf.push(ch);
        }

        (pos, Token::Ws, buf)
    }

    fn skip_until_newline(&mut self) {
        loop {
            let (ch, _) = self.r.read();
            if ch == '\n' || ch == EOF_CHAR {
                return;
            }
        }
    }

    // Skips until a terminating `*/`; an unterminated comment is an error.
    fn skip_until_end_comment(&mut self) -> Result<(), ()> {
        loop {
            let (ch1, _) = self.r.read();
            if ch1 == '*' {
                loop {
                    let (ch2, _) = self.r.read();
                    if ch2 == '/' {
                        return Ok(());
                    } else if ch2 == EOF_CHAR {
                        return Err(());
                    } else if ch2 != '*' {
                        break;
                    }
                }
            } else if ch1 == EOF_CHAR {
                return Err(());
            }
        }
    }

    fn scan_ident(&mut self, lookup: bool) -> (Pos, Token, String) {
        let (_, pos) = self.r.read();
        self.r.unread();

        let mut buf = String::new();
        loop {
            let (ch, _) = self.r.read();
            if ch == EOF_CHAR {
                break;
            } else if ch == '"' {
                let (pos0, tok0, lit0) = self.scan_string_tok();
                if tok0 == Token::BadString || tok0 == Token::BadEscape {
                    return (pos0, tok0, lit0);
                }
                return (pos, Token::Ident, lit0);
            } else if is_ident_char(ch) {
                self.r.unread();
                buf.push_str(&scan_bare_ident(&mut self.r));
            } else {
                self.r.unread();
                break;
            }
        }

        if lookup {
            let tok = Token::lookup(&buf);
            if tok != Token::Ident {
                return (pos, tok, String::new());
            }
        }
        (pos, Token::Ident, buf)
    }

    // Scans a quoted string token; the opening quote is the current rune.
    fn scan_string_tok(&mut self) -> (Pos, Token, String) {
        self.r.unread();
        let (_, pos) = self.r.curr();

        match scan_string(&mut self.r) {
            Ok(lit) => (pos, Token::String, lit),
            Err(StringError::Bad(lit)) => (pos, Token::BadString, lit),
            Err(StringError::Escape(lit)) => {
                let (_, pos) = self.r.curr();
                (pos, Token::BadEscape, lit)
            }
        }
    }

    // Consumes anything that looks like the start of a number: an integer, a
    // float, or a duration with trailing unit letters.
    fn scan_number(&mut self) -> (Pos, Token, String) {
        let mut buf = String::new();

        let (ch, pos) = self.r.curr();
        if ch == '.' {
            let (ch1, _) = self.r.read();
            self.r.unread();
            if !is_digit(ch1) {
                return (pos, Token::Illegal, ".".to_string());
            }
            // Unread the full stop so the digit loop picks it up.
            self.r.unread();
        } else {
            self.r.unread();
        }

        buf.push_str(&self.scan_digits());

        // If the next code points are a full stop and a digit, consume them.
        let mut is_decimal = false;
        let (ch0, _) = self.r.read();
        if ch0 == '.' {
            is_decimal = true;
            let (ch1, _) = self.r.read();
            if is_digit(ch1) {
                buf.push(ch0);
                buf.push(ch1);
                buf.push_str(&self.scan_digits());
            } else {
                self.r.unread();
            }
        } else {
            self.r.unread();
        }

        if !is_decimal {
            // A trailing letter turns this into a duration token.
            let (ch0, _) = self.r.read();
            if is_letter(ch0) || ch0 == 'µ' {
                buf.push(ch0);
                loop {
                    let (ch1, _) = self.r.read();
                    if !is_letter(ch1) && ch1 != 'µ' {
                        self.r.unread();
                        break;
                    }
                    buf.push(ch1);
                }
                // Keep reading letters and digits as part of this token.
                loop {
                    let (ch0, _) = self.r.read();
                    if is_letter(ch0) || ch0 == 'µ' || is_digit(ch0) {
                        buf.push(ch0);
                    } else {
                        self.r.unread();
                        break;
                    }
                }
                return (pos, Token::Duration, buf);
            }
            self.r.unread();
            return (pos, Token::Integer, buf);
        }
        (pos, Token::Number, buf)
    }

    fn scan_digits(&mut self) -> String {
        let mut buf = String::new();
        loop {
            let (ch, _) = self.r.read();
            if !is_digit(ch) {
                self.r.unread();
                break;
            }
            buf.push(ch);
        }
        buf
    }
}

//=============================================================================
// Buffered scanner
//=============================================================================

/// Wraps a scanner with a fixed 3-slot token ring so the parser can push
/// back up to two previously scanned tokens.
pub struct BufScanner {
    s: Scanner,
    i: usize, // ring index
    n: usize, // unscanned count
    buf: [(Pos, Token, String); 3],
}

impl BufScanner {
    pub fn new(input: &str) -> BufScanner {
        BufScanner {
            s: Scanner::new(input),
            i: 0,
            n: 0,
            buf: Default::default(),
        }
    }

    /// Reads the next token, replaying unscanned tokens first.
    pub fn scan(&mut self) -> (Pos, Token, String) {
        self.scan_with(false)
    }

    /// Reads a regex token, replaying unscanned tokens first.
    pub fn scan_regex(&mut self) -> (Pos, Token, String) {
        self.scan_with(true)
    }

    fn scan_with(&mut self, regex: bool) -> (Pos, Token, String) {
        if self.n > 0 {
            self.n -= 1;
            return self.curr();
        }

        self.i = (self.i + 1) % self.buf.len();
        self.buf[self.i] = if regex {
            self.s.scan_regex()
        } else {
            self.s.scan()
        };

        self.curr()
    }

    /// Returns the next rune without consuming it, bypassing the token ring.
    pub fn peek(&mut self) -> char {
        let (ch, _) = self.s.r.read();
        if ch != EOF_CHAR {
            self.s.r.unread();
        }
        ch
    }

    /// Pushes the previously scanned token back onto the buffer.
    pub fn unscan(&mut self) {
        self.n += 1;
    }

    fn curr(&self) -> (Pos, Token, String) {
        let (pos, tok, ref lit) = self.buf[(self.i + self.buf.len() - self.n) % self.buf.len()];
        (pos, tok, lit.clone())
    }
}

//=============================================================================
// Low-level scanning helpers
//=============================================================================

/// Error from [`scan_string`]; both variants carry the literal text read so
/// far (the two-character escape sequence for `Escape`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringError {
    Bad(String),
    Escape(String),
}

/// Reads a quoted string from the reader. The delimiter is the first rune
/// read; `\n`, `\\`, `\"` and `\'` are the recognized escapes.
pub fn scan_string(r: &mut Reader) -> Result<String, StringError> {
    let (ending, _) = r.read();
    if ending == EOF_CHAR {
        return Err(StringError::Bad(String::new()));
    }

    let mut buf = String::new();
    loop {
        let (ch0, _) = r.read();
        if ch0 == ending {
            return Ok(buf);
        } else if ch0 == EOF_CHAR || ch0 == '\n' {
            return Err(StringError::Bad(buf));
        } else if ch0 == '\\' {
            let (ch1, _) = r.read();
            match ch1 {
                'n' => buf.push('\n'),
                '\\' => buf.push('\\'),
                '"' => buf.push('"'),
                '\'' => buf.push('\''),
                _ => return Err(StringError::Escape(format!("{}{}", ch0, ch1))),
            }
        } else {
            buf.push(ch0);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelimitedError {
    /// The first rune was not the start delimiter.
    MissingStart(char),
    /// A bare newline appeared before the end delimiter.
    NewLine,
    /// The input ended before the end delimiter.
    Eof,
    /// An unknown escape, when escapes do not pass through.
    BadEscape(String),
}

/// Reads a delimited run of runes. Escapes listed in `escapes` are replaced;
/// unknown escapes either pass through verbatim (`escapes_pass_thru`) or
/// fail.
pub fn scan_delimited(
    r: &mut Reader,
    start: char,
    end: char,
    escapes: &[(char, char)],
    escapes_pass_thru: bool,
) -> Result<String, DelimitedError> {
    let (ch, _) = r.read();
    if ch != start {
        return Err(DelimitedError::MissingStart(ch));
    }

    let mut buf = String::new();
    loop {
        let (ch0, _) = r.read();
        if ch0 == end {
            return Ok(buf);
        } else if ch0 == EOF_CHAR {
            return Err(DelimitedError::Eof);
        } else if ch0 == '\n' {
            return Err(DelimitedError::NewLine);
        } else if ch0 == '\\' {
            let (ch1, _) = r.read();
            if ch1 == EOF_CHAR {
                return Err(DelimitedError::Eof);
            }
            match escapes.iter().find(|&&(from, _)| from == ch1) {
                Some(&(_, to)) => buf.push(to),
                None if escapes_pass_thru => {
                    r.unread();
                    buf.push(ch0);
                }
                None => return Err(DelimitedError::BadEscape(format!("{}{}", ch0, ch1))),
            }
        } else {
            buf.push(ch0);
        }
    }
}

/// Reads a bare identifier from the reader.
pub fn scan_bare_ident(r: &mut Reader) -> String {
    let mut buf = String::new();
    loop {
        let (ch, _) = r.read();
        if ch == EOF_CHAR {
            break;
        } else if !is_ident_char(ch) {
            r.unread();
            break;
        }
        buf.push(ch);
    }
    buf
}
