//! Line-oriented Python tokenizer. Produces a flat token stream with
//! explicit `Indent`/`Dedent`/`Newline` markers so the parser can treat
//! block structure like ordinary delimiters. Logical lines follow the
//! language rules: newlines inside brackets and after a trailing
//! backslash do not terminate the line.

use crate::parse::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    /// Identifier or keyword; the parser tells them apart.
    Name(String),
    Int(String),
    Float(String),
    Str { value: String, fstring: bool },
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

pub fn lex(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
    indents: Vec<usize>,
    depth: usize,
    at_line_start: bool,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
            indents: vec![0],
            depth: 0,
            at_line_start: true,
        }
    }

    fn cur(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn push(&mut self, tok: Tok) {
        self.tokens.push(Token {
            tok,
            line: self.line,
        });
    }

    fn err(&self, message: &str) -> ParseError {
        ParseError {
            line: self.line,
            message: message.to_string(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        while self.pos < self.chars.len() {
            if self.at_line_start && self.depth == 0 {
                self.handle_indentation()?;
                if self.pos >= self.chars.len() {
                    break;
                }
            }
            match self.cur() {
                None => break,
                Some(' ') | Some('\t') => self.pos += 1,
                Some('\r') => self.pos += 1,
                Some('\n') => {
                    self.pos += 1;
                    if self.depth == 0 {
                        self.push(Tok::Newline);
                        self.at_line_start = true;
                    }
                    self.line += 1;
                }
                Some('#') => {
                    while !matches!(self.cur(), None | Some('\n')) {
                        self.pos += 1;
                    }
                }
                Some('\\') if matches!(self.peek(1), Some('\n')) => {
                    self.pos += 2;
                    self.line += 1;
                }
                Some('\\') if matches!(self.peek(1), Some('\r')) && matches!(self.peek(2), Some('\n')) => {
                    self.pos += 3;
                    self.line += 1;
                }
                Some(c) if c == '"' || c == '\'' => self.lex_string(false, false)?,
                Some(c) if c.is_ascii_digit() => self.lex_number(),
                Some('.') if self.peek(1).is_some_and(|c| c.is_ascii_digit()) => self.lex_number(),
                Some(c) if c.is_alphabetic() || c == '_' => self.lex_name_or_prefixed_string()?,
                Some(_) => self.lex_operator()?,
            }
        }

        // Close the final logical line and any open blocks.
        if self.depth > 0 {
            return Err(self.err("unexpected end of file inside brackets"));
        }
        if !self.at_line_start {
            self.push(Tok::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent);
        }
        self.push(Tok::Eof);
        Ok(self.tokens)
    }

    /// Measure the indentation of the next non-blank, non-comment line and
    /// emit Indent/Dedent tokens against the indent stack.
    fn handle_indentation(&mut self) -> Result<(), ParseError> {
        let column = loop {
            let mut column = 0usize;
            loop {
                match self.cur() {
                    Some(' ') => {
                        column += 1;
                        self.pos += 1;
                    }
                    Some('\t') => {
                        column = column / 8 * 8 + 8;
                        self.pos += 1;
                    }
                    _ => break,
                }
            }
            match self.cur() {
                None => return Ok(()),
                Some('\r') => self.pos += 1,
                Some('\n') => {
                    self.pos += 1;
                    self.line += 1;
                }
                Some('#') => {
                    while !matches!(self.cur(), None | Some('\n')) {
                        self.pos += 1;
                    }
                }
                Some(_) => break column,
            }
        };

        let current = *self.indents.last().unwrap_or(&0);
        if column > current {
            self.indents.push(column);
            self.push(Tok::Indent);
        } else if column < current {
            while *self.indents.last().unwrap_or(&0) > column {
                self.indents.pop();
                self.push(Tok::Dedent);
            }
            if *self.indents.last().unwrap_or(&0) != column {
                return Err(self.err("unindent does not match any outer indentation level"));
            }
        }
        self.at_line_start = false;
        Ok(())
    }

    /// An identifier, unless it turns out to be a string prefix (`r"..."`,
    /// `f'...'`, `rb"..."` and friends).
    fn lex_name_or_prefixed_string(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        while self
            .cur()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();

        let is_prefix = name.len() <= 2
            && !name.is_empty()
            && name
                .chars()
                .all(|c| matches!(c.to_ascii_lowercase(), 'r' | 'b' | 'u' | 'f'));
        if is_prefix && matches!(self.cur(), Some('"') | Some('\'')) {
            let raw = name.to_ascii_lowercase().contains('r');
            let fstring = name.to_ascii_lowercase().contains('f');
            return self.lex_string(raw, fstring);
        }

        self.push(Tok::Name(name));
        Ok(())
    }

    fn lex_string(&mut self, raw: bool, fstring: bool) -> Result<(), ParseError> {
        let quote = self.cur().expect("caller checked quote");
        let triple = self.peek(1) == Some(quote) && self.peek(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut value = String::new();
        loop {
            match self.cur() {
                None => return Err(self.err("unterminated string literal")),
                Some('\n') if !triple => return Err(self.err("unterminated string literal")),
                Some('\n') => {
                    value.push('\n');
                    self.pos += 1;
                    self.line += 1;
                }
                Some('\\') => {
                    let escaped = self.peek(1).ok_or_else(|| self.err("unterminated string literal"))?;
                    if raw {
                        value.push('\\');
                        value.push(escaped);
                    } else {
                        match escaped {
                            'n' => value.push('\n'),
                            't' => value.push('\t'),
                            'r' => value.push('\r'),
                            '0' => value.push('\0'),
                            '\\' | '\'' | '"' => value.push(escaped),
                            '\n' => {} // line continuation inside the literal
                            other => {
                                value.push('\\');
                                value.push(other);
                            }
                        }
                    }
                    if escaped == '\n' {
                        self.line += 1;
                    }
                    self.pos += 2;
                }
                Some(c) if c == quote => {
                    if triple {
                        if self.peek(1) == Some(quote) && self.peek(2) == Some(quote) {
                            self.pos += 3;
                            break;
                        }
                        value.push(c);
                        self.pos += 1;
                    } else {
                        self.pos += 1;
                        break;
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
        self.push(Tok::Str { value, fstring });
        Ok(())
    }

    fn lex_number(&mut self) {
        let start = self.pos;
        let mut is_float = false;

        if self.cur() == Some('0')
            && self
                .peek(1)
                .is_some_and(|c| matches!(c.to_ascii_lowercase(), 'x' | 'o' | 'b'))
        {
            self.pos += 2;
            while self
                .cur()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                self.pos += 1;
            }
        } else {
            while self.cur().is_some_and(|c| c.is_ascii_digit() || c == '_') {
                self.pos += 1;
            }
            if self.cur() == Some('.') && self.peek(1) != Some('.') {
                is_float = true;
                self.pos += 1;
                while self.cur().is_some_and(|c| c.is_ascii_digit() || c == '_') {
                    self.pos += 1;
                }
            }
            if self.cur().is_some_and(|c| matches!(c, 'e' | 'E')) {
                let mut ahead = 1;
                if self.peek(1).is_some_and(|c| matches!(c, '+' | '-')) {
                    ahead = 2;
                }
                if self.peek(ahead).is_some_and(|c| c.is_ascii_digit()) {
                    is_float = true;
                    self.pos += ahead;
                    while self.cur().is_some_and(|c| c.is_ascii_digit() || c == '_') {
                        self.pos += 1;
                    }
                }
            }
            if self.cur().is_some_and(|c| matches!(c, 'j' | 'J')) {
                is_float = true;
                self.pos += 1;
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            self.push(Tok::Float(text));
        } else {
            self.push(Tok::Int(text));
        }
    }

    fn lex_operator(&mut self) -> Result<(), ParseError> {
        const THREE: &[&str] = &["**=", "//=", ">>=", "<<=", "..."];
        const TWO: &[&str] = &[
            "**", "//", "<<", ">>", "<=", ">=", "==", "!=", "->", ":=", "+=", "-=", "*=", "/=",
            "%=", "&=", "|=", "^=", "@=",
        ];
        const ONE: &str = "+-*/%@&|^~<>()[]{},:.;=";

        let take = |n: usize, chars: &[char], pos: usize| -> String {
            chars[pos..(pos + n).min(chars.len())].iter().collect()
        };

        let three = take(3, &self.chars, self.pos);
        if let Some(op) = THREE.iter().find(|o| **o == three) {
            let op = *op;
            self.pos += 3;
            self.push(Tok::Op(op));
            return Ok(());
        }
        let two = take(2, &self.chars, self.pos);
        if let Some(op) = TWO.iter().find(|o| **o == two) {
            let op = *op;
            self.pos += 2;
            self.push(Tok::Op(op));
            return Ok(());
        }
        let c = self.cur().expect("caller checked a char is present");
        if let Some(idx) = ONE.find(c) {
            match c {
                '(' | '[' | '{' => self.depth += 1,
                ')' | ']' | '}' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
            self.pos += 1;
            // Index into ONE to get a 'static str for the single char.
            self.push(Tok::Op(&ONE[idx..idx + c.len_utf8()]));
            return Ok(());
        }
        Err(self.err(&format!("invalid character {c:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Tok> {
        lex(source).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn simple_statement() {
        let toks = kinds("x = 1\n");
        assert_eq!(
            toks,
            vec![
                Tok::Name("x".into()),
                Tok::Op("="),
                Tok::Int("1".into()),
                Tok::Newline,
                Tok::Eof
            ]
        );
    }

    #[test]
    fn indent_and_dedent() {
        let toks = kinds("def f():\n    pass\n");
        assert!(toks.contains(&Tok::Indent));
        assert!(toks.contains(&Tok::Dedent));
    }

    #[test]
    fn blank_and_comment_lines_do_not_affect_indentation() {
        let toks = kinds("def f():\n    x = 1\n\n    # comment\n    y = 2\n");
        let indents = toks.iter().filter(|t| **t == Tok::Indent).count();
        let dedents = toks.iter().filter(|t| **t == Tok::Dedent).count();
        assert_eq!(indents, 1);
        assert_eq!(dedents, 1);
    }

    #[test]
    fn newlines_inside_brackets_are_ignored() {
        let toks = kinds("x = [\n    1,\n    2,\n]\n");
        let newlines = toks.iter().filter(|t| **t == Tok::Newline).count();
        assert_eq!(newlines, 1);
        assert!(!toks.contains(&Tok::Indent));
    }

    #[test]
    fn backslash_continuation() {
        let toks = kinds("x = 1 + \\\n    2\n");
        let newlines = toks.iter().filter(|t| **t == Tok::Newline).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn triple_quoted_string_spans_lines() {
        let toks = kinds("s = \"\"\"a\nb\"\"\"\n");
        assert!(toks.iter().any(|t| matches!(
            t,
            Tok::Str { value, .. } if value == "a\nb"
        )));
    }

    #[test]
    fn string_prefixes() {
        let toks = kinds("a = r'\\d+'\nb = f'{x}'\n");
        assert!(toks.iter().any(|t| matches!(
            t,
            Tok::Str { value, fstring: false } if value == "\\d+"
        )));
        assert!(toks
            .iter()
            .any(|t| matches!(t, Tok::Str { fstring: true, .. })));
    }

    #[test]
    fn escapes_are_cooked() {
        let toks = kinds("s = 'a\\nb'\n");
        assert!(toks.iter().any(|t| matches!(
            t,
            Tok::Str { value, .. } if value == "a\nb"
        )));
    }

    #[test]
    fn operators_longest_match() {
        let toks = kinds("x **= 2 ** 3 != 4\n");
        assert!(toks.contains(&Tok::Op("**=")));
        assert!(toks.contains(&Tok::Op("**")));
        assert!(toks.contains(&Tok::Op("!=")));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(lex("s = 'oops\n").is_err());
    }

    #[test]
    fn unbalanced_bracket_is_an_error() {
        assert!(lex("x = (1, 2\n").is_err());
    }

    #[test]
    fn bad_dedent_is_an_error() {
        assert!(lex("def f():\n    x = 1\n  y = 2\n").is_err());
    }

    #[test]
    fn line_numbers_track_physical_lines() {
        let tokens = lex("a = 1\nb = 2\n").unwrap();
        let b = tokens
            .iter()
            .find(|t| matches!(&t.tok, Tok::Name(n) if n == "b"))
            .unwrap();
        assert_eq!(b.line, 2);
    }
}
