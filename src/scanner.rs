// Quill compiler lexical analyzer
// Created by: Zimeng Li <zimengli@mail.nwpu.edu.cn>
//
// Changelog:
//      26-02-10: Initial version, zero-copy over the source buffer.
//      26-02-13: Keyword trie switched over to the Language's own keyword
//                set (the Lua reserved words are gone; `ego` and `super`
//                took their place).

use crate::token::{Token, TokenType};

/// Stateful cursor over the source. `start` marks the beginning of the
/// lexeme currently being scanned, `current` the next byte to consume.
/// Tokens are produced lazily, one per `next_token` call.
pub struct Scanner<'src> {
    source: &'src str,
    bytes: &'src [u8],
    start: usize,
    current: usize,
    line: u32,
}

impl<'src> Scanner<'src> {
    pub fn new(source: &'src str) -> Self {
        Scanner {
            source,
            bytes: source.as_bytes(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    pub fn next_token(&mut self) -> Token<'src> {
        self.skip_whitespace_and_comments();
        self.start = self.current;

        if self.is_at_end() {
            return self.make(TokenType::Eof);
        }

        let c = self.advance();

        if is_alpha(c) {
            return self.identifier();
        }
        if c.is_ascii_digit() {
            return self.number();
        }

        match c {
            '(' => self.make(TokenType::LeftParen),
            ')' => self.make(TokenType::RightParen),
            '{' => self.make(TokenType::LeftBrace),
            '}' => self.make(TokenType::RightBrace),
            ';' => self.make(TokenType::Semicolon),
            ',' => self.make(TokenType::Comma),
            '.' => self.make(TokenType::Dot),
            '-' => self.make(TokenType::Minus),
            '+' => self.make(TokenType::Plus),
            '/' => self.make(TokenType::Slash),
            '*' => self.make(TokenType::Star),
            '!' => {
                let kind = if self.matches('=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                };
                self.make(kind)
            }
            '=' => {
                let kind = if self.matches('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.make(kind)
            }
            '<' => {
                let kind = if self.matches('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.make(kind)
            }
            '>' => {
                let kind = if self.matches('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.make(kind)
            }
            '"' => self.string(),
            _ => self.error_token("Unexpected character."),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            if self.is_at_end() {
                return;
            }
            match self.peek() {
                ' ' | '\r' | '\t' => {
                    self.advance();
                }
                '\n' => {
                    self.line += 1;
                    self.advance();
                }
                '/' if self.peek_next() == Some('/') => {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn string(&mut self) -> Token<'src> {
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }
        if self.is_at_end() {
            return self.error_token("Unterminated string.");
        }
        self.advance(); // closing quote
        self.make(TokenType::StringLit)
    }

    fn number(&mut self) -> Token<'src> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == '.' && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        self.make(TokenType::Number)
    }

    fn identifier(&mut self) -> Token<'src> {
        while is_alpha(self.peek()) || self.peek().is_ascii_digit() {
            self.advance();
        }
        let text = &self.source[self.start..self.current];
        self.make(keyword_type(text))
    }

    fn make(&self, kind: TokenType) -> Token<'src> {
        Token {
            kind,
            lexeme: &self.source[self.start..self.current],
            line: self.line,
        }
    }

    fn error_token(&self, message: &'static str) -> Token<'src> {
        Token {
            kind: TokenType::Error,
            lexeme: message,
            line: self.line,
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.bytes.len()
    }

    fn advance(&mut self) -> char {
        let c = self.bytes[self.current] as char;
        self.current += 1;
        c
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.bytes[self.current] as char != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.bytes[self.current] as char
        }
    }

    fn peek_next(&self) -> Option<char> {
        self.bytes.get(self.current + 1).map(|&b| b as char)
    }
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Hand-rolled trie switch over the first character, falling through to
/// `Identifier` on any mismatch. Mirrors the dispatch shape of a
/// hand-written lexer rather than a generic string->keyword map lookup.
fn keyword_type(text: &str) -> TokenType {
    let mut chars = text.chars();
    match chars.next() {
        Some('a') => check_keyword(text, "and", TokenType::And),
        Some('c') => check_keyword(text, "class", TokenType::Class),
        Some('e') => {
            if text == "else" {
                TokenType::Else
            } else if text == "ego" {
                TokenType::Ego
            } else {
                TokenType::Identifier
            }
        }
        Some('f') => {
            if text.len() > 1 {
                match text.as_bytes()[1] as char {
                    'a' => check_keyword(text, "false", TokenType::False),
                    'o' => check_keyword(text, "for", TokenType::For),
                    'u' => check_keyword(text, "fun", TokenType::Fun),
                    _ => TokenType::Identifier,
                }
            } else {
                TokenType::Identifier
            }
        }
        Some('i') => check_keyword(text, "if", TokenType::If),
        Some('n') => check_keyword(text, "nil", TokenType::Nil),
        Some('o') => check_keyword(text, "or", TokenType::Or),
        Some('p') => check_keyword(text, "print", TokenType::Print),
        Some('r') => check_keyword(text, "return", TokenType::Return),
        Some('s') => check_keyword(text, "super", TokenType::Super),
        Some('t') => check_keyword(text, "true", TokenType::True),
        Some('v') => check_keyword(text, "var", TokenType::Var),
        Some('w') => check_keyword(text, "while", TokenType::While),
        _ => TokenType::Identifier,
    }
}

fn check_keyword(text: &str, keyword: &str, kind: TokenType) -> TokenType {
    if text == keyword {
        kind
    } else {
        TokenType::Identifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(src: &str) -> Vec<TokenType> {
        let mut scanner = Scanner::new(src);
        let mut out = Vec::new();
        loop {
            let tok = scanner.next_token();
            let done = tok.kind == TokenType::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn scans_punctuation_and_keywords() {
        let kinds = scan_all("var x = 1 + 2; // comment\nprint x;");
        assert_eq!(
            kinds,
            vec![
                TokenType::Var,
                TokenType::Identifier,
                TokenType::Equal,
                TokenType::Number,
                TokenType::Plus,
                TokenType::Number,
                TokenType::Semicolon,
                TokenType::Print,
                TokenType::Identifier,
                TokenType::Semicolon,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn tracks_line_numbers_across_string_literals() {
        let mut scanner = Scanner::new("\"a\nb\" 1");
        let s = scanner.next_token();
        assert_eq!(s.kind, TokenType::StringLit);
        let n = scanner.next_token();
        assert_eq!(n.line, 2);
    }

    #[test]
    fn unterminated_string_is_an_error_token() {
        let mut scanner = Scanner::new("\"oops");
        let tok = scanner.next_token();
        assert_eq!(tok.kind, TokenType::Error);
        assert_eq!(tok.lexeme, "Unterminated string.");
    }

    #[test]
    fn recognizes_ego_and_super() {
        let kinds = scan_all("ego.x super.y");
        assert_eq!(
            kinds,
            vec![
                TokenType::Ego,
                TokenType::Dot,
                TokenType::Identifier,
                TokenType::Super,
                TokenType::Dot,
                TokenType::Identifier,
                TokenType::Eof,
            ]
        );
    }
}
