use crate::diagnostics::Diagnostic;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
    True,
    False,
    Null,
    Await,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Keyword(Keyword),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    DoubleAmpersand,
    DoublePipe,
    Bang,
    BangEqual,
    EqualEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text, or the decoded contents for string literals.
    pub lexeme: String,
    /// Byte offset into the expression text.
    pub offset: usize,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current: 0,
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((idx, ch)) = next {
            self.current = idx + ch.len_utf8();
        }
        next
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn match_next(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn identifier_or_keyword(&mut self, start: usize) -> Token {
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let lexeme = self.source[start..self.current].to_string();
        let kind = keyword_for(&lexeme).unwrap_or(TokenKind::Identifier);
        Token {
            kind,
            lexeme,
            offset: start,
        }
    }

    fn number_literal(&mut self, start: usize) -> Token {
        let mut seen_dot = false;
        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' => {
                    self.bump();
                }
                '.' if !seen_dot => {
                    seen_dot = true;
                    self.bump();
                }
                'e' | 'E' => {
                    self.bump();
                    if let Some('+' | '-') = self.peek() {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        Token {
            kind: TokenKind::Number,
            lexeme: self.source[start..self.current].to_string(),
            offset: start,
        }
    }

    fn string_literal(&mut self, start: usize, quote: char) -> Result<Token, Diagnostic> {
        let mut value = String::new();
        while let Some((_, ch)) = self.bump() {
            match ch {
                c if c == quote => {
                    return Ok(Token {
                        kind: TokenKind::String,
                        lexeme: value,
                        offset: start,
                    });
                }
                '\\' => {
                    let Some((_, esc)) = self.bump() else {
                        break;
                    };
                    match esc {
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        'u' => value.push(self.unicode_escape(start)?),
                        other => value.push(other),
                    }
                }
                _ => value.push(ch),
            }
        }
        Err(Diagnostic::parse(format!(
            "unterminated string literal at column {}",
            start + 1
        )))
    }

    fn unicode_escape(&mut self, start: usize) -> Result<char, Diagnostic> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self
                .bump()
                .and_then(|(_, ch)| ch.to_digit(16))
                .ok_or_else(|| {
                    Diagnostic::parse(format!(
                        "invalid \\u escape in string at column {}",
                        start + 1
                    ))
                })?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(|| {
            Diagnostic::parse(format!("invalid \\u escape in string at column {}", start + 1))
        })
    }

    fn simple_token(&self, start: usize, kind: TokenKind) -> Token {
        Token {
            kind,
            lexeme: self.source[start..self.current].to_string(),
            offset: start,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some((start, ch)) = self.bump() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    lexeme: String::new(),
                    offset: self.current,
                });
                break;
            };

            let token = match ch {
                c if c.is_alphabetic() || c == '_' => self.identifier_or_keyword(start),
                '0'..='9' => self.number_literal(start),
                '.' if matches!(self.peek(), Some('0'..='9')) => self.number_literal(start),
                '"' | '\'' => self.string_literal(start, ch)?,
                '(' => self.simple_token(start, TokenKind::LParen),
                ')' => self.simple_token(start, TokenKind::RParen),
                '[' => self.simple_token(start, TokenKind::LBracket),
                ']' => self.simple_token(start, TokenKind::RBracket),
                ',' => self.simple_token(start, TokenKind::Comma),
                '+' => self.simple_token(start, TokenKind::Plus),
                '-' => self.simple_token(start, TokenKind::Minus),
                '*' => self.simple_token(start, TokenKind::Star),
                '/' => self.simple_token(start, TokenKind::Slash),
                '%' => self.simple_token(start, TokenKind::Percent),
                '=' if self.match_next('=') => {
                    self.match_next('=');
                    self.simple_token(start, TokenKind::EqualEqual)
                }
                '!' => {
                    if self.match_next('=') {
                        self.match_next('=');
                        self.simple_token(start, TokenKind::BangEqual)
                    } else {
                        self.simple_token(start, TokenKind::Bang)
                    }
                }
                '&' if self.match_next('&') => self.simple_token(start, TokenKind::DoubleAmpersand),
                '|' if self.match_next('|') => self.simple_token(start, TokenKind::DoublePipe),
                '<' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::LessEqual)
                    } else {
                        self.simple_token(start, TokenKind::Less)
                    }
                }
                '>' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::GreaterEqual)
                    } else {
                        self.simple_token(start, TokenKind::Greater)
                    }
                }
                other => {
                    return Err(Diagnostic::parse(format!(
                        "unexpected character `{other}` at column {}",
                        start + 1
                    )));
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn keyword_for(ident: &str) -> Option<TokenKind> {
    let keyword = match ident {
        "true" => Keyword::True,
        "false" => Keyword::False,
        "null" => Keyword::Null,
        "await" => Keyword::Await,
        _ => return None,
    };
    Some(TokenKind::Keyword(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn operators_and_keywords() {
        assert_eq!(
            kinds("!a && b <= 2 || c != null"),
            vec![
                TokenKind::Bang,
                TokenKind::Identifier,
                TokenKind::DoubleAmpersand,
                TokenKind::Identifier,
                TokenKind::LessEqual,
                TokenKind::Number,
                TokenKind::DoublePipe,
                TokenKind::Identifier,
                TokenKind::BangEqual,
                TokenKind::Keyword(Keyword::Null),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strings_decode_escapes_in_both_quote_styles() {
        let tokens = Lexer::new(r#""a\tb\n" 'it\'s' "\u0041""#).tokenize().unwrap();
        assert_eq!(tokens[0].lexeme, "a\tb\n");
        assert_eq!(tokens[1].lexeme, "it's");
        assert_eq!(tokens[2].lexeme, "A");
    }

    #[test]
    fn unterminated_string_is_reported() {
        let err = Lexer::new("\"open").tokenize().unwrap_err();
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn lone_assignment_sign_is_rejected() {
        let err = Lexer::new("a = b").tokenize().unwrap_err();
        assert!(err.message.contains("unexpected character `=`"));
    }
}
