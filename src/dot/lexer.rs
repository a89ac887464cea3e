//! DOT tokenizer.
//!
//! Quoted strings are kept verbatim, surrounding quotes and escape sequences
//! included: downstream label slicing works on the raw attribute text.

use crate::error::ParseError;

/// A single DOT token with the line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare identifier or numeral.
    Ident(String),
    /// Double-quoted string, quotes included.
    Quoted(String),
    /// HTML-like string `<...>`, angle brackets included.
    Html(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Equals,
    Semicolon,
    Comma,
    Colon,
    /// `--` or `->`.
    EdgeOp,
}

impl TokenKind {
    /// Text of an ID-like token, `None` for punctuation.
    pub fn id_text(&self) -> Option<&str> {
        match self {
            TokenKind::Ident(s) | TokenKind::Quoted(s) | TokenKind::Html(s) => Some(s),
            _ => None,
        }
    }
}

/// Remove one pair of surrounding double quotes, if present.
pub fn unquote(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
}

/// Tokenize DOT source text.
pub fn tokenize(src: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;
    let mut at_line_start = true;

    while i < chars.len() {
        let c = chars[i];

        if c == '\n' {
            line += 1;
            at_line_start = true;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // `#` lines are C-preprocessor output and ignored.
        if c == '#' && at_line_start {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        at_line_start = false;

        let next = chars.get(i + 1).copied();
        match c {
            '/' if next == Some('/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if next == Some('*') => {
                let start_line = line;
                i += 2;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(ParseError::Syntax {
                                line: start_line,
                                message: "unterminated block comment".into(),
                            });
                        }
                        Some('*') if chars.get(i + 1) == Some(&'/') => {
                            i += 2;
                            break;
                        }
                        Some('\n') => {
                            line += 1;
                            i += 1;
                        }
                        Some(_) => i += 1,
                    }
                }
            }
            '{' => push(&mut tokens, TokenKind::LBrace, line, &mut i),
            '}' => push(&mut tokens, TokenKind::RBrace, line, &mut i),
            '[' => push(&mut tokens, TokenKind::LBracket, line, &mut i),
            ']' => push(&mut tokens, TokenKind::RBracket, line, &mut i),
            '=' => push(&mut tokens, TokenKind::Equals, line, &mut i),
            ';' => push(&mut tokens, TokenKind::Semicolon, line, &mut i),
            ',' => push(&mut tokens, TokenKind::Comma, line, &mut i),
            ':' => push(&mut tokens, TokenKind::Colon, line, &mut i),
            '-' if matches!(next, Some('-') | Some('>')) => {
                tokens.push(Token {
                    kind: TokenKind::EdgeOp,
                    line,
                });
                i += 2;
            }
            '"' => {
                let start_line = line;
                let mut text = String::from('"');
                i += 1;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(ParseError::Syntax {
                                line: start_line,
                                message: "unterminated quoted string".into(),
                            });
                        }
                        Some('\\') => {
                            text.push('\\');
                            if let Some(&escaped) = chars.get(i + 1) {
                                if escaped == '\n' {
                                    line += 1;
                                }
                                text.push(escaped);
                            }
                            i += 2;
                        }
                        Some('"') => {
                            text.push('"');
                            i += 1;
                            break;
                        }
                        Some(&other) => {
                            if other == '\n' {
                                line += 1;
                            }
                            text.push(other);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Quoted(text),
                    line: start_line,
                });
            }
            '<' => {
                let start_line = line;
                let mut depth = 0usize;
                let mut text = String::new();
                loop {
                    let Some(&ch) = chars.get(i) else {
                        return Err(ParseError::Syntax {
                            line: start_line,
                            message: "unterminated HTML string".into(),
                        });
                    };
                    match ch {
                        '<' => depth += 1,
                        '>' => depth -= 1,
                        '\n' => line += 1,
                        _ => {}
                    }
                    text.push(ch);
                    i += 1;
                    if depth == 0 {
                        break;
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Html(text),
                    line: start_line,
                });
            }
            c if is_id_char(c) || c == '-' => {
                let mut text = String::new();
                text.push(c);
                i += 1;
                while let Some(&ch) = chars.get(i) {
                    if !is_id_char(ch) {
                        break;
                    }
                    text.push(ch);
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(text),
                    line,
                });
            }
            other => {
                return Err(ParseError::Syntax {
                    line,
                    message: format!("unexpected character {other:?}"),
                });
            }
        }
    }

    Ok(tokens)
}

fn push(tokens: &mut Vec<Token>, kind: TokenKind, line: usize, i: &mut usize) {
    tokens.push(Token { kind, line });
    *i += 1;
}

fn is_id_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || !c.is_ascii()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn quoted_strings_keep_quotes_and_escapes() {
        let toks = kinds(r#"a [label="A\nB"]"#);
        assert_eq!(toks[3], TokenKind::Quoted(r#""A\nB""#.into()));
    }

    #[test]
    fn edge_operators_and_comments() {
        let toks = kinds("a -- b // trailing\n/* block */ c -> d\n# cpp line\n");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::EdgeOp,
                TokenKind::Ident("b".into()),
                TokenKind::Ident("c".into()),
                TokenKind::EdgeOp,
                TokenKind::Ident("d".into()),
            ]
        );
    }

    #[test]
    fn negative_numerals_are_identifiers() {
        let toks = kinds("energy=-12.5");
        assert_eq!(toks[2], TokenKind::Ident("-12.5".into()));
    }

    #[test]
    fn line_numbers_follow_newlines() {
        let toks = tokenize("graph {\n  a\n  b\n}").unwrap();
        assert_eq!(toks[2].line, 2);
        assert_eq!(toks[3].line, 3);
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        let err = tokenize("a [label=\"oops]").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 1, .. }));
    }

    #[test]
    fn unquote_strips_one_pair() {
        assert_eq!(unquote("\"0,1\""), "0,1");
        assert_eq!(unquote("plain"), "plain");
    }
}
