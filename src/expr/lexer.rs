use crate::error::{OrdoError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Token {
    Str(String),
    Int(i64),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    Colon,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    Plus,
    Minus,
}

pub(super) fn tokenize(src: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let next = chars.get(i + 1).copied();
        let (tok, width) = match c {
            '\'' | '"' => {
                let (s, end) = read_string(&chars, i)?;
                out.push(Token::Str(s));
                i = end;
                continue;
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<i64>()
                    .map_err(|_| OrdoError::evaluation(format!("integer out of range: {}", text)))?;
                out.push(Token::Int(n));
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                out.push(Token::Ident(chars[start..i].iter().collect()));
                continue;
            }
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            ',' => (Token::Comma, 1),
            '.' => (Token::Dot, 1),
            '?' => (Token::Question, 1),
            ':' => (Token::Colon, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '=' if next == Some('=') => (Token::Eq, 2),
            '=' => (Token::Assign, 1),
            '!' if next == Some('=') => (Token::Ne, 2),
            '!' => (Token::Bang, 1),
            '<' if next == Some('=') => (Token::Le, 2),
            '<' => (Token::Lt, 1),
            '>' if next == Some('=') => (Token::Ge, 2),
            '>' => (Token::Gt, 1),
            '&' if next == Some('&') => (Token::AndAnd, 2),
            '|' if next == Some('|') => (Token::OrOr, 2),
            other => {
                return Err(OrdoError::evaluation(format!(
                    "unexpected character '{}' at offset {}",
                    other, i
                )))
            }
        };
        out.push(tok);
        i += width;
    }
    Ok(out)
}

/// Read a quoted string starting at `start`; returns the unescaped text and
/// the index just past the closing quote.
fn read_string(chars: &[char], start: usize) -> Result<(String, usize)> {
    let quote = chars[start];
    let mut s = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let esc = chars
                    .get(i + 1)
                    .ok_or_else(|| OrdoError::evaluation("unterminated escape sequence"))?;
                s.push(match esc {
                    'n' => '\n',
                    't' => '\t',
                    other => *other,
                });
                i += 2;
            }
            c if c == quote => return Ok((s, i + 1)),
            c => {
                s.push(c);
                i += 1;
            }
        }
    }
    Err(OrdoError::evaluation("unterminated string literal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_operators_and_strings() {
        let toks = tokenize("halt(status=1) != 'a\\'b' && x<=2").unwrap();
        assert_eq!(
            toks,
            vec![
                Token::Ident("halt".into()),
                Token::LParen,
                Token::Ident("status".into()),
                Token::Assign,
                Token::Int(1),
                Token::RParen,
                Token::Ne,
                Token::Str("a'b".into()),
                Token::AndAnd,
                Token::Ident("x".into()),
                Token::Le,
                Token::Int(2),
            ]
        );
    }

    #[test]
    fn rejects_stray_characters() {
        assert!(tokenize("a & b").is_err());
        assert!(tokenize("'open").is_err());
    }
}
