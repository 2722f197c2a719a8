//! A small SQL tokenizer for the scan stage
//!
//! Byte-offset precise so that cursor and completion logic can be tested
//! against real token ranges. Handles identifiers, keywords, numbers, string
//! literals, quoted identifiers, operators and both comment styles.

use sqlscope_core::{TextRange, Token, TokenKind};

pub(crate) const KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS", "ON",
    "AND", "OR", "NOT", "IN", "IS", "AS", "GROUP", "BY", "ORDER", "HAVING", "LIMIT", "OFFSET",
    "UNION", "ALL", "DISTINCT", "CREATE", "TABLE", "INSERT", "INTO", "VALUES", "UPDATE", "SET",
    "DELETE", "WITH", "IF", "EXISTS", "NULL", "TRUE", "FALSE", "PRIMARY", "UNIQUE", "FOREIGN",
    "CONSTRAINT", "CHECK", "KEY", "REFERENCES", "DEFAULT", "BETWEEN", "LIKE", "CASE", "WHEN",
    "THEN", "ELSE", "END",
];

fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word.to_ascii_uppercase().as_str())
}

/// Tokenize `text` into offset-precise tokens, comments included
pub(crate) fn tokenize(text: &str) -> Vec<Token> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;

        // Line comment
        if c == b'-' && bytes.get(i + 1) == Some(&b'-') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            tokens.push(token(start, i, TokenKind::Comment));
            continue;
        }
        // Block comment
        if c == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                i += 1;
            }
            i = (i + 2).min(bytes.len());
            tokens.push(token(start, i, TokenKind::Comment));
            continue;
        }
        // Identifier or keyword
        if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'$')
            {
                i += 1;
            }
            let kind = if is_keyword(&text[start..i]) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            };
            tokens.push(token(start, i, kind));
            continue;
        }
        // Number
        if c.is_ascii_digit() {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            tokens.push(token(start, i, TokenKind::Number));
            continue;
        }
        // String literal
        if c == b'\'' {
            i += 1;
            while i < bytes.len() && bytes[i] != b'\'' {
                i += 1;
            }
            i = (i + 1).min(bytes.len());
            tokens.push(token(start, i, TokenKind::StringLiteral));
            continue;
        }
        // Quoted identifier
        if c == b'"' {
            i += 1;
            while i < bytes.len() && bytes[i] != b'"' {
                i += 1;
            }
            i = (i + 1).min(bytes.len());
            tokens.push(token(start, i, TokenKind::Identifier));
            continue;
        }
        // Two-character operators
        if let Some(&next) = bytes.get(i + 1) {
            let pair = [c, next];
            if matches!(&pair, b"<=" | b">=" | b"<>" | b"!=" | b"||") {
                i += 2;
                tokens.push(token(start, i, TokenKind::Operator));
                continue;
            }
        }
        // Single-character operators
        if matches!(c, b'=' | b'<' | b'>' | b'+' | b'-' | b'*' | b'/' | b'%') {
            i += 1;
            tokens.push(token(start, i, TokenKind::Operator));
            continue;
        }
        // Everything else is punctuation: , . ( ) ;
        i += 1;
        tokens.push(token(start, i, TokenKind::Punctuation));
    }

    tokens
}

fn token(start: usize, end: usize, kind: TokenKind) -> Token {
    Token {
        range: TextRange::new(start, end - start),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lexemes<'a>(text: &'a str, tokens: &[Token]) -> Vec<&'a str> {
        tokens
            .iter()
            .map(|t| &text[t.range.offset..t.range.end()])
            .collect()
    }

    #[test]
    fn test_select_statement_tokens() {
        let text = "select a.x from foo;";
        let tokens = tokenize(text);
        assert_eq!(
            lexemes(text, &tokens),
            vec!["select", "a", ".", "x", "from", "foo", ";"]
        );
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].kind, TokenKind::Punctuation);
        assert_eq!(tokens[0].range, TextRange::new(0, 6));
        assert_eq!(tokens[5].range, TextRange::new(16, 3));
    }

    #[test]
    fn test_operators_and_literals() {
        let text = "where a >= 10 and b <> 'x y'";
        let tokens = tokenize(text);
        assert_eq!(
            lexemes(text, &tokens),
            vec!["where", "a", ">=", "10", "and", "b", "<>", "'x y'"]
        );
        assert_eq!(tokens[2].kind, TokenKind::Operator);
        assert_eq!(tokens[3].kind, TokenKind::Number);
        assert_eq!(tokens[7].kind, TokenKind::StringLiteral);
    }

    #[test]
    fn test_comments() {
        let text = "select 1 -- trailing\n/* block */ from";
        let tokens = tokenize(text);
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword,
                TokenKind::Number,
                TokenKind::Comment,
                TokenKind::Comment,
                TokenKind::Keyword,
            ]
        );
    }

    #[test]
    fn test_unterminated_literal_does_not_overrun() {
        let text = "select 'oops";
        let tokens = tokenize(text);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].range.end(), text.len());
    }
}
