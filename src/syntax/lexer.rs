//! Tokenizer for item-level Rust syntax.

use logos::Logos;

use crate::base::{TextRange, TextSize};

/// Token kinds the item parser distinguishes.
///
/// Keywords are lexed as [`TokenKind::Ident`]; the parser checks their text.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    Lifetime,
    Str,
    Char,
    Number,
    Colon2,
    Colon,
    Semi,
    Comma,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Pound,
    Bang,
    Eq,
    FatArrow,
    Arrow,
    Star,
    Dollar,
    Lt,
    Gt,
    Punct,
    /// Characters the lexer could not classify.
    Unknown,
}

impl TokenKind {
    pub fn is_open_delim(self) -> bool {
        matches!(self, TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace)
    }

    pub fn is_close_delim(self) -> bool {
        matches!(self, TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
}

#[derive(Logos, Copy, Clone, Debug, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
enum RawToken {
    #[token("/*", block_comment)]
    BlockComment,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    #[regex(r"r#[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[regex(r"'[A-Za-z_][A-Za-z0-9_]*")]
    Lifetime,
    #[regex(r#"b?"([^"\\]|\\.)*""#)]
    #[regex(r#"b?r"[^"]*""#)]
    #[regex(r##"b?r#"([^"]|"[^#])*"#"##)]
    Str,
    #[regex(r"b?'([^'\\\n]|\\[^\n][^'\n]*)'")]
    Char,
    #[regex(r"[0-9][0-9A-Za-z_]*")]
    Number,
    #[token("::")]
    Colon2,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("#")]
    Pound,
    #[token("!")]
    Bang,
    #[token("=")]
    Eq,
    #[token("=>")]
    FatArrow,
    #[token("->")]
    Arrow,
    #[token("*")]
    Star,
    #[token("$")]
    Dollar,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[regex(r"[-+/%^|?@~.&]")]
    Punct,
}

fn block_comment(lex: &mut logos::Lexer<RawToken>) -> logos::Skip {
    let rest = lex.remainder();
    let end = rest.find("*/").map_or(rest.len(), |idx| idx + 2);
    lex.bump(end);
    logos::Skip
}

impl From<RawToken> for TokenKind {
    fn from(raw: RawToken) -> Self {
        match raw {
            RawToken::BlockComment => TokenKind::Unknown,
            RawToken::Ident => TokenKind::Ident,
            RawToken::Lifetime => TokenKind::Lifetime,
            RawToken::Str => TokenKind::Str,
            RawToken::Char => TokenKind::Char,
            RawToken::Number => TokenKind::Number,
            RawToken::Colon2 => TokenKind::Colon2,
            RawToken::Colon => TokenKind::Colon,
            RawToken::Semi => TokenKind::Semi,
            RawToken::Comma => TokenKind::Comma,
            RawToken::LBrace => TokenKind::LBrace,
            RawToken::RBrace => TokenKind::RBrace,
            RawToken::LParen => TokenKind::LParen,
            RawToken::RParen => TokenKind::RParen,
            RawToken::LBracket => TokenKind::LBracket,
            RawToken::RBracket => TokenKind::RBracket,
            RawToken::Pound => TokenKind::Pound,
            RawToken::Bang => TokenKind::Bang,
            RawToken::Eq => TokenKind::Eq,
            RawToken::FatArrow => TokenKind::FatArrow,
            RawToken::Arrow => TokenKind::Arrow,
            RawToken::Star => TokenKind::Star,
            RawToken::Dollar => TokenKind::Dollar,
            RawToken::Lt => TokenKind::Lt,
            RawToken::Gt => TokenKind::Gt,
            RawToken::Punct => TokenKind::Punct,
        }
    }
}

/// Split `text` into tokens, dropping whitespace and comments.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut lexer = RawToken::lexer(text);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let range = TextRange::new(TextSize::from(span.start as u32), TextSize::from(span.end as u32));
        let kind = result.map_or(TokenKind::Unknown, TokenKind::from);
        tokens.push(Token { kind, range });
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).into_iter().map(|token| token.kind).collect()
    }

    #[test]
    fn test_tokenize_use() {
        assert_eq!(
            kinds("use a::{b, c as _};"),
            vec![
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Colon2,
                TokenKind::LBrace,
                TokenKind::Ident,
                TokenKind::Comma,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::RBrace,
                TokenKind::Semi,
            ]
        );
    }

    #[test]
    fn test_tokenize_skips_comments() {
        assert_eq!(
            kinds("// line\nfn /* block */ f"),
            vec![TokenKind::Ident, TokenKind::Ident]
        );
    }

    #[test]
    fn test_tokenize_literals() {
        assert_eq!(
            kinds(r#"'a' 'a "s\"" 42 -> =>"#),
            vec![
                TokenKind::Char,
                TokenKind::Lifetime,
                TokenKind::Str,
                TokenKind::Number,
                TokenKind::Arrow,
                TokenKind::FatArrow,
            ]
        );
    }

    #[test]
    fn test_token_ranges() {
        let tokens = tokenize("mod  a;");
        assert_eq!(tokens[1].range, TextRange::new(5.into(), 6.into()));
    }
}
