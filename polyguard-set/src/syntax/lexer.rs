#![forbid(unsafe_code)]

use logos::Logos;
use miette::SourceSpan;

use crate::error::ParseError;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: SourceSpan,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Keywords
    KwAnd,
    KwOr,
    KwTrue,
    KwFalse,
    KwMod,

    // Operators / punctuation
    Arrow,
    Colon,
    Semi,
    Comma,
    Eq,
    EqEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Percent,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Eof,

    // Literals / identifiers
    Int(i64),
    Ident(String),
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum RawToken {
    #[token("and")]
    #[token("&&")]
    KwAnd,
    #[token("or")]
    #[token("||")]
    KwOr,
    #[token("true")]
    KwTrue,
    #[token("false")]
    KwFalse,
    #[token("mod")]
    KwMod,

    #[token("->")]
    Arrow,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,

    #[token("==")]
    EqEq,
    #[token("=")]
    Eq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("//")]
    SlashSlash,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

/// Tokenizer shared by the set syntax and the kernel index-expression syntax.
pub struct Lexer<'a> {
    src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src }
    }

    pub fn lex(&self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        let mut lex = RawToken::lexer(self.src);
        while let Some(raw) = lex.next() {
            let range = lex.span();
            let span = SourceSpan::new(range.start.into(), range.end - range.start);
            let kind = match raw {
                Ok(RawToken::KwAnd) => TokenKind::KwAnd,
                Ok(RawToken::KwOr) => TokenKind::KwOr,
                Ok(RawToken::KwTrue) => TokenKind::KwTrue,
                Ok(RawToken::KwFalse) => TokenKind::KwFalse,
                Ok(RawToken::KwMod) => TokenKind::KwMod,

                Ok(RawToken::Arrow) => TokenKind::Arrow,
                Ok(RawToken::Colon) => TokenKind::Colon,
                Ok(RawToken::Semi) => TokenKind::Semi,
                Ok(RawToken::Comma) => TokenKind::Comma,

                Ok(RawToken::EqEq) => TokenKind::EqEq,
                Ok(RawToken::Eq) => TokenKind::Eq,
                Ok(RawToken::Le) => TokenKind::Le,
                Ok(RawToken::Ge) => TokenKind::Ge,
                Ok(RawToken::Lt) => TokenKind::Lt,
                Ok(RawToken::Gt) => TokenKind::Gt,

                Ok(RawToken::Plus) => TokenKind::Plus,
                Ok(RawToken::Minus) => TokenKind::Minus,
                Ok(RawToken::Star) => TokenKind::Star,
                Ok(RawToken::SlashSlash) => TokenKind::SlashSlash,
                Ok(RawToken::Slash) => TokenKind::Slash,
                Ok(RawToken::Percent) => TokenKind::Percent,

                Ok(RawToken::LParen) => TokenKind::LParen,
                Ok(RawToken::RParen) => TokenKind::RParen,
                Ok(RawToken::LBrace) => TokenKind::LBrace,
                Ok(RawToken::RBrace) => TokenKind::RBrace,
                Ok(RawToken::LBracket) => TokenKind::LBracket,
                Ok(RawToken::RBracket) => TokenKind::RBracket,

                Ok(RawToken::Int(n)) => TokenKind::Int(n),
                Ok(RawToken::Ident(s)) => TokenKind::Ident(s),

                Err(()) => {
                    return Err(ParseError::new(
                        format!("unexpected input '{}'", lex.slice()),
                        span,
                    ));
                }
            };
            tokens.push(Token { kind, span });
        }
        tokens.push(Token {
            kind: TokenKind::Eof,
            span: SourceSpan::new(self.src.len().into(), 0),
        });
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .lex()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn keywords_win_over_identifiers() {
        assert_eq!(
            kinds("i and android"),
            vec![
                TokenKind::Ident("i".into()),
                TokenKind::KwAnd,
                TokenKind::Ident("android".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn floor_division_is_one_token() {
        assert_eq!(
            kinds("i // 2"),
            vec![
                TokenKind::Ident("i".into()),
                TokenKind::SlashSlash,
                TokenKind::Int(2),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn oversized_literal_is_rejected() {
        let err = Lexer::new("99999999999999999999").lex().unwrap_err();
        assert!(err.message.contains("unexpected input"));
    }
}
