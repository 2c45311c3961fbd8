#![forbid(unsafe_code)]

//! Recursive-descent parser for index/value expressions, on top of the set
//! lexer.

use polyguard_set::ParseError;
use polyguard_set::syntax::{Cursor, Lexer, TokenKind};

use crate::expr::Expr;

pub fn parse_expr(src: &str) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(src).lex()?;
    let mut cur = Cursor::new(&tokens);
    let expr = parse_sum(&mut cur)?;
    cur.expect_eof()?;
    Ok(expr)
}

fn parse_sum(cur: &mut Cursor<'_>) -> Result<Expr, ParseError> {
    let first = parse_product(cur)?;
    let mut terms = vec![first];
    loop {
        if cur.eat(TokenKind::Plus) {
            terms.push(parse_product(cur)?);
        } else if cur.eat(TokenKind::Minus) {
            terms.push(Expr::Neg(Box::new(parse_product(cur)?)));
        } else {
            break;
        }
    }
    Ok(flatten(terms, Expr::Sum))
}

fn parse_product(cur: &mut Cursor<'_>) -> Result<Expr, ParseError> {
    let mut factors = vec![parse_unary(cur)?];
    loop {
        if cur.eat(TokenKind::Star) {
            factors.push(parse_unary(cur)?);
        } else if cur.eat(TokenKind::SlashSlash) {
            let lhs = flatten(std::mem::take(&mut factors), Expr::Product);
            let rhs = parse_unary(cur)?;
            factors.push(Expr::FloorDiv(Box::new(lhs), Box::new(rhs)));
        } else if cur.eat(TokenKind::Percent) {
            let lhs = flatten(std::mem::take(&mut factors), Expr::Product);
            let rhs = parse_unary(cur)?;
            factors.push(Expr::Remainder(Box::new(lhs), Box::new(rhs)));
        } else if cur.at(TokenKind::Slash) {
            return Err(ParseError::new(
                "true division is not an integer operation; use '//'",
                cur.peek_span(),
            ));
        } else {
            break;
        }
    }
    Ok(flatten(factors, Expr::Product))
}

fn parse_unary(cur: &mut Cursor<'_>) -> Result<Expr, ParseError> {
    if cur.eat(TokenKind::Minus) {
        return Ok(match parse_unary(cur)? {
            Expr::Int(n) if n != i64::MIN => Expr::Int(-n),
            other => Expr::Neg(Box::new(other)),
        });
    }
    parse_atom(cur)
}

fn parse_atom(cur: &mut Cursor<'_>) -> Result<Expr, ParseError> {
    let span = cur.peek_span();
    match cur.next().map(|t| t.kind) {
        Some(TokenKind::Int(n)) => Ok(Expr::Int(n)),
        Some(TokenKind::Ident(name)) => {
            if cur.eat(TokenKind::LBracket) {
                let index = parse_list(cur, TokenKind::RBracket, "']'")?;
                if index.is_empty() {
                    return Err(ParseError::new("empty subscript", cur.prev_span()));
                }
                Ok(Expr::Subscript {
                    aggregate: name,
                    index,
                })
            } else if cur.eat(TokenKind::LParen) {
                let args = parse_list(cur, TokenKind::RParen, "')'")?;
                Ok(Expr::Call {
                    function: name,
                    args,
                })
            } else {
                Ok(Expr::Var(name))
            }
        }
        Some(TokenKind::LParen) => {
            let inner = parse_sum(cur)?;
            cur.expect(TokenKind::RParen, "')'")?;
            Ok(inner)
        }
        _ => Err(ParseError::new("expected an expression", span)),
    }
}

fn parse_list(
    cur: &mut Cursor<'_>,
    close: TokenKind,
    what: &str,
) -> Result<Vec<Expr>, ParseError> {
    let mut items = Vec::new();
    if !cur.at(close.clone()) {
        loop {
            items.push(parse_sum(cur)?);
            if !cur.eat(TokenKind::Comma) {
                break;
            }
        }
    }
    cur.expect(close, what)?;
    Ok(items)
}

fn flatten(mut items: Vec<Expr>, wrap: fn(Vec<Expr>) -> Expr) -> Expr {
    if items.len() == 1 {
        if let Some(only) = items.pop() {
            return only;
        }
    }
    wrap(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtraction_becomes_negated_term() {
        let x = parse_expr("i - 1").unwrap();
        assert_eq!(
            x,
            Expr::Sum(vec![Expr::var("i"), Expr::Neg(Box::new(Expr::Int(1)))])
        );
    }

    #[test]
    fn floor_division_is_left_associative() {
        let x = parse_expr("2 * i // 4").unwrap();
        let expected = Expr::FloorDiv(
            Box::new(Expr::Product(vec![Expr::Int(2), Expr::var("i")])),
            Box::new(Expr::Int(4)),
        );
        assert_eq!(x, expected);
    }

    #[test]
    fn single_slash_is_rejected() {
        let err = parse_expr("i / 2").unwrap_err();
        assert!(err.message.contains("use '//'"));
    }

    #[test]
    fn subscript_with_call_argument() {
        let x = parse_expr("a[i, j] * 2 + f(b[i + 1])").unwrap();
        assert_eq!(x.to_string(), "a[i, j] * 2 + f(b[i + 1])");
    }

    #[test]
    fn trailing_garbage_is_an_error() {
        assert!(parse_expr("a[i]]").is_err());
    }
}
