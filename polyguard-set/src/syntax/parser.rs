#![forbid(unsafe_code)]

use miette::SourceSpan;

use crate::basic::BasicSet;
use crate::error::{ParseError, SetError};
use crate::linear::{Constraint, LinExpr};
use crate::set::Set;
use crate::space::Space;

use super::{Cursor, Lexer, TokenKind};

fn arith(err: SetError, span: SourceSpan) -> ParseError {
    ParseError::new(err.to_string(), span)
}

pub fn parse_set(src: &str) -> Result<Set, ParseError> {
    let tokens = Lexer::new(src).lex()?;
    let mut cur = Cursor::new(&tokens);

    let mut params = Vec::new();
    if cur.at(TokenKind::LBracket) {
        params = parse_name_list(&mut cur)?;
        cur.expect(TokenKind::Arrow, "'->' after the parameter list")?;
    }

    cur.expect(TokenKind::LBrace, "'{'")?;
    let mut dims = Vec::new();
    if cur.at(TokenKind::LBracket) {
        dims = parse_name_list(&mut cur)?;
    }
    let space = Space::new(params, dims).map_err(|e| arith(e, cur.prev_span()))?;

    let set = if cur.eat(TokenKind::Colon) {
        let mut pieces = Vec::new();
        for conj in parse_disjunction(&mut cur, &space)? {
            if let Some(constraints) = conj {
                let piece = BasicSet::from_constraints(space.clone(), constraints)
                    .map_err(|e| arith(e, cur.prev_span()))?;
                pieces.push(piece);
            }
        }
        Set::from_pieces(space, pieces).map_err(|e| arith(e, cur.prev_span()))?
    } else {
        Set::universe(space)
    };

    cur.expect(TokenKind::RBrace, "'}'")?;
    cur.expect_eof()?;
    Ok(set)
}

fn parse_name_list(cur: &mut Cursor<'_>) -> Result<Vec<String>, ParseError> {
    cur.expect(TokenKind::LBracket, "'['")?;
    let mut names = Vec::new();
    if !cur.at(TokenKind::RBracket) {
        loop {
            let (name, _) = cur.expect_ident()?;
            names.push(name);
            if !cur.eat(TokenKind::Comma) {
                break;
            }
        }
    }
    cur.expect(TokenKind::RBracket, "']'")?;
    Ok(names)
}

/// `None` entries are conjunctions containing `false`.
fn parse_disjunction(
    cur: &mut Cursor<'_>,
    space: &Space,
) -> Result<Vec<Option<Vec<Constraint>>>, ParseError> {
    let mut out = vec![parse_conjunction(cur, space)?];
    while cur.eat(TokenKind::KwOr) {
        out.push(parse_conjunction(cur, space)?);
    }
    Ok(out)
}

fn parse_conjunction(
    cur: &mut Cursor<'_>,
    space: &Space,
) -> Result<Option<Vec<Constraint>>, ParseError> {
    let mut constraints = Some(Vec::new());
    loop {
        if cur.eat(TokenKind::KwFalse) {
            constraints = None;
        } else if !cur.eat(TokenKind::KwTrue) {
            let chain = parse_chain(cur, space)?;
            if let Some(cs) = constraints.as_mut() {
                cs.extend(chain);
            }
        }
        if !cur.eat(TokenKind::KwAnd) {
            break;
        }
    }
    Ok(constraints)
}

/// `a <= b < c` yields `a <= b` and `b < c`.
fn parse_chain(cur: &mut Cursor<'_>, space: &Space) -> Result<Vec<Constraint>, ParseError> {
    let mut lhs = parse_affine(cur, space)?;
    if cur.eat(TokenKind::KwMod) || cur.eat(TokenKind::Percent) {
        return parse_congruence(cur, space, lhs);
    }
    let mut out = Vec::new();
    loop {
        let op = match cur.peek_kind() {
            Some(TokenKind::Lt) => TokenKind::Lt,
            Some(TokenKind::Le) => TokenKind::Le,
            Some(TokenKind::Gt) => TokenKind::Gt,
            Some(TokenKind::Ge) => TokenKind::Ge,
            Some(TokenKind::Eq) | Some(TokenKind::EqEq) => TokenKind::Eq,
            _ => break,
        };
        cur.next();
        let span = cur.prev_span();
        let rhs = parse_affine(cur, space)?;
        let c = match op {
            TokenKind::Lt => Constraint::lt_of(&lhs, &rhs),
            TokenKind::Le => Constraint::le_of(&lhs, &rhs),
            TokenKind::Gt => Constraint::lt_of(&rhs, &lhs),
            TokenKind::Ge => Constraint::le_of(&rhs, &lhs),
            _ => Constraint::eq_of(&lhs, &rhs),
        }
        .map_err(|e| arith(e, span))?;
        out.push(c);
        lhs = rhs;
    }
    if out.is_empty() {
        return Err(ParseError::new(
            "expected a comparison operator",
            cur.peek_span(),
        ));
    }
    Ok(out)
}

/// `e mod m = f`: `e - f ≡ 0 (mod m)` with `0 <= f < m`.
fn parse_congruence(
    cur: &mut Cursor<'_>,
    space: &Space,
    lhs: LinExpr,
) -> Result<Vec<Constraint>, ParseError> {
    let span = cur.peek_span();
    let modulus = match cur.next().map(|t| t.kind) {
        Some(TokenKind::Int(m)) if m > 0 => m,
        _ => return Err(ParseError::new("expected a positive modulus", span)),
    };
    if !cur.eat(TokenKind::Eq) && !cur.eat(TokenKind::EqEq) {
        return Err(ParseError::new("expected '=' after the modulus", cur.peek_span()));
    }
    let span = cur.peek_span();
    let rem = parse_affine(cur, space)?;
    let build = || -> Result<Vec<Constraint>, SetError> {
        Ok(vec![
            Constraint::divisible(lhs.checked_sub(&rem)?, modulus)?,
            Constraint::le_of(&LinExpr::zero(), &rem)?,
            Constraint::lt_of(&rem, &LinExpr::from_constant(modulus))?,
        ])
    };
    build().map_err(|e| arith(e, span))
}

fn parse_affine(cur: &mut Cursor<'_>, space: &Space) -> Result<LinExpr, ParseError> {
    let mut acc = parse_term(cur, space)?;
    loop {
        let negate = if cur.eat(TokenKind::Plus) {
            false
        } else if cur.eat(TokenKind::Minus) {
            true
        } else {
            break;
        };
        let span = cur.prev_span();
        let rhs = parse_term(cur, space)?;
        acc = if negate {
            acc.checked_sub(&rhs)
        } else {
            acc.checked_add(&rhs)
        }
        .map_err(|e| arith(e, span))?;
    }
    Ok(acc)
}

fn parse_term(cur: &mut Cursor<'_>, space: &Space) -> Result<LinExpr, ParseError> {
    let mut acc = parse_factor(cur, space)?;
    loop {
        // `2i` and `2(i + 1)` multiply implicitly.
        let implicit = acc.is_constant()
            && matches!(
                cur.peek_kind(),
                Some(TokenKind::Ident(_)) | Some(TokenKind::LParen)
            );
        if !implicit && !cur.eat(TokenKind::Star) {
            break;
        }
        let span = cur.peek_span();
        let rhs = parse_factor(cur, space)?;
        acc = if acc.is_constant() {
            rhs.checked_scale(acc.constant_term())
        } else if rhs.is_constant() {
            acc.checked_scale(rhs.constant_term())
        } else {
            return Err(ParseError::new("non-affine product", span));
        }
        .map_err(|e| arith(e, span))?;
    }
    Ok(acc)
}

fn parse_factor(cur: &mut Cursor<'_>, space: &Space) -> Result<LinExpr, ParseError> {
    let span = cur.peek_span();
    match cur.next().map(|t| t.kind) {
        Some(TokenKind::Int(n)) => Ok(LinExpr::from_constant(n)),
        Some(TokenKind::Ident(name)) => {
            if !space.contains(&name) {
                return Err(ParseError::new(
                    format!("unknown identifier '{name}'"),
                    span,
                ));
            }
            Ok(LinExpr::var(name))
        }
        Some(TokenKind::Minus) => parse_factor(cur, space)?
            .checked_neg()
            .map_err(|e| arith(e, span)),
        Some(TokenKind::LParen) => {
            let inner = parse_affine(cur, space)?;
            cur.expect(TokenKind::RParen, "')'")?;
            Ok(inner)
        }
        _ => Err(ParseError::new("expected an affine expression", span)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn parameter_only_set() {
        let s = parse_set("[n, m] -> { : n >= 1 and m = 2n }").unwrap();
        assert!(s.dims().is_empty());
        assert_eq!(s.params().len(), 2);
    }

    #[test]
    fn unknown_identifier_is_reported_with_its_span() {
        let err = parse_set("{ [i] : 0 <= k }").unwrap_err();
        assert!(err.message.contains("unknown identifier 'k'"));
        assert_eq!(usize::from(err.span.offset()), 13);
    }

    #[test]
    fn non_affine_product_is_rejected() {
        let err = parse_set("{ [i, j] : i * j >= 0 }").unwrap_err();
        assert!(err.message.contains("non-affine"));
    }

    #[test]
    fn congruence_constraints_parse_and_print() {
        let s = parse_set("{ [i] : 0 <= i <= 8 and i mod 2 = 1 }").unwrap();
        let at = |v: i64| s.contains(&BTreeMap::from([("i".to_string(), v)])).unwrap();
        assert!(at(3));
        assert!(!at(4));
        assert!(s.to_string().contains("i mod 2 = 1"));

        let same = parse_set("{ [i, j] : (i + 2j) % 4 == 3 }").unwrap();
        let back = parse_set(&same.to_string()).unwrap();
        assert!(same.is_equal(&back).unwrap());
    }

    #[test]
    fn zero_modulus_is_rejected() {
        let err = parse_set("{ [i] : i mod 0 = 0 }").unwrap_err();
        assert!(err.message.contains("positive modulus"));
    }

    #[test]
    fn false_conjunction_drops_the_piece() {
        let s = parse_set("{ [i] : false or 0 <= i < 2 }").unwrap();
        assert_eq!(s.pieces().len(), 1);
    }

    #[test]
    fn universe_without_constraints() {
        let s = parse_set("{ [i] }").unwrap();
        assert_eq!(s.to_string(), "{ [i] }");
    }
}
