//! Text to `Expr` parser built on nom.
//!
//! Grammar, loosest binding first:
//! ```text
//! sum     := product (("+" | "-") product)*
//! product := unary (("*" | "/") unary)*
//! unary   := "-" unary | power
//! power   := atom ("^" unary)?
//! atom    := func "(" sum ("," sum)* ")" | "(" sum ")" | identifier | number
//! ```
//! Function names are those of `FuncKind` plus `sqrt`; the identifier `pi` is the constant.
//! Whatever `Display` prints for an `Expr` parses back to the same value.
//!
//! # Example
//! ```
//! use RustedIK::symbolic::symbolic_engine::Expr;
//! let e = Expr::parse_expression("sin(j0)*px - 2*cj1^2").unwrap();
//! assert!(e.contains_symbol("px"));
//! ```
use crate::symbolic::symbolic_engine::{Expr, FuncKind};
use crate::symbolic::symbolic_errors::SymbolicError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0, one_of},
    combinator::{all_consuming, map, opt, recognize},
    error::{Error, ErrorKind},
    multi::{many0, separated_list1},
    number::complete::double,
    sequence::{delimited, pair, preceded},
};
use std::str::FromStr;

fn identifier(input: &str) -> IResult<&str, String> {
    let parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));
    map(parser, String::from).parse(input)
}

fn function_call(input: &str) -> IResult<&str, Expr> {
    let (rest, name) = identifier(input)?;
    let is_sqrt = name == "sqrt";
    let kind = match FuncKind::from_str(&name) {
        Ok(kind) => Some(kind),
        Err(_) if is_sqrt => None,
        Err(_) => return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag))),
    };
    let mut args_parser = delimited(
        preceded(multispace0, char('(')),
        separated_list1(preceded(multispace0, char(',')), sum),
        preceded(multispace0, char(')')),
    );
    let (rest, args) = args_parser.parse(rest)?;
    match kind {
        Some(kind) if args.len() == kind.arity() => Ok((rest, Expr::function(kind, args))),
        None if args.len() == 1 => Ok((rest, args[0].clone().sqrt())),
        _ => Err(nom::Err::Failure(Error::new(input, ErrorKind::Verify))),
    }
}

fn named(input: &str) -> IResult<&str, Expr> {
    let (rest, name) = identifier(input)?;
    let e = if name == "pi" {
        Expr::pi()
    } else {
        Expr::Symbol(name)
    };
    Ok((rest, e))
}

fn number(input: &str) -> IResult<&str, Expr> {
    map(double, Expr::constant).parse(input)
}

fn parenthesized(input: &str) -> IResult<&str, Expr> {
    delimited(char('('), sum, preceded(multispace0, char(')'))).parse(input)
}

fn atom(input: &str) -> IResult<&str, Expr> {
    let (input, _) = multispace0(input)?;
    alt((function_call, parenthesized, named, number)).parse(input)
}

fn power(input: &str) -> IResult<&str, Expr> {
    let (input, base) = atom(input)?;
    let (input, exp) = opt(preceded(preceded(multispace0, char('^')), unary)).parse(input)?;
    match exp {
        Some(e) => Ok((input, Expr::power(base, e))),
        None => Ok((input, base)),
    }
}

fn unary(input: &str) -> IResult<&str, Expr> {
    let (input, _) = multispace0(input)?;
    if let Ok((rest, _)) = char::<&str, Error<&str>>('-').parse(input) {
        let (rest, e) = unary(rest)?;
        return Ok((rest, -e));
    }
    power(input)
}

fn product(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut acc) = unary(input)?;
    loop {
        let op = preceded(multispace0, one_of::<&str, &str, Error<&str>>("*/")).parse(input);
        let Ok((rest, op)) = op else {
            return Ok((input, acc));
        };
        let (rest, rhs) = unary(rest)?;
        acc = if op == '*' { acc * rhs } else { acc / rhs };
        input = rest;
    }
}

fn sum(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut acc) = product(input)?;
    loop {
        let op = preceded(multispace0, one_of::<&str, &str, Error<&str>>("+-")).parse(input);
        let Ok((rest, op)) = op else {
            return Ok((input, acc));
        };
        let (rest, rhs) = product(rest)?;
        acc = if op == '+' { acc + rhs } else { acc - rhs };
        input = rest;
    }
}

impl Expr {
    /// Parses text into a normalized expression; the whole input must be consumed.
    pub fn parse_expression(input: &str) -> Result<Expr, SymbolicError> {
        let mut parser = all_consuming(delimited(multispace0, sum, multispace0));
        match parser.parse(input) {
            Ok((_, e)) => Ok(e),
            Err(e) => Err(SymbolicError::Parse(format!("{:?} in '{}'", e, input))),
        }
    }
}
