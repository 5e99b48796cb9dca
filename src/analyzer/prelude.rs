use std::fmt;
use std::rc::Rc;

use super::combinators::*;
use super::core::Parser;

pub fn equal<I: Clone + PartialEq>(value: I) -> Equal<I> {
    Equal::new(value)
}

pub fn satisfy<I: fmt::Display, O, F>(f: F) -> Satisfy<I, O, F>
where
    F: Fn(&I) -> Option<O>,
{
    Satisfy::new(f)
}

pub fn choice<I, O>(parsers: Vec<Box<dyn Parser<I, O>>>) -> Choice<I, O> {
    Choice::new(parsers)
}

pub fn map<P, F, A, B, I>(parser: P, f: F) -> Map<P, F, A, B>
where
    P: Parser<I, A>,
    F: Fn(A) -> B,
{
    Map::new(parser, f)
}

pub fn try_map<P, F, A, B, I>(parser: P, f: F) -> TryMap<P, F, A, B>
where
    P: Parser<I, A>,
    F: Fn(A) -> Result<B, String>,
{
    TryMap::new(parser, f)
}

pub fn as_unit<I, O, P>(parser: P) -> AsUnit<P, O>
where
    P: Parser<I, O>,
{
    AsUnit::new(parser)
}

pub fn many<P, I, O>(parser: P) -> Many<P, I, O>
where
    P: Parser<I, O>,
{
    Many::new(parser)
}

pub fn separated_list<P, S, I, O>(item_parser: P, separator_parser: S) -> SeparatedList<P, S, I, O>
where
    P: Parser<I, O>,
    S: Parser<I, ()>,
{
    SeparatedList::new(item_parser, separator_parser)
}

pub fn optional<P, I, O>(parser: P) -> Optional<P, I, O>
where
    P: Parser<I, O>,
{
    Optional::new(parser)
}

pub fn preceded<P1, P2, I, O>(parser1: P1, parser2: P2) -> Preceded<P1, P2, I, O>
where
    P1: Parser<I, ()>,
    P2: Parser<I, O>,
{
    Preceded::new(parser1, parser2)
}

pub fn delimited<L, P, R, I, O>(left: L, parser: P, right: R) -> Delimited<L, P, R, I, O>
where
    L: Parser<I, ()>,
    P: Parser<I, O>,
    R: Parser<I, ()>,
{
    Delimited::new(left, parser, right)
}

pub fn tuple2<P1, P2, I, O1, O2>(parser1: P1, parser2: P2) -> Tuple2<P1, P2, I, O1, O2>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
{
    Tuple2::new(parser1, parser2)
}

pub fn tuple3<P1, P2, P3, I, O1, O2, O3>(
    parser1: P1,
    parser2: P2,
    parser3: P3,
) -> Tuple3<P1, P2, P3, I, O1, O2, O3>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
    P3: Parser<I, O3>,
{
    Tuple3::new(parser1, parser2, parser3)
}

pub fn tuple4<P1, P2, P3, P4, I, O1, O2, O3, O4>(
    parser1: P1,
    parser2: P2,
    parser3: P3,
    parser4: P4,
) -> Tuple4<P1, P2, P3, P4, I, O1, O2, O3, O4>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
    P3: Parser<I, O3>,
    P4: Parser<I, O4>,
{
    Tuple4::new(parser1, parser2, parser3, parser4)
}

pub fn with_context<P, C, I, O>(parser: P, context: C) -> WithContext<P, C>
where
    P: Parser<I, O>,
    C: ToString,
{
    WithContext::new(parser, context)
}

pub fn lazy<F, P, I, O>(f: F) -> Lazy<F>
where
    F: Fn() -> P,
    P: Parser<I, O>,
{
    Lazy::new(f)
}

/// Wraps a parser so one instance can appear at several places in a rule.
pub fn shared<P, I, O>(parser: P) -> Rc<P>
where
    P: Parser<I, O>,
{
    Rc::new(parser)
}
