//! # Parser Combinators
//!
//! Building blocks that compose small parsers into the script grammar.
//!
//! * **Basic**: `Equal`, `Satisfy`
//! * **Sequential**: `Tuple2`..`Tuple4`, `Preceded`, `Delimited`
//! * **Alternative**: `Choice`, `Optional`
//! * **Repetition**: `Many`, `SeparatedList`
//! * **Transformation**: `Map`, `TryMap`, `AsUnit`
//! * **Structure**: `WithContext`, `Lazy`, and `Rc<P>` for sharing one parser
//!   instance between several positions of a rule
//!
//! Repetition is committed: once an item has consumed input, or reports an
//! explicit `Failure`, its error is an error for the whole repetition rather
//! than the end of the list. This keeps
//! error positions pointing at the token that is actually wrong.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use super::core::{ParseError, ParseResult, Parser};

impl<I, O, P> Parser<I, O> for Rc<P>
where
    P: Parser<I, O> + ?Sized,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        (**self).parse(input, pos)
    }
}

impl<I, O, P> Parser<I, O> for Box<P>
where
    P: Parser<I, O> + ?Sized,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        (**self).parse(input, pos)
    }
}

/// Equal: Matches a specific value in the input
#[derive(Clone)]
pub struct Equal<I> {
    value: I,
}

impl<I> Equal<I> {
    pub fn new(value: I) -> Self {
        Self { value }
    }
}

impl<I: Clone + PartialEq + fmt::Display> Parser<I, I> for Equal<I> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<I> {
        match input.get(pos) {
            Some(found) if *found == self.value => Ok((pos + 1, found.clone())),
            Some(found) => Err(ParseError::Unexpected {
                expected: self.value.to_string(),
                found: found.to_string(),
                position: pos,
                context: None,
            }),
            None => Err(ParseError::UnexpectedEOF {
                position: pos,
                context: None,
            }),
        }
    }
}

/// Satisfy: Consumes one token when the predicate maps it to a value
#[derive(Clone)]
pub struct Satisfy<I, O, F> {
    f: F,
    _phantom: PhantomData<(I, O)>,
}

impl<I, O, F> Satisfy<I, O, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, F> Parser<I, O> for Satisfy<I, O, F>
where
    I: fmt::Display,
    F: Fn(&I) -> Option<O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        match input.get(pos) {
            Some(found) => match (self.f)(found) {
                Some(result) => Ok((pos + 1, result)),
                None => Err(ParseError::Unexpected {
                    expected: "matching token".to_string(),
                    found: found.to_string(),
                    position: pos,
                    context: None,
                }),
            },
            None => Err(ParseError::UnexpectedEOF {
                position: pos,
                context: None,
            }),
        }
    }
}

/// Choice: Succeeds with the first alternative that succeeds
///
/// When every alternative fails, the error that got furthest into the input
/// is reported. On a tie an explicit `Failure` beats a plain mismatch.
pub struct Choice<I, O> {
    parsers: Vec<Box<dyn Parser<I, O>>>,
}

impl<I, O> Choice<I, O> {
    pub fn new(parsers: Vec<Box<dyn Parser<I, O>>>) -> Self {
        Self { parsers }
    }
}

impl<I, O> Parser<I, O> for Choice<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let mut furthest: Option<ParseError> = None;
        for parser in &self.parsers {
            match parser.parse(input, pos) {
                Ok(result) => return Ok(result),
                Err(e) => {
                    let further = furthest.as_ref().map_or(true, |f| {
                        e.get_position() > f.get_position()
                            || (e.get_position() == f.get_position()
                                && e.is_failure()
                                && !f.is_failure())
                    });
                    if further {
                        furthest = Some(e);
                    }
                }
            }
        }
        Err(furthest.unwrap_or(ParseError::NoAlternative {
            position: pos,
            context: None,
        }))
    }
}

/// Map: Transforms the output of a parser
pub struct Map<P, F, A, B> {
    parser: P,
    f: F,
    _phantom: PhantomData<(A, B)>,
}

impl<P, F, A, B> Map<P, F, A, B> {
    pub fn new(parser: P, f: F) -> Self {
        Self {
            parser,
            f,
            _phantom: PhantomData,
        }
    }
}

impl<I, A, B, P, F> Parser<I, B> for Map<P, F, A, B>
where
    P: Parser<I, A>,
    F: Fn(A) -> B,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<B> {
        let (pos, value) = self.parser.parse(input, pos)?;
        Ok((pos, (self.f)(value)))
    }
}

/// TryMap: Transforms the output, rejecting it with a message
///
/// The failure is reported at the position where the inner parser started,
/// so a bad assignment target points at the target rather than past it.
pub struct TryMap<P, F, A, B> {
    parser: P,
    f: F,
    _phantom: PhantomData<(A, B)>,
}

impl<P, F, A, B> TryMap<P, F, A, B> {
    pub fn new(parser: P, f: F) -> Self {
        Self {
            parser,
            f,
            _phantom: PhantomData,
        }
    }
}

impl<I, A, B, P, F> Parser<I, B> for TryMap<P, F, A, B>
where
    P: Parser<I, A>,
    F: Fn(A) -> Result<B, String>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<B> {
        let (new_pos, value) = self.parser.parse(input, pos)?;
        match (self.f)(value) {
            Ok(mapped) => Ok((new_pos, mapped)),
            Err(message) => Err(ParseError::Failure {
                message,
                position: pos,
                context: None,
            }),
        }
    }
}

/// AsUnit: Discards the output of a parser
pub struct AsUnit<P, O> {
    parser: P,
    _phantom: PhantomData<O>,
}

impl<P, O> AsUnit<P, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, P, O> Parser<I, ()> for AsUnit<P, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<()> {
        let (pos, _) = self.parser.parse(input, pos)?;
        Ok((pos, ()))
    }
}

/// Many: Zero or more repetitions
pub struct Many<P, I, O> {
    parser: P,
    _phantom: PhantomData<(I, O)>,
}

impl<P, I, O> Many<P, I, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P> Parser<I, Vec<O>> for Many<P, I, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Vec<O>> {
        let mut results = Vec::new();
        let mut current_pos = pos;

        loop {
            match self.parser.parse(input, current_pos) {
                Ok((new_pos, value)) => {
                    if new_pos == current_pos {
                        // an item that consumes nothing would repeat forever
                        break;
                    }
                    results.push(value);
                    current_pos = new_pos;
                }
                Err(e) if e.get_position() > current_pos || e.is_failure() => {
                    tracing::trace!(
                        target: "parser::many",
                        error = ?e,
                        position = current_pos,
                        "Many parser failed inside an item"
                    );
                    return Err(e);
                }
                Err(_) => break,
            }
        }

        Ok((current_pos, results))
    }
}

/// SeparatedList: Items separated by a separator, possibly empty
///
/// A trailing separator is left unconsumed so the caller can accept it.
pub struct SeparatedList<P, S, I, O> {
    item_parser: P,
    separator_parser: S,
    _phantom: PhantomData<(I, O)>,
}

impl<P, S, I, O> SeparatedList<P, S, I, O> {
    pub fn new(item_parser: P, separator_parser: S) -> Self {
        Self {
            item_parser,
            separator_parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P, S> Parser<I, Vec<O>> for SeparatedList<P, S, I, O>
where
    P: Parser<I, O>,
    S: Parser<I, ()>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Vec<O>> {
        let mut results = Vec::new();
        let mut current_pos = match self.item_parser.parse(input, pos) {
            Ok((new_pos, value)) => {
                results.push(value);
                new_pos
            }
            Err(e) if e.get_position() > pos || e.is_failure() => return Err(e),
            Err(_) => return Ok((pos, results)),
        };

        while let Ok((sep_pos, _)) = self.separator_parser.parse(input, current_pos) {
            match self.item_parser.parse(input, sep_pos) {
                Ok((new_pos, value)) => {
                    results.push(value);
                    current_pos = new_pos;
                }
                Err(e) if e.get_position() > sep_pos || e.is_failure() => return Err(e),
                Err(_) => break,
            }
        }

        Ok((current_pos, results))
    }
}

pub struct Optional<P, I, O> {
    parser: P,
    _phantom: PhantomData<(I, O)>,
}

impl<P, I, O> Optional<P, I, O> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, P> Parser<I, Option<O>> for Optional<P, I, O>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<Option<O>> {
        match self.parser.parse(input, pos) {
            Ok((new_pos, value)) => Ok((new_pos, Some(value))),
            Err(_) => Ok((pos, None)),
        }
    }
}

pub struct Tuple2<P1, P2, I, O1, O2> {
    parser1: P1,
    parser2: P2,
    _phantom: PhantomData<(I, O1, O2)>,
}

impl<P1, P2, I, O1, O2> Tuple2<P1, P2, I, O1, O2> {
    pub fn new(parser1: P1, parser2: P2) -> Self {
        Self {
            parser1,
            parser2,
            _phantom: PhantomData,
        }
    }
}

impl<P1, P2, I, O1, O2> Parser<I, (O1, O2)> for Tuple2<P1, P2, I, O1, O2>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<(O1, O2)> {
        let (pos, o1) = self.parser1.parse(input, pos)?;
        let (pos, o2) = self.parser2.parse(input, pos)?;
        Ok((pos, (o1, o2)))
    }
}

pub struct Tuple3<P1, P2, P3, I, O1, O2, O3> {
    parser1: P1,
    parser2: P2,
    parser3: P3,
    _phantom: PhantomData<(I, O1, O2, O3)>,
}

impl<P1, P2, P3, I, O1, O2, O3> Tuple3<P1, P2, P3, I, O1, O2, O3> {
    pub fn new(parser1: P1, parser2: P2, parser3: P3) -> Self {
        Self {
            parser1,
            parser2,
            parser3,
            _phantom: PhantomData,
        }
    }
}

impl<P1, P2, P3, I, O1, O2, O3> Parser<I, (O1, O2, O3)> for Tuple3<P1, P2, P3, I, O1, O2, O3>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
    P3: Parser<I, O3>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<(O1, O2, O3)> {
        let (pos, o1) = self.parser1.parse(input, pos)?;
        let (pos, o2) = self.parser2.parse(input, pos)?;
        let (pos, o3) = self.parser3.parse(input, pos)?;
        Ok((pos, (o1, o2, o3)))
    }
}

pub struct Tuple4<P1, P2, P3, P4, I, O1, O2, O3, O4> {
    parser1: P1,
    parser2: P2,
    parser3: P3,
    parser4: P4,
    _phantom: PhantomData<(I, O1, O2, O3, O4)>,
}

impl<P1, P2, P3, P4, I, O1, O2, O3, O4> Tuple4<P1, P2, P3, P4, I, O1, O2, O3, O4> {
    pub fn new(parser1: P1, parser2: P2, parser3: P3, parser4: P4) -> Self {
        Self {
            parser1,
            parser2,
            parser3,
            parser4,
            _phantom: PhantomData,
        }
    }
}

impl<P1, P2, P3, P4, I, O1, O2, O3, O4> Parser<I, (O1, O2, O3, O4)>
    for Tuple4<P1, P2, P3, P4, I, O1, O2, O3, O4>
where
    P1: Parser<I, O1>,
    P2: Parser<I, O2>,
    P3: Parser<I, O3>,
    P4: Parser<I, O4>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<(O1, O2, O3, O4)> {
        let (pos, o1) = self.parser1.parse(input, pos)?;
        let (pos, o2) = self.parser2.parse(input, pos)?;
        let (pos, o3) = self.parser3.parse(input, pos)?;
        let (pos, o4) = self.parser4.parse(input, pos)?;
        Ok((pos, (o1, o2, o3, o4)))
    }
}

/// Preceded: Runs a unit parser, then keeps the second parser's output
pub struct Preceded<P1, P2, I, O> {
    parser1: P1,
    parser2: P2,
    _phantom: PhantomData<(I, O)>,
}

impl<P1, P2, I, O> Preceded<P1, P2, I, O> {
    pub fn new(parser1: P1, parser2: P2) -> Self {
        Self {
            parser1,
            parser2,
            _phantom: PhantomData,
        }
    }
}

impl<P1, P2, I, O> Parser<I, O> for Preceded<P1, P2, I, O>
where
    P1: Parser<I, ()>,
    P2: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let (pos, _) = self.parser1.parse(input, pos)?;
        self.parser2.parse(input, pos)
    }
}

/// Delimited: Keeps the output between two unit parsers
pub struct Delimited<L, P, R, I, O> {
    left: L,
    parser: P,
    right: R,
    _phantom: PhantomData<(I, O)>,
}

impl<L, P, R, I, O> Delimited<L, P, R, I, O> {
    pub fn new(left: L, parser: P, right: R) -> Self {
        Self {
            left,
            parser,
            right,
            _phantom: PhantomData,
        }
    }
}

impl<I, O, L, P, R> Parser<I, O> for Delimited<L, P, R, I, O>
where
    L: Parser<I, ()>,
    P: Parser<I, O>,
    R: Parser<I, ()>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        let (pos, _) = self.left.parse(input, pos)?;
        let (pos, result) = self.parser.parse(input, pos)?;
        let (pos, _) = self.right.parse(input, pos)?;
        Ok((pos, result))
    }
}

pub struct WithContext<P, C> {
    parser: P,
    context: C,
}

impl<P, C> WithContext<P, C> {
    pub fn new(parser: P, context: C) -> Self {
        Self { parser, context }
    }
}

impl<I, O, P, C: ToString> Parser<I, O> for WithContext<P, C>
where
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        self.parser
            .parse(input, pos)
            .map_err(|e| e.with_context(&self.context.to_string()))
    }
}

/// Lazy: Builds the inner parser on use, for recursive rules
pub struct Lazy<F> {
    f: F,
}

impl<F> Lazy<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<I, O, F, P> Parser<I, O> for Lazy<F>
where
    F: Fn() -> P,
    P: Parser<I, O>,
{
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O> {
        (self.f)().parse(input, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digit() -> Satisfy<char, u32, impl Fn(&char) -> Option<u32>> {
        Satisfy::new(|c: &char| c.to_digit(10))
    }

    fn comma() -> AsUnit<Equal<char>, char> {
        AsUnit::new(Equal::new(','))
    }

    #[test]
    fn test_equal() {
        let input = ['a', 'b'];
        assert_eq!(Equal::new('a').parse(&input, 0), Ok((1, 'a')));
        assert!(matches!(
            Equal::new('a').parse(&input, 1),
            Err(ParseError::Unexpected { position: 1, .. })
        ));
        assert!(matches!(
            Equal::new('a').parse(&input, 2),
            Err(ParseError::UnexpectedEOF { position: 2, .. })
        ));
    }

    #[test]
    fn test_choice_reports_furthest_error() {
        let input = ['a', 'b', 'x'];
        let choice: Choice<char, ()> = Choice::new(vec![
            Box::new(AsUnit::new(Equal::new('z'))),
            Box::new(AsUnit::new(Tuple3::new(
                Equal::new('a'),
                Equal::new('b'),
                Equal::new('c'),
            ))),
        ]);
        let error = choice.parse(&input, 0).unwrap_err();
        assert_eq!(error.get_position(), 2);
    }

    #[test]
    fn test_many_stops_cleanly_and_commits() {
        let input = ['1', '2', 'x'];
        assert_eq!(Many::new(digit()).parse(&input, 0), Ok((2, vec![1, 2])));

        // "1," followed by a non-digit fails inside the item
        let pair = Tuple2::new(digit(), Equal::new(','));
        let input = ['1', ',', '2', 'x'];
        let error = Many::new(pair).parse(&input, 0).unwrap_err();
        assert_eq!(error.get_position(), 3);
    }

    #[test]
    fn test_separated_list_leaves_trailing_separator() {
        let input = ['1', ',', '2', ',', ')'];
        let list = SeparatedList::new(digit(), comma());
        assert_eq!(list.parse(&input, 0), Ok((3, vec![1, 2])));
        assert_eq!(list.parse(&[')'], 0), Ok((0, vec![])));
    }

    #[test]
    fn test_try_map_reports_start_position() {
        let input = ['1', '9'];
        let even = TryMap::new(Tuple2::new(digit(), digit()), |(_, b): (u32, u32)| {
            if b % 2 == 0 {
                Ok(b)
            } else {
                Err("odd".to_string())
            }
        });
        assert_eq!(
            even.parse(&input, 0),
            Err(ParseError::Failure {
                message: "odd".to_string(),
                position: 0,
                context: None
            })
        );
    }

    #[test]
    fn test_shared_parser() {
        let shared = Rc::new(digit());
        let both = Tuple2::new(shared.clone(), shared);
        assert_eq!(both.parse(&['4', '2'], 0), Ok((2, (4, 2))));
    }
}
