use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Reserved words of the scripting language.
///
/// Keywords are recognised by the identifier parser: a scanned word is looked up
/// here first and only becomes an identifier when it is not reserved, so `index`
/// never splits into `in` + `dex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, EnumIter, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    Let,
    Const,
    Var,
    Function,
    Async,
    Class,
    Test,
    If,
    Else,
    While,
    For,
    In,
    Of,
    Return,
    Break,
    Continue,
    Try,
    Catch,
    Finally,
    Throw,
    Import,
    Export,
    From,
    Assert,
    Await,
    True,
    False,
    Null,
    Undefined,
    New,
}
