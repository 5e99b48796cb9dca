use thiserror::Error;

use crate::analyzer::core::ParseError;
use crate::eval::evaluator::EvalError;
use crate::provider::ProviderError;
use crate::tokenizer::token::TokenizerError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Eval(#[from] EvalError),
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Config error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config(message.into())
    }
}
