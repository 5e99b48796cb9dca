//! # Tokenizer
//!
//! Turns script source into [`token::TokenSpan`]s with nom. Every byte of the
//! input is accounted for, trivia included, so spans carry exact line and
//! column positions for parse errors.

pub mod comment;
pub mod keyword;
pub mod literal;
pub mod symbol;
pub mod token;
pub mod whitespace;
