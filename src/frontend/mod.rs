//! # Frontend
//!
//! Parses Patito source text into an [`ast::Program`](crate::ast::Program).
//! Comments (`//` and `/* */`) are stripped before parsing, so any offsets in a
//! [`SyntaxError`] refer to the text returned by [`strip_comments`].
use crate::ast::Program;
use core::fmt;
use no_comment::{languages, IntoWithoutComments};
use nom::{
    combinator::all_consuming,
    error::{convert_error, VerboseError},
};

mod parse;
pub use parse::{parse_expr, parse_program};

/// A source program that could not be parsed.
#[derive(Clone, Debug, PartialEq)]
pub struct SyntaxError {
    /// A human readable trace of what the parser was trying to read.
    pub message: String,
    /// The byte offset of the failure in the comment-free source.
    pub offset: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "syntax error at offset {}:\n{}", self.offset, self.message)
    }
}

/// Remove every comment from a source text.
pub fn strip_comments(code: &str) -> String {
    code.chars()
        .without_comments(languages::rust())
        .collect::<String>()
}

/// Parse a complete Patito program.
pub fn parse(code: &str) -> Result<Program, SyntaxError> {
    let code = strip_comments(code);

    let result = all_consuming(parse_program::<VerboseError<&str>>)(code.as_str());
    match result {
        Ok((_, program)) => Ok(program),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let offset = e
                .errors
                .first()
                .map(|(rest, _)| code.len() - rest.len())
                .unwrap_or(0);
            Err(SyntaxError {
                message: convert_error(code.as_str(), e),
                offset,
            })
        }
        Err(nom::Err::Incomplete(_)) => Err(SyntaxError {
            message: String::from("unexpected end of input"),
            offset: code.len(),
        }),
    }
}
