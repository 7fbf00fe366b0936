//! Frame cleaner and splitter for the text protocol.
//!
//! A frame is `KEYWORD[:field[:field|field...]]`. The first delimited
//! segment is the command keyword; the remainder splits into at most seven
//! data fields. Both `:` and `|` separate fields so the documented numeric
//! forms (`HID_MOUSE_MOVE:10:-5`) and the pipe-joined data lists parse the
//! same way. Fields are borrowed slices of the (bounded) input line, so no
//! copies are made and nothing can outgrow the line itself.

use core::fmt;

use heapless::Vec;
use winnow::error::{ContextError, ModalResult};
use winnow::prelude::*;
use winnow::token::{one_of, take_till};

/// Maximum bytes accepted on a single command line.
pub const MAX_LINE_LEN: usize = 128;

/// Maximum data fields after the keyword.
pub const MAX_ARGS: usize = 7;

/// Errors produced while splitting a frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ParseError {
    /// Input exceeded [`MAX_LINE_LEN`].
    LineTooLong,
    /// More than [`MAX_ARGS`] data fields were supplied.
    TooManyFields,
    /// The splitter could not consume the input.
    Malformed,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::LineTooLong => write!(f, "line exceeds {MAX_LINE_LEN} bytes"),
            ParseError::TooManyFields => write!(f, "more than {MAX_ARGS} data fields"),
            ParseError::Malformed => f.write_str("malformed command frame"),
        }
    }
}

/// A split frame: keyword plus bounded data fields.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandFrame<'a> {
    pub keyword: &'a str,
    pub args: Vec<&'a str, MAX_ARGS>,
}

impl<'a> CommandFrame<'a> {
    /// Returns the data field at `index`, if present.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&'a str> {
        self.args.get(index).copied()
    }
}

/// Strips trailing whitespace and control bytes, mirroring what serial
/// transports append to a line.
#[must_use]
pub fn clean(line: &str) -> &str {
    line.trim_end_matches(|c: char| c == ' ' || c.is_ascii_control())
}

fn segment<'a>(input: &mut &'a str) -> ModalResult<&'a str, ContextError> {
    take_till(0.., ['|', ':']).parse_next(input)
}

fn separator(input: &mut &str) -> ModalResult<char, ContextError> {
    one_of([':', '|']).parse_next(input)
}

/// Cleans and splits one line. `Ok(None)` marks an empty line, which is not
/// a frame and produces no reply.
pub fn parse(line: &str) -> Result<Option<CommandFrame<'_>>, ParseError> {
    if line.len() > MAX_LINE_LEN {
        return Err(ParseError::LineTooLong);
    }

    let mut input = clean(line);
    if input.is_empty() {
        return Ok(None);
    }

    let keyword = segment(&mut input).map_err(|_| ParseError::Malformed)?;
    let mut args: Vec<&str, MAX_ARGS> = Vec::new();
    while !input.is_empty() {
        let _ = separator(&mut input).map_err(|_| ParseError::Malformed)?;
        let value = segment(&mut input).map_err(|_| ParseError::Malformed)?;
        args.push(value).map_err(|_| ParseError::TooManyFields)?;
    }

    Ok(Some(CommandFrame { keyword, args }))
}
