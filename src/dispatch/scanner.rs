//! Ampersand call scanner
//!
//! Finds `&` dispatch markers in a statement and evaluates the comma-delimited
//! numeric arguments that follow. Each argument is truncated toward zero and
//! wrapped into a byte, the way the legacy byte accumulator did. Anything that
//! is not part of a call is handed back as text for the regular evaluator.
//!
//! ```text
//! PRINT "HI"&3,65,2&4
//! └─ Text ──┘└─ Call ┘└ Call
//! ```

use thiserror::Error;

use super::AmpCall;

/// Dispatch marker
pub const MARKER: u8 = b'&';

/// Statement separator
pub const SEPARATOR: u8 = b':';

/// Opcode plus two register arguments
const MAX_ARGS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    #[error("Unexpected '{found}' at position {pos}")]
    UnexpectedChar { pos: usize, found: char },

    #[error("Expression ends early at position {pos}")]
    UnexpectedEnd { pos: usize },

    #[error("Division by zero at position {pos}")]
    DivisionByZero { pos: usize },

    #[error("Unterminated string starting at position {pos}")]
    UnterminatedString { pos: usize },
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// A piece of a scanned statement
#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'a> {
    /// Source text for the regular evaluator
    Text(&'a str),
    Call(AmpCall),
}

/// Split a line into statements on `:` outside string literals
pub fn split_statements(line: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut in_string = false;
    let mut start = 0;
    for (pos, byte) in line.bytes().enumerate() {
        match byte {
            b'"' => in_string = !in_string,
            SEPARATOR if !in_string => {
                statements.push(&line[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    statements.push(&line[start..]);
    statements
}

/// Streaming scan of one statement.
///
/// Yields text and calls in source order. Each call is yielded as soon as its
/// arguments parse, so a caller can dispatch it before later input is read.
/// The first error ends the stream.
pub struct Scanner<'a> {
    statement: &'a str,
    pos: usize,
    text_start: usize,
    string_start: Option<usize>,
    done: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(statement: &'a str) -> Self {
        Self {
            statement,
            pos: 0,
            text_start: 0,
            string_start: None,
            done: false,
        }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Segment<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let bytes = self.statement.as_bytes();

        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'"' => {
                    self.string_start = match self.string_start {
                        Some(_) => None,
                        None => Some(self.pos),
                    };
                    self.pos += 1;
                }
                MARKER if self.string_start.is_none() => {
                    let text = &self.statement[self.text_start..self.pos];
                    self.text_start = self.pos;
                    if !text.trim().is_empty() {
                        return Some(Ok(Segment::Text(text)));
                    }

                    let mut parser = ExprParser::new(bytes, self.pos + 1);
                    return Some(match parser.call() {
                        Ok(call) => {
                            self.pos = parser.pos;
                            self.text_start = parser.pos;
                            Ok(Segment::Call(call))
                        }
                        Err(e) => {
                            self.done = true;
                            Err(e)
                        }
                    });
                }
                _ => self.pos += 1,
            }
        }

        self.done = true;
        if let Some(pos) = self.string_start {
            return Some(Err(ScanError::UnterminatedString { pos }));
        }
        let text = &self.statement[self.text_start..];
        (!text.trim().is_empty()).then_some(Ok(Segment::Text(text)))
    }
}

/// Break one statement into text and calls, in source order
pub fn scan_statement(statement: &str) -> Result<Vec<Segment<'_>>> {
    Scanner::new(statement).collect()
}

/// Only the calls of a statement
pub fn scan_calls(statement: &str) -> Result<Vec<AmpCall>> {
    Ok(scan_statement(statement)?
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Call(call) => Some(call),
            Segment::Text(_) => None,
        })
        .collect())
}

/// Wrap an evaluated argument into 0..=255
pub fn to_byte(value: f64) -> u8 {
    (value.trunc() as i64).rem_euclid(256) as u8
}

/// Recursive-descent evaluator over the bytes following a marker
struct ExprParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    /// `expr (',' expr){0,2}`; missing register arguments are zero
    fn call(&mut self) -> Result<AmpCall> {
        let mut args = [0u8; MAX_ARGS];
        args[0] = to_byte(self.expr()?);
        let mut count = 1;
        while count < MAX_ARGS && self.peek() == Some(b',') {
            self.pos += 1;
            args[count] = to_byte(self.expr()?);
            count += 1;
        }
        Ok(AmpCall::new(args[0], args[1], args[2]))
    }

    fn skip_spaces(&mut self) {
        while self.bytes.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_spaces();
        self.bytes.get(self.pos).copied()
    }

    fn unexpected(&mut self) -> ScanError {
        match self.peek() {
            Some(byte) => ScanError::UnexpectedChar {
                pos: self.pos,
                found: byte as char,
            },
            None => ScanError::UnexpectedEnd { pos: self.pos },
        }
    }

    fn expr(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(b'+') => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(b'-') => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(b'*') => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(b'/') => {
                    let pos = self.pos;
                    self.pos += 1;
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(ScanError::DivisionByZero { pos });
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64> {
        match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(b'+') => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let value = self.expr()?;
                if self.peek() != Some(b')') {
                    return Err(self.unexpected());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(b'$') => {
                self.pos += 1;
                self.hex()
            }
            Some(b'0'..=b'9' | b'.') => Ok(self.decimal()),
            _ => Err(self.unexpected()),
        }
    }

    fn decimal(&mut self) -> f64 {
        let mut value = 0.0;
        while let Some(digit @ b'0'..=b'9') = self.bytes.get(self.pos).copied() {
            value = value * 10.0 + f64::from(digit - b'0');
            self.pos += 1;
        }
        if self.bytes.get(self.pos) == Some(&b'.') {
            self.pos += 1;
            let mut scale = 0.1;
            while let Some(digit @ b'0'..=b'9') = self.bytes.get(self.pos).copied() {
                value += f64::from(digit - b'0') * scale;
                scale /= 10.0;
                self.pos += 1;
            }
        }
        value
    }

    fn hex(&mut self) -> Result<f64> {
        let start = self.pos;
        let mut value = 0.0;
        while let Some(digit) = self.bytes.get(self.pos).and_then(|b| (*b as char).to_digit(16)) {
            value = value * 16.0 + f64::from(digit);
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.unexpected());
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_call() {
        assert_eq!(
            scan_statement("&3,65,2").unwrap(),
            vec![Segment::Call(AmpCall::new(3, 65, 2))]
        );
    }

    #[test]
    fn test_missing_arguments_are_zero() {
        assert_eq!(scan_calls("&7").unwrap(), vec![AmpCall::new(7, 0, 0)]);
        assert_eq!(scan_calls("& 7 , 1").unwrap(), vec![AmpCall::new(7, 1, 0)]);
    }

    #[test]
    fn test_byte_wraparound() {
        assert_eq!(scan_calls("&256,-1,3.9").unwrap(), vec![AmpCall::new(0, 255, 3)]);
        assert_eq!(scan_calls("&-3.9,511,$FF").unwrap(), vec![AmpCall::new(253, 255, 255)]);
    }

    #[test]
    fn test_expressions() {
        assert_eq!(scan_calls("&2*3+1,(4+4)/2,10-2*3").unwrap(), vec![AmpCall::new(7, 4, 4)]);
        assert_eq!(scan_calls("&$0a,-(2-5)").unwrap(), vec![AmpCall::new(10, 3, 0)]);
    }

    #[test]
    fn test_multiple_calls_and_text() {
        let segments = scan_statement("PRINT \"A&B\"&5&6,1 ,2,9").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Text("PRINT \"A&B\""),
                Segment::Call(AmpCall::new(5, 0, 0)),
                Segment::Call(AmpCall::new(6, 1, 2)),
                Segment::Text(",9"),
            ]
        );
    }

    #[test]
    fn test_scanner_yields_calls_before_error() {
        let mut scanner = Scanner::new("&2,65,2&3&1,");
        assert_eq!(scanner.next(), Some(Ok(Segment::Call(AmpCall::new(2, 65, 2)))));
        assert_eq!(scanner.next(), Some(Ok(Segment::Call(AmpCall::new(3, 0, 0)))));
        assert_eq!(scanner.next(), Some(Err(ScanError::UnexpectedEnd { pos: 12 })));
        assert_eq!(scanner.next(), None);
    }

    #[test]
    fn test_split_statements() {
        assert_eq!(
            split_statements("A=1:&3:PRINT \"X:Y\""),
            vec!["A=1", "&3", "PRINT \"X:Y\""]
        );
        assert_eq!(split_statements(""), vec![""]);
    }

    #[test]
    fn test_errors() {
        assert_eq!(scan_statement("&"), Err(ScanError::UnexpectedEnd { pos: 1 }));
        assert_eq!(
            scan_statement("&1,X"),
            Err(ScanError::UnexpectedChar { pos: 3, found: 'X' })
        );
        assert_eq!(scan_statement("&4/0"), Err(ScanError::DivisionByZero { pos: 2 }));
        assert_eq!(scan_statement("&(1"), Err(ScanError::UnexpectedEnd { pos: 3 }));
        assert_eq!(
            scan_statement("PRINT \"oops"),
            Err(ScanError::UnterminatedString { pos: 6 })
        );
    }

    #[test]
    fn test_to_byte() {
        assert_eq!(to_byte(0.0), 0);
        assert_eq!(to_byte(255.99), 255);
        assert_eq!(to_byte(-256.0), 0);
        assert_eq!(to_byte(-0.5), 0);
        assert_eq!(to_byte(1000.0), 232);
    }
}
