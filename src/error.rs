use std::error;
use std::fmt;
use std::io;
use std::result;

use crate::byte_record::{ByteRecord, Position};

/// A type alias for `Result<T, csv_stream::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur when processing CSV data.
///
/// This error can happen when writing or reading CSV data. Reaching the end
/// of the input is never an error; readers report it as `Ok(false)` or by
/// ending iteration.
#[derive(Debug)]
pub enum Error {
    /// An I/O error that occurred while reading or writing CSV data.
    ///
    /// A reader that hits an I/O error drops the record it was assembling
    /// and reports no further records.
    Io(io::Error),
    /// A UTF-8 decoding error that occurred while reading CSV data into a
    /// `StringRecord`.
    ///
    /// The offending record is skipped; reading may continue with the next
    /// one.
    Utf8 {
        /// The position of the record in which this error occurred, if
        /// available.
        pos: Option<Position>,
        /// The corresponding UTF-8 error.
        err: Utf8Error,
    },
    /// The input ended inside a quoted field.
    ///
    /// This is only reported when the reader was built with
    /// `strict_quotes(true)`. Otherwise such a field is closed with
    /// whatever it contains.
    UnterminatedQuote {
        /// The position of the record containing the unterminated field.
        pos: Position,
    },
}

impl Error {
    /// Returns true if this is an I/O error.
    pub fn is_io_error(&self) -> bool {
        match *self {
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Return the position for this error, if one exists.
    pub fn position(&self) -> Option<&Position> {
        match *self {
            Error::Utf8 { ref pos, .. } => pos.as_ref(),
            Error::UnterminatedQuote { ref pos } => Some(pos),
            Error::Io(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        io::Error::new(io::ErrorKind::Other, err)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::Utf8 { ref err, .. } => Some(err),
            Error::UnterminatedQuote { .. } => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref err) => fmt::Display::fmt(err, f),
            Error::Utf8 { pos: None, ref err } => {
                write!(f, "CSV parse error: field {}: {}", err.field(), err)
            }
            Error::Utf8 { pos: Some(ref pos), ref err } => write!(
                f,
                "CSV parse error: record {} \
                 (byte {}, line {}, field: {}): {}",
                pos.record(),
                pos.byte(),
                pos.line(),
                err.field(),
                err
            ),
            Error::UnterminatedQuote { ref pos } => write!(
                f,
                "CSV parse error: record {} (byte {}, line {}): \
                 input ended inside a quoted field",
                pos.record(),
                pos.byte(),
                pos.line()
            ),
        }
    }
}

/// A UTF-8 validation error that occurs when attempting to convert a
/// `ByteRecord` into a `StringRecord`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FromUtf8Error {
    record: ByteRecord,
    err: Utf8Error,
}

impl FromUtf8Error {
    pub(crate) fn new(record: ByteRecord, err: Utf8Error) -> FromUtf8Error {
        FromUtf8Error { record, err }
    }

    /// Access the underlying `ByteRecord` that failed UTF-8 validation.
    pub fn into_byte_record(self) -> ByteRecord {
        self.record
    }

    /// Access the underlying UTF-8 validation error.
    pub fn utf8_error(&self) -> &Utf8Error {
        &self.err
    }
}

impl fmt::Display for FromUtf8Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.err, f)
    }
}

impl error::Error for FromUtf8Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.err)
    }
}

/// A UTF-8 validation error.
///
/// The error includes the index of the field that failed validation, and the
/// last byte at which valid UTF-8 was verified.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Utf8Error {
    /// The field index of a byte record in which UTF-8 validation failed.
    field: usize,
    /// The index into the given field up to which valid UTF-8 was verified.
    valid_up_to: usize,
}

impl Utf8Error {
    pub(crate) fn new(field: usize, valid_up_to: usize) -> Utf8Error {
        Utf8Error { field, valid_up_to }
    }

    /// The field index of a byte record in which UTF-8 validation failed.
    pub fn field(&self) -> usize {
        self.field
    }

    /// The index into the given field up to which valid UTF-8 was verified.
    pub fn valid_up_to(&self) -> usize {
        self.valid_up_to
    }
}

impl fmt::Display for Utf8Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "invalid utf-8: invalid UTF-8 in field {} near byte index {}",
            self.field, self.valid_up_to
        )
    }
}

impl error::Error for Utf8Error {}

/// `IntoInnerError` occurs when consuming a `Writer` fails.
///
/// Consuming the `Writer` causes a flush to happen. If the flush fails, then
/// this error is returned, which contains both the original `Writer` and
/// the error that occurred.
///
/// The type parameter `W` is the unconsumed writer.
pub struct IntoInnerError<W> {
    wtr: W,
    err: io::Error,
}

impl<W> IntoInnerError<W> {
    pub(crate) fn new(wtr: W, err: io::Error) -> IntoInnerError<W> {
        IntoInnerError { wtr, err }
    }

    /// Returns the error which caused the call to `into_inner` to fail.
    pub fn error(&self) -> &io::Error {
        &self.err
    }

    /// Returns the underlying writer which generated the error.
    ///
    /// The returned value can be used for error recovery, such as
    /// re-inspecting the buffer.
    pub fn into_inner(self) -> W {
        self.wtr
    }
}

impl<W: std::any::Any> error::Error for IntoInnerError<W> {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.err)
    }
}

impl<W> fmt::Display for IntoInnerError<W> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.err, f)
    }
}

impl<W> fmt::Debug for IntoInnerError<W> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.err, f)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;
    use std::io;

    use crate::byte_record::Position;

    use super::{Error, Utf8Error};

    #[test]
    fn display_utf8_with_position() {
        let mut pos = Position::new();
        pos.set_byte(10).set_line(3).set_record(2);
        let err = Error::Utf8 { pos: Some(pos), err: Utf8Error::new(1, 4) };
        assert_eq!(
            err.to_string(),
            "CSV parse error: record 2 (byte 10, line 3, field: 1): \
             invalid utf-8: invalid UTF-8 in field 1 near byte index 4"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn display_unterminated_quote() {
        let mut pos = Position::new();
        pos.set_byte(4).set_line(2).set_record(1);
        let err = Error::UnterminatedQuote { pos };
        assert_eq!(
            err.to_string(),
            "CSV parse error: record 1 (byte 4, line 2): \
             input ended inside a quoted field"
        );
        assert_eq!(err.position().map(|p| p.byte()), Some(4));
        assert!(!err.is_io_error());
    }

    #[test]
    fn io_error_roundtrips_through_conversions() {
        let err = Error::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(err.is_io_error());
        assert!(err.position().is_none());
        let ioerr: io::Error = err.into();
        assert_eq!(ioerr.to_string(), "boom");
    }
}
