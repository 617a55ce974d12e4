use memchr::{memchr, memchr3};

/// The result of writing CSV data.
///
/// A value of this type is returned from every interaction with `Writer`. It
/// informs the caller how to proceed, namely, by indicating whether more
/// input should be given (`InputEmpty`) or if a bigger output buffer is
/// needed (`OutputFull`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WriteResult {
    /// This result occurs when all of the bytes from the given input have
    /// been processed.
    InputEmpty,
    /// This result occurs when the output buffer was too small to process
    /// all of the input bytes. Generally, this means the caller must call
    /// the corresponding method again with the rest of the input and more
    /// room in the output buffer.
    OutputFull,
}

/// Returns true if and only if the given field must be quoted to survive a
/// round trip through the reader.
///
/// That is the case when it contains a delimiter, a quote, or either of the
/// bytes that can end a record.
pub fn quote_needed(field: &[u8]) -> bool {
    memchr3(b',', b'"', b'\n', field).is_some()
        || memchr(b'\r', field).is_some()
}

/// A writer for CSV data.
///
/// The writer is push based. Callers write a field with `field`, separate
/// fields with `delimiter` and end a record with `terminator`. Every call
/// writes into a caller provided output buffer and can be resumed when that
/// buffer runs out of room.
///
/// Whether a field gets quoted is decided by the first call to `field` for
/// that field, so a field should be handed over whole.
///
/// # RFC 4180
///
/// This writer conforms to RFC 4180 with two exceptions: records are ended
/// by `\n` instead of `\r\n`, and it doesn't guarantee that all records
/// written are of the same length.
#[derive(Clone, Debug, Default)]
pub struct Writer {
    state: WriterState,
}

#[derive(Clone, Debug, Default)]
struct WriterState {
    /// Set once the current field has been started and until it is closed
    /// by `delimiter` or `terminator`.
    in_field: bool,
    /// Whether the current field was opened with a quote.
    quoting: bool,
}

impl Writer {
    /// Creates a new CSV writer.
    pub fn new() -> Writer {
        Writer::default()
    }

    /// Write a single CSV field from `input` to `output` while employing
    /// this writer's quoting rule.
    ///
    /// This returns the result of writing field data, in addition to the
    /// number of bytes consumed from `input` and the number of bytes
    /// written to `output`.
    ///
    /// The result of writing field data is either `WriteResult::InputEmpty`
    /// or `WriteResult::OutputFull`. The former occurs when all bytes in
    /// `input` were copied to `output`, while the latter occurs when
    /// `output` is too small to fit everything from `input`. In the latter
    /// case, callers should call `field` again with the remaining input.
    ///
    /// The closing quote, if any, is written by `delimiter` or `terminator`.
    pub fn field(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> (WriteResult, usize, usize) {
        let mut nout = 0;
        if !self.state.in_field {
            self.state.quoting = quote_needed(input);
            if self.state.quoting {
                if output.is_empty() {
                    return (WriteResult::OutputFull, 0, 0);
                }
                output[0] = b'"';
                nout += 1;
            }
            self.state.in_field = true;
        }
        let (res, i, o) = if self.state.quoting {
            quote(input, &mut output[nout..])
        } else {
            write_optimistic(input, &mut output[nout..])
        };
        (res, i, nout + o)
    }

    /// Write a CSV delimiter to `output`, closing the current field first.
    ///
    /// This returns the result of writing the delimiter and the number of
    /// bytes written to `output`. On `WriteResult::OutputFull`, call this
    /// again with more room; bytes already written are not repeated.
    pub fn delimiter(&mut self, output: &mut [u8]) -> (WriteResult, usize) {
        self.end_field_with(b',', output)
    }

    /// Write a record terminator (`\n`) to `output`, closing the current
    /// field first.
    ///
    /// This returns the result of writing the terminator and the number of
    /// bytes written to `output`. On `WriteResult::OutputFull`, call this
    /// again with more room; bytes already written are not repeated.
    pub fn terminator(&mut self, output: &mut [u8]) -> (WriteResult, usize) {
        self.end_field_with(b'\n', output)
    }

    fn end_field_with(
        &mut self,
        byte: u8,
        output: &mut [u8],
    ) -> (WriteResult, usize) {
        let mut nout = 0;
        if self.state.in_field && self.state.quoting {
            if output.is_empty() {
                return (WriteResult::OutputFull, 0);
            }
            output[0] = b'"';
            nout += 1;
        }
        self.state.in_field = false;
        self.state.quoting = false;
        if nout >= output.len() {
            return (WriteResult::OutputFull, nout);
        }
        output[nout] = byte;
        (WriteResult::InputEmpty, nout + 1)
    }
}

/// Escape quotes in `input` by doubling them and write the result to
/// `output`.
///
/// A doubled quote is never split: if only one byte of room is left when a
/// quote is reached, nothing is written for it.
fn quote(mut input: &[u8], output: &mut [u8]) -> (WriteResult, usize, usize) {
    let (mut nin, mut nout) = (0, 0);
    loop {
        match memchr(b'"', input) {
            None => {
                let (res, i, o) = write_optimistic(input, &mut output[nout..]);
                return (res, nin + i, nout + o);
            }
            Some(next_quote) => {
                let (res, i, o) =
                    write_optimistic(&input[..next_quote], &mut output[nout..]);
                input = &input[i..];
                nin += i;
                nout += o;
                if let WriteResult::OutputFull = res {
                    return (res, nin, nout);
                }
                if output.len() - nout < 2 {
                    return (WriteResult::OutputFull, nin, nout);
                }
                output[nout] = b'"';
                output[nout + 1] = b'"';
                nout += 2;
                input = &input[1..];
                nin += 1;
            }
        }
    }
}

/// Copy as many bytes as possible from `input` to `output`.
fn write_optimistic(
    input: &[u8],
    output: &mut [u8],
) -> (WriteResult, usize, usize) {
    if input.len() > output.len() {
        let n = output.len();
        output.copy_from_slice(&input[..n]);
        (WriteResult::OutputFull, n, n)
    } else {
        let n = input.len();
        output[..n].copy_from_slice(input);
        (WriteResult::InputEmpty, n, n)
    }
}

#[cfg(test)]
mod tests {
    use core::str;

    use arrayvec::ArrayVec;

    use super::{quote_needed, WriteResult, Writer};

    type Out = ArrayVec<u8, 256>;

    /// Writes every row with an output buffer of at most `room` bytes per
    /// call, resuming after each `OutputFull`.
    fn write_rows(rows: &[&[&str]], room: usize) -> Out {
        let mut wtr = Writer::new();
        let mut out = Out::new();
        let mut buf = [0u8; 256];
        for row in rows {
            for (i, field) in row.iter().enumerate() {
                if i > 0 {
                    loop {
                        let (res, n) = wtr.delimiter(&mut buf[..room]);
                        out.try_extend_from_slice(&buf[..n]).unwrap();
                        if res == WriteResult::InputEmpty {
                            break;
                        }
                    }
                }
                let mut field = field.as_bytes();
                loop {
                    let (res, nin, nout) = wtr.field(field, &mut buf[..room]);
                    out.try_extend_from_slice(&buf[..nout]).unwrap();
                    field = &field[nin..];
                    if res == WriteResult::InputEmpty {
                        break;
                    }
                }
            }
            loop {
                let (res, n) = wtr.terminator(&mut buf[..room]);
                out.try_extend_from_slice(&buf[..n]).unwrap();
                if res == WriteResult::InputEmpty {
                    break;
                }
            }
        }
        out
    }

    macro_rules! writes_as {
        ($name:ident, $rows:expr, $expected:expr) => {
            #[test]
            fn $name() {
                let rows: &[&[&str]] = $rows;
                for &room in &[256, 3, 2] {
                    let got = write_rows(rows, room);
                    let got = str::from_utf8(&got).unwrap();
                    assert_eq!($expected, got, "output room: {}", room);
                }
            }
        };
    }

    writes_as!(plain, &[&["a", "b", "c"]], "a,b,c\n");
    writes_as!(empty_fields, &[&["", "", ""]], ",,\n");
    writes_as!(one_empty_field, &[&[""]], "\n");
    writes_as!(no_fields, &[&[]], "\n");
    writes_as!(delimiter, &[&["a,b", "c"]], "\"a,b\",c\n");
    writes_as!(quote, &[&["c\"d"]], "\"c\"\"d\"\n");
    writes_as!(only_quote, &[&["\""]], "\"\"\"\"\n");
    writes_as!(lf, &[&["a\nb"]], "\"a\nb\"\n");
    writes_as!(cr, &[&["a\rb"]], "\"a\rb\"\n");
    writes_as!(
        mixed,
        &[&["a,b", "c\"d", "plain"]],
        "\"a,b\",\"c\"\"d\",plain\n"
    );
    writes_as!(
        many_rows,
        &[&["name", "age"], &["Alice", "28"]],
        "name,age\nAlice,28\n"
    );
    writes_as!(
        said_hi,
        &[&["She said \"Hi\""]],
        "\"She said \"\"Hi\"\"\"\n"
    );
    writes_as!(no_quote_for_spaces, &[&[" a ", "\t"]], " a ,\t\n");

    #[test]
    fn quote_needed_bytes() {
        assert!(!quote_needed(b""));
        assert!(!quote_needed(b"plain text"));
        assert!(quote_needed(b"a,b"));
        assert!(quote_needed(b"\""));
        assert!(quote_needed(b"a\n"));
        assert!(quote_needed(b"\ra"));
    }

    #[test]
    fn field_output_full_before_opening_quote() {
        let mut wtr = Writer::new();
        assert_eq!(wtr.field(b"a,b", &mut []), (WriteResult::OutputFull, 0, 0));

        let mut buf = [0; 8];
        assert_eq!(wtr.field(b"a,b", &mut buf), (WriteResult::InputEmpty, 3, 4));
        assert_eq!(&buf[..4], b"\"a,b");
    }

    #[test]
    fn escaped_quote_is_never_split() {
        let mut wtr = Writer::new();
        let mut buf = [0; 3];
        // Opening quote, `a`, then no room for both bytes of `""`.
        assert_eq!(wtr.field(b"a\"b", &mut buf), (WriteResult::OutputFull, 1, 2));
        assert_eq!(&buf[..2], b"\"a");
        assert_eq!(wtr.field(b"\"b", &mut buf), (WriteResult::InputEmpty, 2, 3));
        assert_eq!(&buf, b"\"\"b");
    }

    #[test]
    fn terminator_resumes_after_closing_quote() {
        let mut wtr = Writer::new();
        let mut buf = [0; 8];
        wtr.field(b"\n", &mut buf);

        let mut one = [0; 1];
        assert_eq!(wtr.terminator(&mut one), (WriteResult::OutputFull, 1));
        assert_eq!(&one, b"\"");
        assert_eq!(wtr.terminator(&mut one), (WriteResult::InputEmpty, 1));
        assert_eq!(&one, b"\n");
    }
}
