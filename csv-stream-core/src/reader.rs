/// The result of parsing at most one field from CSV data.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadFieldResult {
    /// The caller provided input was exhausted before the end of a field or
    /// record was found.
    InputEmpty,
    /// The caller provided output buffer was filled before an entire field
    /// could be written to it.
    OutputFull,
    /// The end of a field was found.
    ///
    /// Note that when `record_end` is true, then the end of this field also
    /// corresponds to the end of a record.
    Field {
        /// Whether this was the last field in a record or not.
        record_end: bool,
    },
    /// All CSV data has been read.
    ///
    /// This state can only be returned when an empty input buffer is provided
    /// by the caller.
    End,
}

/// The result of parsing at most one record from CSV data.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadRecordResult {
    /// The caller provided input was exhausted before the end of a record was
    /// found.
    InputEmpty,
    /// The caller provided output buffer was filled before an entire field
    /// could be written to it.
    OutputFull,
    /// The caller provided output buffer of field end positions was filled
    /// before the next field could be parsed.
    OutputEndsFull,
    /// The end of a record was found.
    Record,
    /// All CSV data has been read.
    ///
    /// This state can only be returned when an empty input buffer is provided
    /// by the caller.
    End,
}

/// The states of the parser.
///
/// `QuoteInQuotedField` and `CrLf` are the two look-ahead states: each is
/// entered after a byte whose meaning depends on the byte that follows it.
/// Keeping the look-ahead in the state (instead of peeking into the input)
/// is what makes parsing independent of where input slices are split.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    /// Nothing of the current record has been consumed yet.
    StartRecord,
    /// Inside an unquoted field, or at the start of a field that follows a
    /// delimiter.
    InField,
    /// Inside a quoted field.
    InQuotedField,
    /// A quote was seen inside a quoted field. It is either the first half
    /// of an escaped quote or the end of quoting.
    QuoteInQuotedField,
    /// A `\r` ended the record. A directly following `\n` belongs to the
    /// same terminator.
    CrLf,
    /// All input has been consumed and no record is pending.
    End,
}

/// What a transition does with the byte that triggered it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Action {
    /// Drop the byte. (It is syntax, or it is not consumed at all.)
    Discard,
    /// Copy the byte into the current field.
    Copy,
    /// Close the current field. More fields follow in this record.
    EndField,
    /// Close the current field and the record.
    EndRecord,
}

impl State {
    /// Computes the transition for the byte `b` in this state.
    ///
    /// The returned flag reports whether `b` was consumed. When it is not,
    /// the caller must feed `b` again to the new state.
    fn transition(self, b: u8) -> (State, Action, bool) {
        use self::Action::*;
        use self::State::*;

        match self {
            StartRecord | InField => match b {
                b'"' => (InQuotedField, Discard, true),
                b',' => (InField, EndField, true),
                b'\n' => (StartRecord, EndRecord, true),
                b'\r' => (CrLf, Discard, true),
                _ => (InField, Copy, true),
            },
            InQuotedField => match b {
                b'"' => (QuoteInQuotedField, Discard, true),
                _ => (InQuotedField, Copy, true),
            },
            QuoteInQuotedField => match b {
                b'"' => (InQuotedField, Copy, true),
                _ => (InField, Discard, false),
            },
            CrLf => (StartRecord, EndRecord, b == b'\n'),
            End => (End, Discard, false),
        }
    }
}

/// A push based CSV reader.
///
/// This reader parses CSV data using a finite state machine. Callers can
/// extract parsed data incrementally using either `read_field` or
/// `read_record`. The two shouldn't be mixed within a single record.
///
/// The parser is permissive and never returns an error:
///
/// * `\n`, `\r\n` and `\r` each end a record. A blank line is a record with
///   one empty field.
/// * A quote anywhere outside of quotes starts quoting, so `a"b,c"d` is the
///   single field `ab,cd`.
/// * If the input ends inside a quoted field, the field is closed with
///   whatever it contains. `in_quoted_field` lets a caller detect this.
/// * At the end of input, a trailing record is only produced when its
///   current field is non-empty or at least one of its fields was already
///   closed. So the input `""` contains no records at all, while `""\n`
///   contains one record with one empty field.
#[derive(Clone, Debug)]
pub struct Reader {
    /// The current state of the parser.
    state: State,
    /// The current line number.
    line: u64,
    /// The number of bytes written for the current record, across calls to
    /// `read_record`.
    output_pos: usize,
    /// The number of bytes in the current field.
    field_len: usize,
    /// The number of fields closed so far in the current record.
    nfields: usize,
}

impl Default for Reader {
    fn default() -> Reader {
        Reader {
            state: State::StartRecord,
            line: 1,
            output_pos: 0,
            field_len: 0,
            nfields: 0,
        }
    }
}

impl Reader {
    /// Create a new CSV reader.
    pub fn new() -> Reader {
        Reader::default()
    }

    /// Reset the parser such that it behaves as if it had never been used.
    pub fn reset(&mut self) {
        *self = Reader::default();
    }

    /// Return the current line number as measured by the number of
    /// occurrences of `\n`.
    ///
    /// Line numbers starts at `1` and are reset when `reset` is called.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Returns true if and only if the parser is inside a quoted field whose
    /// closing quote hasn't been seen yet.
    ///
    /// Checking this right before signaling the end of input tells a caller
    /// that the data ends with an unterminated quoted field.
    pub fn in_quoted_field(&self) -> bool {
        self.state == State::InQuotedField
    }

    /// Parse a single CSV field in `input` and copy field data to `output`.
    ///
    /// The field data copied to `output` has its quotes unescaped. The
    /// returned counts are the number of bytes read from `input` and written
    /// to `output`, respectively.
    ///
    /// # Termination
    ///
    /// An empty `input` buffer means there is no CSV data left to read. Once
    /// the caller has exhausted all CSV data, it should continue to call
    /// `read_field` with an empty input buffer until `ReadFieldResult::End`
    /// is returned.
    pub fn read_field(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> (ReadFieldResult, usize, usize) {
        if self.state == State::End {
            return (ReadFieldResult::End, 0, 0);
        }
        if input.is_empty() {
            return if self.has_pending_record() {
                self.start_record();
                (ReadFieldResult::Field { record_end: true }, 0, 0)
            } else {
                self.finish();
                (ReadFieldResult::End, 0, 0)
            };
        }
        let (mut nin, mut nout) = (0, 0);
        let mut res = ReadFieldResult::InputEmpty;
        while nin < input.len() {
            let b = input[nin];
            let (next, action, consumed) = self.state.transition(b);
            match action {
                Action::Discard => {}
                Action::Copy => {
                    if nout >= output.len() {
                        res = ReadFieldResult::OutputFull;
                        break;
                    }
                    output[nout] = b;
                    nout += 1;
                    self.field_len += 1;
                }
                Action::EndField => {
                    self.field_len = 0;
                    self.nfields += 1;
                    res = ReadFieldResult::Field { record_end: false };
                }
                Action::EndRecord => {
                    res = ReadFieldResult::Field { record_end: true };
                }
            }
            self.state = next;
            if consumed {
                nin += 1;
                self.line += (b == b'\n') as u64;
            }
            if action == Action::EndRecord {
                self.start_record();
                break;
            }
            if action == Action::EndField {
                break;
            }
        }
        (res, nin, nout)
    }

    /// Parse a single CSV record in `input` and copy each field contiguously
    /// to `output`, with the end position of each field written to `ends`.
    ///
    /// Field data in `output` has its quotes unescaped. The end positions
    /// in `ends` are relative to the start of the record, even when a record
    /// is spread across multiple calls; it is the caller's job to keep
    /// passing the unused tails of its output buffers.
    ///
    /// The returned counts are the number of bytes read from `input`, the
    /// number of bytes written to `output` and the number of end positions
    /// written to `ends`, respectively.
    ///
    /// # Termination
    ///
    /// An empty `input` buffer means there is no CSV data left to read.
    /// Doing so may still produce one final record. The caller should
    /// continue to call `read_record` with an empty input buffer until
    /// `ReadRecordResult::End` is returned.
    pub fn read_record(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        ends: &mut [usize],
    ) -> (ReadRecordResult, usize, usize, usize) {
        if self.state == State::End {
            return (ReadRecordResult::End, 0, 0, 0);
        }
        if input.is_empty() {
            return self.read_record_final(ends);
        }
        let (mut nin, mut nout, mut nend) = (0, 0, 0);
        let mut res = ReadRecordResult::InputEmpty;
        while nin < input.len() {
            let b = input[nin];
            let (next, action, consumed) = self.state.transition(b);
            match action {
                Action::Discard => {}
                Action::Copy => {
                    if nout >= output.len() {
                        res = ReadRecordResult::OutputFull;
                        break;
                    }
                    output[nout] = b;
                    nout += 1;
                    self.field_len += 1;
                }
                Action::EndField | Action::EndRecord => {
                    if nend >= ends.len() {
                        res = ReadRecordResult::OutputEndsFull;
                        break;
                    }
                    ends[nend] = self.output_pos + nout;
                    nend += 1;
                    self.field_len = 0;
                    self.nfields += 1;
                }
            }
            self.state = next;
            if consumed {
                nin += 1;
                self.line += (b == b'\n') as u64;
            }
            if action == Action::EndRecord {
                res = ReadRecordResult::Record;
                break;
            }
        }
        if res == ReadRecordResult::Record {
            self.start_record();
        } else {
            self.output_pos += nout;
        }
        (res, nin, nout, nend)
    }

    fn read_record_final(
        &mut self,
        ends: &mut [usize],
    ) -> (ReadRecordResult, usize, usize, usize) {
        if !self.has_pending_record() {
            self.finish();
            return (ReadRecordResult::End, 0, 0, 0);
        }
        if ends.is_empty() {
            return (ReadRecordResult::OutputEndsFull, 0, 0, 0);
        }
        ends[0] = self.output_pos;
        self.start_record();
        (ReadRecordResult::Record, 0, 0, 1)
    }

    /// Whether the end of input closes a record that is still open.
    fn has_pending_record(&self) -> bool {
        match self.state {
            State::StartRecord | State::End => false,
            State::CrLf => true,
            State::InField
            | State::InQuotedField
            | State::QuoteInQuotedField => {
                self.field_len > 0 || self.nfields > 0
            }
        }
    }

    fn start_record(&mut self) {
        self.state = State::StartRecord;
        self.output_pos = 0;
        self.field_len = 0;
        self.nfields = 0;
    }

    fn finish(&mut self) {
        self.start_record();
        self.state = State::End;
    }
}
