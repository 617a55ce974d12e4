use std::cmp;
use std::io;

use csv_stream_core::{ReadRecordResult, Reader as CoreReader};
use tracing::{debug, trace};

use crate::byte_record::{ByteRecord, Position};
use crate::error::{Error, Result};
use crate::string_record::StringRecord;

/// The number of bytes requested from the underlying reader on each refill,
/// unless configured otherwise.
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * (1 << 10);

/// Builds a CSV reader with various configuration knobs.
///
/// The delimiter, quote and row terminators are fixed, so the knobs only
/// control how input is buffered and how strictly it is checked.
#[derive(Debug)]
pub struct ReaderBuilder {
    capacity: usize,
    strict_quotes: bool,
}

impl Default for ReaderBuilder {
    fn default() -> ReaderBuilder {
        ReaderBuilder {
            capacity: DEFAULT_BUFFER_CAPACITY,
            strict_quotes: false,
        }
    }
}

impl ReaderBuilder {
    /// Create a new builder for configuring CSV parsing.
    ///
    /// To convert a builder into a reader, call `ReaderBuilder::from_reader`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use csv_stream::{ReaderBuilder, StringRecord};
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let data = "\
    /// city,country,pop
    /// Boston,United States,4628910
    /// ";
    ///     let mut rdr = ReaderBuilder::new().from_reader(data.as_bytes());
    ///
    ///     let mut record = StringRecord::new();
    ///     assert!(rdr.read_record(&mut record)?);
    ///     assert_eq!(record, vec!["city", "country", "pop"]);
    ///     assert!(rdr.read_record(&mut record)?);
    ///     assert_eq!(record, vec!["Boston", "United States", "4628910"]);
    ///     assert!(!rdr.read_record(&mut record)?);
    ///     Ok(())
    /// }
    /// ```
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Build a CSV parser from this configuration that reads data from `rdr`.
    ///
    /// Note that the CSV reader does its own buffering, so `rdr` does not
    /// need to be wrapped in an `io::BufReader`.
    pub fn from_reader<R: io::Read>(&self, rdr: R) -> Reader<R> {
        Reader::new(self, rdr)
    }

    /// Set the number of bytes requested from the underlying reader per
    /// refill.
    ///
    /// Memory used by the reader is bounded by this capacity plus the size of
    /// the largest row. A capacity of `0` is treated as `1`.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut ReaderBuilder {
        self.capacity = cmp::max(1, capacity);
        self
    }

    /// Whether input that ends inside a quoted field is an error.
    ///
    /// This is disabled by default, in which case such a field is closed
    /// with whatever it contains. When enabled, reading that row returns
    /// `Error::UnterminatedQuote` and the reader reports no further rows.
    ///
    /// # Example
    ///
    /// ```
    /// use csv_stream::{Error, ReaderBuilder, StringRecord};
    ///
    /// let mut rdr = ReaderBuilder::new()
    ///     .strict_quotes(true)
    ///     .from_reader("a,\"open".as_bytes());
    /// let mut record = StringRecord::new();
    /// match rdr.read_record(&mut record) {
    ///     Err(Error::UnterminatedQuote { pos }) => assert_eq!(pos.byte(), 0),
    ///     res => panic!("unexpected result: {:?}", res),
    /// }
    /// assert!(!rdr.read_record(&mut record).unwrap());
    /// ```
    pub fn strict_quotes(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.strict_quotes = yes;
        self
    }
}

/// A fixed size read buffer with an index based cursor.
///
/// The buffer is only refilled once every byte in it has been handed to the
/// parser.
#[derive(Debug)]
struct ReadBuffer {
    buf: Box<[u8]>,
    pos: usize,
    end: usize,
    /// Set once the underlying reader has returned `0`. It is never asked
    /// for more data after that.
    eof: bool,
}

impl ReadBuffer {
    fn new(capacity: usize) -> ReadBuffer {
        ReadBuffer {
            buf: vec![0; capacity].into_boxed_slice(),
            pos: 0,
            end: 0,
            eof: false,
        }
    }

    /// Returns the unconsumed bytes, refilling from `rdr` first if there
    /// are none. An empty slice means the input is exhausted.
    fn fill<R: io::Read>(&mut self, rdr: &mut R) -> io::Result<&[u8]> {
        if self.pos >= self.end && !self.eof {
            let n = loop {
                match rdr.read(&mut self.buf) {
                    Ok(n) => break n,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(e),
                }
            };
            trace!(bytes = n, capacity = self.buf.len(), "refilled buffer");
            self.pos = 0;
            self.end = n;
            self.eof = n == 0;
        }
        Ok(&self.buf[self.pos..self.end])
    }

    fn consume(&mut self, n: usize) {
        self.pos = cmp::min(self.end, self.pos + n);
    }
}

/// A CSV reader that parses rows from any `io::Read`.
///
/// The reader is lazy: every call to `read_record` (or every step of one of
/// its iterators) parses exactly one row, refilling its buffer from the
/// underlying reader as needed. Rows are split on `,`, `"` quotes fields,
/// `""` is a literal quote inside a quoted field, and `\n`, `\r\n` or a bare
/// `\r` ends a row.
///
/// Parsing is permissive: the only errors are I/O errors, invalid UTF-8 when
/// reading into a `StringRecord`, and (opt-in) input that ends inside a
/// quoted field.
///
/// # Example
///
/// ```
/// use std::error::Error;
/// use csv_stream::Reader;
///
/// # fn main() { example().unwrap(); }
/// fn example() -> Result<(), Box<dyn Error>> {
///     let data = "name,age\nAlice,28\n\"Smith, J\",40\n";
///     let mut rdr = Reader::from_reader(data.as_bytes());
///     let mut rows = vec![];
///     for result in rdr.records() {
///         let record = result?;
///         rows.push(record.iter().map(String::from).collect::<Vec<_>>());
///     }
///     assert_eq!(rows, vec![
///         vec!["name", "age"],
///         vec!["Alice", "28"],
///         vec!["Smith, J", "40"],
///     ]);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Reader<R> {
    /// The underlying CSV parser.
    core: CoreReader,
    /// The underlying reader.
    rdr: R,
    buf: ReadBuffer,
    state: ReaderState,
}

#[derive(Debug)]
struct ReaderState {
    /// The position of the start of the next record.
    cur_pos: Position,
    /// Whether the reader has been exhausted or has stopped on an error.
    eof: bool,
    /// Whether input ending inside a quoted field is an error.
    strict_quotes: bool,
}

impl<R: io::Read> Reader<R> {
    fn new(builder: &ReaderBuilder, rdr: R) -> Reader<R> {
        Reader {
            core: CoreReader::new(),
            rdr,
            buf: ReadBuffer::new(builder.capacity),
            state: ReaderState {
                cur_pos: Position::new(),
                eof: false,
                strict_quotes: builder.strict_quotes,
            },
        }
    }

    /// Create a new CSV parser with a default configuration for the given
    /// reader.
    ///
    /// To customize CSV parsing, use a `ReaderBuilder`.
    pub fn from_reader(rdr: R) -> Reader<R> {
        ReaderBuilder::new().from_reader(rdr)
    }

    /// Returns a borrowed iterator over all records as strings.
    ///
    /// Each item yielded by this iterator is a `Result<StringRecord, Error>`.
    /// A row that isn't valid UTF-8 yields an error and iteration continues
    /// with the next row. After an I/O error (or an unterminated quote in
    /// strict mode) the iterator is exhausted.
    pub fn records(&mut self) -> StringRecordsIter<R> {
        StringRecordsIter { rdr: self, rec: StringRecord::new() }
    }

    /// Returns an owned iterator over all records as strings.
    ///
    /// This is mostly useful when you want to return a CSV iterator or store
    /// it somewhere.
    pub fn into_records(self) -> StringRecordsIntoIter<R> {
        StringRecordsIntoIter { rdr: self, rec: StringRecord::new() }
    }

    /// Returns a borrowed iterator over all records as raw bytes.
    ///
    /// Each item yielded by this iterator is a `Result<ByteRecord, Error>`.
    /// No UTF-8 validation is performed.
    pub fn byte_records(&mut self) -> ByteRecordsIter<R> {
        ByteRecordsIter { rdr: self, rec: ByteRecord::new() }
    }

    /// Returns an owned iterator over all records as raw bytes.
    pub fn into_byte_records(self) -> ByteRecordsIntoIter<R> {
        ByteRecordsIntoIter { rdr: self, rec: ByteRecord::new() }
    }

    /// Read a single row into the given record. Returns false when no more
    /// records could be read.
    ///
    /// This method is useful when you want to read records as fast as
    /// possible. It's less ergonomic than an iterator, but it permits the
    /// caller to reuse the `StringRecord` allocation, which usually results
    /// in higher throughput.
    ///
    /// If the row is not valid UTF-8, then `Error::Utf8` is returned, the
    /// record is cleared and the reader moves on to the next row.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use csv_stream::{Reader, StringRecord};
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let data = "a,b\r\nc,d\re,f";
    ///     let mut rdr = Reader::from_reader(data.as_bytes());
    ///     let mut record = StringRecord::new();
    ///     let mut count = 0;
    ///     while rdr.read_record(&mut record)? {
    ///         assert_eq!(record.len(), 2);
    ///         count += 1;
    ///     }
    ///     assert_eq!(count, 3);
    ///     Ok(())
    /// }
    /// ```
    pub fn read_record(&mut self, record: &mut StringRecord) -> Result<bool> {
        record.read(self)
    }

    /// Read a single row into the given byte record. Returns false when no
    /// more records could be read.
    ///
    /// This is like `read_record`, except it skips UTF-8 validation.
    pub fn read_byte_record(
        &mut self,
        record: &mut ByteRecord,
    ) -> Result<bool> {
        record.clear();
        record.set_position(Some(self.state.cur_pos.clone()));
        if self.state.eof {
            return Ok(false);
        }
        match self.read_byte_record_impl(record) {
            Ok(true) => {
                self.state.cur_pos.set_record(self.state.cur_pos.record() + 1);
                Ok(true)
            }
            Ok(false) => {
                debug!(
                    records = self.state.cur_pos.record(),
                    bytes = self.state.cur_pos.byte(),
                    "reached end of CSV input"
                );
                self.state.eof = true;
                Ok(false)
            }
            Err(err) => {
                // Whatever was parsed of this row is dropped.
                record.clear();
                self.state.eof = true;
                Err(err)
            }
        }
    }

    fn read_byte_record_impl(
        &mut self,
        record: &mut ByteRecord,
    ) -> Result<bool> {
        let (mut outlen, mut endlen) = (0, 0);
        loop {
            let (res, nin, nout, nend) = {
                let input = self.buf.fill(&mut self.rdr)?;
                if input.is_empty()
                    && self.state.strict_quotes
                    && self.core.in_quoted_field()
                {
                    debug!(
                        record = self.state.cur_pos.record(),
                        line = self.core.line(),
                        "input ended inside a quoted field"
                    );
                    let pos = record
                        .position()
                        .cloned()
                        .unwrap_or_else(|| self.state.cur_pos.clone());
                    return Err(Error::UnterminatedQuote { pos });
                }
                let (fields, ends) = record.as_parts();
                self.core.read_record(
                    input,
                    &mut fields[outlen..],
                    &mut ends[endlen..],
                )
            };
            self.buf.consume(nin);
            let byte = self.state.cur_pos.byte();
            self.state
                .cur_pos
                .set_byte(byte + nin as u64)
                .set_line(self.core.line());
            outlen += nout;
            endlen += nend;
            match res {
                ReadRecordResult::InputEmpty => continue,
                ReadRecordResult::OutputFull => {
                    record.expand_fields();
                    continue;
                }
                ReadRecordResult::OutputEndsFull => {
                    record.expand_ends();
                    continue;
                }
                ReadRecordResult::Record => {
                    record.set_len(endlen);
                    return Ok(true);
                }
                ReadRecordResult::End => return Ok(false),
            }
        }
    }

    /// Returns the current position of this CSV reader.
    ///
    /// This is the position of the start of the next row: the number of
    /// bytes consumed so far, the line number and the number of rows read.
    ///
    /// # Example
    ///
    /// ```
    /// use csv_stream::{Reader, StringRecord};
    ///
    /// let mut rdr = Reader::from_reader("a,b\n\"x\ny\",z\nlast\n".as_bytes());
    /// let mut record = StringRecord::new();
    /// rdr.read_record(&mut record).unwrap();
    /// rdr.read_record(&mut record).unwrap();
    ///
    /// let pos = rdr.position();
    /// assert_eq!((pos.byte(), pos.line(), pos.record()), (12, 4, 2));
    /// ```
    pub fn position(&self) -> &Position {
        &self.state.cur_pos
    }

    /// Returns true if and only if this reader has been exhausted.
    ///
    /// A reader is also done once it has returned an I/O error or rejected
    /// an unterminated quote.
    pub fn is_done(&self) -> bool {
        self.state.eof
    }

    /// Returns a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.rdr
    }

    /// Returns a mutable reference to the underlying reader.
    ///
    /// Note that reading from the underlying reader directly skips whatever
    /// is still in this reader's buffer.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.rdr
    }

    /// Unwraps this CSV reader, returning the underlying reader.
    ///
    /// Note that any leftover data inside this reader's internal buffer is
    /// lost.
    pub fn into_inner(self) -> R {
        self.rdr
    }
}

/// An owned iterator over records as strings.
pub struct StringRecordsIntoIter<R> {
    rdr: Reader<R>,
    rec: StringRecord,
}

impl<R: io::Read> StringRecordsIntoIter<R> {
    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }

    /// Return a mutable reference to the underlying CSV reader.
    pub fn reader_mut(&mut self) -> &mut Reader<R> {
        &mut self.rdr
    }

    /// Drop this iterator and return the underlying CSV reader.
    pub fn into_reader(self) -> Reader<R> {
        self.rdr
    }
}

impl<R: io::Read> Iterator for StringRecordsIntoIter<R> {
    type Item = Result<StringRecord>;

    fn next(&mut self) -> Option<Result<StringRecord>> {
        match self.rdr.read_record(&mut self.rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => None,
        }
    }
}

/// A borrowed iterator over records as strings.
///
/// The lifetime parameter `'r` refers to the lifetime of the underlying
/// CSV `Reader`.
pub struct StringRecordsIter<'r, R: 'r> {
    rdr: &'r mut Reader<R>,
    rec: StringRecord,
}

impl<'r, R: io::Read> StringRecordsIter<'r, R> {
    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }

    /// Return a mutable reference to the underlying CSV reader.
    pub fn reader_mut(&mut self) -> &mut Reader<R> {
        &mut self.rdr
    }
}

impl<'r, R: io::Read> Iterator for StringRecordsIter<'r, R> {
    type Item = Result<StringRecord>;

    fn next(&mut self) -> Option<Result<StringRecord>> {
        match self.rdr.read_record(&mut self.rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => None,
        }
    }
}

/// An owned iterator over records as raw bytes.
pub struct ByteRecordsIntoIter<R> {
    rdr: Reader<R>,
    rec: ByteRecord,
}

impl<R: io::Read> ByteRecordsIntoIter<R> {
    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }

    /// Return a mutable reference to the underlying CSV reader.
    pub fn reader_mut(&mut self) -> &mut Reader<R> {
        &mut self.rdr
    }

    /// Drop this iterator and return the underlying CSV reader.
    pub fn into_reader(self) -> Reader<R> {
        self.rdr
    }
}

impl<R: io::Read> Iterator for ByteRecordsIntoIter<R> {
    type Item = Result<ByteRecord>;

    fn next(&mut self) -> Option<Result<ByteRecord>> {
        match self.rdr.read_byte_record(&mut self.rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => None,
        }
    }
}

/// A borrowed iterator over records as raw bytes.
///
/// The lifetime parameter `'r` refers to the lifetime of the underlying
/// CSV `Reader`.
pub struct ByteRecordsIter<'r, R: 'r> {
    rdr: &'r mut Reader<R>,
    rec: ByteRecord,
}

impl<'r, R: io::Read> ByteRecordsIter<'r, R> {
    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.rdr
    }

    /// Return a mutable reference to the underlying CSV reader.
    pub fn reader_mut(&mut self) -> &mut Reader<R> {
        &mut self.rdr
    }
}

impl<'r, R: io::Read> Iterator for ByteRecordsIter<'r, R> {
    type Item = Result<ByteRecord>;

    fn next(&mut self) -> Option<Result<ByteRecord>> {
        match self.rdr.read_byte_record(&mut self.rec) {
            Err(err) => Some(Err(err)),
            Ok(true) => Some(Ok(self.rec.clone())),
            Ok(false) => None,
        }
    }
}
