use std::cmp;
use std::io;
use std::result;

use csv_stream_core::{WriteResult, Writer as CoreWriter};
use tracing::debug;

use crate::byte_record::ByteRecord;
use crate::error::{IntoInnerError, Result};

/// The starting size of the buffer each row is encoded into.
const DEFAULT_ROW_CAPACITY: usize = 8 * (1 << 10);

/// Builds a CSV writer with various configuration knobs.
///
/// The output dialect is fixed: `,` between fields, `"` around fields that
/// need it and `\n` after every row.
#[derive(Debug)]
pub struct WriterBuilder {
    capacity: usize,
}

impl Default for WriterBuilder {
    fn default() -> WriterBuilder {
        WriterBuilder { capacity: DEFAULT_ROW_CAPACITY }
    }
}

impl WriterBuilder {
    /// Create a new builder for configuring CSV writing.
    ///
    /// To convert a builder into a writer, call `WriterBuilder::from_writer`.
    pub fn new() -> WriterBuilder {
        WriterBuilder::default()
    }

    /// Build a CSV writer from this configuration that writes data to `wtr`.
    ///
    /// Note that the CSV writer does no buffering across rows. Every row is
    /// handed to `wtr` with a single `write_all`, so wrapping `wtr` in an
    /// `io::BufWriter` is worthwhile when it is expensive to write to.
    pub fn from_writer<W: io::Write>(&self, wtr: W) -> Writer<W> {
        Writer::new(self, wtr)
    }

    /// Set the initial capacity of the buffer a row is encoded into.
    ///
    /// The buffer grows as needed to fit the largest row written. A capacity
    /// of `0` is treated as `1`.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut WriterBuilder {
        self.capacity = cmp::max(1, capacity);
        self
    }
}

/// A CSV writer that writes rows to any `io::Write`.
///
/// A field is wrapped in quotes, with inner quotes doubled, if and only if
/// it contains `,`, `"`, `\n` or `\r`. Every row, including a row without
/// fields, is terminated by a single `\n`.
///
/// Each call to `write_record` results in exactly one `write_all` on the
/// underlying writer. Nothing is flushed between rows; the underlying writer
/// is flushed by `flush`, by `into_inner` and (ignoring errors) when the
/// CSV writer is dropped.
///
/// # Example
///
/// ```
/// use std::error::Error;
/// use csv_stream::Writer;
///
/// # fn main() { example().unwrap(); }
/// fn example() -> Result<(), Box<dyn Error>> {
///     let mut wtr = Writer::from_writer(vec![]);
///     wtr.write_record(&["a,b", "c\"d", "plain"])?;
///     wtr.write_record(&["", ""])?;
///
///     let data = String::from_utf8(wtr.into_inner()?)?;
///     assert_eq!(data, "\"a,b\",\"c\"\"d\",plain\n,\n");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Writer<W: io::Write> {
    core: CoreWriter,
    /// `None` only after `into_inner` has moved the writer out.
    wtr: Option<W>,
    /// Scratch space a row is encoded into before it is written.
    buf: Vec<u8>,
}

impl<W: io::Write> Drop for Writer<W> {
    fn drop(&mut self) {
        if let Some(ref mut wtr) = self.wtr {
            if let Err(err) = wtr.flush() {
                debug!(error = %err, "failed to flush CSV writer on drop");
            }
        }
    }
}

impl<W: io::Write> Writer<W> {
    fn new(builder: &WriterBuilder, wtr: W) -> Writer<W> {
        Writer {
            core: CoreWriter::new(),
            wtr: Some(wtr),
            buf: vec![0; builder.capacity],
        }
    }

    /// Build a CSV writer with a default configuration that writes data to
    /// `wtr`.
    ///
    /// To customize CSV writing, use a `WriterBuilder`.
    pub fn from_writer(wtr: W) -> Writer<W> {
        WriterBuilder::new().from_writer(wtr)
    }

    /// Write a single row.
    ///
    /// This method accepts something that can be turned into an iterator
    /// that yields elements that can be represented by a `&[u8]`.
    ///
    /// An empty iterator writes a bare `\n`. Note that such a row reads back
    /// as a row with one empty field.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use csv_stream::Writer;
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let mut wtr = Writer::from_writer(vec![]);
    ///     wtr.write_record(&["a", "b", "c"])?;
    ///     wtr.write_record(&[b"x".to_vec(), b"y\nz".to_vec()])?;
    ///
    ///     let data = String::from_utf8(wtr.into_inner()?)?;
    ///     assert_eq!(data, "a,b,c\nx,\"y\nz\"\n");
    ///     Ok(())
    /// }
    /// ```
    pub fn write_record<I, T>(&mut self, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut len = 0;
        for (i, field) in record.into_iter().enumerate() {
            if i > 0 {
                len = self.encode_delimiter(len);
            }
            len = self.encode_field(field.as_ref(), len);
        }
        len = self.encode_terminator(len);
        let wtr = match self.wtr {
            Some(ref mut wtr) => wtr,
            None => unreachable!("CSV writer used after into_inner"),
        };
        wtr.write_all(&self.buf[..len])?;
        Ok(())
    }

    /// Write a single `ByteRecord`.
    ///
    /// This is equivalent to `write_record(record.iter())`.
    pub fn write_byte_record(&mut self, record: &ByteRecord) -> Result<()> {
        self.write_record(record.iter())
    }

    /// Write every row yielded by `records`, in order.
    ///
    /// Writing stops at the first error.
    ///
    /// # Example
    ///
    /// ```
    /// use std::error::Error;
    /// use csv_stream::Writer;
    ///
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let rows = vec![vec!["name", "age"], vec!["Alice", "28"]];
    ///     let mut wtr = Writer::from_writer(vec![]);
    ///     wtr.write_records(&rows)?;
    ///
    ///     let data = String::from_utf8(wtr.into_inner()?)?;
    ///     assert_eq!(data, "name,age\nAlice,28\n");
    ///     Ok(())
    /// }
    /// ```
    pub fn write_records<I, R, T>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        match self.wtr {
            Some(ref mut wtr) => wtr.flush(),
            None => Ok(()),
        }
    }

    /// Returns a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        match self.wtr {
            Some(ref wtr) => wtr,
            None => unreachable!("CSV writer used after into_inner"),
        }
    }

    /// Flush the underlying writer and return it.
    ///
    /// If flushing fails, the error is returned along with this CSV writer,
    /// which still owns the underlying writer.
    pub fn into_inner(
        mut self,
    ) -> result::Result<W, IntoInnerError<Writer<W>>> {
        match self.flush() {
            Ok(()) => match self.wtr.take() {
                Some(wtr) => Ok(wtr),
                None => unreachable!("CSV writer used after into_inner"),
            },
            Err(err) => {
                debug!(error = %err, "failed to flush CSV writer");
                Err(IntoInnerError::new(self, err))
            }
        }
    }

    /// Encode `field` into the row buffer at `len`, returning the new length.
    fn encode_field(&mut self, mut field: &[u8], mut len: usize) -> usize {
        loop {
            let (res, nin, nout) = self.core.field(field, &mut self.buf[len..]);
            field = &field[nin..];
            len += nout;
            match res {
                WriteResult::InputEmpty => return len,
                WriteResult::OutputFull => self.expand(),
            }
        }
    }

    fn encode_delimiter(&mut self, mut len: usize) -> usize {
        loop {
            let (res, nout) = self.core.delimiter(&mut self.buf[len..]);
            len += nout;
            match res {
                WriteResult::InputEmpty => return len,
                WriteResult::OutputFull => self.expand(),
            }
        }
    }

    fn encode_terminator(&mut self, mut len: usize) -> usize {
        loop {
            let (res, nout) = self.core.terminator(&mut self.buf[len..]);
            len += nout;
            match res {
                WriteResult::InputEmpty => return len,
                WriteResult::OutputFull => self.expand(),
            }
        }
    }

    fn expand(&mut self) {
        let new_len = cmp::max(1, self.buf.len().saturating_mul(2));
        self.buf.resize(new_len, 0);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use crate::byte_record::ByteRecord;
    use crate::error::Error;
    use crate::string_record::StringRecord;

    use super::{Writer, WriterBuilder};

    fn wtr_as_string(wtr: Writer<Vec<u8>>) -> String {
        String::from_utf8(wtr.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn one_record() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_record(&["a", "b", "c"]).unwrap();

        assert_eq!(wtr_as_string(wtr), "a,b,c\n");
    }

    #[test]
    fn one_string_record() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_record(&StringRecord::from(vec!["a", "b", "c"])).unwrap();

        assert_eq!(wtr_as_string(wtr), "a,b,c\n");
    }

    #[test]
    fn one_byte_record() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_byte_record(&ByteRecord::from(vec!["a", "b,", "c"]))
            .unwrap();

        assert_eq!(wtr_as_string(wtr), "a,\"b,\",c\n");
    }

    #[test]
    fn one_empty_record() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_record(&[""]).unwrap();

        assert_eq!(wtr_as_string(wtr), "\n");
    }

    #[test]
    fn zero_field_record() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_record(Vec::<&str>::new()).unwrap();

        assert_eq!(wtr_as_string(wtr), "\n");
    }

    #[test]
    fn two_empty_fields() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_record(&["", ""]).unwrap();

        assert_eq!(wtr_as_string(wtr), ",\n");
    }

    #[test]
    fn quoting_rules() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_record(&["a\rb", "a\nb", "a\"b", "a,b", " a b "]).unwrap();

        assert_eq!(
            wtr_as_string(wtr),
            "\"a\rb\",\"a\nb\",\"a\"\"b\",\"a,b\", a b \n"
        );
    }

    #[test]
    fn tiny_row_buffer_grows() {
        let long = "\"".repeat(50);
        let mut wtr =
            WriterBuilder::new().buffer_capacity(0).from_writer(vec![]);
        wtr.write_record(&["abc", long.as_str(), "x,y"]).unwrap();

        let expected = format!("abc,\"{}\",\"x,y\"\n", "\"".repeat(100));
        assert_eq!(wtr_as_string(wtr), expected);
    }

    #[test]
    fn write_records_in_order() {
        let mut wtr = Writer::from_writer(vec![]);
        wtr.write_records(vec![vec!["1"], vec!["2", "3"], vec![]]).unwrap();

        assert_eq!(wtr_as_string(wtr), "1\n2,3\n\n");
    }

    /// Records every call to `write` and `flush`.
    #[derive(Debug, Default)]
    struct Recorder {
        writes: Vec<Vec<u8>>,
        flushes: usize,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn one_write_per_row_and_no_implicit_flush() {
        let mut wtr = Writer::from_writer(Recorder::default());
        wtr.write_record(&["a", "b\nc"]).unwrap();
        wtr.write_record(&["d"]).unwrap();

        assert_eq!(wtr.get_ref().writes.len(), 2);
        assert_eq!(wtr.get_ref().writes[0], b"a,\"b\nc\"\n".to_vec());
        assert_eq!(wtr.get_ref().flushes, 0);

        let rec = wtr.into_inner().unwrap();
        assert_eq!(rec.flushes, 1);
    }

    #[derive(Debug)]
    struct Broken {
        fail_flush: bool,
    }

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            if self.fail_flush {
                Err(io::Error::new(io::ErrorKind::Other, "flush failed"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn write_error_is_propagated() {
        let mut wtr = Writer::from_writer(Broken { fail_flush: false });
        match wtr.write_record(&["a"]) {
            Err(Error::Io(err)) => assert_eq!(err.to_string(), "disk full"),
            res => panic!("expected io error, got {:?}", res),
        }
    }

    #[test]
    fn into_inner_flush_error_returns_writer() {
        let wtr = Writer::from_writer(Broken { fail_flush: true });
        let err = wtr.into_inner().unwrap_err();
        assert_eq!(err.error().to_string(), "flush failed");
        let wtr = err.into_inner();
        assert!(wtr.get_ref().fail_flush);
    }

    /// Counts flushes through a handle that outlives the writer.
    #[derive(Debug)]
    struct SharedFlushes(Rc<Cell<usize>>);

    impl Write for SharedFlushes {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn drop_flushes_once() {
        let flushes = Rc::new(Cell::new(0));
        let mut wtr = Writer::from_writer(SharedFlushes(flushes.clone()));
        wtr.write_record(&["a"]).unwrap();
        assert_eq!(flushes.get(), 0);

        drop(wtr);
        assert_eq!(flushes.get(), 1);
    }

    #[test]
    fn drop_ignores_flush_error() {
        let wtr = Writer::from_writer(Broken { fail_flush: true });
        drop(wtr);
    }
}
