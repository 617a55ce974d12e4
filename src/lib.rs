/*!
The `csv-stream` crate provides a streaming CSV reader and writer with
bounded memory use.

The reader parses rows lazily from any `std::io::Read`, one row per call,
refilling a fixed size buffer only once it has been fully consumed. The
writer encodes rows to any `std::io::Write` with one write per row. Both
are built on [`csv-stream-core`](https://docs.rs/csv-stream-core), a push
based state machine that never allocates.

# Format

The dialect is fixed and matches RFC 4180 quoting:

* Fields are separated by `,`.
* A field wrapped in `"` may contain `,`, `\n` and `\r`; a literal quote
  inside it is written as `""`.
* On input, `\n`, `\r\n` and a bare `\r` each end a row, and a row may be
  split across reads at any byte. A blank line is a row with one empty
  field, and the last row does not need a terminator.
* On output, a field is quoted if and only if it contains `,`, `"`, `\n`
  or `\r`, and every row ends with `\n`.

Writing rows and reading them back always yields the same rows, except that
a row with zero fields reads back as a row with one empty field.

# Example: round trip

```
use std::error::Error;
use csv_stream::{Reader, Writer};

# fn main() { example().unwrap(); }
fn example() -> Result<(), Box<dyn Error>> {
    let rows = vec![
        vec!["id", "comment"],
        vec!["1", "She said \"Hi\""],
        vec!["2", "line one\nline two"],
        vec!["3", ""],
    ];

    let mut wtr = Writer::from_writer(vec![]);
    wtr.write_records(&rows)?;
    let data = wtr.into_inner()?;

    let mut rdr = Reader::from_reader(&data[..]);
    let mut got = vec![];
    for result in rdr.records() {
        let record = result?;
        got.push(record.iter().map(String::from).collect::<Vec<_>>());
    }
    assert_eq!(got, rows);
    Ok(())
}
```

# Errors

Reaching the end of the input is not an error. The errors a reader can
return are I/O errors from the underlying reader (after which it reports no
more rows), [`Error::Utf8`] when a row read into a `StringRecord` is not
valid UTF-8 (the row is skipped), and, only if enabled with
[`ReaderBuilder::strict_quotes`], [`Error::UnterminatedQuote`].

# Logging

Events are emitted through [`tracing`](https://docs.rs/tracing): buffer
refills at `TRACE`, and end of input, rejected quotes and failed flushes at
`DEBUG`. No subscriber is installed by this crate.
*/

#![deny(missing_docs)]

pub use csv_stream_core::quote_needed;

pub use crate::byte_record::{ByteRecord, ByteRecordIter, Position};
pub use crate::error::{
    Error, FromUtf8Error, IntoInnerError, Result, Utf8Error,
};
pub use crate::reader::{
    ByteRecordsIntoIter, ByteRecordsIter, Reader, ReaderBuilder,
    StringRecordsIntoIter, StringRecordsIter, DEFAULT_BUFFER_CAPACITY,
};
pub use crate::string_record::{StringRecord, StringRecordIter};
pub use crate::writer::{Writer, WriterBuilder};

mod byte_record;
mod error;
mod reader;
mod string_record;
mod writer;
