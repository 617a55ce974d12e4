/*!
`csv-stream-core` provides a push based CSV parser and a field encoder that
never allocate and never perform I/O.

The parser is an explicit finite state machine. Callers hand it slices of
input and slices of output; it reports how much of each it used and why it
stopped. Because all look-ahead lives in the machine's state rather than in
the input slice, a row can be split across input slices at any byte and
still parse identically.

The format is fixed: `,` separates fields, `"` quotes them, `""` is a
literal quote inside a quoted field, and `\n`, `\r\n` or a bare `\r` ends a
row. The encoder produces `\n` terminated rows and quotes a field only when
it contains `,`, `"`, `\n` or `\r`.

# Example: parsing one row at a time

```
use csv_stream_core::{ReadRecordResult, Reader};

let data = "name,age\nAlice,28\n";
let mut rdr = Reader::new();
let mut input = data.as_bytes();
let mut output = [0; 1024];
let mut ends = [0; 16];
let mut rows = 0;
loop {
    let (res, nin, _, _) = rdr.read_record(input, &mut output, &mut ends);
    input = &input[nin..];
    match res {
        ReadRecordResult::InputEmpty => continue,
        ReadRecordResult::OutputFull | ReadRecordResult::OutputEndsFull => {
            panic!("buffers too small")
        }
        ReadRecordResult::Record => rows += 1,
        ReadRecordResult::End => break,
    }
}
assert_eq!(rows, 2);
```
*/

#![deny(missing_docs)]
#![no_std]

#[cfg(test)]
extern crate std;

pub use crate::reader::{ReadFieldResult, ReadRecordResult, Reader};
pub use crate::writer::{quote_needed, WriteResult, Writer};

mod reader;
mod writer;
