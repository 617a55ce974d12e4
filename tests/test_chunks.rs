use std::io::Read;

use csv_stream::{ByteRecord, ReaderBuilder, Writer};

/// A reader that never returns more than `limit` bytes from one `read`.
#[derive(Debug)]
struct ChunkReader<'a> {
    data: &'a [u8],
    limit: usize,
}

impl<'a> Read for ChunkReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = std::cmp::min(buf.len(), self.data.len());
        let n = std::cmp::min(self.limit, n);
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

fn parse_chunked(data: &[u8], chunk: usize) -> Vec<ByteRecord> {
    let rdr = ChunkReader { data, limit: chunk };
    ReaderBuilder::new()
        .buffer_capacity(chunk)
        .from_reader(rdr)
        .into_byte_records()
        .collect::<Result<_, _>>()
        .unwrap()
}

fn assert_chunk_invariant(data: &[u8]) -> Vec<ByteRecord> {
    let expected = parse_chunked(data, 1_000_000);
    for &chunk in &[1, 2, 3, 16, 4096] {
        let got = parse_chunked(data, chunk);
        assert_eq!(expected, got, "chunk size {}", chunk);
    }
    expected
}

#[test]
fn split_inside_escaped_quote() {
    // Every split of `""` falls on a chunk boundary with chunk size 1.
    let recs = assert_chunk_invariant(b"\"a\"\"\"\"b\",\"\"\"\"\n");
    assert_eq!(recs, vec![ByteRecord::from(vec!["a\"\"b", "\""])]);
}

#[test]
fn split_inside_crlf() {
    let recs = assert_chunk_invariant(b"a,b\r\nc,d\r\n\r\ne\r");
    assert_eq!(recs, vec![
        ByteRecord::from(vec!["a", "b"]),
        ByteRecord::from(vec!["c", "d"]),
        ByteRecord::from(vec![""]),
        ByteRecord::from(vec!["e"]),
    ]);
}

#[test]
fn split_after_closing_quote() {
    let recs = assert_chunk_invariant(b"\"x\"\r\n\"y\",\"z\"");
    assert_eq!(recs, vec![
        ByteRecord::from(vec!["x"]),
        ByteRecord::from(vec!["y", "z"]),
    ]);
}

#[test]
fn split_inside_multibyte_characters() {
    let data = "\u{0394}\u{1F600},\"\u{e9}\n\u{e9}\"\n".as_bytes();
    let recs = assert_chunk_invariant(data);
    assert_eq!(recs.len(), 1);
    assert_eq!(&recs[0][0], "\u{0394}\u{1F600}".as_bytes());
    assert_eq!(&recs[0][1], "\u{e9}\n\u{e9}".as_bytes());
}

#[test]
fn large_generated_file() {
    let mut wtr = Writer::from_writer(vec![]);
    for i in 0..2_000 {
        let quoted = format!("row {} says \"hi\",\r\nbye", i);
        let plain = i.to_string();
        let empty = "";
        wtr.write_record(&[plain.as_str(), quoted.as_str(), empty])
            .unwrap();
    }
    let data = wtr.into_inner().unwrap();
    assert!(data.len() > 4096 * 4);

    let recs = assert_chunk_invariant(&data);
    assert_eq!(recs.len(), 2_000);
    assert_eq!(recs[1999], vec!["1999", "row 1999 says \"hi\",\r\nbye", ""]);
}

#[test]
fn positions_do_not_depend_on_chunks() {
    let data = b"a,\"b\r\nc\"\r\nd\ne\r\r\n";
    let positions = |chunk: usize| -> Vec<(u64, u64, u64)> {
        parse_chunked(data, chunk)
            .iter()
            .map(|rec| {
                let pos = rec.position().unwrap();
                (pos.byte(), pos.line(), pos.record())
            })
            .collect()
    };
    let expected = positions(1_000_000);
    assert_eq!(
        expected,
        vec![(0, 1, 0), (10, 3, 1), (12, 4, 2), (14, 4, 3)]
    );
    for &chunk in &[1, 16, 4096] {
        assert_eq!(expected, positions(chunk), "chunk size {}", chunk);
    }
}
