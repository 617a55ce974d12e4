#![no_main]
use libfuzzer_sys::fuzz_target;

use csv_stream::{ByteRecord, Reader, ReaderBuilder, Writer};

fn parse(data: &[u8], capacity: usize) -> Vec<ByteRecord> {
    ReaderBuilder::new()
        .buffer_capacity(capacity)
        .from_reader(data)
        .into_byte_records()
        .collect::<Result<_, _>>()
        .unwrap()
}

fuzz_target!(|data: &[u8]| {
    let records = parse(data, 8 * 1024);
    assert_eq!(records, parse(data, 1));

    // Anything the reader produced must survive a write and a re-read.
    let mut wtr = Writer::from_writer(vec![]);
    for rec in &records {
        wtr.write_byte_record(rec).unwrap();
    }
    let written = wtr.into_inner().unwrap();
    let reread: Vec<ByteRecord> = Reader::from_reader(&written[..])
        .into_byte_records()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records, reread);
});
