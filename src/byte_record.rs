use std::cmp;
use std::fmt;
use std::iter::FromIterator;
use std::ops::{self, Range};
use std::result;
use std::str;

use bstr::{BStr, ByteSlice};

use crate::error::Utf8Error;

/// A single CSV record stored as raw bytes.
///
/// A byte record permits reading or writing CSV rows that are not UTF-8.
/// In general, this should only be used when performance is a priority or
/// when dealing with data that isn't UTF-8.
///
/// All fields are stored contiguously in one buffer along with the end
/// offset of each field, so reading many rows into the same record does not
/// allocate once the buffers are large enough.
#[derive(Clone, Eq)]
pub struct ByteRecord {
    /// All fields in this record, stored contiguously. Bytes past the end of
    /// the last field are spare capacity handed to the parser.
    fields: Vec<u8>,
    /// The number of and location of each field in this record.
    bounds: Bounds,
    /// The position of this record in the CSV data it was read from, if any.
    pos: Option<Position>,
}

impl PartialEq for ByteRecord {
    fn eq(&self, other: &ByteRecord) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().zip(other.iter()).all(|e| e.0 == e.1)
    }
}

impl<T: AsRef<[u8]>> PartialEq<Vec<T>> for ByteRecord {
    fn eq(&self, other: &Vec<T>) -> bool {
        self.iter_eq(other)
    }
}

impl<T: AsRef<[u8]>> PartialEq<[T]> for ByteRecord {
    fn eq(&self, other: &[T]) -> bool {
        self.iter_eq(other)
    }
}

impl fmt::Debug for ByteRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let fields: Vec<&BStr> =
            self.iter().map(|field| field.as_bstr()).collect();
        write!(f, "ByteRecord({:?})", fields)
    }
}

impl Default for ByteRecord {
    fn default() -> ByteRecord {
        ByteRecord::new()
    }
}

impl ByteRecord {
    /// Create a new empty `ByteRecord`.
    ///
    /// Note that you may find the `ByteRecord::from` constructor more
    /// convenient, which is provided by an impl on the `From` trait.
    ///
    /// # Example: create an empty record
    ///
    /// ```
    /// use csv_stream::ByteRecord;
    ///
    /// let record = ByteRecord::new();
    /// assert_eq!(record.len(), 0);
    /// ```
    ///
    /// # Example: initialize a record from a `Vec`
    ///
    /// ```
    /// use csv_stream::ByteRecord;
    ///
    /// let record = ByteRecord::from(vec!["a", "b", "c"]);
    /// assert_eq!(record.len(), 3);
    /// ```
    pub fn new() -> ByteRecord {
        ByteRecord::with_capacity(0, 0)
    }

    /// Create a new empty `ByteRecord` with the given capacity settings.
    ///
    /// `buffer` refers to the capacity of the buffer used to store the
    /// actual row contents, while `fields` refers to the number of fields one
    /// might expect to store.
    pub fn with_capacity(buffer: usize, fields: usize) -> ByteRecord {
        ByteRecord {
            fields: vec![0; buffer],
            bounds: Bounds::with_capacity(fields),
            pos: None,
        }
    }

    /// Returns an iterator over all fields in this record.
    ///
    /// # Example
    ///
    /// ```
    /// use csv_stream::ByteRecord;
    ///
    /// let record = ByteRecord::from(vec!["a", "b"]);
    /// let fields: Vec<&[u8]> = record.iter().collect();
    /// assert_eq!(fields, vec![&b"a"[..], &b"b"[..]]);
    /// ```
    pub fn iter(&self) -> ByteRecordIter {
        self.into_iter()
    }

    /// Return the field at index `i`.
    ///
    /// If no field at index `i` exists, then this returns `None`.
    pub fn get(&self, i: usize) -> Option<&[u8]> {
        self.bounds.get(i).map(|range| &self.fields[range])
    }

    /// Returns true if and only if this record is empty.
    ///
    /// A record read from CSV data is never empty: a blank line is a record
    /// with one empty field.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of fields in this record.
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Clear this record so that it has zero fields.
    ///
    /// This is equivalent to calling `truncate(0)`, and the same caveat
    /// applies: the allocations are kept for reuse.
    ///
    /// Note that it is not necessary to clear the record to reuse it with
    /// the CSV reader.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Truncate this record to `n` fields.
    ///
    /// If `n` is greater than the number of fields in this record, then this
    /// has no effect.
    pub fn truncate(&mut self, n: usize) {
        if n <= self.len() {
            self.bounds.len = n;
        }
    }

    /// Add a new field to this record.
    ///
    /// # Example
    ///
    /// ```
    /// use csv_stream::ByteRecord;
    ///
    /// let mut record = ByteRecord::new();
    /// record.push_field(b"foo");
    /// record.push_field(b"");
    /// assert_eq!(record, vec!["foo", ""]);
    /// ```
    pub fn push_field(&mut self, field: &[u8]) {
        let (s, e) = (self.bounds.end(), self.bounds.end() + field.len());
        while e > self.fields.len() {
            self.expand_fields();
        }
        self.fields[s..e].copy_from_slice(field);
        self.bounds.add(e);
    }

    /// Return the position of this record, if available.
    ///
    /// Records produced by a reader carry the position of their first byte.
    pub fn position(&self) -> Option<&Position> {
        self.pos.as_ref()
    }

    /// Set the position of this record.
    pub fn set_position(&mut self, pos: Option<Position>) {
        self.pos = pos;
    }

    /// Returns the range of bytes (in all of the field data) that field `i`
    /// occupies.
    ///
    /// If no field at index `i` exists, then this returns `None`.
    pub fn range(&self, i: usize) -> Option<Range<usize>> {
        self.bounds.get(i)
    }

    /// Return the entire row as a single byte slice. The slice returned
    /// stores all fields contiguously. The boundaries of each field can be
    /// determined via the `range` method.
    pub fn as_slice(&self) -> &[u8] {
        &self.fields[..self.bounds.end()]
    }

    /// Retrieve the underlying parts of a byte record: the field buffer,
    /// including spare capacity, and the field end offsets.
    pub(crate) fn as_parts(&mut self) -> (&mut Vec<u8>, &mut Vec<usize>) {
        (&mut self.fields, &mut self.bounds.ends)
    }

    /// Set the number of fields in this record.
    pub(crate) fn set_len(&mut self, len: usize) {
        self.bounds.len = len;
    }

    /// Expand the capacity for storing fields.
    pub(crate) fn expand_fields(&mut self) {
        let new_len = self.fields.len().saturating_mul(2);
        self.fields.resize(cmp::max(4, new_len), 0);
    }

    /// Expand the capacity for storing field ending positions.
    pub(crate) fn expand_ends(&mut self) {
        self.bounds.expand();
    }

    /// Validate this record as UTF-8.
    ///
    /// If it's not UTF-8, return an error naming the first offending field.
    /// This never modifies the contents of this record.
    pub(crate) fn validate(&self) -> result::Result<(), Utf8Error> {
        // Structural bytes are all ASCII, so an all-ASCII buffer is valid
        // everywhere.
        if self.as_slice().is_ascii() {
            return Ok(());
        }
        // A multi-byte sequence may straddle two fields, so each field is
        // checked on its own.
        for (i, field) in self.iter().enumerate() {
            if let Err(err) = str::from_utf8(field) {
                return Err(Utf8Error::new(i, err.valid_up_to()));
            }
        }
        Ok(())
    }

    fn iter_eq<I, T>(&self, other: I) -> bool
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut it_record = self.iter();
        let mut it_other = other.into_iter();
        loop {
            match (it_record.next(), it_other.next()) {
                (None, None) => return true,
                (None, Some(_)) | (Some(_), None) => return false,
                (Some(x), Some(y)) => {
                    if x != y.as_ref() {
                        return false;
                    }
                }
            }
        }
    }
}

/// A position in CSV data.
///
/// A position is used to report errors in CSV data. All positions include
/// the byte offset, line number and record index at which the error
/// occurred.
///
/// Byte offsets and record indices start at `0`. Line numbers start at
/// `1` and count `\n` bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Position {
    byte: u64,
    line: u64,
    record: u64,
}

impl Default for Position {
    fn default() -> Position {
        Position::new()
    }
}

impl Position {
    /// Returns a new position initialized to the start value.
    pub fn new() -> Position {
        Position { byte: 0, line: 1, record: 0 }
    }

    /// The byte offset, starting at `0`, of this position.
    pub fn byte(&self) -> u64 {
        self.byte
    }

    /// The line number, starting at `1`, of this position.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// The record index, starting with the first record at `0`.
    pub fn record(&self) -> u64 {
        self.record
    }

    /// Set the byte offset of this position.
    pub fn set_byte(&mut self, byte: u64) -> &mut Position {
        self.byte = byte;
        self
    }

    /// Set the line number of this position.
    ///
    /// If the line number is less than `1`, then this method panics.
    pub fn set_line(&mut self, line: u64) -> &mut Position {
        assert!(line > 0);
        self.line = line;
        self
    }

    /// Set the record index of this position.
    pub fn set_record(&mut self, record: u64) -> &mut Position {
        self.record = record;
        self
    }
}

/// The bounds of fields in a single record.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Bounds {
    /// The ending index of each field. Entries past `len` are scratch space
    /// for the parser.
    ends: Vec<usize>,
    /// The number of fields in this record.
    len: usize,
}

impl Default for Bounds {
    fn default() -> Bounds {
        Bounds::with_capacity(0)
    }
}

impl Bounds {
    fn with_capacity(capacity: usize) -> Bounds {
        Bounds { ends: vec![0; capacity], len: 0 }
    }

    /// Returns the bounds of field `i`.
    fn get(&self, i: usize) -> Option<Range<usize>> {
        if i >= self.len {
            return None;
        }
        let end = match self.ends.get(i) {
            None => return None,
            Some(&end) => end,
        };
        let start = match i.checked_sub(1).and_then(|i| self.ends.get(i)) {
            None => 0,
            Some(&start) => start,
        };
        Some(Range { start, end })
    }

    /// Returns a slice of ending positions of all fields.
    fn ends(&self) -> &[usize] {
        &self.ends[..self.len]
    }

    /// Return the last position of the last field.
    ///
    /// If there are no fields, this returns `0`.
    fn end(&self) -> usize {
        self.ends().last().copied().unwrap_or(0)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn expand(&mut self) {
        let new_len = self.ends.len().saturating_mul(2);
        self.ends.resize(cmp::max(4, new_len), 0);
    }

    /// Add a new field with the given ending position.
    fn add(&mut self, pos: usize) {
        if self.len >= self.ends.len() {
            self.expand();
        }
        self.ends[self.len] = pos;
        self.len += 1;
    }
}

impl ops::Index<usize> for ByteRecord {
    type Output = [u8];

    fn index(&self, i: usize) -> &[u8] {
        match self.get(i) {
            Some(field) => field,
            None => panic!(
                "field index {} out of bounds for record of length {}",
                i,
                self.len()
            ),
        }
    }
}

impl<'a, T: AsRef<[u8]>> From<&'a [T]> for ByteRecord {
    fn from(xs: &'a [T]) -> ByteRecord {
        xs.iter().collect()
    }
}

impl<T: AsRef<[u8]>> From<Vec<T>> for ByteRecord {
    fn from(xs: Vec<T>) -> ByteRecord {
        xs.iter().collect()
    }
}

impl<T: AsRef<[u8]>> FromIterator<T> for ByteRecord {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> ByteRecord {
        let mut rec = ByteRecord::new();
        rec.extend(iter);
        rec
    }
}

impl<T: AsRef<[u8]>> Extend<T> for ByteRecord {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for x in iter {
            self.push_field(x.as_ref());
        }
    }
}

impl<'r> IntoIterator for &'r ByteRecord {
    type IntoIter = ByteRecordIter<'r>;
    type Item = &'r [u8];

    fn into_iter(self) -> ByteRecordIter<'r> {
        ByteRecordIter { r: self, last_start: 0, i_forward: 0 }
    }
}

/// An iterator over the fields in a byte record.
///
/// The `'r` lifetime variable refers to the lifetime of the `ByteRecord`
/// that is being iterated over.
#[derive(Clone)]
pub struct ByteRecordIter<'r> {
    r: &'r ByteRecord,
    /// The start position of the next field.
    last_start: usize,
    /// The index of the next field.
    i_forward: usize,
}

impl<'r> Iterator for ByteRecordIter<'r> {
    type Item = &'r [u8];

    fn next(&mut self) -> Option<&'r [u8]> {
        let end = *self.r.bounds.ends().get(self.i_forward)?;
        let field = &self.r.fields[self.last_start..end];
        self.last_start = end;
        self.i_forward += 1;
        Some(field)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let x = self.r.len() - self.i_forward;
        (x, Some(x))
    }
}

impl<'r> ExactSizeIterator for ByteRecordIter<'r> {}

#[cfg(test)]
mod tests {
    use crate::string_record::StringRecord;

    use super::{ByteRecord, Position};

    fn b(s: &str) -> &[u8] {
        s.as_bytes()
    }

    #[test]
    fn record_1() {
        let mut rec = ByteRecord::new();
        rec.push_field(b"foo");

        assert_eq!(rec.len(), 1);
        assert_eq!(rec.get(0), Some(b("foo")));
        assert_eq!(rec.get(1), None);
        assert_eq!(rec.get(2), None);
    }

    #[test]
    fn record_2() {
        let mut rec = ByteRecord::new();
        rec.push_field(b"foo");
        rec.push_field(b"quux");

        assert_eq!(rec.len(), 2);
        assert_eq!(rec.get(0), Some(b("foo")));
        assert_eq!(rec.get(1), Some(b("quux")));
        assert_eq!(rec.get(2), None);
        assert_eq!(rec.get(3), None);
    }

    #[test]
    fn empty_record() {
        let rec = ByteRecord::new();

        assert_eq!(rec.len(), 0);
        assert!(rec.is_empty());
        assert_eq!(rec.get(0), None);
        assert_eq!(rec.get(1), None);
    }

    #[test]
    fn empty_field_1() {
        let mut rec = ByteRecord::new();
        rec.push_field(b"");

        assert_eq!(rec.len(), 1);
        assert!(!rec.is_empty());
        assert_eq!(rec.get(0), Some(b("")));
        assert_eq!(rec.get(1), None);
        assert_eq!(rec.get(2), None);
    }

    #[test]
    fn empty_field_2() {
        let mut rec = ByteRecord::new();
        rec.push_field(b"");
        rec.push_field(b"");

        assert_eq!(rec.len(), 2);
        assert_eq!(rec.get(0), Some(b("")));
        assert_eq!(rec.get(1), Some(b("")));
        assert_eq!(rec.get(2), None);
        assert_eq!(rec.get(3), None);
    }

    #[test]
    fn empty_surround_1() {
        let mut rec = ByteRecord::new();
        rec.push_field(b"foo");
        rec.push_field(b"");
        rec.push_field(b"quux");

        assert_eq!(rec.len(), 3);
        assert_eq!(rec.get(0), Some(b("foo")));
        assert_eq!(rec.get(1), Some(b("")));
        assert_eq!(rec.get(2), Some(b("quux")));
        assert_eq!(rec.get(3), None);
        assert_eq!(rec.get(4), None);
    }

    #[test]
    fn empty_surround_2() {
        let mut rec = ByteRecord::new();
        rec.push_field(b"foo");
        rec.push_field(b"");
        rec.push_field(b"quux");
        rec.push_field(b"");

        assert_eq!(rec.len(), 4);
        assert_eq!(rec.get(0), Some(b("foo")));
        assert_eq!(rec.get(1), Some(b("")));
        assert_eq!(rec.get(2), Some(b("quux")));
        assert_eq!(rec.get(3), Some(b("")));
        assert_eq!(rec.get(4), None);
        assert_eq!(rec.get(5), None);
    }

    #[test]
    fn push_field_grows_buffer() {
        let mut rec = ByteRecord::with_capacity(2, 1);
        let long = "x".repeat(100);
        rec.push_field(b"ab");
        rec.push_field(long.as_bytes());
        rec.push_field(b"cd");

        assert_eq!(rec.len(), 3);
        assert_eq!(rec.get(1), Some(long.as_bytes()));
        assert_eq!(rec.get(2), Some(b("cd")));
        assert_eq!(rec.as_slice().len(), 104);
        assert_eq!(rec.range(2), Some(102..104));
    }

    #[test]
    fn clear_keeps_allocation_and_reuses() {
        let mut rec = ByteRecord::from(vec!["a", "b", "c"]);
        rec.clear();
        assert!(rec.is_empty());
        assert_eq!(rec.as_slice(), b"");

        rec.push_field(b"z");
        assert_eq!(rec, vec!["z"]);
    }

    #[test]
    fn truncate_past_len_is_noop() {
        let mut rec = ByteRecord::from(vec!["a", "b"]);
        rec.truncate(5);
        assert_eq!(rec.len(), 2);
        rec.truncate(1);
        assert_eq!(rec, vec!["a"]);
    }

    #[test]
    fn eq_ignores_position_and_spare_capacity() {
        let mut x = ByteRecord::with_capacity(64, 8);
        x.push_field(b"a");
        let mut pos = Position::new();
        pos.set_byte(3);
        x.set_position(Some(pos));
        let y = ByteRecord::from(vec!["a"]);
        assert_eq!(x, y);
        assert_ne!(x, ByteRecord::from(vec!["a", ""]));
    }

    #[test]
    fn debug_renders_byte_strings() {
        let rec = ByteRecord::from(vec![&b"a"[..], &b"\xFF"[..]]);
        assert_eq!(format!("{:?}", rec), r#"ByteRecord(["a", "\xFF"])"#);
    }

    #[test]
    #[should_panic]
    fn index_out_of_bounds() {
        let rec = ByteRecord::from(vec!["a"]);
        let _ = &rec[1];
    }

    #[test]
    fn utf8_error_1() {
        let mut rec = ByteRecord::new();
        rec.push_field(b"foo");
        rec.push_field(b"b\xFFar");

        let err = StringRecord::from_byte_record(rec).unwrap_err();
        assert_eq!(err.utf8_error().field(), 1);
        assert_eq!(err.utf8_error().valid_up_to(), 1);
    }

    #[test]
    fn utf8_error_2() {
        let mut rec = ByteRecord::new();
        rec.push_field(b"\xFF");

        let err = StringRecord::from_byte_record(rec).unwrap_err();
        assert_eq!(err.utf8_error().field(), 0);
        assert_eq!(err.utf8_error().valid_up_to(), 0);
    }

    #[test]
    fn utf8_error_3() {
        let mut rec = ByteRecord::new();
        rec.push_field(b"a\xFF");

        let err = StringRecord::from_byte_record(rec).unwrap_err();
        assert_eq!(err.utf8_error().field(), 0);
        assert_eq!(err.utf8_error().valid_up_to(), 1);
    }

    #[test]
    fn utf8_error_4() {
        let mut rec = ByteRecord::new();
        rec.push_field(b"a");
        rec.push_field(b"b");
        rec.push_field(b"c");
        rec.push_field(b"d");
        rec.push_field(b"xyz\xFF");

        let err = StringRecord::from_byte_record(rec).unwrap_err();
        assert_eq!(err.utf8_error().field(), 4);
        assert_eq!(err.utf8_error().valid_up_to(), 3);
    }

    #[test]
    fn utf8_error_5() {
        let mut rec = ByteRecord::new();
        rec.push_field(b"a");
        rec.push_field(b"b");
        rec.push_field(b"c");
        rec.push_field(b"d");
        rec.push_field(b"\xFFxyz");

        let err = StringRecord::from_byte_record(rec).unwrap_err();
        assert_eq!(err.utf8_error().field(), 4);
        assert_eq!(err.utf8_error().valid_up_to(), 0);
    }

    // A single field on its own isn't valid UTF-8, but the concatenation of
    // all fields is.
    #[test]
    fn utf8_error_6() {
        let mut rec = ByteRecord::new();
        rec.push_field(b"a\xc9");
        rec.push_field(b"\x91b");

        let err = StringRecord::from_byte_record(rec).unwrap_err();
        assert_eq!(err.utf8_error().field(), 0);
        assert_eq!(err.utf8_error().valid_up_to(), 1);
    }

    // Clearing a `ByteRecord` always permits a successful conversion to
    // UTF-8, which is what lets the reader reuse the allocation.
    #[test]
    fn utf8_clear_ok() {
        let mut rec = ByteRecord::new();
        rec.push_field(b"\xFF");
        assert!(StringRecord::from_byte_record(rec).is_err());

        let mut rec = ByteRecord::new();
        rec.push_field(b"\xFF");
        rec.clear();
        assert!(StringRecord::from_byte_record(rec).is_ok());
    }

    #[test]
    fn position_defaults() {
        let pos = Position::new();
        assert_eq!((pos.byte(), pos.line(), pos.record()), (0, 1, 0));
        assert_eq!(Position::default(), pos);
    }
}
