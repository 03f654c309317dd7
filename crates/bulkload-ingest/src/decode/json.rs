//! JSON batch decoding
//!
//! A single forward pass over the byte stream. The input must be a
//! top-level array of objects, or an object whose single key wraps
//! such an array (`{"customers": [...]}`); anything else is a format
//! error. Elements are located with a balanced-brace scan that honors
//! strings and escapes, then handed to `serde_json` one at a time, so
//! the document is never materialized as a whole.

use super::BatchSource;
use crate::error::{IngestError, IngestResult};
use serde::de::DeserializeOwned;
use std::io::{BufReader, ErrorKind, Read};
use std::marker::PhantomData;

pub struct JsonBatchSource<R: Read, T> {
    scanner: ByteScanner<R>,
    batch_size: usize,
    total: u64,
    state: State,
    wrapped: bool,
    _row: PhantomData<T>,
}

#[derive(PartialEq)]
enum State {
    Start,
    InArray,
    Done,
}

impl<R: Read, T: DeserializeOwned> JsonBatchSource<R, T> {
    pub fn new(input: R, batch_size: usize) -> Self {
        Self {
            scanner: ByteScanner::new(input),
            batch_size,
            total: 0,
            state: State::Start,
            wrapped: false,
            _row: PhantomData,
        }
    }

    /// Position the scanner just inside the records array, unwrapping
    /// a single-key envelope object when present
    fn enter_array(&mut self) -> IngestResult<()> {
        match self.scanner.next_non_ws()? {
            Some(b'[') => {}
            Some(b'{') => {
                match self.scanner.next_non_ws()? {
                    Some(b'"') => self.skip_string()?,
                    _ => {
                        return Err(IngestError::Format(
                            "expected a key in the wrapper object".into(),
                        ))
                    }
                }
                if self.scanner.next_non_ws()? != Some(b':') {
                    return Err(IngestError::Format("expected ':' after the wrapper key".into()));
                }
                if self.scanner.next_non_ws()? != Some(b'[') {
                    return Err(IngestError::Format(
                        "expected an array after the wrapper key".into(),
                    ));
                }
                self.wrapped = true;
            }
            Some(other) => {
                return Err(IngestError::Format(format!(
                    "expected a top-level array or object, found '{}'",
                    other as char
                )))
            }
            None => return Err(eof()),
        }
        Ok(())
    }

    /// Consume one balanced `{...}` element and decode it
    fn read_element(&mut self) -> IngestResult<T> {
        let mut buf = Vec::with_capacity(256);
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        loop {
            let byte = self.scanner.next()?.ok_or_else(eof)?;
            buf.push(byte);
            if in_string {
                if escaped {
                    escaped = false;
                } else if byte == b'\\' {
                    escaped = true;
                } else if byte == b'"' {
                    in_string = false;
                }
                continue;
            }
            match byte {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(serde_json::from_slice(&buf)?);
                    }
                }
                _ => {}
            }
        }
    }

    /// Skip a string whose opening quote was already consumed
    fn skip_string(&mut self) -> IngestResult<()> {
        loop {
            match self.scanner.next()? {
                Some(b'\\') => {
                    self.scanner.next()?;
                }
                Some(b'"') => return Ok(()),
                Some(_) => {}
                None => return Err(eof()),
            }
        }
    }

    fn close_envelope(&mut self) -> IngestResult<()> {
        if self.wrapped && self.scanner.next_non_ws()? != Some(b'}') {
            return Err(IngestError::Format(
                "expected '}' closing the wrapper object".into(),
            ));
        }
        Ok(())
    }
}

impl<R: Read, T: DeserializeOwned> BatchSource<T> for JsonBatchSource<R, T> {
    fn next_batch(&mut self) -> IngestResult<Option<Vec<T>>> {
        if self.state == State::Done {
            return Ok(None);
        }
        if self.state == State::Start {
            self.enter_array()?;
            self.state = State::InArray;
        }

        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match self.scanner.peek_non_ws()? {
                Some(b']') => {
                    self.scanner.consume_peeked();
                    self.close_envelope()?;
                    self.state = State::Done;
                    break;
                }
                Some(b'{') => {
                    batch.push(self.read_element()?);
                    self.total += 1;
                    match self.scanner.peek_non_ws()? {
                        Some(b',') => self.scanner.consume_peeked(),
                        Some(b']') => {}
                        Some(other) => {
                            return Err(IngestError::Format(format!(
                                "expected ',' or ']' after element, found '{}'",
                                other as char
                            )))
                        }
                        None => return Err(eof()),
                    }
                }
                Some(other) => {
                    return Err(IngestError::Format(format!(
                        "expected an object element, found '{}'",
                        other as char
                    )))
                }
                None => return Err(eof()),
            }
        }

        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }

    fn total(&self) -> u64 {
        self.total
    }
}

fn eof() -> IngestError {
    IngestError::Format("unexpected end of input".into())
}

/// Buffered byte reader with single-byte lookahead
struct ByteScanner<R: Read> {
    inner: BufReader<R>,
    peeked: Option<u8>,
}

impl<R: Read> ByteScanner<R> {
    fn new(input: R) -> Self {
        Self {
            inner: BufReader::new(input),
            peeked: None,
        }
    }

    fn next(&mut self) -> IngestResult<Option<u8>> {
        if let Some(byte) = self.peeked.take() {
            return Ok(Some(byte));
        }
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Next byte after any whitespace, consumed
    fn next_non_ws(&mut self) -> IngestResult<Option<u8>> {
        loop {
            match self.next()? {
                Some(byte) if byte.is_ascii_whitespace() => continue,
                other => return Ok(other),
            }
        }
    }

    /// Next byte after any whitespace, left in the lookahead slot
    fn peek_non_ws(&mut self) -> IngestResult<Option<u8>> {
        let byte = self.next_non_ws()?;
        self.peeked = byte;
        Ok(byte)
    }

    fn consume_peeked(&mut self) {
        self.peeked = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::rows::CustomerRow;
    use std::io::Cursor;

    fn source(data: &str, batch_size: usize) -> JsonBatchSource<Cursor<Vec<u8>>, CustomerRow> {
        JsonBatchSource::new(Cursor::new(data.as_bytes().to_vec()), batch_size)
    }

    fn drain(mut src: JsonBatchSource<Cursor<Vec<u8>>, CustomerRow>) -> Vec<CustomerRow> {
        let mut rows = Vec::new();
        while let Some(batch) = src.next_batch().unwrap() {
            rows.extend(batch);
        }
        rows
    }

    #[test]
    fn test_top_level_array() {
        let rows = drain(source(
            r#"[{"customerCode":"C1"},{"customerCode":"C2"}]"#,
            10,
        ));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].customer_code.as_deref(), Some("C2"));
    }

    #[test]
    fn test_wrapped_array_equivalent_to_bare() {
        let bare = drain(source(r#"[{"customerCode":"C1"},{"customerCode":"C2"}]"#, 10));
        let wrapped = drain(source(
            r#"{ "customers": [{"customerCode":"C1"},{"customerCode":"C2"}] }"#,
            10,
        ));
        assert_eq!(bare.len(), wrapped.len());
        assert_eq!(
            bare[0].customer_code.as_deref(),
            wrapped[0].customer_code.as_deref()
        );
    }

    #[test]
    fn test_batching_with_trailing_partial() {
        let data = r#"[{"customerCode":"C1"},{"customerCode":"C2"},{"customerCode":"C3"}]"#;
        let mut src = source(data, 2);
        assert_eq!(src.next_batch().unwrap().unwrap().len(), 2);
        assert_eq!(src.next_batch().unwrap().unwrap().len(), 1);
        assert!(src.next_batch().unwrap().is_none());
        assert_eq!(src.total(), 3);
    }

    #[test]
    fn test_empty_array_yields_no_batches() {
        let mut src = source("[]", 10);
        assert!(src.next_batch().unwrap().is_none());
        assert_eq!(src.total(), 0);
        let mut src = source(r#"{"customers": []}"#, 10);
        assert!(src.next_batch().unwrap().is_none());
    }

    #[test]
    fn test_braces_and_escapes_inside_strings() {
        let data = r#"[{"customerCode":"C1","address":"12 \"brace\" st {apt 3}"}]"#;
        let rows = drain(source(data, 10));
        assert_eq!(rows[0].address.as_deref(), Some("12 \"brace\" st {apt 3}"));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let rows = drain(source(r#"[{"customerCode":"C1","extra":{"x":1}}]"#, 10));
        assert_eq!(rows[0].customer_code.as_deref(), Some("C1"));
    }

    #[test]
    fn test_bad_top_level_shape() {
        for data in ["42", r#""hello""#, "true"] {
            let err = source(data, 10).next_batch().unwrap_err();
            assert!(matches!(err, IngestError::Format(_)), "{data}");
        }
    }

    #[test]
    fn test_scalar_element_is_format_error() {
        let err = source(r#"[{"customerCode":"C1"}, 42]"#, 10).next_batch().unwrap_err();
        assert!(matches!(err, IngestError::Format(_)));
    }

    #[test]
    fn test_truncated_stream() {
        let err = source(r#"[{"customerCode":"C1"#, 10).next_batch().unwrap_err();
        assert!(matches!(err, IngestError::Format(_)));
    }
}
