use std::io::BufRead;

/// Non-blank lines of a JSONL stream.
///
/// Lines that are not valid UTF-8 are skipped. Reading stops at the first
/// I/O error, since a failing reader will not recover on the next call.
pub fn text_lines<R: BufRead>(reader: R) -> impl Iterator<Item = String> {
    reader
        .split(b'\n')
        .map_while(|chunk| match chunk {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::debug!("read stopped: {}", e);
                None
            }
        })
        .filter_map(|bytes| String::from_utf8(bytes).ok())
        .filter(|line| !line.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let mut data = b"first\n".to_vec();
        data.extend_from_slice(b"{\"tool\":\"\xff\xfe\"}\n");
        data.extend_from_slice(b"\n  \nsecond\r\nthird");

        let lines: Vec<String> = text_lines(&data[..]).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "first");
        assert_eq!(lines[1].trim(), "second");
        assert_eq!(lines[2], "third");
    }
}
