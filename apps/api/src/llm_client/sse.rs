//! Minimal Server-Sent Events decoder for the Gemini streaming endpoint.
//!
//! Only `data:` lines matter; every other field and blank separator line is
//! skipped. Bytes are buffered until a full line is available so multi-byte
//! UTF-8 characters split across network chunks decode correctly.

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    /// Feeds raw bytes, returning the data payloads of every completed line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flushes a final unterminated line at end of body.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buf);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.is_empty() {
        None
    } else {
        Some(data.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_blank_and_non_data_lines() {
        let mut decoder = SseDecoder::default();
        let out = decoder.push(b": keep-alive\r\nevent: chunk\r\ndata: {\"a\":1}\r\n\r\n");
        assert_eq!(out, vec!["{\"a\":1}".to_string()]);
    }

    #[test]
    fn test_several_events_in_one_chunk() {
        let mut decoder = SseDecoder::default();
        let out = decoder.push(b"data: {\"n\":1}\r\n\r\ndata: {\"n\":2}\r\n\r\n");
        assert_eq!(out, vec!["{\"n\":1}".to_string(), "{\"n\":2}".to_string()]);
    }

    #[test]
    fn test_line_split_across_pushes() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"te").is_empty());
        assert_eq!(decoder.push(b"xt\":1}\n"), vec!["{\"text\":1}".to_string()]);
    }

    #[test]
    fn test_multibyte_char_split_across_pushes() {
        let bytes = "data: 核心\n".as_bytes();
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&bytes[..8]).is_empty());
        assert_eq!(decoder.push(&bytes[8..]), vec!["核心".to_string()]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: last").is_empty());
        assert_eq!(decoder.finish(), Some("last".to_string()));
        assert_eq!(decoder.finish(), None);
    }
}
