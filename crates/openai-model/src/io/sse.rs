use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading server-sent events from a chunk stream.
///
/// Only the `data` field is surfaced. Comment lines and all other fields
/// fields are skipped, multi-line data is joined with line feeds, and both
/// LF and CRLF line endings are accepted.
pub struct Sse {
    // Raw bytes are kept until a whole event arrives, so that a UTF-8
    // sequence split across chunks is decoded correctly.
    buf: Vec<u8>,
    // Bytes of `buf` already searched for an event terminator.
    scanned: usize,
    chunks: Chunks,
    eof: bool,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            chunks,
            eof: false,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain complete events from the buffer before reading more.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            // Abort if no more data available. A trailing incomplete event
            // is dropped.
            if self.eof {
                return Ok(None);
            }

            match self.chunks.next_chunk().await.map_err(Error::ChunksError)? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.eof = true,
            }
        }
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        // event         = *( comment / field ) end-of-line
        // comment       = colon *any-char end-of-line
        // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
        // end-of-line   = ( cr lf / lf )
        while let Some((content_len, consumed)) =
            find_event_end(&self.buf, self.scanned)
        {
            let block: Vec<u8> = self.buf.drain(0..consumed).collect();
            self.scanned = 0;
            let Ok(block) = str::from_utf8(&block[0..content_len]) else {
                return Err(Error::InvalidPayload);
            };

            let mut data_lines = Vec::new();
            for line in block.lines() {
                let line = line.trim_end_matches('\r');
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                let (name, value) = match line.split_once(':') {
                    Some((name, value)) => {
                        (name, value.strip_prefix(' ').unwrap_or(value))
                    }
                    None => (line, ""),
                };
                if name == "data" {
                    data_lines.push(value);
                }
            }

            // A block made only of comments carries no event.
            if !data_lines.is_empty() {
                return Ok(Some(data_lines.join("\n")));
            }
        }

        // The last two bytes may still begin a terminator once more data
        // arrives.
        self.scanned = self.buf.len().saturating_sub(2);
        Ok(None)
    }
}

/// Finds the blank line terminating the first event in `buf`, skipping
/// the first `from` bytes.
///
/// Returns the length of the event content and the number of bytes to
/// consume, terminator included.
fn find_event_end(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let from = from.min(buf.len());
    buf[from..].iter().enumerate().find_map(|(offset, byte)| {
        if *byte != b'\n' {
            return None;
        }
        let idx = from + offset;
        let rest = &buf[idx + 1..];
        if rest.starts_with(b"\n") {
            Some((idx, idx + 2))
        } else if rest.starts_with(b"\r\n") {
            Some((idx, idx + 3))
        } else {
            None
        }
    })
}
