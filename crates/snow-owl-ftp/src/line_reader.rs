//! Line-oriented reader for the control connection
//!
//! FTP commands are terminated by CRLF (RFC 959 §3.5, spec.md §4.4): bytes
//! accumulate until the last two are `\r\n`.

use tokio::io::{AsyncReadExt, AsyncRead};

/// Buffers bytes off an async reader and yields one command line at a time.
pub struct LineReader<R> {
    inner: R,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }

    /// Read until the next CRLF-terminated line, stripping the terminator.
    /// Returns `Ok(None)` on peer close — whether clean (nothing buffered)
    /// or mid-line (a partial, unterminated command is discarded, not
    /// returned as if it were complete).
    pub async fn read_line(&mut self) -> crate::Result<Option<String>> {
        loop {
            if let Some(pos) = find_crlf(&self.buffer) {
                let mut line = self.buffer.drain(..=pos + 1).collect::<Vec<u8>>();
                line.truncate(line.len() - 2); // drop the trailing \r\n
                let text = String::from_utf8_lossy(&line).into_owned();
                return Ok(Some(text));
            }

            let mut chunk = [0u8; 4096];
            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                return Ok(None);
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

/// Index of the `\r` in the first `\r\n` pair found in `data`, if any.
fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|pair| pair == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_crlf_terminated_line() {
        let mut reader = LineReader::new(Cursor::new(b"USER anonymous\r\n".to_vec()));
        let line = reader.read_line().await.unwrap().unwrap();
        assert_eq!(line, "USER anonymous");
    }

    #[tokio::test]
    async fn reads_multiple_lines_in_sequence() {
        let mut reader = LineReader::new(Cursor::new(b"USER a\r\nPASS b\r\n".to_vec()));
        assert_eq!(reader.read_line().await.unwrap().unwrap(), "USER a");
        assert_eq!(reader.read_line().await.unwrap().unwrap(), "PASS b");
    }

    #[tokio::test]
    async fn handles_line_split_across_reads() {
        struct Slow(std::collections::VecDeque<Vec<u8>>);
        impl AsyncRead for Slow {
            fn poll_read(
                mut self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<std::io::Result<()>> {
                if let Some(chunk) = self.0.pop_front() {
                    buf.put_slice(&chunk);
                }
                std::task::Poll::Ready(Ok(()))
            }
        }

        let chunks = std::collections::VecDeque::from([b"US".to_vec(), b"ER a\r\n".to_vec()]);
        let mut reader = LineReader::new(Slow(chunks));
        let line = reader.read_line().await.unwrap().unwrap();
        assert_eq!(line, "USER a");
    }

    #[tokio::test]
    async fn eof_with_no_data_returns_none() {
        let mut reader = LineReader::new(Cursor::new(Vec::new()));
        assert!(reader.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_with_unterminated_partial_line_ends_the_session() {
        let mut reader = LineReader::new(Cursor::new(b"QUIT".to_vec()));
        assert!(reader.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bare_lf_is_not_a_line_terminator() {
        // A bare LF mid-buffer does not end the line; only CRLF does.
        let mut reader = LineReader::new(Cursor::new(b"PWD\nSTILL\r\n".to_vec()));
        assert_eq!(reader.read_line().await.unwrap().unwrap(), "PWD\nSTILL");
    }
}
