//! Message framing on the byte stream.
//!
//! Two framings are understood: newline-delimited JSON (one message per
//! line, the default) and LSP-style `Content-Length: N\r\n\r\n<body>`.

use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameFormat {
    #[default]
    Ndjson,
    ContentLength,
}

impl FrameFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameFormat::Ndjson => "ndjson",
            FrameFormat::ContentLength => "content-length",
        }
    }
}

impl std::fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read one frame body. `Ok(None)` means the peer closed the stream.
pub async fn read_frame<R>(reader: &mut R, format: FrameFormat) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    match format {
        FrameFormat::Ndjson => read_line_frame(reader).await,
        FrameFormat::ContentLength => read_content_length_frame(reader).await,
    }
}

/// Write one frame body and flush.
pub async fn write_frame<W>(writer: &mut W, format: FrameFormat, body: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match format {
        FrameFormat::Ndjson => {
            writer.write_all(body).await?;
            writer.write_all(b"\n").await?;
        }
        FrameFormat::ContentLength => {
            let header = format!("Content-Length: {}\r\n\r\n", body.len());
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(body).await?;
        }
    }
    writer.flush().await
}

async fn read_line_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(Some(trimmed.as_bytes().to_vec()));
        }
    }
}

async fn read_content_length_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();

    // Headers up to the blank separator line
    let mut content_length = None;
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if content_length.is_some() {
                break;
            }
            continue;
        }
        if let Some(len_str) = trimmed.strip_prefix("Content-Length:") {
            let len = len_str.trim().parse::<usize>().map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid Content-Length: {}", len_str.trim()),
                )
            })?;
            content_length = Some(len);
        }
    }

    let Some(len) = content_length else {
        return Ok(None);
    };
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_ndjson_skips_blank_lines() {
        let data = b"{\"a\":1}\n\n{\"b\":2}\n";
        let mut reader = BufReader::new(&data[..]);
        let first = read_frame(&mut reader, FrameFormat::Ndjson).await.unwrap();
        let second = read_frame(&mut reader, FrameFormat::Ndjson).await.unwrap();
        let end = read_frame(&mut reader, FrameFormat::Ndjson).await.unwrap();
        assert_eq!(first.as_deref(), Some(&b"{\"a\":1}"[..]));
        assert_eq!(second.as_deref(), Some(&b"{\"b\":2}"[..]));
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_content_length_frames() {
        let mut buf = Vec::new();
        write_frame(&mut buf, FrameFormat::ContentLength, b"{\"x\":\"\n\"}")
            .await
            .unwrap();
        write_frame(&mut buf, FrameFormat::ContentLength, b"{}")
            .await
            .unwrap();

        let mut reader = BufReader::new(&buf[..]);
        let first = read_frame(&mut reader, FrameFormat::ContentLength)
            .await
            .unwrap();
        assert_eq!(first.as_deref(), Some(&b"{\"x\":\"\n\"}"[..]));
        let second = read_frame(&mut reader, FrameFormat::ContentLength)
            .await
            .unwrap();
        assert_eq!(second.as_deref(), Some(&b"{}"[..]));
        assert!(
            read_frame(&mut reader, FrameFormat::ContentLength)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_invalid_content_length_is_an_error() {
        let data = b"Content-Length: abc\r\n\r\n{}";
        let mut reader = BufReader::new(&data[..]);
        let err = read_frame(&mut reader, FrameFormat::ContentLength)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_frame_format_deserializes_kebab_case() {
        let format: FrameFormat = serde_json::from_str("\"content-length\"").unwrap();
        assert_eq!(format, FrameFormat::ContentLength);
    }
}
