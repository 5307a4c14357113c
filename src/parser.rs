//! Streaming RESP parser.
//!
//! [`parse_stream`] consumes any `AsyncRead` and yields a lazy sequence of
//! parsed frames over a channel. Transport-level errors terminate the
//! sequence; a malformed frame is yielded as an errored item and parsing
//! resumes at the next header line. The same parser feeds client
//! connections, AOF replay and the peer client's receive loop.

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::resp::Reply;

#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("connection closed")]
    Closed,
    #[error("unexpected end of stream")]
    UnexpectedEof,
    #[error("I/O error: {0}")]
    Io(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl RespError {
    /// Terminal errors end the frame stream; protocol errors do not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RespError::Protocol(_))
    }
}

pub type Payload = Result<Reply, RespError>;

/// Spawn a task that parses `reader` and returns the receiving end of the
/// frame stream. The channel closes after the first terminal error.
pub fn parse_stream<R>(reader: R) -> mpsc::Receiver<Payload>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut source = Source::new(reader);
        loop {
            match source.next_frame().await {
                Ok(frame) => {
                    if tx.send(Ok(frame)).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    let terminal = err.is_terminal();
                    if tx.send(Err(err)).await.is_err() || terminal {
                        return;
                    }
                }
            }
        }
    });
    rx
}

const READ_CHUNK: usize = 4096;

struct Source<R> {
    reader: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> Source<R> {
    fn new(reader: R) -> Self {
        Source {
            reader,
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Read one CRLF-terminated line, excluding the terminator. EOF at a
    /// frame boundary with nothing buffered is a clean close; anywhere
    /// else it is an unexpected EOF.
    async fn read_line(&mut self, at_frame_boundary: bool) -> Result<BytesMut, RespError> {
        loop {
            if let Some(pos) = self.buf.windows(2).position(|window| window == b"\r\n") {
                let mut line = self.buf.split_to(pos + 2);
                line.truncate(pos);
                return Ok(line);
            }
            self.fill(at_frame_boundary && self.buf.is_empty()).await?;
        }
    }

    /// Read exactly `n` bytes followed by CRLF; returns the `n` bytes.
    async fn read_bulk_body(&mut self, n: usize) -> Result<BytesMut, RespError> {
        while self.buf.len() < n + 2 {
            self.fill(false).await?;
        }
        let mut body = self.buf.split_to(n + 2);
        if &body[n..] != b"\r\n" {
            return Err(RespError::Protocol(
                "bulk string missing CRLF terminator".to_string(),
            ));
        }
        body.truncate(n);
        Ok(body)
    }

    async fn fill(&mut self, at_frame_boundary: bool) -> Result<(), RespError> {
        match self.reader.read_buf(&mut self.buf).await {
            Ok(0) => {
                if at_frame_boundary && self.buf.is_empty() {
                    Err(RespError::Closed)
                } else {
                    Err(RespError::UnexpectedEof)
                }
            }
            Ok(_) => Ok(()),
            Err(err) => Err(RespError::Io(err.to_string())),
        }
    }

    async fn next_frame(&mut self) -> Result<Reply, RespError> {
        let line = self.read_line(true).await?;
        if line.is_empty() {
            return Err(RespError::Protocol("empty line".to_string()));
        }
        match line[0] {
            b'+' => Ok(Reply::Simple(lossy(&line[1..]))),
            b'-' => Ok(Reply::Error(lossy(&line[1..]))),
            b':' => {
                let n = std::str::from_utf8(&line[1..])
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| protocol_err(&line))?;
                Ok(Reply::Integer(n))
            }
            b'$' => self.parse_bulk(&line).await,
            b'*' => self.parse_multi_bulk(&line).await,
            _ => Err(protocol_err(&line)),
        }
    }

    async fn parse_bulk(&mut self, header: &[u8]) -> Result<Reply, RespError> {
        match parse_bulk_len(header)? {
            None => Ok(Reply::Null),
            Some(0) => {
                self.read_bulk_body(0).await?;
                Ok(Reply::EmptyBulk)
            }
            Some(len) => {
                let body = self.read_bulk_body(len).await?;
                Ok(Reply::Bulk(body.to_vec()))
            }
        }
    }

    async fn parse_multi_bulk(&mut self, header: &[u8]) -> Result<Reply, RespError> {
        if &header[1..] == b"-1" {
            return Ok(Reply::NullMulti);
        }
        // The element count parses as a 64-bit unsigned integer.
        let count = std::str::from_utf8(&header[1..])
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| protocol_err(header))?;
        if count == 0 {
            return Ok(Reply::EmptyMulti);
        }

        let mut args: Vec<Option<Vec<u8>>> = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let elem_header = self.read_line(false).await?;
            if elem_header.first() != Some(&b'$') {
                return Err(protocol_err(&elem_header));
            }
            match parse_bulk_len(&elem_header)? {
                None => args.push(None),
                Some(len) => {
                    let body = self.read_bulk_body(len).await?;
                    args.push(Some(body.to_vec()));
                }
            }
        }
        Ok(Reply::Multi(args))
    }
}

/// Parse a `$<len>` header; `None` means the null bulk (`$-1`).
fn parse_bulk_len(header: &[u8]) -> Result<Option<usize>, RespError> {
    let len = std::str::from_utf8(&header[1..])
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| protocol_err(header))?;
    match len {
        -1 => Ok(None),
        n if n < 0 => Err(protocol_err(header)),
        n => Ok(Some(n as usize)),
    }
}

fn protocol_err(line: &[u8]) -> RespError {
    RespError::Protocol(lossy(line))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
