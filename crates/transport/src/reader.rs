use std::io::{self, BufRead};

use crate::error::{DecodeError, ReadError};
use crate::message::ProtocolMessage;

/// Largest body accepted from the attached process
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Reads `Content-Length` framed units from the attached process
pub struct FrameReader<R> {
    input: R,
}

impl<R> FrameReader<R>
where
    R: BufRead,
{
    pub fn new(input: R) -> Self {
        Self { input }
    }

    /// Read and decode the next unit.
    ///
    /// Returns `Ok(None)` once the stream is closed. A [`ReadError::Decode`]
    /// only invalidates the current unit and the reader may be polled again.
    pub fn poll_message(&mut self) -> Result<Option<ProtocolMessage>, ReadError> {
        let mut buffer = String::new();

        let content_length = loop {
            if self.read_line(&mut buffer)? == 0 {
                return Ok(None);
            }

            let line = buffer.trim_end();
            if line.is_empty() {
                continue;
            }

            match line.split_once(':') {
                Some(("Content-Length", value)) => {
                    let value = value.trim();
                    let length = value
                        .parse::<usize>()
                        .map_err(|_| DecodeError::MalformedContentLength(value.to_string()))?;
                    if length > MAX_FRAME_SIZE {
                        return Err(DecodeError::FrameTooLarge(length).into());
                    }
                    break length;
                }
                _ => return Err(DecodeError::UnexpectedHeader(line.to_string()).into()),
            }
        };

        // remaining headers up to the blank separator line
        loop {
            if self.read_line(&mut buffer)? == 0 {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
            let line = buffer.trim_end();
            if line.is_empty() {
                break;
            }
            tracing::debug!(header = %line, "ignoring header");
        }

        let mut content = vec![0; content_length];
        self.input.read_exact(content.as_mut_slice())?;
        tracing::debug!(content = %String::from_utf8_lossy(&content), "received raw message");

        let message = ProtocolMessage::decode(&content)?;
        Ok(Some(message))
    }

    fn read_line(&mut self, buffer: &mut String) -> Result<usize, ReadError> {
        buffer.clear();
        loop {
            match self.input.read_line(buffer) {
                Ok(read_size) => return Ok(read_size),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    return Err(DecodeError::InvalidUtf8.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
