//! `std::io` adapters over the frame-level API.
//!
//! [`StreamWriter`] packs arbitrary writes into full frames and
//! [`StreamReader`] hides frame boundaries on the way back. Neither adds
//! padding.

use std::io::{self, Read, Write};

use crate::{
    constants::MAX_PAYLOAD_LENGTH,
    error::StreamError,
    stream::{StreamDecrypter, StreamEncrypter},
};

/// Buffered `Write` over a [`StreamEncrypter`].
///
/// Dropping a writer without calling [`finish`](Self::finish) leaves the
/// stream without a final frame; the receiver sees it as truncated.
pub struct StreamWriter<W: Write> {
    encrypter: StreamEncrypter<W>,
    buffer: Vec<u8>,
}

impl<W: Write> StreamWriter<W> {
    /// Wrap an encrypter that has not written any frames.
    pub fn new(encrypter: StreamEncrypter<W>) -> Self {
        Self { encrypter, buffer: Vec::with_capacity(MAX_PAYLOAD_LENGTH) }
    }

    /// Write buffered bytes as the final frame and return the sink.
    pub fn finish(mut self) -> Result<W, StreamError> {
        self.encrypter.write_frame(&self.buffer, 0, true)?;
        self.buffer.clear();
        self.encrypter.flush()?;
        Ok(self.encrypter.into_inner())
    }

    fn write_buffered_frame(&mut self) -> Result<(), StreamError> {
        self.encrypter.write_frame(&self.buffer, 0, false)?;
        self.buffer.clear();
        Ok(())
    }
}

impl<W: Write> Write for StreamWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.buffer.len() == MAX_PAYLOAD_LENGTH {
            self.write_buffered_frame()?;
        }

        let n = buf.len().min(MAX_PAYLOAD_LENGTH - self.buffer.len());
        self.buffer.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.write_buffered_frame()?;
        }
        self.encrypter.flush()?;
        Ok(())
    }
}

impl<W: Write> std::fmt::Debug for StreamWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWriter")
            .field("encrypter", &self.encrypter)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

/// `Read` over a [`StreamDecrypter`].
///
/// Returns `Ok(0)` once the final frame has been consumed. Protocol errors
/// surface as `InvalidData`, truncation as `UnexpectedEof`.
pub struct StreamReader<R: Read> {
    decrypter: StreamDecrypter<R>,
    frame: Box<[u8]>,
    position: usize,
    length: usize,
}

impl<R: Read> StreamReader<R> {
    /// Wrap a decrypter that has not read any frames.
    pub fn new(decrypter: StreamDecrypter<R>) -> Self {
        Self {
            decrypter,
            frame: vec![0u8; MAX_PAYLOAD_LENGTH].into_boxed_slice(),
            position: 0,
            length: 0,
        }
    }

    /// Give back the decrypter. Unread payload bytes are discarded.
    pub fn into_inner(self) -> StreamDecrypter<R> {
        self.decrypter
    }
}

impl<R: Read> Read for StreamReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        // Skip empty frames
        while self.position == self.length {
            match self.decrypter.read_frame(&mut self.frame)? {
                Some(length) => {
                    self.position = 0;
                    self.length = length;
                },
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.length - self.position);
        buf[..n].copy_from_slice(&self.frame[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }
}

impl<R: Read> std::fmt::Debug for StreamReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("decrypter", &self.decrypter)
            .field("unread", &(self.length - self.position))
            .finish()
    }
}
