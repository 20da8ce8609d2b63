//! Git pkt-line format implementation.
//!
//! Every packet is prefixed with a 4-digit hex length that counts the prefix
//! itself, so `"a\n"` travels as `0006a\n`. Two lengths are reserved:
//! `0000` is a flush packet ending a sequence and `0001` is a delimiter
//! separating sections of a protocol v2 request or response. Lengths 2 and 3
//! are undefined.
//!
//! See: https://git-scm.com/docs/protocol-common#_pkt_line_format

use crate::{GitError, Result};
use std::io::{Read, Write};

/// Largest value the 16-bit length prefix can carry.
const MAX_PKT_LEN: usize = 0xffff;

/// A pkt-line packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    /// Data line with content.
    Data(Vec<u8>),
    /// Flush packet (0000).
    Flush,
    /// Delimiter packet (0001).
    Delimiter,
}

impl PktLine {
    /// Encodes the packet to bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Self::Data(data) => {
                let len = data.len() + 4;
                if len > MAX_PKT_LEN {
                    return Err(GitError::PacketTooLarge(data.len()));
                }
                let mut result = format!("{len:04x}").into_bytes();
                result.extend_from_slice(data);
                Ok(result)
            }
            Self::Flush => Ok(b"0000".to_vec()),
            Self::Delimiter => Ok(b"0001".to_vec()),
        }
    }

}

/// Parses a 4-byte length prefix.
fn parse_len(prefix: &[u8; 4]) -> Result<usize> {
    let malformed = || {
        GitError::MalformedFraming(format!(
            "invalid length prefix {:?}",
            String::from_utf8_lossy(prefix)
        ))
    };
    let mut len = 0usize;
    for &c in prefix {
        let digit = char::from(c).to_digit(16).ok_or_else(malformed)?;
        len = len * 16 + digit as usize;
    }
    match len {
        2 | 3 => Err(malformed()),
        _ => Ok(len),
    }
}

/// Reader for pkt-line format.
pub struct PktLineReader<R> {
    reader: R,
}

impl<R: Read> PktLineReader<R> {
    /// Creates a new pkt-line reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads the next packet.
    ///
    /// The stream ending before or inside a packet is an
    /// [`std::io::ErrorKind::UnexpectedEof`] I/O error.
    pub fn read(&mut self) -> Result<PktLine> {
        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf)?;

        match parse_len(&len_buf)? {
            0 => Ok(PktLine::Flush),
            1 => Ok(PktLine::Delimiter),
            len => {
                let mut data = vec![0u8; len - 4];
                self.reader.read_exact(&mut data)?;
                Ok(PktLine::Data(data))
            }
        }
    }

    /// Reads packets until a flush packet, returning each as text with any
    /// trailing newline removed. Delimiters are skipped.
    pub fn lines(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            match self.read()? {
                PktLine::Flush => return Ok(lines),
                PktLine::Delimiter => continue,
                PktLine::Data(data) => {
                    let line = String::from_utf8_lossy(&data);
                    lines.push(line.strip_suffix('\n').unwrap_or(&line).to_string());
                }
            }
        }
    }
}

/// Writer for pkt-line format.
pub struct PktLineWriter<W> {
    writer: W,
}

impl<W: Write> PktLineWriter<W> {
    /// Creates a new pkt-line writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes a packet.
    pub fn write(&mut self, pkt: &PktLine) -> Result<()> {
        self.writer.write_all(&pkt.encode()?)?;
        Ok(())
    }

    /// Writes a data packet.
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        if data.len() + 4 > MAX_PKT_LEN {
            return Err(GitError::PacketTooLarge(data.len()));
        }
        write!(self.writer, "{:04x}", data.len() + 4)?;
        self.writer.write_all(data)?;
        Ok(())
    }

    /// Writes a string as a single data packet, without adding a newline.
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.write_data(s.as_bytes())
    }

    /// Writes a delimiter packet.
    pub fn delimiter(&mut self) -> Result<()> {
        self.write(&PktLine::Delimiter)
    }

    /// Writes a terminating flush packet and flushes the underlying writer.
    pub fn close(&mut self) -> Result<()> {
        self.write(&PktLine::Flush)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the inner writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
