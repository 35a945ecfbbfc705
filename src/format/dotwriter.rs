//! A writer that redraws a block of lines in place

use std::io::{self, Write};

const CURSOR_UP: &str = "\x1b[1A";
const CLEAR_LINE: &str = "\x1b[2K";

/// Buffers writes, and on flush replaces the block of lines written by the
/// previous flush with the buffered content.
pub struct DotWriter<W: Write> {
    out: W,
    buf: Vec<u8>,
    line_count: usize,
}

impl<W: Write> DotWriter<W> {
    pub fn new(out: W) -> Self {
        DotWriter {
            out,
            buf: Vec::new(),
            line_count: 0,
        }
    }

    fn clear_lines(&mut self, count: usize) -> io::Result<()> {
        for _ in 0..count {
            self.out.write_all(CURSOR_UP.as_bytes())?;
            self.out.write_all(CLEAR_LINE.as_bytes())?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Write for DotWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        self.clear_lines(self.line_count)?;
        self.line_count = self.buf.iter().filter(|&&b| b == b'\n').count();
        let buf = std::mem::take(&mut self.buf);
        self.out.write_all(&buf)?;
        self.out.flush()
    }
}
