//! Input lines typed into the console, waiting for a script read.

use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct LineBuffer {
    completed: VecDeque<Vec<u8>>,
    in_progress: Vec<u8>,
    closed: bool,
}

impl LineBuffer {
    /// Append raw console bytes; every `\n` completes a line (newline
    /// kept). Returns the number of lines completed.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> usize {
        if self.closed {
            return 0;
        }
        let mut completed = 0;
        for &byte in bytes {
            self.in_progress.push(byte);
            if byte == b'\n' {
                self.completed.push_back(std::mem::take(&mut self.in_progress));
                completed += 1;
            }
        }
        completed
    }

    /// Mark the end of input. An unterminated partial line becomes the last
    /// completed line.
    pub fn close(&mut self) {
        if !self.in_progress.is_empty() {
            self.completed
                .push_back(std::mem::take(&mut self.in_progress));
        }
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn has_line(&self) -> bool {
        !self.completed.is_empty()
    }

    pub fn pending_lines(&self) -> usize {
        self.completed.len()
    }

    pub fn partial(&self) -> &[u8] {
        &self.in_progress
    }

    /// Copy as much of the oldest line as fits; the unread remainder stays
    /// at the head of the queue.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Option<usize> {
        let line = self.completed.front_mut()?;
        let n = line.len().min(buf.len());
        buf[..n].copy_from_slice(&line[..n]);
        if n == line.len() {
            self.completed.pop_front();
        } else {
            line.drain(..n);
        }
        Some(n)
    }
}
