// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Line assembly and tokenizing.

use heapless::{String, Vec};

/// Bytes in the line buffer. One is reserved, so a line holds at most
/// `LINE_CAPACITY - 1` characters.
pub const LINE_CAPACITY: usize = 20;

/// Most tokens kept from one line; extra tokens are ignored.
pub const MAX_ARGS: usize = 20;

static_assertions::const_assert!(LINE_CAPACITY <= u8::MAX as usize);

/// The bytes typed so far on the current line.
#[derive(Clone, Debug, Default)]
pub struct LineBuffer<const N: usize> {
    bytes: Vec<u8, N>,
}

impl<const N: usize> LineBuffer<N> {
    pub const fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Appends `b`, returning false (and dropping `b`) once `N - 1` bytes are
    /// held.
    pub fn push(&mut self, b: u8) -> bool {
        if self.bytes.len() + 1 >= N {
            return false;
        }
        self.bytes.push(b).is_ok()
    }

    /// Removes the last byte, if any.
    pub fn pop(&mut self) -> Option<u8> {
        self.bytes.pop()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LineTooLong;

/// A tokenized command line: the command name followed by its arguments.
///
/// Tokens are separated by runs of spaces; leading and trailing spaces are
/// ignored. There is no quoting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Argv {
    text: String<LINE_CAPACITY>,
    spans: Vec<(u8, u8), MAX_ARGS>,
}

impl Argv {
    pub const fn new() -> Self {
        Self {
            text: String::new(),
            spans: Vec::new(),
        }
    }

    pub fn parse(line: &str) -> Result<Self, LineTooLong> {
        let mut argv = Self::new();
        argv.text.push_str(line).map_err(|_| LineTooLong)?;

        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() && !argv.spans.is_full() {
            if bytes[i] == b' ' {
                i += 1;
                continue;
            }
            let start = i;
            while i < bytes.len() && bytes[i] != b' ' {
                i += 1;
            }
            // Both fit in a u8 since the text fit in LINE_CAPACITY.
            let _ = argv.spans.push((start as u8, i as u8));
        }
        Ok(argv)
    }

    /// Number of tokens, including the command name.
    pub fn argc(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&str> {
        let &(start, end) = self.spans.get(i)?;
        self.text.get(usize::from(start)..usize::from(end))
    }

    pub fn command(&self) -> Option<&str> {
        self.get(0)
    }

    /// Tokens after the command name.
    pub fn args(&self) -> impl Iterator<Item = &str> + '_ {
        self.iter().skip(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        (0..self.argc()).filter_map(move |i| self.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_keeps_one_byte_spare() {
        let mut line: LineBuffer<4> = LineBuffer::new();
        assert!(line.push(b'a'));
        assert!(line.push(b'b'));
        assert!(line.push(b'c'));
        assert!(!line.push(b'd'));
        assert_eq!(line.as_bytes(), b"abc");
    }

    #[test]
    fn pop_and_clear() {
        let mut line: LineBuffer<LINE_CAPACITY> = LineBuffer::new();
        assert_eq!(line.pop(), None);
        line.push(b'x');
        line.push(b'y');
        assert_eq!(line.pop(), Some(b'y'));
        line.clear();
        assert!(line.is_empty());
    }

    #[test]
    fn tokenizes_on_spaces() {
        let argv = Argv::parse("led  on 3 ").unwrap();
        assert_eq!(argv.argc(), 3);
        assert_eq!(argv.command(), Some("led"));
        assert_eq!(argv.args().collect::<std::vec::Vec<_>>(), ["on", "3"]);
        assert_eq!(argv.get(3), None);
    }

    #[test]
    fn blank_line_has_no_tokens() {
        assert!(Argv::parse("").unwrap().is_empty());
        assert!(Argv::parse("    ").unwrap().is_empty());
    }

    #[test]
    fn overlong_line_is_rejected() {
        assert_eq!(Argv::parse("abcdefghijklmnopqrstu"), Err(LineTooLong));
    }

    #[test]
    fn case_is_preserved() {
        let argv = Argv::parse("Hello").unwrap();
        assert_eq!(argv.command(), Some("Hello"));
    }
}
