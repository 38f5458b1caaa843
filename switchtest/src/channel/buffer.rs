//! Prompt buffer with tail-search optimization.
//!
//! Only the last N bytes of accumulated output are searched for the
//! prompt pattern rather than the entire buffer. For large outputs
//! (full MAC tables, `show running-config`) this keeps prompt polling
//! cheap while data is still streaming in.

use std::sync::OnceLock;

use regex::bytes::Regex;

/// Matches CSI sequences and the cursor-key mode switches some console
/// servers emit. Switch CLIs do not use anything more exotic.
fn ansi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b[=>]").unwrap())
}

/// Buffer for accumulating device output and searching for prompts.
#[derive(Debug)]
pub struct PromptBuffer {
    /// The accumulated output.
    buffer: Vec<u8>,

    /// How many bytes from the end to search for the prompt.
    search_depth: usize,
}

impl PromptBuffer {
    /// Create a new buffer searching the last `search_depth` bytes.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
        }
    }

    /// Append device output, stripping ANSI escape sequences.
    pub fn extend(&mut self, data: &[u8]) {
        if data.contains(&0x1b) {
            let cleaned = ansi_pattern().replace_all(data, &b""[..]);
            self.buffer.extend_from_slice(&cleaned);
        } else {
            self.buffer.extend_from_slice(data);
        }
    }

    /// Search only the buffer tail for the prompt pattern.
    pub fn search_tail(&self, pattern: &Regex) -> Option<regex::bytes::Match<'_>> {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        pattern.find(&self.buffer[start..])
    }

    /// Check whether the prompt pattern matches in the tail.
    pub fn tail_contains(&self, pattern: &Regex) -> bool {
        self.search_tail(pattern).is_some()
    }

    /// Take the accumulated output as a string (lossy UTF-8) and reset.
    pub fn take_string(&mut self) -> String {
        String::from_utf8_lossy(&std::mem::take(&mut self.buffer)).into_owned()
    }

    /// Get a reference to the raw buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard the buffer contents.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for PromptBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extend() {
        let mut buffer = PromptBuffer::new(100);
        buffer.extend(b"show vlan brief\r\n");
        assert_eq!(buffer.as_slice(), b"show vlan brief\r\n");
    }

    #[test]
    fn test_ansi_stripping() {
        let mut buffer = PromptBuffer::new(100);
        buffer.extend(b"\x1b[32mVLAN0100\x1b[0m up");
        assert_eq!(buffer.as_slice(), b"VLAN0100 up");
    }

    #[test]
    fn test_tail_search_finds_trailing_prompt() {
        let mut buffer = PromptBuffer::new(20);
        buffer.extend(&[b'x'; 200]);
        buffer.extend(b"\nswitch#");

        let pattern = Regex::new(r"switch#").unwrap();
        assert!(buffer.tail_contains(&pattern));
    }

    #[test]
    fn test_tail_search_ignores_early_match() {
        let mut buffer = PromptBuffer::new(10);
        buffer.extend(b"switch#");
        buffer.extend(&[b'x'; 200]);

        // Prompt echo buried in the output is outside the search depth.
        let pattern = Regex::new(r"switch#").unwrap();
        assert!(!buffer.tail_contains(&pattern));
    }

    #[test]
    fn test_take_string_resets() {
        let mut buffer = PromptBuffer::new(100);
        buffer.extend(b"output\nswitch#");
        assert_eq!(buffer.take_string(), "output\nswitch#");
        assert!(buffer.is_empty());
    }
}
