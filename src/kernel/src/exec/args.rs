//! Command line parsing into the program argument table.

use alloc::string::String;
use alloc::vec::Vec;
use lodestar_common::limits::{MAX_ARGS, MAX_ARG_LEN};

/// The program name and arguments of the running program.
///
/// Words are separated by spaces. Each word keeps at most
/// `MAX_ARG_LEN - 1` bytes; the rest of an overlong word is dropped.
/// Words past `MAX_ARGS` are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgTable {
    program: String,
    args: Vec<String>,
}

impl ArgTable {
    /// An empty table.
    pub const fn new() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
        }
    }

    /// Parses `line` into a program name and its arguments.
    pub fn parse(line: &str) -> Self {
        let mut words = line.split(' ').filter(|w| !w.is_empty()).map(clip);

        let program = words.next().map(String::from).unwrap_or_default();
        let args = words.take(MAX_ARGS).map(String::from).collect();

        Self { program, args }
    }

    /// The first word of the command line.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Number of arguments, not counting the program name.
    pub fn count(&self) -> usize {
        self.args.len()
    }

    /// Argument `index`, counting from zero after the program name.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// All arguments in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(String::as_str)
    }
}

/// Cuts `word` to the longest prefix that fits an argument slot.
fn clip(word: &str) -> &str {
    let limit = MAX_ARG_LEN - 1;
    if word.len() <= limit {
        return word;
    }
    let mut end = limit;
    while !word.is_char_boundary(end) {
        end -= 1;
    }
    &word[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_words() {
        let table = ArgTable::parse("echo hello world");
        assert_eq!(table.program(), "echo");
        assert_eq!(table.count(), 2);
        assert_eq!(table.get(0), Some("hello"));
        assert_eq!(table.get(1), Some("world"));
        assert_eq!(table.get(2), None);
    }

    #[test]
    fn test_parse_surrounding_spaces() {
        let table = ArgTable::parse("  ls  ");
        assert_eq!(table.program(), "ls");
        assert_eq!(table.count(), 0);

        let table = ArgTable::parse("cat   a.txt    b.txt ");
        assert_eq!(table.iter().collect::<Vec<_>>(), ["a.txt", "b.txt"]);
    }

    #[test]
    fn test_parse_empty_line() {
        let table = ArgTable::parse("   ");
        assert_eq!(table.program(), "");
        assert_eq!(table.count(), 0);
        assert_eq!(ArgTable::parse(""), ArgTable::new());
    }

    #[test]
    fn test_argument_limits() {
        let long = "x".repeat(100);
        let line = format!("prog {} tail", long);
        let table = ArgTable::parse(&line);
        assert_eq!(table.get(0).map(str::len), Some(MAX_ARG_LEN - 1));
        assert_eq!(table.get(1), Some("tail"));

        let many: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        let table = ArgTable::parse(&format!("prog {}", many.join(" ")));
        assert_eq!(table.count(), MAX_ARGS);
        assert_eq!(table.get(MAX_ARGS - 1), Some("15"));
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        let word = "é".repeat(40);
        let clipped = clip(&word);
        assert!(clipped.len() <= MAX_ARG_LEN - 1);
        assert_eq!(clipped.len() % 2, 0);
    }
}
