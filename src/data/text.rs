//! Plain-text sequence files
//!
//! One sequence per line, optionally preceded by a name and a tab:
//!
//! ```text
//! # comment
//! ABCDEFG
//! second<TAB>EFGHIJK
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Unnamed sequences
//! are called `seq<N>` after their 1-based position.

use crate::core::{KernelError, Result, Sequence, SequenceCollection, SequenceSource};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Named character sequences loaded from text
#[derive(Debug, Clone)]
pub struct TextSequences {
    names: Vec<String>,
    sequences: SequenceCollection<char>,
}

impl TextSequences {
    /// Load sequences from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(KernelError::IoError)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load sequences from a reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut names = Vec::new();
        let mut sequences = SequenceCollection::new(Vec::new());

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(KernelError::IoError)?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }

            let (name, text) = Self::parse_line(line).map_err(|e| {
                KernelError::ParseError(format!("Error parsing line {}: {}", line_num + 1, e))
            })?;
            let position = names.len() + 1;
            names.push(name.unwrap_or_else(|| format!("seq{position}")));
            sequences.push(Sequence::from(text));
        }

        if names.is_empty() {
            return Err(KernelError::EmptyDataset);
        }

        Ok(Self { names, sequences })
    }

    /// Split an optional `name<TAB>` prefix from the sequence text
    fn parse_line(line: &str) -> Result<(Option<String>, &str)> {
        match line.split_once('\t') {
            Some((name, text)) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(KernelError::ParseError(
                        "Empty sequence name before tab".to_string(),
                    ));
                }
                Ok((Some(name.to_string()), text.trim()))
            }
            None => Ok((None, line.trim())),
        }
    }

    /// Sequence names in file order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Borrow the underlying collection
    pub fn collection(&self) -> &SequenceCollection<char> {
        &self.sequences
    }

    /// Take the underlying collection
    pub fn into_collection(self) -> SequenceCollection<char> {
        self.sequences
    }
}

impl SequenceSource<char> for TextSequences {
    fn len(&self) -> usize {
        self.names.len()
    }

    fn sequence(&self, i: usize) -> &[char] {
        self.sequences.sequence(i)
    }

    fn max_len(&self) -> usize {
        self.sequences.max_len()
    }
}
