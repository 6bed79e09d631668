//! Human-readable class labels.
//!
//! A label file holds one label per line; line `i` names class `i`.
//! Lookups outside the table return `None`, so a short or empty table never
//! aborts an attack report.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::Result;

/// Class index → label lookup.
///
/// # Example
///
/// ```
/// use fgsm::labels::LabelTable;
///
/// let table = LabelTable::from_reader("tench\ngoldfish\n".as_bytes()).unwrap();
/// assert_eq!(table.get(1), Some("goldfish"));
/// assert_eq!(table.get(2), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Parse one label per line. Surrounding whitespace is trimmed; blank
    /// lines keep their index.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::Io`](crate::error::FgsmError::Io) on read
    /// failure or invalid UTF-8.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let labels = BufReader::new(reader)
            .lines()
            .map(|line| line.map(|l| l.trim().to_string()))
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self { labels })
    }

    /// Read a label file.
    ///
    /// # Errors
    ///
    /// Returns [`FgsmError::Io`](crate::error::FgsmError::Io) if the file
    /// cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_reader(File::open(path)?)
    }

    /// Label of `class`, or `None` when the table has no entry for it.
    #[must_use]
    pub fn get(&self, class: usize) -> Option<&str> {
        self.labels.get(class).map(String::as_str)
    }

    /// Number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when the table has no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for LabelTable {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_reader_trims_and_keeps_blank_lines() {
        let table = LabelTable::from_reader("  tench \n\r\ngoldfish\r\n".as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0), Some("tench"));
        assert_eq!(table.get(1), Some(""));
        assert_eq!(table.get(2), Some("goldfish"));
    }

    #[test]
    fn test_empty_table_returns_none() {
        let table = LabelTable::default();
        assert!(table.is_empty());
        assert_eq!(table.get(0), None);
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cat").unwrap();
        writeln!(file, "dog").unwrap();

        let table = LabelTable::from_path(file.path()).unwrap();
        assert_eq!(table.get(1), Some("dog"));
    }

    #[test]
    fn test_from_path_missing() {
        assert!(LabelTable::from_path("/definitely/not/here.txt").is_err());
    }
}
