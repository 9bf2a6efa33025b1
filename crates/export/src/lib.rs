//! Exporters turn a stored book (with its chapters) into files.
//!
//! Exporters are looked up by name in an [`Exporters`] table built at
//! start-up.

pub mod error;
mod text;

pub use crate::text::TextExporter;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tome_model::Book;

#[async_trait]
pub trait Exporter: Send + Sync {
    fn name(&self) -> &str;

    /// Extension of the files this exporter writes, including the dot.
    fn extension(&self) -> &str;

    /// Write `book` (chapters included, in order) to `output` and return the
    /// path of the written file.
    ///
    /// A directory output (or a path that does not exist yet, which is
    /// created as a directory) receives `<title><extension>`; any other path
    /// is written to directly.
    async fn export(&self, book: &Book, output: &Path) -> Result<PathBuf>;
}

/// Characters that cannot appear in a file name on common platforms.
const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

fn file_name(title: &str, extension: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| if RESERVED.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    let stem = if stem.is_empty() { "untitled" } else { stem.as_str() };
    format!("{stem}{extension}")
}

pub(crate) async fn resolve_output(book: &Book, output: &Path, extension: &str) -> Result<PathBuf> {
    let exists = fs::try_exists(output).await.map_err(|e| ErrorKind::io(e, output))?;
    if !exists {
        tracing::debug!(path = %output.display(), "Creating output directory");
        fs::create_dir_all(output).await.map_err(|e| ErrorKind::io(e, output))?;
    }
    let metadata = fs::metadata(output).await.map_err(|e| ErrorKind::io(e, output))?;
    if metadata.is_dir() {
        Ok(output.join(file_name(&book.title, extension)))
    } else {
        Ok(output.to_path_buf())
    }
}

/// Name-to-exporter table.
pub struct Exporters {
    exporters: BTreeMap<String, Box<dyn Exporter>>,
}

impl Exporters {
    pub fn new() -> Self {
        Self {
            exporters: BTreeMap::new(),
        }
    }

    /// Table holding every exporter that ships with this crate.
    pub fn with_builtin() -> Self {
        let mut exporters = Self::new();
        exporters.register(TextExporter);
        exporters
    }

    pub fn register(&mut self, exporter: impl Exporter + 'static) {
        self.exporters.insert(exporter.name().to_string(), Box::new(exporter));
    }

    pub fn get(&self, name: &str) -> Result<&dyn Exporter> {
        match self.exporters.get(name) {
            Some(exporter) => Ok(exporter.as_ref()),
            None => exn::bail!(ErrorKind::UnknownFormat(name.to_string())),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.exporters.keys().map(String::as_str).collect()
    }
}

impl Default for Exporters {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("斗破苍穹", "斗破苍穹.txt")]
    #[case("  A/B: C?  ", "A_B_ C_.txt")]
    #[case("", "untitled.txt")]
    fn test_file_name(#[case] title: &str, #[case] expected: &str) {
        assert_eq!(file_name(title, ".txt"), expected);
    }

    #[test]
    fn test_lookup() {
        let exporters = Exporters::with_builtin();
        assert_eq!(exporters.names(), vec!["txt"]);
        assert_eq!(exporters.get("txt").unwrap().extension(), ".txt");
        let err = exporters.get("epub").err().unwrap();
        assert!(matches!(&*err, ErrorKind::UnknownFormat(name) if name == "epub"));
    }
}
