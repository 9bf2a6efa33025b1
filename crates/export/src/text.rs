use crate::error::{ErrorKind, Result};
use crate::{Exporter, resolve_output};
use async_trait::async_trait;
use std::ffi::OsString;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tome_model::Book;

/// Plain UTF-8 text: title, description, then every chapter in order.
///
/// The cover, when the book has one, is written next to the text file as
/// `<file>.<format>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextExporter;

impl TextExporter {
    pub const NAME: &'static str = "txt";

    fn render(book: &Book) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        _ = writeln!(out, "{}\n", book.title);
        if !book.description.is_empty() {
            _ = writeln!(out, "{}\n", book.description);
        }
        for chapter in &book.chapters {
            _ = writeln!(out, "{}\n\n{}\n", chapter.title, chapter.content);
        }
        out
    }
}

#[async_trait]
impl Exporter for TextExporter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn extension(&self) -> &str {
        ".txt"
    }

    async fn export(&self, book: &Book, output: &Path) -> Result<PathBuf> {
        let path = resolve_output(book, output, self.extension()).await?;
        fs::write(&path, Self::render(book)).await.map_err(|e| ErrorKind::io(e, &path))?;
        if let Some(cover) = &book.cover {
            let mut cover_path = OsString::from(path.as_os_str());
            cover_path.push(".");
            cover_path.push(&cover.format);
            let cover_path = PathBuf::from(cover_path);
            fs::write(&cover_path, &cover.bytes).await.map_err(|e| ErrorKind::io(e, &cover_path))?;
        }
        tracing::info!(title = %book.title, path = %path.display(), chapters = book.chapters.len(), "Book exported");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tome_model::{Chapter, Cover, Source};

    fn book() -> Book {
        let chapter = |index: u32, title: &str, content: &str| Chapter {
            title: title.to_string(),
            content: content.to_string(),
            ..Chapter::pending(index)
        };
        Book {
            title: "斗破苍穹".to_string(),
            description: "这里是属于斗气的世界。".to_string(),
            chapters: vec![chapter(0, "第一章", "第一段。\n第二段。"), chapter(1, "第二章", "斗之气。")],
            ..Book::new(Source::parse("www.xbiquge.so/book/52").unwrap())
        }
    }

    #[tokio::test]
    async fn test_export_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = TextExporter.export(&book(), dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("斗破苍穹.txt"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "斗破苍穹\n\n这里是属于斗气的世界。\n\n第一章\n\n第一段。\n第二段。\n\n第二章\n\n斗之气。\n\n"
        );
    }

    #[tokio::test]
    async fn test_export_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join("books");
        let path = TextExporter.export(&book(), &output).await.unwrap();
        assert!(output.is_dir());
        assert_eq!(path, output.join("斗破苍穹.txt"));
    }

    #[tokio::test]
    async fn test_export_to_existing_file_writes_cover_beside_it() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("book.txt");
        std::fs::write(&target, "old").unwrap();
        let mut book = book();
        book.cover = Some(Cover {
            bytes: vec![0xFF, 0xD8],
            format: "jpg".to_string(),
        });
        let path = TextExporter.export(&book, &target).await.unwrap();
        assert_eq!(path, target);
        assert!(std::fs::read_to_string(&target).unwrap().starts_with("斗破苍穹\n"));
        assert_eq!(std::fs::read(dir.path().join("book.txt.jpg")).unwrap(), vec![0xFF, 0xD8]);
    }
}
