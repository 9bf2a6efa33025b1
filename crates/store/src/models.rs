use crate::error::{Error, ErrorKind};
use exn::{OptionExt, ResultExt};
use tome_model::{Book, BookId, Chapter, Cover, Source, format_date, parse_date};

#[derive(sqlx::FromRow)]
pub(crate) struct BookRow {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) description: String,
    pub(crate) style: String,
    pub(crate) cover: Option<Vec<u8>>,
    pub(crate) cover_format: Option<String>,
    pub(crate) chapter_count: i64,
    pub(crate) source: String,
    pub(crate) adapter: String,
    pub(crate) status: bool,
    pub(crate) publish_date: Option<String>,
    pub(crate) update_date: Option<String>,
}

/// Column values of a book about to be written. `id` is not part of it.
pub(crate) struct BookValues<'a> {
    pub(crate) title: &'a str,
    pub(crate) author: &'a str,
    pub(crate) description: &'a str,
    pub(crate) style: &'a str,
    pub(crate) cover: Option<&'a [u8]>,
    pub(crate) cover_format: Option<&'a str>,
    pub(crate) chapter_count: i64,
    pub(crate) source: &'a str,
    pub(crate) adapter: &'a str,
    pub(crate) status: bool,
    pub(crate) publish_date: Option<String>,
    pub(crate) update_date: Option<String>,
}

impl<'a> From<&'a Book> for BookValues<'a> {
    fn from(book: &'a Book) -> Self {
        Self {
            title: &book.title,
            author: &book.author,
            description: &book.description,
            style: &book.style,
            cover: book.cover.as_ref().map(|c| c.bytes.as_slice()),
            cover_format: book.cover.as_ref().map(|c| c.format.as_str()),
            chapter_count: i64::from(book.chapter_count),
            source: book.source.as_str(),
            adapter: &book.adapter,
            status: book.completed,
            publish_date: book.published.map(format_date),
            update_date: book.updated.map(format_date),
        }
    }
}

fn stored_date(text: Option<String>, field: &'static str) -> Result<Option<time::Date>, Error> {
    text.map(|t| parse_date(&t).ok_or_raise(|| ErrorKind::InvalidData(field))).transpose()
}

impl TryFrom<BookRow> for Book {
    type Error = Error;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        let cover = match (row.cover, row.cover_format) {
            (Some(bytes), Some(format)) => Some(Cover { bytes, format }),
            (Some(bytes), None) => Some(Cover {
                bytes,
                format: "jpg".to_string(),
            }),
            (None, _) => None,
        };
        Ok(Self {
            id: Some(BookId(row.id)),
            title: row.title,
            author: row.author,
            source: Source::parse(&row.source).or_raise(|| ErrorKind::InvalidData("source"))?,
            adapter: row.adapter,
            description: row.description,
            style: row.style,
            cover,
            completed: row.status,
            published: stored_date(row.publish_date, "publish date")?,
            updated: stored_date(row.update_date, "update date")?,
            chapter_count: u32::try_from(row.chapter_count).or_raise(|| ErrorKind::InvalidData("chapter count"))?,
            chapters: Vec::new(),
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ChapterRow {
    pub(crate) book_id: i64,
    pub(crate) chapter_index: i64,
    pub(crate) title: String,
    pub(crate) content: String,
}

impl TryFrom<ChapterRow> for Chapter {
    type Error = Error;

    fn try_from(row: ChapterRow) -> Result<Self, Self::Error> {
        Ok(Self {
            book_id: Some(BookId(row.book_id)),
            index: u32::try_from(row.chapter_index).or_raise(|| ErrorKind::InvalidData("chapter index"))?,
            title: row.title,
            content: row.content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn row() -> BookRow {
        BookRow {
            id: 7,
            title: "斗破苍穹".to_string(),
            author: "天蚕土豆".to_string(),
            description: String::new(),
            style: "玄幻".to_string(),
            cover: None,
            cover_format: None,
            chapter_count: 3,
            source: "www.xbiquge.so/book/52".to_string(),
            adapter: "biquge".to_string(),
            status: true,
            publish_date: None,
            update_date: Some("2023-05-17".to_string()),
        }
    }

    #[test]
    fn test_row_to_model() {
        let book = Book::try_from(row()).unwrap();
        assert_eq!(book.id, Some(BookId(7)));
        assert_eq!(book.source.as_str(), "www.xbiquge.so/book/52");
        assert_eq!(book.updated, Some(date!(2023 - 05 - 17)));
        assert_eq!(book.published, None);
        assert!(book.completed);
        assert!(book.chapters.is_empty());
    }

    #[test]
    fn test_model_to_values() {
        let book = Book::try_from(row()).unwrap();
        let values = BookValues::from(&book);
        assert_eq!(values.update_date.as_deref(), Some("2023-05-17"));
        assert_eq!(values.publish_date, None);
        assert_eq!(values.chapter_count, 3);
    }

    #[test]
    fn test_corrupt_rows_are_rejected() {
        let mut bad = row();
        bad.update_date = Some("yesterday".to_string());
        let err = Book::try_from(bad).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("update date")));

        let chapter = ChapterRow {
            book_id: 7,
            chapter_index: -1,
            title: String::new(),
            content: String::new(),
        };
        let err = Chapter::try_from(chapter).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("chapter index")));
    }
}
