use crate::error::{ErrorKind, Result};
use sqlx::{QueryBuilder, Sqlite};

/// Condition on one column of the `books` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Text column equals the value.
    Is(String),
    /// Text column contains the value.
    Contains(String),
    /// Integer column equals the value.
    Number(i64),
    /// Flag column equals the value.
    Flag(bool),
}

#[derive(Clone, Copy)]
enum Kind {
    Text,
    Number,
    Flag,
}

/// Filterable columns. Anything else is rejected before it reaches SQL.
fn column(name: &str) -> Option<(&'static str, Kind)> {
    let column = match name {
        "title" => ("title", Kind::Text),
        "author" => ("author", Kind::Text),
        "description" => ("description", Kind::Text),
        "style" => ("style", Kind::Text),
        "source" => ("source", Kind::Text),
        "adapter" => ("adapter", Kind::Text),
        "cover_format" => ("cover_format", Kind::Text),
        "publish_date" => ("publish_date", Kind::Text),
        "update_date" => ("update_date", Kind::Text),
        "id" => ("id", Kind::Number),
        "chapter_count" => ("chapter_count", Kind::Number),
        "status" => ("status", Kind::Flag),
        _ => return None,
    };
    Some(column)
}

/// Listing of stored books: every filter must hold (conjunction), results
/// are ordered by id.
///
/// ```ignore
/// let unfinished = BookQuery::new().filter("status", Filter::Flag(false)).limit(20);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BookQuery {
    filters: Vec<(String, Filter)>,
    limit: Option<u32>,
    offset: Option<u32>,
}

impl BookQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: impl Into<String>, filter: Filter) -> Self {
        self.filters.push((column.into(), filter));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub(crate) fn build(&self) -> Result<QueryBuilder<'static, Sqlite>> {
        let mut builder = QueryBuilder::new("SELECT * FROM books WHERE 1 = 1");
        for (name, filter) in &self.filters {
            let Some((column, kind)) = column(name) else {
                exn::bail!(ErrorKind::UnsupportedFilter(name.clone()));
            };
            match (kind, filter) {
                (Kind::Text, Filter::Is(value)) => {
                    builder.push(" AND ").push(column).push(" = ").push_bind(value.clone());
                },
                (Kind::Text, Filter::Contains(value)) => {
                    // instr() rather than LIKE: no wildcard escaping needed.
                    builder.push(" AND instr(").push(column).push(", ").push_bind(value.clone()).push(") > 0");
                },
                (Kind::Number, Filter::Number(value)) => {
                    builder.push(" AND ").push(column).push(" = ").push_bind(*value);
                },
                (Kind::Flag, Filter::Flag(value)) => {
                    builder.push(" AND ").push(column).push(" = ").push_bind(*value);
                },
                _ => exn::bail!(ErrorKind::UnsupportedFilter(format!("{name} with {filter:?}"))),
            }
        }
        builder.push(" ORDER BY id");
        if self.limit.is_some() || self.offset.is_some() {
            // SQLite only accepts OFFSET after a LIMIT; -1 means no limit.
            builder
                .push(" LIMIT ")
                .push_bind(self.limit.map_or(-1, i64::from))
                .push(" OFFSET ")
                .push_bind(i64::from(self.offset.unwrap_or(0)));
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(BookQuery::new(), "SELECT * FROM books WHERE 1 = 1 ORDER BY id")]
    #[case(
        BookQuery::new().filter("title", Filter::Is("x".into())),
        "SELECT * FROM books WHERE 1 = 1 AND title = ? ORDER BY id"
    )]
    #[case(
        BookQuery::new().filter("author", Filter::Contains("x".into())).filter("status", Filter::Flag(true)),
        "SELECT * FROM books WHERE 1 = 1 AND instr(author, ?) > 0 AND status = ? ORDER BY id"
    )]
    #[case(BookQuery::new().offset(5), "SELECT * FROM books WHERE 1 = 1 ORDER BY id LIMIT ? OFFSET ?")]
    fn test_generated_sql(#[case] query: BookQuery, #[case] expected: &str) {
        assert_eq!(query.build().unwrap().sql(), expected);
    }

    #[rstest]
    #[case("cover", Filter::Is("x".into()))]
    #[case("title; DROP TABLE books", Filter::Is("x".into()))]
    #[case("title", Filter::Number(1))]
    #[case("chapter_count", Filter::Contains("1".into()))]
    #[case("status", Filter::Is("true".into()))]
    fn test_unsupported_filters(#[case] column: &str, #[case] filter: Filter) {
        let err = BookQuery::new().filter(column, filter).build().err().expect("expected an error");
        assert!(matches!(&*err, ErrorKind::UnsupportedFilter(_)));
    }
}
