//! Pure HTML extraction for biquge pages. Nothing here touches the network,
//! and nothing here holds a parsed document across an `.await`.

use crate::error::{ErrorKind, Result};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use time::Date;
use tome_model::{UNKNOWN_AUTHOR, parse_date};
use url::Url;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

selector!(TITLE, "#info h1");
selector!(INFO_LINES, "#info p");
selector!(ANCHOR, "a");
selector!(INTRO, "#intro");
selector!(COVER, "#fmimg img");
selector!(STATUS, "#fmimg span");
selector!(BREADCRUMB, ".con_top");
selector!(MENU, "#list dl");
selector!(CONTENT, "#content");
selector!(PAGE_STATS, "#pagestats");
selector!(RANKING_LINKS, "#main > div:nth-of-type(1) li span.s2 a");

/// Where to find one chapter, as listed on the book page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MenuItem {
    pub(crate) title: String,
    pub(crate) url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BookPage {
    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) description: String,
    pub(crate) style: String,
    pub(crate) cover_url: Option<String>,
    pub(crate) completed: bool,
    pub(crate) updated: Option<Date>,
    pub(crate) menu: Vec<MenuItem>,
}

fn missing<T>(field: &'static str, url: &Url) -> Result<T> {
    exn::bail!(ErrorKind::MissingField {
        field,
        url: url.to_string(),
    })
}

fn inner_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Direct text of a block, with `<br>` and `<p>` turned into line breaks.
///
/// Lines are trimmed (sites indent paragraphs with `&nbsp;`) and blank lines
/// are dropped.
fn block_text(element: ElementRef) -> String {
    let mut raw = String::new();
    for child in element.children() {
        match child.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(el) if el.name() == "br" => raw.push('\n'),
            Node::Element(el) if el.name() == "p" => {
                if let Some(p) = ElementRef::wrap(child) {
                    raw.push('\n');
                    raw.push_str(&p.text().collect::<String>());
                    raw.push('\n');
                }
            },
            _ => {},
        }
    }
    raw.replace('\u{a0}', " ")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn author(line: ElementRef) -> String {
    if let Some(link) = line.select(&ANCHOR).next() {
        return inner_text(link);
    }
    // "作    者：Name" without a link.
    let text = inner_text(line);
    match text.split_once(['：', ':']) {
        Some((_, name)) if !name.trim().is_empty() => name.trim().to_string(),
        _ => UNKNOWN_AUTHOR.to_string(),
    }
}

/// "笔趣阁 > 玄幻小说 > Title" gives "玄幻".
fn style(breadcrumb: &str) -> String {
    breadcrumb
        .split('>')
        .nth(1)
        .map(|s| s.trim().trim_end_matches("小说").to_string())
        .unwrap_or_default()
}

/// Chapters after the "latest chapters" block.
///
/// The list opens with a handful of recent chapters, then a `<center>` (or a
/// second `<dt>`) before the full list starts.
fn menu(document: &Html, page: &Url) -> Vec<MenuItem> {
    let Some(dl) = document.select(&MENU).next() else {
        return Vec::new();
    };
    let children: Vec<ElementRef> = dl.children().filter_map(ElementRef::wrap).collect();
    let start = children
        .iter()
        .position(|c| c.value().name() == "center")
        .or_else(|| children.iter().rposition(|c| c.value().name() == "dt"))
        .map_or(0, |i| i + 1);
    children[start..]
        .iter()
        .filter(|c| c.value().name() == "dd")
        .filter_map(|dd| dd.select(&ANCHOR).next())
        .filter_map(|a| {
            let url = page.join(a.value().attr("href")?).ok()?;
            Some(MenuItem {
                title: inner_text(a),
                url: url.to_string(),
            })
        })
        .collect()
}

pub(crate) fn book_page(html: &str, page: &Url) -> Result<BookPage> {
    let document = Html::parse_document(html);
    let Some(title) = document.select(&TITLE).next().map(inner_text) else {
        return missing("title", page);
    };
    let lines: Vec<ElementRef> = document.select(&INFO_LINES).collect();
    Ok(BookPage {
        title,
        author: lines.first().map(|l| author(*l)).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        description: document.select(&INTRO).next().map(block_text).unwrap_or_default(),
        style: document.select(&BREADCRUMB).next().map(|b| style(&inner_text(b))).unwrap_or_default(),
        cover_url: document
            .select(&COVER)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| page.join(src).ok())
            .map(|url| url.to_string()),
        completed: document
            .select(&STATUS)
            .next()
            .is_some_and(|span| span.value().classes().any(|c| c == "a")),
        updated: lines.get(2).and_then(|l| parse_date(inner_text(*l))),
        menu: menu(&document, page),
    })
}

pub(crate) fn chapter_content(html: &str, page: &Url) -> Result<String> {
    let document = Html::parse_document(html);
    match document.select(&CONTENT).next() {
        Some(content) => Ok(block_text(content)),
        None => missing("content", page),
    }
}

/// Number of ranking pages, from "1/1234".
pub(crate) fn page_count(html: &str, page: &Url) -> Result<u32> {
    let document = Html::parse_document(html);
    let count = document
        .select(&PAGE_STATS)
        .next()
        .map(inner_text)
        .and_then(|text| text.split('/').nth(1)?.trim().parse().ok());
    match count {
        Some(count) => Ok(count),
        None => missing("page count", page),
    }
}

/// `(title, absolute url)` of every book listed on a ranking page.
pub(crate) fn ranking(html: &str, page: &Url) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    document
        .select(&RANKING_LINKS)
        .filter_map(|a| {
            let url = page.join(a.value().attr("href")?).ok()?;
            Some((inner_text(a), url.to_string()))
        })
        .collect()
}
