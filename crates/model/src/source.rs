use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::fmt::{Display, Formatter, Result as FmtResult};
use url::Url;

/// Canonical locator of a book: host and path, no scheme, no trailing slash.
///
/// This is the external identity of a [`Book`](crate::Book); two books with
/// the same source are the same book.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Source(String);

impl Source {
    /// Canonicalize any locator (with or without a scheme) into a source.
    pub fn parse(locator: impl AsRef<str>) -> Result<Self> {
        canonicalize(locator).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full URL that can be requested again.
    pub fn whole_url(&self) -> String {
        format!("https://{}", self.0)
    }

    pub fn host(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(host, _)| host)
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Source {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reduce a locator to `host/path`.
///
/// The scheme, port, query and fragment are dropped, the host is lower-cased
/// and trailing slashes are removed. Input without a scheme is read as an
/// `http://` URL, which makes the function idempotent.
pub fn canonicalize(locator: impl AsRef<str>) -> Result<String> {
    let locator = locator.as_ref().trim();
    let invalid = || ErrorKind::InvalidSource(locator.to_string());
    let url = match Url::parse(locator) {
        Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => url,
        // "example.com/book" either fails to parse or parses with
        // "example.com" as its scheme.
        _ => Url::parse(&format!("http://{locator}")).or_raise(invalid)?,
    };
    let host = url.host_str().filter(|h| !h.is_empty()).ok_or_raise(invalid)?;
    let path = url.path().trim_end_matches('/');
    Ok(format!("{host}{path}"))
}
