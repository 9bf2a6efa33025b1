//! Recover text from bytes of unknown encoding.
//!
//! Many of the sites adapters deal with declare the wrong charset, or none at
//! all, so the declared charset is the last thing consulted rather than the
//! first.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, GBK, UTF_8};
use mime_guess::mime::{self, Mime};

/// Look up an encoding by any of its WHATWG labels (`gbk`, `utf-8`, `latin1`).
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Charset parameter of a `Content-Type` header value, if it names a known encoding.
pub fn declared_encoding(content_type: &str) -> Option<&'static Encoding> {
    let mime: Mime = content_type.parse().ok()?;
    encoding_for_label(mime.get_param(mime::CHARSET)?.as_str().trim_matches('"'))
}

/// Statistical guess; `None` for pure ASCII, which every candidate decodes identically.
fn detect(bytes: &[u8]) -> Option<&'static Encoding> {
    if bytes.is_ascii() {
        return None;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    Some(detector.guess(None, true))
}

/// Decode `bytes`, trying in order: the caller's hint, the detected encoding,
/// UTF-8, GBK and GB2312. The first encoding that decodes without a single
/// malformed sequence wins.
///
/// When none decodes cleanly the bytes are decoded lossily with the detected
/// encoding, falling back to the declared one and then UTF-8.
pub fn decode(bytes: &[u8], hint: Option<&'static Encoding>, declared: Option<&'static Encoding>) -> String {
    let detected = detect(bytes);
    // WHATWG maps the "gb2312" label onto GBK, so this step is normally
    // skipped as a duplicate.
    let gb2312 = Encoding::for_label(b"gb2312");
    let chain = [hint, detected, Some(UTF_8), Some(GBK), gb2312];
    let mut tried: Vec<&'static Encoding> = Vec::with_capacity(chain.len());
    for encoding in chain.into_iter().flatten() {
        if tried.contains(&encoding) {
            continue;
        }
        tried.push(encoding);
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            return text.into_owned();
        }
    }
    let fallback = detected.or(declared).unwrap_or(UTF_8);
    tracing::debug!(encoding = fallback.name(), "No encoding decoded cleanly; decoding lossily");
    fallback.decode_without_bom_handling(bytes).0.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{BIG5, WINDOWS_1252};
    use rstest::rstest;

    const CHINESE: &str = "第一章 风起青萍之末。少年站在山门之前，望着远处的云海，心中默默念着师父临别时留下的话语。\
                           他知道，从今天开始，一切都将不同。";

    #[test]
    fn test_hint_wins_when_it_decodes() {
        let (bytes, _, _) = GBK.encode(CHINESE);
        assert_eq!(decode(&bytes, Some(GBK), None), CHINESE);
    }

    #[test]
    fn test_detects_gbk_without_hint() {
        let (bytes, _, _) = GBK.encode(CHINESE);
        assert_eq!(decode(&bytes, None, None), CHINESE);
    }

    #[test]
    fn test_wrong_hint_falls_through() {
        let (bytes, _, _) = GBK.encode(CHINESE);
        assert_eq!(decode(&bytes, Some(UTF_8), None), CHINESE);
    }

    #[test]
    fn test_utf8_round_trip() {
        assert_eq!(decode(CHINESE.as_bytes(), None, Some(BIG5)), CHINESE);
        assert_eq!(decode(b"plain ascii", None, None), "plain ascii");
    }

    #[test]
    fn test_garbage_still_decodes() {
        // 0x81 followed by 0x20 is invalid in GBK, UTF-8 and Big5 alike.
        let bytes = [b'a', 0xFF, 0xFE, 0x81, 0x20, b'b'];
        let text = decode(&bytes, Some(UTF_8), None);
        assert!(text.starts_with('a'));
        assert!(text.ends_with('b'));
    }

    #[rstest]
    #[case("text/html; charset=gbk", Some(GBK))]
    #[case("text/html; charset=\"UTF-8\"", Some(UTF_8))]
    #[case("text/html; charset=iso-8859-1", Some(WINDOWS_1252))]
    #[case("text/html", None)]
    #[case("nonsense", None)]
    fn test_declared_encoding(#[case] content_type: &str, #[case] expected: Option<&'static Encoding>) {
        assert_eq!(declared_encoding(content_type), expected);
    }
}
