use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;
use url::{ParseError, Url};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("UrlError, can't parse given URL: {0}")]
    UrlError(#[from] ParseError),
    #[error("ReqwestError: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("Server answered {0}")]
    StatusError(StatusCode),
}
pub type Result<T> = std::result::Result<T, FetchError>;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub const TIMEOUT: Duration = Duration::from_secs(30);

// Only the head of the document is searched for a charset declaration.
const SNIFF_LEN: usize = 4096;

static META_CHARSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i-u)<meta[^>]*?charset\s*=\s*["']?\s*([a-z0-9._:-]+)"#).unwrap()
});

/// Shared HTTP client, used for the article page and for every image.
#[derive(Clone)]
pub struct Fetcher(reqwest::Client);

impl Fetcher {

    /// `timeout` bounds connecting and each read, not the whole transfer.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;

        Ok(Self(client))
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.0
    }

    /// GETs the page and decodes it with its apparent encoding.
    /// Anything other than a 2xx answer is an error; there is no retry.
    pub async fn fetch_html(&self, url: &Url) -> Result<String> {

        let response = self.0
            .get(url.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::StatusError(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = response.bytes().await?;

        Ok(decode_html(&body, content_type.as_deref()))
    }
}

/// Decodes a page body. The document's own `<meta charset>` wins, then the
/// `Content-Type` charset, then a guess from the bytes themselves.
pub fn decode_html(body: &[u8], content_type: Option<&str>) -> String {

    let encoding = meta_charset(body)
        .or_else(|| content_type.and_then(header_charset))
        .unwrap_or_else(|| guess_encoding(body));

    let (text, actual, had_errors) = encoding.decode(body);
    if had_errors {
        tracing::debug!("page is not valid {}, some characters were replaced", actual.name());
    }

    text.into_owned()
}

fn meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(SNIFF_LEN)];
    let label = META_CHARSET_RE.captures(head)?.get(1)?;

    Encoding::for_label(label.as_bytes())
}

fn header_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .filter_map(|param| param.trim().split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, value)| Encoding::for_label(value.trim().trim_matches('"').as_bytes()))
}

fn guess_encoding(body: &[u8]) -> &'static Encoding {
    if std::str::from_utf8(body).is_ok() {
        return UTF_8;
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    detector.guess(None, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_page_with_browser_user_agent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/p/1"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><title>Hello</title></html>", "text/html; charset=utf-8"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(USER_AGENT, TIMEOUT).unwrap();
        let url = Url::parse(&format!("{}/p/1", server.uri())).unwrap();

        let html = fetcher.fetch_html(&url).await.unwrap();
        assert!(html.contains("<title>Hello</title>"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(USER_AGENT, TIMEOUT).unwrap();
        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();

        match fetcher.fetch_html(&url).await {
            Err(FetchError::StatusError(status)) => assert_eq!(status, StatusCode::NOT_FOUND),
            other => panic!("expected status error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn unreachable_host_is_an_error() {
        let fetcher = Fetcher::new(USER_AGENT, Duration::from_secs(2)).unwrap();
        let url = Url::parse("http://127.0.0.1:9/").unwrap();

        assert!(matches!(
            fetcher.fetch_html(&url).await,
            Err(FetchError::ReqwestError(_))
        ));
    }

    // "中文" in GBK
    const GBK_ZHONGWEN: &[u8] = &[0xd6, 0xd0, 0xce, 0xc4];

    fn gbk_page(head: &str) -> Vec<u8> {
        let mut page = format!("<html><head>{}<title>", head).into_bytes();
        page.extend_from_slice(GBK_ZHONGWEN);
        page.extend_from_slice(b"</title></head><body></body></html>");
        page
    }

    #[test]
    fn meta_charset_decides_without_header_charset() {
        let page = gbk_page(r#"<meta charset="gbk">"#);
        assert!(decode_html(&page, Some("text/html")).contains("<title>中文</title>"));
    }

    #[test]
    fn http_equiv_meta_is_understood() {
        let page = gbk_page(r#"<meta http-equiv="Content-Type" content="text/html; charset=GB2312">"#);
        assert!(decode_html(&page, None).contains("中文"));
    }

    #[test]
    fn header_charset_used_when_document_is_silent() {
        let page = gbk_page("");
        assert!(decode_html(&page, Some("text/html; charset=GBK")).contains("中文"));
    }

    #[test]
    fn utf8_is_the_plain_default() {
        let page = "<title>Rust 所有权</title>".as_bytes();
        assert_eq!(decode_html(page, Some("text/html")), "<title>Rust 所有权</title>");
    }

    #[tokio::test]
    async fn gbk_page_served_as_plain_html_is_decoded() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gbk"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(gbk_page(r#"<meta charset="gbk">"#), "text/html"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(USER_AGENT, TIMEOUT).unwrap();
        let url = Url::parse(&format!("{}/gbk", server.uri())).unwrap();

        let html = fetcher.fetch_html(&url).await.unwrap();
        assert!(html.contains("<title>中文</title>"));
        assert!(!html.contains('\u{fffd}'));
    }
}
