use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

pub const UNTITLED: &str = "untitled article";

const TITLE_SELECTORS: &[&str] = &[
    "h1.postTitle",
    "h1#cb_post_title_url",
    "h1.post-title",
    "h1",
    ".postTitle",
    "#cb_post_title_url",
];

const CONTENT_SELECTORS: &[&str] = &[
    "#cnblogs_post_body",
    ".postBody",
    "#post_body",
    ".post-body",
    "div#cnblogs_post_body",
];

static TITLE_SELECTOR_LIST: Lazy<Vec<Selector>> = Lazy::new(|| parse_all(TITLE_SELECTORS));

static CONTENT_SELECTOR_LIST: Lazy<Vec<Selector>> = Lazy::new(|| parse_all(CONTENT_SELECTORS));

static TITLE_TAG: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

static SITE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*-\s*博客园.*$").unwrap());

fn parse_all(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
}

/// A parsed article page: its title and where the post body lives.
pub struct Article {
    pub title: String,
    document: Html,
    // index into CONTENT_SELECTOR_LIST of the selector that matched
    content: Option<usize>,
}

impl Article {

    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);

        let title = Self::find_title(&document);
        let content = Self::find_content(&document);

        if content.is_none() {
            tracing::warn!("no article body found, searching the whole page for images");
        }

        Self { title, document, content }
    }

    /// Whether a dedicated body container was found.
    pub fn has_content_region(&self) -> bool {
        self.content.is_some()
    }

    /// The body container, or the whole document when none matched.
    pub fn content(&self) -> ElementRef<'_> {
        self.content
            .and_then(|idx| self.document.select(&CONTENT_SELECTOR_LIST[idx]).next())
            .unwrap_or_else(|| self.document.root_element())
    }

    fn find_title(document: &Html) -> String {
        // First selector with a match decides, even if its text is empty.
        let from_heading = TITLE_SELECTOR_LIST
            .iter()
            .find_map(|sel| document.select(sel).next())
            .map(|el| collect_text(el).trim().to_string())
            .filter(|t| !t.is_empty());

        from_heading
            .or_else(|| {
                document
                    .select(&TITLE_TAG)
                    .next()
                    .map(|el| {
                        let text = collect_text(el);
                        SITE_SUFFIX_RE.replace(text.trim(), "").into_owned()
                    })
                    .filter(|t| !t.is_empty())
            })
            .unwrap_or_else(|| UNTITLED.to_string())
    }

    fn find_content(document: &Html) -> Option<usize> {
        CONTENT_SELECTOR_LIST
            .iter()
            .position(|sel| document.select(sel).next().is_some())
    }
}

fn collect_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}
