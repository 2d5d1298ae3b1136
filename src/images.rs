use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use url::Url;

/// Attributes an `<img>` may carry its address in, by priority.
const SOURCE_ATTRIBUTES: &[&str] = &["src", "data-src", "data-original"];

/// Non-content images: avatars, icons, logos, buttons and thumbnails.
const SKIP_PATTERNS: &[&str] = &["avatar", "icon", "logo", "button", "thumb_thumb"];

static IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

static SKIP_RE: Lazy<Vec<Regex>> = Lazy::new(|| {
    SKIP_PATTERNS
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
        .collect()
});

/// An absolute image address found in the article body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub url: Url,
}

impl ImageReference {

    fn from_element(element: ElementRef<'_>, base_url: &Url) -> Option<Self> {

        let src = SOURCE_ATTRIBUTES
            .iter()
            .filter_map(|attr| element.value().attr(attr))
            .find(|value| !value.is_empty())?;

        match base_url.join(src) {
            Ok(url) => Some(Self { url }),
            Err(e) => {
                tracing::debug!("skipping unresolvable image address {:?}: {}", src, e);
                None
            }
        }
    }

    pub fn is_skipped(&self) -> bool {
        is_skipped(self.url.as_str())
    }
}

/// True when the address matches one of the non-content patterns.
pub fn is_skipped(url: &str) -> bool {
    SKIP_RE.iter().any(|re| re.is_match(url))
}

/// Content images in document order. Duplicates are kept.
pub struct ImageReferences(pub Vec<ImageReference>);

impl ImageReferences {

    pub fn from(content: ElementRef<'_>, base_url: &Url) -> Self {

        let images = content
            .select(&IMG_SELECTOR)
            .filter_map(|element| ImageReference::from_element(element, base_url))
            .filter(|image| {
                let skipped = image.is_skipped();
                if skipped {
                    tracing::debug!("skipping non-content image {}", image.url);
                }
                !skipped
            })
            .collect();

        Self(images)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageReference> {
        self.0.iter()
    }
}
