//! Show/venue URL classification and canonical URL forms.

use regex::Regex;
use reqwest::Url;

use crate::config::ConfigError;

/// Role of a page, decided from its path alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// `/<section>/<venue-slug>-<id>/<item-slug>-<id>.html`
    Show,
    /// `/<section>/<venue-slug>-<id>` with optional `.html`
    Venue,
    Other,
}

/// Category for the first path segment.
const CATEGORIES: &[(&str, &str)] = &[
    ("theatre", "théâtre"),
    ("concerts", "concert"),
    ("danse", "danse"),
    ("expositions", "exposition"),
    ("enfants", "jeune public"),
];

#[derive(Debug, Clone)]
pub struct UrlClassifier {
    base: Url,
    section: String,
    show_re: Regex,
    venue_re: Regex,
    blocked: Vec<String>,
}

impl UrlClassifier {
    pub fn new(base: Url, section: &str, blocked: Vec<String>) -> Result<Self, ConfigError> {
        let section = section.trim_matches('/');
        if section.is_empty() || section.contains('/') {
            return Err(ConfigError::Section(section.to_string()));
        }
        let escaped = regex::escape(section);
        let show_re = Regex::new(&format!(r"^/{escaped}/[^/]+-\d+/[^/]+-\d+\.html$"))
            .map_err(|err| ConfigError::Section(err.to_string()))?;
        let venue_re = Regex::new(&format!(r"^/{escaped}/([^/]+)-\d+(?:\.html)?/?$"))
            .map_err(|err| ConfigError::Section(err.to_string()))?;
        Ok(Self {
            base,
            section: section.to_string(),
            show_re,
            venue_re,
            blocked,
        })
    }

    /// Resolves `href` against the site base and drops query and fragment.
    pub fn canonicalize(&self, href: &str) -> Option<Url> {
        self.resolve(&self.base, href)
    }

    /// Same as [`canonicalize`](Self::canonicalize) but relative to the page the link was found on.
    pub fn resolve(&self, page: &Url, href: &str) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }
        let mut url = page.join(href).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        url.set_query(None);
        url.set_fragment(None);
        Some(url)
    }

    pub fn classify(&self, url: &Url) -> UrlKind {
        let path = url.path();
        if self.show_re.is_match(path) {
            UrlKind::Show
        } else if self.venue_re.is_match(path) {
            UrlKind::Venue
        } else {
            UrlKind::Other
        }
    }

    /// Host matches the site base, ignoring a leading `www.`.
    pub fn is_same_site(&self, url: &Url) -> bool {
        let strip = |host: Option<&str>| host.map(|h| h.trim_start_matches("www.").to_lowercase());
        strip(url.host_str()) == strip(self.base.host_str())
            && url.port_or_known_default() == self.base.port_or_known_default()
    }

    pub fn is_blocked(&self, url: &Url) -> bool {
        let path = url.path();
        self.blocked.iter().any(|b| path.contains(b.as_str()))
    }

    /// Same-site page under the section root that may list further shows.
    pub fn is_listing(&self, url: &Url) -> bool {
        self.is_same_site(url)
            && !self.is_blocked(url)
            && self.classify(url) != UrlKind::Show
            && url.path().starts_with(&format!("/{}/", self.section))
    }

    /// The `<venue-slug>` of a show or venue URL, numeric id stripped.
    pub fn venue_slug<'u>(&self, url: &'u Url) -> Option<&'u str> {
        let path = url.path();
        let segment = match self.classify(url) {
            UrlKind::Show | UrlKind::Venue => path.trim_start_matches('/').split('/').nth(1)?,
            UrlKind::Other => return None,
        };
        let segment = segment.trim_end_matches(".html");
        let (slug, id) = segment.rsplit_once('-')?;
        if id.chars().all(|c| c.is_ascii_digit()) && !slug.is_empty() {
            Some(slug)
        } else {
            None
        }
    }

    pub fn category(&self, url: &Url) -> Option<String> {
        let first = url.path().trim_start_matches('/').split('/').next()?;
        CATEGORIES
            .iter()
            .find(|(segment, _)| *segment == first)
            .map(|(_, category)| category.to_string())
    }
}
