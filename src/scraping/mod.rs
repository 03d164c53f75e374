pub mod base;
pub mod dates;
pub mod fields;
pub mod urls;

use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{Html, Selector};

use crate::models::{FieldValue, Record};
use dates::{DateRange, DateResolver};
use fields::DetailPage;
use urls::{UrlClassifier, UrlKind};

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("link selector"));
static JSON_LD_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("script[type=\"application/ld+json\"]").expect("json-ld selector")
});
static TIME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time[datetime]").expect("time selector"));
static ITEMPROP_DATE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[itemprop=startDate], [itemprop=endDate]").expect("itemprop date selector")
});

/// An outbound link found on a listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub url: Url,
    pub kind: UrlKind,
    pub text: Option<String>,
}

/// Turns fetched HTML into records and outbound links.
#[derive(Debug, Clone)]
pub struct Extractor {
    classifier: UrlClassifier,
    resolver: DateResolver,
}

impl Extractor {
    pub fn new(classifier: UrlClassifier) -> Self {
        Self {
            classifier,
            resolver: DateResolver::new(),
        }
    }

    pub fn classifier(&self) -> &UrlClassifier {
        &self.classifier
    }

    /// Builds the record of a show page. Fields that no strategy finds stay `None`.
    pub fn parse_detail(&self, url: &Url, html: &str, link_text: Option<&str>) -> Record {
        let mut record = Record::new(url.as_str());
        let document = Html::parse_document(html);
        let text = base::document_text(&document);
        let page = DetailPage {
            url,
            document: &document,
            text: &text,
            classifier: &self.classifier,
            link_text,
        };

        record.merge_opt(fields::first_success(&page, fields::TITLE_STRATEGIES).map(FieldValue::Title));

        if let Some(address) = fields::first_success(&page, fields::ADDRESS_STRATEGIES) {
            record.merge_opt(fields::arrondissement(&address).map(FieldValue::Arrondissement));
            record.merge(FieldValue::Address(address));
        }

        let dates = self
            .resolver
            .resolve_with_metadata(&text, &date_metadata(&document));
        record.merge_opt(dates.start.map(FieldValue::DateStart));
        record.merge_opt(dates.end.map(FieldValue::DateEnd));

        record.merge_opt(
            fields::first_success(&page, fields::DURATION_STRATEGIES).map(FieldValue::Duration),
        );
        if let Some((min, max)) = fields::first_success(&page, fields::PRICE_STRATEGIES) {
            record.merge(FieldValue::PriceMin(min));
            record.merge(FieldValue::PriceMax(max));
        }
        record.merge_opt(fields::first_success(&page, fields::IMAGE_STRATEGIES).map(FieldValue::Image));
        record.merge_opt(
            fields::first_success(&page, fields::DESCRIPTION_STRATEGIES)
                .map(FieldValue::Description),
        );
        record.merge_opt(self.classifier.category(url).map(FieldValue::Category));

        // lowest confidence, runs last
        record.merge_opt(fields::first_success(&page, fields::VENUE_STRATEGIES).map(FieldValue::Venue));

        record
    }

    /// Canonical same-site links of a page, in document order, without duplicates.
    pub fn discover_links(&self, page_url: &Url, html: &str) -> Vec<Link> {
        let document = Html::parse_document(html);
        let mut links: Vec<Link> = Vec::new();
        for anchor in document.select(&LINK_SELECTOR) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(url) = self.classifier.resolve(page_url, href) else {
                continue;
            };
            if !self.classifier.is_same_site(&url) || self.classifier.is_blocked(&url) {
                continue;
            }
            if links.iter().any(|l| l.url == url) {
                continue;
            }
            let text = base::non_empty(base::inner_text(anchor));
            let kind = self.classifier.classify(&url);
            links.push(Link { url, kind, text });
        }
        links
    }
}

/// Dates published as JSON-LD, `<time datetime>` or microdata.
fn date_metadata(document: &Html) -> Vec<DateRange> {
    let mut ranges = Vec::new();
    for script in document.select(&JSON_LD_SELECTOR) {
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => ranges.extend(dates::json_ld_ranges(&value)),
            Err(err) => log::debug!("ignoring malformed json-ld: {err}"),
        }
    }
    for time in document.select(&TIME_SELECTOR) {
        if let Some(day) = time.value().attr("datetime").and_then(dates::parse_iso_prefix) {
            ranges.push(DateRange::new(Some(day), Some(day)));
        }
    }
    for el in document.select(&ITEMPROP_DATE_SELECTOR) {
        let value = el.value().attr("content").or_else(|| el.value().attr("datetime"));
        let Some(day) = value.and_then(dates::parse_iso_prefix) else {
            continue;
        };
        match el.value().attr("itemprop") {
            Some("startDate") => ranges.push(DateRange::new(Some(day), None)),
            _ => ranges.push(DateRange::new(None, Some(day))),
        }
    }
    ranges
}
