//! Per-field extraction heuristics.
//!
//! Every field has an ordered list of named strategies. Each strategy is a
//! plain function over a [`DetailPage`] returning `None` when its
//! precondition does not hold; [`first_success`] walks the list in order.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Node, Selector};

use super::base;
use super::urls::{UrlClassifier, UrlKind};

/// Anchors inspected after the title heading when looking for a venue link.
const VENUE_LINK_WINDOW: usize = 12;
/// Keyword blocks longer than this are too broad to scope a price search.
const PRICE_BLOCK_MAX_CHARS: usize = 400;

const BOOKING_WORDS: &[&str] = &[
    "réserv", "reserv", "billet", "ticket", "tarif", "prix", "promo", "offre", "acheter",
    "places", "gratuit",
];
const PRICE_HINTS: &[&str] = &["tarif", "billet", "réservation", "reservation", "prix"];
const DESCRIPTION_HEADINGS: &[&str] = &[
    "présentation",
    "presentation",
    "résumé",
    "resume",
    "synopsis",
    "à propos",
    "a propos",
    "about",
];

static H1_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("h1 selector"));
static BREADCRUMB_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        ".breadcrumb a, .breadcrumbs a, .fil-ariane a, nav[aria-label=breadcrumb] a, [itemtype=\"https://schema.org/BreadcrumbList\"] a, [itemtype=\"http://schema.org/BreadcrumbList\"] a",
    )
    .expect("breadcrumb selector")
});
static ADDRESS_TAG_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("address").expect("address selector"));
static ADDRESS_CLASS_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[itemprop=address], .adresse, .address, .lieu-adresse")
        .expect("address class selector")
});
static PRICE_CLASS_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[class*=tarif], [class*=prix], [class*=price], [id*=tarif], [class*=billet]")
        .expect("price class selector")
});
static TEXT_BLOCK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("p, li, dd, dt, td, span, div, section").expect("text block selector")
});
static SECTION_HEADING_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h2, h3, h4").expect("section heading selector"));
static OG_IMAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("meta[property=\"og:image\"], meta[name=\"og:image\"]")
        .expect("og image selector")
});
static TWITTER_IMAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("meta[name=\"twitter:image\"], meta[property=\"twitter:image\"]")
        .expect("twitter image selector")
});
static META_DESCRIPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("meta[name=description]").expect("meta description selector")
});
static OG_DESCRIPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("meta[property=\"og:description\"]").expect("og description selector")
});

static STREET_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b((?:\d{1,3}(?:\s*(?:bis|ter))?\s*,?\s*)?(?:rue|avenue|av|bd|boulevard|quai|place|chemin|allée|impasse|passage|cité|square|cours)\b[^,;\n]{1,80}?[,;]?\s*\d{5}\s+paris)\b",
    )
    .expect("street address regex")
});
static PARIS_POSTCODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b75\d{3}\s+paris\b").expect("postcode regex"));
static ARRONDISSEMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b750(\d{2})\b").expect("arrondissement regex"));
static DURATION_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)durée\s*[:\-]?\s*(?:de\s+)?([0-9hHmin\s]+)").expect("duration label regex")
});
static DURATION_HOURS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s*h(?:eures?)?\s*(\d{1,2})?(?:\s*(?:min|mn))?\b")
        .expect("duration hours regex")
});
static DURATION_MINUTES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,3})\s*(?:mn|min(?:utes?)?)\b").expect("duration minutes regex")
});
static PRICE_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d{1,2})?)\s*(?:€\s*)?(?:-|–|—|à)\s*(\d+(?:[.,]\d{1,2})?)\s*€")
        .expect("price range regex")
});
static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:[.,]\d{1,2})?)\s*€").expect("price regex"));

/// Everything a strategy may look at.
pub struct DetailPage<'a> {
    pub url: &'a Url,
    pub document: &'a Html,
    /// Whole-document text, whitespace normalised.
    pub text: &'a str,
    pub classifier: &'a UrlClassifier,
    /// Anchor text of the link this page was discovered from.
    pub link_text: Option<&'a str>,
}

pub type Strategy<'s, T> = (&'s str, fn(&DetailPage<'_>) -> Option<T>);

/// Runs strategies in priority order and returns the first hit.
pub fn first_success<T>(page: &DetailPage<'_>, strategies: &[Strategy<'_, T>]) -> Option<T> {
    strategies.iter().find_map(|(name, strategy)| {
        let found = strategy(page);
        if found.is_some() {
            log::debug!("{name} matched on {}", page.url);
        }
        found
    })
}

// Title

pub const TITLE_STRATEGIES: &[Strategy<'static, String>] = &[
    ("title.h1", title_from_heading),
    ("title.link_text", title_from_link_text),
];

fn title_from_heading(page: &DetailPage<'_>) -> Option<String> {
    base::first_text(page.document, &H1_SELECTOR)
}

fn title_from_link_text(page: &DetailPage<'_>) -> Option<String> {
    page.link_text.map(base::clean_text).and_then(base::non_empty)
}

// Venue

/// DOM strategies first; the URL slug is the last resort.
pub const VENUE_STRATEGIES: &[Strategy<'static, String>] = &[
    ("venue.breadcrumb", venue_from_breadcrumb),
    ("venue.after_title", venue_after_title),
    ("venue.url_slug", venue_from_url),
];

fn venue_from_breadcrumb(page: &DetailPage<'_>) -> Option<String> {
    let links: Vec<ElementRef<'_>> = page.document.select(&BREADCRUMB_SELECTOR).collect();
    links
        .into_iter()
        .rev()
        .find_map(|a| venue_link_text(page, a))
}

fn venue_after_title(page: &DetailPage<'_>) -> Option<String> {
    let h1 = page.document.select(&H1_SELECTOR).next()?;
    let mut passed_title = false;
    let mut inspected = 0;
    for node in page.document.root_element().descendants() {
        if node.id() == h1.id() {
            passed_title = true;
            continue;
        }
        if !passed_title {
            continue;
        }
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        if el.value().name() != "a" || el.value().attr("href").is_none() {
            continue;
        }
        inspected += 1;
        if inspected > VENUE_LINK_WINDOW {
            break;
        }
        if let Some(name) = venue_link_text(page, el) {
            return Some(name);
        }
    }
    None
}

fn venue_link_text(page: &DetailPage<'_>, anchor: ElementRef<'_>) -> Option<String> {
    let href = anchor.value().attr("href")?;
    let target = page.classifier.resolve(page.url, href)?;
    if page.classifier.classify(&target) != UrlKind::Venue {
        return None;
    }
    let text = base::inner_text(anchor);
    is_plausible_venue(&text).then_some(text)
}

fn venue_from_url(page: &DetailPage<'_>) -> Option<String> {
    let slug = page.classifier.venue_slug(page.url)?;
    let words: Vec<String> = slug
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(title_case)
        .collect();
    base::non_empty(words.join(" "))
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Venue names have at least two words, some letters, and no prices or booking words.
pub fn is_plausible_venue(text: &str) -> bool {
    let lower = text.to_lowercase();
    if lower.chars().any(|c| c.is_ascii_digit() || matches!(c, '€' | '$' | '£' | '%')) {
        return false;
    }
    if BOOKING_WORDS.iter().any(|w| lower.contains(w)) {
        return false;
    }
    text.split_whitespace().count() >= 2 && text.chars().any(char::is_alphabetic)
}

// Address

pub const ADDRESS_STRATEGIES: &[Strategy<'static, String>] = &[
    ("address.tag", address_from_tag),
    ("address.class", address_from_class),
    ("address.street", address_from_street_pattern),
    ("address.postcode", address_from_postcode),
];

fn address_from_tag(page: &DetailPage<'_>) -> Option<String> {
    base::first_text(page.document, &ADDRESS_TAG_SELECTOR)
}

fn address_from_class(page: &DetailPage<'_>) -> Option<String> {
    base::first_text(page.document, &ADDRESS_CLASS_SELECTOR)
}

fn address_from_street_pattern(page: &DetailPage<'_>) -> Option<String> {
    STREET_ADDRESS_RE
        .captures(page.text)
        .map(|caps| caps[1].trim().to_string())
}

fn address_from_postcode(page: &DetailPage<'_>) -> Option<String> {
    PARIS_POSTCODE_RE
        .find(page.text)
        .map(|m| m.as_str().to_string())
}

/// 1 to 20 for postcodes 75001 to 75020, `None` otherwise.
pub fn arrondissement(address: &str) -> Option<u8> {
    ARRONDISSEMENT_RE
        .captures_iter(address)
        .filter_map(|caps| caps[1].parse::<u8>().ok())
        .find(|n| (1..=20).contains(n))
}

// Duration

pub const DURATION_STRATEGIES: &[Strategy<'static, u32>] = &[
    ("duration.label", duration_from_label),
    ("duration.any", duration_from_text),
];

fn duration_from_label(page: &DetailPage<'_>) -> Option<u32> {
    DURATION_LABEL_RE
        .captures_iter(page.text)
        .find_map(|caps| parse_duration(&caps[1]))
}

fn duration_from_text(page: &DetailPage<'_>) -> Option<u32> {
    parse_duration_unlabelled(page.text)
}

/// Total minutes from `1h30`, `2h`, `90 min`, `75mn`; non-positive totals are dropped.
pub fn parse_duration(text: &str) -> Option<u32> {
    if let Some(caps) = DURATION_HOURS_RE.captures(text) {
        let hours: u32 = caps[1].parse().ok()?;
        let minutes: u32 = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        return positive(hours * 60 + minutes);
    }
    let caps = DURATION_MINUTES_RE.captures(text)?;
    positive(caps[1].parse().ok()?)
}

/// Like [`parse_duration`] but skips times of day such as "à 20h30".
fn parse_duration_unlabelled(text: &str) -> Option<u32> {
    for caps in DURATION_HOURS_RE.captures_iter(text) {
        let m = caps.get(0)?;
        let before = text[..m.start()].trim_end();
        if before.ends_with(" à") || before.ends_with(" a") {
            continue;
        }
        if let Some(total) = parse_duration(m.as_str()) {
            return Some(total);
        }
    }
    DURATION_MINUTES_RE
        .captures_iter(text)
        .find_map(|caps| caps[1].parse().ok().and_then(positive))
}

fn positive(minutes: u32) -> Option<u32> {
    (minutes > 0).then_some(minutes)
}

// Price

pub const PRICE_STRATEGIES: &[Strategy<'static, (f64, f64)>] = &[
    ("price.class", prices_from_class),
    ("price.keyword_block", prices_near_keyword),
    ("price.document", prices_from_document),
];

fn prices_from_class(page: &DetailPage<'_>) -> Option<(f64, f64)> {
    page.document
        .select(&PRICE_CLASS_SELECTOR)
        .find_map(|el| parse_prices(&base::inner_text(el)))
}

fn prices_near_keyword(page: &DetailPage<'_>) -> Option<(f64, f64)> {
    page.document
        .select(&TEXT_BLOCK_SELECTOR)
        .filter_map(|el| {
            let text = base::inner_text(el);
            let lower = text.to_lowercase();
            (text.chars().count() <= PRICE_BLOCK_MAX_CHARS
                && PRICE_HINTS.iter().any(|hint| lower.contains(hint)))
            .then_some(text)
        })
        .find_map(|text| parse_prices(&text))
}

fn prices_from_document(page: &DetailPage<'_>) -> Option<(f64, f64)> {
    parse_prices(page.text)
}

/// `(min, max)` euros: an explicit range wins, otherwise the extremes of all amounts.
pub fn parse_prices(text: &str) -> Option<(f64, f64)> {
    if let Some(caps) = PRICE_RANGE_RE.captures(text) {
        if let (Some(lo), Some(hi)) = (amount(&caps[1]), amount(&caps[2])) {
            return Some(if lo <= hi { (lo, hi) } else { (hi, lo) });
        }
    }
    let amounts: Vec<f64> = PRICE_RE
        .captures_iter(text)
        .filter_map(|caps| amount(&caps[1]))
        .collect();
    let min = amounts.iter().copied().reduce(f64::min)?;
    let max = amounts.iter().copied().reduce(f64::max)?;
    Some((min, max))
}

fn amount(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse().ok()
}

// Image

pub const IMAGE_STRATEGIES: &[Strategy<'static, String>] = &[
    ("image.og", image_from_og),
    ("image.twitter", image_from_twitter),
];

fn image_from_og(page: &DetailPage<'_>) -> Option<String> {
    base::absolute_url(
        page.url,
        base::first_attr(page.document, &OG_IMAGE_SELECTOR, "content"),
    )
}

fn image_from_twitter(page: &DetailPage<'_>) -> Option<String> {
    base::absolute_url(
        page.url,
        base::first_attr(page.document, &TWITTER_IMAGE_SELECTOR, "content"),
    )
}

// Description

pub const DESCRIPTION_STRATEGIES: &[Strategy<'static, String>] = &[
    ("description.section", description_from_section),
    ("description.meta", description_from_meta),
    ("description.og", description_from_og),
];

fn description_from_section(page: &DetailPage<'_>) -> Option<String> {
    page.document
        .select(&SECTION_HEADING_SELECTOR)
        .filter(|h| {
            let text = base::inner_text(*h).to_lowercase();
            DESCRIPTION_HEADINGS.iter().any(|key| text.contains(key))
        })
        .find_map(section_body)
}

/// Block text following `heading` up to the next heading of the same or a higher level.
fn section_body(heading: ElementRef<'_>) -> Option<String> {
    let level = base::heading_level(heading.value().name())?;
    let parts = collect_section(heading, level);
    if !parts.is_empty() {
        return Some(parts.join("\n\n"));
    }
    // heading wrapped alone in a container: continue from the container
    let parent = heading.parent().and_then(ElementRef::wrap)?;
    let parts = collect_section(parent, level);
    (!parts.is_empty()).then(|| parts.join("\n\n"))
}

fn collect_section(start: ElementRef<'_>, level: u8) -> Vec<String> {
    let mut parts = Vec::new();
    for sibling in start.next_siblings() {
        match sibling.value() {
            Node::Element(el) => {
                if base::heading_level(el.name()).is_some_and(|l| l <= level) {
                    break;
                }
                let Some(el_ref) = ElementRef::wrap(sibling) else {
                    continue;
                };
                if contains_heading(el_ref, level) {
                    break;
                }
                if matches!(
                    el.name(),
                    "p" | "div" | "section" | "blockquote" | "ul" | "ol" | "article"
                ) {
                    if let Some(text) = base::non_empty(base::inner_text(el_ref)) {
                        parts.push(text);
                    }
                }
            }
            Node::Text(text) => {
                if let Some(text) = base::non_empty(base::clean_text(text)) {
                    parts.push(text);
                }
            }
            _ => {}
        }
    }
    parts
}

fn contains_heading(el: ElementRef<'_>, level: u8) -> bool {
    el.descendants()
        .filter_map(ElementRef::wrap)
        .any(|d| base::heading_level(d.value().name()).is_some_and(|l| l <= level))
}

fn description_from_meta(page: &DetailPage<'_>) -> Option<String> {
    base::first_attr(page.document, &META_DESCRIPTION_SELECTOR, "content")
}

fn description_from_og(page: &DetailPage<'_>) -> Option<String> {
    base::first_attr(page.document, &OG_DESCRIPTION_SELECTOR, "content")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_HTML: &str = r#"
    <html><head>
        <meta property="og:image" content="/images/spectacles/le-cid.jpg">
        <meta name="description" content="  Une tragi-comédie de Corneille.  ">
    </head><body>
        <nav class="breadcrumb">
            <a href="/">Accueil</a>
            <a href="/theatre/programme.html">Théâtre</a>
            <a href="/theatre/comedie-francaise-salle-richelieu-1180.html">Comédie-Française Salle Richelieu</a>
            <a href="/theatre/comedie-francaise-salle-richelieu-1180/le-cid-91234.html">Le Cid</a>
        </nav>
        <h1>  Le   Cid </h1>
        <div class="infos">
            <p>Du 10 septembre 2025 au 15 octobre 2025 à 20h30</p>
            <address>Place Colette, 75001 Paris</address>
            <p>Durée : 2h15</p>
            <div class="tarifs">Tarifs : de 15 à 45 €</div>
        </div>
        <h2>Présentation</h2>
        <p>Rodrigue aime Chimène.</p>
        <p>Mais l'honneur l'appelle.</p>
        <h3>Distribution</h3>
        <p>Troupe de la Comédie-Française</p>
        <h2>Avis</h2>
        <p>Magnifique !</p>
    </body></html>
    "#;

    fn classifier() -> UrlClassifier {
        UrlClassifier::new(
            Url::parse("https://www.offi.fr").expect("base"),
            "theatre",
            Vec::new(),
        )
        .expect("classifier")
    }

    fn with_page<T>(html: &str, url: &str, f: impl FnOnce(&DetailPage<'_>) -> T) -> T {
        let document = Html::parse_document(html);
        let text = base::document_text(&document);
        let url = Url::parse(url).expect("page url");
        let classifier = classifier();
        let page = DetailPage {
            url: &url,
            document: &document,
            text: &text,
            classifier: &classifier,
            link_text: None,
        };
        f(&page)
    }

    const DETAIL_URL: &str =
        "https://www.offi.fr/theatre/comedie-francaise-salle-richelieu-1180/le-cid-91234.html";

    #[test]
    fn extracts_detail_fields() {
        with_page(DETAIL_HTML, DETAIL_URL, |page| {
            assert_eq!(first_success(page, TITLE_STRATEGIES).as_deref(), Some("Le Cid"));
            assert_eq!(
                first_success(page, VENUE_STRATEGIES).as_deref(),
                Some("Comédie-Française Salle Richelieu")
            );
            let address = first_success(page, ADDRESS_STRATEGIES).expect("address");
            assert_eq!(address, "Place Colette, 75001 Paris");
            assert_eq!(arrondissement(&address), Some(1));
            assert_eq!(first_success(page, DURATION_STRATEGIES), Some(135));
            assert_eq!(first_success(page, PRICE_STRATEGIES), Some((15.0, 45.0)));
            assert_eq!(
                first_success(page, IMAGE_STRATEGIES).as_deref(),
                Some("https://www.offi.fr/images/spectacles/le-cid.jpg")
            );
            assert_eq!(
                first_success(page, DESCRIPTION_STRATEGIES).as_deref(),
                Some("Rodrigue aime Chimène.\n\nMais l'honneur l'appelle.\n\nTroupe de la Comédie-Française")
            );
        });
    }

    #[test]
    fn venue_falls_back_to_link_after_title_then_slug() {
        let html = r#"<body>
            <a href="/theatre/theatre-du-rond-point-77.html">Théâtre du Rond-Point</a>
            <h1>Titre</h1>
            <a href="/theatre/theatre-du-rond-point-77.html">Réserver 25 €</a>
            <a href="/theatre/theatre-du-rond-point-77.html">Théâtre du Rond-Point</a>
        </body>"#;
        let url = "https://www.offi.fr/theatre/theatre-du-rond-point-77/titre-5.html";
        with_page(html, url, |page| {
            assert_eq!(venue_from_breadcrumb(page), None);
            assert_eq!(
                first_success(page, VENUE_STRATEGIES).as_deref(),
                Some("Théâtre du Rond-Point")
            );
        });
        with_page("<body><h1>Titre</h1></body>", url, |page| {
            assert_eq!(
                first_success(page, VENUE_STRATEGIES).as_deref(),
                Some("Theatre Du Rond Point")
            );
        });
    }

    #[test]
    fn venue_plausibility() {
        assert!(is_plausible_venue("Théâtre Mogador"));
        assert!(!is_plausible_venue("Mogador"));
        assert!(!is_plausible_venue("Réserver vos places"));
        assert!(!is_plausible_venue("Salle 2"));
        assert!(!is_plausible_venue("-20 % ce soir"));
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("1h30"), Some(90));
        assert_eq!(parse_duration("2h"), Some(120));
        assert_eq!(parse_duration("90 min"), Some(90));
        assert_eq!(parse_duration("75mn"), Some(75));
        assert_eq!(parse_duration("0h"), None);
        assert_eq!(parse_duration("0 min"), None);
        assert_eq!(parse_duration_unlabelled("Le 4 mars à 20h30, spectacle de 1h10"), Some(70));
    }

    #[test]
    fn prices() {
        assert_eq!(parse_prices("12-30 €"), Some((12.0, 30.0)));
        assert_eq!(parse_prices("Tarif: 15€"), Some((15.0, 15.0)));
        assert_eq!(parse_prices("Plein 32,50 € / réduit 18 €"), Some((18.0, 32.5)));
        assert_eq!(parse_prices("Entrée libre"), None);
    }

    #[test]
    fn arrondissement_bounds() {
        assert_eq!(arrondissement("12 rue X 75020 Paris"), Some(20));
        assert_eq!(arrondissement("75021 Paris"), None);
        assert_eq!(arrondissement("92100 Boulogne"), None);
        assert_eq!(arrondissement("75116 Paris"), None);
    }

    #[test]
    fn street_address_without_markup() {
        let html = "<body><p>Théâtre, 15 rue Blanche 75009 Paris. Métro Trinité.</p></body>";
        with_page(html, DETAIL_URL, |page| {
            let address = first_success(page, ADDRESS_STRATEGIES).expect("address");
            assert_eq!(address, "15 rue Blanche 75009 Paris");
            assert_eq!(arrondissement(&address), Some(9));
        });
    }

    #[test]
    fn description_falls_back_to_meta() {
        let html = r#"<head><meta name="description" content="  Résumé court.  "></head><body><h1>X</h1></body>"#;
        with_page(html, DETAIL_URL, |page| {
            assert_eq!(
                first_success(page, DESCRIPTION_STRATEGIES).as_deref(),
                Some("Résumé court.")
            );
        });
    }
}
