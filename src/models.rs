use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One show page, flattened to the JSONL output shape.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Record {
    pub url: String, // canonical, dedup key
    pub title: Option<String>,
    pub venue: Option<String>,
    pub address: Option<String>,
    pub arrondissement: Option<u8>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    pub duration_min: Option<u32>,
    pub price_min_eur: Option<f64>,
    pub price_max_eur: Option<f64>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub crawled_at: String,
}

/// A candidate value for one field of a [`Record`].
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Title(String),
    Venue(String),
    Address(String),
    Arrondissement(u8),
    DateStart(NaiveDate),
    DateEnd(NaiveDate),
    Duration(u32),
    PriceMin(f64),
    PriceMax(f64),
    Image(String),
    Description(String),
    Category(String),
}

impl Record {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timestamp(
            url,
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }

    pub fn with_timestamp(url: impl Into<String>, crawled_at: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            venue: None,
            address: None,
            arrondissement: None,
            date_start: None,
            date_end: None,
            duration_min: None,
            price_min_eur: None,
            price_max_eur: None,
            image: None,
            description: None,
            category: None,
            crawled_at: crawled_at.into(),
        }
    }

    /// Sets the field only when it is still empty. Returns whether the value was taken.
    pub fn merge(&mut self, value: FieldValue) -> bool {
        match value {
            FieldValue::Title(v) => fill(&mut self.title, v),
            FieldValue::Venue(v) => fill(&mut self.venue, v),
            FieldValue::Address(v) => fill(&mut self.address, v),
            FieldValue::Arrondissement(v) => fill(&mut self.arrondissement, v),
            FieldValue::DateStart(v) => fill(&mut self.date_start, v),
            FieldValue::DateEnd(v) => fill(&mut self.date_end, v),
            FieldValue::Duration(v) => fill(&mut self.duration_min, v),
            FieldValue::PriceMin(v) => fill(&mut self.price_min_eur, v),
            FieldValue::PriceMax(v) => fill(&mut self.price_max_eur, v),
            FieldValue::Image(v) => fill(&mut self.image, v),
            FieldValue::Description(v) => fill(&mut self.description, v),
            FieldValue::Category(v) => fill(&mut self.category, v),
        }
    }

    pub fn merge_opt(&mut self, value: Option<FieldValue>) -> bool {
        value.map(|v| self.merge(v)).unwrap_or(false)
    }

    /// At most one of title, venue, date_start and description is known.
    pub fn is_empty(&self) -> bool {
        let known = [
            self.title.is_some(),
            self.venue.is_some(),
            self.date_start.is_some(),
            self.description.is_some(),
        ];
        known.iter().filter(|k| **k).count() <= 1
    }
}

fn fill<T>(slot: &mut Option<T>, value: T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_first_value() {
        let mut record = Record::with_timestamp("https://www.offi.fr/x", "2025-01-01T00:00:00Z");
        assert!(record.merge(FieldValue::Title("Le Cid".into())));
        assert!(!record.merge(FieldValue::Title("Autre".into())));
        assert_eq!(record.title.as_deref(), Some("Le Cid"));
        assert!(!record.merge_opt(None));
    }

    #[test]
    fn bare_record_is_empty() {
        let mut record = Record::new("https://www.offi.fr/x");
        assert!(record.is_empty());
        record.merge(FieldValue::Image("https://img/x.jpg".into()));
        record.merge(FieldValue::Title("Le Cid".into()));
        assert!(record.is_empty(), "one core field is not enough");
        record.merge(FieldValue::Venue("Théâtre Mogador".into()));
        assert!(!record.is_empty());
    }

    #[test]
    fn serializes_flat_with_nulls() {
        let mut record = Record::with_timestamp("https://www.offi.fr/x", "2025-01-01T00:00:00Z");
        record.merge(FieldValue::DateStart(
            NaiveDate::from_ymd_opt(2025, 12, 30).expect("valid date"),
        ));
        let line = serde_json::to_string(&record).expect("serialize record");
        assert!(line.contains(r#""date_start":"2025-12-30""#));
        assert!(line.contains(r#""venue":null"#));
        assert!(line.starts_with(r#"{"url":"https://www.offi.fr/x""#));
    }
}
