//! Listing cards extracted from an agent's final answer.
//!
//! Two sources are understood:
//!
//! - a raw JSON search payload with a `searchResults` array (the tool
//!   server's own format, sometimes echoed back verbatim by the LLM)
//! - a markdown answer with numbered entries such as
//!   `1. Cozy Loft in Back Bay ... $420 total ... 4.92/5 ... [View listing](https://..)`

use std::collections::HashSet;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

const LISTING_PATTERN: &str =
    r"(?is)(\d+\.\s*[^$\n]+).*?\$([0-9,]+).*?(\d+\.\d+)/5.*?(view listing|view property)";
const LISTING_FALLBACK_PATTERN: &str = r"(\d+\.\s*[^$\n]+).*?\$([0-9,]+)";
const URL_PATTERN: &str = r#"(?:\(|\[)?(https?://[^\s"']+)(?:\)|\]|\.|,)?"#;
const LOCATION_PATTERN: &str = r"(?i)\bin\s+([^,.]+)";
const RATING_PATTERN: &str = r"(\d+\.\d+)";

const PROPERTY_TYPES: [&str; 5] = ["apartment", "studio", "condo", "house", "room"];
const KNOWN_AREAS: [&str; 8] = [
    "New York",
    "Manhattan",
    "Brooklyn",
    "Queens",
    "Bronx",
    "Hell's Kitchen",
    "Jersey City",
    "Harlem",
];
const AMENITY_PREVIEW: usize = 5;

/// One lodging option as shown in the UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingCard {
    pub name: String,
    /// Listing link, `#` when none was found.
    pub url: String,
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_line: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_line: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amenities: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Build cards from the final answer text. Unrecognized text yields none.
pub fn extract_cards(text: &str) -> Vec<ListingCard> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        if let Some(results) = value.get("searchResults").and_then(|v| v.as_array()) {
            return results.iter().map(card_from_json).collect();
        }
    }
    scrape_markdown(text)
}

// ── JSON payloads ────────────────────────────────────────────────────────

fn card_from_json(raw: &serde_json::Value) -> ListingCard {
    let str_at = |ptr: &str| raw.pointer(ptr).and_then(|v| v.as_str()).map(str::to_string);

    let rating = str_at("/avgRatingA11yLabel").and_then(|label| {
        Regex::new(RATING_PATTERN)
            .ok()?
            .captures(&label)
            .map(|c| c[1].to_string())
    });

    ListingCard {
        name: str_at("/listing/name").unwrap_or_else(|| "Unknown property".into()),
        url: str_at("/url").unwrap_or_else(|| "#".into()),
        price: str_at("/structuredDisplayPrice/primaryLine/accessibilityLabel")
            .unwrap_or_else(|| "Price unknown".into()),
        rating,
        reviews_count: raw.get("reviewsCount").and_then(reviews_count),
        primary_line: str_at("/listing/structuredContent/primaryLine"),
        secondary_line: str_at("/listing/structuredContent/secondaryLine"),
        amenities: raw
            .pointer("/listingParamOverrides/amenities")
            .and_then(|v| v.as_array())
            .filter(|list| !list.is_empty())
            .map(|list| amenity_summary(list)),
        property_type: None,
        location: None,
    }
}

/// The server sends counts both as numbers and as strings.
fn reviews_count(value: &serde_json::Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn amenity_summary(list: &[serde_json::Value]) -> String {
    let names: Vec<String> = list
        .iter()
        .take(AMENITY_PREVIEW)
        .map(|v| match v.as_str() {
            Some(s) => s.to_string(),
            None => v.to_string(),
        })
        .collect();
    let mut summary = names.join(", ");
    if list.len() > AMENITY_PREVIEW {
        summary.push_str(&format!(" and {} more", list.len() - AMENITY_PREVIEW));
    }
    summary
}

// ── Markdown answers ─────────────────────────────────────────────────────

fn scrape_markdown(text: &str) -> Vec<ListingCard> {
    let (Ok(full), Ok(fallback), Ok(url_re)) = (
        Regex::new(LISTING_PATTERN),
        Regex::new(LISTING_FALLBACK_PATTERN),
        Regex::new(URL_PATTERN),
    ) else {
        return Vec::new();
    };

    let urls: Vec<String> = url_re
        .captures_iter(text)
        .filter_map(|c| clean_url(&c[1]))
        .collect();

    let cards = scrape_with(&full, text, &url_re, &urls, true);
    if cards.is_empty() {
        scrape_with(&fallback, text, &url_re, &urls, false)
    } else {
        cards
    }
}

fn scrape_with(
    listing_re: &Regex,
    text: &str,
    url_re: &Regex,
    urls: &[String],
    detailed: bool,
) -> Vec<ListingCard> {
    let mut seen = HashSet::new();
    let mut cards = Vec::new();

    for caps in listing_re.captures_iter(text) {
        let title = caps[1].trim().to_string();
        if !seen.insert(title.clone()) {
            continue;
        }

        // A link inside the entry wins; otherwise the N-th listing link in the text.
        let url = match url_re.captures(&caps[0]) {
            Some(inner) => clean_url(&inner[1]),
            None => urls.get(cards.len()).cloned(),
        }
        .unwrap_or_else(|| "#".into());

        let mut card = ListingCard {
            name: title,
            url,
            price: format!("${}", caps[2].trim()),
            ..ListingCard::default()
        };
        if detailed {
            card.rating = caps.get(3).map(|m| m.as_str().to_string());
            card.property_type = property_type(&card.name);
            card.location = location(&card.name);
        }
        cards.push(card);
    }
    cards
}

/// Strip wrapping punctuation; keep only lodging links.
fn clean_url(raw: &str) -> Option<String> {
    let url = raw
        .strip_suffix([')', ']', ',', '.'])
        .unwrap_or(raw)
        .trim_start_matches(['(', '[']);
    (url.contains("airbnb.com") || url.contains("/rooms/")).then(|| url.to_string())
}

fn property_type(title: &str) -> Option<String> {
    let lower = title.to_lowercase();
    PROPERTY_TYPES.iter().find(|t| lower.contains(*t)).map(|t| {
        let mut chars = t.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    })
}

fn location(title: &str) -> Option<String> {
    if let Some(caps) = Regex::new(LOCATION_PATTERN).ok()?.captures(title) {
        return Some(caps[1].trim().to_string());
    }
    KNOWN_AREAS
        .iter()
        .find(|area| title.contains(*area))
        .map(|area| area.to_string())
}
