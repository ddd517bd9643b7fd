//! Layered page-level extraction strategies.
//!
//! These run when site-specific selectors produce nothing (or on unknown
//! sites): the listing URL itself, JSON-LD structured data, OpenGraph meta
//! tags, and finally a regex sweep over visible text. Each strategy yields
//! raw candidates; validation and de-duplication happen in [`extract`].

use crate::address::{clean_text, slug_address_regex, text_address_regex, validate_address};
use ozscan_core::NormalizedAddress;
use percent_encoding::percent_decode_str;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Text runs longer than this are skipped by the visible-text sweep; real
/// address lines are short, and long runs are article or description copy.
pub const DEFAULT_TEXT_NODE_CEILING: usize = 300;

/// Extract ordered address candidates from a page.
///
/// Strategy order: URL-derived, JSON-LD, meta tags, visible-text regex.
/// Candidates failing [`validate_address`] are dropped silently, and
/// duplicates (after normalization) keep only their first occurrence.
#[must_use]
pub fn extract(html: &str, url: &str) -> Vec<String> {
    extract_with_ceiling(html, url, DEFAULT_TEXT_NODE_CEILING)
}

/// [`extract`] with an explicit visible-text length ceiling.
#[must_use]
pub fn extract_with_ceiling(html: &str, url: &str, text_node_ceiling: usize) -> Vec<String> {
    let document = Html::parse_document(html);

    let mut candidates = Vec::new();
    if let Some(from_url) = extract_from_url(url) {
        candidates.push(from_url);
    }
    candidates.extend(extract_from_json_ld(&document));
    candidates.extend(extract_from_meta_tags(&document));
    candidates.extend(extract_from_visible_text(&document, text_node_ceiling));

    let accepted = dedupe_validated(candidates);
    debug!(url, count = accepted.len(), "page-level extraction finished");
    accepted
}

/// The highest-confidence single candidate, if any.
#[must_use]
pub fn extract_best(html: &str, url: &str) -> Option<String> {
    extract(html, url).into_iter().next()
}

/// Run only the visible-text sweep over a raw HTML string.
///
/// First stage of the explicit flow's detection chain.
#[must_use]
pub fn scan_visible_text(html: &str, text_node_ceiling: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    dedupe_validated(extract_from_visible_text(&document, text_node_ceiling))
}

/// Keep only structurally valid candidates, first occurrence per
/// normalized key, preserving order.
pub(crate) fn dedupe_validated(candidates: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<NormalizedAddress> = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| validate_address(candidate))
        .filter(|candidate| seen.insert(NormalizedAddress::new(candidate)))
        .collect()
}

/// Recover an address from the listing URL slug.
///
/// Listing URLs routinely carry the full address hyphen-separated
/// (`/homedetails/123-Main-St-Miami-FL-33125/`). The slug is percent-decoded,
/// separators become spaces, and the comma-free slug regex recomposes a
/// canonical comma-separated address from its capture groups.
#[must_use]
pub fn extract_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let decoded = percent_decode_str(parsed.path()).decode_utf8_lossy();

    let spaced: String = decoded
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect();

    let caps = slug_address_regex().captures(&spaced)?;

    let mut address = format!(
        "{} {}, {}, {} {}",
        &caps[1],
        caps[2].trim(),
        caps[3].trim(),
        caps[4].to_uppercase(),
        &caps[5],
    );
    if let Some(plus_four) = caps.get(6) {
        address.push('-');
        address.push_str(plus_four.as_str());
    }

    debug!(url, %address, "recovered address from URL slug");
    Some(address)
}

/// Pull postal addresses out of JSON-LD structured data blocks.
///
/// Walks every `<script type="application/ld+json">` payload recursively
/// (listings nest the address under `@graph`, arrays, or offer objects) and
/// composes any object carrying the four `PostalAddress` fields.
#[must_use]
pub fn extract_from_json_ld(document: &Html) -> Vec<String> {
    let selector =
        Selector::parse("script[type='application/ld+json']").expect("valid ld+json selector");

    let mut found = Vec::new();
    for script in document.select(&selector) {
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => collect_postal_addresses(&value, &mut found),
            Err(error) => debug!(%error, "skipping unparseable JSON-LD block"),
        }
    }
    found
}

fn collect_postal_addresses(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(address) = compose_postal_address(map) {
                out.push(address);
            }
            for nested in map.values() {
                collect_postal_addresses(nested, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_postal_addresses(item, out);
            }
        }
        _ => {}
    }
}

fn compose_postal_address(map: &serde_json::Map<String, Value>) -> Option<String> {
    let field = |key: &str| map.get(key).and_then(Value::as_str).map(str::trim);

    let street = field("streetAddress")?;
    let locality = field("addressLocality")?;
    let region = field("addressRegion")?;
    let postal = field("postalCode")?;

    Some(format!(
        "{street}, {locality}, {} {postal}",
        normalize_region(region)
    ))
}

/// Two-letter regions are upper-cased; anything longer is left alone and
/// fails structural validation downstream.
fn normalize_region(region: &str) -> String {
    if region.len() == 2 {
        region.to_uppercase()
    } else {
        region.to_string()
    }
}

/// Compose an address from OpenGraph / Place meta tags.
///
/// All four parts must be present; listing pages that emit these emit the
/// full set.
#[must_use]
pub fn extract_from_meta_tags(document: &Html) -> Option<String> {
    let street = meta_content(document, &["og:street-address", "place:street_address"])?;
    let locality = meta_content(document, &["og:locality", "place:locality"])?;
    let region = meta_content(document, &["og:region", "place:region"])?;
    let postal = meta_content(document, &["og:postal-code", "place:postal_code"])?;

    Some(format!(
        "{street}, {locality}, {} {postal}",
        normalize_region(&region)
    ))
}

fn meta_content(document: &Html, properties: &[&str]) -> Option<String> {
    for property in properties {
        let selector = Selector::parse(&format!("meta[property='{property}']")).ok()?;
        if let Some(element) = document.select(&selector).next() {
            let content = element.value().attr("content")?.trim();
            if !content.is_empty() {
                return Some(content.to_string());
            }
        }
    }
    None
}

/// Containers whose class or id carries one of these tokens are skipped by
/// the visible-text sweep: their addresses belong to other properties.
const SKIP_CONTAINER_TOKENS: &[&str] = &["nav", "footer", "ad", "ads", "similar", "nearby"];

const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "nav", "footer", "header"];

/// Sweep visible text nodes for address-shaped runs.
///
/// Text under navigation, footer, ad, or similar/nearby-listing containers
/// is skipped, as are runs longer than the ceiling. Matches are collected
/// in document order.
#[must_use]
pub fn extract_from_visible_text(document: &Html, text_node_ceiling: usize) -> Vec<String> {
    let mut found = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        if text.len() > text_node_ceiling {
            continue;
        }

        let skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(is_skipped_container)
        });
        if skipped {
            continue;
        }

        let cleaned = clean_text(text);
        for found_match in text_address_regex().find_iter(&cleaned) {
            found.push(found_match.as_str().to_string());
        }
    }

    found
}

fn is_skipped_container(element: &scraper::node::Element) -> bool {
    if SKIP_TAGS.contains(&element.name()) {
        return true;
    }

    let class = element.attr("class").unwrap_or_default();
    let id = element.attr("id").unwrap_or_default();

    // Token-wise comparison so "ad" never matches inside "address"
    class
        .split(|ch: char| !ch.is_alphanumeric())
        .chain(id.split(|ch: char| !ch.is_alphanumeric()))
        .any(|token| {
            let token = token.to_lowercase();
            SKIP_CONTAINER_TOKENS.contains(&token.as_str())
        })
}
