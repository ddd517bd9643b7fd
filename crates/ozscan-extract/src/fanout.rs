//! Site-specific selector fan-out.
//!
//! When the registry knows the page's host, its selectors and strategy are
//! applied first; unknown hosts fall back to the generic selector list.
//! Candidates still pass through the same structural validation and
//! normalization de-duplication as the page-level strategies.

use crate::address::clean_text;
use crate::strategies::dedupe_validated;
use ozscan_sites::{ExtractionStrategy, SiteDefinition, SiteRegistry, GENERIC_SELECTORS};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Extract ordered address candidates using the site registry.
///
/// The URL's host picks the site definition; with no registered definition
/// the generic selector list is tried with the standard strategy.
#[must_use]
pub fn extract_with_registry(html: &str, url: &str, registry: &SiteRegistry) -> Vec<String> {
    let document = Html::parse_document(html);

    let definition = Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .and_then(|host| registry.lookup(&host));

    let candidates = match definition {
        Some(definition) => {
            debug!(host = %definition.host, strategy = definition.strategy.display_name(),
                "applying site definition");
            apply_definition(&document, &definition)
        }
        None => {
            debug!(url, "no site definition, trying generic selectors");
            select_all_text(&document, GENERIC_SELECTORS.iter().copied())
        }
    };

    dedupe_validated(candidates)
}

fn apply_definition(document: &Html, definition: &SiteDefinition) -> Vec<String> {
    let selectors: Vec<&str> = definition.selectors.iter().map(String::as_str).collect();

    match definition.strategy {
        ExtractionStrategy::Standard => select_all_text(document, selectors.iter().copied()),
        ExtractionStrategy::StructuredItemprop => structured_itemprop(document, &selectors),
        ExtractionStrategy::SplitStreetCityStateZip => split_street_csz(document, &selectors),
        ExtractionStrategy::TwoLineAddress => two_line_address(document, &selectors),
        ExtractionStrategy::MultiLineJoin => multi_line_join(document, &selectors),
    }
}

/// Trimmed text of every element each selector matches, in order.
fn select_all_text<'a>(document: &Html, selectors: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out = Vec::new();
    for selector in selectors {
        for element in select(document, selector) {
            let text = element_text(element);
            if !text.is_empty() {
                out.push(text);
            }
        }
    }
    out
}

/// Assemble street/city/state/zip from `itemprop` children of each match.
fn structured_itemprop(document: &Html, selectors: &[&str]) -> Vec<String> {
    let part = |container: ElementRef<'_>, prop: &str| -> Option<String> {
        let selector = Selector::parse(&format!("[itemprop='{prop}']")).ok()?;
        let text = container
            .select(&selector)
            .next()
            .map(element_text)
            .unwrap_or_default();
        (!text.is_empty()).then_some(text)
    };

    let mut out = Vec::new();
    for selector in selectors {
        for container in select(document, selector) {
            let Some(street) = part(container, "streetAddress") else {
                continue;
            };
            let Some(locality) = part(container, "addressLocality") else {
                continue;
            };
            let Some(region) = part(container, "addressRegion") else {
                continue;
            };
            let Some(postal) = part(container, "postalCode") else {
                continue;
            };
            out.push(format!("{street}, {locality}, {region} {postal}"));
        }
    }
    out
}

/// Pair the street-line selector with the city-state-zip selector by index.
fn split_street_csz(document: &Html, selectors: &[&str]) -> Vec<String> {
    let [street_selector, csz_selector, ..] = selectors else {
        warn!("split strategy needs two selectors");
        return Vec::new();
    };

    let streets: Vec<String> = select(document, street_selector)
        .into_iter()
        .map(element_text)
        .collect();
    let city_state_zips: Vec<String> = select(document, csz_selector)
        .into_iter()
        .map(element_text)
        .collect();

    streets
        .into_iter()
        .zip(city_state_zips)
        .filter(|(street, csz)| !street.is_empty() && !csz.is_empty())
        .map(|(street, csz)| format!("{}, {csz}", street.trim_end_matches(',')))
        .collect()
}

/// Join two adjacent line fields, stripping a breadcrumb prefix when the
/// first line carries one (`Florida > Miami > 123 Main St`).
fn two_line_address(document: &Html, selectors: &[&str]) -> Vec<String> {
    let [line1_selector, line2_selector, ..] = selectors else {
        warn!("two-line strategy needs two selectors");
        return Vec::new();
    };

    let line1 = select(document, line1_selector)
        .first()
        .map(|element| strip_breadcrumb(&element_text(*element)));
    let line2 = select(document, line2_selector)
        .first()
        .map(|element| element_text(*element));

    match (line1, line2) {
        (Some(line1), Some(line2)) if !line1.is_empty() && !line2.is_empty() => {
            vec![format!("{}, {line2}", line1.trim_end_matches(','))]
        }
        _ => Vec::new(),
    }
}

fn strip_breadcrumb(line: &str) -> String {
    line.rsplit(['>', '\u{203a}'])
        .next()
        .unwrap_or(line)
        .trim()
        .to_string()
}

/// Concatenate the text of all matching address-line elements.
fn multi_line_join(document: &Html, selectors: &[&str]) -> Vec<String> {
    let mut lines = Vec::new();
    for selector in selectors {
        for element in select(document, selector) {
            let text = element_text(element);
            let text = text.trim_end_matches(',').trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
    }

    if lines.is_empty() {
        Vec::new()
    } else {
        vec![lines.join(", ")]
    }
}

fn select<'a>(document: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(selector) {
        Ok(parsed) => document.select(&parsed).collect(),
        Err(_) => {
            // Definitions come from user-editable TOML; skip rather than fail
            warn!(selector, "skipping unparseable selector");
            Vec::new()
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ozscan_sites::SiteRegistry;

    fn registry() -> SiteRegistry {
        SiteRegistry::with_builtin()
    }

    #[test]
    fn test_standard_strategy_via_registry() {
        let html = r#"<html><body>
        <h1 class="addr-line">123 Main St, Miami, FL 33125</h1>
        </body></html>"#;

        let found = extract_with_registry(
            html,
            "https://www.zillow.com/homedetails/1_zpid/",
            &registry(),
        );
        assert_eq!(found, vec!["123 Main St, Miami, FL 33125"]);
    }

    #[test]
    fn test_split_street_city_state_zip() {
        let html = r#"<html><body>
        <div class="street-address">789 Flagler St</div>
        <div class="cityStateZip">Miami, FL 33130</div>
        </body></html>"#;

        let found = extract_with_registry(html, "https://www.redfin.com/FL/Miami/home/1", &registry());
        assert_eq!(found, vec!["789 Flagler St, Miami, FL 33130"]);
    }

    #[test]
    fn test_two_line_address_strips_breadcrumb() {
        let html = r#"<html><body>
        <div class="property-info-address-main">Florida &gt; Miami &gt; 123 Main St</div>
        <div class="property-info-address-citystatezip">Miami, FL 33125</div>
        </body></html>"#;

        let found = extract_with_registry(html, "https://www.homes.com/property/1/", &registry());
        assert_eq!(found, vec!["123 Main St, Miami, FL 33125"]);
    }

    #[test]
    fn test_multi_line_join() {
        let html = r#"<html><body><div id="propertyAddressRow">
        <span class="delivery-address"><span>500 Brickell Ave</span></span>
        <span class="delivery-address"><span>Miami</span></span>
        <span class="delivery-address"><span>FL 33131</span></span>
        </div></body></html>"#;

        let found = extract_with_registry(
            html,
            "https://www.apartments.com/some-listing/",
            &registry(),
        );
        assert_eq!(found, vec!["500 Brickell Ave, Miami, FL 33131"]);
    }

    #[test]
    fn test_structured_itemprop() {
        let html = r#"<html><body><div itemprop="address" itemscope>
        <span itemprop="streetAddress">8950 SW 74th Ct</span>
        <span itemprop="addressLocality">Miami</span>
        <span itemprop="addressRegion">FL</span>
        <span itemprop="postalCode">33156</span>
        </div></body></html>"#;

        let found =
            extract_with_registry(html, "https://www.loopnet.com/Listing/1/", &registry());
        assert_eq!(found, vec!["8950 SW 74th Ct, Miami, FL 33156"]);
    }

    #[test]
    fn test_unknown_host_uses_generic_selectors() {
        let html = r#"<html><body>
        <h1>123 Main St, Miami, FL 33125</h1>
        </body></html>"#;

        let found = extract_with_registry(html, "https://listings.example/1", &registry());
        assert_eq!(found, vec!["123 Main St, Miami, FL 33125"]);
    }

    #[test]
    fn test_invalid_candidates_are_dropped() {
        let html = r#"<html><body>
        <h1 class="addr-line">Luxury Living In Miami</h1>
        </body></html>"#;

        let found = extract_with_registry(
            html,
            "https://www.zillow.com/homedetails/1_zpid/",
            &registry(),
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_registry_dedupes_across_selectors() {
        let html = r#"<html><body>
        <h1 class="addr-line">123 Main St, Miami, FL 33125</h1>
        <div data-test="bdp-building-address">123 MAIN ST, MIAMI, FL 33125</div>
        </body></html>"#;

        let found = extract_with_registry(
            html,
            "https://www.zillow.com/homedetails/1_zpid/",
            &registry(),
        );
        assert_eq!(found, vec!["123 Main St, Miami, FL 33125"]);
    }
}
