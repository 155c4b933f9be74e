use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::SelectorConfig;
use crate::record::ListingRecord;
use crate::utils::error::AppError;

// Badge texts meaning the listing ships free regardless of the fee text.
const FREE_SHIPPING_BADGES: [&str; 2] = ["무료배송", "멤버십 무료반품 혜택"];

/// Compiled selector set addressing one card's fields. Selector strings come
/// from configuration so a selector refresh does not need a rebuild.
pub struct Selectors {
    pub card: Selector,
    title: Selector,
    seller: Selector,
    price: Selector,
    shipping_badge: Selector,
    shipping_fee: Selector,
    thumbnail_img: Selector,
    background: Selector,
    link: Selector,
    nested_img: Selector,
}

impl Selectors {
    pub fn compile(config: &SelectorConfig) -> crate::Result<Self> {
        Ok(Self {
            card: parse(&config.card)?,
            title: parse(&config.title)?,
            seller: parse(&config.seller)?,
            price: parse(&config.price)?,
            shipping_badge: parse(&config.shipping_badge)?,
            shipping_fee: parse(&config.shipping_fee)?,
            thumbnail_img: parse(&config.thumbnail_img)?,
            background: parse(&config.background)?,
            link: parse(&config.link)?,
            nested_img: parse("img")?,
        })
    }
}

fn parse(selector: &str) -> crate::Result<Selector> {
    Selector::parse(selector).map_err(|_| AppError::Selector {
        selector: selector.to_string(),
    })
}

/// One visibility scan over a rendered document snapshot.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Extracted records in document order; duplicates across scans are the
    /// store's concern, not the extractor's.
    pub records: Vec<ListingRecord>,
    /// Card nodes without a title element (not product cards).
    pub skipped: usize,
}

/// Pulls the fixed record shape out of rendered cards.
///
/// Every extraction path is total: a field that cannot be read becomes an
/// empty string, a node that is not a product card is skipped, and nothing
/// here returns an error.
pub struct FieldExtractor {
    selectors: Selectors,
    price_pattern: Regex,
    fee_pattern: Regex,
    srcset_pattern: Regex,
    background_pattern: Regex,
}

impl FieldExtractor {
    pub fn new(selectors: Selectors) -> Self {
        Self {
            selectors,
            price_pattern: Regex::new(r"[\d,]+").unwrap(),
            fee_pattern: Regex::new(r"([\d,]+)원").unwrap(),
            srcset_pattern: Regex::new(r"https?://[^\s,]+").unwrap(),
            background_pattern: Regex::new(r#"url\(["']?(https?://[^"')]+)["']?\)"#).unwrap(),
        }
    }

    pub fn scan_document(&self, html: &str) -> ScanOutcome {
        let document = Html::parse_document(html);
        let mut outcome = ScanOutcome::default();

        for card in document.select(&self.selectors.card) {
            match self.extract_card(&card) {
                Some(record) => outcome.records.push(record),
                None => outcome.skipped += 1,
            }
        }
        outcome
    }

    /// Extracts one record from a card node. `None` means the node carries
    /// no title element and is not a product card; partially rendered cards
    /// still yield a record with empty fields.
    pub fn extract_card(&self, card: &ElementRef<'_>) -> Option<ListingRecord> {
        let title = text_of(card, &self.selectors.title)?;
        let seller = text_of(card, &self.selectors.seller).unwrap_or_default();

        let mut record = ListingRecord::new(title, seller);
        record.thumbnail_url = self.extract_thumbnail(card);
        record.price = text_of(card, &self.selectors.price)
            .map(|raw| self.parse_price(&raw))
            .unwrap_or_default();

        let badge = text_of(card, &self.selectors.shipping_badge).unwrap_or_default();
        let fee = text_of(card, &self.selectors.shipping_fee).unwrap_or_default();
        record.shipping_fee = self.parse_shipping_fee(&badge, &fee);

        Some(record)
    }

    // Ordered fallback; first hit wins, each step independent of the others.
    fn extract_thumbnail(&self, card: &ElementRef<'_>) -> String {
        let img = card.select(&self.selectors.thumbnail_img).next();

        if let Some(element) = img {
            // 1. Direct source attribute
            if let Some(src) = element.value().attr("src") {
                if is_absolute_http(src) {
                    return src.to_string();
                }
            }
            // 2. Lazy-load deferred source
            if let Some(deferred) = element.value().attr("data-src") {
                if is_absolute_http(deferred) {
                    return deferred.to_string();
                }
            }
            // 3. First absolute URL among the responsive candidates
            if let Some(srcset) = element.value().attr("srcset") {
                if let Some(found) = self.srcset_pattern.find(srcset) {
                    return found.as_str().to_string();
                }
            }
        }

        // 4. background-image declaration on a descendant
        for element in card.select(&self.selectors.background) {
            if let Some(style) = element.value().attr("style") {
                if let Some(caps) = self.background_pattern.captures(style) {
                    return caps[1].to_string();
                }
            }
        }

        // 5. Image nested inside the primary link wrapper
        if let Some(link) = card.select(&self.selectors.link).next() {
            if let Some(nested) = link.select(&self.selectors.nested_img).next() {
                if let Some(src) = nested.value().attr("src") {
                    if is_absolute_http(src) {
                        return src.to_string();
                    }
                }
            }
        }

        String::new()
    }

    /// First maximal run of digits/commas, commas stripped. Empty when the
    /// text carries no digits.
    pub fn parse_price(&self, raw: &str) -> String {
        self.price_pattern
            .find(raw)
            .map(|m| m.as_str().replace(',', ""))
            .unwrap_or_default()
    }

    /// Badge takes precedence over the fee text: a badge equal to one of
    /// the free phrases (after trim) means `"0"` no matter what the fee
    /// element says. A badge that merely mentions a phrase does not count.
    pub fn parse_shipping_fee(&self, badge: &str, fee: &str) -> String {
        if FREE_SHIPPING_BADGES
            .iter()
            .any(|phrase| badge.trim() == *phrase)
        {
            return "0".to_string();
        }
        if let Some(caps) = self.fee_pattern.captures(fee) {
            return caps[1].replace(',', "");
        }
        String::new()
    }
}

fn text_of(card: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(|element| element.text().collect::<Vec<_>>().join(" ").trim().to_string())
}

fn is_absolute_http(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}
