use serde::{Deserialize, Serialize};

/// Separator inside the uniqueness key. Non-printing, so titles containing
/// ordinary punctuation cannot collide two keys.
const KEY_SEPARATOR: char = '\u{1f}';

/// One harvested listing entry.
///
/// `price` and `shipping_fee` are digit-only strings: currency symbols and
/// thousands separators are stripped at extraction time, `"0"` means free
/// shipping, and the empty string means the field could not be extracted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub title: String,
    pub seller: String,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: String,
    pub price: String,
    pub shipping_fee: String,

    // Populated by the keyword matcher after collection finishes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_keywords: Vec<String>,
}

impl ListingRecord {
    pub fn new(title: impl Into<String>, seller: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            seller: seller.into(),
            thumbnail_url: String::new(),
            price: String::new(),
            shipping_fee: String::new(),
            matched: None,
            matched_keywords: Vec::new(),
        }
    }

    /// Key identifying one logical product+seller combination. Two scans
    /// observing the same key describe the same record.
    pub fn uniqueness_key(&self) -> String {
        format!("{}{}{}", self.title, KEY_SEPARATOR, self.seller)
    }

    pub fn has_thumbnail(&self) -> bool {
        !self.thumbnail_url.is_empty()
    }

    pub fn is_matched(&self) -> bool {
        self.matched == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniqueness_key_separates_title_and_seller() {
        let a = ListingRecord::new("무선마우스 2080", "모던샵");
        let b = ListingRecord::new("무선마우스", "2080 모던샵");

        // Same concatenated text, different (title, seller) pairs
        assert_ne!(a.uniqueness_key(), b.uniqueness_key());
    }

    #[test]
    fn test_uniqueness_key_same_pair_is_equal() {
        let a = ListingRecord::new("게이밍 키보드", "키보드샵");
        let mut b = ListingRecord::new("게이밍 키보드", "키보드샵");
        b.price = "39900".to_string();

        // Fields outside the key do not affect identity
        assert_eq!(a.uniqueness_key(), b.uniqueness_key());
    }

    #[test]
    fn test_match_fields_absent_until_matching_runs() {
        let record = ListingRecord::new("노트북 거치대", "오피스월드");
        let json = serde_json::to_string(&record).unwrap();

        assert!(!json.contains("matched"));
        assert!(json.contains("\"thumbnail\""));
    }

    #[test]
    fn test_match_fields_serialized_after_matching() {
        let mut record = ListingRecord::new("노트북 거치대", "오피스월드");
        record.matched = Some(true);
        record.matched_keywords = vec!["거치대".to_string()];

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"matched\":true"));
        assert!(json.contains("거치대"));
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut record = ListingRecord::new("텀블러 500ml", "리빙마트");
        record.thumbnail_url = "https://img.example.com/1.jpg".to_string();
        record.price = "12900".to_string();
        record.shipping_fee = "0".to_string();
        record.matched = Some(false);

        let serialized = serde_json::to_string(&record).unwrap();
        let deserialized: ListingRecord = serde_json::from_str(&serialized).unwrap();
        assert_eq!(record, deserialized);
    }
}
