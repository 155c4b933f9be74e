use tracing::info;

use crate::keywords::KeywordSet;
use crate::record::ListingRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSummary {
    pub total: usize,
    pub matched: usize,
    pub keywords: usize,
}

/// Annotates every record with `matched`/`matched_keywords` by
/// case-insensitive substring containment over trimmed title and seller.
/// The first keyword (input order) that matches wins.
///
/// An empty keyword set is a distinct outcome, not an error: every record is
/// marked unmatched and the summary still carries the total.
pub fn annotate_records(records: &mut [ListingRecord], keywords: &KeywordSet) -> MatchSummary {
    let total = records.len();

    if keywords.is_empty() {
        for record in records.iter_mut() {
            record.matched = Some(false);
            record.matched_keywords.clear();
        }
        info!("Keyword matching skipped: no keywords ({} records)", total);
        return MatchSummary {
            total,
            matched: 0,
            keywords: 0,
        };
    }

    let lowered: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let mut matched = 0usize;

    for record in records.iter_mut() {
        let title = record.title.trim().to_lowercase();
        let seller = record.seller.trim().to_lowercase();

        let hit = lowered
            .iter()
            .find(|keyword| title.contains(keyword.as_str()) || seller.contains(keyword.as_str()));

        match hit {
            Some(winner) => {
                record.matched = Some(true);
                // Every input spelling of the winning keyword, so case
                // variants stay visible in the output
                record.matched_keywords = keywords
                    .iter()
                    .filter(|candidate| candidate.to_lowercase() == *winner)
                    .cloned()
                    .collect();
                matched += 1;
            }
            None => {
                record.matched = Some(false);
                record.matched_keywords.clear();
            }
        }
    }

    info!(
        "Keyword matching finished: {}/{} records matched against {} keywords",
        matched,
        total,
        keywords.len()
    );

    MatchSummary {
        total,
        matched,
        keywords: keywords.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<ListingRecord> {
        vec![
            ListingRecord::new("무선마우스 2080", "모던샵"),
            ListingRecord::new("게이밍 키보드", "마우스월드"),
            ListingRecord::new("텀블러 500ml", "리빙마트"),
        ]
    }

    #[test]
    fn test_empty_keyword_set_is_distinct_outcome() {
        let mut batch = records();
        let summary = annotate_records(&mut batch, &KeywordSet::default());

        assert_eq!(
            summary,
            MatchSummary {
                total: 3,
                matched: 0,
                keywords: 0
            }
        );
        for record in &batch {
            assert_eq!(record.matched, Some(false));
            assert!(record.matched_keywords.is_empty());
        }
    }

    #[test]
    fn test_matches_in_title_and_seller() {
        let mut batch = records();
        let summary = annotate_records(&mut batch, &KeywordSet::new(["마우스"]));

        // Title hit on the first record, seller hit on the second
        assert_eq!(summary.matched, 2);
        assert_eq!(batch[0].matched, Some(true));
        assert_eq!(batch[1].matched, Some(true));
        assert_eq!(batch[2].matched, Some(false));
        assert_eq!(batch[0].matched_keywords, vec!["마우스".to_string()]);
    }

    #[test]
    fn test_first_matching_keyword_wins() {
        let mut batch = vec![ListingRecord::new("마우스 키보드 세트", "샵")];
        annotate_records(&mut batch, &KeywordSet::new(["키보드", "마우스"]));

        assert_eq!(batch[0].matched_keywords, vec!["키보드".to_string()]);
    }

    #[test]
    fn test_case_insensitive_containment() {
        let mut batch = vec![ListingRecord::new("Wireless Mouse Pro", "Tech Shop")];
        let summary = annotate_records(&mut batch, &KeywordSet::new(["MOUSE"]));

        assert_eq!(summary.matched, 1);
        assert_eq!(batch[0].matched_keywords, vec!["MOUSE".to_string()]);
    }

    #[test]
    fn test_collects_all_case_spellings_of_winner() {
        let mut batch = vec![ListingRecord::new("mouse pad", "샵")];
        annotate_records(&mut batch, &KeywordSet::new(["Mouse", "MOUSE"]));

        assert_eq!(
            batch[0].matched_keywords,
            vec!["Mouse".to_string(), "MOUSE".to_string()]
        );
    }

    #[test]
    fn test_tolerates_empty_fields() {
        let mut batch = vec![ListingRecord::new("", "")];
        let summary = annotate_records(&mut batch, &KeywordSet::new(["마우스"]));

        assert_eq!(summary.total, 1);
        assert_eq!(batch[0].matched, Some(false));
    }

    #[test]
    fn test_rematch_overwrites_previous_annotations() {
        let mut batch = vec![ListingRecord::new("무선마우스", "샵")];
        annotate_records(&mut batch, &KeywordSet::new(["마우스"]));
        assert_eq!(batch[0].matched, Some(true));

        annotate_records(&mut batch, &KeywordSet::new(["키보드"]));
        assert_eq!(batch[0].matched, Some(false));
        assert!(batch[0].matched_keywords.is_empty());
    }
}
