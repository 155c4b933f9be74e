use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::CollectorConfig;
use crate::extract::FieldExtractor;
use crate::record::ListingRecord;
use crate::session::{ScrollSession, SessionError};

/// Insert-ordered record set keyed by `uniqueness_key`. The first sighting
/// of a key wins; later sightings are dropped wholesale, so a thumbnail or
/// price observed on a re-render never overwrites the original.
#[derive(Debug, Default)]
pub struct DedupStore {
    index: HashMap<String, usize>,
    records: Vec<ListingRecord>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the record was new.
    pub fn insert_first_seen(&mut self, record: ListingRecord) -> bool {
        let key = record.uniqueness_key();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.records.len());
        self.records.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in first-seen order.
    pub fn into_records(self) -> Vec<ListingRecord> {
        self.records
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Both idle counters reached their thresholds in the same pass.
    EndOfFeed,
    /// The cancel flag was raised; the partial harvest is still valid.
    Cancelled,
}

/// Where the run is in its lifecycle. `Settling` means at least one idle
/// counter is nonzero, so the feed may be close to its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Scanning,
    Settling,
    Done,
}

#[derive(Debug)]
pub struct CollectOutcome {
    pub records: Vec<ListingRecord>,
    /// Viewport scrolls performed (the forced bottom jump not included).
    pub scrolls: u64,
    /// Card nodes skipped across all scans because no title was present.
    pub skipped_cards: u64,
    pub reason: StopReason,
}

struct PassStats {
    new_items: usize,
    height_before: i64,
    height_after: i64,
}

/// Scroll-and-scan acquisition over an infinite-scroll feed.
///
/// Each pass scans the rendered document, scrolls by a viewport fraction,
/// waits for rendering to settle, and compares the content height across
/// the scroll. The run ends when the height AND the unique item count have
/// both been idle for the configured number of passes, confirmed by one
/// forced jump to the bottom with a longer settle and a final scan.
pub struct ScrollCollector<'a> {
    session: &'a dyn ScrollSession,
    extractor: &'a FieldExtractor,
    config: CollectorConfig,
    cancel: Arc<AtomicBool>,
}

impl<'a> ScrollCollector<'a> {
    pub fn new(
        session: &'a dyn ScrollSession,
        extractor: &'a FieldExtractor,
        config: CollectorConfig,
    ) -> Self {
        Self {
            session,
            extractor,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag observed at the top of every pass. Raising it stops the
    /// run after one final scan, keeping everything harvested so far.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub async fn run(&self) -> Result<CollectOutcome, SessionError> {
        let mut store = DedupStore::new();
        let mut scrolls: u64 = 0;
        let mut skipped: u64 = 0;
        let mut no_height_change: u32 = 0;
        let mut no_new_items: u32 = 0;
        let mut consecutive_failures: u32 = 0;
        let mut phase = Phase::Scanning;
        let mut reason = StopReason::EndOfFeed;

        info!("Starting scroll acquisition");
        while phase != Phase::Done {
            if self.cancel.load(Ordering::SeqCst) {
                info!("Cancellation requested, taking one last scan before stopping");
                if let Err(e) = self.scan_into(&mut store, &mut skipped).await {
                    warn!("Final scan after cancellation failed: {}", e);
                }
                reason = StopReason::Cancelled;
                phase = Phase::Done;
                continue;
            }

            match self.advance(&mut store, &mut skipped, &mut scrolls).await {
                Ok(pass) => {
                    consecutive_failures = 0;
                    if pass.height_after == pass.height_before {
                        no_height_change += 1;
                    } else {
                        no_height_change = 0;
                    }
                    if pass.new_items == 0 {
                        no_new_items += 1;
                    } else {
                        no_new_items = 0;
                    }
                    debug!(
                        "Pass {}: {} new, height {} -> {}, idle height {} / items {}",
                        scrolls,
                        pass.new_items,
                        pass.height_before,
                        pass.height_after,
                        no_height_change,
                        no_new_items
                    );

                    phase = if no_height_change >= self.config.idle_height_rounds
                        && no_new_items >= self.config.idle_item_rounds
                    {
                        info!(
                            "Feed exhausted after {} scrolls with {} unique items, confirming at the bottom",
                            scrolls,
                            store.len()
                        );
                        self.finish_at_bottom(&mut store, &mut skipped).await;
                        Phase::Done
                    } else if no_height_change > 0 || no_new_items > 0 {
                        if phase == Phase::Scanning {
                            debug!("Feed growth is slowing, watching for the end");
                        }
                        Phase::Settling
                    } else {
                        Phase::Scanning
                    };
                }
                Err(e) if e.is_fatal() => {
                    warn!("Session lost during acquisition: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(
                        "Scroll pass failed ({} consecutive): {}",
                        consecutive_failures, e
                    );
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        return Err(e);
                    }
                }
            }
        }

        Ok(Self::outcome(store, scrolls, skipped, reason))
    }

    /// One scan-scroll-settle-measure pass.
    async fn advance(
        &self,
        store: &mut DedupStore,
        skipped: &mut u64,
        scrolls: &mut u64,
    ) -> Result<PassStats, SessionError> {
        let new_items = self.scan_into(store, skipped).await?;

        let height_before = self.session.content_height().await?;
        self.session
            .scroll_by_viewport(self.config.scroll_fraction)
            .await?;
        *scrolls += 1;
        self.session
            .settle(Duration::from_millis(self.config.settle_ms))
            .await;
        let height_after = self.session.content_height().await?;

        Ok(PassStats {
            new_items,
            height_before,
            height_after,
        })
    }

    async fn scan_into(
        &self,
        store: &mut DedupStore,
        skipped: &mut u64,
    ) -> Result<usize, SessionError> {
        let html = self.session.page_html().await?;
        let scan = self.extractor.scan_document(&html);
        if scan.skipped > 0 {
            debug!("Skipped {} card nodes without a title", scan.skipped);
        }
        *skipped += scan.skipped as u64;

        let mut added = 0;
        for record in scan.records {
            if store.insert_first_seen(record) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Confirmation pass: one hard jump to the bottom, a longer settle for
    /// stragglers, then a last scan so late-rendered cards still land. A
    /// failure here only costs that last scan, never the harvest.
    async fn finish_at_bottom(&self, store: &mut DedupStore, skipped: &mut u64) {
        if let Err(e) = self.session.scroll_to_bottom().await {
            warn!("Bottom jump failed: {}", e);
        }
        self.session
            .settle(Duration::from_millis(self.config.final_settle_ms))
            .await;
        if let Err(e) = self.scan_into(store, skipped).await {
            warn!("Final scan failed: {}", e);
        }
    }

    fn outcome(
        store: DedupStore,
        scrolls: u64,
        skipped_cards: u64,
        reason: StopReason,
    ) -> CollectOutcome {
        CollectOutcome {
            records: store.into_records(),
            scrolls,
            skipped_cards,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, seller: &str) -> ListingRecord {
        ListingRecord::new(title, seller)
    }

    #[test]
    fn test_first_sighting_wins() {
        let mut store = DedupStore::new();
        let mut first = record("무선마우스", "모던샵");
        first.thumbnail_url = "https://img.example.com/a.jpg".to_string();
        let mut later = record("무선마우스", "모던샵");
        later.thumbnail_url = "https://img.example.com/b.jpg".to_string();
        later.price = "9900".to_string();

        assert!(store.insert_first_seen(first));
        assert!(!store.insert_first_seen(later));
        assert_eq!(store.len(), 1);

        // The later, richer sighting must not leak into the stored record
        let records = store.into_records();
        assert_eq!(records[0].thumbnail_url, "https://img.example.com/a.jpg");
        assert_eq!(records[0].price, "");
    }

    #[test]
    fn test_same_title_different_seller_are_distinct() {
        let mut store = DedupStore::new();
        assert!(store.insert_first_seen(record("무선마우스", "모던샵")));
        assert!(store.insert_first_seen(record("무선마우스", "키보드샵")));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_insertion_order_is_preserved() {
        let mut store = DedupStore::new();
        store.insert_first_seen(record("C", "셀러"));
        store.insert_first_seen(record("A", "셀러"));
        store.insert_first_seen(record("C", "셀러"));
        store.insert_first_seen(record("B", "셀러"));

        let titles: Vec<_> = store
            .into_records()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["C", "A", "B"]);
    }
}
