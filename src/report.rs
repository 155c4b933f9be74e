use chrono::Local;
use tracing::debug;

use crate::highlight::Highlighter;
use crate::keywords::KeywordSet;
use crate::progress::ProgressReporter;
use crate::record::ListingRecord;

/// Renders the standalone HTML report for a finished harvest. `stamp` is
/// the run identifier shared with the sibling CSV/JSON artifacts.
///
/// CPU-bound and side-effect free apart from progress reporting, so it is
/// meant to run on the blocking pool behind a `ProgressBridge`. Terminal
/// progress is the driver's job; everything reported here stays below 100.
pub fn build_report(
    records: &[ListingRecord],
    stamp: &str,
    keywords: &KeywordSet,
    progress: Option<&ProgressReporter>,
) -> String {
    let report = |percent: usize, label: &str| {
        if let Some(reporter) = progress {
            reporter.report(percent as u8, label);
        }
    };
    report(5, "Preparing report");

    let highlighter = Highlighter::new(keywords);
    let total = records.len();
    // Roughly one progress event per 2% of cards
    let step = (total / 50).max(1);

    let mut cards = String::new();
    for (index, record) in records.iter().enumerate() {
        cards.push_str(&render_card(record, index, &highlighter));
        let done = index + 1;
        if done % step == 0 || done == total {
            report(
                5 + done * 94 / total,
                &format!("Rendering cards {}/{}", done, total),
            );
        }
    }

    let with_image = records.iter().filter(|r| r.has_thumbnail()).count();
    let matched = records.iter().filter(|r| r.is_matched()).count();
    let generated = Local::now().format("%Y-%m-%d %H:%M:%S");

    let mut stats = format!(
        "<li><strong id=\"product-count\">{}</strong> products</li>\
         <li><strong>{}</strong> with image</li>",
        total, with_image
    );
    let mut toolbar =
        String::from("<button id=\"delete-selected\" class=\"tool-btn\">Delete selected</button>");
    if !keywords.is_empty() {
        stats.push_str(&format!(
            "<li><strong>{}</strong> matched</li><li>Keywords: {}</li>",
            matched,
            escape_html(&keywords.as_slice().join(", "))
        ));
        toolbar.push_str(
            "<button id=\"toggle-highlight\" class=\"tool-btn\">Toggle highlight</button>\
             <div class=\"filter-bar\">\
             <button class=\"filter-btn active\" data-filter=\"all\">All</button>\
             <button class=\"filter-btn\" data-filter=\"matched\">Matched</button>\
             <button class=\"filter-btn\" data-filter=\"unmatched\">Unmatched</button>\
             </div>",
        );
    }

    let html = format!(
        "<!DOCTYPE html>\n<html lang=\"ko\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>Listing harvest report</title>\n<style>{css}</style>\n</head>\n<body>\n\
         <header>\n<h1>Listing harvest report</h1>\n\
         <p class=\"meta\">Run ID: {stamp} | Generated {generated}</p>\n\
         <ul class=\"stats\">{stats}</ul>\n\
         <div class=\"toolbar\">{toolbar}</div>\n</header>\n\
         <main id=\"card-grid\">\n{cards}</main>\n\
         <script>{js}</script>\n</body>\n</html>\n",
        css = REPORT_CSS,
        stamp = escape_html(stamp),
        generated = generated,
        stats = stats,
        toolbar = toolbar,
        cards = cards,
        js = REPORT_JS,
    );

    debug!("Report rendered ({} cards, {} bytes)", total, html.len());
    html
}

fn render_card(record: &ListingRecord, index: usize, highlighter: &Highlighter) -> String {
    let matched_class = if record.is_matched() { " matched" } else { "" };
    let title = highlighter.highlight(&escape_html(&record.title));
    let seller = highlighter.highlight(&escape_html(&record.seller));

    let thumb = if record.has_thumbnail() {
        format!(
            "<img src=\"{}\" alt=\"\" loading=\"lazy\">",
            escape_html(&record.thumbnail_url)
        )
    } else {
        "<div class=\"thumb-empty\">No image</div>".to_string()
    };

    let price = if record.price.is_empty() {
        "<p class=\"price price-unknown\">Price unavailable</p>".to_string()
    } else {
        format!(
            "<p class=\"price\">{}원</p>",
            format_thousands(&record.price)
        )
    };

    let delivery = match record.shipping_fee.as_str() {
        "0" => "무료배송".to_string(),
        "" => String::new(),
        fee => format!("배송비 {}원", format_thousands(fee)),
    };

    format!(
        "<article class=\"product-card{matched_class}\" data-product-id=\"{index}\" \
         data-matched=\"{matched}\" data-price=\"{price_raw}\" data-delivery=\"{fee_raw}\">\n\
         <div class=\"thumb-wrap\">{thumb}</div>\n\
         <div class=\"card-body\">\n\
         <h2 class=\"title\">{title}</h2>\n\
         <p class=\"seller\">{seller}</p>\n\
         {price}\n\
         <p class=\"delivery\">{delivery}</p>\n\
         </div>\n</article>\n",
        matched = if record.is_matched() { "1" } else { "0" },
        price_raw = escape_html(&record.price),
        fee_raw = escape_html(&record.shipping_fee),
    )
}

// Escaping happens before highlighting, so marker spans stay intact.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn format_thousands(digits: &str) -> String {
    let chars: Vec<char> = digits.chars().collect();
    let mut out = String::with_capacity(chars.len() + chars.len() / 3);
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*c);
    }
    out
}

const REPORT_CSS: &str = r#"
* { box-sizing: border-box; }
body { margin: 0; font-family: 'Apple SD Gothic Neo', 'Malgun Gothic', sans-serif; background: #f3f4f6; color: #111827; }
header { padding: 24px 32px; background: #fff; border-bottom: 1px solid #e5e7eb; position: sticky; top: 0; z-index: 10; }
h1 { margin: 0 0 4px; font-size: 22px; }
.meta { margin: 0 0 12px; color: #6b7280; font-size: 13px; }
.stats { list-style: none; display: flex; gap: 24px; margin: 0 0 12px; padding: 0; font-size: 14px; }
.toolbar { display: flex; gap: 12px; align-items: center; flex-wrap: wrap; }
.tool-btn, .filter-btn { padding: 6px 14px; border: 1px solid #d1d5db; border-radius: 6px; background: #fff; cursor: pointer; font-size: 13px; }
.tool-btn:hover, .filter-btn:hover { background: #f9fafb; }
.filter-bar { display: flex; gap: 6px; }
.filter-btn.active { background: #2563eb; border-color: #2563eb; color: #fff; }
#card-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(220px, 1fr)); gap: 16px; padding: 24px 32px; }
.product-card { background: #fff; border: 1px solid #e5e7eb; border-radius: 10px; overflow: hidden; cursor: pointer; }
.product-card.matched { border-color: #2563eb; box-shadow: 0 0 0 1px #2563eb inset; }
.product-card.selected { outline: 3px solid #f59e0b; }
.thumb-wrap { height: 180px; background: #f9fafb; display: flex; align-items: center; justify-content: center; }
.thumb-wrap img { width: 100%; height: 100%; object-fit: cover; }
.thumb-empty { color: #9ca3af; font-size: 13px; }
.card-body { padding: 12px 14px 14px; }
.title { margin: 0 0 6px; font-size: 14px; line-height: 1.4; font-weight: 600; }
.seller { margin: 0 0 8px; color: #6b7280; font-size: 12px; }
.price { margin: 0; font-size: 16px; font-weight: 700; }
.price-unknown { color: #9ca3af; font-size: 13px; font-weight: 400; }
.delivery { margin: 4px 0 0; color: #059669; font-size: 12px; min-height: 14px; }
.highlight { background: #fde047; border-radius: 2px; }
.no-highlight .highlight { background: transparent; border-radius: 0; }
"#;

const REPORT_JS: &str = r#"
const grid = document.getElementById('card-grid');
grid.addEventListener('click', (event) => {
  const card = event.target.closest('.product-card');
  if (card) card.classList.toggle('selected');
});

const refreshCount = () => {
  const stat = document.getElementById('product-count');
  if (stat) stat.textContent = document.querySelectorAll('.product-card').length;
};

document.getElementById('delete-selected').addEventListener('click', () => {
  document.querySelectorAll('.product-card.selected').forEach((card) => card.remove());
  refreshCount();
});

const toggle = document.getElementById('toggle-highlight');
if (toggle) {
  toggle.addEventListener('click', () => document.body.classList.toggle('no-highlight'));
}

document.querySelectorAll('.filter-btn').forEach((btn) => {
  btn.addEventListener('click', () => {
    document.querySelectorAll('.filter-btn').forEach((b) => b.classList.remove('active'));
    btn.classList.add('active');
    const mode = btn.dataset.filter;
    document.querySelectorAll('.product-card').forEach((card) => {
      const matched = card.dataset.matched === '1';
      const visible = mode === 'all' || (mode === 'matched' ? matched : !matched);
      card.style.display = visible ? '' : 'none';
    });
  });
});
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(title: &str, seller: &str, price: &str, fee: &str) -> ListingRecord {
        let mut r = ListingRecord::new(title, seller);
        r.price = price.to_string();
        r.shipping_fee = fee.to_string();
        r
    }

    fn no_keywords() -> KeywordSet {
        KeywordSet::new(Vec::<&str>::new())
    }

    fn keywords(list: &[&str]) -> KeywordSet {
        KeywordSet::new(list.iter().copied())
    }

    #[test]
    fn test_report_renders_each_record() {
        let records = vec![
            record("무선마우스", "모던샵", "39900", "0"),
            record("게이밍 키보드", "키보드샵", "89000", "2500"),
        ];
        let html = build_report(&records, "20250115_103000", &no_keywords(), None);

        assert!(html.contains("무선마우스"));
        assert!(html.contains("게이밍 키보드"));
        assert!(html.contains("<strong id=\"product-count\">2</strong>"));
        // The run identifier ties the report to its sibling artifacts
        assert!(html.contains("Run ID: 20250115_103000"));
    }

    #[test]
    fn test_markup_in_fields_is_escaped() {
        let records = vec![record("<b>볼드</b> & \"따옴표\"", "샵", "", "")];
        let html = build_report(&records, "test", &no_keywords(), None);

        assert!(html.contains("&lt;b&gt;볼드&lt;/b&gt; &amp; &quot;따옴표&quot;"));
        assert!(!html.contains("<b>볼드"));
    }

    #[test]
    fn test_matched_records_are_highlighted_and_flagged() {
        let mut item = record("무선마우스 2080", "모던샵", "39900", "0");
        item.matched = Some(true);
        item.matched_keywords = vec!["마우스".to_string()];
        let html = build_report(&[item], "test", &keywords(&["마우스"]), None);

        assert!(html.contains("class=\"product-card matched\""));
        assert!(html.contains("data-matched=\"1\""));
        assert!(html.contains("<span class=\"highlight\">마우스</span>"));
    }

    #[test]
    fn test_unmatched_record_has_no_accent() {
        let mut item = record("노트북 거치대", "샵", "", "");
        item.matched = Some(false);
        let html = build_report(&[item], "test", &keywords(&["마우스"]), None);

        assert!(html.contains("data-matched=\"0\""));
        assert!(!html.contains("product-card matched"));
    }

    #[test]
    fn test_price_and_delivery_formatting() {
        let records = vec![
            record("A", "샵", "1234567", "2500"),
            record("B", "샵", "", "0"),
        ];
        let html = build_report(&records, "test", &no_keywords(), None);

        assert!(html.contains("1,234,567원"));
        assert!(html.contains("배송비 2,500원"));
        assert!(html.contains("무료배송"));
        assert!(html.contains("Price unavailable"));
    }

    #[test]
    fn test_filter_bar_only_with_keywords() {
        let records = vec![record("A", "샵", "", "")];
        let without = build_report(&records, "test", &no_keywords(), None);
        let with = build_report(&records, "test", &keywords(&["키보드"]), None);

        assert!(!without.contains("data-filter"));
        assert!(!without.contains("toggle-highlight"));
        assert!(with.contains("data-filter=\"matched\""));
        assert!(with.contains("toggle-highlight"));
    }

    #[test]
    fn test_empty_harvest_still_renders_shell() {
        let html = build_report(&[], "test", &no_keywords(), None);

        assert!(html.contains("<strong id=\"product-count\">0</strong>"));
        assert!(!html.contains("<article"));
    }

    #[test]
    fn test_progress_sequence_throttled_and_bounded() {
        let records: Vec<_> = (0..500)
            .map(|i| record(&format!("상품 {}", i), "샵", "1000", "0"))
            .collect();
        let (reporter, mut rx) = ProgressReporter::channel();
        build_report(&records, "test", &no_keywords(), Some(&reporter));
        drop(reporter);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert_eq!(events[0].percent, 5);
        assert!(events.iter().all(|e| e.percent < 100));
        assert_eq!(events.last().unwrap().percent, 99);
        // Header event plus about one event per 2% of cards
        assert!(events.len() <= 52);

        let percents: Vec<_> = events.iter().map(|e| e.percent).collect();
        let mut sorted = percents.clone();
        sorted.sort_unstable();
        assert_eq!(percents, sorted);
    }

    #[rstest]
    #[case("0", "0")]
    #[case("999", "999")]
    #[case("1000", "1,000")]
    #[case("39900", "39,900")]
    #[case("1234567", "1,234,567")]
    #[case("", "")]
    fn test_format_thousands(#[case] digits: &str, #[case] expected: &str) {
        assert_eq!(format_thousands(digits), expected);
    }
}
