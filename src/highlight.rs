use std::cmp::Reverse;

use regex::{Regex, RegexBuilder};

use crate::keywords::KeywordSet;

pub const MARK_OPEN: &str = "<span class=\"highlight\">";
pub const MARK_CLOSE: &str = "</span>";

// Placeholder characters come from a private-use plane, so no keyword
// pattern can match inside a protected run.
const PLACEHOLDER_BASE: u32 = 0xF0000;

/// Wraps keyword occurrences in highlight markers.
///
/// Keywords are applied longest first so a short keyword cannot fragment a
/// longer match. Spans emitted by earlier passes and HTML entity runs are
/// both opaque to matching, so escaped text like `&#39;` cannot be torn
/// apart by a keyword that happens to match its inside. Running the
/// highlighter again over its own output is a no-op.
pub struct Highlighter {
    // Case-insensitive literal patterns, longest keyword first
    patterns: Vec<Regex>,
    protected: Regex,
}

impl Highlighter {
    pub fn new(keywords: &KeywordSet) -> Self {
        let mut ordered: Vec<&String> = keywords.iter().collect();
        ordered.sort_by_key(|keyword| Reverse(keyword.chars().count()));

        let patterns = ordered
            .into_iter()
            .filter_map(|keyword| {
                RegexBuilder::new(&regex::escape(keyword))
                    .case_insensitive(true)
                    .build()
                    .ok()
            })
            .collect();

        Self {
            patterns,
            protected: Regex::new(
                r#"<span class="highlight">[^<]*</span>|&(?:[a-zA-Z][a-zA-Z0-9]*|#\d+|#x[0-9a-fA-F]+);"#,
            )
            .unwrap(),
        }
    }

    pub fn highlight(&self, text: &str) -> String {
        if text.is_empty() || self.patterns.is_empty() {
            return text.to_string();
        }

        let mut result = text.to_string();
        for pattern in &self.patterns {
            let (shielded, protected) = self.shield_protected_runs(&result);
            let mut wrapped = pattern
                .replace_all(&shielded, |caps: &regex::Captures<'_>| {
                    format!("{MARK_OPEN}{}{MARK_CLOSE}", &caps[0])
                })
                .into_owned();
            for (token, run) in protected {
                wrapped = wrapped.replace(token, &run);
            }
            result = wrapped;
        }
        result
    }

    // Swaps every already-emitted marker span and entity run for a one-char
    // placeholder and returns the placeholder/run pairs needed to undo it.
    fn shield_protected_runs(&self, text: &str) -> (String, Vec<(char, String)>) {
        let mut shielded = String::with_capacity(text.len());
        let mut protected = Vec::new();
        let mut cursor = 0;

        for (index, found) in self.protected.find_iter(text).enumerate() {
            let Some(token) = char::from_u32(PLACEHOLDER_BASE + index as u32) else {
                break;
            };
            shielded.push_str(&text[cursor..found.start()]);
            shielded.push(token);
            protected.push((token, found.as_str().to_string()));
            cursor = found.end();
        }
        shielded.push_str(&text[cursor..]);

        (shielded, protected)
    }
}
