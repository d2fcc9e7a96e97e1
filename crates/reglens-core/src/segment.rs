/// Section segmentation: paragraphs → insertion-ordered anchor buckets.
///
/// A paragraph whose text starts with a structural marker (`chapter`,
/// `section`, a dotted numeral like `4.2.1`, or the literal terms
/// `definitions` / `scope` / `applicability`, all case-insensitive) opens a
/// new section. Its heading sentence, lowercased, becomes the anchor key —
/// the exact-equality join key between document versions. Everything else
/// accumulates under the most recent anchor, or under `UNANCHORED` before
/// the first one.
///
/// Two textually identical anchors merge into one bucket: repeated headings
/// are treated as the same logical section.
use std::collections::HashMap;

use regex::Regex;

/// Synthetic anchor key for paragraphs preceding the first heading.
pub const UNANCHORED: &str = "UNANCHORED";

/// One section: an anchor key plus the paragraphs grouped under it.
#[derive(Debug, Clone)]
pub struct Section {
    pub anchor: String,
    pub paragraphs: Vec<String>,
}

/// Mapping from anchor key to ordered paragraphs, preserving the insertion
/// order of each key's first appearance.
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    sections: Vec<Section>,
    index: HashMap<String, usize>,
}

impl Segmentation {
    /// Sections in first-appearance order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Paragraphs bucketed under `anchor`, if the key exists.
    pub fn get(&self, anchor: &str) -> Option<&[String]> {
        self.index
            .get(anchor)
            .map(|&i| self.sections[i].paragraphs.as_slice())
    }

    pub fn contains(&self, anchor: &str) -> bool {
        self.index.contains_key(anchor)
    }

    fn push(&mut self, anchor: &str, paragraph: Option<String>) {
        let i = match self.index.get(anchor) {
            Some(&i) => i,
            None => {
                self.sections.push(Section {
                    anchor: anchor.to_string(),
                    paragraphs: Vec::new(),
                });
                let i = self.sections.len() - 1;
                self.index.insert(anchor.to_string(), i);
                i
            }
        };
        if let Some(p) = paragraph {
            self.sections[i].paragraphs.push(p);
        }
    }
}

/// Group paragraphs under their nearest preceding structural anchor.
pub fn segment_paragraphs(paragraphs: &[String]) -> Segmentation {
    let anchor_re = Regex::new(
        r"(?i)^(chapter\b|section\b|definitions\b|scope\b|applicability\b|\d+(\.\d+)+)",
    )
    .expect("valid regex");

    let mut segmentation = Segmentation::default();
    let mut current = UNANCHORED.to_string();

    for paragraph in paragraphs {
        if anchor_re.is_match(paragraph) {
            let (key, remainder) = split_heading(paragraph);
            current = key;
            segmentation.push(&current, None);
            if let Some(rest) = remainder {
                segmentation.push(&current, Some(rest));
            }
        } else {
            segmentation.push(&current, Some(paragraph.clone()));
        }
    }

    segmentation
}

/// Split an anchor paragraph into its heading sentence and remainder.
///
/// The key is the text through the first `.` or `:` that ends a clause
/// (followed by whitespace), lowercased; decimal points inside numerals like
/// `4.2` do not terminate the heading. A paragraph with no such boundary is
/// its own key. The remainder, if any, belongs in the section's bucket so
/// that in-paragraph body text still participates in diffing.
fn split_heading(paragraph: &str) -> (String, Option<String>) {
    let bytes = paragraph.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'.' || *b == b':' {
            match bytes.get(i + 1) {
                Some(next) if next.is_ascii_whitespace() => {
                    let key = paragraph[..=i].trim().to_lowercase();
                    let rest = paragraph[i + 1..].trim();
                    let remainder = (!rest.is_empty()).then(|| rest.to_string());
                    return (key, remainder);
                }
                _ => {}
            }
        }
    }
    (paragraph.trim().to_lowercase(), None)
}
