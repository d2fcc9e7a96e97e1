/// Section alignment and line-level diffing.
///
/// Alignment is exact: only anchor keys present in both segmentations are
/// paired, in the old document's section order. Anchors appearing in one
/// version only produce no diff lines at all — a documented coverage gap,
/// not an error.
use crate::segment::Segmentation;

/// Whether a diff line was inserted in the new version or deleted from the
/// old one. Context lines are never emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOp {
    Insert,
    Delete,
}

/// One insertion or deletion, tagged with the anchor key it occurred under.
#[derive(Debug, Clone)]
pub struct DiffLine {
    pub anchor: String,
    pub op: DiffOp,
    pub text: String,
}

/// Pair old/new sections by identical anchor key and diff each pair's
/// paragraph lists, emitting only insertions and deletions.
pub fn diff_sections(old: &Segmentation, new: &Segmentation) -> Vec<DiffLine> {
    let mut lines = Vec::new();

    for section in old.sections() {
        let Some(new_paragraphs) = new.get(&section.anchor) else {
            continue;
        };
        diff_lines(
            &section.anchor,
            &section.paragraphs,
            new_paragraphs,
            &mut lines,
        );
    }

    lines
}

/// Line-level diff of two paragraph sequences via a longest-common-
/// subsequence table. Within each changed region, deletions are emitted
/// before insertions, matching unified-diff hunk ordering.
fn diff_lines(anchor: &str, old: &[String], new: &[String], out: &mut Vec<DiffLine>) {
    let n = old.len();
    let m = new.len();

    // lcs[i][j] = LCS length of old[i..] and new[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut i = 0;
    let mut j = 0;
    while i < n || j < m {
        if i < n && j < m && old[i] == new[j] {
            i += 1;
            j += 1;
        } else if j == m || (i < n && lcs[i + 1][j] >= lcs[i][j + 1]) {
            out.push(DiffLine {
                anchor: anchor.to_string(),
                op: DiffOp::Delete,
                text: old[i].clone(),
            });
            i += 1;
        } else {
            out.push(DiffLine {
                anchor: anchor.to_string(),
                op: DiffOp::Insert,
                text: new[j].clone(),
            });
            j += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::split_paragraphs;
    use crate::segment::segment_paragraphs;

    fn segmentation(text: &str) -> Segmentation {
        segment_paragraphs(&split_paragraphs(text))
    }

    #[test]
    fn test_single_modification() {
        let old = segmentation("1.1 Limits. Balance cap is Rs 50,000.");
        let new = segmentation("1.1 Limits. Balance cap is Rs 100,000.");
        let lines = diff_sections(&old, &new);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].op, DiffOp::Delete);
        assert!(lines[0].text.contains("50,000"));
        assert_eq!(lines[1].op, DiffOp::Insert);
        assert!(lines[1].text.contains("100,000"));
        assert_eq!(lines[0].anchor, "1.1 limits.");
    }

    #[test]
    fn test_identical_sections_emit_nothing() {
        let old = segmentation("Section 1: Scope.\nApplies to all banks.");
        let new = segmentation("Section 1: Scope.\nApplies to all banks.");
        assert!(diff_sections(&old, &new).is_empty());
    }

    #[test]
    fn test_one_sided_anchor_is_silently_dropped() {
        let old = segmentation("Section 1: Scope.\nApplies to banks.");
        let new = segmentation("Section 2: Penalties.\nFines may be levied.");
        assert!(diff_sections(&old, &new).is_empty());
    }

    #[test]
    fn test_pure_insertion_and_deletion() {
        let old = segmentation("Section 1: Scope.\nOld only clause.\nShared clause.");
        let new = segmentation("Section 1: Scope.\nShared clause.\nNew only clause.");
        let lines = diff_sections(&old, &new);
        let deletes: Vec<&str> = lines
            .iter()
            .filter(|l| l.op == DiffOp::Delete)
            .map(|l| l.text.as_str())
            .collect();
        let inserts: Vec<&str> = lines
            .iter()
            .filter(|l| l.op == DiffOp::Insert)
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(deletes, ["Old only clause."]);
        assert_eq!(inserts, ["New only clause."]);
    }

    #[test]
    fn test_deletions_precede_insertions_within_hunk() {
        let old = segmentation("Section 1: Scope.\nAlpha.\nBeta.");
        let new = segmentation("Section 1: Scope.\nGamma.\nBeta.");
        let lines = diff_sections(&old, &new);
        assert_eq!(lines[0].op, DiffOp::Delete);
        assert_eq!(lines[0].text, "Alpha.");
        assert_eq!(lines[1].op, DiffOp::Insert);
        assert_eq!(lines[1].text, "Gamma.");
    }
}
