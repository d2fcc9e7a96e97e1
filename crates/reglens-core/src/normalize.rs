/// Text normalization: raw document text → ordered paragraphs.
///
/// Regulatory PDFs come out of extraction as hard-wrapped lines. A
/// "paragraph" here is a run of consecutive non-blank lines terminated by a
/// line ending in `.` or `:` (a sentence or clause boundary), or by end of
/// input. Blank and whitespace-only lines are dropped.
///
/// This stage never fails; degenerate input yields an empty sequence.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        buffer.push(line);
        if line.ends_with('.') || line.ends_with(':') {
            paragraphs.push(buffer.join(" "));
            buffer.clear();
        }
    }

    if !buffer.is_empty() {
        paragraphs.push(buffer.join(" "));
    }

    paragraphs
}
