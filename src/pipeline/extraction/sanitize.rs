/// Sanitize extracted text before passing downstream.
/// Strips control characters, folds typographic variants of signs and
/// subscripts that the normalizer matches on, and collapses whitespace runs.
pub fn sanitize_extracted_text(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| match c {
            '\n' => Some('\n'),
            '\u{2212}' => Some('-'), // Minus sign −
            '\u{2080}'..='\u{2089}' => char::from_digit(c as u32 - 0x2080, 10), // CO₂
            '\u{2018}' | '\u{2019}' => Some('\''),
            '\u{201C}' | '\u{201D}' => Some('"'),
            '\u{FFFD}' => None,
            c if c.is_control() => Some(' '),
            c => Some(c),
        })
        .collect::<String>()
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
