//! Canonical "base" identifiers for free-text unit labels.
//!
//! Unit titles arrive like `"011.2) Ш15 ДУБЛЬ"`: an optional numbering prefix,
//! the real identifier, and an optional duplicate marker. Every place that
//! groups units (the grouped bookings table, the dashboard, the export) must
//! key on [`grouping_key`] so the keys never drift apart.

/// Duplicate-marker tokens, in match priority order.
const DUPLICATE_MARKERS: [&str; 6] = ["ДУБЛЬ", "ДУБЛ", "ДУБЛЕ", "ДУБ", "DUBL", "DOUBLE"];

/// Strips the numbering prefix and any duplicate marker from a unit label.
///
/// Normalization is repeated until the label stops changing, so
/// `base_identifier(base_identifier(x)) == base_identifier(x)` always holds.
pub fn base_identifier(label: Option<&str>) -> String {
    let mut current = label.unwrap_or_default().trim().to_string();
    loop {
        let next = normalize_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Uppercased base identifier, the key used for ordering and bucketing.
pub fn grouping_key(label: Option<&str>) -> String {
    base_identifier(label).to_uppercase()
}

fn normalize_once(label: &str) -> String {
    let label = strip_numbering(label.trim()).trim();
    strip_duplicate_marker(label).trim().to_string()
}

/// Removes a leading `<digits>[.<digits>]) ` prefix.
fn strip_numbering(label: &str) -> &str {
    let bytes = label.as_bytes();
    let mut index = leading_digits(bytes, 0);
    if index == 0 {
        return label;
    }
    if bytes.get(index) == Some(&b'.') {
        let fraction_end = leading_digits(bytes, index + 1);
        if fraction_end == index + 1 {
            return label;
        }
        index = fraction_end;
    }
    if bytes.get(index) == Some(&b')') && bytes.get(index + 1) == Some(&b' ') {
        &label[index + 2..]
    } else {
        label
    }
}

fn leading_digits(bytes: &[u8], start: usize) -> usize {
    let mut index = start;
    while bytes.get(index).is_some_and(u8::is_ascii_digit) {
        index += 1;
    }
    index
}

fn strip_duplicate_marker(label: &str) -> &str {
    let chars = label.char_indices().collect::<Vec<_>>();
    for marker in DUPLICATE_MARKERS {
        let marker = marker.chars().collect::<Vec<_>>();
        let spaced = chars.iter().enumerate().find(|(position, (_, ch))| {
            *ch == ' ' && matches_at(&chars, position + 1, &marker)
        });
        if let Some((_, (offset, _))) = spaced {
            return &label[..*offset];
        }
        if chars.len() >= marker.len() {
            let start = chars.len() - marker.len();
            if matches_at(&chars, start, &marker) {
                return &label[..chars[start].0];
            }
        }
    }
    label
}

fn matches_at(chars: &[(usize, char)], start: usize, marker: &[char]) -> bool {
    chars.len() >= start + marker.len()
        && chars[start..start + marker.len()]
            .iter()
            .zip(marker)
            .all(|((_, ch), expected)| fold_case(*ch) == *expected)
}

fn fold_case(ch: char) -> char {
    let mut upper = ch.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(single), None) => single,
        _ => ch,
    }
}
