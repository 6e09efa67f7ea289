use std::cmp::Ordering;
use std::path::Path;

/// `{order}.{ext}`: undecorated decimal order, extension without the dot.
pub fn stored_image_name(order: usize, ext: &str) -> String {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    format!("{order}.{ext}")
}

/// The digits of a stored file's order with leading zeros stripped, if the
/// stem is purely decimal digits. `"007.png"` gives `"7"`, `"0.png"` gives `"0"`.
pub fn order_digits(file_name: &str) -> Option<&str> {
    let stem = Path::new(file_name).file_stem()?.to_str()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let trimmed = stem.trim_start_matches('0');
    Some(if trimmed.is_empty() { "0" } else { trimmed })
}

/// Page order: numeric stems ascending, then everything else by full name.
/// Stems of any length compare numerically.
pub fn compare_page_names(a: &str, b: &str) -> Ordering {
    match (order_digits(a), order_digits(b)) {
        (Some(x), Some(y)) => x
            .len()
            .cmp(&y.len())
            .then_with(|| x.cmp(y))
            .then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
