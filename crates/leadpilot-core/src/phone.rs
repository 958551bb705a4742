//! Phone-number normalization.
//!
//! Leads arrive with numbers in every imaginable format — "0555 123 45 67",
//! "+90 555 ...", bare 10-digit mobiles. Everything is normalized to a
//! digits-only international form before matching or dispatch.

/// Normalize a phone number to digits-only international form.
/// Returns `None` when the input cannot be a dialable number.
pub fn clean_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    // Already-international German numbers pass through.
    if digits.starts_with("49") && digits.len() >= 11 {
        return Some(digits);
    }

    // Turkish forms: 90XXXXXXXXXX, 0XXXXXXXXXX, 5XXXXXXXXX.
    let mut d = digits.clone();
    if let Some(rest) = d.strip_prefix("90") {
        d = rest.to_string();
    }
    if let Some(rest) = d.strip_prefix('0') {
        d = rest.to_string();
    }
    if d.len() == 10 && d.starts_with('5') {
        return Some(format!("90{d}"));
    }

    // Anything that still looks like a full international number.
    if digits.len() >= 10 {
        return Some(digits);
    }
    None
}

/// True when two raw numbers normalize to the same dialable number.
pub fn same_number(a: &str, b: &str) -> bool {
    match (clean_phone(a), clean_phone(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
