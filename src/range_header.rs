//! Packs byte ranges into `Range` header values under a size budget.

/// Greedy packer: consume inclusive `(begin, end)` pairs in order and emit
/// `(count, value)` groups where `value` is `"b1-e1,b2-e2,…"` (no `bytes=`
/// prefix) and `value.len()` stays within `budget`.
///
/// A single range whose encoding alone exceeds the budget is emitted as its
/// own group; the server-facing path recovers if the server rejects it.
pub fn generate_range_headers(
    budget: usize,
    ranges: impl Iterator<Item = (u64, u64)>,
) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut value = String::new();
    let mut count = 0usize;

    for (begin, end) in ranges {
        let fragment = format!("{}-{}", begin, end);
        if !value.is_empty() && value.len() + 1 + fragment.len() > budget {
            out.push((count, std::mem::take(&mut value)));
            count = 0;
        }
        if !value.is_empty() {
            value.push(',');
        }
        value.push_str(&fragment);
        count += 1;
    }
    if !value.is_empty() {
        out.push((count, value));
    }
    out
}

/// Inclusive `(begin, end)` wire pair for a requested range. A zero-size
/// range encodes as `begin-begin`.
pub fn range_pair(offset: u64, size: u64) -> (u64, u64) {
    if size == 0 {
        (offset, offset)
    } else {
        (offset, offset + size - 1)
    }
}
