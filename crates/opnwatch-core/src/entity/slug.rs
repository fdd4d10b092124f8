use crate::config::DeviceIdentity;

/// Unique id of a reader: the slug of `"{device unique id}_{key}"`.
pub fn entity_unique_id(device: &DeviceIdentity, key: &str) -> String {
    slugify(&format!("{}_{key}", device.unique_id))
}

/// Normalize text into a stable identifier.
///
/// Lowercases, collapses every run of non-alphanumeric characters into a
/// single `_`, and strips leading and trailing `_`. Alphanumerics outside
/// ASCII are kept as-is (`"Büro"` becomes `"büro"`), not transliterated.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_sep = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}
