//! Variant SKU handling.
//!
//! Apparel variants are coded `PARENT/SIZE`: the part before the last slash
//! names the style, the suffix is the size.

/// Splits a SKU into its base code and size.
///
/// Blank parts are ignored; a SKU without a slash has no size.
///
/// # Example
///
/// ```rust
/// use mirror_analytics::split_sku_and_size;
///
/// assert_eq!(split_sku_and_size("SKU-1/54"), ("SKU-1".to_string(), Some("54".to_string())));
/// assert_eq!(split_sku_and_size(" SKU-2 "), ("SKU-2".to_string(), None));
/// ```
pub fn split_sku_and_size(sku: &str) -> (String, Option<String>) {
    let text = sku.trim();
    let Some((parent, size)) = text.rsplit_once('/') else {
        return (text.to_string(), None);
    };

    let parent = parent.trim();
    let size = size.trim();
    let base = if parent.is_empty() { text } else { parent };
    let size = (!size.is_empty()).then(|| size.to_string());
    (base.to_string(), size)
}

/// Human label for a SKU, e.g. `SKU-1 (Talla 54)`.
pub fn format_variant_label(sku: &str) -> String {
    match split_sku_and_size(sku) {
        (base, Some(size)) => format!("{base} (Talla {size})"),
        (base, None) => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_last_slash() {
        assert_eq!(
            split_sku_and_size("A/B/38"),
            ("A/B".to_string(), Some("38".to_string()))
        );
    }

    #[test]
    fn tolerates_blank_parts() {
        assert_eq!(split_sku_and_size(""), (String::new(), None));
        assert_eq!(split_sku_and_size("SKU/ "), ("SKU".to_string(), None));
        assert_eq!(split_sku_and_size("/42"), ("/42".to_string(), Some("42".to_string())));
    }

    #[test]
    fn labels() {
        assert_eq!(format_variant_label("SKU-1/54"), "SKU-1 (Talla 54)");
        assert_eq!(format_variant_label("SKU-EC-42"), "SKU-EC-42");
    }
}
