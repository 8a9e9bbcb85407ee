//! Font signatures and their first-seen index assignment.

use std::fmt;

use indexmap::IndexSet;
use serde::Serialize;

use crate::host::TextInfo;

/// The (font, size, color) triple that makes a text layer look distinct.
///
/// The size is kept as its two-decimal rendering. Equality is decided on
/// that string, so 12.001 and 12.004 are the same size while 12.004 and
/// 12.006 are not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FontSignature {
    pub font_name: String,
    point_size: String,
    pub color_hex: String,
}

impl FontSignature {
    pub fn new(font_name: impl Into<String>, point_size: f64, color_hex: impl Into<String>) -> Self {
        Self {
            font_name: font_name.into(),
            point_size: format_point_size(point_size),
            color_hex: color_hex.into().to_ascii_uppercase(),
        }
    }

    pub fn from_text(info: &TextInfo, scale: f64) -> Self {
        Self::new(
            info.font_name.clone(),
            info.effective_point_size(scale),
            info.fill_color_hex.clone(),
        )
    }

    /// Size rounded to two decimals.
    pub fn point_size(&self) -> f64 {
        self.point_size.parse().unwrap_or(0.0)
    }

    /// Size without trailing zeros, e.g. `12`, `12.5`, `12.01`.
    pub fn display_point_size(&self) -> &str {
        let trimmed = self.point_size.trim_end_matches('0');
        trimmed.strip_suffix('.').unwrap_or(trimmed)
    }
}

impl fmt::Display for FontSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}pt, #{}",
            self.font_name,
            self.display_point_size(),
            self.color_hex
        )
    }
}

fn format_point_size(size: f64) -> String {
    let formatted = format!("{size:.2}");
    // -0.001 would otherwise render as "-0.00" and split from "0.00".
    if formatted == "-0.00" {
        "0.00".to_string()
    } else {
        formatted
    }
}

/// 1-based position of a signature in first-seen order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SignatureIndex(usize);

impl SignatureIndex {
    #[cfg(test)]
    pub fn get(self) -> usize {
        self.0
    }

    fn from_position(position: usize) -> Self {
        Self(position + 1)
    }
}

impl fmt::Display for SignatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Append-only set of signatures seen during one pass.
#[derive(Debug, Default, Clone)]
pub struct FontRegistry {
    signatures: IndexSet<FontSignature>,
}

impl FontRegistry {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `signature`, adding it at the end if unseen.
    pub fn register(&mut self, signature: FontSignature) -> SignatureIndex {
        let (position, _) = self.signatures.insert_full(signature);
        SignatureIndex::from_position(position)
    }

    #[cfg(test)]
    pub fn index_of(&self, signature: &FontSignature) -> Option<SignatureIndex> {
        self.signatures
            .get_index_of(signature)
            .map(SignatureIndex::from_position)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SignatureIndex, &FontSignature)> {
        self.signatures
            .iter()
            .enumerate()
            .map(|(position, sig)| (SignatureIndex::from_position(position), sig))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sig(size: f64) -> FontSignature {
        FontSignature::new("A", size, "FFFFFF")
    }

    #[test]
    fn sizes_collapse_after_two_decimal_formatting() {
        let mut registry = FontRegistry::new();
        assert_eq!(registry.register(sig(12.001)).get(), 1);
        assert_eq!(registry.register(sig(12.004)).get(), 1);
        assert_eq!(registry.register(sig(12.006)).get(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn every_field_participates_in_equality() {
        let mut registry = FontRegistry::new();
        let base = registry.register(FontSignature::new("Helvetica", 14.0, "000000"));
        let other_font = registry.register(FontSignature::new("Georgia", 14.0, "000000"));
        let other_color = registry.register(FontSignature::new("Helvetica", 14.0, "FF0000"));
        let other_size = registry.register(FontSignature::new("Helvetica", 16.0, "000000"));
        let again = registry.register(FontSignature::new("Helvetica", 14.0, "000000"));
        assert_eq!(
            [base, other_font, other_color, other_size, again].map(SignatureIndex::get),
            [1, 2, 3, 4, 1]
        );
    }

    #[test]
    fn color_case_does_not_split_signatures() {
        let mut registry = FontRegistry::new();
        registry.register(FontSignature::new("A", 10.0, "ff7f00"));
        assert_eq!(
            registry.index_of(&FontSignature::new("A", 10.0, "FF7F00")),
            registry.iter().next().map(|(index, _)| index)
        );
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(sig(12.0).display_point_size(), "12");
        assert_eq!(sig(12.5).display_point_size(), "12.5");
        assert_eq!(sig(12.006).display_point_size(), "12.01");
        assert_eq!(sig(0.0).display_point_size(), "0");
        assert_eq!(sig(12.5).to_string(), "A, 12.5pt, #FFFFFF");
    }

    #[test]
    fn scale_is_applied_before_rounding() {
        let info = TextInfo {
            font_name: "A".to_string(),
            raw_point_size: 24.02,
            vertical_scale: 1.0,
            fill_color_hex: "FFFFFF".to_string(),
        };
        assert_eq!(FontSignature::from_text(&info, 2.0).display_point_size(), "12.01");
        assert_eq!(FontSignature::from_text(&info, 2.0).point_size(), 12.01);
    }

    proptest! {
        #[test]
        fn indices_are_dense_and_stable(picks in prop::collection::vec(0usize..6, 0..40)) {
            let palette = ["Arial", "Georgia", "Menlo", "Futura", "Avenir", "Gill Sans"];
            let mut registry = FontRegistry::new();
            let mut first_seen: Vec<usize> = Vec::new();
            for pick in &picks {
                let index = registry.register(FontSignature::new(palette[*pick], 12.0, "000000"));
                match first_seen.iter().position(|p| p == pick) {
                    Some(pos) => prop_assert_eq!(index.get(), pos + 1),
                    None => {
                        first_seen.push(*pick);
                        prop_assert_eq!(index.get(), first_seen.len());
                    }
                }
            }
            let indices: Vec<usize> = registry.iter().map(|(index, _)| index.get()).collect();
            let expected: Vec<usize> = (1..=first_seen.len()).collect();
            prop_assert_eq!(indices, expected);
        }
    }
}
