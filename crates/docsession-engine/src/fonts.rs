use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::session::FontDeclaration;

static FONT_FAMILY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"font-family *: *(?:'([^']*)'|"([^"]*)")"#).expect("font-family pattern is valid")
});

/// Font families declared in a stylesheet, in order of first appearance.
pub fn available_fonts(css: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    FONT_FAMILY
        .captures_iter(css)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .filter(|family| seen.insert(family.clone()))
        .collect()
}

/// Font declarations sorted by name, keeping only the first name per family.
pub fn declared_fonts(font_map: &BTreeMap<String, String>) -> Vec<FontDeclaration> {
    let mut used_families = HashSet::new();
    font_map
        .iter()
        .filter(|&(_, family)| family.is_empty() || used_families.insert(family.as_str()))
        .map(|(name, family)| FontDeclaration {
            name: name.clone(),
            family: family.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_available_fonts_reads_both_quote_styles() {
        let css = r#"
            @font-face { font-family: 'Open Sans'; src: url(a.ttf); }
            @font-face { font-family : "Gentium Basic"; src: url(b.ttf); }
            @font-face { font-family: 'Open Sans'; font-weight: bold; }
            body { font-family: serif; }
        "#;

        assert_eq!(available_fonts(css), vec!["Open Sans", "Gentium Basic"]);
    }

    #[test]
    fn test_declared_fonts_drop_duplicate_families() {
        let font_map: BTreeMap<String, String> = [
            ("Liberation Serif", "'Liberation Serif'"),
            ("Arial", "Arial"),
            ("Arial1", "Arial"),
            ("Symbol", ""),
            ("Symbol2", ""),
        ]
        .into_iter()
        .map(|(n, f)| (n.to_string(), f.to_string()))
        .collect();

        let names: Vec<String> = declared_fonts(&font_map).into_iter().map(|f| f.name).collect();

        assert_eq!(names, vec!["Arial", "Liberation Serif", "Symbol", "Symbol2"]);
    }
}
