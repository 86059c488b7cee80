use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modus {
    #[default]
    FullEditing,
    /// Annotate only: paragraph styles and images are locked
    Review,
}

/// Editor feature switches as configured by the embedding application.
///
/// Unset flags follow `all_features_enabled`; an explicit `false` always
/// wins over it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorOptions {
    pub modus: Modus,
    pub all_features_enabled: bool,
    pub direct_text_styling_enabled: Option<bool>,
    pub direct_paragraph_styling_enabled: Option<bool>,
    pub paragraph_style_selecting_enabled: Option<bool>,
    pub paragraph_style_editing_enabled: Option<bool>,
    pub image_editing_enabled: Option<bool>,
    pub hyperlink_editing_enabled: Option<bool>,
    pub annotations_enabled: Option<bool>,
    pub undo_redo_enabled: Option<bool>,
    pub zooming_enabled: Option<bool>,
}

/// Resolved feature switches.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FeatureSet {
    pub review_mode: bool,
    pub direct_text_styling: bool,
    pub direct_paragraph_styling: bool,
    pub paragraph_style_selecting: bool,
    pub paragraph_style_editing: bool,
    pub image_editing: bool,
    pub hyperlink_editing: bool,
    pub annotations: bool,
    pub undo_redo: bool,
    pub zooming: bool,
}

impl EditorOptions {
    /// Options with every feature switched on.
    pub fn all_features() -> Self {
        Self {
            all_features_enabled: true,
            ..Self::default()
        }
    }

    fn is_enabled(&self, flag: Option<bool>) -> bool {
        if self.all_features_enabled {
            flag != Some(false)
        } else {
            flag == Some(true)
        }
    }

    pub fn features(&self) -> FeatureSet {
        let review_mode = self.modus == Modus::Review;
        FeatureSet {
            review_mode,
            direct_text_styling: self.is_enabled(self.direct_text_styling_enabled),
            direct_paragraph_styling: self.is_enabled(self.direct_paragraph_styling_enabled),
            paragraph_style_selecting: !review_mode
                && self.is_enabled(self.paragraph_style_selecting_enabled),
            paragraph_style_editing: !review_mode
                && self.is_enabled(self.paragraph_style_editing_enabled),
            image_editing: !review_mode && self.is_enabled(self.image_editing_enabled),
            hyperlink_editing: self.is_enabled(self.hyperlink_editing_enabled),
            annotations: review_mode || self.is_enabled(self.annotations_enabled),
            undo_redo: self.is_enabled(self.undo_redo_enabled),
            zooming: self.is_enabled(self.zooming_enabled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_disable_everything() {
        assert_eq!(EditorOptions::default().features(), FeatureSet::default());
    }

    #[test]
    fn test_all_features_respects_explicit_false() {
        let options = EditorOptions {
            undo_redo_enabled: Some(false),
            ..EditorOptions::all_features()
        };
        let features = options.features();

        assert!(!features.undo_redo);
        assert!(features.zooming);
        assert!(features.paragraph_style_editing);
    }

    #[test]
    fn test_review_mode_locks_styles_and_forces_annotations() {
        let options = EditorOptions {
            modus: Modus::Review,
            annotations_enabled: Some(false),
            ..EditorOptions::all_features()
        };
        let features = options.features();

        assert!(features.review_mode);
        assert!(features.annotations);
        assert!(!features.paragraph_style_selecting);
        assert!(!features.paragraph_style_editing);
        assert!(!features.image_editing);
        assert!(features.hyperlink_editing);
    }

    #[test]
    fn test_explicit_opt_in_without_all_features() {
        let options = EditorOptions {
            undo_redo_enabled: Some(true),
            ..EditorOptions::default()
        };
        let features = options.features();
        assert!(features.undo_redo);
        assert!(!features.zooming);
    }
}
