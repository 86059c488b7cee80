use docsession_engine::{EditorOptions, MemberId, MemberProperties};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to read fonts stylesheet at {fonts_path}: {source}")]
    FontsReadError {
        fonts_path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Stable member id for this user; a fresh one is generated per run when
    /// absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fonts_css: Option<PathBuf>,
    #[serde(default)]
    pub editor: EditorOptions,
    #[serde(default)]
    pub user: MemberProperties,
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in the fonts stylesheet path
        config.fonts_css = config
            .fonts_css
            .map(|path| Self::expand_path(&path).unwrap_or(path));
        config.user = config.user.with_defaults();

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/docsession");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// The configured member id, or a freshly generated one.
    pub fn local_member_id(&self) -> MemberId {
        self.member_id
            .as_deref()
            .map(MemberId::new)
            .unwrap_or_else(MemberId::generate)
    }

    /// Contents of the fonts stylesheet, if one is configured.
    pub fn load_fonts_css(&self) -> Result<Option<String>, ConfigError> {
        let Some(fonts_path) = &self.fonts_css else {
            return Ok(None);
        };
        std::fs::read_to_string(fonts_path)
            .map(Some)
            .map_err(|source| ConfigError::FontsReadError {
                fonts_path: fonts_path.clone(),
                source,
            })
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsession_engine::Modus;
    use pretty_assertions::assert_eq;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        // Should not contain tilde anymore
        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/docsession/config.toml"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.member_id, None);
        assert_eq!(config.editor, EditorOptions::default());
        assert_eq!(config.user, MemberProperties::default());
    }

    #[test]
    fn test_editor_and_user_sections() {
        let config_content = r#"
member_id = "alice"

[editor]
modus = "review"
all_features_enabled = true
zooming_enabled = false

[user]
display_name = "Alice"
"#;

        let config: Config = toml::from_str(config_content).unwrap();
        let features = config.editor.features();

        assert_eq!(config.editor.modus, Modus::Review);
        assert!(features.annotations);
        assert!(!features.zooming);
        assert_eq!(config.user.display_name, "Alice");
        assert_eq!(config.user.color, "black");
        assert_eq!(config.local_member_id(), MemberId::new("alice"));
    }

    #[test]
    fn test_member_id_is_generated_when_missing() {
        let config = Config::default();

        let first = config.local_member_id();
        let second = config.local_member_id();

        assert!(first.as_str().starts_with("member-"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test/path");
        let expanded = Config::expand_path(&path);

        assert!(expanded.is_some());
        let expanded = expanded.unwrap();
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_with_env_var() {
        unsafe {
            env::set_var("DOCSESSION_TEST_VAR", "/test/env/path");
        }

        let path = PathBuf::from("$DOCSESSION_TEST_VAR/subdir");
        let expanded = Config::expand_path(&path);

        assert_eq!(expanded, Some(PathBuf::from("/test/env/path/subdir")));

        unsafe {
            env::remove_var("DOCSESSION_TEST_VAR");
        }
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "editor = 3").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();

        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested").join("config.toml");
        let test_config = Config {
            member_id: Some("bob".to_string()),
            fonts_css: Some(PathBuf::from("/tmp/fonts.css")),
            editor: EditorOptions::all_features(),
            user: MemberProperties::default(),
        };

        test_config.save_to_path(&config_file).unwrap();
        let loaded_config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded_config.member_id, test_config.member_id);
        assert_eq!(loaded_config.fonts_css, test_config.fonts_css);
        assert_eq!(loaded_config.editor, test_config.editor);
        assert_eq!(loaded_config.user, test_config.user);
    }

    #[test]
    fn test_fonts_css_is_read_from_expanded_path() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("fonts.css"),
            "@font-face { font-family: 'Open Sans'; }",
        )
        .unwrap();
        unsafe {
            env::set_var("DOCSESSION_FONTS_DIR", temp_dir.path());
        }
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "fonts_css = \"$DOCSESSION_FONTS_DIR/fonts.css\"\n").unwrap();

        let config = Config::load_from_path(&config_file).unwrap().unwrap();
        let css = config.load_fonts_css().unwrap().unwrap();

        assert!(css.contains("Open Sans"));
        unsafe {
            env::remove_var("DOCSESSION_FONTS_DIR");
        }
    }

    #[test]
    fn test_missing_fonts_css_is_an_error() {
        let config = Config {
            fonts_css: Some(PathBuf::from("/definitely/not/here.css")),
            ..Config::default()
        };

        let err = config.load_fonts_css().unwrap_err();

        assert!(matches!(err, ConfigError::FontsReadError { .. }));
        assert!(Config::default().load_fonts_css().unwrap().is_none());
    }
}
