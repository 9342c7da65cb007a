//! Options file loading and validation.

use crate::error::ConfigError;
use crate::types::PluginOptions;
use std::path::Path;

/// Name of the options file inside a project directory.
pub const OPTIONS_FILE: &str = "tsforge.toml";

/// Loads and validates `tsforge.toml` from a project directory.
pub fn load_options(project_dir: &Path) -> Result<PluginOptions, ConfigError> {
    let content = std::fs::read_to_string(project_dir.join(OPTIONS_FILE))?;
    load_options_from_str(&content)
}

/// Parses and validates plugin options from a string.
pub fn load_options_from_str(content: &str) -> Result<PluginOptions, ConfigError> {
    let options: PluginOptions =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_options(&options)?;
    Ok(options)
}

fn validate_options(options: &PluginOptions) -> Result<(), ConfigError> {
    if options.cache_root.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "cache_root must not be empty".to_string(),
        ));
    }
    if options.include.is_empty() {
        return Err(ConfigError::ValidationError(
            "include must list at least one pattern".to_string(),
        ));
    }
    if let Some(pattern) = options
        .include
        .iter()
        .chain(&options.exclude)
        .find(|p| p.trim().is_empty())
    {
        return Err(ConfigError::ValidationError(format!(
            "blank file pattern {pattern:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Verbosity;
    use std::path::PathBuf;

    #[test]
    fn empty_file_uses_defaults() {
        let options = load_options_from_str("").unwrap();
        assert_eq!(options, PluginOptions::default());
        assert!(options.check);
        assert!(options.abort_on_error);
        assert!(!options.clean);
        assert_eq!(options.cache_root, PathBuf::from(".tsforge_cache"));
        assert_eq!(options.verbosity, Verbosity::Warning);
    }

    #[test]
    fn parse_full_options() {
        let toml = r#"
check = false
clean = true
cache_root = "build/.cache"
abort_on_error = false
verbosity = "debug"
include = ["src/**/*.ts"]
exclude = ["src/**/*.spec.ts"]
use_tsconfig_declaration_dir = true

[compiler]
target = "es2017"
strict = true
lib = ["dom", "es2017"]
"#;
        let options = load_options_from_str(toml).unwrap();
        assert!(!options.check);
        assert!(options.clean);
        assert_eq!(options.cache_root, PathBuf::from("build/.cache"));
        assert_eq!(options.verbosity, Verbosity::Debug);
        assert_eq!(options.include, vec!["src/**/*.ts"]);
        assert!(options.use_tsconfig_declaration_dir);
        assert_eq!(options.compiler.len(), 3);
        assert_eq!(
            options.compiler["target"],
            toml::Value::String("es2017".to_string())
        );
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_options_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn unknown_verbosity_errors() {
        let err = load_options_from_str("verbosity = \"loud\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn empty_cache_root_errors() {
        let err = load_options_from_str("cache_root = \"\"").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn empty_include_errors() {
        let err = load_options_from_str("include = []").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn blank_pattern_errors() {
        let err = load_options_from_str("exclude = [\"  \"]").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn load_from_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(OPTIONS_FILE), "check = false").unwrap();
        let options = load_options(dir.path()).unwrap();
        assert!(!options.check);
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_options(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
