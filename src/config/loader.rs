//! Configuration loading.
//!
//! 1. read the file (size-capped, BOM stripped)
//! 2. substitute environment references in the raw text
//! 3. parse YAML into [`ParcelKeepConfig`]
//! 4. validate, collecting every issue
//!
//! Substitution syntax:
//!
//! | Form               | Unset variable                      |
//! |--------------------|-------------------------------------|
//! | `${VAR}`           | empty string plus a load warning    |
//! | `${VAR:-default}`  | `default`                           |
//! | `${VAR:?message}`  | [`ConfigError::EnvVarNotSet`]       |
//! | `$$`               | literal `$`                         |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::schema::ParcelKeepConfig;
use crate::config::validation::Validator;
use crate::error::ConfigError;

/// Largest configuration file accepted.
pub const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

/// A loaded, validated configuration.
#[derive(Debug)]
pub struct LoadResult {
    /// The configuration.
    pub config: Arc<ParcelKeepConfig>,
    /// Non-fatal findings.
    pub warnings: Vec<LoadWarning>,
}

/// Non-fatal finding during loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    /// What was found.
    pub message: String,
    /// Field path or file.
    pub location: Option<String>,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} ({location})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Loads configuration files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads and validates the file at `path`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingFile`] if the file cannot be read
    /// - [`ConfigError::InvalidValue`] if it exceeds [`MAX_CONFIG_SIZE`]
    /// - [`ConfigError::EnvVarNotSet`] for an unset `${VAR:?msg}`
    /// - [`ConfigError::ParseError`] for malformed YAML or schema mismatch
    /// - [`ConfigError::ValidationError`] listing every validation error
    pub fn load(path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        if metadata.len() > MAX_CONFIG_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_owned(),
                value: format!("{} bytes", metadata.len()),
                expected: format!("at most {MAX_CONFIG_SIZE} bytes"),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        Self::load_str(&raw, path)
    }

    /// Loads configuration text; `source` is used in messages only.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus the file errors.
    pub fn load_str(raw: &str, source: &Path) -> Result<LoadResult, ConfigError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut warnings = Vec::new();
        let text = substitute_env(raw, source, &mut warnings)?;

        let root: serde_yaml::Value =
            serde_yaml::from_str(&text).map_err(|e| ConfigError::ParseError {
                path: source.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;
        if root.is_null() {
            return Err(ConfigError::ParseError {
                path: source.to_path_buf(),
                line: None,
                message: "configuration file is empty".to_owned(),
            });
        }
        let config: ParcelKeepConfig =
            serde_yaml::from_value(root).map_err(|e| ConfigError::ParseError {
                path: source.to_path_buf(),
                line: None,
                message: e.to_string(),
            })?;

        let result = Validator::new().validate(&config);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: source.display().to_string(),
                errors: result.errors,
            });
        }
        warnings.extend(result.warnings.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path),
        }));

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

/// A parsed `${...}` reference.
enum Reference<'a> {
    Plain(&'a str),
    Default(&'a str, &'a str),
    Required(&'a str, &'a str),
}

impl<'a> Reference<'a> {
    fn parse(inner: &'a str) -> Self {
        match inner.split_once(":-") {
            Some((name, default)) if !name.contains(":?") => Self::Default(name, default),
            _ => match inner.split_once(":?") {
                Some((name, message)) => Self::Required(name, message),
                None => Self::Plain(inner),
            },
        }
    }
}

/// Expands environment references in `raw`.
fn substitute_env(
    raw: &str,
    source: &Path,
    warnings: &mut Vec<LoadWarning>,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
        } else if let Some(body) = after.strip_prefix('{') {
            let close = matching_brace(body).ok_or_else(|| ConfigError::ParseError {
                path: source.to_path_buf(),
                line: Some(raw[..raw.len() - rest.len() + dollar].matches('\n').count() + 1),
                message: format!(
                    "unclosed environment reference: ${{{}",
                    body.lines().next().unwrap_or_default()
                ),
            })?;
            out.push_str(&expand(Reference::parse(&body[..close]), source, warnings)?);
            rest = &body[close + 1..];
        } else {
            out.push('$');
            rest = after;
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Index of the `}` closing a reference whose body starts at `body[0]`.
fn matching_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn expand(
    reference: Reference<'_>,
    source: &Path,
    warnings: &mut Vec<LoadWarning>,
) -> Result<String, ConfigError> {
    let lookup = |name: &str| std::env::var(name.trim()).ok();
    match reference {
        Reference::Plain(name) => Ok(lookup(name).unwrap_or_else(|| {
            warnings.push(LoadWarning {
                message: format!("environment variable '{}' is not set, using empty string", name.trim()),
                location: Some(source.display().to_string()),
            });
            String::new()
        })),
        Reference::Default(name, default) => Ok(lookup(name).unwrap_or_else(|| default.to_owned())),
        Reference::Required(name, message) => lookup(name).ok_or_else(|| ConfigError::EnvVarNotSet {
            var: name.trim().to_owned(),
            location: message.to_owned(),
        }),
    }
}

/// Resolves the configuration path from the flag or `PARCELKEEP_CONFIG`.
#[must_use]
pub fn resolve_config_path(flag: Option<&Path>) -> Option<PathBuf> {
    flag.map(Path::to_path_buf).or_else(|| {
        std::env::var_os("PARCELKEEP_CONFIG")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn subst(raw: &str) -> (Result<String, ConfigError>, Vec<LoadWarning>) {
        let mut warnings = Vec::new();
        let out = substitute_env(raw, Path::new("test.yaml"), &mut warnings);
        (out, warnings)
    }

    #[test]
    fn dollar_escape_and_bare_dollar() {
        let (out, warnings) = subst("price: $$5 and $x");
        assert_eq!(out.unwrap(), "price: $5 and $x");
        assert!(warnings.is_empty());
    }

    #[test]
    fn default_used_when_unset() {
        let (out, _) = subst("url: ${PARCELKEEP_TEST_SURELY_UNSET_1:-http://desk}");
        assert_eq!(out.unwrap(), "url: http://desk");
    }

    #[test]
    fn unset_plain_reference_warns() {
        let (out, warnings) = subst("a: '${PARCELKEEP_TEST_SURELY_UNSET_2}'");
        assert_eq!(out.unwrap(), "a: ''");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("PARCELKEEP_TEST_SURELY_UNSET_2"));
    }

    #[test]
    fn required_reference_fails_with_message() {
        let (out, _) = subst("s: ${PARCELKEEP_TEST_SURELY_UNSET_3:?set the secret}");
        match out.unwrap_err() {
            ConfigError::EnvVarNotSet { var, location } => {
                assert_eq!(var, "PARCELKEEP_TEST_SURELY_UNSET_3");
                assert_eq!(location, "set the secret");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn set_variable_is_expanded() {
        // PATH is set in every test environment.
        let (out, _) = subst("p: ${PATH:-none}");
        assert_ne!(out.unwrap(), "p: none");
    }

    #[test]
    fn nested_braces_in_default() {
        let (out, _) = subst("v: ${PARCELKEEP_TEST_SURELY_UNSET_4:-{a}}");
        assert_eq!(out.unwrap(), "v: {a}");
    }

    #[test]
    fn unclosed_reference_is_a_parse_error() {
        let (out, _) = subst("v: ${OOPS");
        assert!(matches!(out.unwrap_err(), ConfigError::ParseError { .. }));
    }

    #[test]
    fn load_str_validates() {
        let err = ConfigLoader::load_str("token:\n  secret: short\n", Path::new("c.yaml"))
            .unwrap_err();
        match err {
            ConfigError::ValidationError { errors, .. } => {
                assert!(errors.iter().any(|e| e.path == "token.secret"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_str_rejects_unbounded_token_lifetime() {
        let yaml = format!("token:\n  secret: {SECRET}\n  ttl: 1000000years\n");
        let err = ConfigLoader::load_str(&yaml, Path::new("c.yaml")).unwrap_err();
        match err {
            ConfigError::ValidationError { errors, .. } => {
                assert!(errors.iter().any(|e| e.path == "token.ttl"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_str_accepts_valid_config() {
        let yaml = format!(
            "token:\n  secret: {SECRET}\ndirectory:\n  staff:\n    - {{ id: S-1, email: desk@example.org }}\n"
        );
        let loaded = ConfigLoader::load_str(&yaml, Path::new("c.yaml")).unwrap();
        assert_eq!(loaded.config.directory.staff.len(), 1);
    }

    #[test]
    fn empty_file_is_rejected() {
        let err = ConfigLoader::load_str("", Path::new("c.yaml")).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = ConfigLoader::load(Path::new("/nonexistent/parcelkeep.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn flag_wins_over_environment() {
        let path = resolve_config_path(Some(Path::new("a.yaml")));
        assert_eq!(path, Some(PathBuf::from("a.yaml")));
    }
}
