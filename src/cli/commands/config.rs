//! `config validate`.

use crate::cli::args::{ConfigValidateArgs, OutputFormat};
use crate::config::ConfigLoader;
use crate::error::{ConfigError, ParcelKeepError, ValidationIssue};

/// Load and validate a configuration file without starting anything.
///
/// # Errors
///
/// Returns a config error if the file is missing, malformed, or invalid;
/// with `--strict`, warnings are reported as errors too.
pub fn validate(args: &ConfigValidateArgs) -> Result<(), ParcelKeepError> {
    tracing::info!(file = %args.file.display(), "validating configuration");
    let loaded = ConfigLoader::load(&args.file)?;

    if args.strict && !loaded.warnings.is_empty() {
        return Err(ConfigError::ValidationError {
            path: args.file.display().to_string(),
            errors: loaded
                .warnings
                .iter()
                .map(|w| {
                    ValidationIssue::error(
                        w.location.clone().unwrap_or_else(|| "<unknown>".to_owned()),
                        w.message.clone(),
                    )
                })
                .collect(),
        }
        .into());
    }

    match args.format {
        OutputFormat::Json => {
            let warnings: Vec<String> = loaded.warnings.iter().map(ToString::to_string).collect();
            super::print_json(&serde_json::json!({
                "file": args.file.display().to_string(),
                "valid": true,
                "warnings": warnings,
            }))?;
        }
        OutputFormat::Human => {
            for warning in &loaded.warnings {
                println!("warning: {warning}");
            }
            println!("{}: configuration valid", args.file.display());
        }
    }
    Ok(())
}
