use olm_install_controller_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

// Semantic Versioning 2.0.0, anchored.
static SEMVER: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(r"^(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)(-(0|[1-9][0-9]*|[0-9]*[a-zA-Z-][0-9a-zA-Z-]*)(\.(0|[1-9][0-9]*|[0-9]*[a-zA-Z-][0-9a-zA-Z-]*))*)?(\+[0-9a-zA-Z-]+(\.[0-9a-zA-Z-]+)*)?$")
});

/// Fails with a terminal error unless `version` is a semantic version.
pub fn validate(version: &str) -> Result<()> {
    let semver = SEMVER.as_ref().map_err(Error::terminal)?;
    if !semver.is_match(version) {
        return Err(Error::terminal(format_args!(
            "invalid version {version:?}: not a semantic version"
        )));
    }
    Ok(())
}
