//! Environment variable substitution for source credentials.
//!
//! Only `SKINSYNC_*` variables are resolved, so a shared or downloaded config
//! file cannot send arbitrary environment contents to a remote source as a
//! bearer token.

use regex::Regex;
use std::sync::LazyLock;

/// Matches `${VAR_NAME}` or `${VAR_NAME:-default_value}`.
static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-((?:[^}\\]|\\.)*))?}")
        .expect("env-var substitution regex is a compile-time constant and must be valid")
});

/// Prefix every substitutable variable must carry.
pub const ALLOWED_ENV_PREFIX: &str = "SKINSYNC_";

/// Check whether a variable name may be substituted.
pub fn is_env_var_allowed(var_name: &str) -> bool {
    var_name.starts_with(ALLOWED_ENV_PREFIX)
}

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// - `${VAR}` is replaced with the value of `VAR` when it is set and allowed.
/// - `${VAR:-default}` falls back to `default` when `VAR` is unset.
/// - `$${VAR}` is an escape and produces the literal `${VAR}`.
/// - Unset or non-allowlisted references are left unchanged; the latter are
///   logged.
pub fn substitute_variables(input: &str) -> String {
    let escaped_placeholder = "\x00ESC_DOLLAR\x00";
    let working = input.replace("$${", escaped_placeholder);

    let result = ENV_VAR_PATTERN.replace_all(&working, |caps: &regex::Captures| {
        let var_name = &caps[1];

        if !is_env_var_allowed(var_name) {
            log::warn!(
                "Credential references non-allowlisted environment variable ${{{var_name}}}; \
                 only {ALLOWED_ENV_PREFIX}* variables are substituted"
            );
            return caps[0].to_string();
        }

        match std::env::var(var_name) {
            Ok(val) => val,
            Err(_) => caps
                .get(2)
                .map(|m| m.as_str().replace("\\}", "}"))
                .unwrap_or_else(|| caps[0].to_string()),
        }
    });

    result.replace(escaped_placeholder, "${")
}
