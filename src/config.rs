use std::env;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::strategy::PackingConfig;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub io: IoConfig,
    pub strategy: StrategyConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(env_string)
    }

    /// Creates a configuration from an arbitrary variable source.
    ///
    /// `lookup` returns the trimmed, non-empty value of a variable or `None`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            io: IoConfig::from_lookup(&lookup),
            strategy: StrategyConfig::from_lookup(&lookup),
        }
    }
}

/// Where the state is read from and written to.
#[derive(Clone, Debug)]
pub struct IoConfig {
    state_file: PathBuf,
    output_file: Option<PathBuf>,
}

impl IoConfig {
    const DEFAULT_STATE_FILE: &'static str = "truck_state.json";
    const STATE_FILE_VAR: &'static str = "TRUCK_LOADER_STATE_FILE";
    const OUTPUT_FILE_VAR: &'static str = "TRUCK_LOADER_OUTPUT_FILE";

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            state_file: lookup(Self::STATE_FILE_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_STATE_FILE)),
            output_file: lookup(Self::OUTPUT_FILE_VAR).map(PathBuf::from),
        }
    }

    /// State file to load before packing.
    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    /// File to save the packed state to, if configured.
    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }
}

/// Configuration of the packing run.
#[derive(Clone, Debug)]
pub struct StrategyConfig {
    packing: PackingConfig,
    reset_before_pack: bool,
}

impl StrategyConfig {
    const SLIDE_STEP_VAR: &'static str = "TRUCK_LOADER_SLIDE_STEP";
    const RESET_VAR: &'static str = "TRUCK_LOADER_RESET_BEFORE_PACK";

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let slide_step = load_f64_with_warning(
            lookup(Self::SLIDE_STEP_VAR),
            Self::SLIDE_STEP_VAR,
            PackingConfig::DEFAULT_SLIDE_STEP,
            |value| value > 0.0 && value.is_finite(),
            "must be greater than 0",
            "Adjusted slide step changes where items end up",
        );

        let reset_before_pack = lookup(Self::RESET_VAR)
            .and_then(|raw| parse_bool(&raw, Self::RESET_VAR))
            .unwrap_or(false);

        Self {
            packing: PackingConfig::builder().slide_step(slide_step).build(),
            reset_before_pack,
        }
    }

    /// Returns the configured PackingConfig.
    pub fn packing_config(&self) -> PackingConfig {
        self.packing
    }

    /// Whether placed items go back to the pool before packing.
    pub fn reset_before_pack(&self) -> bool {
        self.reset_before_pack
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("⚠️ Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "⚠️ Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

fn load_f64_with_warning(
    raw: Option<String>,
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match raw {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) => {
                if !validator(value) {
                    warn!(
                        "⚠️ {} contains invalid value '{}': {}. Using {}.",
                        var_name, raw, invalid_hint, default
                    );
                    default
                } else {
                    let tolerance = (default.abs().max(1.0)) * 1e-9;
                    if (value - default).abs() > tolerance {
                        warn!("⚠️ {} ({} = {}).", warning, var_name, value);
                    }
                    value
                }
            }
            Err(err) => {
                warn!(
                    "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_parse_bool_true_values() {
        assert_eq!(parse_bool("1", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("true", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("yes", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("y", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("on", "TEST_VAR"), Some(true));

        // Test case insensitivity
        assert_eq!(parse_bool("TRUE", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("Yes", "TEST_VAR"), Some(true));

        // Test with whitespace
        assert_eq!(parse_bool(" true ", "TEST_VAR"), Some(true));
    }

    #[test]
    fn test_parse_bool_false_and_invalid_values() {
        assert_eq!(parse_bool("0", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("false", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("OFF", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("  no  ", "TEST_VAR"), Some(false));

        assert_eq!(parse_bool("maybe", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
    }

    #[test]
    fn defaults_without_variables() {
        let config = config_from(&[]);
        assert_eq!(config.io.state_file(), Path::new("truck_state.json"));
        assert_eq!(config.io.output_file(), None);
        assert_eq!(config.strategy.packing_config(), PackingConfig::default());
        assert!(!config.strategy.reset_before_pack());
    }

    #[test]
    fn reads_all_variables() {
        let config = config_from(&[
            ("TRUCK_LOADER_STATE_FILE", "in.json"),
            ("TRUCK_LOADER_OUTPUT_FILE", "out.json"),
            ("TRUCK_LOADER_SLIDE_STEP", "0.25"),
            ("TRUCK_LOADER_RESET_BEFORE_PACK", "yes"),
        ]);
        assert_eq!(config.io.state_file(), Path::new("in.json"));
        assert_eq!(config.io.output_file(), Some(Path::new("out.json")));
        assert_eq!(config.strategy.packing_config().slide_step, 0.25);
        assert!(config.strategy.reset_before_pack());
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        for raw in ["0", "-1", "abc", "NaN", "inf"] {
            let config = config_from(&[
                ("TRUCK_LOADER_SLIDE_STEP", raw),
                ("TRUCK_LOADER_RESET_BEFORE_PACK", "sometimes"),
            ]);
            assert_eq!(
                config.strategy.packing_config().slide_step,
                PackingConfig::DEFAULT_SLIDE_STEP,
                "slide step {raw}"
            );
            assert!(!config.strategy.reset_before_pack());
        }
    }

    #[test]
    fn env_string_ignores_missing_variables() {
        assert_eq!(env_string("TRUCK_LOADER_TEST_SURELY_UNSET_VARIABLE"), None);
    }
}
