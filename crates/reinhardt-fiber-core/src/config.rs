//! Reconciler configuration.
//!
//! Defaults are usable as-is; projects that keep settings in a TOML file can
//! load them with [`ReconcilerConfig::from_toml_str`]:
//!
//! ```toml
//! max_update_depth = 25
//! remove_unmatched_markup = true
//! patch_hydration_mismatches = false
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables of a [`crate::Reconciler`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
	/// Maximum number of flush rounds before state updates are considered runaway.
	pub max_update_depth: usize,
	/// Remove server nodes that no descriptor claimed during hydration.
	pub remove_unmatched_markup: bool,
	/// Patch attribute and text differences found during hydration instead
	/// of treating them as structural mismatches.
	pub patch_hydration_mismatches: bool,
}

impl Default for ReconcilerConfig {
	fn default() -> Self {
		Self {
			max_update_depth: 50,
			remove_unmatched_markup: true,
			patch_hydration_mismatches: true,
		}
	}
}

impl ReconcilerConfig {
	/// Create a configuration with default values.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parse a configuration from a TOML document; missing keys keep their defaults.
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(source)?;
		config.validate()?;
		Ok(config)
	}

	/// Set the maximum number of flush rounds.
	pub fn max_update_depth(mut self, depth: usize) -> Self {
		self.max_update_depth = depth;
		self
	}

	/// Keep or remove unclaimed server nodes during hydration.
	pub fn remove_unmatched_markup(mut self, remove: bool) -> Self {
		self.remove_unmatched_markup = remove;
		self
	}

	/// Patch or reject attribute/text differences during hydration.
	pub fn patch_hydration_mismatches(mut self, patch: bool) -> Self {
		self.patch_hydration_mismatches = patch;
		self
	}

	/// Check value ranges.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_update_depth == 0 {
			return Err(ConfigError::InvalidValue {
				field: "max_update_depth",
				reason: "must be at least 1".to_string(),
			});
		}
		Ok(())
	}
}
