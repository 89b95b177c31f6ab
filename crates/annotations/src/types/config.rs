//! TOML loading for annotation type definitions.
//!
//! ```toml
//! combine = true
//!
//! [[type]]
//! name = "error"
//! description = "Compiler error"
//! priority = 10
//!
//! [[type]]
//! name = "error-and-warning"
//! [type.combination]
//! order = 1
//! members = [
//!     { type = "error", minimum_count = 1 },
//!     { type = "warning", optional = true },
//! ]
//! ```

use serde::Deserialize;

use super::{AnnotationType, AnnotationTypes, CombinationMember, CombinationRule, TypeId};
use crate::error::ConfigError;

fn default_true() -> bool {
	true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
	#[serde(default = "default_true")]
	combine: bool,
	#[serde(default, rename = "type")]
	types: Vec<RawType>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawType {
	name: String,
	#[serde(default)]
	description: String,
	#[serde(default = "default_true")]
	visible: bool,
	#[serde(default)]
	priority: i32,
	#[serde(default = "default_true")]
	whole_line: bool,
	#[serde(default)]
	combination: Option<RawCombination>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCombination {
	#[serde(default)]
	order: i32,
	#[serde(default)]
	minimum_optionals: u32,
	#[serde(default)]
	members: Vec<RawMember>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMember {
	#[serde(rename = "type")]
	type_name: String,
	#[serde(default)]
	absorb_all: bool,
	#[serde(default)]
	optional: bool,
	#[serde(default)]
	minimum_count: u32,
}

impl AnnotationTypes {
	/// Parses annotation types from TOML.
	///
	/// Rules that are not well formed are kept; the combination engine skips them.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let raw: RawConfig = toml::from_str(input)?;
		let mut types = AnnotationTypes::new().with_combine(raw.combine);

		for raw_type in raw.types {
			if raw_type.name.is_empty() {
				return Err(ConfigError::EmptyName);
			}
			let name = TypeId::new(&raw_type.name);
			if types.get(name.as_str()).is_some() {
				return Err(ConfigError::DuplicateType(raw_type.name));
			}

			let combination = raw_type
				.combination
				.map(|raw_rule| convert_rule(&name, raw_rule))
				.transpose()?;

			types.insert(AnnotationType {
				name,
				description: raw_type.description,
				visible: raw_type.visible,
				priority: raw_type.priority,
				whole_line: raw_type.whole_line,
				combination,
			});
		}

		tracing::debug!(types = types.len(), combine = types.combine(), "loaded annotation types");
		Ok(types)
	}
}

fn convert_rule(result_type: &TypeId, raw: RawCombination) -> Result<CombinationRule, ConfigError> {
	let members = raw
		.members
		.into_iter()
		.map(|m| {
			if m.type_name.is_empty() {
				return Err(ConfigError::EmptyMemberType(result_type.to_string()));
			}
			Ok(CombinationMember {
				type_id: TypeId::new(&m.type_name),
				absorb_all: m.absorb_all,
				optional: m.optional,
				minimum_count: m.minimum_count,
			})
		})
		.collect::<Result<Vec<_>, _>>()?;

	Ok(CombinationRule {
		result_type: result_type.clone(),
		members,
		order: raw.order,
		minimum_optionals: raw.minimum_optionals,
	})
}
