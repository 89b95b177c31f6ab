//! Error types for the annotation index and type configuration.

use marginalia_primitives::OutOfBounds;
use thiserror::Error;

/// Errors surfaced by [`crate::AnnotationIndex`].
///
/// Unknown handles are not errors; removing or activating one is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
	/// The document refused to anchor the annotation's offset.
	#[error("failed to create anchor: {0}")]
	AnchorCreationFailed(#[from] OutOfBounds),

	/// Internal bookkeeping disagrees with itself.
	///
	/// Queries hitting this degrade to `None` with a warning; it only reaches
	/// callers of `add` when a freshly created anchor cannot be resolved.
	#[error("inconsistent annotation index: {0}")]
	InconsistentState(&'static str),
}

/// Errors that can occur when parsing annotation type configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or shape.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// An annotation type name was empty.
	#[error("annotation type with empty name")]
	EmptyName,

	/// Two annotation types share a name.
	#[error("duplicate annotation type: {0}")]
	DuplicateType(String),

	/// A combination member names no type.
	#[error("combination for {0} has a member with empty type")]
	EmptyMemberType(String),
}

/// Result type for index operations.
pub type Result<T, E = IndexError> = std::result::Result<T, E>;
