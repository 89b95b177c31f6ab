//! Line annotations for an editable document.
//!
//! # Mental Model
//!
//! Callers register [`AnnotationDescriptor`]s (breakpoints, diagnostics,
//! bookmarks) with an [`AnnotationIndex`]. The index anchors each one in the
//! document, groups them by line, and asks a [`Combiner`] which entries a line
//! actually shows. Exactly one shown entry per line is active; the rest are
//! passive and reachable by cycling.
//!
//! Which annotations merge is declared per [`AnnotationType`] as a
//! [`CombinationRule`] and published through a [`TypeRegistry`]. The gutter
//! learns about changes through [`ChangeNotifier`].
//!
//! # Key Types
//!
//! | Type | Role |
//! |------|------|
//! | [`AnnotationIndex`] | Per-document registry and the only lock |
//! | [`LineAnnotationGroup`] | Descriptors of one line and what it displays |
//! | [`Combiner`] | Ordered rule set applied to a line |
//! | [`Entry`] | A displayed descriptor or [`CombinedAnnotation`] |
//! | [`AnnotationTypes`] | Declared types and the global combine switch |

/// Merging of co-located annotations.
pub mod combine;
/// Annotation instances and displayed entries.
pub mod descriptor;
/// Index and configuration errors.
pub mod error;
/// Per-line grouping.
pub mod group;
mod index;
/// Change notification for the gutter.
pub mod notify;
/// Annotation types, combination rules and their configuration.
pub mod types;

pub use combine::{Combination, Combiner, select_applicable_rules};
pub use descriptor::{AnnotationDescriptor, AnnotationId, CombinedAnnotation, Entry};
pub use error::{ConfigError, IndexError, Result};
pub use group::LineAnnotationGroup;
pub use index::AnnotationIndex;
pub use notify::ChangeNotifier;
pub use types::{
	AnnotationType, AnnotationTypes, CombinationMember, CombinationRule, TypeId, TypeRegistry,
};
