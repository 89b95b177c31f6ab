//! Annotation instances and the entries a line displays.

use std::fmt;
use std::sync::Arc;

use marginalia_primitives::{AnchorHandle, CharIdx, CharLen};

use crate::types::TypeId;

/// Handle of a registered annotation, returned by [`crate::AnnotationIndex::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(u64);

impl AnnotationId {
	/// Placeholder carried by descriptors that were never registered.
	pub const UNREGISTERED: Self = Self(0);

	pub(crate) const fn new(raw: u64) -> Self {
		Self(raw)
	}

	/// Raw numeric value.
	pub const fn as_u64(self) -> u64 {
		self.0
	}
}

impl fmt::Display for AnnotationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// One annotation instance, before any merging.
///
/// The line is never stored: it is read through the anchor, which the
/// index attaches on registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationDescriptor {
	id: AnnotationId,
	type_id: TypeId,
	offset: CharIdx,
	length: CharLen,
	visible: bool,
	priority: i32,
	description: String,
	anchor: Option<AnchorHandle>,
}

impl AnnotationDescriptor {
	/// Creates a visible, zero-length, priority 0 descriptor of `type_id` at `offset`.
	pub fn new(type_id: impl Into<TypeId>, offset: CharIdx) -> Self {
		Self {
			id: AnnotationId::UNREGISTERED,
			type_id: type_id.into(),
			offset,
			length: 0,
			visible: true,
			priority: 0,
			description: String::new(),
			anchor: None,
		}
	}

	/// Sets the annotated length.
	pub fn with_length(mut self, length: CharLen) -> Self {
		self.length = length;
		self
	}

	/// Sets the priority; lower sorts first.
	pub fn with_priority(mut self, priority: i32) -> Self {
		self.priority = priority;
		self
	}

	/// Sets the instance's own visibility.
	pub fn with_visible(mut self, visible: bool) -> Self {
		self.visible = visible;
		self
	}

	/// Sets tooltip text.
	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();
		self
	}

	pub fn id(&self) -> AnnotationId {
		self.id
	}

	pub fn type_id(&self) -> &TypeId {
		&self.type_id
	}

	/// Offset requested at creation; the live position is tracked by the anchor.
	pub fn offset(&self) -> CharIdx {
		self.offset
	}

	pub fn length(&self) -> CharLen {
		self.length
	}

	/// The instance's own visibility flag, ignoring its type.
	pub fn is_visible(&self) -> bool {
		self.visible
	}

	pub fn priority(&self) -> i32 {
		self.priority
	}

	pub fn description(&self) -> &str {
		&self.description
	}

	/// Anchor attached while registered.
	pub fn anchor(&self) -> Option<AnchorHandle> {
		self.anchor
	}

	/// Returns true while the descriptor is owned by an index.
	pub fn is_registered(&self) -> bool {
		self.anchor.is_some()
	}

	pub(crate) fn set_mark(&mut self, id: AnnotationId, anchor: AnchorHandle) {
		self.id = id;
		self.anchor = Some(anchor);
	}
}

/// Synthetic entry standing for every descriptor one rule application matched.
///
/// Position, line and anchor are borrowed from the first wrapped descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedAnnotation {
	result_type: TypeId,
	members: Vec<Arc<AnnotationDescriptor>>,
	description: String,
}

impl CombinedAnnotation {
	/// Wraps `members`, which must not be empty.
	pub(crate) fn new(
		result_type: TypeId,
		members: Vec<Arc<AnnotationDescriptor>>,
		type_description: &str,
	) -> Self {
		debug_assert!(!members.is_empty());
		let description = if type_description.is_empty() {
			members
				.iter()
				.map(|m| m.description())
				.filter(|d| !d.is_empty())
				.collect::<Vec<_>>()
				.join("\n")
		} else {
			type_description.to_owned()
		};
		Self {
			result_type,
			members,
			description,
		}
	}

	pub fn result_type(&self) -> &TypeId {
		&self.result_type
	}

	/// Wrapped descriptors in match order.
	pub fn members(&self) -> &[Arc<AnnotationDescriptor>] {
		&self.members
	}

	/// The descriptor defining position and anchor.
	pub fn first(&self) -> &Arc<AnnotationDescriptor> {
		&self.members[0]
	}

	/// Most urgent member priority.
	pub fn priority(&self) -> i32 {
		self.members
			.iter()
			.map(|m| m.priority())
			.min()
			.unwrap_or_default()
	}

	/// Tooltip text: the result type's description, or the members' joined.
	pub fn short_description(&self) -> &str {
		&self.description
	}

	pub fn contains(&self, id: AnnotationId) -> bool {
		self.members.iter().any(|m| m.id() == id)
	}
}

/// A displayed entry of a line: a plain descriptor or a combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
	Descriptor(Arc<AnnotationDescriptor>),
	Combined(CombinedAnnotation),
}

impl Entry {
	/// The type shown for this entry.
	pub fn type_id(&self) -> &TypeId {
		match self {
			Entry::Descriptor(d) => d.type_id(),
			Entry::Combined(c) => c.result_type(),
		}
	}

	/// Descriptor whose anchor positions this entry.
	pub fn first(&self) -> &Arc<AnnotationDescriptor> {
		match self {
			Entry::Descriptor(d) => d,
			Entry::Combined(c) => c.first(),
		}
	}

	pub fn anchor(&self) -> Option<AnchorHandle> {
		self.first().anchor()
	}

	pub fn priority(&self) -> i32 {
		match self {
			Entry::Descriptor(d) => d.priority(),
			Entry::Combined(c) => c.priority(),
		}
	}

	pub fn description(&self) -> &str {
		match self {
			Entry::Descriptor(d) => d.description(),
			Entry::Combined(c) => c.short_description(),
		}
	}

	/// Returns true if `id` is this descriptor or one of the combination's members.
	pub fn contains(&self, id: AnnotationId) -> bool {
		match self {
			Entry::Descriptor(d) => d.id() == id,
			Entry::Combined(c) => c.contains(id),
		}
	}

	/// Ids of every descriptor behind this entry.
	pub fn ids(&self) -> Vec<AnnotationId> {
		match self {
			Entry::Descriptor(d) => vec![d.id()],
			Entry::Combined(c) => c.members().iter().map(|m| m.id()).collect(),
		}
	}

	pub fn as_descriptor(&self) -> Option<&Arc<AnnotationDescriptor>> {
		match self {
			Entry::Descriptor(d) => Some(d),
			Entry::Combined(_) => None,
		}
	}

	pub fn as_combined(&self) -> Option<&CombinedAnnotation> {
		match self {
			Entry::Descriptor(_) => None,
			Entry::Combined(c) => Some(c),
		}
	}
}
