//! Annotation type definitions and combination rules.
//!
//! Types are read-only to the index: it consults visibility, whole-line
//! flags and combination rules, and never mutates them. Configuration
//! changes are published through [`TypeRegistry`].

mod config;
mod registry;

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use marginalia_primitives::CharIdx;

pub use self::registry::TypeRegistry;
use crate::descriptor::AnnotationDescriptor;

/// Name of an annotation type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(Arc<str>);

impl TypeId {
	/// Creates a type id from a name.
	pub fn new(name: &str) -> Self {
		Self(Arc::from(name))
	}

	/// Returns the type name.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for TypeId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl From<&str> for TypeId {
	fn from(name: &str) -> Self {
		Self::new(name)
	}
}

impl fmt::Display for TypeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// One required or optional participant of a [`CombinationRule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinationMember {
	/// Type of annotation this member matches.
	pub type_id: TypeId,
	/// Collect every matching annotation instead of just the first.
	pub absorb_all: bool,
	/// The rule may succeed without this member.
	pub optional: bool,
	/// Matches required for the member to count; 0 means "one is enough".
	pub minimum_count: u32,
}

impl CombinationMember {
	/// A required member matching a single annotation of `type_id`.
	pub fn new(type_id: impl Into<TypeId>) -> Self {
		Self {
			type_id: type_id.into(),
			absorb_all: false,
			optional: false,
			minimum_count: 0,
		}
	}

	/// Marks the member optional.
	pub fn optional(mut self) -> Self {
		self.optional = true;
		self
	}

	/// Makes the member collect every match.
	pub fn absorb_all(mut self) -> Self {
		self.absorb_all = true;
		self
	}

	/// Sets the minimum number of matches.
	pub fn minimum_count(mut self, count: u32) -> Self {
		self.minimum_count = count;
		self
	}
}

/// Declarative rule merging co-located annotations into one displayed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinationRule {
	/// Type of the synthetic combined annotation.
	pub result_type: TypeId,
	/// Participants, matched in declaration order.
	pub members: Vec<CombinationMember>,
	/// Precedence among rules; 0 sorts after every explicitly ordered rule.
	pub order: i32,
	/// Optional members that must match for the rule to succeed.
	pub minimum_optionals: u32,
}

impl CombinationRule {
	/// Creates an unordered rule without members.
	pub fn new(result_type: impl Into<TypeId>) -> Self {
		Self {
			result_type: result_type.into(),
			members: Vec::new(),
			order: 0,
			minimum_optionals: 0,
		}
	}

	/// Appends a member.
	pub fn member(mut self, member: CombinationMember) -> Self {
		self.members.push(member);
		self
	}

	/// Sets the rule's order.
	pub fn order(mut self, order: i32) -> Self {
		self.order = order;
		self
	}

	/// Sets the number of optional members that must match.
	pub fn minimum_optionals(mut self, count: u32) -> Self {
		self.minimum_optionals = count;
		self
	}

	/// Returns true if the rule has at least two members or a single absorb-all member.
	pub fn is_well_formed(&self) -> bool {
		match self.members.as_slice() {
			[] => false,
			[only] => only.absorb_all,
			_ => true,
		}
	}
}

/// Definition of an annotation type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationType {
	/// Unique type name.
	pub name: TypeId,
	/// Human readable description, used as tooltip text.
	pub description: String,
	/// Instances of an invisible type never reach the gutter.
	pub visible: bool,
	/// Default priority for new instances; lower sorts first.
	pub priority: i32,
	/// Instances apply to the whole line rather than a sub-range.
	pub whole_line: bool,
	/// Rule producing this type from other annotations, if any.
	pub combination: Option<CombinationRule>,
}

impl AnnotationType {
	/// Creates a visible whole-line type with priority 0.
	pub fn new(name: impl Into<TypeId>) -> Self {
		Self {
			name: name.into(),
			description: String::new(),
			visible: true,
			priority: 0,
			whole_line: true,
			combination: None,
		}
	}

	/// Sets the description.
	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();
		self
	}

	/// Sets the default priority.
	pub fn priority(mut self, priority: i32) -> Self {
		self.priority = priority;
		self
	}

	/// Sets visibility.
	pub fn visible(mut self, visible: bool) -> Self {
		self.visible = visible;
		self
	}

	/// Sets the whole-line flag.
	pub fn whole_line(mut self, whole_line: bool) -> Self {
		self.whole_line = whole_line;
		self
	}

	/// Attaches a combination rule, forcing its result type to this type.
	pub fn combination(mut self, mut rule: CombinationRule) -> Self {
		rule.result_type = self.name.clone();
		self.combination = Some(rule);
		self
	}
}

/// Declaration-ordered set of annotation types plus the global combine switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationTypes {
	types: IndexMap<TypeId, AnnotationType>,
	combine: bool,
}

impl Default for AnnotationTypes {
	fn default() -> Self {
		Self {
			types: IndexMap::new(),
			combine: true,
		}
	}
}

impl AnnotationTypes {
	/// Creates an empty set with combination enabled.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder form of [`Self::insert`].
	pub fn with_type(mut self, ty: AnnotationType) -> Self {
		self.insert(ty);
		self
	}

	/// Adds or replaces a type, keeping the original declaration slot on replace.
	pub fn insert(&mut self, ty: AnnotationType) -> Option<AnnotationType> {
		self.types.insert(ty.name.clone(), ty)
	}

	/// Looks up a type by name.
	pub fn get(&self, name: &str) -> Option<&AnnotationType> {
		self.types.get(name)
	}

	/// Iterates types in declaration order.
	pub fn iter(&self) -> impl Iterator<Item = &AnnotationType> {
		self.types.values()
	}

	/// Number of declared types.
	pub fn len(&self) -> usize {
		self.types.len()
	}

	/// Returns true if no type is declared.
	pub fn is_empty(&self) -> bool {
		self.types.is_empty()
	}

	/// Whether co-located annotations are merged at all.
	pub fn combine(&self) -> bool {
		self.combine
	}

	/// Toggles combination globally.
	pub fn set_combine(&mut self, combine: bool) {
		self.combine = combine;
	}

	/// Builder form of [`Self::set_combine`].
	pub fn with_combine(mut self, combine: bool) -> Self {
		self.combine = combine;
		self
	}

	/// Declared combination rules in declaration order.
	pub fn rules(&self) -> impl Iterator<Item = &CombinationRule> {
		self.types.values().filter_map(|ty| ty.combination.as_ref())
	}

	/// Returns true if `name` is a declared whole-line type.
	pub fn is_whole_line(&self, name: &TypeId) -> bool {
		self.types.get(name).is_some_and(|ty| ty.whole_line)
	}

	/// Effective visibility: the descriptor's own flag and its type's, if declared.
	pub fn is_visible(&self, descriptor: &AnnotationDescriptor) -> bool {
		descriptor.is_visible()
			&& self
				.types
				.get(descriptor.type_id())
				.is_none_or(|ty| ty.visible)
	}

	/// Description of a type, empty if undeclared.
	pub fn description_of(&self, name: &TypeId) -> &str {
		self.types
			.get(name)
			.map(|ty| ty.description.as_str())
			.unwrap_or_default()
	}

	/// Builds an unregistered descriptor using the type's priority and description.
	pub fn descriptor(&self, name: &str, offset: CharIdx) -> AnnotationDescriptor {
		let descriptor = AnnotationDescriptor::new(name, offset);
		match self.types.get(name) {
			Some(ty) => descriptor
				.with_priority(ty.priority)
				.with_description(ty.description.clone()),
			None => descriptor,
		}
	}
}

#[cfg(test)]
mod tests;
