//! Merging of co-located annotations according to combination rules.
//!
//! # Mental Model
//!
//! Rules are tried once each, in precedence order, against a pool of all the
//! line's descriptors, hidden ones included. A successful rule consumes what
//! it matched and emits one [`CombinedAnnotation`]; later rules only see what
//! is left. Visible descriptors still in the pool afterwards pass through
//! unmerged.
//!
//! # Invariants
//!
//! - A descriptor is wrapped by at most one combination per application.
//!   - Enforced in: [`Combiner::apply`] (matched pool slots are removed).
//!   - Tested by: `tests::test_descriptor_consumed_once`
//! - Output is a pure function of the raw order and rule order.
//!   - Enforced in: [`Combiner::apply`] (no hash iteration during matching).
//!   - Tested by: `tests::prop_apply_is_deterministic`

use std::sync::Arc;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::descriptor::{AnnotationDescriptor, AnnotationId, CombinedAnnotation, Entry};
use crate::types::{AnnotationTypes, CombinationMember, CombinationRule};

/// Pool slots matched by a rule or member; rarely more than a handful.
type Matches = SmallVec<[usize; 4]>;

/// Result of one [`Combiner::apply`] call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Combination {
	/// Combined entries in rule order, followed by unmerged visible descriptors.
	pub entries: Vec<Entry>,
	/// Descriptors absorbed into some combined entry.
	pub combined_used: FxHashSet<AnnotationId>,
	/// Index into `entries` of the entry holding the preferred descriptor.
	pub preferred: Option<usize>,
}

/// Filters `types`' rules down to applicable ones, in precedence order.
///
/// A rule applies when its result type is declared whole-line and the rule is
/// well formed. Explicit orders sort ascending; rules with order 0 follow in
/// declaration order.
pub fn select_applicable_rules(types: &AnnotationTypes) -> Vec<&CombinationRule> {
	let mut rules: Vec<&CombinationRule> = types
		.rules()
		.filter(|rule| types.is_whole_line(&rule.result_type) && rule.is_well_formed())
		.collect();
	rules.sort_by_key(|rule| (rule.order == 0, rule.order));
	rules
}

/// Applies a fixed, ordered rule set to annotation lines.
#[derive(Debug, Clone)]
pub struct Combiner {
	types: Arc<AnnotationTypes>,
	rules: Vec<CombinationRule>,
}

impl Combiner {
	/// Snapshots the applicable rules of `types`.
	pub fn new(types: Arc<AnnotationTypes>) -> Self {
		let rules = select_applicable_rules(&types).into_iter().cloned().collect();
		Self { types, rules }
	}

	pub fn types(&self) -> &Arc<AnnotationTypes> {
		&self.types
	}

	/// Rules in the order they are attempted.
	pub fn rules(&self) -> &[CombinationRule] {
		&self.rules
	}

	/// Merges `raw` into displayed entries.
	///
	/// `preferred` names the line's previously active descriptor; the entry
	/// that ends up holding it is reported in [`Combination::preferred`].
	/// With combination switched off, visible descriptors pass through as is.
	pub fn apply(
		&self,
		raw: &[Arc<AnnotationDescriptor>],
		preferred: Option<AnnotationId>,
	) -> Combination {
		let mut entries = Vec::new();
		let mut combined_used = FxHashSet::default();
		let mut pool: Vec<&Arc<AnnotationDescriptor>> = raw.iter().collect();

		if self.types.combine() {
			for rule in &self.rules {
				let Some(matched) = match_rule(rule, &pool) else {
					continue;
				};

				let members: Vec<Arc<AnnotationDescriptor>> =
					matched.iter().map(|&slot| Arc::clone(pool[slot])).collect();
				combined_used.extend(members.iter().map(|m| m.id()));

				let mut consumed = matched;
				consumed.sort_unstable();
				for slot in consumed.into_iter().rev() {
					pool.remove(slot);
				}

				entries.push(Entry::Combined(CombinedAnnotation::new(
					rule.result_type.clone(),
					members,
					self.types.description_of(&rule.result_type),
				)));
			}
		}

		entries.extend(
			pool.into_iter()
				.filter(|d| self.types.is_visible(d))
				.map(|d| Entry::Descriptor(Arc::clone(d))),
		);
		let preferred =
			preferred.and_then(|id| entries.iter().position(|entry| entry.contains(id)));

		Combination {
			entries,
			combined_used,
			preferred,
		}
	}
}

/// Matches a whole rule against the pool, returning matched slots in member order.
fn match_rule(rule: &CombinationRule, pool: &[&Arc<AnnotationDescriptor>]) -> Option<Matches> {
	let mut claimed = Matches::new();
	let mut valid_optionals = 0u32;

	for member in &rule.members {
		let hits = match_member(member, pool, &claimed);
		if hits.is_empty() {
			if member.optional {
				continue;
			}
			return None;
		}
		if member.optional {
			valid_optionals += 1;
		}
		claimed.extend(hits);
	}

	if valid_optionals < rule.minimum_optionals || claimed.is_empty() {
		return None;
	}
	Some(claimed)
}

/// Matches one member against unclaimed pool slots; empty means unsatisfied.
fn match_member(
	member: &CombinationMember,
	pool: &[&Arc<AnnotationDescriptor>],
	claimed: &[usize],
) -> Matches {
	let mut candidates = pool
		.iter()
		.enumerate()
		.filter(|(slot, d)| !claimed.contains(slot) && *d.type_id() == member.type_id)
		.map(|(slot, _)| slot);

	if member.minimum_count == 0 {
		let Some(first) = candidates.next() else {
			return Matches::new();
		};
		let mut hits = Matches::new();
		hits.push(first);
		if member.absorb_all {
			hits.extend(candidates);
		}
		return hits;
	}

	// A counted member takes every match on the line once the count is met.
	let hits: Matches = candidates.collect();
	if hits.len() < member.minimum_count as usize {
		return Matches::new();
	}
	hits
}
