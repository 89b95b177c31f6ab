//! Per-document registry of line annotations.
//!
//! # Mental Model
//!
//! [`AnnotationIndex`] owns one [`LineAnnotationGroup`] per annotated line and
//! a line-ordered view over them. Descriptors are tied to the document through
//! anchors; the index never trusts a stored line number across an edit.
//! Line-shift events only flag the layout stale, and the next call re-derives
//! every group's line from its anchors before answering.
//!
//! Every operation runs under one mutex. Change notifications are queued
//! while it is held and delivered after it is released, so a
//! [`ChangeNotifier`] may query the index from inside its callback.
//!
//! # Invariants
//!
//! - The line-ordered view is sorted and matches the stored groups one to one.
//!   - Enforced in: `IndexState::group_for_line`, `IndexState::remove`, `IndexState::resync`.
//!   - Tested by: `invariants::test_layout_stays_consistent`
//!   - Failure symptom: lookups miss annotated lines or return the wrong group.
//! - No stored group is empty.
//!   - Enforced in: `IndexState::remove`.
//!   - Tested by: `invariants::test_no_empty_groups`
//!   - Failure symptom: gutter draws a blank marker on a line.
//! - Each anchor is released exactly once, when its last descriptor goes.
//!   - Enforced in: `IndexState::remove` (per-anchor reference counts).
//!   - Tested by: `invariants::test_shared_anchor_released_once`
//!   - Failure symptom: leaked anchors or a double release in the document.
//! - Dropping the index releases every anchor it still holds.
//!   - Enforced in: `AnnotationIndex::drop`.
//!   - Tested by: `tests::test_dropped_index_is_pruned_from_document`
//!   - Failure symptom: the document accumulates dead anchors.
//! - A failed `add` leaves nothing behind.
//!   - Enforced in: `IndexState::add` (anchor created before any mutation).
//!   - Tested by: `tests::test_out_of_bounds_add_leaves_no_state`
//!   - Failure symptom: half-registered annotations after an out-of-range add.

mod lookup;
mod state;

use std::sync::Arc;

use marginalia_primitives::{AnchorHandle, AnchorSource, LineIndex, LineShiftListener};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use self::state::IndexState;
use crate::descriptor::{AnnotationDescriptor, AnnotationId, Entry};
use crate::error::Result;
use crate::group::LineAnnotationGroup;
use crate::notify::{Change, ChangeNotifier};
use crate::types::TypeRegistry;

/// Annotations of one document, grouped by line.
pub struct AnnotationIndex {
	source: Arc<dyn AnchorSource>,
	registry: Arc<TypeRegistry>,
	state: Mutex<IndexState>,
	notifiers: RwLock<Vec<Arc<dyn ChangeNotifier>>>,
}

impl std::fmt::Debug for AnnotationIndex {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut s = f.debug_struct("AnnotationIndex");
		match self.state.try_lock() {
			Some(state) => s
				.field("annotations", &state.by_id.len())
				.field("lines", &state.groups.len())
				.field("stale", &state.stale),
			None => s.field("state", &"<locked>"),
		};
		s.field("notifiers", &self.notifiers.read().len()).finish()
	}
}

impl AnnotationIndex {
	/// Creates an empty index over `source`, using the registry's current types.
	pub fn new(source: Arc<dyn AnchorSource>, registry: Arc<TypeRegistry>) -> Self {
		let state = IndexState::new(registry.load());
		Self {
			source,
			registry,
			state: Mutex::new(state),
			notifiers: RwLock::new(Vec::new()),
		}
	}

	/// Registers a notifier for subsequent changes.
	pub fn subscribe(&self, notifier: Arc<dyn ChangeNotifier>) {
		self.notifiers.write().push(notifier);
	}

	/// Runs `f` on re-derived state, then flushes queued notifications.
	fn with_state<R>(&self, f: impl FnOnce(&mut IndexState, &dyn AnchorSource) -> R) -> R {
		let (result, changes) = {
			let mut state = self.state.lock();
			state.resync(&*self.source);
			let result = f(&mut state, &*self.source);
			(result, state.pending.take())
		};
		self.dispatch(changes);
		result
	}

	fn dispatch(&self, changes: Vec<Change>) {
		if changes.is_empty() {
			return;
		}
		let notifiers = self.notifiers.read().clone();
		for change in changes {
			for notifier in &notifiers {
				match change {
					Change::Line(line) => notifier.line_changed(line),
					Change::All => notifier.all_changed(),
				}
			}
		}
	}

	fn with_group<R>(
		&self,
		line: LineIndex,
		f: impl FnOnce(&LineAnnotationGroup) -> R,
	) -> Option<R> {
		self.with_state(|state, _| state.group_at(line).map(f))
	}

	/// Registers `descriptor` under a fresh anchor at its offset.
	///
	/// # Errors
	///
	/// Returns [`crate::IndexError::AnchorCreationFailed`] if the offset lies
	/// outside the document. Nothing is registered in that case.
	pub fn add(&self, descriptor: AnnotationDescriptor) -> Result<AnnotationId> {
		self.with_state(|state, source| state.add(source, descriptor))
	}

	/// Unregisters `id`. Unknown or already removed ids are ignored.
	pub fn remove(&self, id: AnnotationId) {
		self.with_state(|state, source| state.remove(source, id));
	}

	/// Active entry of the line holding `anchor`, if that entry is anchored there.
	pub fn active_annotation_for_anchor(&self, anchor: AnchorHandle) -> Option<Entry> {
		self.with_state(|state, _| {
			let gid = state.by_anchor.get(&anchor)?.group;
			let active = state.storage.get(&gid)?.active()?;
			(active.anchor() == Some(anchor)).then(|| active.clone())
		})
	}

	/// The entry shown for `line`.
	pub fn active_annotation_for_line(&self, line: LineIndex) -> Option<Entry> {
		self.with_group(line, |group| group.active().cloned()).flatten()
	}

	/// Visible entries of `line` other than the active one.
	pub fn passive_annotations_for_line(&self, line: LineIndex) -> Option<Vec<Entry>> {
		self.with_group(line, |group| group.passive().cloned().collect())
	}

	/// Every visible entry of `line`, active first.
	pub fn visible_annotations_for_line(&self, line: LineIndex) -> Vec<Entry> {
		self.with_group(line, |group| {
			group
				.active()
				.into_iter()
				.chain(group.passive())
				.cloned()
				.collect()
		})
		.unwrap_or_default()
	}

	/// Number of visible entries on `line`.
	pub fn count_for_line(&self, line: LineIndex) -> u32 {
		self.with_group(line, |group| u32::try_from(group.count()).unwrap_or(u32::MAX))
			.unwrap_or(0)
	}

	/// Entry of `type_name` on `line`, visible or not.
	pub fn annotation_of_type(&self, line: LineIndex, type_name: &str) -> Option<Entry> {
		self.with_group(line, |group| group.entry_of_type(type_name)).flatten()
	}

	/// Smallest annotated line at or after `line`.
	pub fn next_line_with_annotation(&self, line: LineIndex) -> Option<LineIndex> {
		self.with_state(|state, _| state.next_line(line))
	}

	/// Largest annotated line at or before `line`.
	pub fn prev_line_with_annotation(&self, line: LineIndex) -> Option<LineIndex> {
		self.with_state(|state, _| state.prev_line(line))
	}

	/// All annotated lines in ascending order.
	pub fn annotated_lines(&self) -> Vec<LineIndex> {
		self.with_state(|state, _| state.groups.iter().map(|&(line, _)| line).collect())
	}

	/// Returns true if `line` shows more than one entry and can be cycled.
	pub fn needs_cycle_button(&self, line: LineIndex) -> bool {
		self.with_group(line, |group| group.count() > 1).unwrap_or(false)
	}

	/// Returns true if any line can be cycled.
	pub fn has_cycle_buttons(&self) -> bool {
		self.with_state(|state, _| state.storage.values().any(|group| group.count() > 1))
	}

	/// Makes the entry showing `id` active on its line.
	///
	/// Returns whether the active entry changed.
	pub fn activate(&self, id: AnnotationId) -> bool {
		self.with_state(|state, _| state.activate(id))
	}

	/// Advances the active entry of `line`, wrapping around.
	pub fn activate_next_on_line(&self, line: LineIndex) -> Option<Entry> {
		self.with_state(|state, _| state.activate_next(line))
	}

	/// Copy of the registered descriptor `id`.
	pub fn descriptor(&self, id: AnnotationId) -> Option<AnnotationDescriptor> {
		self.with_state(|state, _| {
			state
				.group_of(id)?
				.raw()
				.iter()
				.find(|d| d.id() == id)
				.map(|d| AnnotationDescriptor::clone(d))
		})
	}

	/// Line the annotation `id` currently sits on.
	pub fn line_of(&self, id: AnnotationId) -> Option<LineIndex> {
		self.with_state(|state, _| state.group_of(id).map(LineAnnotationGroup::line))
	}

	/// Number of registered descriptors.
	pub fn len(&self) -> usize {
		self.state.lock().by_id.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Re-reads annotation types from the registry and refreshes every line.
	pub fn on_rule_config_changed(&self) {
		let types = self.registry.load();
		debug!(types = types.len(), combine = types.combine(), "annotation types reloaded");
		self.with_state(|state, _| state.reconfigure(types));
	}

	/// Line breaks were inserted somewhere in the document.
	pub fn on_lines_inserted(&self, count: usize) {
		self.invalidate_lines(count);
	}

	/// Line breaks were removed somewhere in the document.
	pub fn on_lines_removed(&self, count: usize) {
		self.invalidate_lines(count);
	}

	fn invalidate_lines(&self, count: usize) {
		if count == 0 {
			return;
		}
		let changes = {
			let mut state = self.state.lock();
			state.invalidate_lines();
			state.pending.take()
		};
		self.dispatch(changes);
	}

	#[cfg(test)]
	fn inspect<R>(&self, f: impl FnOnce(&IndexState) -> R) -> R {
		self.with_state(|state, _| f(state))
	}
}

impl Drop for AnnotationIndex {
	fn drop(&mut self) {
		let state = self.state.get_mut();
		for anchor in state.by_anchor.keys() {
			self.source.release_anchor(*anchor);
		}
	}
}

impl LineShiftListener for AnnotationIndex {
	fn lines_inserted(&self, count: usize) {
		self.on_lines_inserted(count);
	}

	fn lines_removed(&self, count: usize) {
		self.on_lines_removed(count);
	}
}

#[cfg(test)]
mod invariants;
