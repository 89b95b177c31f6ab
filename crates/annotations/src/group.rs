//! Annotations sharing one line.

use std::sync::Arc;

use marginalia_primitives::{AnchorHandle, LineIndex};

use crate::combine::Combiner;
use crate::descriptor::{AnnotationDescriptor, AnnotationId, Entry};

/// Every descriptor anchored to one line, plus what the line displays.
///
/// `raw` keeps insertion order. `visible` is recomputed by [`Self::refresh`]
/// and sorted by priority. `active` indexes into `visible`.
#[derive(Debug, Clone)]
pub struct LineAnnotationGroup {
	pub(crate) line: LineIndex,
	raw: Vec<Arc<AnnotationDescriptor>>,
	visible: Vec<Entry>,
	active: Option<usize>,
	/// Descriptor explicitly activated; survives refreshes while it stays visible.
	pinned: Option<AnnotationId>,
}

impl LineAnnotationGroup {
	pub(crate) fn new(line: LineIndex) -> Self {
		Self {
			line,
			raw: Vec::new(),
			visible: Vec::new(),
			active: None,
			pinned: None,
		}
	}

	/// Line this group occupied at the last re-derivation.
	pub fn line(&self) -> LineIndex {
		self.line
	}

	/// Descriptors in insertion order.
	pub fn raw(&self) -> &[Arc<AnnotationDescriptor>] {
		&self.raw
	}

	/// Displayed entries, most urgent first.
	pub fn visible(&self) -> &[Entry] {
		&self.visible
	}

	pub fn active(&self) -> Option<&Entry> {
		self.active.and_then(|idx| self.visible.get(idx))
	}

	/// Visible entries other than the active one.
	pub fn passive(&self) -> impl Iterator<Item = &Entry> {
		self.visible
			.iter()
			.enumerate()
			.filter(move |(idx, _)| Some(*idx) != self.active)
			.map(|(_, entry)| entry)
	}

	/// Number of visible entries.
	pub fn count(&self) -> usize {
		self.visible.len()
	}

	pub fn is_empty(&self) -> bool {
		self.raw.is_empty()
	}

	pub fn contains(&self, id: AnnotationId) -> bool {
		self.raw.iter().any(|d| d.id() == id)
	}

	/// Returns true if any descriptor still references `anchor`.
	pub fn references_anchor(&self, anchor: AnchorHandle) -> bool {
		self.raw.iter().any(|d| d.anchor() == Some(anchor))
	}

	/// Visible entry of `type_name`, falling back to a raw descriptor of it.
	pub fn entry_of_type(&self, type_name: &str) -> Option<Entry> {
		self.visible
			.iter()
			.find(|entry| entry.type_id().as_str() == type_name)
			.cloned()
			.or_else(|| {
				self.raw
					.iter()
					.find(|d| d.type_id().as_str() == type_name)
					.map(|d| Entry::Descriptor(Arc::clone(d)))
			})
	}

	pub(crate) fn push(&mut self, descriptor: Arc<AnnotationDescriptor>) {
		self.raw.push(descriptor);
	}

	pub(crate) fn remove(&mut self, id: AnnotationId) -> Option<Arc<AnnotationDescriptor>> {
		let idx = self.raw.iter().position(|d| d.id() == id)?;
		if self.pinned == Some(id) {
			self.pinned = None;
		}
		Some(self.raw.remove(idx))
	}

	/// Removes and returns every descriptor for which `keep` is false.
	pub(crate) fn split_off(
		&mut self,
		mut keep: impl FnMut(&AnnotationDescriptor) -> bool,
	) -> Vec<Arc<AnnotationDescriptor>> {
		let (kept, moved) = std::mem::take(&mut self.raw)
			.into_iter()
			.partition(|d| keep(d));
		self.raw = kept;
		if let Some(pinned) = self.pinned
			&& !self.contains(pinned)
		{
			self.pinned = None;
		}
		moved
	}

	/// Moves all of `other`'s descriptors to the end of this group.
	pub(crate) fn absorb(&mut self, other: LineAnnotationGroup) {
		self.raw.extend(other.raw);
		if self.pinned.is_none() {
			self.pinned = other.pinned;
		}
	}

	/// Recomputes the visible entries and the active one.
	///
	/// The first entry becomes active unless an explicitly activated
	/// descriptor is still shown, alone or inside a combination.
	pub fn refresh(&mut self, combiner: &Combiner) {
		let mut entries = combiner.apply(&self.raw, self.pinned).entries;
		entries.sort_by_key(Entry::priority);

		let pinned_idx = self
			.pinned
			.and_then(|id| entries.iter().position(|entry| entry.contains(id)));
		if pinned_idx.is_none() {
			self.pinned = None;
		}

		self.active = pinned_idx.or(if entries.is_empty() { None } else { Some(0) });
		self.visible = entries;
	}

	/// Makes the entry showing `id` active.
	///
	/// Returns whether the active entry changed.
	pub(crate) fn activate(&mut self, id: AnnotationId) -> bool {
		let Some(idx) = self.visible.iter().position(|entry| entry.contains(id)) else {
			return false;
		};
		self.pinned = Some(id);
		if self.active == Some(idx) {
			return false;
		}
		self.active = Some(idx);
		true
	}

	/// Cycles the active entry forward, wrapping around.
	///
	/// A line with at most one visible entry is left untouched.
	pub(crate) fn activate_next(&mut self) -> Option<&Entry> {
		if self.visible.len() > 1 {
			let next = self.active.map_or(0, |idx| (idx + 1) % self.visible.len());
			self.active = Some(next);
			self.pinned = Some(self.visible[next].first().id());
		}
		self.active()
	}
}
