//! Index bookkeeping guarded by the index mutex.

use std::sync::Arc;

use marginalia_primitives::{AnchorHandle, AnchorSource, LineIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use super::lookup::LocalityCache;
use crate::combine::Combiner;
use crate::descriptor::{AnnotationDescriptor, AnnotationId, Entry};
use crate::error::{IndexError, Result};
use crate::group::LineAnnotationGroup;
use crate::notify::PendingChanges;
use crate::types::AnnotationTypes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct GroupId(u64);

/// Owning group of an anchor and how many descriptors reference it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AnchorRef {
	pub(crate) group: GroupId,
	pub(crate) refs: u32,
}

#[derive(Debug)]
pub(crate) struct IndexState {
	/// `(line, group)` sorted by line, one entry per stored group.
	pub(crate) groups: Vec<(LineIndex, GroupId)>,
	pub(crate) storage: FxHashMap<GroupId, LineAnnotationGroup>,
	pub(crate) by_anchor: FxHashMap<AnchorHandle, AnchorRef>,
	pub(crate) by_id: FxHashMap<AnnotationId, AnchorHandle>,
	pub(crate) cache: Option<LocalityCache>,
	/// Group lines may be out of date; set by line-shift notifications.
	pub(crate) stale: bool,
	pub(crate) combiner: Combiner,
	pub(crate) pending: PendingChanges,
	next_id: u64,
	next_group: u64,
}

impl IndexState {
	pub(crate) fn new(types: Arc<AnnotationTypes>) -> Self {
		Self {
			groups: Vec::new(),
			storage: FxHashMap::default(),
			by_anchor: FxHashMap::default(),
			by_id: FxHashMap::default(),
			cache: None,
			stale: false,
			combiner: Combiner::new(types),
			pending: PendingChanges::default(),
			next_id: 0,
			next_group: 0,
		}
	}

	pub(crate) fn group_at(&mut self, line: LineIndex) -> Option<&LineAnnotationGroup> {
		let (slot, _) = self.locate(line);
		let gid = self.groups[slot?].1;
		let group = self.storage.get(&gid);
		if group.is_none() {
			warn!(?gid, line, "sorted group missing from storage");
		}
		group
	}

	fn group_at_mut(&mut self, line: LineIndex) -> Option<&mut LineAnnotationGroup> {
		let (slot, _) = self.locate(line);
		let gid = self.groups[slot?].1;
		self.storage.get_mut(&gid)
	}

	/// Group owning the descriptor `id`.
	pub(crate) fn group_of(&self, id: AnnotationId) -> Option<&LineAnnotationGroup> {
		let anchor = self.by_id.get(&id)?;
		let Some(anchor_ref) = self.by_anchor.get(anchor) else {
			warn!(%id, ?anchor, "registered annotation has no anchor entry");
			return None;
		};
		self.storage.get(&anchor_ref.group)
	}

	fn slot_of(&self, gid: GroupId, line: LineIndex) -> Option<usize> {
		self.groups
			.binary_search_by_key(&line, |&(l, _)| l)
			.ok()
			.filter(|&slot| self.groups[slot].1 == gid)
	}

	/// Group on `line`, created and inserted in line order if missing.
	fn group_for_line(&mut self, line: LineIndex) -> GroupId {
		if let (Some(slot), _) = self.locate(line) {
			return self.groups[slot].1;
		}

		self.next_group += 1;
		let gid = GroupId(self.next_group);
		self.storage.insert(gid, LineAnnotationGroup::new(line));
		let pos = self.groups.partition_point(|&(l, _)| l < line);
		self.groups.insert(pos, (line, gid));
		self.cache = None;
		gid
	}

	/// Registers `descriptor` under a fresh anchor.
	pub(crate) fn add(
		&mut self,
		source: &dyn AnchorSource,
		mut descriptor: AnnotationDescriptor,
	) -> Result<AnnotationId> {
		let anchor = source.create_anchor(descriptor.offset())?;
		let Some(line) = source.anchor_line(anchor) else {
			source.release_anchor(anchor);
			warn!(?anchor, "fresh anchor does not resolve to a line");
			return Err(IndexError::InconsistentState("fresh anchor has no line"));
		};

		self.next_id += 1;
		let id = AnnotationId::new(self.next_id);
		descriptor.set_mark(id, anchor);

		let gid = match self.by_anchor.get(&anchor) {
			Some(existing) if self.storage.contains_key(&existing.group) => existing.group,
			_ => self.group_for_line(line),
		};
		let Some(group) = self.storage.get_mut(&gid) else {
			source.release_anchor(anchor);
			warn!(?gid, "group vanished while adding");
			return Err(IndexError::InconsistentState("group vanished while adding"));
		};
		group.push(Arc::new(descriptor));
		group.refresh(&self.combiner);
		let group_line = group.line;

		let anchor_ref = self.by_anchor.entry(anchor).or_insert(AnchorRef {
			group: gid,
			refs: 0,
		});
		anchor_ref.group = gid;
		anchor_ref.refs += 1;
		self.by_id.insert(id, anchor);

		self.pending.line(group_line);
		Ok(id)
	}

	/// Unregisters `id`; unknown ids are ignored.
	pub(crate) fn remove(&mut self, source: &dyn AnchorSource, id: AnnotationId) {
		let Some(anchor) = self.by_id.remove(&id) else {
			debug!(%id, "remove of unknown annotation ignored");
			return;
		};
		let Some(anchor_ref) = self.by_anchor.get_mut(&anchor) else {
			warn!(%id, ?anchor, "anchor of removed annotation is not tracked");
			return;
		};
		anchor_ref.refs = anchor_ref.refs.saturating_sub(1);
		let gid = anchor_ref.group;
		let release = anchor_ref.refs == 0;

		let Some(group) = self.storage.get_mut(&gid) else {
			warn!(%id, ?gid, "anchor points at a missing group");
			self.by_anchor.remove(&anchor);
			source.release_anchor(anchor);
			return;
		};
		let line = group.line;
		if group.remove(id).is_none() {
			warn!(%id, ?gid, "annotation missing from its group");
		}
		if release {
			debug_assert!(!group.references_anchor(anchor));
			self.by_anchor.remove(&anchor);
			source.release_anchor(anchor);
		}

		if group.is_empty() {
			self.storage.remove(&gid);
			match self.slot_of(gid, line) {
				Some(slot) => {
					self.groups.remove(slot);
				}
				None => warn!(?gid, line, "emptied group not found in line order"),
			}
			self.cache = None;
		} else {
			group.refresh(&self.combiner);
		}

		self.pending.line(line);
	}

	/// Marks the entry showing `id` active.
	pub(crate) fn activate(&mut self, id: AnnotationId) -> bool {
		let Some(anchor) = self.by_id.get(&id) else {
			debug!(%id, "activation of unknown annotation ignored");
			return false;
		};
		let Some(gid) = self.by_anchor.get(anchor).map(|r| r.group) else {
			warn!(%id, "registered annotation has no anchor entry");
			return false;
		};
		let Some(group) = self.storage.get_mut(&gid) else {
			warn!(%id, ?gid, "anchor points at a missing group");
			return false;
		};
		let changed = group.activate(id);
		if changed {
			self.pending.line(group.line);
		}
		changed
	}

	/// Cycles the active entry on `line`.
	pub(crate) fn activate_next(&mut self, line: LineIndex) -> Option<Entry> {
		let group = self.group_at_mut(line)?;
		let before = group.active().cloned();
		let after = group.activate_next().cloned();
		if after != before {
			self.pending.line(line);
		}
		after
	}

	/// Swaps in a new rule snapshot and refreshes every group.
	pub(crate) fn reconfigure(&mut self, types: Arc<AnnotationTypes>) {
		self.combiner = Combiner::new(types);
		for group in self.storage.values_mut() {
			group.refresh(&self.combiner);
		}
		self.pending.all();
	}

	/// Flags every group line as out of date.
	pub(crate) fn invalidate_lines(&mut self) {
		self.stale = true;
		self.cache = None;
		self.pending.all();
	}

	/// Re-derives group lines from live anchors if an edit invalidated them.
	///
	/// Descriptors whose anchors drifted onto another line move to that line's
	/// group; groups that collapsed onto the same line are merged, keeping the
	/// one that sorted first.
	pub(crate) fn resync(&mut self, source: &dyn AnchorSource) {
		if !self.stale {
			return;
		}
		self.stale = false;
		self.cache = None;

		let live_line =
			|d: &AnnotationDescriptor| d.anchor().and_then(|anchor| source.anchor_line(anchor));
		let mut touched = FxHashSet::default();
		let mut displaced = Vec::new();
		let mut entries = Vec::with_capacity(self.groups.len());

		for &(old_line, gid) in &self.groups {
			let Some(group) = self.storage.get_mut(&gid) else {
				warn!(?gid, old_line, "sorted group missing from storage");
				continue;
			};
			let head = group
				.raw()
				.first()
				.and_then(|d| live_line(d.as_ref()))
				.unwrap_or(old_line);
			let moved = group.split_off(|d| live_line(d).is_none_or(|l| l == head));
			if !moved.is_empty() {
				touched.insert(gid);
			}
			displaced.extend(
				moved
					.into_iter()
					.map(|d| (live_line(d.as_ref()).unwrap_or(head), d)),
			);
			group.line = head;
			entries.push((head, gid));
		}

		entries.sort_by_key(|&(line, _)| line);
		let mut merged: Vec<(LineIndex, GroupId)> = Vec::with_capacity(entries.len());
		for (line, gid) in entries {
			let target = merged
				.last()
				.filter(|&&(prev, _)| prev == line)
				.map(|&(_, target)| target);
			let Some(target) = target else {
				merged.push((line, gid));
				continue;
			};
			let Some(group) = self.storage.remove(&gid) else {
				continue;
			};
			for anchor in group.raw().iter().filter_map(|d| d.anchor()) {
				if let Some(anchor_ref) = self.by_anchor.get_mut(&anchor) {
					anchor_ref.group = target;
				}
			}
			if let Some(target_group) = self.storage.get_mut(&target) {
				target_group.absorb(group);
			}
			touched.remove(&gid);
			touched.insert(target);
		}
		self.groups = merged;

		for (line, descriptor) in displaced {
			let gid = self.group_for_line(line);
			if let Some(anchor) = descriptor.anchor()
				&& let Some(anchor_ref) = self.by_anchor.get_mut(&anchor)
			{
				anchor_ref.group = gid;
			}
			if let Some(group) = self.storage.get_mut(&gid) {
				group.push(descriptor);
			}
			touched.insert(gid);
		}

		for gid in touched {
			if let Some(group) = self.storage.get_mut(&gid) {
				group.refresh(&self.combiner);
			}
		}
		debug!(groups = self.groups.len(), "re-derived annotation lines");
	}
}
