//! Machine-checkable invariants of the annotation index.
//!
//! [`check_consistency`] validates the whole bookkeeping graph and is shared
//! with the behavior and property tests in `tests.rs`.

use std::sync::Arc;

use marginalia_document::Document;
use marginalia_primitives::{AnchorHandle, AnchorSource, CharIdx, LineIndex, OutOfBounds};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::AnnotationIndex;
use super::state::IndexState;
use crate::descriptor::AnnotationDescriptor;
use crate::types::{AnnotationType, AnnotationTypes, TypeRegistry};

/// Checks every structural invariant of `state` against `source`.
pub(super) fn check_consistency(
	state: &IndexState,
	source: &dyn AnchorSource,
) -> Result<(), String> {
	if !state.groups.windows(2).all(|w| w[0].0 < w[1].0) {
		return Err(format!("line order not strictly sorted: {:?}", state.groups));
	}
	if state.groups.len() != state.storage.len() {
		return Err(format!(
			"{} ordered groups but {} stored",
			state.groups.len(),
			state.storage.len()
		));
	}

	let mut descriptors = 0;
	for &(line, gid) in &state.groups {
		let group = state
			.storage
			.get(&gid)
			.ok_or_else(|| format!("{gid:?} on line {line} missing from storage"))?;
		if group.line() != line {
			return Err(format!("{gid:?} stored at {} but ordered at {line}", group.line()));
		}
		if group.is_empty() {
			return Err(format!("empty group on line {line}"));
		}
		if !state.stale {
			for d in group.raw() {
				let live = d.anchor().and_then(|a| source.anchor_line(a));
				if live != Some(line) {
					return Err(format!("{} lives on {live:?} but is grouped on {line}", d.id()));
				}
			}
		}
		descriptors += group.raw().len();
	}

	if descriptors != state.by_id.len() {
		return Err(format!(
			"{descriptors} grouped descriptors but {} registered ids",
			state.by_id.len()
		));
	}

	for (anchor, anchor_ref) in &state.by_anchor {
		let group = state
			.storage
			.get(&anchor_ref.group)
			.ok_or_else(|| format!("{anchor:?} points at a missing group"))?;
		let refs = group
			.raw()
			.iter()
			.filter(|d| d.anchor() == Some(*anchor))
			.count();
		if refs != anchor_ref.refs as usize {
			return Err(format!("{anchor:?} counts {} refs, group holds {refs}", anchor_ref.refs));
		}
		if refs == 0 {
			return Err(format!("{anchor:?} tracked without references"));
		}
	}

	for (id, anchor) in &state.by_id {
		let holds = state.group_of(*id).is_some_and(|group| {
			group
				.raw()
				.iter()
				.any(|d| d.id() == *id && d.anchor() == Some(*anchor))
		});
		if !holds {
			return Err(format!("{id} is not held by the group of its anchor"));
		}
	}

	Ok(())
}

/// Anchor source that hands out one shared anchor per offset.
///
/// Lines are ten characters wide. Releases are recorded so tests can detect
/// leaks and double releases.
#[derive(Debug, Default)]
pub(super) struct SharedAnchors {
	pub(super) len: CharIdx,
	inner: Mutex<SharedInner>,
}

#[derive(Debug, Default)]
struct SharedInner {
	live: FxHashMap<CharIdx, AnchorHandle>,
	released: Vec<AnchorHandle>,
	next_slot: usize,
}

impl SharedAnchors {
	pub(super) fn new(len: CharIdx) -> Self {
		Self {
			len,
			inner: Mutex::default(),
		}
	}

	pub(super) fn live(&self) -> usize {
		self.inner.lock().live.len()
	}

	pub(super) fn released(&self) -> Vec<AnchorHandle> {
		self.inner.lock().released.clone()
	}

	fn offset_of(&self, handle: AnchorHandle) -> Option<CharIdx> {
		let inner = self.inner.lock();
		inner
			.live
			.iter()
			.find(|(_, live)| **live == handle)
			.map(|(&offset, _)| offset)
	}
}

impl AnchorSource for SharedAnchors {
	fn create_anchor(&self, offset: CharIdx) -> Result<AnchorHandle, OutOfBounds> {
		if offset > self.len {
			return Err(OutOfBounds {
				offset,
				len: self.len,
			});
		}
		let mut inner = self.inner.lock();
		if let Some(&handle) = inner.live.get(&offset) {
			return Ok(handle);
		}
		inner.next_slot += 1;
		let handle = AnchorHandle::new(inner.next_slot, 0);
		inner.live.insert(offset, handle);
		Ok(handle)
	}

	fn release_anchor(&self, handle: AnchorHandle) {
		let mut inner = self.inner.lock();
		inner.live.retain(|_, live| *live != handle);
		inner.released.push(handle);
	}

	fn anchor_line(&self, handle: AnchorHandle) -> Option<LineIndex> {
		self.offset_of(handle).map(|offset| offset / 10)
	}

	fn anchor_offset(&self, handle: AnchorHandle) -> Option<CharIdx> {
		self.offset_of(handle)
	}
}

fn registry() -> Arc<TypeRegistry> {
	Arc::new(TypeRegistry::new(
		AnnotationTypes::new()
			.with_type(AnnotationType::new("error").priority(1))
			.with_type(AnnotationType::new("bookmark").priority(5)),
	))
}

pub(super) fn assert_consistent(index: &AnnotationIndex) {
	let source = Arc::clone(&index.source);
	index.inspect(|state| {
		if let Err(err) = check_consistency(state, &*source) {
			panic!("index inconsistent: {err}");
		}
	});
}

/// Invariant: the line-ordered view MUST stay sorted and match stored groups
/// one to one across adds, removes and edits.
#[cfg_attr(test, test)]
pub(crate) fn test_layout_stays_consistent() {
	let doc = Arc::new(Document::new("a\nb\nc\nd\ne\nf\n"));
	let index = AnnotationIndex::new(doc.clone(), registry());

	let mut ids = Vec::new();
	for offset in [10, 0, 6, 2, 8] {
		ids.push(index.add(AnnotationDescriptor::new("error", offset)).unwrap());
		assert_consistent(&index);
	}
	assert_eq!(index.annotated_lines(), vec![0, 1, 3, 4, 5]);

	doc.insert(0, "x\ny\n").unwrap();
	index.on_lines_inserted(2);
	assert_consistent(&index);
	assert_eq!(index.annotated_lines(), vec![2, 3, 5, 6, 7]);

	for id in ids.drain(..).rev() {
		index.remove(id);
		assert_consistent(&index);
	}
	assert!(index.annotated_lines().is_empty());
	assert_eq!(doc.anchor_count(), 0);
}

/// Invariant: a group whose last descriptor is removed MUST leave the index.
#[cfg_attr(test, test)]
pub(crate) fn test_no_empty_groups() {
	let doc = Arc::new(Document::new("one\ntwo\n"));
	let index = AnnotationIndex::new(doc, registry());

	let a = index.add(AnnotationDescriptor::new("error", 4)).unwrap();
	let b = index.add(AnnotationDescriptor::new("bookmark", 5)).unwrap();
	index.remove(a);
	assert_eq!(index.count_for_line(1), 1);
	index.remove(b);

	assert_eq!(index.count_for_line(1), 0);
	assert!(index.inspect(|state| state.storage.is_empty() && state.groups.is_empty()));
	assert_consistent(&index);
}

/// Invariant: an anchor shared by several descriptors MUST be released once,
/// when the last of them is removed.
#[cfg_attr(test, test)]
pub(crate) fn test_shared_anchor_released_once() {
	let source = Arc::new(SharedAnchors::new(100));
	let index = AnnotationIndex::new(source.clone(), registry());

	let a = index.add(AnnotationDescriptor::new("error", 42)).unwrap();
	let b = index.add(AnnotationDescriptor::new("bookmark", 42)).unwrap();
	let anchor = index.descriptor(a).and_then(|d| d.anchor()).unwrap();
	assert_eq!(index.descriptor(b).and_then(|d| d.anchor()), Some(anchor));
	assert_consistent(&index);

	index.remove(a);
	assert!(source.released().is_empty());
	assert_eq!(source.live(), 1);
	assert_consistent(&index);

	index.remove(b);
	index.remove(b);
	assert_eq!(source.released(), vec![anchor]);
	assert_eq!(source.live(), 0);
	assert_consistent(&index);
}
