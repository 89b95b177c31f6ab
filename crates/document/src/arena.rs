//! Generation-checked anchor storage.

use marginalia_primitives::{AnchorHandle, Bias, CharIdx, CharLen};
use slab::Slab;

#[derive(Debug, Clone, Copy)]
struct AnchorSlot {
	pos: CharIdx,
	bias: Bias,
	generation: u64,
}

/// Anchor positions keyed by slot, with a generation per allocation.
///
/// Slots are recycled by the slab but generations are not, so a handle to a
/// released anchor is rejected instead of resolving to its successor.
/// Handles carry the full slab key and a 64-bit generation; neither is
/// narrowed or wrapped.
#[derive(Debug, Default)]
pub(crate) struct AnchorArena {
	slots: Slab<AnchorSlot>,
	next_generation: u64,
}

impl AnchorArena {
	pub(crate) fn insert(&mut self, pos: CharIdx, bias: Bias) -> AnchorHandle {
		let generation = self.next_generation;
		self.next_generation += 1;
		let slot = self.slots.insert(AnchorSlot {
			pos,
			bias,
			generation,
		});
		AnchorHandle::new(slot, generation)
	}

	pub(crate) fn remove(&mut self, handle: AnchorHandle) -> bool {
		if self.get(handle).is_none() {
			return false;
		}
		self.slots.remove(handle.slot());
		true
	}

	pub(crate) fn position(&self, handle: AnchorHandle) -> Option<CharIdx> {
		self.get(handle).map(|slot| slot.pos)
	}

	pub(crate) fn len(&self) -> usize {
		self.slots.len()
	}

	fn get(&self, handle: AnchorHandle) -> Option<&AnchorSlot> {
		self.slots
			.get(handle.slot())
			.filter(|slot| slot.generation == handle.generation())
	}

	/// Maps every anchor through the replacement of `[from, to)` by `inserted` chars.
	///
	/// Anchors inside the removed range collapse onto `from` and then follow
	/// their bias relative to the inserted text.
	pub(crate) fn map_replace(&mut self, from: CharIdx, to: CharIdx, inserted: CharLen) {
		let removed = to - from;
		for (_, slot) in self.slots.iter_mut() {
			slot.pos = map_pos(slot.pos, slot.bias, from, to, removed, inserted);
		}
	}
}

fn map_pos(
	pos: CharIdx,
	bias: Bias,
	from: CharIdx,
	to: CharIdx,
	removed: CharLen,
	inserted: CharLen,
) -> CharIdx {
	if pos < from {
		pos
	} else if pos > to || (pos == to && removed > 0) {
		pos - removed + inserted
	} else {
		match bias {
			Bias::Left => from,
			Bias::Right => from + inserted,
		}
	}
}
