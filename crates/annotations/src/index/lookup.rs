//! Line lookup over the sorted group sequence.
//!
//! # Role
//!
//! Gutter painting walks lines top to bottom. The locality cache remembers
//! the last hit so that walk costs O(1) per line instead of a binary search.
//!
//! # Invariants
//!
//! - The cache is advisory: a cached slot is trusted only while `groups[slot]`
//!   still holds the cached `(line, group)` pair (see `tests::test_stale_cache_is_ignored`).
//! - Every lookup that misses clears the cache.

use marginalia_primitives::LineIndex;

use super::state::{GroupId, IndexState};

/// Last successful lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LocalityCache {
	pub(crate) line: LineIndex,
	pub(crate) group: GroupId,
	pub(crate) slot: usize,
}

/// How a lookup was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup {
	/// The cache named the line itself.
	Cached,
	/// The entry right after the cached one matched.
	Sequential,
	/// Binary search found the line.
	Searched,
	/// No group on the line.
	Missed,
}

impl IndexState {
	fn valid_cache(&self) -> Option<LocalityCache> {
		self.cache
			.filter(|c| self.groups.get(c.slot) == Some(&(c.line, c.group)))
	}

	fn remember(&mut self, slot: usize) {
		let (line, group) = self.groups[slot];
		self.cache = Some(LocalityCache { line, group, slot });
	}

	/// Finds the slot of the group on `line`.
	pub(crate) fn locate(&mut self, line: LineIndex) -> (Option<usize>, Lookup) {
		if let Some(cache) = self.valid_cache() {
			if cache.line == line {
				return (Some(cache.slot), Lookup::Cached);
			}
			if cache.line < line {
				match self.groups.get(cache.slot + 1) {
					Some(&(next, _)) if next == line => {
						self.remember(cache.slot + 1);
						return (Some(cache.slot + 1), Lookup::Sequential);
					}
					// Nothing sits between the cached line and its successor.
					Some(&(next, _)) if next > line => {
						self.cache = None;
						return (None, Lookup::Missed);
					}
					None => {
						self.cache = None;
						return (None, Lookup::Missed);
					}
					Some(_) => {}
				}
			}
		}

		match self.groups.binary_search_by_key(&line, |&(l, _)| l) {
			Ok(slot) => {
				self.remember(slot);
				(Some(slot), Lookup::Searched)
			}
			Err(_) => {
				self.cache = None;
				(None, Lookup::Missed)
			}
		}
	}

	/// Smallest annotated line at or after `line`.
	pub(crate) fn next_line(&mut self, line: LineIndex) -> Option<LineIndex> {
		if let Some(cache) = self.valid_cache() {
			if cache.line == line {
				return Some(line);
			}
			if cache.line < line {
				match self.groups.get(cache.slot + 1) {
					Some(&(next, _)) if next >= line => {
						if next == line {
							self.remember(cache.slot + 1);
						}
						return Some(next);
					}
					None => return None,
					Some(_) => {}
				}
			}
		}

		let pos = match self.groups.binary_search_by_key(&line, |&(l, _)| l) {
			Ok(slot) => {
				self.remember(slot);
				return Some(line);
			}
			Err(pos) => pos,
		};
		self.groups[pos..]
			.iter()
			.map(|&(l, _)| l)
			.find(|&l| l >= line)
	}

	/// Largest annotated line at or before `line`.
	pub(crate) fn prev_line(&self, line: LineIndex) -> Option<LineIndex> {
		let pos = self.groups.partition_point(|&(l, _)| l <= line);
		pos.checked_sub(1).map(|slot| self.groups[slot].0)
	}
}
