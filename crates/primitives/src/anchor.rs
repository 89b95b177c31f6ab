use crate::position::{CharIdx, LineIndex};

/// Opaque reference to a document anchor.
///
/// An anchor is a position that the document keeps valid across edits. The
/// handle carries a generation so a handle to a released anchor never aliases
/// an anchor created later in the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorHandle {
	slot: usize,
	generation: u64,
}

impl AnchorHandle {
	/// Creates a handle from its raw parts.
	///
	/// Only anchor owners should mint handles.
	pub const fn new(slot: usize, generation: u64) -> Self {
		Self { slot, generation }
	}

	/// Returns the arena slot this handle points into.
	#[inline]
	pub const fn slot(self) -> usize {
		self.slot
	}

	/// Returns the generation the slot had when the anchor was created.
	#[inline]
	pub const fn generation(self) -> u64 {
		self.generation
	}
}

/// Bias determines how an anchor at an insertion point is mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bias {
	/// Anchor stays before text inserted at its position.
	Left,
	/// Anchor moves after text inserted at its position.
	#[default]
	Right,
}

/// Offset passed to an anchor owner lies outside the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("offset {offset} is out of bounds for document of {len} chars")]
pub struct OutOfBounds {
	/// The rejected offset.
	pub offset: CharIdx,
	/// Document length at the time of the request.
	pub len: CharIdx,
}

/// Owner of anchors: creates, resolves and releases them.
///
/// Resolving an unknown or released handle yields `None`; implementations
/// must never panic on a stale handle.
pub trait AnchorSource: Send + Sync {
	/// Allocates a fresh anchor at `offset`.
	fn create_anchor(&self, offset: CharIdx) -> Result<AnchorHandle, OutOfBounds>;

	/// Tells the owner the anchor is no longer referenced.
	fn release_anchor(&self, handle: AnchorHandle);

	/// Current line of the anchor, reflecting every edit applied so far.
	fn anchor_line(&self, handle: AnchorHandle) -> Option<LineIndex>;

	/// Current character offset of the anchor.
	fn anchor_offset(&self, handle: AnchorHandle) -> Option<CharIdx>;
}

/// Receives coarse line-shift notifications from a document.
pub trait LineShiftListener: Send + Sync {
	/// `count` line breaks were inserted.
	fn lines_inserted(&self, count: usize);

	/// `count` line breaks were removed.
	fn lines_removed(&self, count: usize);
}
