use std::sync::Weak;

use marginalia_primitives::{
	AnchorHandle, AnchorSource, Bias, CharIdx, LineIndex, LineShiftListener, OutOfBounds,
};
use parking_lot::{Mutex, RwLock};
use ropey::Rope;
use tracing::debug;

use crate::arena::AnchorArena;

/// Line-break bookkeeping for one committed edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditSummary {
	/// Line breaks added by the inserted text.
	pub lines_inserted: usize,
	/// Line breaks dropped with the removed text.
	pub lines_removed: usize,
}

#[derive(Debug, Default)]
struct DocState {
	text: Rope,
	anchors: AnchorArena,
}

/// A text buffer that owns anchors and keeps them valid across edits.
///
/// Listeners are held weakly; an index that subscribes and is later dropped
/// is pruned on the next edit.
#[derive(Default)]
pub struct Document {
	state: RwLock<DocState>,
	listeners: Mutex<Vec<Weak<dyn LineShiftListener>>>,
}

impl std::fmt::Debug for Document {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.read();
		f.debug_struct("Document")
			.field("len_chars", &state.text.len_chars())
			.field("len_lines", &state.text.len_lines())
			.field("anchors", &state.anchors.len())
			.finish()
	}
}

impl Document {
	/// Creates a document holding `text`.
	pub fn new(text: &str) -> Self {
		Self {
			state: RwLock::new(DocState {
				text: Rope::from_str(text),
				anchors: AnchorArena::default(),
			}),
			listeners: Mutex::new(Vec::new()),
		}
	}

	/// Returns a copy of the full text.
	pub fn text(&self) -> String {
		self.state.read().text.to_string()
	}

	/// Length of the document in characters.
	pub fn len_chars(&self) -> usize {
		self.state.read().text.len_chars()
	}

	/// Number of lines, including the empty line after a trailing newline.
	pub fn len_lines(&self) -> usize {
		self.state.read().text.len_lines()
	}

	/// Line containing `offset`.
	pub fn line_of(&self, offset: CharIdx) -> Result<LineIndex, OutOfBounds> {
		let state = self.state.read();
		let len = state.text.len_chars();
		if offset > len {
			return Err(OutOfBounds { offset, len });
		}
		Ok(state.text.char_to_line(offset))
	}

	/// Offset of the first character of `line`.
	pub fn line_start(&self, line: LineIndex) -> Option<CharIdx> {
		let state = self.state.read();
		(line < state.text.len_lines()).then(|| state.text.line_to_char(line))
	}

	/// Number of live anchors.
	pub fn anchor_count(&self) -> usize {
		self.state.read().anchors.len()
	}

	/// Registers a listener for line-shift notifications.
	pub fn subscribe(&self, listener: Weak<dyn LineShiftListener>) {
		self.listeners.lock().push(listener);
	}

	/// Creates an anchor at `offset` with an explicit bias.
	pub fn create_anchor_with_bias(
		&self,
		offset: CharIdx,
		bias: Bias,
	) -> Result<AnchorHandle, OutOfBounds> {
		let mut state = self.state.write();
		let len = state.text.len_chars();
		if offset > len {
			return Err(OutOfBounds { offset, len });
		}
		Ok(state.anchors.insert(offset, bias))
	}

	/// Inserts `text` at `at`.
	pub fn insert(&self, at: CharIdx, text: &str) -> Result<EditSummary, OutOfBounds> {
		self.replace(at, at, text)
	}

	/// Removes the characters in `[from, to)`.
	pub fn remove(&self, from: CharIdx, to: CharIdx) -> Result<EditSummary, OutOfBounds> {
		self.replace(from, to, "")
	}

	/// Replaces the characters in `[from, to)` with `text`.
	///
	/// Anchors are remapped under the write lock; listeners are notified only
	/// after the lock is released so they may query the document.
	pub fn replace(
		&self,
		from: CharIdx,
		to: CharIdx,
		text: &str,
	) -> Result<EditSummary, OutOfBounds> {
		let summary = {
			let mut state = self.state.write();
			let len = state.text.len_chars();
			if to > len {
				return Err(OutOfBounds { offset: to, len });
			}
			if from > to {
				return Err(OutOfBounds { offset: from, len: to });
			}

			let lines_removed = state.text.slice(from..to).len_lines() - 1;
			let inserted = Rope::from_str(text);
			let lines_inserted = inserted.len_lines() - 1;
			let inserted_chars = inserted.len_chars();

			state.text.remove(from..to);
			state.text.insert(from, text);
			state.anchors.map_replace(from, to, inserted_chars);

			EditSummary {
				lines_inserted,
				lines_removed,
			}
		};

		self.notify(summary);
		Ok(summary)
	}

	#[cfg(test)]
	pub(crate) fn listener_count(&self) -> usize {
		self.listeners.lock().len()
	}

	fn notify(&self, summary: EditSummary) {
		if summary.lines_inserted == 0 && summary.lines_removed == 0 {
			return;
		}

		let live: Vec<_> = {
			let mut listeners = self.listeners.lock();
			listeners.retain(|weak| weak.strong_count() > 0);
			listeners.iter().filter_map(Weak::upgrade).collect()
		};

		for listener in live {
			if summary.lines_removed > 0 {
				listener.lines_removed(summary.lines_removed);
			}
			if summary.lines_inserted > 0 {
				listener.lines_inserted(summary.lines_inserted);
			}
		}
	}
}

impl AnchorSource for Document {
	fn create_anchor(&self, offset: CharIdx) -> Result<AnchorHandle, OutOfBounds> {
		self.create_anchor_with_bias(offset, Bias::default())
	}

	fn release_anchor(&self, handle: AnchorHandle) {
		if !self.state.write().anchors.remove(handle) {
			debug!(?handle, "release of unknown anchor ignored");
		}
	}

	fn anchor_line(&self, handle: AnchorHandle) -> Option<LineIndex> {
		let state = self.state.read();
		let pos = state.anchors.position(handle)?;
		Some(state.text.char_to_line(pos))
	}

	fn anchor_offset(&self, handle: AnchorHandle) -> Option<CharIdx> {
		self.state.read().anchors.position(handle)
	}
}
