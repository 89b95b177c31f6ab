use marginalia_primitives::LineIndex;

/// Consumer of index change events, typically the gutter.
///
/// Events are delivered synchronously before the mutating call returns and
/// after the index lock is released, so handlers may query the index.
pub trait ChangeNotifier: Send + Sync {
	/// Annotations on `line` changed.
	fn line_changed(&self, line: LineIndex);

	/// Annotations may have changed anywhere.
	fn all_changed(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Change {
	Line(LineIndex),
	All,
}

/// Changes queued under the index lock, flushed once it is released.
#[derive(Debug, Default)]
pub(crate) struct PendingChanges {
	changes: Vec<Change>,
}

impl PendingChanges {
	pub(crate) fn line(&mut self, line: LineIndex) {
		if !self.changes.contains(&Change::Line(line)) {
			self.changes.push(Change::Line(line));
		}
	}

	pub(crate) fn all(&mut self) {
		self.changes.push(Change::All);
	}

	/// Drains queued changes; a pending full change subsumes line changes.
	pub(crate) fn take(&mut self) -> Vec<Change> {
		let changes = std::mem::take(&mut self.changes);
		if changes.contains(&Change::All) {
			vec![Change::All]
		} else {
			changes
		}
	}
}
