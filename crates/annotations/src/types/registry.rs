use std::sync::Arc;

use arc_swap::ArcSwap;

use super::AnnotationTypes;

/// Atomically published annotation type configuration.
///
/// Readers load the current snapshot without locking; a store swaps in a new
/// snapshot. Indexes sharing the registry pick up a store on their next
/// `on_rule_config_changed` call.
#[derive(Debug)]
pub struct TypeRegistry {
	current: ArcSwap<AnnotationTypes>,
}

impl Default for TypeRegistry {
	fn default() -> Self {
		Self::new(AnnotationTypes::default())
	}
}

impl TypeRegistry {
	/// Creates a registry publishing `types`.
	pub fn new(types: AnnotationTypes) -> Self {
		Self {
			current: ArcSwap::from_pointee(types),
		}
	}

	/// Returns the current snapshot.
	pub fn load(&self) -> Arc<AnnotationTypes> {
		self.current.load_full()
	}

	/// Publishes a replacement snapshot.
	pub fn store(&self, types: AnnotationTypes) {
		self.current.store(Arc::new(types));
	}

	/// Publishes a snapshot derived from the current one.
	///
	/// `f` may run more than once under contention.
	pub fn update(&self, f: impl Fn(&AnnotationTypes) -> AnnotationTypes) {
		self.current.rcu(|current| Arc::new(f(&**current)));
	}
}
