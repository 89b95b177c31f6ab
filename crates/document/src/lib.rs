//! Text document with anchors that survive edits.
//!
//! # Mental Model
//!
//! A [`Document`] owns a rope and an arena of anchors. Every edit is a single
//! replacement of a character range; the arena remaps all anchors through it
//! and the document then reports how many line breaks were inserted or removed
//! to its [`LineShiftListener`]s.
//!
//! # Invariants
//!
//! - An anchor position never exceeds the document length.
//!   - Enforced in: `AnchorArena::map_replace`.
//!   - Tested by: `tests::prop_anchors_stay_in_bounds`
//! - A released handle never resolves again, even once its slot is reused.
//!   - Enforced in: `AnchorArena::get` (generation check).
//!   - Tested by: `arena::tests::test_stale_handle_is_rejected_after_slot_reuse`
//! - Listeners run without the document lock held.
//!   - Enforced in: [`Document::replace`].
//!   - Tested by: `tests::test_listener_can_query_document`
//!
//! [`LineShiftListener`]: marginalia_primitives::LineShiftListener

mod arena;
mod document;

pub use document::{Document, EditSummary};
