//! Core vocabulary shared by the document and the annotation index.

/// Anchor handles and the anchor-owning collaborator trait.
pub mod anchor;
/// Character and line coordinate types.
pub mod position;

pub use anchor::{AnchorHandle, AnchorSource, Bias, LineShiftListener, OutOfBounds};
pub use position::{CharIdx, CharLen, LineIndex};
