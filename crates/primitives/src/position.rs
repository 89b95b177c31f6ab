/// A position in the text, measured in characters (not bytes).
pub type CharIdx = usize;

/// A length or count in the text, measured in characters (not bytes).
///
/// Kept distinct from [`CharIdx`] so lengths and positions are not swapped by accident.
pub type CharLen = usize;

/// Zero-based line number.
pub type LineIndex = usize;
