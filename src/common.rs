use std::sync::atomic::{AtomicU32, Ordering};

use lasso::Spur;

pub type Name = Spur;

/// Identifies a bound variable. Occurrences hold the identifier only; the typing context maps it back to a type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Binding(u32);

static NEXT_BINDING: AtomicU32 = AtomicU32::new(0);

impl Binding {
	pub fn fresh() -> Self { Self(NEXT_BINDING.fetch_add(1, Ordering::Relaxed)) }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Cmp {
	Le,
	Eq,
	Ge,
}

impl Cmp {
	pub fn flip(self) -> Self {
		match self {
			Self::Le => Self::Ge,
			Self::Eq => Self::Eq,
			Self::Ge => Self::Le,
		}
	}
}

/// A three-valued answer: `Maybe` means the question is blocked on an unsolved inference variable.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Decision {
	No,
	Maybe,
	Yes,
}

impl Decision {
	pub fn min(self, other: Self) -> Self { Ord::min(self, other) }

	pub fn max(self, other: Self) -> Self { Ord::max(self, other) }
}

impl From<bool> for Decision {
	fn from(value: bool) -> Self { if value { Self::Yes } else { Self::No } }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct SourceNode {
	pub start: usize,
	pub end: usize,
}

impl SourceNode {
	pub fn new(start: usize, end: usize) -> Self { Self { start, end } }
}
