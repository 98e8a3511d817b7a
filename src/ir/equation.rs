use std::rc::Rc;

use crate::{
	common::{Cmp, SourceNode},
	ir::{expression::Expression, level::LevelVariable},
};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EquationId(pub(crate) u32);

/// A deferred comparison `left cmp right`.
#[derive(Clone, PartialEq, Debug)]
pub struct Equation {
	pub id: EquationId,
	pub left: Rc<Expression>,
	pub right: Rc<Expression>,
	pub ty: Option<Rc<Expression>>,
	pub cmp: Cmp,
	pub source: SourceNode,
}

/// A constraint on levels in canonical form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LevelEquation {
	/// `lower ≤ max(upper + constant, max_constant)`. A missing variable stands for the level `0`.
	Bound {
		lower: Option<LevelVariable>,
		upper: Option<LevelVariable>,
		constant: i32,
		max_constant: Option<i32>,
		source: SourceNode,
	},
	Infinity { var: LevelVariable, source: SourceNode },
}

impl LevelEquation {
	pub fn source(&self) -> SourceNode {
		match self {
			Self::Bound { source, .. } | Self::Infinity { source, .. } => *source,
		}
	}
}
