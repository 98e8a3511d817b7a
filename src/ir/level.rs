use rustc_hash::FxHashMap;

use crate::common::{Cmp, Name, SourceNode};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum LevelKind {
	P,
	H,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct LevelMeta {
	pub index: u32,
	pub kind: LevelKind,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum LevelVariable {
	Std(LevelKind),
	/// A parameter of a custom level signature. Parameters of one kind form an ascending chain in declaration order.
	Param { kind: LevelKind, index: u16 },
	Inference(LevelMeta),
}

impl LevelVariable {
	pub fn kind(self) -> LevelKind {
		match self {
			Self::Std(kind) | Self::Param { kind, .. } => kind,
			Self::Inference(meta) => meta.kind,
		}
	}

	pub fn is_inference(self) -> bool { matches!(self, Self::Inference(_)) }

	/// Whether `self ≤ other` holds for every instantiation of rigid variables.
	pub fn precedes(self, other: Self) -> bool {
		match (self, other) {
			_ if self == other => true,
			(Self::Param { kind: k1, index: i1 }, Self::Param { kind: k2, index: i2 }) => k1 == k2 && i1 <= i2,
			_ => false,
		}
	}
}

/// Sink for level constraints that mention inference variables.
pub trait LevelConstraints {
	/// Records `lower ≤ upper`, returning false if the constraint can never be satisfied.
	fn add_level_equation(&mut self, lower: Level, upper: Level, source: SourceNode) -> bool;
}

pub struct Rigid;

impl LevelConstraints for Rigid {
	fn add_level_equation(&mut self, _: Level, _: Level, _: SourceNode) -> bool { false }
}

/// `max(var + constant, max_constant)`, or just `constant` when there is no variable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Level {
	pub var: Option<LevelVariable>,
	pub constant: i32,
	pub max_constant: Option<i32>,
}

const INFINITY_CONSTANT: i32 = i32::MAX;

impl Level {
	pub const INFINITY: Self = Self { var: None, constant: INFINITY_CONSTANT, max_constant: None };
	pub const ZERO: Self = Self { var: None, constant: 0, max_constant: None };

	pub fn closed(constant: i32) -> Self { Self { var: None, constant, max_constant: None } }

	pub fn var(var: LevelVariable) -> Self { Self { var: Some(var), constant: 0, max_constant: None } }

	/// Builds a level, dropping a maximum that the variable part always dominates.
	pub fn new(var: Option<LevelVariable>, constant: i32, max_constant: Option<i32>) -> Self {
		match var {
			None => Self::closed(constant.max(max_constant.unwrap_or(constant))),
			Some(_) => Self { var, constant, max_constant: max_constant.filter(|&m| m > constant) },
		}
	}

	pub fn is_infinity(&self) -> bool { self.var.is_none() && self.constant == INFINITY_CONSTANT }

	pub fn is_closed(&self) -> bool { self.var.is_none() && !self.is_infinity() }

	pub fn is_var_only(&self) -> bool { self.var.is_some() && self.constant == 0 && self.max_constant.is_none() }

	pub fn has_inference_var(&self) -> bool { self.var.is_some_and(LevelVariable::is_inference) }

	pub fn minimum(&self) -> i32 {
		match self.var {
			None => self.constant,
			Some(_) => self.constant.max(self.max_constant.unwrap_or(self.constant)),
		}
	}

	pub fn add(self, k: i32) -> Self {
		if self.is_infinity() || k == 0 {
			return self;
		}
		Self::new(self.var, self.constant + k, self.max_constant.map(|m| m + k))
	}

	/// The join of two levels, if it is expressible over at most one variable.
	pub fn max(self, other: Self) -> Option<Self> {
		if self.is_infinity() || other.is_infinity() {
			return Some(Self::INFINITY);
		}
		match (self.var, other.var) {
			(None, None) => Some(Self::closed(self.constant.max(other.constant))),
			(None, Some(_)) => Some(other.max_closed(self.constant)),
			(Some(_), None) => Some(self.max_closed(other.constant)),
			(Some(v1), Some(v2)) if v1 == v2 => Some(Self::new(
				Some(v1),
				self.constant.max(other.constant),
				match (self.max_constant, other.max_constant) {
					(Some(a), Some(b)) => Some(a.max(b)),
					(a, b) => a.or(b),
				},
			)),
			_ => None,
		}
	}

	pub fn max_closed(self, constant: i32) -> Self {
		match self.var {
			_ if self.is_infinity() => self,
			None => Self::closed(self.constant.max(constant)),
			Some(var) =>
				Self::new(Some(var), self.constant, Some(self.max_constant.map_or(constant, |m| m.max(constant)))),
		}
	}

	/// Decides `self ≤ other` for every instantiation of the variables, without recording anything.
	pub fn leq(&self, other: &Self) -> bool {
		if other.is_infinity() {
			return true;
		}
		if self.is_infinity() {
			return false;
		}
		let closed_leq = |c: i32| match other.var {
			None => c <= other.constant,
			Some(_) => c <= other.minimum(),
		};
		match self.var {
			None => closed_leq(self.constant),
			Some(v1) =>
				self.max_constant.map_or(true, closed_leq)
					&& other.var.is_some_and(|v2| v1.precedes(v2) && self.constant <= other.constant),
		}
	}

	pub fn substitute(&self, substitution: &LevelSubstitution) -> Self {
		let Some(var) = self.var else { return *self };
		let Some(level) = substitution.get(var) else { return *self };
		let shifted = level.add(self.constant);
		match self.max_constant {
			Some(m) => shifted.max_closed(m),
			None => shifted,
		}
	}

	/// Compares two levels, recording constraints on inference variables in `constraints`.
	pub fn compare(
		left: &Self,
		right: &Self,
		cmp: Cmp,
		constraints: &mut dyn LevelConstraints,
		source: SourceNode,
	) -> bool {
		match cmp {
			Cmp::Ge => Self::compare(right, left, Cmp::Le, constraints, source),
			Cmp::Eq =>
				Self::compare(left, right, Cmp::Le, constraints, source)
					&& Self::compare(right, left, Cmp::Le, constraints, source),
			Cmp::Le =>
				if left.leq(right) {
					true
				} else if left.has_inference_var() || right.has_inference_var() {
					constraints.add_level_equation(*left, *right, source)
				} else {
					false
				},
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Sort {
	pub p: Level,
	pub h: Level,
}

impl Sort {
	pub const PROP: Self = Self { p: Level::ZERO, h: Level { var: None, constant: -1, max_constant: None } };
	pub const SET0: Self = Self { p: Level::ZERO, h: Level::ZERO };

	pub fn new(p: Level, h: Level) -> Self { Self { p, h } }

	pub fn std() -> Self {
		Self::new(Level::var(LevelVariable::Std(LevelKind::P)), Level::var(LevelVariable::Std(LevelKind::H)))
	}

	pub fn is_prop(&self) -> bool { self.h.is_closed() && self.h.constant < 0 }

	pub fn succ(&self) -> Self { if self.is_prop() { Self::SET0 } else { Self::new(self.p.add(1), self.h.add(1)) } }

	pub fn max(&self, other: &Self) -> Option<Self> {
		if self.is_prop() {
			return Some(*other);
		}
		if other.is_prop() {
			return Some(*self);
		}
		Some(Self::new(self.p.max(other.p)?, self.h.max(other.h)?))
	}

	pub fn substitute(&self, substitution: &LevelSubstitution) -> Self {
		Self::new(self.p.substitute(substitution), self.h.substitute(substitution))
	}

	pub fn compare(
		left: &Self,
		right: &Self,
		cmp: Cmp,
		constraints: &mut dyn LevelConstraints,
		source: SourceNode,
	) -> bool {
		match cmp {
			Cmp::Ge => Self::compare(right, left, Cmp::Le, constraints, source),
			Cmp::Le if left.is_prop() => true,
			Cmp::Eq if left.is_prop() || right.is_prop() => left.is_prop() && right.is_prop(),
			_ =>
				Level::compare(&left.p, &right.p, cmp, constraints, source)
					&& Level::compare(&left.h, &right.h, cmp, constraints, source),
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Variance {
	Covariant,
	Contravariant,
	Invariant,
}

impl Variance {
	pub fn apply(self, cmp: Cmp) -> Cmp {
		match self {
			Self::Covariant => cmp,
			Self::Contravariant => cmp.flip(),
			Self::Invariant => Cmp::Eq,
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LevelParameter {
	pub name: Option<Name>,
	pub kind: LevelKind,
	pub variance: Variance,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Levels {
	Pair { p: Level, h: Level },
	List(Vec<Level>),
}

impl Levels {
	pub fn std() -> Self {
		let Sort { p, h } = Sort::std();
		Self::Pair { p, h }
	}

	pub fn empty() -> Self { Self::List(Vec::new()) }

	pub fn from_sort(sort: Sort) -> Self { Self::Pair { p: sort.p, h: sort.h } }

	pub fn to_vec(&self) -> Vec<Level> {
		match self {
			Self::Pair { p, h } => vec![*p, *h],
			Self::List(levels) => levels.clone(),
		}
	}

	pub fn substitution(&self, parameters: Option<&[LevelParameter]>) -> LevelSubstitution {
		let mut substitution = LevelSubstitution::default();
		match (self, parameters) {
			(Self::Pair { p, h }, None) => {
				substitution.insert(LevelVariable::Std(LevelKind::P), *p);
				substitution.insert(LevelVariable::Std(LevelKind::H), *h);
			}
			(Self::List(levels), Some(parameters)) => {
				let mut indices = [0u16; 2];
				for (level, parameter) in levels.iter().zip(parameters) {
					let index = &mut indices[parameter.kind as usize];
					substitution.insert(LevelVariable::Param { kind: parameter.kind, index: *index }, *level);
					*index += 1;
				}
			}
			_ => {}
		}
		substitution
	}

	pub fn substitute(&self, substitution: &LevelSubstitution) -> Self {
		match self {
			Self::Pair { p, h } => Self::Pair { p: p.substitute(substitution), h: h.substitute(substitution) },
			Self::List(levels) => Self::List(levels.iter().map(|level| level.substitute(substitution)).collect()),
		}
	}

	pub fn compare(
		left: &Self,
		right: &Self,
		cmp: Cmp,
		variances: &[Variance],
		constraints: &mut dyn LevelConstraints,
		source: SourceNode,
	) -> bool {
		let (left, right) = (left.to_vec(), right.to_vec());
		left.len() == right.len()
			&& left.iter().zip(&right).enumerate().all(|(i, (l, r))| {
				let variance = variances.get(i).copied().unwrap_or(Variance::Invariant);
				Level::compare(l, r, variance.apply(cmp), constraints, source)
			})
	}
}

#[derive(Clone, Default, PartialEq, Debug)]
pub struct LevelSubstitution(FxHashMap<LevelVariable, Level>);

impl LevelSubstitution {
	pub fn insert(&mut self, var: LevelVariable, level: Level) { self.0.insert(var, level); }

	pub fn get(&self, var: LevelVariable) -> Option<Level> { self.0.get(&var).copied() }

	pub fn is_empty(&self) -> bool { self.0.is_empty() }
}
