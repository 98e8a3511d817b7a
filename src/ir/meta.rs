use std::{ops::Index, rc::Rc};

use crate::{
	common::{Binding, Name, SourceNode},
	ir::{
		definition::DefId,
		equation::EquationId,
		expression::Expression,
		level::{Level, LevelKind, LevelMeta},
	},
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct InferenceVariable(u32);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VariableKind {
	Expression,
	Derived,
	TypeClass { class: DefId },
}

#[derive(Clone, Debug)]
pub struct VariableEntry {
	pub name: Option<Name>,
	pub kind: VariableKind,
	pub ty: Rc<Expression>,
	pub bounds: Vec<Binding>,
	pub source: SourceNode,
	solution: Option<Rc<Expression>>,
	waiting: Vec<EquationId>,
}

impl VariableEntry {
	/// Type-class variables are only ever solved by instance search.
	pub fn solvable_from_equations(&self) -> bool { !matches!(self.kind, VariableKind::TypeClass { .. }) }
}

#[derive(Clone, Debug)]
pub struct LevelEntry {
	pub kind: LevelKind,
	pub source: SourceNode,
	solution: Option<Level>,
}

#[derive(Default, Debug)]
pub struct Metacontext {
	entries: Vec<VariableEntry>,
	levels: Vec<LevelEntry>,
}

impl Metacontext {
	pub fn new() -> Self { Self::default() }

	pub fn spawn(
		&mut self,
		name: Option<Name>,
		kind: VariableKind,
		ty: Rc<Expression>,
		bounds: Vec<Binding>,
		source: SourceNode,
	) -> InferenceVariable {
		let variable = InferenceVariable(self.entries.len() as u32);
		self.entries.push(VariableEntry { name, kind, ty, bounds, source, solution: None, waiting: Vec::new() });
		variable
	}

	pub fn spawn_level(&mut self, kind: LevelKind, source: SourceNode) -> LevelMeta {
		let meta = LevelMeta { index: self.levels.len() as u32, kind };
		self.levels.push(LevelEntry { kind, source, solution: None });
		meta
	}

	pub fn solution(&self, variable: InferenceVariable) -> Option<&Rc<Expression>> {
		self[variable].solution.as_ref()
	}

	pub fn is_solved(&self, variable: InferenceVariable) -> bool { self[variable].solution.is_some() }

	/// Writes the solution of an unsolved variable and returns the equations waiting on it.
	///
	/// Returns `None` without changing anything if the variable is already solved.
	pub fn solve(&mut self, variable: InferenceVariable, solution: Rc<Expression>) -> Option<Vec<EquationId>> {
		let entry = &mut self.entries[variable.0 as usize];
		if entry.solution.is_some() {
			return None;
		}
		entry.solution = Some(solution);
		Some(std::mem::take(&mut entry.waiting))
	}

	pub fn listen(&mut self, variable: InferenceVariable, equation: EquationId) {
		let entry = &mut self.entries[variable.0 as usize];
		if entry.solution.is_none() && !entry.waiting.contains(&equation) {
			entry.waiting.push(equation);
		}
	}

	pub fn variables(&self) -> impl Iterator<Item = InferenceVariable> {
		(0..self.entries.len() as u32).map(InferenceVariable)
	}

	pub fn unsolved(&self) -> impl Iterator<Item = InferenceVariable> + '_ {
		self.variables().filter(|&variable| !self.is_solved(variable))
	}

	pub fn level(&self, meta: LevelMeta) -> &LevelEntry { &self.levels[meta.index as usize] }

	pub fn level_solution(&self, meta: LevelMeta) -> Option<Level> { self.level(meta).solution }

	pub fn solve_level(&mut self, meta: LevelMeta, level: Level) {
		let entry = &mut self.levels[meta.index as usize];
		if entry.solution.is_none() {
			entry.solution = Some(level);
		}
	}

	pub fn level_metas(&self) -> impl Iterator<Item = LevelMeta> + '_ {
		(0..self.levels.len() as u32).map(|index| LevelMeta { index, kind: self.levels[index as usize].kind })
	}
}

impl Index<InferenceVariable> for Metacontext {
	type Output = VariableEntry;

	fn index(&self, variable: InferenceVariable) -> &Self::Output { &self.entries[variable.0 as usize] }
}
