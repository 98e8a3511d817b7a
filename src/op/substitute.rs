use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
	common::Binding,
	ir::{
		expression::{Expression, Parameter},
		level::{Level, LevelSubstitution, LevelVariable},
		meta::{InferenceVariable, Metacontext},
	},
	op::traverse::{visit_children, Fold, Visit},
};

#[derive(Clone, Default, Debug)]
pub struct Substitution {
	expressions: FxHashMap<Binding, Rc<Expression>>,
	levels: LevelSubstitution,
}

impl Substitution {
	pub fn new() -> Self { Self::default() }

	pub fn single(binding: Binding, expression: Rc<Expression>) -> Self {
		let mut substitution = Self::new();
		substitution.add(binding, expression);
		substitution
	}

	pub fn telescope<'a>(parameters: &[Parameter], arguments: impl IntoIterator<Item = &'a Rc<Expression>>) -> Self {
		let mut substitution = Self::new();
		for (parameter, argument) in parameters.iter().zip(arguments) {
			substitution.add(parameter.binding, argument.clone());
		}
		substitution
	}

	pub fn add(&mut self, binding: Binding, expression: Rc<Expression>) {
		self.expressions.insert(binding, expression);
	}

	pub fn with_levels(self, levels: LevelSubstitution) -> Self { Self { levels, ..self } }

	pub fn is_empty(&self) -> bool { self.expressions.is_empty() && self.levels.is_empty() }
}

pub trait Substitute {
	/// Applies the substitution, renaming every binder so no free variable of the replacements is captured.
	fn substitute(&self, substitution: &Substitution) -> Self;
}

struct Substituter {
	expressions: FxHashMap<Binding, Rc<Expression>>,
	levels: LevelSubstitution,
}

impl Fold for Substituter {
	fn fold_binding(&mut self, binding: Binding) -> Binding {
		let fresh = Binding::fresh();
		self.expressions.insert(binding, Expression::reference(fresh));
		fresh
	}

	fn fold_reference(&mut self, binding: Binding) -> Rc<Expression> {
		self.expressions.get(&binding).cloned().unwrap_or_else(|| Expression::reference(binding))
	}

	fn fold_level(&mut self, level: Level) -> Level { level.substitute(&self.levels) }
}

impl Substitute for Rc<Expression> {
	fn substitute(&self, substitution: &Substitution) -> Self {
		if substitution.is_empty() {
			return self.clone();
		}
		Substituter { expressions: substitution.expressions.clone(), levels: substitution.levels.clone() }.fold(self)
	}
}

/// Substitutes into a telescope, keeping its bindings so later entries still refer to earlier ones.
pub fn substitute_telescope(parameters: &[Parameter], substitution: &Substitution) -> Vec<Parameter> {
	parameters
		.iter()
		.map(|parameter| Parameter { ty: parameter.ty.substitute(substitution), ..parameter.clone() })
		.collect()
}

struct FreeBindings {
	bound: FxHashSet<Binding>,
	free: FxHashSet<Binding>,
}

impl Visit for FreeBindings {
	fn visit_binder(&mut self, binding: Binding) { self.bound.insert(binding); }

	fn visit_reference(&mut self, binding: Binding) {
		if !self.bound.contains(&binding) {
			self.free.insert(binding);
		}
	}
}

pub fn free_bindings(expression: &Rc<Expression>) -> FxHashSet<Binding> {
	let mut visitor = FreeBindings { bound: FxHashSet::default(), free: FxHashSet::default() };
	visitor.visit(expression);
	visitor.free
}

struct Occurs<'a> {
	metas: &'a Metacontext,
	target: InferenceVariable,
	visited: FxHashSet<InferenceVariable>,
	found: bool,
}

impl Visit for Occurs<'_> {
	fn visit_inference(&mut self, variable: InferenceVariable) {
		if variable == self.target {
			self.found = true;
		} else if self.visited.insert(variable) {
			if let Some(solution) = self.metas.solution(variable) {
				self.visit(solution);
			}
		}
	}

	fn visit(&mut self, expression: &Rc<Expression>) {
		if !self.found {
			visit_children(self, expression)
		}
	}
}

pub fn occurs(metas: &Metacontext, variable: InferenceVariable, expression: &Rc<Expression>) -> bool {
	let mut visitor = Occurs { metas, target: variable, visited: FxHashSet::default(), found: false };
	visitor.visit(expression);
	visitor.found
}

struct Unsolved<'a> {
	metas: &'a Metacontext,
	visited: FxHashSet<InferenceVariable>,
	found: Vec<InferenceVariable>,
}

impl Visit for Unsolved<'_> {
	fn visit_inference(&mut self, variable: InferenceVariable) {
		if !self.visited.insert(variable) {
			return;
		}
		match self.metas.solution(variable) {
			Some(solution) => self.visit(solution),
			None => self.found.push(variable),
		}
	}
}

pub fn unsolved_variables(metas: &Metacontext, expression: &Rc<Expression>) -> Vec<InferenceVariable> {
	let mut visitor = Unsolved { metas, visited: FxHashSet::default(), found: Vec::new() };
	visitor.visit(expression);
	visitor.found
}

struct Zonk<'a> {
	metas: &'a Metacontext,
}

impl Fold for Zonk<'_> {
	fn fold_inference(&mut self, variable: InferenceVariable) -> Rc<Expression> {
		match self.metas.solution(variable) {
			Some(solution) => self.fold(solution),
			None => Expression::inference(variable),
		}
	}

	fn fold_level(&mut self, level: Level) -> Level {
		match level.var {
			Some(LevelVariable::Inference(meta)) => match self.metas.level_solution(meta) {
				Some(solution) => {
					let mut substitution = LevelSubstitution::default();
					substitution.insert(LevelVariable::Inference(meta), solution);
					level.substitute(&substitution)
				}
				None => level,
			},
			_ => level,
		}
	}
}

/// Replaces solved inference variables, term and level, by their solutions.
pub fn zonk(metas: &Metacontext, expression: &Rc<Expression>) -> Rc<Expression> { Zonk { metas }.fold(expression) }
