use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::{
	common::{Cmp, SourceNode},
	ir::{
		equation::{Equation, EquationId},
		expression::Expression,
		level::Sort,
		meta::{InferenceVariable, VariableKind},
		prelude,
	},
	op::{
		elaborate::Elaborator,
		normalize::Normalizer,
		substitute::{free_bindings, occurs, unsolved_variables, zonk},
		typing::pi_sort,
	},
	report::{ElaborationErrorKind, InferenceFailure},
};

impl Elaborator<'_> {
	/// Requires `left cmp right`, reporting a mismatch if it provably fails for a reason other than levels.
	pub fn add_equation(
		&mut self,
		left: &Rc<Expression>,
		right: &Rc<Expression>,
		ty: Option<&Rc<Expression>>,
		cmp: Cmp,
		source: SourceNode,
	) -> bool {
		let level_failures = self.level_failures;
		if self.compare(cmp, left, right, ty, source) {
			return true;
		}
		if self.level_failures != level_failures {
			return false;
		}
		let (left, right) = (zonk(&self.metas, left), zonk(&self.metas, right));
		self.report(ElaborationErrorKind::Mismatch { left, right, cmp }, source);
		false
	}

	pub fn solve(&mut self, variable: InferenceVariable, solution: Rc<Expression>, source: SourceNode) -> bool {
		if self.solve_variable(variable, solution.clone(), source) {
			return true;
		}
		let left = zonk(&self.metas, &Expression::inference(variable));
		self.report(ElaborationErrorKind::Mismatch { left, right: zonk(&self.metas, &solution), cmp: Cmp::Eq }, source);
		false
	}

	/// Handles a comparison with an unsolved variable on at least one side, or one stuck on such a variable.
	///
	/// Both sides are in weak-head normal form.
	pub(crate) fn constrain(
		&mut self,
		left: &Rc<Expression>,
		right: &Rc<Expression>,
		ty: Option<&Rc<Expression>>,
		cmp: Cmp,
		source: SourceNode,
	) -> bool {
		let normalizer = self.normalizer();
		let (left_variable, right_variable) = (normalizer.unsolved_variable(left), normalizer.unsolved_variable(right));
		let (variable, other, relation) = match (left_variable, right_variable) {
			(Some(l), Some(r)) if l == r => return true,
			(Some(_), Some(_)) if cmp != Cmp::Eq => return self.defer(left, right, ty, cmp, source),
			(Some(l), _) => (l, right, cmp.flip()),
			(None, Some(r)) => (r, left, cmp),
			(None, None) =>
				return match self.solve_instance(left, right, ty, cmp, source) {
					Some(result) => result,
					None => match self.solve_instance(right, left, ty, cmp.flip(), source) {
						Some(result) => result,
						None => self.defer(left, right, ty, cmp, source),
					},
				},
		};
		// From here on the constraint reads `other relation variable`.

		if !self.metas[variable].solvable_from_equations() {
			if relation == Cmp::Eq {
				if let Some(previous) = self.direct_solutions.get(&variable).cloned() {
					return self.compare(Cmp::Eq, &previous, other, ty, source);
				}
				self.direct_solutions.insert(variable, other.clone());
			}
			return self.defer(left, right, ty, cmp, source);
		}

		let stuck = self.normalizer().stuck_expression(other).is_some();
		let mut relation = relation;
		match other.as_ref() {
			Expression::Universe(sort) if sort.is_prop() =>
				if relation == Cmp::Le {
					if !self.props.contains(&variable) {
						self.props.push(variable);
					}
					return true;
				} else {
					relation = Cmp::Eq;
				},
			Expression::Pi { .. } | Expression::Universe(_) => {}
			Expression::ClassCall(class_call) if !(relation == Cmp::Ge && class_call.is_complete(self.module)) => {}
			_ if stuck => {}
			_ => relation = Cmp::Eq,
		}
		if relation != Cmp::Eq && !self.has_directed_codomain(other) {
			relation = Cmp::Eq;
		}

		match other.as_ref() {
			_ if relation == Cmp::Eq => self.solve_variable(variable, other.clone(), source),
			Expression::Pi { parameter, codomain, .. } => {
				let (result, result_sort) = self.under(parameter, |this| {
					let sort = this.fresh_sort(source);
					(this.fresh_variable(None, VariableKind::Derived, Expression::universe(sort), source), sort)
				});
				let sort = pi_sort(self.sort_of(&parameter.ty), Some(result_sort));
				let solution = Expression::pi(sort, parameter.clone(), result.clone());
				self.solve_variable(variable, solution, source)
					&& self.under(parameter, |this| this.compare(relation, codomain, &result, None, source))
			}
			Expression::Universe(sort) => {
				let fresh = self.fresh_sort(source);
				self.solve_variable(variable, Expression::universe(fresh), source)
					&& Sort::compare(sort, &fresh, relation, self, source)
			}
			_ => self.defer(left, right, ty, cmp, source),
		}
	}

	/// Whether a directed constraint against this type can be kept directed: its codomain, past any Pis, admits subtyping.
	fn has_directed_codomain(&self, ty: &Rc<Expression>) -> bool {
		let normalizer = self.normalizer();
		let mut current = normalizer.whnf(ty);
		loop {
			match current.as_ref() {
				Expression::Pi { codomain, .. } => current = normalizer.whnf(codomain),
				Expression::ClassCall(_) | Expression::Universe(_) => return true,
				_ => return normalizer.stuck_expression(&current).is_some(),
			}
		}
	}

	fn solve_instance(
		&mut self,
		side: &Rc<Expression>,
		other: &Rc<Expression>,
		ty: Option<&Rc<Expression>>,
		cmp: Cmp,
		source: SourceNode,
	) -> Option<bool> {
		let normalizer = self.normalizer();
		let (head, arguments) = side.spine();
		let Expression::FieldCall { field, argument } = head.as_ref() else { return None };
		let variable = normalizer.unsolved_variable(argument)?;
		let VariableKind::TypeClass { class } = self.metas[variable].kind else { return None };
		if self.module.class(class)?.classifying_field != Some(*field) || normalizer.stuck_expression(other).is_some() {
			return None;
		}
		let classifier = match arguments.is_empty() {
			true => normalizer.whnf(other),
			false => normalizer.whnf(other).spine().0.clone(),
		};

		let Some(instance) = self.instances.find(&normalizer, class, &classifier) else {
			tracing::debug!(?variable, "no instance found");
			self.inference_error(variable, InferenceFailure::NoInstance { class, classifier });
			return Some(true);
		};
		tracing::debug!(?variable, "resolved instance");
		Some(self.solve_variable(variable, instance, source) && self.compare(cmp, side, other, ty, source))
	}

	pub(crate) fn defer(
		&mut self,
		left: &Rc<Expression>,
		right: &Rc<Expression>,
		ty: Option<&Rc<Expression>>,
		cmp: Cmp,
		source: SourceNode,
	) -> bool {
		let id = self.next_equation_id();
		let mut variables = unsolved_variables(&self.metas, left);
		variables.extend(unsolved_variables(&self.metas, right));
		for variable in variables {
			self.metas.listen(variable, id);
		}
		tracing::trace!(?id, ?cmp, "deferred equation");
		self.equations.push(Equation { id, left: left.clone(), right: right.clone(), ty: ty.cloned(), cmp, source });
		true
	}

	pub(crate) fn solve_variable(
		&mut self,
		variable: InferenceVariable,
		solution: Rc<Expression>,
		source: SourceNode,
	) -> bool {
		if let Some(existing) = self.metas.solution(variable).cloned() {
			return self.compare(Cmp::Eq, &existing, &solution, None, source);
		}
		if self.normalizer().unsolved_variable(&solution) == Some(variable) {
			return true;
		}
		if self.props.contains(&variable) && !matches!(self.whnf(&solution).as_ref(), Expression::Universe(_)) {
			self.inference_error(variable, InferenceFailure::NotProp { candidate: solution });
			return true;
		}
		if occurs(&self.metas, variable, &solution) {
			self.inference_error(variable, InferenceFailure::Occurs { candidate: solution });
			return true;
		}

		let mut solution = solution;
		let out_of_scope = |elaborator: &Self, solution: &Rc<Expression>| {
			let bounds = &elaborator.metas[variable].bounds;
			let mut escaped: Vec<_> =
				free_bindings(solution).into_iter().filter(|binding| !bounds.contains(binding)).collect();
			escaped.sort();
			escaped
		};
		if !out_of_scope(self, &solution).is_empty() {
			solution = self.normalize(&solution);
			let bindings = out_of_scope(self, &solution);
			if !bindings.is_empty() {
				self.inference_error(variable, InferenceFailure::OutOfScope { candidate: solution, bindings });
				return true;
			}
		}

		let expected = self.metas[variable].ty.clone();
		if !expected.is_error() {
			let actual = self.solution_type(&solution, &expected);
			if !actual.is_error() && !self.compare(Cmp::Le, &actual, &expected, None, source) {
				let (expected, actual) = (zonk(&self.metas, &expected), zonk(&self.metas, &actual));
				self.inference_error(variable, InferenceFailure::IllTyped { candidate: solution, expected, actual });
				return true;
			}
		}

		if self.metas.is_solved(variable) {
			return self.solve_variable(variable, solution, source);
		}
		self.write_solution(variable, solution);
		true
	}

	/// Literals checked against `Fin n` have type `Fin (k + 1)` rather than `Nat`.
	fn solution_type(&self, solution: &Rc<Expression>, expected: &Rc<Expression>) -> Rc<Expression> {
		match (solution.as_ref(), self.whnf(expected).as_ref()) {
			(Expression::Integer(n), Expression::DataCall { definition, .. }) if *definition == prelude::FIN =>
				Expression::fin(Expression::integer(n + 1u32)),
			_ => self.type_of(solution),
		}
	}

	pub(crate) fn write_solution(&mut self, variable: InferenceVariable, solution: Rc<Expression>) {
		tracing::debug!(?variable, "solved inference variable");
		if let Some(waiting) = self.metas.solve(variable, solution) {
			self.wake(waiting);
		}
	}

	fn wake(&mut self, waiting: Vec<EquationId>) {
		for id in waiting {
			let Some(index) = self.equations.iter().position(|equation| equation.id == id) else { continue };
			let equation = self.equations.remove(index);
			tracing::trace!(?id, "retrying equation");
			self.add_equation(&equation.left, &equation.right, equation.ty.as_ref(), equation.cmp, equation.source);
		}
	}

	pub(crate) fn inference_error(&mut self, variable: InferenceVariable, reason: InferenceFailure) {
		let source = self.metas[variable].source;
		self.report(ElaborationErrorKind::InferenceFailure { variable, reason }, source);
		self.write_solution(variable, Expression::error());
	}

	/// Drains the deferred equations until no stage makes progress or the round limit is hit.
	///
	/// Returns whether every equation got solved.
	pub fn solve_equations(&mut self) -> bool {
		let _span = tracing::debug_span!("solve_equations", equations = self.equations.len()).entered();
		for variable in std::mem::take(&mut self.props) {
			if !self.metas.is_solved(variable) {
				self.write_solution(variable, Expression::universe(Sort::PROP));
			}
		}
		for round in 0..self.config.round_limit {
			if self.equations.is_empty() {
				break;
			}
			tracing::trace!(round, remaining = self.equations.len(), "solving equations");
			if !(self.rewrite_fin_equations() || self.retry_ground_equations() || self.solve_class_bounds()) {
				break;
			}
		}
		self.equations.is_empty()
	}

	fn rewrite_fin_equations(&mut self) -> bool {
		let normalizer = Normalizer::new(self.module, &self.metas);
		let size = |expression: &Rc<Expression>| match normalizer.whnf(expression).as_ref() {
			Expression::DataCall { definition, arguments, .. } if *definition == prelude::FIN => arguments.first().cloned(),
			_ => None,
		};
		let mut sizes = Vec::new();
		self.equations.retain(|equation| match (size(&equation.left), size(&equation.right)) {
			(Some(left), Some(right)) => {
				sizes.push((left, right, equation.source));
				false
			}
			_ => true,
		});
		let progress = !sizes.is_empty();
		for (left, right, source) in sizes {
			self.add_equation(&left, &right, Some(&Expression::nat()), Cmp::Eq, source);
		}
		progress
	}

	fn retry_ground_equations(&mut self) -> bool {
		let normalizer = self.normalizer();
		let ground = self.equations.iter().position(|equation| {
			let (left, right) = (normalizer.whnf(&equation.left), normalizer.whnf(&equation.right));
			let candidate = |variable: &Rc<Expression>, other: &Rc<Expression>| {
				normalizer.unsolved_variable(variable).is_some_and(|variable| self.metas[variable].solvable_from_equations())
					&& !matches!(other.as_ref(), Expression::ClassCall(_))
					&& unsolved_variables(&self.metas, other).is_empty()
			};
			candidate(&left, &right) || candidate(&right, &left)
		});
		let Some(index) = ground else { return false };
		let equation = self.equations.remove(index);
		let normalizer = self.normalizer();
		let (variable, solution) = match normalizer.unsolved_variable(&equation.left) {
			Some(variable) if unsolved_variables(&self.metas, &equation.right).is_empty() => (variable, equation.right),
			_ => match normalizer.unsolved_variable(&equation.right) {
				Some(variable) => (variable, equation.left),
				None => return true,
			},
		};
		let solution = self.whnf(&solution);
		self.solve(variable, solution, equation.source);
		true
	}

	pub fn finalize(&mut self) {
		let normalizer = Normalizer::new(self.module, &self.metas);
		let blocked_by_error = |expression: &Rc<Expression>| {
			normalizer.stuck_expression(expression).is_some_and(|stuck| stuck.is_error())
		};
		let equations: Vec<_> = std::mem::take(&mut self.equations)
			.into_iter()
			.filter(|equation| !blocked_by_error(&equation.left) && !blocked_by_error(&equation.right))
			.map(|equation| Equation {
				left: zonk(&self.metas, &equation.left),
				right: zonk(&self.metas, &equation.right),
				..equation
			})
			.collect();

		let mut mentioned = FxHashSet::default();
		for equation in &equations {
			mentioned.extend(unsolved_variables(&self.metas, &equation.left));
			mentioned.extend(unsolved_variables(&self.metas, &equation.right));
		}
		if let Some(first) = equations.first() {
			let source = first.source;
			self.report(ElaborationErrorKind::UnsolvedEquations { equations }, source);
		}

		let unsolved: Vec<_> = self.metas.unsolved().collect();
		for variable in unsolved {
			if self.metas.is_solved(variable) {
				continue;
			}
			if let Some(solution) = self.direct_solutions.get(&variable).cloned() {
				self.solve_variable(variable, solution, self.metas[variable].source);
				continue;
			}
			if !self.config.report_unsolved_variables {
				continue;
			}
			if mentioned.contains(&variable) {
				self.write_solution(variable, Expression::error());
			} else {
				self.inference_error(variable, InferenceFailure::Unsolved);
			}
		}
		self.equations.clear();
		self.solve_levels();
	}
}
