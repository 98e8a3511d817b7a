use std::rc::Rc;

use num_bigint::BigUint;

use crate::{
	common::Decision,
	ir::{
		definition::{Body, Builtin, DefId, FunctionKind, Module},
		expression::{Clause, Expression, LetClause, Pattern},
		level::Levels,
		meta::{InferenceVariable, Metacontext},
		prelude,
	},
	op::{
		substitute::{free_bindings, Substitute as _, Substitution},
		traverse::{fold_children, Fold},
	},
	utility::rc,
};

#[derive(Clone, Copy)]
pub struct Normalizer<'a> {
	pub module: &'a Module,
	pub metas: &'a Metacontext,
}

enum Match {
	Yes,
	No,
	Stuck,
}

impl<'a> Normalizer<'a> {
	pub fn new(module: &'a Module, metas: &'a Metacontext) -> Self { Self { module, metas } }

	pub fn whnf(&self, expression: &Rc<Expression>) -> Rc<Expression> {
		let mut current = expression.clone();
		while let Some(next) = self.step(&current) {
			current = next;
		}
		current
	}

	pub fn normalize(&self, expression: &Rc<Expression>) -> Rc<Expression> { Nf { normalizer: *self }.fold(expression) }

	fn step(&self, expression: &Rc<Expression>) -> Option<Rc<Expression>> {
		use Expression as E;
		match expression.as_ref() {
			E::Inference(variable) => self.metas.solution(*variable).cloned(),
			E::App { function, argument } => {
				let head = self.whnf(function);
				match head.as_ref() {
					E::Lambda { parameter, body } =>
						Some(body.substitute(&Substitution::single(parameter.binding, argument.clone()))),
					_ if !Rc::ptr_eq(&head, function) => Some(rc!(E::App { function: head, argument: argument.clone() })),
					_ => None,
				}
			}
			E::Proj { tuple, field } => {
				let whnf = self.whnf(tuple);
				match whnf.as_ref() {
					E::Tuple { fields, .. } => fields.get(*field).cloned(),
					_ if !Rc::ptr_eq(&whnf, tuple) => Some(rc!(E::Proj { tuple: whnf, field: *field })),
					_ => None,
				}
			}
			E::Let { clauses, body, opaque: false } => Some(unfold_let(clauses, body)),
			E::Let { clauses, body, opaque: true } => {
				let whnf = self.whnf(body);
				let free = free_bindings(&whnf);
				if clauses.iter().all(|clause| !free.contains(&clause.binding)) {
					Some(whnf)
				} else if !Rc::ptr_eq(&whnf, body) {
					Some(rc!(E::Let { clauses: clauses.clone(), body: whnf, opaque: true }))
				} else {
					None
				}
			}
			E::Case { arguments, clauses, .. } => {
				let (substitution, body) = self.match_clauses(clauses, arguments)?;
				Some(body.substitute(&substitution))
			}
			E::FunCall { definition, levels, arguments } => self.unfold_call(*definition, levels, arguments),
			E::FieldCall { field, argument } => {
				let whnf = self.whnf(argument);
				match whnf.as_ref() {
					E::New(class_call) => self.module.implementation(class_call, *field, &whnf),
					_ if !Rc::ptr_eq(&whnf, argument) => Some(rc!(E::FieldCall { field: *field, argument: whnf })),
					_ => None,
				}
			}
			_ => None,
		}
	}

	fn unfold_call(&self, definition: DefId, levels: &Levels, arguments: &[Rc<Expression>]) -> Option<Rc<Expression>> {
		let function = self.module.function(definition)?;
		if function.kind == FunctionKind::Lemma {
			return None;
		}
		if let Some(reduced) = function.builtin.and_then(|builtin| self.reduce_builtin(builtin, arguments)) {
			return Some(reduced);
		}
		let header = &self.module[definition];
		let levels = levels.substitution(header.level_parameters.as_deref());
		match function.body.as_ref()? {
			Body::Expression(body) =>
				Some(body.substitute(&Substitution::telescope(&header.parameters, arguments).with_levels(levels))),
			Body::Clauses(clauses) => {
				let (substitution, body) = self.match_clauses(clauses, arguments)?;
				Some(body.substitute(&substitution.with_levels(levels)))
			}
		}
	}

	fn reduce_builtin(&self, builtin: Builtin, arguments: &[Rc<Expression>]) -> Option<Rc<Expression>> {
		match (builtin, arguments) {
			(Builtin::At, [_, start, end, path, point]) => {
				let point = self.whnf(point);
				match point.as_ref() {
					Expression::ConCall { definition, .. } if *definition == prelude::LEFT => return Some(start.clone()),
					Expression::ConCall { definition, .. } if *definition == prelude::RIGHT => return Some(end.clone()),
					_ => {}
				}
				match self.whnf(path).as_ref() {
					Expression::Path { function, .. } => Some(Expression::app(function.clone(), [point])),
					_ => None,
				}
			}
			(_, [left, right]) => {
				let left = self.natural(left)?;
				let right = self.natural(right)?;
				builtin.fold(&left, &right)
			}
			_ => None,
		}
	}

	fn natural(&self, expression: &Rc<Expression>) -> Option<BigUint> { self.whnf(expression).as_natural() }

	/// The first clause whose patterns match, with the substitution binding its pattern variables.
	///
	/// Returns `None` when no clause matches or when matching is blocked on an argument that is not a constructor.
	fn match_clauses<'c>(
		&self,
		clauses: &'c [Clause],
		arguments: &[Rc<Expression>],
	) -> Option<(Substitution, &'c Rc<Expression>)> {
		'clauses: for clause in clauses {
			let mut substitution = Substitution::new();
			for (pattern, argument) in clause.patterns.iter().zip(arguments) {
				match self.match_pattern(pattern, argument, &mut substitution) {
					Match::Yes => {}
					Match::No => continue 'clauses,
					Match::Stuck => return None,
				}
			}
			return Some((substitution, &clause.body));
		}
		None
	}

	fn match_pattern(&self, pattern: &Pattern, argument: &Rc<Expression>, substitution: &mut Substitution) -> Match {
		let (constructor, patterns) = match pattern {
			Pattern::Binding(binding) => {
				substitution.add(*binding, argument.clone());
				return Match::Yes;
			}
			Pattern::Constructor { constructor, arguments } => (*constructor, arguments),
		};
		let argument = self.whnf(argument);
		match argument.as_ref() {
			Expression::ConCall { definition, arguments, .. } => {
				if *definition != constructor {
					return Match::No;
				}
				for (pattern, argument) in patterns.iter().zip(arguments) {
					match self.match_pattern(pattern, argument, substitution) {
						Match::Yes => {}
						other => return other,
					}
				}
				Match::Yes
			}
			Expression::Integer(n) => match (constructor, &patterns[..]) {
				(prelude::ZERO, []) if *n == BigUint::ZERO => Match::Yes,
				(prelude::SUC, [pattern]) if *n > BigUint::ZERO =>
					self.match_pattern(pattern, &Expression::integer(n - 1u32), substitution),
				_ => Match::No,
			},
			_ => Match::Stuck,
		}
	}

	/// Whether the expression is already in weak-head normal form. `Maybe` means it is blocked on an unsolved variable.
	pub fn is_whnf(&self, expression: &Rc<Expression>) -> Decision {
		use Expression as E;
		match expression.as_ref() {
			E::Inference(variable) => if self.metas.is_solved(*variable) { Decision::No } else { Decision::Maybe },
			E::App { function, .. } => match function.as_ref() {
				E::Lambda { .. } => Decision::No,
				_ => self.is_whnf(function),
			},
			E::Proj { tuple, .. } => match tuple.as_ref() {
				E::Tuple { .. } => Decision::No,
				_ => self.is_whnf(tuple),
			},
			E::Let { opaque: false, .. } => Decision::No,
			E::Let { clauses, body, opaque: true } => {
				let free = free_bindings(body);
				if clauses.iter().all(|clause| !free.contains(&clause.binding)) { Decision::No } else { self.is_whnf(body) }
			}
			E::Case { arguments, clauses, .. } => self.clauses_decision(clauses, arguments),
			E::FunCall { definition, arguments, .. } => {
				let Some(function) = self.module.function(*definition) else { return Decision::Yes };
				if function.kind == FunctionKind::Lemma {
					return Decision::Yes;
				}
				let builtin = match (function.builtin, &arguments[..]) {
					(Some(Builtin::At), [.., path, point]) => match (path.as_ref(), point.as_ref()) {
						(E::Path { .. }, _) => Decision::No,
						(_, E::ConCall { definition, .. })
							if *definition == prelude::LEFT || *definition == prelude::RIGHT =>
							Decision::No,
						_ => self.is_whnf(path).min(self.is_whnf(point)),
					},
					(Some(_), [left, right]) => match (left.as_natural(), right.as_natural()) {
						(Some(_), Some(_)) => Decision::No,
						_ => self.is_whnf(left).min(self.is_whnf(right)),
					},
					_ => Decision::Yes,
				};
				match &function.body {
					Some(Body::Expression(_)) => Decision::No,
					Some(Body::Clauses(clauses)) => builtin.min(self.clauses_decision(clauses, arguments)),
					None => builtin,
				}
			}
			E::FieldCall { argument, .. } => match argument.as_ref() {
				E::New(_) => Decision::No,
				_ => self.is_whnf(argument),
			},
			_ => Decision::Yes,
		}
	}

	fn clauses_decision(&self, clauses: &[Clause], arguments: &[Rc<Expression>]) -> Decision {
		if self.match_clauses(clauses, arguments).is_some() {
			return Decision::No;
		}
		match self.stuck_argument(clauses, arguments).as_deref() {
			Some(Expression::Inference(_)) => Decision::Maybe,
			_ => Decision::Yes,
		}
	}

	pub fn stuck_expression(&self, expression: &Rc<Expression>) -> Option<Rc<Expression>> {
		self.stuck_whnf(&self.whnf(expression))
	}

	fn stuck_whnf(&self, expression: &Rc<Expression>) -> Option<Rc<Expression>> {
		use Expression as E;
		match expression.as_ref() {
			E::Inference(_) | E::Error { .. } => Some(expression.clone()),
			E::App { function, .. } => self.stuck_whnf(function),
			E::Proj { tuple: argument, .. } | E::FieldCall { argument, .. } => self.stuck_whnf(argument),
			E::Let { body, opaque: true, .. } => self.stuck_whnf(body),
			E::Case { arguments, clauses, .. } => self.stuck_argument(clauses, arguments),
			E::FunCall { definition, arguments, .. } => {
				let function = self.module.function(*definition)?;
				if function.kind == FunctionKind::Lemma {
					return None;
				}
				match (&function.body, function.builtin, &arguments[..]) {
					(_, Some(Builtin::At), [.., path, point]) =>
						self.stuck_expression(point).or_else(|| self.stuck_expression(path)),
					(Some(Body::Clauses(clauses)), ..) => self.stuck_argument(clauses, arguments),
					(None, Some(_), [left, right]) =>
						self.stuck_expression(left).or_else(|| self.stuck_expression(right)),
					_ => None,
				}
			}
			_ => None,
		}
	}

	fn stuck_argument(&self, clauses: &[Clause], arguments: &[Rc<Expression>]) -> Option<Rc<Expression>> {
		arguments.iter().enumerate().find_map(|(i, argument)| {
			clauses
				.iter()
				.any(|clause| matches!(clause.patterns.get(i), Some(Pattern::Constructor { .. })))
				.then(|| self.stuck_expression(argument))
				.flatten()
		})
	}

	pub fn stuck_variable(&self, expression: &Rc<Expression>) -> Option<InferenceVariable> {
		match self.stuck_expression(expression)?.as_ref() {
			Expression::Inference(variable) => Some(*variable),
			_ => None,
		}
	}

	pub fn unsolved_variable(&self, expression: &Rc<Expression>) -> Option<InferenceVariable> {
		match self.whnf(expression).as_ref() {
			Expression::Inference(variable) => Some(*variable),
			_ => None,
		}
	}
}

/// Substitutes the clauses of a let into its body, last clause first so values may mention earlier clauses.
pub fn unfold_let(clauses: &[LetClause], body: &Rc<Expression>) -> Rc<Expression> {
	clauses
		.iter()
		.rev()
		.fold(body.clone(), |body, clause| body.substitute(&Substitution::single(clause.binding, clause.value.clone())))
}

struct Nf<'a> {
	normalizer: Normalizer<'a>,
}

impl Fold for Nf<'_> {
	fn fold(&mut self, expression: &Rc<Expression>) -> Rc<Expression> {
		let whnf = self.normalizer.whnf(expression);
		let folded = fold_children(self, &whnf);
		contract_eta(&folded)
	}
}

/// `\lam x => f x` to `f` and `path (\lam i => p @ i)` to `p`, when the bound variable is not otherwise used.
fn contract_eta(expression: &Rc<Expression>) -> Rc<Expression> {
	use Expression as E;
	match expression.as_ref() {
		E::Lambda { parameter, body } => match body.as_ref() {
			E::App { function, argument }
				if **argument == E::Reference(parameter.binding) && !free_bindings(function).contains(&parameter.binding) =>
				function.clone(),
			_ => expression.clone(),
		},
		E::Path { function, .. } => match function.as_ref() {
			E::Lambda { parameter, body } => match body.as_ref() {
				E::FunCall { definition, arguments, .. } if *definition == prelude::AT => match &arguments[..] {
					[.., path, point]
						if **point == E::Reference(parameter.binding)
							&& !free_bindings(path).contains(&parameter.binding) =>
						path.clone(),
					_ => expression.clone(),
				},
				_ => expression.clone(),
			},
			_ => expression.clone(),
		},
		_ => expression.clone(),
	}
}
