use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::{
	common::Binding,
	ir::{
		definition::DefinitionKind,
		expression::{Expression, Parameter},
		level::Sort,
		prelude,
	},
	op::{
		elaborate::Context,
		normalize::Normalizer,
		substitute::{Substitute as _, Substitution},
	},
};

/// The sort of `\Pi (x : A) -> B` given the sorts of `A` and `B`.
pub fn pi_sort(domain: Option<Sort>, codomain: Option<Sort>) -> Sort {
	let codomain = codomain.unwrap_or(Sort::SET0);
	match domain {
		Some(domain) if !codomain.is_prop() && !domain.is_prop() =>
			Sort::new(domain.p.max(codomain.p).unwrap_or(codomain.p), codomain.h),
		_ => codomain,
	}
}

/// Computes types of checked expressions. Bindings not in the context must be introduced by the expression itself.
pub struct Typing<'a> {
	normalizer: Normalizer<'a>,
	context: &'a Context,
	local: FxHashMap<Binding, Rc<Expression>>,
}

impl<'a> Typing<'a> {
	pub fn new(normalizer: Normalizer<'a>, context: &'a Context) -> Self {
		Self { normalizer, context, local: FxHashMap::default() }
	}

	fn bind(&mut self, parameter: &Parameter) { self.local.insert(parameter.binding, parameter.ty.clone()); }

	pub fn sort_of(&mut self, ty: &Rc<Expression>) -> Option<Sort> {
		let universe = self.type_of(ty);
		match self.normalizer.whnf(&universe).as_ref() {
			Expression::Universe(sort) => Some(*sort),
			_ => None,
		}
	}

	pub fn type_of(&mut self, expression: &Rc<Expression>) -> Rc<Expression> {
		use Expression as E;
		let module = self.normalizer.module;
		match expression.as_ref() {
			E::Reference(binding) => self
				.local
				.get(binding)
				.cloned()
				.or_else(|| self.context.lookup(*binding).cloned())
				.unwrap_or_else(Expression::error),
			E::Inference(variable) => self.normalizer.metas[*variable].ty.clone(),
			E::App { function, argument } => {
				let ty = self.type_of(function);
				match self.normalizer.whnf(&ty).as_ref() {
					E::Pi { parameter, codomain, .. } =>
						codomain.substitute(&Substitution::single(parameter.binding, argument.clone())),
					_ => Expression::error(),
				}
			}
			E::Lambda { parameter, body } => {
				self.bind(parameter);
				let codomain = self.type_of(body);
				let sort = pi_sort(self.sort_of(&parameter.ty), self.sort_of(&codomain));
				Expression::pi(sort, parameter.clone(), codomain)
			}
			E::Pi { sort, .. } | E::Sigma { sort, .. } => Expression::universe(*sort),
			E::Tuple { ty, .. } => ty.clone(),
			E::Proj { tuple, field } => {
				let ty = self.type_of(tuple);
				match self.normalizer.whnf(&ty).as_ref() {
					E::Sigma { parameters, .. } if *field < parameters.len() => {
						let mut substitution = Substitution::new();
						for (i, parameter) in parameters[..*field].iter().enumerate() {
							substitution.add(parameter.binding, Expression::proj(tuple.clone(), i));
						}
						parameters[*field].ty.substitute(&substitution)
					}
					_ => Expression::error(),
				}
			}
			E::Universe(sort) => Expression::universe(sort.succ()),
			E::Let { clauses, body, .. } => {
				for clause in clauses {
					self.local.insert(clause.binding, clause.ty.clone());
				}
				let ty = self.type_of(body);
				crate::op::normalize::unfold_let(clauses, &ty)
			}
			E::Case { arguments, parameters, result_type, .. } =>
				result_type.substitute(&Substitution::telescope(parameters, arguments)),
			E::Path { levels, ty, function } => Expression::data_call(
				prelude::PATH,
				levels.clone(),
				vec![
					ty.clone(),
					Expression::app(function.clone(), [Expression::left()]),
					Expression::app(function.clone(), [Expression::right()]),
				],
			),
			E::Array { element_type, elements } => {
				let sort = self.sort_of(element_type).unwrap_or(Sort::SET0);
				prelude::array_type(module, element_type.clone(), sort, elements.len())
			}
			E::Integer(_) => Expression::nat(),
			E::FunCall { definition, levels, arguments } => {
				let header = &module[*definition];
				let DefinitionKind::Function(function) = &header.kind else { return Expression::error() };
				let levels = levels.substitution(header.level_parameters.as_deref());
				function.result_type.substitute(&Substitution::telescope(&header.parameters, arguments).with_levels(levels))
			}
			E::DataCall { definition, levels, .. } => match module.data(*definition) {
				Some(data) => Expression::universe(
					data.sort.substitute(&levels.substitution(module[*definition].level_parameters.as_deref())),
				),
				None => Expression::error(),
			},
			E::ConCall { definition, levels, data_arguments, .. } => match module.constructor(*definition) {
				Some(constructor) => Expression::data_call(constructor.data, levels.clone(), data_arguments.clone()),
				None => Expression::error(),
			},
			E::ClassCall(class_call) => Expression::universe(class_call.sort),
			E::FieldCall { field, argument } => {
				let Some(data) = module.field(*field) else { return Expression::error() };
				let receiver = self.type_of(argument);
				let levels = match self.normalizer.whnf(&receiver).as_ref() {
					E::ClassCall(class_call) =>
						class_call.levels.substitution(module[class_call.definition].level_parameters.as_deref()),
					_ => Default::default(),
				};
				data.ty.substitute(&Substitution::single(data.this, argument.clone()).with_levels(levels))
			}
			E::New(class_call) => Expression::class_call(class_call.clone()),
			E::Box { ty, .. } => ty.clone(),
			E::Error { .. } => Expression::error(),
		}
	}
}
