use std::rc::Rc;

use crate::{
	common::Binding,
	ir::{
		definition::DefId,
		expression::{ClassCall, Clause, Expression, LetClause, Parameter, Pattern},
		level::{Level, Levels, Sort},
		meta::InferenceVariable,
	},
	utility::rc,
};

/// A structure-preserving rewrite of expressions. Every hook defaults to the identity.
pub trait Fold: Sized {
	fn fold_binding(&mut self, binding: Binding) -> Binding { binding }

	fn fold_reference(&mut self, binding: Binding) -> Rc<Expression> { Expression::reference(binding) }

	fn fold_inference(&mut self, variable: InferenceVariable) -> Rc<Expression> { Expression::inference(variable) }

	fn fold_level(&mut self, level: Level) -> Level { level }

	fn fold(&mut self, expression: &Rc<Expression>) -> Rc<Expression> { fold_children(self, expression) }
}

fn fold_sort<F: Fold>(folder: &mut F, sort: &Sort) -> Sort { Sort::new(folder.fold_level(sort.p), folder.fold_level(sort.h)) }

fn fold_levels<F: Fold>(folder: &mut F, levels: &Levels) -> Levels {
	match levels {
		Levels::Pair { p, h } => Levels::Pair { p: folder.fold_level(*p), h: folder.fold_level(*h) },
		Levels::List(levels) => Levels::List(levels.iter().map(|level| folder.fold_level(*level)).collect()),
	}
}

fn fold_all<F: Fold>(folder: &mut F, expressions: &[Rc<Expression>]) -> Vec<Rc<Expression>> {
	expressions.iter().map(|expression| folder.fold(expression)).collect()
}

fn fold_parameter<F: Fold>(folder: &mut F, parameter: &Parameter) -> Parameter {
	let ty = folder.fold(&parameter.ty);
	Parameter { binding: folder.fold_binding(parameter.binding), ty, ..parameter.clone() }
}

fn fold_parameters<F: Fold>(folder: &mut F, parameters: &[Parameter]) -> Vec<Parameter> {
	parameters.iter().map(|parameter| fold_parameter(folder, parameter)).collect()
}

fn fold_pattern<F: Fold>(folder: &mut F, pattern: &Pattern) -> Pattern {
	match pattern {
		Pattern::Binding(binding) => Pattern::Binding(folder.fold_binding(*binding)),
		Pattern::Constructor { constructor, arguments } => Pattern::Constructor {
			constructor: *constructor,
			arguments: arguments.iter().map(|pattern| fold_pattern(folder, pattern)).collect(),
		},
	}
}

pub fn fold_clauses<F: Fold>(folder: &mut F, clauses: &[Clause]) -> Vec<Clause> {
	clauses
		.iter()
		.map(|clause| {
			let patterns = clause.patterns.iter().map(|pattern| fold_pattern(folder, pattern)).collect();
			Clause { patterns, body: folder.fold(&clause.body) }
		})
		.collect()
}

pub fn fold_class_call<F: Fold>(folder: &mut F, class_call: &ClassCall) -> ClassCall {
	let this = folder.fold_binding(class_call.this);
	ClassCall {
		definition: class_call.definition,
		levels: fold_levels(folder, &class_call.levels),
		this,
		implementations: class_call
			.implementations
			.iter()
			.map(|(field, implementation)| (*field, folder.fold(implementation)))
			.collect(),
		sort: fold_sort(folder, &class_call.sort),
	}
}

pub fn fold_children<F: Fold>(folder: &mut F, expression: &Rc<Expression>) -> Rc<Expression> {
	use Expression as E;
	match expression.as_ref() {
		E::Reference(binding) => folder.fold_reference(*binding),
		E::Inference(variable) => folder.fold_inference(*variable),
		E::App { function, argument } => rc!(E::App { function: folder.fold(function), argument: folder.fold(argument) }),
		E::Lambda { parameter, body } => {
			let parameter = fold_parameter(folder, parameter);
			rc!(E::Lambda { parameter, body: folder.fold(body) })
		}
		E::Pi { sort, parameter, codomain } => {
			let parameter = fold_parameter(folder, parameter);
			rc!(E::Pi { sort: fold_sort(folder, sort), parameter, codomain: folder.fold(codomain) })
		}
		E::Sigma { sort, parameters } =>
			rc!(E::Sigma { sort: fold_sort(folder, sort), parameters: fold_parameters(folder, parameters) }),
		E::Tuple { fields, ty } => rc!(E::Tuple { fields: fold_all(folder, fields), ty: folder.fold(ty) }),
		E::Proj { tuple, field } => rc!(E::Proj { tuple: folder.fold(tuple), field: *field }),
		E::Universe(sort) => rc!(E::Universe(fold_sort(folder, sort))),
		E::Let { clauses, body, opaque } => {
			let clauses = clauses
				.iter()
				.map(|clause| {
					let ty = folder.fold(&clause.ty);
					let value = folder.fold(&clause.value);
					LetClause { binding: folder.fold_binding(clause.binding), name: clause.name, ty, value }
				})
				.collect();
			rc!(E::Let { clauses, body: folder.fold(body), opaque: *opaque })
		}
		E::Case { arguments, parameters, result_type, clauses } => {
			let arguments = fold_all(folder, arguments);
			let parameters = fold_parameters(folder, parameters);
			let result_type = folder.fold(result_type);
			rc!(E::Case { arguments, parameters, result_type, clauses: fold_clauses(folder, clauses) })
		}
		E::Path { levels, ty, function } =>
			rc!(E::Path { levels: fold_levels(folder, levels), ty: folder.fold(ty), function: folder.fold(function) }),
		E::Array { element_type, elements } =>
			rc!(E::Array { element_type: folder.fold(element_type), elements: fold_all(folder, elements) }),
		E::Integer(_) => expression.clone(),
		E::FunCall { definition, levels, arguments } => rc!(E::FunCall {
			definition: *definition,
			levels: fold_levels(folder, levels),
			arguments: fold_all(folder, arguments),
		}),
		E::DataCall { definition, levels, arguments } => rc!(E::DataCall {
			definition: *definition,
			levels: fold_levels(folder, levels),
			arguments: fold_all(folder, arguments),
		}),
		E::ConCall { definition, levels, data_arguments, arguments } => rc!(E::ConCall {
			definition: *definition,
			levels: fold_levels(folder, levels),
			data_arguments: fold_all(folder, data_arguments),
			arguments: fold_all(folder, arguments),
		}),
		E::ClassCall(class_call) => rc!(E::ClassCall(fold_class_call(folder, class_call))),
		E::FieldCall { field, argument } => rc!(E::FieldCall { field: *field, argument: folder.fold(argument) }),
		E::New(class_call) => rc!(E::New(fold_class_call(folder, class_call))),
		E::Box { expression, ty } => rc!(E::Box { expression: folder.fold(expression), ty: folder.fold(ty) }),
		E::Error { expression: inner, goal } =>
			rc!(E::Error { expression: inner.as_ref().map(|inner| folder.fold(inner)), goal: *goal }),
	}
}

/// A read-only walk over expressions. Hooks default to doing nothing.
pub trait Visit: Sized {
	fn visit_binder(&mut self, _binding: Binding) {}

	fn visit_reference(&mut self, _binding: Binding) {}

	fn visit_inference(&mut self, _variable: InferenceVariable) {}

	fn visit_definition(&mut self, _definition: DefId) {}

	fn visit(&mut self, expression: &Rc<Expression>) { visit_children(self, expression) }
}

fn visit_parameters<V: Visit>(visitor: &mut V, parameters: &[Parameter]) {
	for parameter in parameters {
		visitor.visit(&parameter.ty);
		visitor.visit_binder(parameter.binding);
	}
}

fn visit_pattern<V: Visit>(visitor: &mut V, pattern: &Pattern) {
	match pattern {
		Pattern::Binding(binding) => visitor.visit_binder(*binding),
		Pattern::Constructor { constructor, arguments } => {
			visitor.visit_definition(*constructor);
			arguments.iter().for_each(|pattern| visit_pattern(visitor, pattern));
		}
	}
}

pub fn visit_clauses<V: Visit>(visitor: &mut V, clauses: &[Clause]) {
	for clause in clauses {
		clause.patterns.iter().for_each(|pattern| visit_pattern(visitor, pattern));
		visitor.visit(&clause.body);
	}
}

fn visit_class_call<V: Visit>(visitor: &mut V, class_call: &ClassCall) {
	visitor.visit_definition(class_call.definition);
	visitor.visit_binder(class_call.this);
	for (field, implementation) in &class_call.implementations {
		visitor.visit_definition(*field);
		visitor.visit(implementation);
	}
}

pub fn visit_children<V: Visit>(visitor: &mut V, expression: &Rc<Expression>) {
	use Expression as E;
	match expression.as_ref() {
		E::Reference(binding) => visitor.visit_reference(*binding),
		E::Inference(variable) => visitor.visit_inference(*variable),
		E::App { function, argument } => {
			visitor.visit(function);
			visitor.visit(argument);
		}
		E::Lambda { parameter, body } => {
			visit_parameters(visitor, std::slice::from_ref(parameter));
			visitor.visit(body);
		}
		E::Pi { parameter, codomain, .. } => {
			visit_parameters(visitor, std::slice::from_ref(parameter));
			visitor.visit(codomain);
		}
		E::Sigma { parameters, .. } => visit_parameters(visitor, parameters),
		E::Tuple { fields, ty } => {
			fields.iter().for_each(|field| visitor.visit(field));
			visitor.visit(ty);
		}
		E::Proj { tuple, .. } => visitor.visit(tuple),
		E::Universe(_) | E::Integer(_) => {}
		E::Let { clauses, body, .. } => {
			for clause in clauses {
				visitor.visit(&clause.ty);
				visitor.visit(&clause.value);
				visitor.visit_binder(clause.binding);
			}
			visitor.visit(body);
		}
		E::Case { arguments, parameters, result_type, clauses } => {
			arguments.iter().for_each(|argument| visitor.visit(argument));
			visit_parameters(visitor, parameters);
			visitor.visit(result_type);
			visit_clauses(visitor, clauses);
		}
		E::Path { ty, function, .. } => {
			visitor.visit(ty);
			visitor.visit(function);
		}
		E::Array { element_type, elements } => {
			visitor.visit(element_type);
			elements.iter().for_each(|element| visitor.visit(element));
		}
		E::FunCall { definition, arguments, .. } | E::DataCall { definition, arguments, .. } => {
			visitor.visit_definition(*definition);
			arguments.iter().for_each(|argument| visitor.visit(argument));
		}
		E::ConCall { definition, data_arguments, arguments, .. } => {
			visitor.visit_definition(*definition);
			data_arguments.iter().chain(arguments).for_each(|argument| visitor.visit(argument));
		}
		E::ClassCall(class_call) | E::New(class_call) => visit_class_call(visitor, class_call),
		E::FieldCall { field, argument } => {
			visitor.visit_definition(*field);
			visitor.visit(argument);
		}
		E::Box { expression, ty } => {
			visitor.visit(expression);
			visitor.visit(ty);
		}
		E::Error { expression, .. } =>
			if let Some(expression) = expression {
				visitor.visit(expression);
			},
	}
}
