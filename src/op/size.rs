use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::{
	common::Binding,
	ir::{
		definition::{Body, Definition, DefinitionKind},
		expression::Expression,
		meta::{InferenceVariable, Metacontext},
	},
	op::traverse::{visit_children, Visit},
};

struct Size<'a> {
	metas: &'a Metacontext,
	visited: &'a mut FxHashSet<InferenceVariable>,
	nodes: usize,
}

impl Visit for Size<'_> {
	fn visit_inference(&mut self, variable: InferenceVariable) {
		if !self.visited.insert(variable) {
			return;
		}
		if let Some(solution) = self.metas.solution(variable) {
			self.visit(solution);
		}
	}

	fn visit_binder(&mut self, _: Binding) { self.nodes += 1; }

	fn visit(&mut self, expression: &Rc<Expression>) {
		self.nodes += 1;
		visit_children(self, expression);
	}
}

/// The number of nodes of an expression, with each solved variable's solution counted at most once.
pub fn size(metas: &Metacontext, expression: &Rc<Expression>, visited: &mut FxHashSet<InferenceVariable>) -> usize {
	let mut counter = Size { metas, visited, nodes: 0 };
	counter.visit(expression);
	counter.nodes
}

pub fn definition_size(metas: &Metacontext, definition: &Definition) -> usize {
	let mut visited = FxHashSet::default();
	let mut expressions: Vec<&Rc<Expression>> = definition.parameters.iter().map(|parameter| &parameter.ty).collect();
	match &definition.kind {
		DefinitionKind::Function(function) => {
			expressions.push(&function.result_type);
			match &function.body {
				Some(Body::Expression(body)) => expressions.push(body),
				Some(Body::Clauses(clauses)) => expressions.extend(clauses.iter().map(|clause| &clause.body)),
				None => {}
			}
		}
		DefinitionKind::Field(field) => expressions.push(&field.ty),
		DefinitionKind::Class(class) => expressions.extend(class.implemented.values()),
		DefinitionKind::Data(_) | DefinitionKind::Constructor(_) => {}
	}
	expressions.into_iter().map(|expression| size(metas, expression, &mut visited)).sum()
}
