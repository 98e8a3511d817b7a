use std::rc::Rc;

use indexmap::IndexSet;

use crate::{
	ir::{
		definition::{Body, DefId, Definition, DefinitionKind, Module},
		expression::Expression,
	},
	op::traverse::{visit_clauses, Visit},
};

#[derive(Default)]
struct Collector {
	definitions: IndexSet<DefId>,
}

impl Visit for Collector {
	fn visit_definition(&mut self, definition: DefId) { self.definitions.insert(definition); }
}

/// Every definition an expression refers to, in order of first occurrence.
pub fn collect_definitions(expression: &Rc<Expression>) -> IndexSet<DefId> {
	let mut collector = Collector::default();
	collector.visit(expression);
	collector.definitions
}

/// Every definition the header or body of a definition refers to, itself included if it is recursive.
///
/// A data type depends on the types of its constructors, a class on the types of its fields.
pub fn collect_dependencies(module: &Module, definition: &Definition) -> IndexSet<DefId> {
	let mut collector = Collector::default();
	for parameter in &definition.parameters {
		collector.visit(&parameter.ty);
	}
	match &definition.kind {
		DefinitionKind::Function(function) => {
			collector.visit(&function.result_type);
			match &function.body {
				Some(Body::Expression(body)) => collector.visit(body),
				Some(Body::Clauses(clauses)) => visit_clauses(&mut collector, clauses),
				None => {}
			}
		}
		DefinitionKind::Data(data) =>
			for &constructor in &data.constructors {
				collector.definitions.insert(constructor);
				let parameters = module.get(constructor).map_or(&[][..], |constructor| &constructor.parameters);
				parameters.iter().for_each(|parameter| collector.visit(&parameter.ty));
			},
		DefinitionKind::Class(class) => {
			collector.definitions.extend(class.parents.iter().chain(&class.fields).copied());
			for field in class.fields.iter().filter_map(|&field| module.field(field)) {
				collector.visit(&field.ty);
			}
			class.implemented.values().for_each(|implementation| collector.visit(implementation));
		}
		DefinitionKind::Constructor(constructor) => {
			collector.definitions.insert(constructor.data);
		}
		DefinitionKind::Field(field) => {
			collector.definitions.insert(field.class);
			collector.visit(&field.ty);
		}
	}
	collector.definitions
}
