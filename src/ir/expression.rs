use std::rc::Rc;

use indexmap::IndexMap;
use num_bigint::BigUint;

use crate::{
	common::{Binding, Name},
	ir::{
		definition::{DefId, DefinitionKind, FunctionKind, Module},
		level::{Levels, Sort},
		meta::InferenceVariable,
		prelude,
	},
	utility::rc,
};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Parameter {
	pub binding: Binding,
	pub name: Option<Name>,
	pub explicit: bool,
	pub ty: Rc<Expression>,
}

impl Parameter {
	pub fn new(name: Option<Name>, ty: Rc<Expression>) -> Self {
		Self { binding: Binding::fresh(), name, explicit: true, ty }
	}

	pub fn implicit(name: Option<Name>, ty: Rc<Expression>) -> Self { Self { explicit: false, ..Self::new(name, ty) } }

	pub fn reference(&self) -> Rc<Expression> { Expression::reference(self.binding) }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LetClause {
	pub binding: Binding,
	pub name: Option<Name>,
	pub ty: Rc<Expression>,
	pub value: Rc<Expression>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Pattern {
	Binding(Binding),
	Constructor { constructor: DefId, arguments: Vec<Pattern> },
}

impl Pattern {
	pub fn bindings(&self, bindings: &mut Vec<Binding>) {
		match self {
			Self::Binding(binding) => bindings.push(*binding),
			Self::Constructor { arguments, .. } => arguments.iter().for_each(|pattern| pattern.bindings(bindings)),
		}
	}
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Clause {
	pub patterns: Vec<Pattern>,
	pub body: Rc<Expression>,
}

/// A record type with some of its fields implemented. Implementations may refer to `this`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ClassCall {
	pub definition: DefId,
	pub levels: Levels,
	pub this: Binding,
	pub implementations: IndexMap<DefId, Rc<Expression>>,
	pub sort: Sort,
}

impl ClassCall {
	/// Builds a class call, computing its sort from the fields left unimplemented.
	///
	/// Panics if an implemented field does not belong to the class.
	pub fn new(
		module: &Module,
		definition: DefId,
		levels: Levels,
		this: Binding,
		implementations: IndexMap<DefId, Rc<Expression>>,
	) -> Self {
		let DefinitionKind::Class(class) = &module[definition].kind else {
			panic!("class call of non-class definition {definition:?}")
		};
		for field in implementations.keys() {
			assert!(class.fields.contains(field), "field {field:?} does not belong to class {definition:?}");
		}
		let substitution = levels.substitution(module[definition].level_parameters.as_deref());
		let sort = module.class_sort(definition, |field| implementations.contains_key(&field)).substitute(&substitution);
		Self { definition, levels, this, implementations, sort }
	}

	pub fn empty(module: &Module, definition: DefId, levels: Levels) -> Self {
		Self::new(module, definition, levels, Binding::fresh(), IndexMap::new())
	}

	pub fn is_complete(&self, module: &Module) -> bool {
		module.class(self.definition).is_some_and(|class| {
			class.fields.iter().all(|field| self.implementations.contains_key(field) || class.implemented.contains_key(field))
		})
	}
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Expression {
	Reference(Binding),
	Inference(InferenceVariable),
	App { function: Rc<Self>, argument: Rc<Self> },
	Lambda { parameter: Parameter, body: Rc<Self> },
	Pi { sort: Sort, parameter: Parameter, codomain: Rc<Self> },
	Sigma { sort: Sort, parameters: Vec<Parameter> },
	Tuple { fields: Vec<Rc<Self>>, ty: Rc<Self> },
	Proj { tuple: Rc<Self>, field: usize },
	Universe(Sort),
	/// `opaque` lets (`\have`) are never unfolded by weak-head normalization.
	Let { clauses: Vec<LetClause>, body: Rc<Self>, opaque: bool },
	Case { arguments: Vec<Rc<Self>>, parameters: Vec<Parameter>, result_type: Rc<Self>, clauses: Vec<Clause> },
	/// A path over the type family `ty : I -> \Type` given by `function : \Pi (i : I) -> ty i`.
	Path { levels: Levels, ty: Rc<Self>, function: Rc<Self> },
	Array { element_type: Rc<Self>, elements: Vec<Rc<Self>> },
	Integer(BigUint),
	FunCall { definition: DefId, levels: Levels, arguments: Vec<Rc<Self>> },
	DataCall { definition: DefId, levels: Levels, arguments: Vec<Rc<Self>> },
	ConCall { definition: DefId, levels: Levels, data_arguments: Vec<Rc<Self>>, arguments: Vec<Rc<Self>> },
	ClassCall(ClassCall),
	FieldCall { field: DefId, argument: Rc<Self> },
	New(ClassCall),
	/// A proof of a proposition, compared only by its type.
	Box { expression: Rc<Self>, ty: Rc<Self> },
	/// Stands in for an ill-typed subterm so checking can continue.
	Error { expression: Option<Rc<Self>>, goal: bool },
}

impl Expression {
	pub fn reference(binding: Binding) -> Rc<Self> { rc!(Self::Reference(binding)) }

	pub fn inference(variable: InferenceVariable) -> Rc<Self> { rc!(Self::Inference(variable)) }

	pub fn universe(sort: Sort) -> Rc<Self> { rc!(Self::Universe(sort)) }

	pub fn integer(value: impl Into<BigUint>) -> Rc<Self> { rc!(Self::Integer(value.into())) }

	pub fn error() -> Rc<Self> { rc!(Self::Error { expression: None, goal: false }) }

	pub fn error_at(expression: Rc<Self>) -> Rc<Self> { rc!(Self::Error { expression: Some(expression), goal: false }) }

	pub fn app(function: Rc<Self>, arguments: impl IntoIterator<Item = Rc<Self>>) -> Rc<Self> {
		arguments.into_iter().fold(function, |function, argument| rc!(Self::App { function, argument }))
	}

	pub fn lambda(parameter: Parameter, body: Rc<Self>) -> Rc<Self> { rc!(Self::Lambda { parameter, body }) }

	pub fn pi(sort: Sort, parameter: Parameter, codomain: Rc<Self>) -> Rc<Self> {
		rc!(Self::Pi { sort, parameter, codomain })
	}

	pub fn arrow(sort: Sort, domain: Rc<Self>, codomain: Rc<Self>) -> Rc<Self> {
		Self::pi(sort, Parameter::new(None, domain), codomain)
	}

	pub fn proj(tuple: Rc<Self>, field: usize) -> Rc<Self> { rc!(Self::Proj { tuple, field }) }

	pub fn class_call(class_call: ClassCall) -> Rc<Self> { rc!(Self::ClassCall(class_call)) }

	pub fn data_call(definition: DefId, levels: Levels, arguments: Vec<Rc<Self>>) -> Rc<Self> {
		rc!(Self::DataCall { definition, levels, arguments })
	}

	pub fn con_call(
		definition: DefId,
		levels: Levels,
		data_arguments: Vec<Rc<Self>>,
		arguments: Vec<Rc<Self>>,
	) -> Rc<Self> {
		rc!(Self::ConCall { definition, levels, data_arguments, arguments })
	}

	pub fn fun_call(module: &Module, definition: DefId, levels: Levels, arguments: Vec<Rc<Self>>) -> Rc<Self> {
		if let Some(builtin) = module.function(definition).and_then(|function| function.builtin) {
			if let [left, right] = &arguments[..] {
				if let (Self::Integer(left), Self::Integer(right)) = (left.as_ref(), right.as_ref()) {
					if let Some(folded) = builtin.fold(left, right) {
						return folded;
					}
				}
			}
		}
		rc!(Self::FunCall { definition, levels, arguments })
	}

	pub fn field_call(module: &Module, field: DefId, argument: Rc<Self>) -> Rc<Self> {
		if let Self::New(class_call) = argument.as_ref() {
			if let Some(implementation) = module.implementation(class_call, field, &argument) {
				return implementation;
			}
		}
		rc!(Self::FieldCall { field, argument })
	}

	pub fn nat() -> Rc<Self> { Self::data_call(prelude::NAT, Levels::empty(), Vec::new()) }

	pub fn fin(size: Rc<Self>) -> Rc<Self> { Self::data_call(prelude::FIN, Levels::empty(), vec![size]) }

	pub fn interval() -> Rc<Self> { Self::data_call(prelude::INTERVAL, Levels::empty(), Vec::new()) }

	pub fn left() -> Rc<Self> { Self::con_call(prelude::LEFT, Levels::empty(), Vec::new(), Vec::new()) }

	pub fn right() -> Rc<Self> { Self::con_call(prelude::RIGHT, Levels::empty(), Vec::new(), Vec::new()) }

	pub fn zero() -> Rc<Self> { Self::con_call(prelude::ZERO, Levels::empty(), Vec::new(), Vec::new()) }

	pub fn suc(n: Rc<Self>) -> Rc<Self> { Self::con_call(prelude::SUC, Levels::empty(), Vec::new(), vec![n]) }

	pub fn spine(self: &Rc<Self>) -> (&Rc<Self>, Vec<&Rc<Self>>) {
		let mut head = self;
		let mut arguments = Vec::new();
		while let Self::App { function, argument } = head.as_ref() {
			arguments.push(argument);
			head = function;
		}
		arguments.reverse();
		(head, arguments)
	}

	/// Boxed terms are proofs compared only by their types: boxes and calls of lemmas.
	pub fn is_boxed(&self, module: &Module) -> bool {
		match self {
			Self::Box { .. } => true,
			Self::FunCall { definition, .. } =>
				module.function(*definition).is_some_and(|function| function.kind == FunctionKind::Lemma),
			_ => false,
		}
	}

	pub fn is_error(&self) -> bool { matches!(self, Self::Error { .. }) }

	pub fn as_natural(&self) -> Option<BigUint> {
		match self {
			Self::Integer(value) => Some(value.clone()),
			Self::ConCall { definition, .. } if *definition == prelude::ZERO => Some(BigUint::ZERO),
			Self::ConCall { definition, arguments, .. } if *definition == prelude::SUC =>
				arguments.first()?.as_natural().map(|n| n + 1u32),
			_ => None,
		}
	}
}
