use std::{cell::Cell, ops::Index, rc::Rc};

use indexmap::IndexMap;
use lasso::Rodeo;
use num_bigint::BigUint;

use crate::{
	common::{Binding, Name, SourceNode},
	ir::{
		expression::{ClassCall, Clause, Expression, Parameter},
		level::{Level, LevelParameter, LevelVariable, Levels, Sort, Variance},
		prelude,
	},
	op::substitute::{Substitute as _, Substitution},
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DefId(pub(crate) u32);

/// Typechecking status. Later variants are better.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Status {
	NeedsChecking,
	TypeChecking,
	HasErrors,
	DepErrors,
	HasWarnings,
	DepWarnings,
	NoErrors,
}

impl Status {
	pub fn header_is_ok(self) -> bool { !matches!(self, Self::NeedsChecking | Self::TypeChecking) }

	pub fn is_ok(self) -> bool { self >= Self::HasWarnings }

	pub fn has_errors(self) -> bool { matches!(self, Self::HasErrors | Self::DepErrors) }

	pub fn needs_checking(self) -> bool { !self.header_is_ok() }

	pub fn as_dependency(self) -> Self {
		match self {
			Self::HasErrors => Self::DepErrors,
			Self::HasWarnings => Self::DepWarnings,
			status => status,
		}
	}

	/// Tightens a status: a status still needing checking is replaced, otherwise the worse one wins.
	pub fn add(self, other: Self) -> Self { if self.needs_checking() { other } else { self.min(other) } }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum FunctionKind {
	Function,
	/// Never unfolded; calls are compared as boxed proofs.
	Lemma,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Builtin {
	Plus,
	Mul,
	Minus,
	Div,
	Mod,
	At,
}

impl Builtin {
	pub fn fold(self, left: &BigUint, right: &BigUint) -> Option<Rc<Expression>> {
		let zero = BigUint::ZERO;
		Some(match self {
			Self::Plus => Expression::integer(left + right),
			Self::Mul => Expression::integer(left * right),
			Self::Minus if left >= right => Expression::con_call(
				prelude::POS,
				Levels::empty(),
				Vec::new(),
				vec![Expression::integer(left - right)],
			),
			Self::Minus => Expression::con_call(
				prelude::NEG,
				Levels::empty(),
				Vec::new(),
				vec![Expression::integer(right - left)],
			),
			Self::Div if *right == zero => Expression::integer(zero),
			Self::Div => Expression::integer(left / right),
			Self::Mod if *right == zero => Expression::integer(left.clone()),
			Self::Mod => Expression::integer(left % right),
			Self::At => return None,
		})
	}
}

#[derive(Clone, PartialEq, Debug)]
pub enum Body {
	Expression(Rc<Expression>),
	Clauses(Vec<Clause>),
}

#[derive(Clone, PartialEq, Debug)]
pub struct Function {
	pub kind: FunctionKind,
	pub result_type: Rc<Expression>,
	pub body: Option<Body>,
	pub builtin: Option<Builtin>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Data {
	pub sort: Sort,
	pub constructors: Vec<DefId>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Class {
	pub parents: Vec<DefId>,
	pub fields: Vec<DefId>,
	pub implemented: IndexMap<DefId, Rc<Expression>>,
	pub this: Binding,
	pub classifying_field: Option<DefId>,
	/// The sort of the class with nothing implemented.
	pub sort: Sort,
}

/// Parameters of a constructor follow the parameters of its data type.
#[derive(Clone, PartialEq, Debug)]
pub struct Constructor {
	pub data: DefId,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Field {
	pub class: DefId,
	pub this: Binding,
	pub ty: Rc<Expression>,
	pub sort: Sort,
	pub property: bool,
}

#[derive(Clone, PartialEq, Debug)]
pub enum DefinitionKind {
	Function(Function),
	Data(Data),
	Class(Class),
	Constructor(Constructor),
	Field(Field),
}

#[derive(Debug)]
pub struct Definition {
	pub name: Name,
	pub source: SourceNode,
	pub parameters: Vec<Parameter>,
	/// `None` for the standard `\lp`/`\lh` signature.
	pub level_parameters: Option<Vec<LevelParameter>>,
	pub kind: DefinitionKind,
	status: Cell<Status>,
}

impl Definition {
	pub fn new(name: Name, parameters: Vec<Parameter>, kind: DefinitionKind) -> Self {
		Self {
			name,
			source: SourceNode::default(),
			parameters,
			level_parameters: None,
			kind,
			status: Cell::new(Status::NeedsChecking),
		}
	}

	pub fn function(name: Name, parameters: Vec<Parameter>, result_type: Rc<Expression>, body: Option<Body>) -> Self {
		Self::new(
			name,
			parameters,
			DefinitionKind::Function(Function { kind: FunctionKind::Function, result_type, body, builtin: None }),
		)
	}

	pub fn lemma(name: Name, parameters: Vec<Parameter>, result_type: Rc<Expression>, body: Rc<Expression>) -> Self {
		Self::new(
			name,
			parameters,
			DefinitionKind::Function(Function {
				kind: FunctionKind::Lemma,
				result_type,
				body: Some(Body::Expression(body)),
				builtin: None,
			}),
		)
	}

	pub fn with_status(self, status: Status) -> Self {
		self.status.set(status);
		self
	}

	pub fn with_source(self, source: SourceNode) -> Self { Self { source, ..self } }

	pub fn with_level_parameters(self, level_parameters: Vec<LevelParameter>) -> Self {
		Self { level_parameters: Some(level_parameters), ..self }
	}

	pub fn status(&self) -> Status { self.status.get() }

	pub fn set_status(&self, status: Status) { self.status.set(status) }

	pub fn add_status(&self, status: Status) { self.status.set(self.status.get().add(status)) }

	pub fn levels(&self) -> Levels {
		let Some(parameters) = &self.level_parameters else { return Levels::std() };
		let mut indices = [0u16; 2];
		let levels = parameters.iter().map(|parameter| {
			let index = &mut indices[parameter.kind as usize];
			let level = Level::var(LevelVariable::Param { kind: parameter.kind, index: *index });
			*index += 1;
			level
		});
		Levels::List(levels.collect())
	}

	pub fn variances(&self) -> Vec<Variance> {
		match &self.level_parameters {
			Some(parameters) => parameters.iter().map(|parameter| parameter.variance).collect(),
			None => match self.kind {
				DefinitionKind::Data(_) | DefinitionKind::Class(_) => vec![Variance::Covariant; 2],
				_ => vec![Variance::Invariant; 2],
			},
		}
	}
}

/// The definitions visible to the checker, in insertion order. Starts with the prelude.
#[derive(Debug)]
pub struct Module {
	definitions: Vec<Definition>,
	pub interner: Rodeo,
}

impl Default for Module {
	fn default() -> Self { Self::new() }
}

impl Module {
	pub fn new() -> Self {
		let mut module = Self { definitions: Vec::new(), interner: Rodeo::default() };
		prelude::install(&mut module);
		module
	}

	pub fn intern(&mut self, name: &str) -> Name { self.interner.get_or_intern(name) }

	pub fn resolve(&self, name: Name) -> &str { self.interner.resolve(&name) }

	pub fn next_id(&self) -> DefId { DefId(self.definitions.len() as u32) }

	pub fn add(&mut self, definition: Definition) -> DefId {
		let id = self.next_id();
		self.definitions.push(definition);
		id
	}

	pub fn get(&self, id: DefId) -> Option<&Definition> { self.definitions.get(id.0 as usize) }

	pub fn checked(&self, id: DefId) -> Option<&Definition> {
		self.get(id).filter(|definition| definition.status().header_is_ok())
	}

	pub fn find(&self, name: &str) -> Option<DefId> {
		let name = self.interner.get(name)?;
		self.definitions.iter().position(|definition| definition.name == name).map(|i| DefId(i as u32))
	}

	pub fn definitions(&self) -> impl Iterator<Item = (DefId, &Definition)> {
		self.definitions.iter().enumerate().map(|(i, definition)| (DefId(i as u32), definition))
	}

	pub fn function(&self, id: DefId) -> Option<&Function> {
		match &self.get(id)?.kind {
			DefinitionKind::Function(function) => Some(function),
			_ => None,
		}
	}

	pub fn data(&self, id: DefId) -> Option<&Data> {
		match &self.get(id)?.kind {
			DefinitionKind::Data(data) => Some(data),
			_ => None,
		}
	}

	pub fn class(&self, id: DefId) -> Option<&Class> {
		match &self.get(id)?.kind {
			DefinitionKind::Class(class) => Some(class),
			_ => None,
		}
	}

	pub fn constructor(&self, id: DefId) -> Option<&Constructor> {
		match &self.get(id)?.kind {
			DefinitionKind::Constructor(constructor) => Some(constructor),
			_ => None,
		}
	}

	pub fn field(&self, id: DefId) -> Option<&Field> {
		match &self.get(id)?.kind {
			DefinitionKind::Field(field) => Some(field),
			_ => None,
		}
	}

	pub fn is_subclass(&self, sub: DefId, sup: DefId) -> bool {
		sub == sup || self.class(sub).is_some_and(|class| class.parents.iter().any(|&parent| self.is_subclass(parent, sup)))
	}

	/// The implementation of `field` in a class call, with `this` replaced by `instance`.
	pub fn implementation(
		&self,
		class_call: &ClassCall,
		field: DefId,
		instance: &Rc<Expression>,
	) -> Option<Rc<Expression>> {
		if let Some(implementation) = class_call.implementations.get(&field) {
			return Some(implementation.substitute(&Substitution::single(class_call.this, instance.clone())));
		}
		let class = self.class(class_call.definition)?;
		let implementation = class.implemented.get(&field)?;
		let levels = class_call.levels.substitution(self[class_call.definition].level_parameters.as_deref());
		Some(implementation.substitute(&Substitution::single(class.this, instance.clone()).with_levels(levels)))
	}

	pub fn is_implemented(&self, class_call: &ClassCall, field: DefId) -> bool {
		class_call.implementations.contains_key(&field)
			|| self.class(class_call.definition).is_some_and(|class| class.implemented.contains_key(&field))
	}

	pub fn class_sort(&self, class: DefId, implemented: impl Fn(DefId) -> bool) -> Sort {
		let Some(data) = self.class(class) else { return Sort::PROP };
		data.fields
			.iter()
			.filter(|&&field| !implemented(field) && !data.implemented.contains_key(&field))
			.filter_map(|&field| self.field(field))
			.try_fold(Sort::PROP, |sort, field| sort.max(&field.sort))
			.unwrap_or(data.sort)
	}
}

impl Index<DefId> for Module {
	type Output = Definition;

	fn index(&self, id: DefId) -> &Self::Output { &self.definitions[id.0 as usize] }
}

/// Adds a class and its personal fields to a module.
///
/// Field identities are handed out before the class is added, so field types may mention sibling fields.
pub struct ClassBuilder<'m> {
	module: &'m mut Module,
	name: Name,
	id: DefId,
	this: Binding,
	parents: Vec<DefId>,
	fields: Vec<(Name, Rc<Expression>, Sort, bool)>,
	implemented: IndexMap<DefId, Rc<Expression>>,
	classifying_field: Option<DefId>,
	status: Status,
}

impl<'m> ClassBuilder<'m> {
	pub fn new(module: &'m mut Module, name: &str) -> Self {
		let name = module.intern(name);
		let id = module.next_id();
		Self {
			module,
			name,
			id,
			this: Binding::fresh(),
			parents: Vec::new(),
			fields: Vec::new(),
			implemented: IndexMap::new(),
			classifying_field: None,
			status: Status::NoErrors,
		}
	}

	pub fn id(&self) -> DefId { self.id }

	pub fn this(&self) -> Rc<Expression> { Expression::reference(self.this) }

	pub fn module(&self) -> &Module { self.module }

	pub fn extends(&mut self, parent: DefId) -> &mut Self {
		self.parents.push(parent);
		self
	}

	pub fn field(&mut self, name: &str, ty: Rc<Expression>, sort: Sort) -> DefId { self.push_field(name, ty, sort, false) }

	pub fn property(&mut self, name: &str, ty: Rc<Expression>) -> DefId { self.push_field(name, ty, Sort::PROP, true) }

	pub fn classifying(&mut self, field: DefId) -> &mut Self {
		self.classifying_field = Some(field);
		self
	}

	pub fn implement(&mut self, field: DefId, implementation: Rc<Expression>) -> &mut Self {
		self.implemented.insert(field, implementation);
		self
	}

	pub fn status(&mut self, status: Status) -> &mut Self {
		self.status = status;
		self
	}

	fn push_field(&mut self, name: &str, ty: Rc<Expression>, sort: Sort, property: bool) -> DefId {
		let name = self.module.intern(name);
		self.fields.push((name, ty, sort, property));
		DefId(self.id.0 + self.fields.len() as u32)
	}

	pub fn build(self) -> DefId {
		let Self { module, name, id, this, parents, fields, mut implemented, classifying_field, status } = self;
		let mut all_fields = Vec::new();
		for &parent in &parents {
			let Some(class) = module.class(parent) else { continue };
			for field in &class.fields {
				if !all_fields.contains(field) {
					all_fields.push(*field);
				}
			}
			for (field, implementation) in &class.implemented {
				let implementation =
					implementation.substitute(&Substitution::single(class.this, Expression::reference(this)));
				implemented.entry(*field).or_insert(implementation);
			}
		}
		let personal = (1..=fields.len() as u32).map(|i| DefId(id.0 + i));
		all_fields.extend(personal);

		let sort = all_fields
			.iter()
			.filter(|field| !implemented.contains_key(*field))
			.map(|&field| match module.field(field) {
				Some(field) => field.sort,
				None => fields[(field.0 - id.0 - 1) as usize].2,
			})
			.try_fold(Sort::PROP, |sort, field_sort| sort.max(&field_sort))
			.unwrap_or(Sort::std());

		let class = Class { parents, fields: all_fields, implemented, this, classifying_field, sort };
		let added = module.add(Definition::new(name, Vec::new(), DefinitionKind::Class(class)).with_status(status));
		debug_assert_eq!(added, id);
		for (name, ty, sort, property) in fields {
			let field = Field { class: id, this, ty, sort, property };
			module.add(Definition::new(name, Vec::new(), DefinitionKind::Field(field)).with_status(status));
		}
		id
	}
}

pub struct DataBuilder<'m> {
	module: &'m mut Module,
	name: Name,
	id: DefId,
	parameters: Vec<Parameter>,
	sort: Sort,
	constructors: Vec<(Name, Vec<Parameter>)>,
	level_parameters: Option<Vec<LevelParameter>>,
	status: Status,
}

impl<'m> DataBuilder<'m> {
	pub fn new(module: &'m mut Module, name: &str, parameters: Vec<Parameter>, sort: Sort) -> Self {
		let name = module.intern(name);
		let id = module.next_id();
		Self {
			module,
			name,
			id,
			parameters,
			sort,
			constructors: Vec::new(),
			level_parameters: None,
			status: Status::NoErrors,
		}
	}

	pub fn monomorphic(&mut self) -> &mut Self {
		self.level_parameters = Some(Vec::new());
		self
	}

	pub fn id(&self) -> DefId { self.id }

	pub fn parameters(&self) -> &[Parameter] { &self.parameters }

	pub fn itself(&self) -> Rc<Expression> {
		let levels = if self.level_parameters.is_some() { Levels::empty() } else { Levels::std() };
		Expression::data_call(self.id, levels, self.parameters.iter().map(Parameter::reference).collect())
	}

	pub fn constructor(&mut self, name: &str, parameters: Vec<Parameter>) -> DefId {
		let name = self.module.intern(name);
		self.constructors.push((name, parameters));
		DefId(self.id.0 + self.constructors.len() as u32)
	}

	pub fn status(&mut self, status: Status) -> &mut Self {
		self.status = status;
		self
	}

	pub fn build(self) -> DefId {
		let Self { module, name, id, parameters, sort, constructors, level_parameters, status } = self;
		let ids = (1..=constructors.len() as u32).map(|i| DefId(id.0 + i)).collect();
		let data = Definition::new(name, parameters, DefinitionKind::Data(Data { sort, constructors: ids }));
		let added = module.add(Definition { level_parameters: level_parameters.clone(), ..data }.with_status(status));
		debug_assert_eq!(added, id);
		for (name, parameters) in constructors {
			let constructor = Definition::new(name, parameters, DefinitionKind::Constructor(Constructor { data: id }));
			module.add(Definition { level_parameters: level_parameters.clone(), ..constructor }.with_status(status));
		}
		id
	}
}
