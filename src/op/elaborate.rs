use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::{
	common::{Binding, Name, SourceNode},
	config::Config,
	instance::{InstancePool, NoInstances},
	ir::{
		definition::{DefId, Module},
		equation::{Equation, EquationId, LevelEquation},
		expression::{Expression, Parameter},
		level::{Level, LevelKind, LevelVariable, Levels, Sort},
		meta::{InferenceVariable, Metacontext, VariableKind},
	},
	op::{normalize::Normalizer, typing::Typing},
	report::{Diagnostic, ElaborationErrorKind, ErrorReporter, Severity},
};

#[derive(Clone, Default, Debug)]
pub struct Context {
	entries: Vec<(Binding, Rc<Expression>)>,
}

impl Context {
	pub fn new() -> Self { Self::default() }

	pub fn len(&self) -> usize { self.entries.len() }

	pub fn is_empty(&self) -> bool { self.entries.is_empty() }

	pub fn push(&mut self, binding: Binding, ty: Rc<Expression>) { self.entries.push((binding, ty)) }

	pub fn truncate(&mut self, len: usize) { self.entries.truncate(len) }

	pub fn lookup(&self, binding: Binding) -> Option<&Rc<Expression>> {
		self.entries.iter().rev().find(|(candidate, _)| *candidate == binding).map(|(_, ty)| ty)
	}

	pub fn bindings(&self) -> Vec<Binding> { self.entries.iter().map(|(binding, _)| *binding).collect() }
}

static NO_INSTANCES: NoInstances = NoInstances;

/// Checks expressions and definitions of one module, solving the inference variables it introduces.
///
/// The equation state belongs to a single definition: `check_definition` starts from a clean slate.
pub struct Elaborator<'m> {
	pub module: &'m Module,
	pub config: Config,
	pub metas: Metacontext,
	pub context: Context,
	pub(crate) instances: &'m dyn InstancePool,
	reporter: &'m mut dyn ErrorReporter,
	worst: Option<Severity>,
	pub(crate) equations: Vec<Equation>,
	next_equation: u32,
	pub(crate) level_equations: Vec<LevelEquation>,
	pub(crate) level_failures: usize,
	/// Variables that must be solved by `\Prop` unless something else solves them first.
	pub(crate) props: Vec<InferenceVariable>,
	/// First solutions proposed for variables that cannot be solved from equations.
	pub(crate) direct_solutions: FxHashMap<InferenceVariable, Rc<Expression>>,
	pub(crate) checking: Vec<DefId>,
	pub(crate) origin: SourceNode,
}

impl<'m> Elaborator<'m> {
	pub fn new(module: &'m Module, reporter: &'m mut dyn ErrorReporter) -> Self {
		Self {
			module,
			config: Config::default(),
			metas: Metacontext::new(),
			context: Context::new(),
			instances: &NO_INSTANCES,
			reporter,
			worst: None,
			equations: Vec::new(),
			next_equation: 0,
			level_equations: Vec::new(),
			level_failures: 0,
			props: Vec::new(),
			direct_solutions: FxHashMap::default(),
			checking: Vec::new(),
			origin: SourceNode::default(),
		}
	}

	pub fn with_config(self, config: Config) -> Self { Self { config, ..self } }

	pub fn with_instances(self, instances: &'m dyn InstancePool) -> Self { Self { instances, ..self } }

	pub(crate) fn reset(&mut self) {
		self.metas = Metacontext::new();
		self.context = Context::new();
		self.worst = None;
		self.equations.clear();
		self.level_equations.clear();
		self.props.clear();
		self.direct_solutions.clear();
		self.checking.clear();
		self.origin = SourceNode::default();
	}

	pub fn normalizer(&self) -> Normalizer<'_> { Normalizer::new(self.module, &self.metas) }

	pub fn whnf(&self, expression: &Rc<Expression>) -> Rc<Expression> { self.normalizer().whnf(expression) }

	pub fn normalize(&self, expression: &Rc<Expression>) -> Rc<Expression> { self.normalizer().normalize(expression) }

	pub fn type_of(&self, expression: &Rc<Expression>) -> Rc<Expression> {
		Typing::new(self.normalizer(), &self.context).type_of(expression)
	}

	pub fn sort_of(&self, ty: &Rc<Expression>) -> Option<Sort> { Typing::new(self.normalizer(), &self.context).sort_of(ty) }

	pub fn is_proposition(&self, ty: &Rc<Expression>) -> bool { self.sort_of(ty).is_some_and(|sort| sort.is_prop()) }

	pub fn equations(&self) -> &[Equation] { &self.equations }

	pub fn level_equations(&self) -> &[LevelEquation] { &self.level_equations }

	pub fn worst_severity(&self) -> Option<Severity> { self.worst }

	pub(crate) fn report(&mut self, kind: ElaborationErrorKind, source: SourceNode) {
		let diagnostic = Diagnostic::new(kind, source);
		tracing::debug!(severity = ?diagnostic.severity, "{}", diagnostic.kind);
		self.worst = self.worst.max(Some(diagnostic.severity));
		self.reporter.report(diagnostic);
	}

	pub(crate) fn next_equation_id(&mut self) -> EquationId {
		let id = EquationId(self.next_equation);
		self.next_equation += 1;
		id
	}

	pub(crate) fn under<T>(&mut self, parameter: &Parameter, f: impl FnOnce(&mut Self) -> T) -> T {
		let scope = self.context.len();
		self.context.push(parameter.binding, parameter.ty.clone());
		let result = f(self);
		self.context.truncate(scope);
		result
	}

	/// A fresh unknown of type `ty` that may mention every binding currently in scope.
	pub fn fresh_variable(
		&mut self,
		name: Option<Name>,
		kind: VariableKind,
		ty: Rc<Expression>,
		source: SourceNode,
	) -> Rc<Expression> {
		let variable = self.metas.spawn(name, kind, ty, self.context.bindings(), source);
		tracing::trace!(?variable, "spawned inference variable");
		Expression::inference(variable)
	}

	pub fn fresh_level(&mut self, kind: LevelKind, source: SourceNode) -> Level {
		Level::var(LevelVariable::Inference(self.metas.spawn_level(kind, source)))
	}

	pub fn fresh_sort(&mut self, source: SourceNode) -> Sort {
		Sort::new(self.fresh_level(LevelKind::P, source), self.fresh_level(LevelKind::H, source))
	}

	pub fn fresh_levels(&mut self, definition: DefId, source: SourceNode) -> Levels {
		match &self.module[definition].level_parameters {
			None => Levels::from_sort(self.fresh_sort(source)),
			Some(parameters) => {
				let kinds: Vec<_> = parameters.iter().map(|parameter| parameter.kind).collect();
				Levels::List(kinds.into_iter().map(|kind| self.fresh_level(kind, source)).collect())
			}
		}
	}

	pub fn fresh_type(&mut self, source: SourceNode) -> (Rc<Expression>, Sort) {
		let sort = self.fresh_sort(source);
		(self.fresh_variable(None, VariableKind::Expression, Expression::universe(sort), source), sort)
	}
}
