use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
	common::{Binding, Cmp, SourceNode},
	ir::{
		definition::{Body, DefId, DefinitionKind, FunctionKind, Status},
		expression::{ClassCall, Clause, Expression, LetClause, Parameter, Pattern},
		level::{Levels, Sort},
		prelude,
	},
	op::{
		collect::collect_dependencies,
		elaborate::Elaborator,
		normalize::unfold_let,
		size::definition_size,
		substitute::{zonk, Substitute as _, Substitution},
		traverse::{fold_children, Fold},
		typing::pi_sort,
	},
	report::{ElaborationErrorKind, InvariantViolation, Severity},
	utility::rc,
};

type Checked = Result<(Rc<Expression>, Rc<Expression>), InvariantViolation>;

/// Replaces field accesses on `this` by the implementations already known.
struct Implemented<'a> {
	this: Binding,
	implementations: &'a IndexMap<DefId, Rc<Expression>>,
}

impl Fold for Implemented<'_> {
	fn fold(&mut self, expression: &Rc<Expression>) -> Rc<Expression> {
		if let Expression::FieldCall { field, argument } = expression.as_ref() {
			if let (Expression::Reference(binding), Some(implementation)) =
				(argument.as_ref(), self.implementations.get(field))
			{
				if *binding == self.this {
					return implementation.clone();
				}
			}
		}
		fold_children(self, expression)
	}
}

fn levels_sort(levels: &Levels) -> Sort {
	match levels {
		Levels::Pair { p, h } => Sort::new(*p, *h),
		Levels::List(levels) => match levels[..] {
			[p, h, ..] => Sort::new(p, h),
			_ => Sort::SET0,
		},
	}
}

impl Elaborator<'_> {
	fn mismatch(
		&mut self,
		term: Rc<Expression>,
		actual: &Rc<Expression>,
		expected: Rc<Expression>,
		cmp: Cmp,
	) -> (Rc<Expression>, Rc<Expression>) {
		let source = self.origin;
		let left = zonk(&self.metas, actual);
		let right = zonk(&self.metas, &expected);
		self.report(ElaborationErrorKind::Mismatch { left, right, cmp }, source);
		(Expression::error_at(term), Expression::error())
	}

	fn check_sort(&mut self, actual: Sort, declared: Sort) {
		let source = self.origin;
		let level_failures = self.level_failures;
		if !Sort::compare(&actual, &declared, Cmp::Le, self, source) && self.level_failures == level_failures {
			let (left, right) = (Expression::universe(actual), Expression::universe(declared));
			self.report(ElaborationErrorKind::Mismatch { left, right, cmp: Cmp::Le }, source);
		}
	}

	fn require(&self, definition: DefId) -> Result<(), InvariantViolation> {
		let header = self.module.get(definition).ok_or(InvariantViolation::UnknownDefinition(definition))?;
		if header.status().header_is_ok() || self.checking.contains(&definition) {
			Ok(())
		} else {
			Err(InvariantViolation::UncheckedDependency { definition: self.checking.first().copied(), dependency: definition })
		}
	}

	fn check_telescope(&mut self, parameters: &[Parameter]) -> Result<Vec<(Parameter, Sort)>, InvariantViolation> {
		let mut checked = Vec::with_capacity(parameters.len());
		for parameter in parameters {
			let (ty, sort) = self.check_type(&parameter.ty)?;
			let parameter = Parameter { ty, ..parameter.clone() };
			self.context.push(parameter.binding, parameter.ty.clone());
			checked.push((parameter, sort));
		}
		Ok(checked)
	}

	pub fn check_type(&mut self, expression: &Rc<Expression>) -> Result<(Rc<Expression>, Sort), InvariantViolation> {
		let source = self.origin;
		let (term, ty) = self.infer(expression)?;
		let whnf = self.whnf(&ty);
		match whnf.as_ref() {
			Expression::Universe(sort) => Ok((term, *sort)),
			Expression::Error { .. } => Ok((term, Sort::SET0)),
			_ if self.normalizer().unsolved_variable(&whnf).is_some() => {
				let sort = self.fresh_sort(source);
				self.add_equation(&whnf, &Expression::universe(sort), None, Cmp::Eq, source);
				Ok((term, sort))
			}
			_ => {
				let (term, _) = self.mismatch(term, &ty, Expression::universe(Sort::std()), Cmp::Le);
				Ok((term, Sort::SET0))
			}
		}
	}

	/// Checks an expression against an expected type. Ill-typed subterms are replaced by errors.
	pub fn check(
		&mut self,
		expression: &Rc<Expression>,
		expected: &Rc<Expression>,
	) -> Result<Rc<Expression>, InvariantViolation> {
		let source = self.origin;
		match expression.as_ref() {
			Expression::Integer(n) => {
				let whnf = self.whnf(expected);
				if let Expression::DataCall { definition, .. } = whnf.as_ref() {
					if *definition == prelude::FIN {
						let actual = Expression::fin(Expression::integer(n + 1u32));
						return Ok(if self.add_equation(&actual, expected, None, Cmp::Le, source) {
							expression.clone()
						} else {
							Expression::error_at(expression.clone())
						});
					}
				}
			}
			Expression::Error { goal: true, .. } => {
				let expected = zonk(&self.metas, expected);
				self.report(ElaborationErrorKind::Goal { expected: Some(expected) }, source);
				return Ok(expression.clone());
			}
			_ => {}
		}
		let (term, actual) = self.infer(expression)?;
		if actual.is_error() || self.add_equation(&actual, expected, None, Cmp::Le, source) {
			Ok(term)
		} else {
			Ok(Expression::error_at(term))
		}
	}

	pub fn infer(&mut self, expression: &Rc<Expression>) -> Checked {
		use Expression as E;
		let module = self.module;
		Ok(match expression.as_ref() {
			E::Reference(binding) => match self.context.lookup(*binding) {
				Some(ty) => (expression.clone(), ty.clone()),
				None => return Err(InvariantViolation::UnboundReference(*binding)),
			},
			E::Inference(variable) => (expression.clone(), self.metas[*variable].ty.clone()),
			E::App { function, argument } => return self.infer_app(function, argument),
			E::Lambda { parameter, body } => {
				let (parameter, domain) = self.check_parameter(parameter)?;
				let (body, codomain) = self.under(&parameter, |this| this.infer(body))?;
				let codomain_sort = self.under(&parameter, |this| this.sort_of(&codomain));
				let ty = Expression::pi(pi_sort(Some(domain), codomain_sort), parameter.clone(), codomain);
				(Expression::lambda(parameter, body), ty)
			}
			E::Pi { sort, parameter, codomain } => {
				let (parameter, domain) = self.check_parameter(parameter)?;
				let (codomain, codomain_sort) = self.under(&parameter, |this| this.check_type(codomain))?;
				self.check_sort(pi_sort(Some(domain), Some(codomain_sort)), *sort);
				(Expression::pi(*sort, parameter, codomain), Expression::universe(*sort))
			}
			E::Sigma { sort, parameters } => {
				let scope = self.context.len();
				let checked = self.check_telescope(parameters)?;
				self.context.truncate(scope);
				let actual = checked.iter().try_fold(Sort::PROP, |actual, (_, sort)| actual.max(sort));
				if let Some(actual) = actual {
					self.check_sort(actual, *sort);
				}
				let parameters = checked.into_iter().map(|(parameter, _)| parameter).collect();
				(rc!(E::Sigma { sort: *sort, parameters }), Expression::universe(*sort))
			}
			E::Tuple { fields, ty } => {
				let (ty, _) = self.check_type(ty)?;
				let whnf = self.whnf(&ty);
				let parameters = match whnf.as_ref() {
					E::Sigma { parameters, .. } if parameters.len() == fields.len() => parameters.clone(),
					_ => return Ok(self.mismatch(expression.clone(), &ty, Expression::error(), Cmp::Eq)),
				};
				let mut substitution = Substitution::new();
				let mut checked = Vec::with_capacity(fields.len());
				for (parameter, field) in parameters.iter().zip(fields) {
					let field = self.check(field, &parameter.ty.substitute(&substitution))?;
					substitution.add(parameter.binding, field.clone());
					checked.push(field);
				}
				(rc!(E::Tuple { fields: checked, ty: ty.clone() }), ty)
			}
			E::Proj { tuple, field } => {
				let (tuple, ty) = self.infer(tuple)?;
				let whnf = self.whnf(&ty);
				match whnf.as_ref() {
					E::Sigma { parameters, .. } if *field < parameters.len() => {
						let mut substitution = Substitution::new();
						for (index, parameter) in parameters[..*field].iter().enumerate() {
							substitution.add(parameter.binding, Expression::proj(tuple.clone(), index));
						}
						let ty = parameters[*field].ty.substitute(&substitution);
						(Expression::proj(tuple, *field), ty)
					}
					E::Error { .. } => (Expression::proj(tuple, *field), Expression::error()),
					_ => self.mismatch(expression.clone(), &ty, Expression::error(), Cmp::Eq),
				}
			}
			E::Universe(sort) => (expression.clone(), Expression::universe(sort.succ())),
			E::Let { clauses, body, opaque } => {
				let scope = self.context.len();
				let mut checked = Vec::with_capacity(clauses.len());
				for clause in clauses {
					let (ty, _) = self.check_type(&clause.ty)?;
					let value = self.check(&clause.value, &ty)?;
					self.context.push(clause.binding, ty.clone());
					checked.push(LetClause { ty, value, ..clause.clone() });
				}
				let (body, ty) = self.infer(body)?;
				self.context.truncate(scope);
				let ty = unfold_let(&checked, &ty);
				(rc!(E::Let { clauses: checked, body, opaque: *opaque }), ty)
			}
			E::Case { arguments, parameters, result_type, clauses } => {
				if arguments.len() != parameters.len() {
					return Err(InvariantViolation::PatternCount { expected: parameters.len(), found: arguments.len() });
				}
				let scope = self.context.len();
				let checked = self.check_telescope(parameters)?;
				let (result_type, _) = self.check_type(result_type)?;
				self.context.truncate(scope);
				let parameters: Vec<_> = checked.into_iter().map(|(parameter, _)| parameter).collect();

				let mut substitution = Substitution::new();
				let mut checked_arguments = Vec::with_capacity(arguments.len());
				for (parameter, argument) in parameters.iter().zip(arguments) {
					let argument = self.check(argument, &parameter.ty.substitute(&substitution))?;
					substitution.add(parameter.binding, argument.clone());
					checked_arguments.push(argument);
				}
				let clauses = self.check_clauses(&parameters, &result_type, clauses)?;
				let ty = result_type.substitute(&substitution);
				(rc!(E::Case { arguments: checked_arguments, parameters, result_type, clauses }), ty)
			}
			E::Path { levels, ty, function } => {
				let sort = levels_sort(levels);
				let family = Expression::arrow(sort.succ(), Expression::interval(), Expression::universe(sort));
				let ty = self.check(ty, &family)?;
				let point = Parameter::new(None, Expression::interval());
				let expected = Expression::pi(sort, point.clone(), Expression::app(ty.clone(), [point.reference()]));
				let function = self.check(function, &expected)?;
				let endpoints = [Expression::left(), Expression::right()]
					.map(|endpoint| Expression::app(function.clone(), [endpoint]));
				let [start, end] = endpoints;
				let path_type = Expression::data_call(prelude::PATH, levels.clone(), vec![ty.clone(), start, end]);
				(rc!(E::Path { levels: levels.clone(), ty, function }), path_type)
			}
			E::Array { element_type, elements } => {
				let (element_type, sort) = self.check_type(element_type)?;
				let mut checked = Vec::with_capacity(elements.len());
				for element in elements {
					checked.push(self.check(element, &element_type)?);
				}
				let ty = prelude::array_type(module, element_type.clone(), sort, checked.len());
				(rc!(E::Array { element_type, elements: checked }), ty)
			}
			E::Integer(_) => (expression.clone(), Expression::nat()),
			E::FunCall { definition, levels, arguments } => {
				let (_, arguments, substitution) = self.check_call(*definition, levels, &[], arguments)?;
				let ty = match module.function(*definition) {
					Some(function) => function.result_type.substitute(&substitution),
					None => return Err(InvariantViolation::UnknownDefinition(*definition)),
				};
				(Expression::fun_call(module, *definition, levels.clone(), arguments), ty)
			}
			E::DataCall { definition, levels, arguments } => {
				let (_, arguments, _) = self.check_call(*definition, levels, &[], arguments)?;
				let Some(data) = module.data(*definition) else {
					return Err(InvariantViolation::UnknownDefinition(*definition));
				};
				let sort = data.sort.substitute(&levels.substitution(module[*definition].level_parameters.as_deref()));
				(Expression::data_call(*definition, levels.clone(), arguments), Expression::universe(sort))
			}
			E::ConCall { definition, levels, data_arguments, arguments } => {
				let Some(constructor) = module.constructor(*definition) else {
					return Err(InvariantViolation::NotAConstructor(*definition));
				};
				let (data_arguments, arguments, _) = self.check_call(*definition, levels, data_arguments, arguments)?;
				let ty = Expression::data_call(constructor.data, levels.clone(), data_arguments.clone());
				(Expression::con_call(*definition, levels.clone(), data_arguments, arguments), ty)
			}
			E::ClassCall(class_call) => {
				let class_call = self.check_class_call(class_call)?;
				let sort = class_call.sort;
				(Expression::class_call(class_call), Expression::universe(sort))
			}
			E::FieldCall { field, argument } => return self.infer_field_call(expression, *field, argument),
			E::New(class_call) => {
				let class_call = self.check_class_call(class_call)?;
				(rc!(E::New(class_call.clone())), Expression::class_call(class_call))
			}
			E::Box { expression: proof, ty } => {
				let (ty, sort) = self.check_type(ty)?;
				if !sort.is_prop() {
					self.check_sort(sort, Sort::PROP);
				}
				let proof = self.check(proof, &ty)?;
				(rc!(E::Box { expression: proof, ty: ty.clone() }), ty)
			}
			E::Error { goal, .. } => {
				if *goal {
					let source = self.origin;
					self.report(ElaborationErrorKind::Goal { expected: None }, source);
				}
				(expression.clone(), Expression::error())
			}
		})
	}

	fn check_parameter(&mut self, parameter: &Parameter) -> Result<(Parameter, Sort), InvariantViolation> {
		let (ty, sort) = self.check_type(&parameter.ty)?;
		Ok((Parameter { ty, ..parameter.clone() }, sort))
	}

	fn infer_app(&mut self, function: &Rc<Expression>, argument: &Rc<Expression>) -> Checked {
		let source = self.origin;
		let (function, ty) = self.infer(function)?;
		let mut whnf = self.whnf(&ty);
		if self.normalizer().unsolved_variable(&whnf).is_some() {
			let (domain, domain_sort) = self.fresh_type(source);
			let parameter = Parameter::new(None, domain);
			let (codomain, codomain_sort) = self.under(&parameter, |this| this.fresh_type(source));
			let pi = Expression::pi(pi_sort(Some(domain_sort), Some(codomain_sort)), parameter, codomain);
			self.add_equation(&whnf, &pi, None, Cmp::Eq, source);
			whnf = pi;
		}
		match whnf.as_ref() {
			Expression::Pi { parameter, codomain, .. } => {
				let argument = self.check(argument, &parameter.ty)?;
				let ty = codomain.substitute(&Substitution::single(parameter.binding, argument.clone()));
				Ok((Expression::app(function, [argument]), ty))
			}
			Expression::Error { .. } => Ok((Expression::app(function, [argument.clone()]), Expression::error())),
			_ => {
				let term = Expression::app(function, [argument.clone()]);
				Ok(self.mismatch(term, &ty, Expression::error(), Cmp::Eq))
			}
		}
	}

	fn infer_field_call(&mut self, expression: &Rc<Expression>, field: DefId, argument: &Rc<Expression>) -> Checked {
		let module = self.module;
		let source = self.origin;
		let Some(data) = module.field(field) else { return Err(InvariantViolation::UnknownDefinition(field)) };
		self.require(field)?;
		let (argument, ty) = self.infer(argument)?;
		let whnf = self.whnf(&ty);
		let levels = match whnf.as_ref() {
			Expression::ClassCall(class_call) if module.is_subclass(class_call.definition, data.class) =>
				class_call.levels.clone(),
			Expression::Error { .. } => return Ok((Expression::field_call(module, field, argument), Expression::error())),
			_ if self.normalizer().unsolved_variable(&whnf).is_some() => {
				let levels = self.fresh_levels(data.class, source);
				let bound = Expression::class_call(ClassCall::empty(module, data.class, levels.clone()));
				self.add_equation(&whnf, &bound, None, Cmp::Le, source);
				levels
			}
			_ => {
				let bound = Expression::class_call(ClassCall::empty(module, data.class, Levels::std()));
				return Ok(self.mismatch(expression.clone(), &ty, bound, Cmp::Le));
			}
		};
		let levels = levels.substitution(module[data.class].level_parameters.as_deref());
		let ty = data.ty.substitute(&Substitution::single(data.this, argument.clone()).with_levels(levels));
		Ok((Expression::field_call(module, field, argument), ty))
	}

	fn check_call(
		&mut self,
		definition: DefId,
		levels: &Levels,
		data_arguments: &[Rc<Expression>],
		arguments: &[Rc<Expression>],
	) -> Result<(Vec<Rc<Expression>>, Vec<Rc<Expression>>, Substitution), InvariantViolation> {
		let module = self.module;
		self.require(definition)?;
		let header = &module[definition];
		let (data, data_parameters) = match module.constructor(definition) {
			Some(constructor) => (constructor.data, &module[constructor.data].parameters[..]),
			None => (definition, &[][..]),
		};
		for (definition, parameters, arguments) in
			[(data, data_parameters, data_arguments), (definition, &header.parameters[..], arguments)]
		{
			if parameters.len() != arguments.len() {
				return Err(InvariantViolation::Arity { definition, expected: parameters.len(), found: arguments.len() });
			}
		}

		let mut substitution =
			Substitution::new().with_levels(levels.substitution(header.level_parameters.as_deref()));
		let mut checked = [Vec::with_capacity(data_arguments.len()), Vec::with_capacity(arguments.len())];
		for (index, (parameters, arguments)) in [(data_parameters, data_arguments), (&header.parameters[..], arguments)]
			.into_iter()
			.enumerate()
		{
			for (parameter, argument) in parameters.iter().zip(arguments) {
				let argument = self.check(argument, &parameter.ty.substitute(&substitution))?;
				substitution.add(parameter.binding, argument.clone());
				checked[index].push(argument);
			}
		}
		let [data_arguments, arguments] = checked;
		Ok((data_arguments, arguments, substitution))
	}

	fn check_class_call(&mut self, class_call: &ClassCall) -> Result<ClassCall, InvariantViolation> {
		let module = self.module;
		let definition = class_call.definition;
		self.require(definition)?;
		let levels = class_call.levels.substitution(module[definition].level_parameters.as_deref());
		let this = Expression::reference(class_call.this);
		let scope = self.context.len();
		self.context.push(class_call.this, Expression::class_call(ClassCall::empty(module, definition, class_call.levels.clone())));
		let mut implementations = IndexMap::new();
		for (&field, implementation) in &class_call.implementations {
			let Some(data) = module.field(field) else {
				self.context.truncate(scope);
				return Err(InvariantViolation::UnknownDefinition(field));
			};
			let ty = data.ty.substitute(&Substitution::single(data.this, this.clone()).with_levels(levels.clone()));
			let ty = Implemented { this: class_call.this, implementations: &implementations }.fold(&ty);
			let implementation = match self.check(implementation, &ty) {
				Ok(implementation) => implementation,
				Err(error) => {
					self.context.truncate(scope);
					return Err(error);
				}
			};
			implementations.insert(field, implementation);
		}
		self.context.truncate(scope);
		Ok(ClassCall::new(module, definition, class_call.levels.clone(), class_call.this, implementations))
	}

	/// Checks the clauses of a match on `parameters`; the patterns of each clause bind its variables.
	fn check_clauses(
		&mut self,
		parameters: &[Parameter],
		result_type: &Rc<Expression>,
		clauses: &[Clause],
	) -> Result<Vec<Clause>, InvariantViolation> {
		let mut checked = Vec::with_capacity(clauses.len());
		for clause in clauses {
			if clause.patterns.len() != parameters.len() {
				return Err(InvariantViolation::PatternCount { expected: parameters.len(), found: clause.patterns.len() });
			}
			let scope = self.context.len();
			let mut substitution = Substitution::new();
			for (parameter, pattern) in parameters.iter().zip(&clause.patterns) {
				let value = self.bind_pattern(pattern, &parameter.ty.substitute(&substitution))?;
				substitution.add(parameter.binding, value);
			}
			let body = self.check(&clause.body, &result_type.substitute(&substitution))?;
			self.context.truncate(scope);
			checked.push(Clause { patterns: clause.patterns.clone(), body });
		}
		Ok(checked)
	}

	fn bind_pattern(&mut self, pattern: &Pattern, ty: &Rc<Expression>) -> Result<Rc<Expression>, InvariantViolation> {
		let module = self.module;
		match pattern {
			Pattern::Binding(binding) => {
				self.context.push(*binding, ty.clone());
				Ok(Expression::reference(*binding))
			}
			Pattern::Constructor { constructor, arguments } => {
				let data = module.constructor(*constructor).ok_or(InvariantViolation::NotAConstructor(*constructor))?.data;
				let header = &module[*constructor];
				if header.parameters.len() != arguments.len() {
					return Err(InvariantViolation::PatternCount {
						expected: header.parameters.len(),
						found: arguments.len(),
					});
				}
				let whnf = self.whnf(ty);
				let (levels, data_arguments) = match whnf.as_ref() {
					Expression::DataCall { definition, levels, arguments } if *definition == data =>
						(levels.clone(), arguments.clone()),
					_ => {
						if !whnf.is_error() {
							let expected = Expression::data_call(data, module[data].levels(), Vec::new());
							self.mismatch(Expression::error(), ty, expected, Cmp::Eq);
						}
						(module[data].levels(), Vec::new())
					}
				};
				let mut substitution = Substitution::telescope(&module[data].parameters, &data_arguments)
					.with_levels(levels.substitution(header.level_parameters.as_deref()));
				let mut values = Vec::with_capacity(arguments.len());
				for (parameter, pattern) in header.parameters.iter().zip(arguments) {
					let ty = if data_arguments.len() == module[data].parameters.len() {
						parameter.ty.substitute(&substitution)
					} else {
						Expression::error()
					};
					let value = self.bind_pattern(pattern, &ty)?;
					substitution.add(parameter.binding, value.clone());
					values.push(value);
				}
				Ok(Expression::con_call(*constructor, levels, data_arguments, values))
			}
		}
	}

	pub fn elaborate(
		&mut self,
		expression: &Rc<Expression>,
		expected: Option<&Rc<Expression>>,
		source: SourceNode,
	) -> Result<(Rc<Expression>, Rc<Expression>), InvariantViolation> {
		self.origin = source;
		let (term, ty) = match expected {
			Some(expected) => (self.check(expression, expected)?, expected.clone()),
			None => self.infer(expression)?,
		};
		self.solve_equations();
		self.finalize();
		Ok((zonk(&self.metas, &term), zonk(&self.metas, &ty)))
	}

	/// Checks a definition whose dependencies have been checked, recording and returning its new status.
	///
	/// A data type is checked together with its constructors and a class with its personal fields.
	pub fn check_definition(&mut self, id: DefId) -> Result<Status, InvariantViolation> {
		let module = self.module;
		let definition = module.get(id).ok_or(InvariantViolation::UnknownDefinition(id))?;
		if definition.status() == Status::TypeChecking {
			return Err(InvariantViolation::AlreadyChecking(id));
		}
		self.reset();

		let mut components = vec![id];
		match &definition.kind {
			DefinitionKind::Data(data) => components.extend(&data.constructors),
			DefinitionKind::Class(class) =>
				components.extend(class.fields.iter().filter(|&&field| module.field(field).is_some_and(|f| f.class == id))),
			_ => {}
		}
		let dependencies: Vec<DefId> =
			collect_dependencies(module, definition).into_iter().filter(|dependency| !components.contains(dependency)).collect();
		for &dependency in &dependencies {
			let status = module.get(dependency).ok_or(InvariantViolation::UnknownDefinition(dependency))?.status();
			if status.needs_checking() {
				return Err(InvariantViolation::UncheckedDependency { definition: Some(id), dependency });
			}
		}

		let _span = tracing::debug_span!("check_definition", name = module.resolve(definition.name)).entered();
		let previous: Vec<_> = components.iter().map(|&component| (component, module[component].status())).collect();
		for &component in &components {
			module[component].set_status(Status::TypeChecking);
		}
		self.checking = components.clone();
		self.origin = definition.source;

		if let Err(error) = self.check_definition_body(id) {
			for (component, status) in previous {
				module[component].set_status(status);
			}
			self.checking.clear();
			return Err(error);
		}
		self.solve_equations();
		self.finalize();
		self.checking.clear();

		let own = match self.worst_severity() {
			None | Some(Severity::Info) => Status::NoErrors,
			Some(Severity::Warning) => Status::HasWarnings,
			Some(Severity::Goal | Severity::Error) => Status::HasErrors,
		};
		let status = dependencies
			.iter()
			.fold(Status::NeedsChecking.add(own), |status, &dependency| status.add(module[dependency].status().as_dependency()));
		for &component in &components {
			module[component].set_status(status);
		}
		tracing::debug!(?status, size = definition_size(&self.metas, definition), "checked");
		Ok(status)
	}

	fn check_definition_body(&mut self, id: DefId) -> Result<(), InvariantViolation> {
		let module = self.module;
		let definition = &module[id];
		match &definition.kind {
			DefinitionKind::Constructor(constructor) => {
				self.check_telescope(&module[constructor.data].parameters)?;
			}
			DefinitionKind::Field(field) => {
				let this = Expression::class_call(ClassCall::empty(module, field.class, module[field.class].levels()));
				self.context.push(field.this, this);
			}
			_ => {}
		}
		let scope = self.context.len();
		let parameters: Vec<_> =
			self.check_telescope(&definition.parameters)?.into_iter().map(|(parameter, _)| parameter).collect();

		match &definition.kind {
			DefinitionKind::Function(function) => {
				let (result_type, sort) = self.check_type(&function.result_type)?;
				if function.kind == FunctionKind::Lemma && !sort.is_prop() {
					self.check_sort(sort, Sort::PROP);
				}
				match &function.body {
					Some(Body::Expression(body)) => {
						self.check(body, &result_type)?;
					}
					Some(Body::Clauses(clauses)) => {
						self.context.truncate(scope);
						self.check_clauses(&parameters, &result_type, clauses)?;
					}
					None => {}
				}
			}
			DefinitionKind::Data(data) => {
				for &constructor in &data.constructors {
					let constructor_scope = self.context.len();
					let sorts = self.check_telescope(&module[constructor].parameters)?;
					self.context.truncate(constructor_scope);
					for (_, sort) in sorts {
						self.check_sort(sort, data.sort);
					}
				}
			}
			DefinitionKind::Class(class) => {
				let this = Expression::reference(class.this);
				self.context.push(class.this, Expression::class_call(ClassCall::empty(module, id, definition.levels())));
				for &field in &class.fields {
					let Some(data) = module.field(field).filter(|data| data.class == id) else { continue };
					let ty = data.ty.substitute(&Substitution::single(data.this, this.clone()));
					let (_, sort) = self.check_type(&ty)?;
					self.check_sort(sort, if data.property { Sort::PROP } else { data.sort });
				}
				for (&field, implementation) in &class.implemented {
					let data = module.field(field).ok_or(InvariantViolation::UnknownDefinition(field))?;
					let ty = data.ty.substitute(&Substitution::single(data.this, this.clone()));
					self.check(implementation, &ty)?;
				}
			}
			DefinitionKind::Constructor(_) => {}
			DefinitionKind::Field(field) => {
				let (_, sort) = self.check_type(&field.ty)?;
				self.check_sort(sort, if field.property { Sort::PROP } else { field.sort });
			}
		}
		Ok(())
	}
}
