use std::rc::Rc;

use strata::{
	common::{Binding, Cmp},
	ir::{
		definition::{Body, ClassBuilder, DataBuilder, DefId, Definition, DefinitionKind, Module, Status},
		expression::{Clause, Expression, Parameter, Pattern},
		level::{Levels, Sort},
		prelude,
	},
	op::elaborate::Elaborator,
	report::{Diagnostic, ElaborationErrorKind, InvariantViolation},
};

use crate::common::{call, records, source};

fn constant(name: &str, module: &mut Module, ty: Rc<Expression>, body: Rc<Expression>) -> DefId {
	let name = module.intern(name);
	module.add(Definition::function(name, Vec::new(), ty, Some(Body::Expression(body))).with_level_parameters(Vec::new()))
}

/// `double zero => 0 | double (suc n) => suc (suc (double n))`
fn double(module: &mut Module) -> DefId {
	let id = module.next_id();
	let n = Binding::fresh();
	let clauses = vec![
		Clause {
			patterns: vec![Pattern::Constructor { constructor: prelude::ZERO, arguments: Vec::new() }],
			body: Expression::integer(0u32),
		},
		Clause {
			patterns: vec![Pattern::Constructor { constructor: prelude::SUC, arguments: vec![Pattern::Binding(n)] }],
			body: Expression::suc(Expression::suc(call(id, vec![Expression::reference(n)]))),
		},
	];
	let name = module.intern("double");
	let parameters = vec![Parameter::new(None, Expression::nat())];
	let definition = Definition::function(name, parameters, Expression::nat(), Some(Body::Clauses(clauses)));
	module.add(definition.with_level_parameters(Vec::new()))
}

/// `1 = 1` at the lowest levels, spelled out as a path type.
fn one_is_one() -> Rc<Expression> {
	let family = Expression::lambda(Parameter::new(None, Expression::interval()), Expression::nat());
	Expression::data_call(
		prelude::PATH,
		Levels::from_sort(Sort::SET0),
		vec![family, Expression::integer(1u32), Expression::integer(1u32)],
	)
}

#[test]
fn the_prelude_checks() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let targets: Vec<_> = module
		.definitions()
		.filter(|(_, definition)| !matches!(definition.kind, DefinitionKind::Constructor(_) | DefinitionKind::Field(_)))
		.map(|(id, _)| id)
		.collect();
	for id in targets {
		let name = module.resolve(module[id].name);
		assert_eq!(elaborator.check_definition(id), Ok(Status::NoErrors), "{name}");
	}
	assert!(module.definitions().all(|(_, definition)| definition.status() == Status::NoErrors));
	drop(elaborator);
	assert!(diagnostics.is_empty(), "{diagnostics:?}");
}

#[test]
fn recursive_functions_check_and_compute() {
	let mut module = Module::new();
	let double = double(&mut module);
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	assert_eq!(elaborator.check_definition(double), Ok(Status::NoErrors));
	let (term, ty) = elaborator.elaborate(&call(double, vec![Expression::integer(3u32)]), None, source()).unwrap();
	assert_eq!(ty, Expression::nat());
	assert!(elaborator.compare(Cmp::Eq, &term, &Expression::integer(6u32), None, source()));
	drop(elaborator);
	assert!(diagnostics.is_empty(), "{diagnostics:?}");
}

#[test]
fn errors_propagate_to_dependents() {
	let mut module = Module::new();
	let bad = constant("bad", &mut module, Expression::nat(), Expression::universe(Sort::SET0));
	let user = constant("user", &mut module, Expression::nat(), call(bad, Vec::new()));
	let fine = constant("fine", &mut module, Expression::nat(), Expression::integer(1u32));
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	assert_eq!(elaborator.check_definition(bad), Ok(Status::HasErrors));
	assert_eq!(elaborator.check_definition(user), Ok(Status::DepErrors));
	assert_eq!(elaborator.check_definition(fine), Ok(Status::NoErrors));
	assert_eq!(module[user].status(), Status::DepErrors);
	drop(elaborator);
	assert!(matches!(&diagnostics[..], [Diagnostic { kind: ElaborationErrorKind::Mismatch { .. }, .. }]));
}

#[test]
fn dependencies_are_checked_first() {
	let mut module = Module::new();
	let first = constant("first", &mut module, Expression::nat(), Expression::integer(1u32));
	let second = constant("second", &mut module, Expression::nat(), call(first, Vec::new()));
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	assert_eq!(
		elaborator.check_definition(second),
		Err(InvariantViolation::UncheckedDependency { definition: Some(second), dependency: first })
	);
	assert_eq!(module[second].status(), Status::NeedsChecking);
	assert_eq!(elaborator.check_definition(first), Ok(Status::NoErrors));
	assert_eq!(elaborator.check_definition(second), Ok(Status::NoErrors));
}

#[test]
fn lemmas_prove_propositions() {
	let mut module = Module::new();
	let name = module.intern("one-is-one");
	let proof = Rc::new(Expression::Path {
		levels: Levels::from_sort(Sort::SET0),
		ty: Expression::lambda(Parameter::new(None, Expression::interval()), Expression::nat()),
		function: Expression::lambda(Parameter::new(None, Expression::interval()), Expression::integer(1u32)),
	});
	let lemma = module.add(Definition::lemma(name, Vec::new(), one_is_one(), proof).with_level_parameters(Vec::new()));
	let name = module.intern("not-a-proposition");
	let bogus = module.add(
		Definition::lemma(name, Vec::new(), Expression::nat(), Expression::integer(0u32)).with_level_parameters(Vec::new()),
	);

	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	assert_eq!(elaborator.check_definition(lemma), Ok(Status::NoErrors));
	assert_eq!(elaborator.check_definition(bogus), Ok(Status::HasErrors));
	drop(elaborator);
	assert_eq!(diagnostics.len(), 1);
}

#[test]
fn reflexivity_applies_at_any_type() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let levels = Levels::from_sort(Sort::SET0);
	let refl = Rc::new(Expression::FunCall {
		definition: prelude::IDP,
		levels: levels.clone(),
		arguments: vec![Expression::nat(), Expression::integer(1u32)],
	});
	let (_, ty) = elaborator.elaborate(&refl, None, source()).unwrap();
	assert!(elaborator.compare(Cmp::Eq, &ty, &one_is_one(), None, source()));
	assert!(elaborator.is_proposition(&ty));
	drop(elaborator);
	assert!(diagnostics.is_empty(), "{diagnostics:?}");
}

#[test]
fn records_check_with_their_fields() {
	let mut records = records();
	let mut extension = ClassBuilder::new(&mut records.module, "D");
	extension.extends(records.class).implement(records.n, Expression::integer(3u32));
	let extension = extension.build();
	let mut broken = ClassBuilder::new(&mut records.module, "E");
	broken.extends(records.class).implement(records.m, Expression::universe(Sort::SET0));
	let broken = broken.build();

	let module = &records.module;
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(module, &mut diagnostics);
	assert_eq!(elaborator.check_definition(records.class), Ok(Status::NoErrors));
	assert_eq!(module[records.n].status(), Status::NoErrors);
	assert_eq!(elaborator.check_definition(extension), Ok(Status::NoErrors));
	assert_eq!(elaborator.check_definition(broken), Ok(Status::HasErrors));
	assert_eq!(module[records.m].status(), Status::NoErrors);
	drop(elaborator);
	assert_eq!(diagnostics.len(), 1);
}

#[test]
fn constructors_fit_in_their_data_type() {
	let mut module = Module::new();
	let mut boolean = DataBuilder::new(&mut module, "Bool", Vec::new(), Sort::SET0);
	boolean.monomorphic();
	boolean.constructor("true", Vec::new());
	boolean.constructor("false", Vec::new());
	let boolean = boolean.build();
	let mut wrapper = DataBuilder::new(&mut module, "Wrap", Vec::new(), Sort::SET0);
	wrapper.monomorphic();
	wrapper.constructor("wrap", vec![Parameter::new(None, Expression::universe(Sort::SET0))]);
	let wrapper = wrapper.build();

	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	assert_eq!(elaborator.check_definition(boolean), Ok(Status::NoErrors));
	assert_eq!(elaborator.check_definition(wrapper), Ok(Status::HasErrors));
	let DefinitionKind::Data(data) = &module[wrapper].kind else { unreachable!() };
	assert_eq!(module[data.constructors[0]].status(), Status::HasErrors);
	drop(elaborator);
	assert_eq!(diagnostics.len(), 1);
}
