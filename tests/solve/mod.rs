use std::rc::Rc;

use proptest::prelude::*;
use strata::{
	common::{Binding, Cmp},
	config::Config,
	instance::SimpleInstancePool,
	ir::{
		definition::{ClassBuilder, DefId, Module},
		expression::{ClassCall, Expression},
		level::{Levels, Sort},
		meta::{InferenceVariable, VariableKind},
		prelude,
	},
	op::{elaborate::Elaborator, substitute::zonk},
	report::{Diagnostic, ElaborationErrorKind, InferenceFailure},
};

use crate::common::{call, class_call, records, source, unary};

fn variable(expression: &Rc<Expression>) -> InferenceVariable {
	match expression.as_ref() {
		Expression::Inference(variable) => *variable,
		other => panic!("expected an inference variable, found {other:?}"),
	}
}

#[test]
fn a_second_solution_must_agree_with_the_first() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let x = elaborator.fresh_variable(None, VariableKind::Expression, Expression::nat(), source());
	assert!(elaborator.solve(variable(&x), Expression::integer(3u32), source()));
	assert!(elaborator.solve(variable(&x), unary(3), source()));
	assert!(!elaborator.solve(variable(&x), Expression::integer(4u32), source()));
	drop(elaborator);
	assert!(matches!(&diagnostics[..], [Diagnostic { kind: ElaborationErrorKind::Mismatch { cmp: Cmp::Eq, .. }, .. }]));
}

#[test]
fn closed_arithmetic_needs_no_deferral() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let sum = call(prelude::PLUS, vec![Expression::integer(2u32), Expression::integer(2u32)]);
	assert!(elaborator.add_equation(&sum, &Expression::integer(4u32), None, Cmp::Eq, source()));
	assert!(elaborator.equations().is_empty());
	assert!(!elaborator.add_equation(&sum, &Expression::integer(5u32), None, Cmp::Eq, source()));
	drop(elaborator);
	assert_eq!(diagnostics.len(), 1);
}

#[test]
fn lower_class_bounds_meet_at_their_common_implementations() {
	let records = records();
	for (first, second, agreed) in [(3u32, 3u32, true), (3, 4, false)] {
		let mut diagnostics = Vec::<Diagnostic>::new();
		let mut elaborator = Elaborator::new(&records.module, &mut diagnostics);
		let x = elaborator.fresh_variable(None, VariableKind::Expression, Expression::universe(Sort::SET0), source());
		let lower = |n: u32| class_call(&records, &[(records.n, Expression::integer(n))]);
		assert!(elaborator.add_equation(&lower(first), &x, None, Cmp::Le, source()));
		assert!(elaborator.add_equation(&lower(second), &x, None, Cmp::Le, source()));
		assert_eq!(elaborator.equations().len(), 2);
		assert!(elaborator.solve_equations());
		elaborator.finalize();

		let solution = zonk(&elaborator.metas, &x);
		let Expression::ClassCall(solution) = solution.as_ref() else { panic!("unsolved bound: {solution:?}") };
		assert_eq!(solution.definition, records.class);
		assert!(!solution.implementations.contains_key(&records.m));
		match agreed {
			true => assert_eq!(solution.implementations.get(&records.n), Some(&Expression::integer(first))),
			false => assert!(solution.implementations.is_empty()),
		}
		drop(elaborator);
		assert!(diagnostics.is_empty(), "{diagnostics:?}");
	}
}

#[test]
fn upper_class_bounds_must_agree() {
	let records = records();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&records.module, &mut diagnostics);
	let x = elaborator.fresh_variable(None, VariableKind::Expression, Expression::universe(Sort::SET0), source());
	let upper = |n: Rc<Expression>| class_call(&records, &[(records.n, n)]);
	assert!(elaborator.add_equation(&x, &upper(Expression::integer(3u32)), None, Cmp::Le, source()));
	assert!(elaborator.add_equation(&x, &upper(unary(3)), None, Cmp::Le, source()));
	assert!(elaborator.solve_equations());
	let solution = zonk(&elaborator.metas, &x);
	let Expression::ClassCall(solution) = solution.as_ref() else { panic!("unsolved bound: {solution:?}") };
	assert_eq!(solution.definition, records.class);
	assert_eq!(solution.implementations.len(), 1);

	let y = elaborator.fresh_variable(None, VariableKind::Expression, Expression::universe(Sort::SET0), source());
	assert!(elaborator.add_equation(&y, &upper(Expression::integer(3u32)), None, Cmp::Le, source()));
	assert!(elaborator.add_equation(&y, &upper(Expression::integer(4u32)), None, Cmp::Le, source()));
	elaborator.solve_equations();
	assert!(elaborator.metas.solution(variable(&y)).is_some_and(|solution| solution.is_error()));
	drop(elaborator);
	match &diagnostics[..] {
		[Diagnostic { kind: ElaborationErrorKind::UnsolvedEquations { equations }, .. }] => assert_eq!(equations.len(), 2),
		other => panic!("unexpected diagnostics: {other:?}"),
	}
}

#[test]
fn finite_type_bounds_become_size_equations() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let n = elaborator.fresh_variable(None, VariableKind::Expression, Expression::nat(), source());
	let fin = |size: Rc<Expression>| Expression::fin(size);
	assert!(elaborator.add_equation(&fin(Expression::integer(3u32)), &fin(n.clone()), None, Cmp::Le, source()));
	assert_eq!(elaborator.equations().len(), 1);
	assert!(elaborator.solve_equations());
	assert_eq!(elaborator.whnf(&n), Expression::integer(3u32));
	drop(elaborator);
	assert!(diagnostics.is_empty());
}

#[test]
fn equal_finite_types_have_equal_sizes() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let n = elaborator.fresh_variable(None, VariableKind::Expression, Expression::nat(), source());
	let three = Expression::fin(Expression::integer(3u32));
	assert!(elaborator.add_equation(&three, &Expression::fin(n.clone()), None, Cmp::Eq, source()));
	assert!(elaborator.solve_equations());
	assert_eq!(elaborator.whnf(&n), Expression::integer(3u32));
	assert!(!elaborator.add_equation(&three, &Expression::fin(Expression::integer(4u32)), None, Cmp::Eq, source()));
	drop(elaborator);
	assert!(matches!(&diagnostics[..], [Diagnostic { kind: ElaborationErrorKind::Mismatch { cmp: Cmp::Eq, .. }, .. }]));
}

#[test]
fn solutions_stay_within_the_variables_scope() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let x = elaborator.fresh_variable(None, VariableKind::Expression, Expression::nat(), source());
	let y = Binding::fresh();
	elaborator.context.push(y, Expression::nat());
	let inner = elaborator.fresh_variable(None, VariableKind::Expression, Expression::nat(), source());
	assert!(elaborator.add_equation(&inner, &Expression::reference(y), None, Cmp::Eq, source()));
	assert_eq!(elaborator.whnf(&inner), Expression::reference(y));
	assert!(elaborator.add_equation(&x, &Expression::suc(Expression::reference(y)), None, Cmp::Eq, source()));
	assert!(elaborator.metas.solution(variable(&x)).is_some_and(|solution| solution.is_error()));
	drop(elaborator);
	match &diagnostics[..] {
		[Diagnostic {
			kind: ElaborationErrorKind::InferenceFailure { reason: InferenceFailure::OutOfScope { bindings, .. }, .. },
			..
		}] => assert_eq!(bindings, &[y]),
		other => panic!("unexpected diagnostics: {other:?}"),
	}
}

#[test]
fn universes_below_a_proposition_become_propositions() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let ty = elaborator.fresh_variable(None, VariableKind::Expression, Expression::universe(Sort::SET0.succ()), source());
	assert!(elaborator.add_equation(&Expression::universe(Sort::PROP), &ty, None, Cmp::Le, source()));
	assert!(elaborator.metas.solution(variable(&ty)).is_none());
	assert!(elaborator.solve_equations());
	assert_eq!(elaborator.whnf(&ty), Expression::universe(Sort::PROP));
	drop(elaborator);
	assert!(diagnostics.is_empty());
}

#[test]
fn leftover_equations_are_reported_once() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let universe = Expression::universe(Sort::SET0.succ());
	let a = elaborator.fresh_variable(None, VariableKind::Expression, universe.clone(), source());
	let b = elaborator.fresh_variable(None, VariableKind::Expression, universe, source());
	assert!(elaborator.add_equation(&a, &b, None, Cmp::Le, source()));
	let pending = elaborator.equations().to_vec();
	assert!(!elaborator.solve_equations());
	elaborator.finalize();
	assert!(elaborator.equations().is_empty());
	assert!(elaborator.metas.solution(variable(&a)).is_some_and(|solution| solution.is_error()));
	drop(elaborator);
	assert_eq!(diagnostics.len(), 1);
	assert_eq!(diagnostics[0].kind, ElaborationErrorKind::UnsolvedEquations { equations: pending });
}

#[test]
fn unconstrained_variables_are_reported_unless_kept() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	elaborator.fresh_variable(None, VariableKind::Expression, Expression::nat(), source());
	elaborator.finalize();
	drop(elaborator);
	assert!(matches!(
		&diagnostics[..],
		[Diagnostic { kind: ElaborationErrorKind::InferenceFailure { reason: InferenceFailure::Unsolved, .. }, .. }]
	));

	let mut diagnostics = Vec::<Diagnostic>::new();
	let config = Config { report_unsolved_variables: false, ..Config::default() };
	let mut elaborator = Elaborator::new(&module, &mut diagnostics).with_config(config);
	let x = elaborator.fresh_variable(None, VariableKind::Expression, Expression::nat(), source());
	elaborator.finalize();
	assert!(!elaborator.metas.is_solved(variable(&x)));
	drop(elaborator);
	assert!(diagnostics.is_empty());
}

/// `\class Pointed (E : \Set0) (point : E)`, classified by `E`, with its instance for `Nat`.
fn pointed() -> (Module, DefId, DefId, Rc<Expression>) {
	let mut module = Module::new();
	let mut class = ClassBuilder::new(&mut module, "Pointed");
	let carrier = class.field("E", Expression::universe(Sort::SET0), Sort::SET0.succ());
	let point = class.field("point", Rc::new(Expression::FieldCall { field: carrier, argument: class.this() }), Sort::SET0);
	class.classifying(carrier);
	let class = class.build();
	let implementations = [(carrier, Expression::nat()), (point, Expression::integer(0u32))].into_iter().collect();
	let levels = Levels::from_sort(Sort::SET0);
	let instance = Rc::new(Expression::New(ClassCall::new(&module, class, levels, Binding::fresh(), implementations)));
	(module, class, carrier, instance)
}

#[test]
fn instances_are_found_by_their_classifying_field() {
	let (module, class, carrier, instance) = pointed();
	let mut pool = SimpleInstancePool::new();
	pool.add(class, Expression::nat(), instance.clone());
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics).with_instances(&pool);
	let ty = Expression::class_call(ClassCall::empty(&module, class, Levels::from_sort(Sort::SET0)));
	let x = elaborator.fresh_variable(None, VariableKind::TypeClass { class }, ty.clone(), source());
	let projected = Rc::new(Expression::FieldCall { field: carrier, argument: x.clone() });
	assert!(elaborator.add_equation(&projected, &Expression::nat(), None, Cmp::Eq, source()));
	assert_eq!(elaborator.metas.solution(variable(&x)), Some(&instance));

	let y = elaborator.fresh_variable(None, VariableKind::TypeClass { class }, ty, source());
	let projected = Rc::new(Expression::FieldCall { field: carrier, argument: y.clone() });
	let int = Expression::data_call(prelude::INT, Levels::empty(), Vec::new());
	assert!(elaborator.add_equation(&projected, &int, None, Cmp::Eq, source()));
	assert!(elaborator.metas.solution(variable(&y)).is_some_and(|solution| solution.is_error()));
	drop(elaborator);
	assert!(matches!(
		&diagnostics[..],
		[Diagnostic { kind: ElaborationErrorKind::InferenceFailure { reason: InferenceFailure::NoInstance { .. }, .. }, .. }]
	));
}

proptest! {
	#[test]
	fn finite_type_sizes_are_inferred(size in 0u32..1000) {
		let module = Module::new();
		let mut diagnostics = Vec::<Diagnostic>::new();
		let mut elaborator = Elaborator::new(&module, &mut diagnostics);
		let n = elaborator.fresh_variable(None, VariableKind::Expression, Expression::nat(), source());
		let lower = Expression::fin(Expression::integer(size));
		prop_assert!(elaborator.add_equation(&lower, &Expression::fin(n.clone()), None, Cmp::Le, source()));
		prop_assert!(elaborator.solve_equations());
		prop_assert_eq!(elaborator.whnf(&n), Expression::integer(size));
	}
}
