use std::rc::Rc;

use proptest::prelude::*;
use strata::{
	common::{Binding, Cmp},
	config::Config,
	ir::{
		definition::{ClassBuilder, DefId, Module},
		expression::{ClassCall, Expression, Parameter},
		level::{Levels, Sort},
		prelude,
	},
	op::elaborate::Elaborator,
	report::Diagnostic,
};

use crate::common::{call, class_call, records, source, unary};

fn empty(module: &Module, class: DefId) -> Rc<Expression> {
	Expression::class_call(ClassCall::empty(module, class, Levels::from_sort(Sort::SET0)))
}

/// `1 = 1` over `Nat`, a proposition.
fn one_is_one() -> Rc<Expression> {
	let family = Expression::lambda(Parameter::new(None, Expression::interval()), Expression::nat());
	Expression::data_call(
		prelude::PATH,
		Levels::from_sort(Sort::SET0),
		vec![family, Expression::integer(1u32), Expression::integer(1u32)],
	)
}

#[test]
fn implementing_more_fields_is_a_subtype() {
	let records = records();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&records.module, &mut diagnostics);
	let three = class_call(&records, &[(records.n, Expression::integer(3u32))]);
	let four = class_call(&records, &[(records.n, Expression::integer(4u32))]);
	let none = class_call(&records, &[]);
	assert!(elaborator.compare(Cmp::Le, &three, &none, None, source()));
	assert!(elaborator.compare(Cmp::Ge, &none, &three, None, source()));
	assert!(!elaborator.compare(Cmp::Le, &none, &three, None, source()));
	assert!(!elaborator.compare(Cmp::Le, &three, &four, None, source()));
	assert!(!elaborator.compare(Cmp::Eq, &three, &none, None, source()));
	let again = class_call(&records, &[(records.n, unary(3))]);
	assert!(elaborator.compare(Cmp::Eq, &three, &again, None, source()));
	assert!(elaborator.equations().is_empty());
}

#[test]
fn subclassing_is_transitive() {
	let mut module = Module::new();
	let mut a = ClassBuilder::new(&mut module, "A");
	a.field("x", Expression::nat(), Sort::SET0);
	let a = a.build();
	let mut b = ClassBuilder::new(&mut module, "B");
	b.extends(a);
	let b = b.build();
	let mut c = ClassBuilder::new(&mut module, "C");
	c.extends(b);
	c.field("y", Expression::nat(), Sort::SET0);
	let c = c.build();

	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let (a, b, c) = (empty(&module, a), empty(&module, b), empty(&module, c));
	assert!(elaborator.compare(Cmp::Le, &b, &a, None, source()));
	assert!(elaborator.compare(Cmp::Le, &c, &b, None, source()));
	assert!(elaborator.compare(Cmp::Le, &c, &a, None, source()));
	assert!(!elaborator.compare(Cmp::Le, &a, &c, None, source()));
	assert!(!elaborator.compare(Cmp::Eq, &b, &a, None, source()));
}

#[test]
fn proofs_of_a_proposition_are_equal() {
	let module = Module::new();
	let ty = one_is_one();
	let (p, q) = (Binding::fresh(), Binding::fresh());

	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	assert!(elaborator.is_proposition(&ty));
	elaborator.context.push(p, ty.clone());
	elaborator.context.push(q, ty.clone());
	assert!(elaborator.compare(Cmp::Eq, &Expression::reference(p), &Expression::reference(q), Some(&ty), source()));

	let config = Config { proof_irrelevance: false, ..Config::default() };
	let mut elaborator = Elaborator::new(&module, &mut diagnostics).with_config(config);
	elaborator.context.push(p, ty.clone());
	elaborator.context.push(q, ty.clone());
	assert!(!elaborator.compare(Cmp::Eq, &Expression::reference(p), &Expression::reference(q), Some(&ty), source()));
}

#[test]
fn lambdas_compare_up_to_eta() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let f = Binding::fresh();
	elaborator.context.push(f, Expression::arrow(Sort::SET0, Expression::nat(), Expression::nat()));
	let x = Parameter::new(None, Expression::nat());
	let expanded = Expression::lambda(x.clone(), Expression::app(Expression::reference(f), [x.reference()]));
	assert!(elaborator.compare(Cmp::Eq, &expanded, &Expression::reference(f), None, source()));
	let y = Parameter::new(None, Expression::nat());
	let renamed = Expression::lambda(y.clone(), Expression::app(Expression::reference(f), [y.reference()]));
	assert!(elaborator.compare(Cmp::Eq, &expanded, &renamed, None, source()));
}

#[test]
fn finite_types_embed_into_naturals() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let fin = |n: u32| Expression::fin(Expression::integer(n));
	assert!(elaborator.compare(Cmp::Le, &fin(3), &fin(5), None, source()));
	assert!(!elaborator.compare(Cmp::Le, &fin(5), &fin(3), None, source()));
	assert!(elaborator.compare(Cmp::Le, &fin(3), &Expression::nat(), None, source()));
	assert!(!elaborator.compare(Cmp::Le, &Expression::nat(), &fin(3), None, source()));
	assert!(!elaborator.compare(Cmp::Eq, &fin(3), &fin(5), None, source()));
}

#[test]
fn universes_are_cumulative() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let (small, large) = (Expression::universe(Sort::SET0), Expression::universe(Sort::SET0.succ()));
	assert!(elaborator.compare(Cmp::Le, &small, &large, None, source()));
	assert!(!elaborator.compare(Cmp::Ge, &small, &large, None, source()));
	assert!(elaborator.compare(Cmp::Le, &Expression::universe(Sort::PROP), &small, None, source()));
}

proptest! {
	#[test]
	fn comparison_is_reflexive_up_to_computation(a in 0u32..30, b in 0u32..30) {
		let module = Module::new();
		let mut diagnostics = Vec::<Diagnostic>::new();
		let mut elaborator = Elaborator::new(&module, &mut diagnostics);
		let sum = call(prelude::PLUS, vec![unary(a), Expression::integer(b)]);
		prop_assert!(elaborator.compare(Cmp::Eq, &sum, &sum, None, source()));
		prop_assert!(elaborator.compare(Cmp::Eq, &sum, &Expression::integer(a + b), None, source()));
		prop_assert!(elaborator.compare(Cmp::Eq, &Expression::integer(a + b), &unary(a + b), None, source()));
		prop_assert!(!elaborator.compare(Cmp::Eq, &sum, &unary(a + b + 1), None, source()));
	}

	#[test]
	fn stuck_sums_unfold_against_constructors(b in 0u32..20) {
		let module = Module::new();
		let mut diagnostics = Vec::<Diagnostic>::new();
		let mut elaborator = Elaborator::new(&module, &mut diagnostics);
		let x = Binding::fresh();
		elaborator.context.push(x, Expression::nat());
		let sum = call(prelude::PLUS, vec![Expression::reference(x), Expression::integer(b)]);
		let expected = (0..b).fold(Expression::reference(x), |expression, _| Expression::suc(expression));
		prop_assert!(elaborator.compare(Cmp::Eq, &sum, &expected, None, source()));
	}
}
