use proptest::prelude::*;
use strata::{
	common::Cmp,
	ir::{
		definition::Module,
		expression::Expression,
		level::{Level, LevelKind, LevelVariable, Rigid, Sort},
	},
	op::elaborate::Elaborator,
	report::{Diagnostic, ElaborationErrorKind},
};

use crate::common::source;

const P: LevelVariable = LevelVariable::Std(LevelKind::P);

fn solution(elaborator: &Elaborator, level: Level) -> Option<Level> {
	match level.var? {
		LevelVariable::Inference(meta) => elaborator.metas.level_solution(meta),
		_ => None,
	}
}

#[test]
fn rigid_levels_compare_by_shift_and_maximum() {
	let lp = Level::var(P);
	assert!(Level::compare(&lp, &lp.add(1), Cmp::Le, &mut Rigid, source()));
	assert!(!Level::compare(&lp.add(1), &lp, Cmp::Le, &mut Rigid, source()));
	assert!(Level::compare(&Level::ZERO, &lp, Cmp::Le, &mut Rigid, source()));
	assert!(!Level::compare(&Level::closed(1), &lp, Cmp::Le, &mut Rigid, source()));
	assert!(Level::compare(&Level::closed(2), &lp.max_closed(2), Cmp::Le, &mut Rigid, source()));
	assert!(Level::compare(&lp, &Level::INFINITY, Cmp::Le, &mut Rigid, source()));
}

#[test]
fn propositions_sit_below_every_sort() {
	assert!(Sort::compare(&Sort::PROP, &Sort::SET0, Cmp::Le, &mut Rigid, source()));
	assert!(Sort::compare(&Sort::PROP, &Sort::std(), Cmp::Le, &mut Rigid, source()));
	assert!(!Sort::compare(&Sort::SET0, &Sort::PROP, Cmp::Le, &mut Rigid, source()));
	assert!(!Sort::compare(&Sort::PROP, &Sort::SET0, Cmp::Eq, &mut Rigid, source()));
	assert_eq!(Sort::PROP.succ(), Sort::SET0);
	assert_eq!(Sort::SET0.max(&Sort::PROP), Some(Sort::SET0));
}

#[test]
fn a_variable_cannot_be_strictly_below_itself() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let a = elaborator.fresh_level(LevelKind::P, source());
	assert!(!Level::compare(&a, &a.add(-1), Cmp::Le, &mut elaborator, source()));
	assert!(!Level::compare(&a.add(1), &a, Cmp::Le, &mut elaborator, source()));
	assert!(Level::compare(&a, &a.add(-1).max_closed(3), Cmp::Le, &mut elaborator, source()));
	assert!(Level::compare(&Level::closed(2), &a, Cmp::Le, &mut elaborator, source()));
	elaborator.finalize();
	assert_eq!(solution(&elaborator, a), Some(Level::closed(2)));
	drop(elaborator);
	assert_eq!(diagnostics.len(), 2);
	assert!(diagnostics.iter().all(|diagnostic| matches!(diagnostic.kind, ElaborationErrorKind::LevelUnsolvable { .. })));
}

#[test]
fn universe_mismatches_on_levels_report_the_level_equation() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let a = elaborator.fresh_level(LevelKind::P, source());
	let bigger = Expression::universe(Sort::new(a.add(1), Level::ZERO));
	let smaller = Expression::universe(Sort::new(a, Level::ZERO));
	assert!(!elaborator.add_equation(&bigger, &smaller, None, Cmp::Le, source()));
	assert!(elaborator.add_equation(&smaller, &bigger, None, Cmp::Le, source()));
	drop(elaborator);
	let [Diagnostic { kind: ElaborationErrorKind::LevelUnsolvable { equations }, .. }] = &diagnostics[..] else {
		panic!("expected a single level error, got {diagnostics:?}");
	};
	assert_eq!(equations.len(), 1);
}

#[test]
fn bounds_that_cannot_meet_are_reported() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let a = elaborator.fresh_level(LevelKind::H, source());
	assert!(Level::compare(&a, &a.add(-1).max_closed(3), Cmp::Le, &mut elaborator, source()));
	assert!(Level::compare(&Level::closed(5), &a, Cmp::Le, &mut elaborator, source()));
	elaborator.finalize();
	drop(elaborator);
	assert!(matches!(diagnostics[..], [Diagnostic { kind: ElaborationErrorKind::LevelUnsolvable { .. }, .. }]));
}

#[test]
fn infinity_propagates_upwards() {
	let module = Module::new();
	let mut diagnostics = Vec::<Diagnostic>::new();
	let mut elaborator = Elaborator::new(&module, &mut diagnostics);
	let (a, b) = (elaborator.fresh_level(LevelKind::H, source()), elaborator.fresh_level(LevelKind::H, source()));
	assert!(Level::compare(&Level::INFINITY, &a, Cmp::Le, &mut elaborator, source()));
	assert!(Level::compare(&a, &b, Cmp::Le, &mut elaborator, source()));
	elaborator.finalize();
	assert_eq!(solution(&elaborator, a), Some(Level::INFINITY));
	assert_eq!(solution(&elaborator, b), Some(Level::INFINITY));
	drop(elaborator);
	assert!(diagnostics.is_empty());
}

proptest! {
	#[test]
	fn closed_levels_compare_as_integers(a in 0i32..100, b in 0i32..100) {
		prop_assert_eq!(Level::compare(&Level::closed(a), &Level::closed(b), Cmp::Le, &mut Rigid, source()), a <= b);
		prop_assert_eq!(Level::closed(a).max(Level::closed(b)), Some(Level::closed(a.max(b))));
	}

	#[test]
	fn shifted_variables_compare_by_shift(a in 0i32..20, b in 0i32..20) {
		let lp = Level::var(P);
		prop_assert_eq!(Level::compare(&lp.add(a), &lp.add(b), Cmp::Le, &mut Rigid, source()), a <= b);
		prop_assert!(Level::compare(&lp.add(a), &lp.add(a).max_closed(b), Cmp::Eq, &mut Rigid, source()) == (b <= a));
	}
}
