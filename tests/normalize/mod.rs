use std::rc::Rc;

use num_bigint::BigUint;
use proptest::prelude::*;
use strata::{
	common::{Binding, Decision},
	ir::{
		definition::{Body, Definition, Module},
		expression::{Clause, Expression, LetClause, Parameter, Pattern},
		level::{Levels, Sort},
		meta::{Metacontext, VariableKind},
		prelude,
	},
	op::normalize::Normalizer,
};

use crate::common::{call, source, unary};

/// `\case argument \with { y => suc y }` when `bound`, and a predecessor match otherwise.
fn case(argument: Rc<Expression>, bound: bool) -> Rc<Expression> {
	let parameter = Parameter::new(None, Expression::nat());
	let y = Binding::fresh();
	let clauses = if bound {
		vec![Clause { patterns: vec![Pattern::Binding(y)], body: Expression::suc(Expression::reference(y)) }]
	} else {
		vec![
			Clause {
				patterns: vec![Pattern::Constructor { constructor: prelude::ZERO, arguments: Vec::new() }],
				body: Expression::integer(0u32),
			},
			Clause {
				patterns: vec![Pattern::Constructor { constructor: prelude::SUC, arguments: vec![Pattern::Binding(y)] }],
				body: Expression::reference(y),
			},
		]
	};
	Rc::new(Expression::Case { arguments: vec![argument], parameters: vec![parameter], result_type: Expression::nat(), clauses })
}

fn expressions() -> impl Strategy<Value = Rc<Expression>> {
	let leaf = prop_oneof![
		(0u32..4).prop_map(|n| Expression::integer(n)),
		Just(()).prop_map(|_| Expression::reference(Binding::fresh())),
	];
	leaf.prop_recursive(3, 32, 2, |inner| {
		prop_oneof![
			inner.clone().prop_map(Expression::suc),
			(inner.clone(), inner.clone()).prop_map(|(left, right)| call(prelude::PLUS, vec![left, right])),
			(inner.clone(), any::<bool>()).prop_map(|(argument, bound)| case(argument, bound)),
			(inner.clone(), inner.clone(), any::<bool>()).prop_map(|(value, body, used)| {
				let binding = Binding::fresh();
				let body = if used { call(prelude::PLUS, vec![Expression::reference(binding), body]) } else { body };
				let clause = LetClause { binding, name: None, ty: Expression::nat(), value };
				Rc::new(Expression::Let { clauses: vec![clause], body, opaque: true })
			}),
			inner.prop_map(|argument| {
				let x = Parameter::new(None, Expression::nat());
				Expression::app(Expression::lambda(x.clone(), Expression::suc(x.reference())), [argument])
			}),
		]
	})
}

#[test]
fn matches_on_bindings_are_never_normal() {
	let module = Module::new();
	let metas = Metacontext::new();
	let normalizer = Normalizer::new(&module, &metas);
	let x = Expression::reference(Binding::fresh());
	let always = case(x.clone(), true);
	assert_eq!(normalizer.is_whnf(&always), Decision::No);
	assert_eq!(normalizer.whnf(&always), Expression::suc(x.clone()));
	let neutral = case(x.clone(), false);
	assert_eq!(normalizer.is_whnf(&neutral), Decision::Yes);
	assert_eq!(normalizer.whnf(&neutral), neutral);

	// `f y = y` on a single binding pattern.
	let mut module = Module::new();
	let y = Binding::fresh();
	let name = module.intern("identity");
	let clauses = vec![Clause { patterns: vec![Pattern::Binding(y)], body: Expression::reference(y) }];
	let definition = Definition::function(
		name,
		vec![Parameter::new(None, Expression::nat())],
		Expression::nat(),
		Some(Body::Clauses(clauses)),
	);
	let identity = module.add(definition.with_level_parameters(Vec::new()));
	let normalizer = Normalizer::new(&module, &metas);
	let applied = call(identity, vec![x.clone()]);
	assert_eq!(normalizer.is_whnf(&applied), Decision::No);
	assert_eq!(normalizer.whnf(&applied), x);
}

#[test]
fn arithmetic_folds_on_literals() {
	let module = Module::new();
	let metas = Metacontext::new();
	let normalizer = Normalizer::new(&module, &metas);
	let literal = |n: u32| Expression::integer(n);
	assert_eq!(normalizer.whnf(&call(prelude::PLUS, vec![literal(2), literal(2)])), literal(4));
	assert_eq!(normalizer.whnf(&call(prelude::MUL, vec![literal(6), literal(7)])), literal(42));
	assert_eq!(normalizer.whnf(&call(prelude::DIV, vec![literal(7), literal(2)])), literal(3));
	assert_eq!(normalizer.whnf(&call(prelude::DIV, vec![literal(7), literal(0)])), literal(0));
	assert_eq!(normalizer.whnf(&call(prelude::MOD, vec![literal(7), literal(0)])), literal(7));
	let negative = Expression::con_call(prelude::NEG, Levels::empty(), Vec::new(), vec![literal(3)]);
	assert_eq!(normalizer.whnf(&call(prelude::MINUS, vec![literal(2), literal(5)])), negative);
}

#[test]
fn normalization_unfolds_clauses_under_constructors() {
	let module = Module::new();
	let metas = Metacontext::new();
	let normalizer = Normalizer::new(&module, &metas);
	let x = Expression::reference(Binding::fresh());
	let sum = call(prelude::PLUS, vec![x.clone(), Expression::integer(2u32)]);
	let normal = normalizer.normalize(&sum);
	assert_eq!(normal, Expression::suc(Expression::suc(x)));
	assert_eq!(normalizer.is_whnf(&normal), Decision::Yes);
}

#[test]
fn calls_blocked_on_a_variable_are_maybe() {
	let module = Module::new();
	let mut metas = Metacontext::new();
	let variable = metas.spawn(None, VariableKind::Expression, Expression::nat(), Vec::new(), source());
	let normalizer = Normalizer::new(&module, &metas);
	let sum = call(prelude::PLUS, vec![Expression::integer(1u32), Expression::inference(variable)]);
	assert_eq!(normalizer.is_whnf(&sum), Decision::Maybe);
	assert_eq!(normalizer.whnf(&sum), sum);
	assert_eq!(normalizer.stuck_variable(&sum), Some(variable));
	assert_eq!(normalizer.unsolved_variable(&sum), None);
}

#[test]
fn solved_variables_are_substituted() {
	let module = Module::new();
	let mut metas = Metacontext::new();
	let variable = metas.spawn(None, VariableKind::Expression, Expression::nat(), Vec::new(), source());
	metas.solve(variable, Expression::integer(3u32));
	let normalizer = Normalizer::new(&module, &metas);
	let sum = call(prelude::PLUS, vec![Expression::integer(1u32), Expression::inference(variable)]);
	assert_eq!(normalizer.is_whnf(&Expression::inference(variable)), Decision::No);
	assert_eq!(normalizer.whnf(&sum), Expression::integer(4u32));
	assert_eq!(normalizer.stuck_variable(&sum), None);
}

#[test]
fn path_application_computes_at_endpoints() {
	let module = Module::new();
	let metas = Metacontext::new();
	let normalizer = Normalizer::new(&module, &metas);
	let [family, start, end, path] = [(); 4].map(|_| Expression::reference(Binding::fresh()));
	let at = |point: Rc<Expression>| {
		Rc::new(Expression::FunCall {
			definition: prelude::AT,
			levels: Levels::std(),
			arguments: vec![family.clone(), start.clone(), end.clone(), path.clone(), point],
		})
	};
	assert_eq!(normalizer.whnf(&at(Expression::left())), start);
	assert_eq!(normalizer.whnf(&at(Expression::right())), end);
	let point = Expression::reference(Binding::fresh());
	assert_eq!(normalizer.is_whnf(&at(point)), Decision::Yes);
}

#[test]
fn lets_unfold_unless_opaque() {
	let module = Module::new();
	let metas = Metacontext::new();
	let normalizer = Normalizer::new(&module, &metas);
	let binding = Binding::fresh();
	let clause = LetClause { binding, name: None, ty: Expression::nat(), value: Expression::integer(5u32) };
	let body = call(prelude::PLUS, vec![Expression::reference(binding), Expression::integer(1u32)]);
	let transparent =
		Rc::new(Expression::Let { clauses: vec![clause.clone()], body: body.clone(), opaque: false });
	assert_eq!(normalizer.whnf(&transparent), Expression::integer(6u32));

	let opaque = Rc::new(Expression::Let { clauses: vec![clause], body: Expression::reference(binding), opaque: true });
	assert!(matches!(normalizer.whnf(&opaque).as_ref(), Expression::Let { .. }));
	assert_eq!(normalizer.is_whnf(&opaque), Decision::Yes);
}

#[test]
fn case_matches_literals_against_constructor_patterns() {
	let module = Module::new();
	let metas = Metacontext::new();
	let normalizer = Normalizer::new(&module, &metas);
	let parameter = Parameter::new(None, Expression::nat());
	let predecessor = Binding::fresh();
	let case = |argument: Rc<Expression>| {
		Rc::new(Expression::Case {
			arguments: vec![argument],
			parameters: vec![parameter.clone()],
			result_type: Expression::nat(),
			clauses: vec![
				Clause {
					patterns: vec![Pattern::Constructor { constructor: prelude::ZERO, arguments: Vec::new() }],
					body: Expression::integer(0u32),
				},
				Clause {
					patterns: vec![Pattern::Constructor {
						constructor: prelude::SUC,
						arguments: vec![Pattern::Binding(predecessor)],
					}],
					body: Expression::reference(predecessor),
				},
			],
		})
	};
	assert_eq!(normalizer.whnf(&case(Expression::integer(8u32))), Expression::integer(7u32));
	assert_eq!(normalizer.whnf(&case(unary(0))), Expression::integer(0u32));
	let neutral = case(Expression::reference(Binding::fresh()));
	assert_eq!(normalizer.whnf(&neutral), neutral);
}

#[test]
fn projections_of_tuples_reduce() {
	let module = Module::new();
	let metas = Metacontext::new();
	let normalizer = Normalizer::new(&module, &metas);
	let sigma = Rc::new(Expression::Sigma {
		sort: Sort::SET0,
		parameters: vec![Parameter::new(None, Expression::nat()), Parameter::new(None, Expression::nat())],
	});
	let tuple = Rc::new(Expression::Tuple {
		fields: vec![Expression::integer(1u32), Expression::integer(2u32)],
		ty: sigma,
	});
	assert_eq!(normalizer.whnf(&Expression::proj(tuple, 1)), Expression::integer(2u32));
}

proptest! {
	#[test]
	fn unary_arithmetic_folds_like_literals(a in 0u32..40, b in 0u32..40) {
		let module = Module::new();
		let metas = Metacontext::new();
		let normalizer = Normalizer::new(&module, &metas);
		let sum = normalizer.whnf(&call(prelude::PLUS, vec![unary(a), unary(b)]));
		prop_assert_eq!(sum.as_natural(), Some(BigUint::from(a + b)));
		let product = normalizer.whnf(&call(prelude::MUL, vec![unary(a), Expression::integer(b)]));
		prop_assert_eq!(product.as_natural(), Some(BigUint::from(a * b)));
	}

	#[test]
	fn normal_forms_are_left_alone(expression in expressions()) {
		let module = Module::new();
		let metas = Metacontext::new();
		let normalizer = Normalizer::new(&module, &metas);
		let whnf = normalizer.whnf(&expression);
		prop_assert_eq!(normalizer.is_whnf(&whnf), Decision::Yes);
		if normalizer.is_whnf(&expression) == Decision::Yes {
			prop_assert_eq!(whnf, expression);
		}
	}
}
