use std::rc::Rc;

use strata::{
	common::{Binding, SourceNode},
	ir::{
		definition::{ClassBuilder, DefId, Module},
		expression::{ClassCall, Expression},
		level::{Levels, Sort},
	},
};

pub fn source() -> SourceNode { SourceNode::default() }

/// A module extended with `\record C (n m : Nat)`.
pub struct Records {
	pub module: Module,
	pub class: DefId,
	pub n: DefId,
	pub m: DefId,
}

pub fn records() -> Records {
	let mut module = Module::new();
	let mut class = ClassBuilder::new(&mut module, "C");
	let n = class.field("n", Expression::nat(), Sort::SET0);
	let m = class.field("m", Expression::nat(), Sort::SET0);
	let class = class.build();
	Records { module, class, n, m }
}

/// `C { implementations }` at the lowest levels.
pub fn class_call(records: &Records, implementations: &[(DefId, Rc<Expression>)]) -> Rc<Expression> {
	let implementations = implementations.iter().cloned().collect();
	Expression::class_call(ClassCall::new(
		&records.module,
		records.class,
		Levels::from_sort(Sort::SET0),
		Binding::fresh(),
		implementations,
	))
}

/// `suc (suc ... zero)` with `n` applications of `suc`.
pub fn unary(n: u32) -> Rc<Expression> { (0..n).fold(Expression::zero(), |expression, _| Expression::suc(expression)) }

pub fn call(definition: DefId, arguments: Vec<Rc<Expression>>) -> Rc<Expression> {
	Rc::new(Expression::FunCall { definition, levels: Levels::empty(), arguments })
}
