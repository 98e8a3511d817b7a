//! Built-in definitions every module starts with. Their identities are fixed by installation order.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
	common::Binding,
	ir::{
		definition::{
			Body, Builtin, ClassBuilder, DataBuilder, DefId, Definition, DefinitionKind, Function, FunctionKind,
			Module, Status,
		},
		expression::{ClassCall, Clause, Expression, Parameter, Pattern},
		level::{Level, LevelKind, LevelVariable, Levels, Sort},
	},
	utility::rc,
};

pub const NAT: DefId = DefId(0);
pub const ZERO: DefId = DefId(1);
pub const SUC: DefId = DefId(2);
pub const INT: DefId = DefId(3);
pub const POS: DefId = DefId(4);
pub const NEG: DefId = DefId(5);
pub const FIN: DefId = DefId(6);
pub const INTERVAL: DefId = DefId(7);
pub const LEFT: DefId = DefId(8);
pub const RIGHT: DefId = DefId(9);
pub const PATH: DefId = DefId(10);
pub const EQUALS: DefId = DefId(11);
pub const IDP: DefId = DefId(12);
pub const AT: DefId = DefId(13);
pub const PLUS: DefId = DefId(14);
pub const MUL: DefId = DefId(15);
pub const MINUS: DefId = DefId(16);
pub const DIV: DefId = DefId(17);
pub const MOD: DefId = DefId(18);
pub const ARRAY: DefId = DefId(19);
pub const ARRAY_ELEMENT_TYPE: DefId = DefId(20);
pub const ARRAY_LENGTH: DefId = DefId(21);
pub const ARRAY_AT: DefId = DefId(22);

fn std_universe() -> Sort { Sort::std().succ() }

fn path_sort() -> Sort {
	Sort::new(Level::var(LevelVariable::Std(LevelKind::P)), Level::var(LevelVariable::Std(LevelKind::H)).add(-1))
}

fn monomorphic(module: &mut Module, definition: Definition) -> DefId {
	module.add(definition.with_level_parameters(Vec::new()).with_status(Status::NoErrors))
}

pub(crate) fn install(module: &mut Module) {
	let mut nat = DataBuilder::new(module, "Nat", Vec::new(), Sort::SET0);
	nat.monomorphic();
	nat.constructor("zero", Vec::new());
	nat.constructor("suc", vec![Parameter::new(None, Expression::nat())]);
	nat.build();

	let mut int = DataBuilder::new(module, "Int", Vec::new(), Sort::SET0);
	int.monomorphic();
	int.constructor("pos", vec![Parameter::new(None, Expression::nat())]);
	int.constructor("neg", vec![Parameter::new(None, Expression::nat())]);
	int.build();

	let size = module.intern("n");
	let mut fin = DataBuilder::new(module, "Fin", vec![Parameter::new(Some(size), Expression::nat())], Sort::SET0);
	fin.monomorphic();
	fin.build();

	let mut interval = DataBuilder::new(module, "I", Vec::new(), Sort::SET0);
	interval.monomorphic();
	interval.constructor("left", Vec::new());
	interval.constructor("right", Vec::new());
	interval.build();

	install_paths(module);
	install_arithmetic(module);
	install_array(module);

	debug_assert_eq!(module.next_id(), DefId(ARRAY_AT.0 + 1));
}

fn install_paths(module: &mut Module) {
	let family = Parameter::new(
		Some(module.intern("A")),
		Expression::arrow(std_universe(), Expression::interval(), Expression::universe(Sort::std())),
	);
	let start = Parameter::new(Some(module.intern("a")), Expression::app(family.reference(), [Expression::left()]));
	let end = Parameter::new(Some(module.intern("a'")), Expression::app(family.reference(), [Expression::right()]));
	DataBuilder::new(module, "Path", vec![family, start, end], path_sort()).build();

	let constant_family = |ty: &Parameter| {
		Expression::lambda(Parameter::new(None, Expression::interval()), ty.reference())
	};

	// \func \infix 4 = {A : \Type} (a a' : A) => Path (\lam _ => A) a a'
	let ty = Parameter::implicit(Some(module.intern("A")), Expression::universe(Sort::std()));
	let a = Parameter::new(Some(module.intern("a")), ty.reference());
	let b = Parameter::new(Some(module.intern("a'")), ty.reference());
	let body = Expression::data_call(PATH, Levels::std(), vec![constant_family(&ty), a.reference(), b.reference()]);
	let name = module.intern("=");
	module.add(
		Definition::function(name, vec![ty, a, b], Expression::universe(path_sort()), Some(Body::Expression(body)))
			.with_status(Status::NoErrors),
	);

	// \func idp {A : \Type} {a : A} : a = a => path (\lam _ => a)
	let ty = Parameter::implicit(Some(module.intern("A")), Expression::universe(Sort::std()));
	let a = Parameter::implicit(Some(module.intern("a")), ty.reference());
	let result_type = Expression::fun_call(module, EQUALS, Levels::std(), vec![ty.reference(), a.reference(), a.reference()]);
	let body = rc!(Expression::Path {
		levels: Levels::std(),
		ty: constant_family(&ty),
		function: Expression::lambda(Parameter::new(None, Expression::interval()), a.reference()),
	});
	let name = module.intern("idp");
	module.add(
		Definition::function(name, vec![ty, a], result_type, Some(Body::Expression(body))).with_status(Status::NoErrors),
	);

	// \func \infixl 9 @ {A : I -> \Type} {a : A left} {a' : A right} (p : Path A a a') (i : I) : A i
	let family = Parameter::implicit(
		Some(module.intern("A")),
		Expression::arrow(std_universe(), Expression::interval(), Expression::universe(Sort::std())),
	);
	let start = Parameter::implicit(None, Expression::app(family.reference(), [Expression::left()]));
	let end = Parameter::implicit(None, Expression::app(family.reference(), [Expression::right()]));
	let path = Parameter::new(
		Some(module.intern("p")),
		Expression::data_call(PATH, Levels::std(), vec![family.reference(), start.reference(), end.reference()]),
	);
	let point = Parameter::new(Some(module.intern("i")), Expression::interval());
	let result_type = Expression::app(family.reference(), [point.reference()]);
	let name = module.intern("@");
	module.add(
		Definition::new(
			name,
			vec![family, start, end, path, point],
			DefinitionKind::Function(Function {
				kind: FunctionKind::Function,
				result_type,
				body: None,
				builtin: Some(Builtin::At),
			}),
		)
		.with_status(Status::NoErrors),
	);
}

fn binary(module: &mut Module, name: &str, result_type: Expression, builtin: Builtin, clauses: Option<Vec<Clause>>) {
	let name = module.intern(name);
	let parameters = vec![Parameter::new(None, Expression::nat()), Parameter::new(None, Expression::nat())];
	monomorphic(
		module,
		Definition::new(
			name,
			parameters,
			DefinitionKind::Function(Function {
				kind: FunctionKind::Function,
				result_type: rc!(result_type),
				body: clauses.map(Body::Clauses),
				builtin: Some(builtin),
			}),
		),
	);
}

fn zero_pattern() -> Pattern { Pattern::Constructor { constructor: ZERO, arguments: Vec::new() } }

fn suc_pattern(binding: Binding) -> Pattern { Pattern::Constructor { constructor: SUC, arguments: vec![Pattern::Binding(binding)] } }

fn install_arithmetic(module: &mut Module) {
	let nat = || Expression::DataCall { definition: NAT, levels: Levels::empty(), arguments: Vec::new() };
	let call = |definition, arguments| rc!(Expression::FunCall { definition, levels: Levels::empty(), arguments });

	// x + zero => x
	// x + suc y => suc (x + y)
	let x = Binding::fresh();
	let (x1, y1) = (Binding::fresh(), Binding::fresh());
	let plus = vec![
		Clause { patterns: vec![Pattern::Binding(x), zero_pattern()], body: Expression::reference(x) },
		Clause {
			patterns: vec![Pattern::Binding(x1), suc_pattern(y1)],
			body: Expression::suc(call(PLUS, vec![Expression::reference(x1), Expression::reference(y1)])),
		},
	];
	binary(module, "+", nat(), Builtin::Plus, Some(plus));

	// x * zero => 0
	// x * suc y => x * y + x
	let (x1, y1) = (Binding::fresh(), Binding::fresh());
	let product = call(MUL, vec![Expression::reference(x1), Expression::reference(y1)]);
	let mul = vec![
		Clause { patterns: vec![Pattern::Binding(Binding::fresh()), zero_pattern()], body: Expression::integer(0u32) },
		Clause {
			patterns: vec![Pattern::Binding(x1), suc_pattern(y1)],
			body: call(PLUS, vec![product, Expression::reference(x1)]),
		},
	];
	binary(module, "*", nat(), Builtin::Mul, Some(mul));

	let int = Expression::DataCall { definition: INT, levels: Levels::empty(), arguments: Vec::new() };
	binary(module, "-", int, Builtin::Minus, None);
	binary(module, "div", nat(), Builtin::Div, None);
	binary(module, "mod", nat(), Builtin::Mod, None);
}

// \record Array (A : \Type) (len : Nat) (at : Fin len -> A)
fn install_array(module: &mut Module) {
	let mut array = ClassBuilder::new(module, "Array");
	let element_type = array.field("A", Expression::universe(Sort::std()), std_universe());
	let length = array.field("len", Expression::nat(), Sort::SET0);
	let this = array.this();
	let at_type = Expression::arrow(
		Sort::std(),
		Expression::fin(rc!(Expression::FieldCall { field: length, argument: this.clone() })),
		rc!(Expression::FieldCall { field: element_type, argument: this }),
	);
	array.field("at", at_type, Sort::std());
	array.build();
}

/// The record type of arrays of `len` elements of type `element_type`.
pub fn array_type(module: &Module, element_type: Rc<Expression>, sort: Sort, len: usize) -> Rc<Expression> {
	let mut implementations = IndexMap::new();
	implementations.insert(ARRAY_ELEMENT_TYPE, element_type);
	implementations.insert(ARRAY_LENGTH, Expression::integer(len));
	rc!(Expression::ClassCall(ClassCall::new(module, ARRAY, Levels::from_sort(sort), Binding::fresh(), implementations)))
}
