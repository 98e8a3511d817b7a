use std::rc::Rc;

use num_bigint::BigUint;

use crate::{
	common::{Cmp, SourceNode},
	ir::{
		definition::DefId,
		expression::{ClassCall, Expression, Parameter},
		level::{Levels, Sort},
		prelude,
	},
	op::{
		elaborate::Elaborator,
		normalize::unfold_let,
		substitute::{unsolved_variables, Substitute as _, Substitution},
	},
	utility::rc,
};

impl Elaborator<'_> {
	/// Decides `left cmp right`, deferring what depends on unsolved inference variables.
	///
	/// Returns false only when the relation provably fails. Only unsatisfiable level constraints are reported here.
	pub fn compare(
		&mut self,
		cmp: Cmp,
		left: &Rc<Expression>,
		right: &Rc<Expression>,
		ty: Option<&Rc<Expression>>,
		source: SourceNode,
	) -> bool {
		if left == right {
			return true;
		}
		let left = self.whnf(left);
		let right = self.whnf(right);
		if left == right || left.is_error() || right.is_error() {
			return true;
		}
		if self.config.proof_irrelevance && ty.is_some_and(|ty| self.is_proposition(ty)) {
			return true;
		}

		let normalizer = self.normalizer();
		if normalizer.unsolved_variable(&left).is_some() || normalizer.unsolved_variable(&right).is_some() {
			return self.constrain(&left, &right, ty, cmp, source);
		}
		let (stuck_left, stuck_right) = (normalizer.stuck_expression(&left), normalizer.stuck_expression(&right));
		if [&stuck_left, &stuck_right].into_iter().flatten().any(|stuck| stuck.is_error()) {
			return true;
		}
		let stuck = stuck_left.is_some() || stuck_right.is_some();
		if stuck && std::mem::discriminant(left.as_ref()) != std::mem::discriminant(right.as_ref()) {
			return self.constrain(&left, &right, ty, cmp, source);
		}

		self.compare_whnf(cmp, &left, &right, source) || (stuck && self.constrain(&left, &right, ty, cmp, source))
	}

	fn compare_whnf(&mut self, cmp: Cmp, left: &Rc<Expression>, right: &Rc<Expression>, source: SourceNode) -> bool {
		use Expression as E;
		let module = self.module;
		if left.is_boxed(module) || right.is_boxed(module) {
			if !(left.is_boxed(module) && right.is_boxed(module)) {
				return false;
			}
			let (left, right) = (self.type_of(left), self.type_of(right));
			return self.compare(Cmp::Eq, &left, &right, None, source);
		}

		match (left.as_ref(), right.as_ref()) {
			(E::Universe(l), E::Universe(r)) => Sort::compare(l, r, cmp, self, source),
			(E::Pi { parameter: lp, codomain: lc, .. }, E::Pi { parameter: rp, codomain: rc, .. }) =>
				self.compare(Cmp::Eq, &lp.ty, &rp.ty, None, source) && {
					let rc = rc.substitute(&Substitution::single(rp.binding, lp.reference()));
					self.under(lp, |this| this.compare(cmp, lc, &rc, None, source))
				},
			(E::Sigma { parameters: l, .. }, E::Sigma { parameters: r, .. }) =>
				l.len() == r.len() && self.compare_telescopes(cmp, l, r, source),
			(E::Lambda { parameter, body }, _) => self.compare_lambda(parameter, body, right, source),
			(_, E::Lambda { parameter, body }) => self.compare_lambda(parameter, body, left, source),
			(E::Tuple { fields, .. }, _) => self.compare_tuple(fields, right, source),
			(_, E::Tuple { fields, .. }) => self.compare_tuple(fields, left, source),
			(E::New(l), E::New(r)) => self.compare_class_calls(Cmp::Eq, l, r, source),
			(E::New(class_call), _) => self.compare_new(class_call, right, source),
			(_, E::New(class_call)) => self.compare_new(class_call, left, source),
			(E::Path { function: l, .. }, E::Path { function: r, .. }) => self.compare(Cmp::Eq, l, r, None, source),
			(E::Path { function, .. }, _) => self.compare_path(function, right, source),
			(_, E::Path { function, .. }) => self.compare_path(function, left, source),
			(E::Let { clauses, body, .. }, _) => self.compare(cmp, &unfold_let(clauses, body), right, None, source),
			(_, E::Let { clauses, body, .. }) => self.compare(cmp, left, &unfold_let(clauses, body), None, source),
			(E::Integer(l), E::Integer(r)) => l == r,
			(E::Integer(n), E::ConCall { .. }) => self.compare_integer(n, right, source),
			(E::ConCall { .. }, E::Integer(n)) => self.compare_integer(n, left, source),
			(E::Reference(l), E::Reference(r)) => l == r,
			(E::App { .. }, E::App { .. }) => self.compare_spines(cmp, left, right, source),
			(E::Proj { tuple: l, field: i }, E::Proj { tuple: r, field: j }) =>
				i == j && self.compare(Cmp::Eq, l, r, None, source),
			(E::FieldCall { field: lf, argument: l }, E::FieldCall { field: rf, argument: r }) =>
				lf == rf && self.compare(Cmp::Eq, l, r, None, source),
			(
				E::FunCall { definition: ld, levels: ll, arguments: la },
				E::FunCall { definition: rd, levels: rl, arguments: ra },
			) => ld == rd && self.compare_call(Cmp::Eq, *ld, (ll, la), (rl, ra), source),
			(
				E::DataCall { definition: ld, levels: ll, arguments: la },
				E::DataCall { definition: rd, levels: rl, arguments: ra },
			) => match (*ld, *rd) {
				(prelude::FIN, prelude::FIN) if cmp != Cmp::Eq => self.compare_fin(cmp, left, right, &la[0], &ra[0], source),
				(prelude::FIN, prelude::NAT) => cmp == Cmp::Le,
				(prelude::NAT, prelude::FIN) => cmp == Cmp::Ge,
				_ => ld == rd && self.compare_call(cmp, *ld, (ll, la), (rl, ra), source),
			},
			(
				E::ConCall { definition: ld, levels: ll, data_arguments: lda, arguments: la },
				E::ConCall { definition: rd, levels: rl, data_arguments: rda, arguments: ra },
			) =>
				ld == rd
					&& lda.len() == rda.len()
					&& lda.iter().zip(rda).all(|(l, r)| self.compare(Cmp::Eq, l, r, None, source))
					&& self.compare_call(Cmp::Eq, *ld, (ll, la), (rl, ra), source),
			(E::ClassCall(l), E::ClassCall(r)) => self.compare_class_calls(cmp, l, r, source),
			(
				E::Case { arguments: la, clauses: lc, .. },
				E::Case { arguments: ra, clauses: rc, .. },
			) => lc == rc && la.len() == ra.len() && la.iter().zip(ra).all(|(l, r)| self.compare(Cmp::Eq, l, r, None, source)),
			(
				E::Array { element_type: lt, elements: l },
				E::Array { element_type: rt, elements: r },
			) =>
				l.len() == r.len()
					&& self.compare(Cmp::Eq, lt, rt, None, source)
					&& l.iter().zip(r).all(|(l, r)| self.compare(Cmp::Eq, l, r, None, source)),
			_ => false,
		}
	}

	fn compare_call(
		&mut self,
		cmp: Cmp,
		definition: DefId,
		(left_levels, left): (&Levels, &[Rc<Expression>]),
		(right_levels, right): (&Levels, &[Rc<Expression>]),
		source: SourceNode,
	) -> bool {
		let module = self.module;
		let header = &module[definition];
		if !Levels::compare(left_levels, right_levels, cmp, &header.variances(), self, source) || left.len() != right.len()
		{
			return false;
		}
		let levels = left_levels.substitution(header.level_parameters.as_deref());
		for (i, (l, r)) in left.iter().zip(right).enumerate() {
			let ty = header.parameters.get(i).filter(|_| self.config.proof_irrelevance).map(|parameter| {
				parameter.ty.substitute(&Substitution::telescope(&header.parameters[..i], left).with_levels(levels.clone()))
			});
			if !self.compare(Cmp::Eq, l, r, ty.as_ref(), source) {
				return false;
			}
		}
		true
	}

	/// `Fin m ≤ Fin n` holds when `m ≤ n`; it waits when a size is not yet known.
	fn compare_fin(
		&mut self,
		cmp: Cmp,
		left: &Rc<Expression>,
		right: &Rc<Expression>,
		left_size: &Rc<Expression>,
		right_size: &Rc<Expression>,
		source: SourceNode,
	) -> bool {
		let (l, r) = (self.whnf(left_size), self.whnf(right_size));
		match (l.as_natural(), r.as_natural()) {
			(Some(l), Some(r)) => if cmp == Cmp::Le { l <= r } else { l >= r },
			_ if !unsolved_variables(&self.metas, &l).is_empty() || !unsolved_variables(&self.metas, &r).is_empty() =>
				self.defer(left, right, None, cmp, source),
			_ => self.compare(Cmp::Eq, &l, &r, Some(&Expression::nat()), source),
		}
	}

	fn compare_integer(&mut self, n: &BigUint, constructor: &Rc<Expression>, source: SourceNode) -> bool {
		match constructor.as_ref() {
			Expression::ConCall { definition, .. } if *definition == prelude::ZERO => *n == BigUint::ZERO,
			Expression::ConCall { definition, arguments, .. } if *definition == prelude::SUC && *n > BigUint::ZERO =>
				match arguments.first() {
					Some(argument) => self.compare(Cmp::Eq, &Expression::integer(n - 1u32), argument, None, source),
					None => false,
				},
			_ => false,
		}
	}

	fn compare_spines(&mut self, cmp: Cmp, left: &Rc<Expression>, right: &Rc<Expression>, source: SourceNode) -> bool {
		let (left_head, left_arguments) = left.spine();
		let (right_head, right_arguments) = right.spine();
		if left_arguments.len() != right_arguments.len() {
			return false;
		}
		let normalizer = self.normalizer();
		if normalizer.unsolved_variable(left_head).is_some() || normalizer.unsolved_variable(right_head).is_some() {
			return self.defer(left, right, None, cmp, source);
		}
		self.compare(Cmp::Eq, left_head, right_head, None, source)
			&& left_arguments.iter().zip(&right_arguments).all(|(l, r)| self.compare(Cmp::Eq, l, r, None, source))
	}

	fn compare_telescopes(&mut self, cmp: Cmp, left: &[Parameter], right: &[Parameter], source: SourceNode) -> bool {
		let scope = self.context.len();
		let mut renaming = Substitution::new();
		let mut result = true;
		for (l, r) in left.iter().zip(right) {
			let ty = r.ty.substitute(&renaming);
			if !self.compare(cmp, &l.ty, &ty, None, source) {
				result = false;
				break;
			}
			renaming.add(r.binding, l.reference());
			self.context.push(l.binding, l.ty.clone());
		}
		self.context.truncate(scope);
		result
	}

	fn compare_lambda(
		&mut self,
		parameter: &Parameter,
		body: &Rc<Expression>,
		other: &Rc<Expression>,
		source: SourceNode,
	) -> bool {
		let applied = Expression::app(other.clone(), [parameter.reference()]);
		self.under(parameter, |this| this.compare(Cmp::Eq, body, &applied, None, source))
	}

	fn compare_tuple(&mut self, fields: &[Rc<Expression>], other: &Rc<Expression>, source: SourceNode) -> bool {
		fields
			.iter()
			.enumerate()
			.all(|(i, field)| self.compare(Cmp::Eq, field, &Expression::proj(other.clone(), i), None, source))
	}

	fn compare_new(&mut self, class_call: &ClassCall, other: &Rc<Expression>, source: SourceNode) -> bool {
		let module = self.module;
		let Some(class) = module.class(class_call.definition) else { return false };
		let instance = rc!(Expression::New(class_call.clone()));
		for &field in &class.fields {
			if module.field(field).is_some_and(|field| field.property) {
				continue;
			}
			let Some(implementation) = module.implementation(class_call, field, &instance) else { return false };
			let projected = Expression::field_call(module, field, other.clone());
			if !self.compare(Cmp::Eq, &implementation, &projected, None, source) {
				return false;
			}
		}
		true
	}

	fn compare_path(&mut self, function: &Rc<Expression>, other: &Rc<Expression>, source: SourceNode) -> bool {
		let ty = self.type_of(other);
		let ty = self.whnf(&ty);
		let Expression::DataCall { definition, levels, arguments } = ty.as_ref() else { return false };
		if *definition != prelude::PATH {
			return false;
		}
		let point = Parameter::new(None, Expression::interval());
		let mut arguments = arguments.clone();
		arguments.extend([other.clone(), point.reference()]);
		let at = rc!(Expression::FunCall { definition: prelude::AT, levels: levels.clone(), arguments });
		self.compare(Cmp::Eq, function, &Expression::lambda(point, at), None, source)
	}

	/// Record subtyping: `left ≤ right` when `left` extends `right` and agrees on every field `right` implements.
	pub fn compare_class_calls(&mut self, cmp: Cmp, left: &ClassCall, right: &ClassCall, source: SourceNode) -> bool {
		if cmp == Cmp::Ge {
			return self.compare_class_calls(Cmp::Le, right, left, source);
		}
		let module = self.module;
		let related = match cmp {
			Cmp::Eq => left.definition == right.definition,
			_ => module.is_subclass(left.definition, right.definition),
		};
		let Some(class) = module.class(right.definition).filter(|_| related) else { return false };

		let this = Expression::reference(left.this);
		let scope = self.context.len();
		self.context.push(left.this, Expression::class_call(left.clone()));
		let mut result = true;
		for &field in &class.fields {
			let (in_left, in_right) = (module.is_implemented(left, field), module.is_implemented(right, field));
			if cmp == Cmp::Eq && in_left != in_right {
				result = false;
				break;
			}
			if !in_right || module.field(field).is_some_and(|field| field.property) {
				continue;
			}
			let (Some(l), Some(r)) =
				(module.implementation(left, field, &this), module.implementation(right, field, &this))
			else {
				result = false;
				break;
			};
			if !self.compare(Cmp::Eq, &l, &r, None, source) {
				result = false;
				break;
			}
		}
		self.context.truncate(scope);

		result
			&& (left.definition != right.definition
				|| Levels::compare(
					&left.levels,
					&right.levels,
					cmp,
					&module[left.definition].variances(),
					self,
					source,
				))
	}
}
