use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
	common::{Binding, Cmp, SourceNode},
	ir::{
		definition::DefId,
		equation::Equation,
		expression::{ClassCall, Expression},
		level::Levels,
		meta::InferenceVariable,
	},
	op::{elaborate::Elaborator, normalize::Normalizer, substitute::zonk},
	report::ElaborationErrorKind,
};

/// Record bounds of the variables in the deferred equations, for one direction.
#[derive(Default)]
struct BoundGraph {
	/// Equations `bound ≤ ?v` (or `?v ≤ bound`) by variable, with the class call bound.
	direct: FxHashMap<InferenceVariable, Vec<(usize, ClassCall)>>,
	/// `?u` in `edges[?v]` passes its bounds on to `?v`.
	edges: FxHashMap<InferenceVariable, Vec<InferenceVariable>>,
}

impl BoundGraph {
	fn closure(&self, variable: InferenceVariable) -> Vec<(usize, ClassCall)> {
		let mut visited = FxHashSet::default();
		let mut stack = vec![variable];
		let mut bounds = Vec::new();
		while let Some(current) = stack.pop() {
			if !visited.insert(current) {
				continue;
			}
			bounds.extend(self.direct.get(&current).into_iter().flatten().cloned());
			stack.extend(self.edges.get(&current).into_iter().flatten().copied());
		}
		bounds.sort_by_key(|(index, _)| *index);
		bounds.dedup_by_key(|(index, _)| *index);
		bounds
	}
}

impl Elaborator<'_> {
	pub(crate) fn solve_class_bounds(&mut self) -> bool {
		self.compare_class_call_equations() || self.solve_bounds(Cmp::Le) || self.solve_bounds(Cmp::Ge)
	}

	fn compare_class_call_equations(&mut self) -> bool {
		let normalizer = Normalizer::new(self.module, &self.metas);
		let is_class_call = |expression: &Rc<Expression>| matches!(normalizer.whnf(expression).as_ref(), Expression::ClassCall(_));
		let mut compared = Vec::new();
		self.equations.retain(|equation| {
			let keep = !(is_class_call(&equation.left) && is_class_call(&equation.right));
			if !keep {
				compared.push(equation.clone());
			}
			keep
		});
		if compared.is_empty() {
			return false;
		}

		let failed: Vec<_> = compared
			.into_iter()
			.filter(|equation| {
				!self.compare(equation.cmp, &equation.left, &equation.right, equation.ty.as_ref(), equation.source)
			})
			.collect();
		self.report_bounds(failed);
		true
	}

	fn bound_graph(&self, direction: Cmp) -> BoundGraph {
		let normalizer = self.normalizer();
		let mut graph = BoundGraph::default();
		for (index, equation) in self.equations.iter().enumerate() {
			let (left, right) = (normalizer.whnf(&equation.left), normalizer.whnf(&equation.right));
			match (normalizer.unsolved_variable(&left), normalizer.unsolved_variable(&right)) {
				(Some(l), Some(r)) => match equation.cmp {
					Cmp::Eq => {
						graph.edges.entry(l).or_default().push(r);
						graph.edges.entry(r).or_default().push(l);
					}
					cmp => {
						let (lower, upper) = if cmp == Cmp::Le { (l, r) } else { (r, l) };
						match direction {
							Cmp::Le => graph.edges.entry(upper).or_default().push(lower),
							_ => graph.edges.entry(lower).or_default().push(upper),
						}
					}
				},
				(left_variable, right_variable) => {
					let (variable, other, relation) = match (left_variable, right_variable) {
						(_, Some(variable)) => (variable, &left, equation.cmp),
						(Some(variable), _) => (variable, &right, equation.cmp.flip()),
						(None, None) => continue,
					};
					let Expression::ClassCall(class_call) = other.as_ref() else { continue };
					if relation == direction && self.metas[variable].solvable_from_equations() {
						graph.direct.entry(variable).or_default().push((index, class_call.clone()));
					}
				}
			}
		}
		graph
	}

	/// Solves every variable with class call bounds in `direction`: `Le` for lower bounds, `Ge` for upper bounds.
	fn solve_bounds(&mut self, direction: Cmp) -> bool {
		let graph = self.bound_graph(direction);
		let mut candidates: Vec<_> =
			graph.direct.keys().chain(graph.edges.keys()).copied().filter(|&variable| !self.metas.is_solved(variable)).collect();
		candidates.sort();
		candidates.dedup();
		let bounded: Vec<_> = candidates
			.into_iter()
			.filter(|&variable| self.metas[variable].solvable_from_equations())
			.map(|variable| (variable, graph.closure(variable)))
			.filter(|(_, bounds)| !bounds.is_empty())
			.collect();
		if bounded.is_empty() {
			return false;
		}

		let consumed: FxHashSet<usize> = graph.direct.values().flatten().map(|(index, _)| *index).collect();
		let mut removed = FxHashMap::default();
		let mut index = 0;
		self.equations.retain(|equation| {
			let keep = !consumed.contains(&index);
			if !keep {
				removed.insert(index, equation.clone());
			}
			index += 1;
			keep
		});

		let mut reported = FxHashSet::default();
		for (variable, bounds) in bounded {
			if self.metas.is_solved(variable) {
				continue;
			}
			let source = removed.get(&bounds[0].0).map_or(self.metas[variable].source, |equation| equation.source);
			let class_calls: Vec<_> = bounds.iter().map(|(_, class_call)| class_call.clone()).collect();
			let solution = match (direction, &class_calls[..]) {
				(_, [single]) => Some(single.clone()),
				(Cmp::Le, _) => self.least_upper_bound(&class_calls, source),
				_ => self.greatest_lower_bound(&class_calls, source),
			};
			tracing::debug!(?variable, ?direction, bounds = bounds.len(), solved = solution.is_some(), "class call bounds");
			match solution {
				Some(solution) => {
					self.solve_variable(variable, Expression::class_call(solution), source);
				}
				None => {
					let equations = bounds.iter().filter_map(|(index, _)| removed.get(index).cloned()).collect();
					reported.extend(bounds.iter().map(|(index, _)| *index));
					self.report_bounds(equations);
					self.write_solution(variable, Expression::error());
				}
			}
		}

		let mut removed: Vec<_> = removed.into_iter().filter(|(index, _)| !reported.contains(index)).collect();
		removed.sort_by_key(|(index, _)| *index);
		for (_, equation) in removed {
			self.add_equation(&equation.left, &equation.right, equation.ty.as_ref(), equation.cmp, equation.source);
		}
		true
	}

	fn common_class(&self, class_calls: &[ClassCall]) -> Option<DefId> {
		let module = self.module;
		class_calls
			.iter()
			.map(|class_call| class_call.definition)
			.find(|&candidate| class_calls.iter().all(|class_call| module.is_subclass(class_call.definition, candidate)))
	}

	/// A class call above every bound, keeping only the implementations all bounds agree on.
	fn least_upper_bound(&mut self, class_calls: &[ClassCall], source: SourceNode) -> Option<ClassCall> {
		let module = self.module;
		let definition = self.common_class(class_calls)?;
		let class = module.class(definition)?;
		let levels = self.fresh_levels(definition, source);
		let variances = module[definition].variances();
		for class_call in class_calls.iter().filter(|class_call| class_call.definition == definition) {
			if !Levels::compare(&class_call.levels, &levels, Cmp::Le, &variances, self, source) {
				return None;
			}
		}

		let this = Binding::fresh();
		let instance = Expression::reference(this);
		let start = class_calls
			.iter()
			.min_by_key(|class_call| class.fields.iter().filter(|&&field| module.is_implemented(class_call, field)).count())?;
		let scope = self.context.len();
		self.context.push(this, Expression::class_call(ClassCall::empty(module, definition, levels.clone())));
		let mut implementations = IndexMap::new();
		for &field in &class.fields {
			if class.implemented.contains_key(&field) {
				continue;
			}
			let Some(implementation) = module.implementation(start, field, &instance) else { continue };
			let property = module.field(field).is_some_and(|field| field.property);
			let agreed = class_calls.iter().all(|class_call| match module.implementation(class_call, field, &instance) {
				Some(other) => property || self.compare(Cmp::Eq, &implementation, &other, None, source),
				None => false,
			});
			if agreed {
				implementations.insert(field, implementation);
			}
		}
		self.context.truncate(scope);
		Some(ClassCall::new(module, definition, levels, this, implementations))
	}

	/// A class call below every bound; the bounds must be calls of one class implementing the same fields equally.
	fn greatest_lower_bound(&mut self, class_calls: &[ClassCall], source: SourceNode) -> Option<ClassCall> {
		let module = self.module;
		let (first, rest) = class_calls.split_first()?;
		if rest.iter().any(|class_call| class_call.definition != first.definition) {
			return None;
		}
		let class = module.class(first.definition)?;
		let this = Binding::fresh();
		let instance = Expression::reference(this);
		let levels = self.fresh_levels(first.definition, source);
		let scope = self.context.len();
		self.context.push(this, Expression::class_call(ClassCall::empty(module, first.definition, levels.clone())));
		let mut implementations = IndexMap::new();
		let mut agreed = true;
		for &field in &class.fields {
			if class.implemented.contains_key(&field) || module.field(field).is_some_and(|field| field.property) {
				continue;
			}
			let implemented: Vec<_> =
				class_calls.iter().map(|class_call| module.implementation(class_call, field, &instance)).collect();
			match &implemented[..] {
				[Some(implementation), others @ ..] if others.iter().all(Option::is_some) => {
					for other in others.iter().flatten() {
						agreed &= self.compare(Cmp::Eq, implementation, other, None, source);
					}
					implementations.insert(field, implementation.clone());
				}
				_ if implemented.iter().all(Option::is_none) => {}
				_ => agreed = false,
			}
			if !agreed {
				break;
			}
		}
		self.context.truncate(scope);
		if !agreed {
			return None;
		}

		let variances = module[first.definition].variances();
		for class_call in class_calls {
			if !Levels::compare(&levels, &class_call.levels, Cmp::Le, &variances, self, source) {
				return None;
			}
		}
		Some(ClassCall::new(module, first.definition, levels, this, implementations))
	}

	fn report_bounds(&mut self, equations: Vec<Equation>) {
		let Some(source) = equations.first().map(|equation| equation.source) else { return };
		let equations = equations
			.into_iter()
			.map(|equation| Equation {
				left: zonk(&self.metas, &equation.left),
				right: zonk(&self.metas, &equation.right),
				..equation
			})
			.collect();
		self.report(ElaborationErrorKind::UnsolvedEquations { equations }, source);
	}
}
