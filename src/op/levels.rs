use rustc_hash::FxHashMap;

use crate::{
	common::SourceNode,
	ir::{
		equation::LevelEquation,
		level::{Level, LevelConstraints, LevelMeta, LevelVariable},
	},
	op::elaborate::Elaborator,
	report::ElaborationErrorKind,
};

impl LevelConstraints for Elaborator<'_> {
	fn add_level_equation(&mut self, lower: Level, upper: Level, source: SourceNode) -> bool {
		if upper.is_infinity() {
			return true;
		}
		if lower.is_infinity() {
			return match upper.var {
				Some(var @ LevelVariable::Inference(_)) => {
					self.level_equations.push(LevelEquation::Infinity { var, source });
					true
				}
				_ => self.reject(lower, upper, source),
			};
		}
		if let (Some(var), Some(max_constant)) = (lower.var, lower.max_constant) {
			return self.add_level_equation(Level::closed(max_constant), upper, source)
				&& self.add_level_equation(Level::new(Some(var), lower.constant, None), upper, source);
		}

		let (k, c, m) = (lower.constant, upper.constant, upper.max_constant);
		let equation = match (lower.var, upper.var) {
			(None, None) => return k <= c || self.reject(lower, upper, source),
			(None, Some(b)) => {
				if k <= c || m.is_some_and(|m| k <= m) {
					return true;
				}
				if !b.is_inference() {
					return self.reject(lower, upper, source);
				}
				LevelEquation::Bound { lower: None, upper: Some(b), constant: c - k, max_constant: m.map(|m| m - k), source }
			}
			(Some(a), None) => {
				if !a.is_inference() || c < k {
					return self.reject(lower, upper, source);
				}
				LevelEquation::Bound { lower: Some(a), upper: None, constant: c - k, max_constant: None, source }
			}
			(Some(a), Some(b)) if a == b => {
				if k <= c {
					return true;
				}
				// Only the maximum can keep a variable above a strictly smaller shift of itself.
				match m {
					Some(m) if a.is_inference() && m >= k =>
						LevelEquation::Bound { lower: Some(a), upper: None, constant: m - k, max_constant: None, source },
					_ => return self.reject(lower, upper, source),
				}
			}
			(Some(a), Some(b)) if !a.is_inference() && !b.is_inference() =>
				return (a.precedes(b) && k <= c) || self.reject(lower, upper, source),
			(Some(a), Some(b)) => LevelEquation::Bound {
				lower: Some(a),
				upper: Some(b),
				constant: c - k,
				max_constant: m.map(|m| m - k),
				source,
			},
		};
		tracing::trace!(?equation, "level equation");
		self.level_equations.push(equation);
		true
	}
}

impl Elaborator<'_> {
	fn reject(&mut self, lower: Level, upper: Level, source: SourceNode) -> bool {
		let equation = LevelEquation::Bound {
			lower: lower.var,
			upper: upper.var,
			constant: upper.constant.saturating_sub(lower.constant),
			max_constant: upper.max_constant.map(|m| m.saturating_sub(lower.constant)),
			source,
		};
		self.level_failures += 1;
		self.report(ElaborationErrorKind::LevelUnsolvable { equations: vec![equation] }, source);
		false
	}

	/// Gives every level variable its least solution, reporting the equations that cannot hold.
	pub(crate) fn solve_levels(&mut self) {
		let metas: Vec<LevelMeta> = self.metas.level_metas().filter(|&meta| self.metas.level_solution(meta).is_none()).collect();
		if metas.is_empty() {
			return;
		}
		let mut values: FxHashMap<LevelMeta, Level> = metas.iter().map(|&meta| (meta, Level::ZERO)).collect();
		let value = |values: &FxHashMap<LevelMeta, Level>, var: Option<LevelVariable>| match var {
			None => Level::ZERO,
			Some(LevelVariable::Inference(meta)) => values.get(&meta).copied().unwrap_or(Level::ZERO),
			Some(var) => Level::var(var),
		};

		let mut failed = Vec::new();
		for equation in &self.level_equations {
			if let LevelEquation::Infinity { var: LevelVariable::Inference(meta), .. } = equation {
				values.insert(*meta, Level::INFINITY);
			}
		}

		let mut settled = false;
		for _ in 0..=metas.len() {
			let mut changed = false;
			for equation in &self.level_equations {
				let &LevelEquation::Bound {
					lower,
					upper: Some(LevelVariable::Inference(upper)),
					constant,
					max_constant,
					..
				} = equation
				else {
					continue;
				};
				let bound = value(&values, lower);
				if bound.is_closed() && max_constant.is_some_and(|m| bound.constant <= m) {
					continue;
				}
				let current = values.get(&upper).copied().unwrap_or(Level::ZERO);
				let candidate = bound.add(-constant).max_closed(0);
				match current.max(candidate) {
					Some(next) if next != current => {
						values.insert(upper, next);
						changed = true;
					}
					Some(_) => {}
					None if !failed.contains(equation) => failed.push(*equation),
					None => {}
				}
			}
			if !changed {
				settled = true;
				break;
			}
		}

		if settled {
			for equation in &self.level_equations {
				let &LevelEquation::Bound { lower, upper, constant, max_constant, .. } = equation else { continue };
				let bound = value(&values, upper).add(constant);
				let bound = max_constant.map_or(bound, |m| bound.max_closed(m));
				if !value(&values, lower).leq(&bound) && !failed.contains(equation) {
					failed.push(*equation);
				}
			}
		} else {
			tracing::debug!("level equations contain a positive cycle");
			failed.extend(self.level_equations.iter().copied());
		}

		for meta in metas {
			let solution = values.get(&meta).copied().unwrap_or(Level::ZERO);
			tracing::trace!(?meta, ?solution, "solved level variable");
			self.metas.solve_level(meta, solution);
		}
		self.level_equations.clear();
		if let Some(source) = failed.first().map(LevelEquation::source) {
			self.report(ElaborationErrorKind::LevelUnsolvable { equations: failed }, source);
		}
	}
}
