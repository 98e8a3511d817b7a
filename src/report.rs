use std::{fmt::Write as _, rc::Rc};

use thiserror::Error;

use crate::{
	common::{Binding, Cmp, SourceNode},
	ir::{
		definition::{DefId, Module},
		equation::{Equation, LevelEquation},
		expression::Expression,
		meta::InferenceVariable,
	},
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Severity {
	Info,
	Warning,
	Goal,
	Error,
}

/// Why an inference variable could not be given a solution.
#[derive(Clone, PartialEq, Debug)]
pub enum InferenceFailure {
	Unsolved,
	Occurs { candidate: Rc<Expression> },
	OutOfScope { candidate: Rc<Expression>, bindings: Vec<Binding> },
	IllTyped { candidate: Rc<Expression>, expected: Rc<Expression>, actual: Rc<Expression> },
	NotProp { candidate: Rc<Expression> },
	NoInstance { class: DefId, classifier: Rc<Expression> },
}

#[derive(Clone, PartialEq, Debug, Error)]
pub enum ElaborationErrorKind {
	#[error("type mismatch")]
	Mismatch { left: Rc<Expression>, right: Rc<Expression>, cmp: Cmp },
	#[error("cannot infer {variable:?}")]
	InferenceFailure { variable: InferenceVariable, reason: InferenceFailure },
	#[error("level equations cannot be satisfied")]
	LevelUnsolvable { equations: Vec<LevelEquation> },
	#[error("{} equation(s) could not be solved", equations.len())]
	UnsolvedEquations { equations: Vec<Equation> },
	#[error("goal")]
	Goal { expected: Option<Rc<Expression>> },
}

impl ElaborationErrorKind {
	pub fn severity(&self) -> Severity {
		match self {
			Self::Goal { .. } => Severity::Goal,
			_ => Severity::Error,
		}
	}
}

#[derive(Clone, PartialEq, Debug)]
pub struct Diagnostic {
	pub severity: Severity,
	pub source: SourceNode,
	pub kind: ElaborationErrorKind,
}

impl Diagnostic {
	pub fn new(kind: ElaborationErrorKind, source: SourceNode) -> Self { Self { severity: kind.severity(), source, kind } }
}

/// Receives recoverable errors. Reporting never interrupts checking.
pub trait ErrorReporter {
	fn report(&mut self, diagnostic: Diagnostic);
}

impl ErrorReporter for Vec<Diagnostic> {
	fn report(&mut self, diagnostic: Diagnostic) { self.push(diagnostic) }
}

pub struct TracingReporter<'m> {
	module: &'m Module,
	pub errors: usize,
}

impl<'m> TracingReporter<'m> {
	pub fn new(module: &'m Module) -> Self { Self { module, errors: 0 } }
}

impl ErrorReporter for TracingReporter<'_> {
	fn report(&mut self, diagnostic: Diagnostic) {
		let Diagnostic { severity, source, kind } = &diagnostic;
		let message = describe(self.module, kind);
		match severity {
			Severity::Error => {
				self.errors += 1;
				tracing::error!(start = source.start, end = source.end, "{message}")
			}
			Severity::Goal | Severity::Warning => tracing::warn!(start = source.start, end = source.end, "{message}"),
			Severity::Info => tracing::info!(start = source.start, end = source.end, "{message}"),
		}
	}
}

/// Broken assumptions about the input of a checking operation. Checking stops immediately.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum InvariantViolation {
	#[error("definition {0:?} does not exist")]
	UnknownDefinition(DefId),
	#[error("definition {definition:?} depends on {dependency:?}, which has not been checked")]
	UncheckedDependency { definition: Option<DefId>, dependency: DefId },
	#[error("definition {0:?} is already being checked")]
	AlreadyChecking(DefId),
	#[error("reference to unbound variable {0:?}")]
	UnboundReference(Binding),
	#[error("{definition:?} expects {expected} argument(s) but was given {found}")]
	Arity { definition: DefId, expected: usize, found: usize },
	#[error("a clause has {found} pattern(s) for {expected} matched argument(s)")]
	PatternCount { expected: usize, found: usize },
	#[error("{0:?} is not a constructor")]
	NotAConstructor(DefId),
}

pub fn describe(module: &Module, kind: &ElaborationErrorKind) -> String {
	let name = |id: DefId| module.get(id).map_or("?", |definition| module.resolve(definition.name));
	let label = match kind.severity() {
		Severity::Info => "info",
		Severity::Warning => "warning",
		Severity::Goal => "goal",
		Severity::Error => "error",
	};
	let mut message = format!("{label}: {kind}");
	// Writing to a `String` cannot fail.
	let _ = match kind {
		ElaborationErrorKind::Mismatch { left, right, cmp } =>
			write!(message, "\nexpected: {right:?}\nfound: {left:?}\nrelation: {cmp:?}"),
		ElaborationErrorKind::InferenceFailure { reason, .. } => match reason {
			InferenceFailure::Unsolved => write!(message, "\nno constraint determines it"),
			InferenceFailure::Occurs { candidate } => write!(message, "\nit occurs in {candidate:?}"),
			InferenceFailure::OutOfScope { bindings, .. } =>
				write!(message, "\nthe solution mentions bindings out of scope: {bindings:?}"),
			InferenceFailure::IllTyped { expected, actual, .. } =>
				write!(message, "\nexpected type: {expected:?}\nactual type: {actual:?}"),
			InferenceFailure::NotProp { candidate } => write!(message, "\n{candidate:?} is not a proposition"),
			InferenceFailure::NoInstance { class, classifier } =>
				write!(message, "\nno instance of {} for {classifier:?}", name(*class)),
		},
		ElaborationErrorKind::LevelUnsolvable { equations } =>
			equations.iter().try_for_each(|equation| write!(message, "\n{equation:?}")),
		ElaborationErrorKind::UnsolvedEquations { equations } => equations.iter().try_for_each(|equation| {
			write!(message, "\n{:?} {:?} {:?}", equation.left, equation.cmp, equation.right)
		}),
		ElaborationErrorKind::Goal { expected: Some(expected) } => write!(message, "\nexpected type: {expected:?}"),
		ElaborationErrorKind::Goal { expected: None } => Ok(()),
	};
	message
}

/// Renders a diagnostic against the source text it was reported for, underlining its range.
pub fn render(source: &str, module: &Module, diagnostic: &Diagnostic) -> String {
	const TAB_WIDTH: usize = 3;
	let tab_replacement = " ".repeat(TAB_WIDTH);

	let range = (diagnostic.source.start.min(source.len()), diagnostic.source.end.max(diagnostic.source.start));
	let mut lines = source.split_inclusive('\n');
	let mut line_number: usize = 0;
	let mut bytes_left = range.0;
	let (line, bytes_left, width) = loop {
		if let Some(line) = lines.next() {
			line_number += 1;
			if line.len() <= bytes_left {
				bytes_left -= line.len();
			} else {
				break (line, bytes_left, (range.1 - range.0).max(1));
			}
		} else {
			let (i, last) = source.split('\n').enumerate().last().unwrap_or((0, ""));
			line_number = i + 1;
			break (last, last.len(), 1);
		}
	};

	// Offsets inside a multi-byte character point at its start.
	let bytes_left = (0..=bytes_left).rev().find(|&i| line.is_char_boundary(i)).unwrap_or(0);
	let visual_line = line.replace('\t', &tab_replacement).trim_end().to_owned();
	let visual_offset: usize =
		unicode_width::UnicodeWidthStr::width(line[..bytes_left].replace('\t', &tab_replacement).as_str());

	let displayed_line_number = line_number.to_string();
	let dummy_line_number = " ".repeat(displayed_line_number.len());
	let mut rendered = format!("[{}:{}] {}\n", line_number, bytes_left, describe(module, &diagnostic.kind));
	let _ = writeln!(rendered, "{} |", dummy_line_number);
	let _ = writeln!(rendered, "{} | {}", displayed_line_number, visual_line);
	let _ = write!(rendered, "{} | {}{}", dummy_line_number, " ".repeat(visual_offset), "^".repeat(width));
	rendered
}
