#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Config {
	/// Rounds of deferred solving before the remaining equations are reported.
	pub round_limit: usize,
	/// Report inference variables left unsolved once checking is finished.
	pub report_unsolved_variables: bool,
	/// Consider any two terms of a proposition equal.
	pub proof_irrelevance: bool,
}

impl Default for Config {
	fn default() -> Self { Self { round_limit: 64, report_unsolved_variables: true, proof_irrelevance: true } }
}
