use bpaf::{construct, long, short, Parser};
use strata::{
	config::Config,
	ir::definition::{DefId, DefinitionKind, Module},
	op::{elaborate::Elaborator, size::definition_size},
	report::TracingReporter,
};
use tracing_subscriber::EnvFilter;

struct Options {
	verbose: usize,
	round_limit: Option<usize>,
	keep_unsolved: bool,
	no_proof_irrelevance: bool,
	definition: Option<String>,
}

fn options() -> Options {
	let verbose = short('v').long("verbose").help("Log more; repeat for more detail").req_flag(()).many().map(|v| v.len());
	let round_limit =
		long("round-limit").help("Rounds of deferred solving before giving up").argument::<usize>("N").optional();
	let keep_unsolved = long("keep-unsolved").help("Do not report inference variables left unsolved").switch();
	let no_proof_irrelevance =
		long("no-proof-irrelevance").help("Compare proofs of propositions by their structure").switch();
	let definition = long("definition").help("Check only the named definition").argument::<String>("NAME").optional();
	construct!(Options { verbose, round_limit, keep_unsolved, no_proof_irrelevance, definition })
		.to_options()
		.descr("Re-checks the prelude definitions and prints their statuses")
		.run()
}

fn main() {
	let options = options();

	let level = match options.verbose {
		0 => "warn",
		1 => "info",
		2 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let defaults = Config::default();
	let config = Config {
		round_limit: options.round_limit.unwrap_or(defaults.round_limit),
		report_unsolved_variables: !options.keep_unsolved,
		proof_irrelevance: !options.no_proof_irrelevance,
	};

	let module = Module::new();
	let targets: Vec<DefId> = match &options.definition {
		Some(name) => match module.find(name) {
			Some(id) => vec![id],
			None => {
				eprintln!("no definition named `{name}`");
				std::process::exit(2);
			}
		},
		None => module
			.definitions()
			.filter(|(_, definition)| !matches!(definition.kind, DefinitionKind::Constructor(_) | DefinitionKind::Field(_)))
			.map(|(id, _)| id)
			.collect(),
	};

	let mut reporter = TracingReporter::new(&module);
	let mut failed = false;
	let mut elaborator = Elaborator::new(&module, &mut reporter).with_config(config);
	for id in targets {
		let definition = &module[id];
		let name = module.resolve(definition.name);
		match elaborator.check_definition(id) {
			Ok(status) => {
				println!("{name}: {status:?} (size {})", definition_size(&elaborator.metas, definition));
				failed |= status.has_errors();
			}
			Err(violation) => {
				tracing::error!(%violation, "cannot check {name}");
				failed = true;
			}
		}
	}
	drop(elaborator);

	if failed || reporter.errors > 0 {
		std::process::exit(1);
	}
}
