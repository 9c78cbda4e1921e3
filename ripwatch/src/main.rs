/*!
# Rip Watch!
*/

#![forbid(unsafe_code)]

#![deny(
	clippy::allow_attributes_without_reason,
	clippy::correctness,
	unreachable_pub,
)]

#![warn(
	clippy::complexity,
	clippy::nursery,
	clippy::pedantic,
	clippy::perf,
	clippy::style,

	clippy::allow_attributes,
	clippy::clone_on_ref_ptr,
	clippy::create_dir,
	clippy::filetype_is_file,
	clippy::format_push_string,
	clippy::get_unwrap,
	clippy::impl_trait_in_params,
	clippy::lossy_float_literal,
	clippy::missing_assert_message,
	clippy::missing_docs_in_private_items,
	clippy::needless_raw_strings,
	clippy::panic_in_result_fn,
	clippy::pub_without_shorthand,
	clippy::rest_pat_in_fully_bound_structs,
	clippy::semicolon_inside_block,
	clippy::str_to_string,
	clippy::string_to_string,
	clippy::todo,
	clippy::undocumented_unsafe_blocks,
	clippy::unneeded_field_pattern,
	clippy::unseparated_literal_suffix,
	clippy::unwrap_in_result,

	macro_use_extern_crate,
	missing_copy_implementations,
	missing_docs,
	non_ascii_idents,
	trivial_casts,
	trivial_numeric_casts,
	unused_crate_dependencies,
	unused_extern_crates,
	unused_import_braces,
)]

#![expect(clippy::redundant_pub_crate, reason = "Unresolvable.")]



mod cli;
mod console;
mod term;

use ripwatch_core::{
	DiscIdReader,
	KillSwitch,
	MusicBrainz,
	Registry,
	RipWatchError,
	SessionContext,
	Settings,
	UdevadmMonitor,
	Watchdog,
};
use std::{
	process::ExitCode,
	sync::Arc,
	time::Duration,
};
use term::TermSink;
use tracing_subscriber::EnvFilter;



/// # Manual-Mode Poll Interval.
const MANUAL_POLL: Duration = Duration::from_millis(250);



/// # Main.
///
/// This lets us bubble up startup errors so they can be logged.
fn main() -> ExitCode {
	match main__() {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!("{e}");
			ExitCode::FAILURE
		},
	}
}

#[inline]
/// # Actual Main.
///
/// This does all the stuff.
fn main__() -> Result<(), RipWatchError> {
	let cli = cli::parse();
	init_logging(cli.verbose);

	// Settings, with any overrides.
	let path = cli.config.clone()
		.or_else(Settings::default_path)
		.ok_or_else(|| RipWatchError::Settings("unable to locate a config directory".to_owned()))?;
	let mut settings = Settings::load(&path)?;
	if let Some(dir) = cli.outdir.clone() {
		settings.outdir = dir;
		settings.save(&path)?;
	}
	tracing::debug!("Saving albums to {}.", settings.outdir.display());

	// CTRL+C trips the kill switch; everything else winds down from there.
	let killed = KillSwitch::new();
	let k2 = killed.clone();
	ctrlc::set_handler(move || { k2.kill(); })
		.map_err(|_| RipWatchError::Bug("unable to intercept CTRL+C"))?;

	let ctx = SessionContext {
		reader: Arc::new(DiscIdReader::new(settings.tools.clone())),
		service: Arc::new(MusicBrainz),
		sink: Arc::new(TermSink::default()),
		config: Arc::new(cli.session_config(&settings)),
	};

	let res = match cli.dev {
		Some(dev) => {
			rip_once(dev, &ctx, &killed);
			Ok(())
		},
		None => {
			let dog = Watchdog::new(UdevadmMonitor::new()?, ctx, killed);
			console::spawn(dog.registry());
			dog.run()
		},
	};

	// Write the settings back on the way out.
	settings.save(&path)?;
	res
}

/// # Rip Once.
///
/// Run a single session for the device, bypassing device events.
fn rip_once(dev: std::path::PathBuf, ctx: &SessionContext, killed: &KillSwitch) {
	let registry = Registry::default();
	console::spawn(registry.clone());
	registry.start(dev, ctx);

	while ! registry.is_empty() {
		if killed.killed() {
			registry.shutdown();
			break;
		}
		registry.reap();
		std::thread::sleep(MANUAL_POLL);
	}
}

/// # Initialize Logging.
///
/// `RUST_LOG` is respected unless -v/--verbose forces debug output.
fn init_logging(verbose: bool) {
	let filter =
		if verbose { EnvFilter::new("debug") }
		else { EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")) };

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_writer(std::io::stderr)
		.init();
}
