/*!
# Rip Watch: CLI
*/

use clap::Parser;
use ripwatch_core::{
	SessionConfig,
	Settings,
};
use std::{
	path::PathBuf,
	time::Duration,
};



#[derive(Debug, Parser)]
#[command(
	name = "ripwatch",
	version,
	about = "Watch optical drives for audio CDs and rip them to tagged FLAC.",
	after_help = "While running, type a row number to pick a release, \"hold\" to stop the \
countdown, \"ignore\" to skip a disc, \"submitted\" once a disc has been added to \
MusicBrainz, \"cancel\" to abort, or \"list\" to show active drives. Prefix a command \
with the device path (e.g. \"/dev/sr1 2\") when several drives are busy.",
)]
/// # Command Line Options.
pub(super) struct Cli {
	#[arg(short, long, value_name = "DIR")]
	/// Save albums under this directory (remembered for next time).
	pub(super) outdir: Option<PathBuf>,

	#[arg(short, long, value_name = "DEV")]
	/// Rip the disc in this drive once instead of watching for new discs.
	pub(super) dev: Option<PathBuf>,

	#[arg(long, value_name = "SECS")]
	/// Seconds to wait for a release choice before using the first (this run
	/// only).
	pub(super) countdown: Option<u64>,

	#[arg(short, long, value_name = "FILE")]
	/// Read settings from this file instead of the default.
	pub(super) config: Option<PathBuf>,

	#[arg(short, long)]
	/// Log debug messages.
	pub(super) verbose: bool,
}



impl Cli {
	/// # Session Configuration.
	///
	/// The saved settings plus any one-off overrides. The countdown flag only
	/// lands here, never in the settings file.
	pub(super) fn session_config(&self, settings: &Settings) -> SessionConfig {
		let mut out = settings.session_config();
		if let Some(secs) = self.countdown { out.countdown = Duration::from_secs(secs); }
		out
	}
}



/// # Parse Options.
///
/// Invalid arguments (and --help/--version) print and exit here.
pub(super) fn parse() -> Cli { Cli::parse() }



#[cfg(test)]
mod test {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn t_definition() { Cli::command().debug_assert(); }

	#[test]
	fn t_parse() {
		let cli = Cli::try_parse_from(["ripwatch", "-d", "/dev/sr1", "--countdown", "5", "-v"])
			.expect("Arguments failed to parse.");
		assert_eq!(cli.dev, Some(PathBuf::from("/dev/sr1")), "Wrong device.");
		assert_eq!(cli.countdown, Some(5), "Wrong countdown.");
		assert!(cli.verbose, "Verbose not set.");
		assert!(cli.outdir.is_none(), "Output directory should be unset.");

		assert!(
			Cli::try_parse_from(["ripwatch", "--countdown", "soon"]).is_err(),
			"Non-numeric countdowns should be rejected.",
		);
	}

	#[test]
	fn t_countdown_override() {
		let settings = Settings::default();
		let cli = Cli::try_parse_from(["ripwatch", "--countdown", "5"])
			.expect("Arguments failed to parse.");
		let config = cli.session_config(&settings);
		assert_eq!(config.countdown, Duration::from_secs(5), "Override was ignored.");
		assert_eq!(settings.countdown_secs, 30, "The override should not touch the settings.");

		let cli = Cli::try_parse_from(["ripwatch"]).expect("Arguments failed to parse.");
		assert_eq!(
			cli.session_config(&settings).countdown,
			Duration::from_secs(30),
			"The saved countdown should apply by default.",
		);
	}
}
