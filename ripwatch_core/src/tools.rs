/*!
# Rip Watch: External Programs
*/

use serde::{
	Deserialize,
	Serialize,
};
use std::{
	path::Path,
	process::Command,
};



/// # Device Placeholder.
///
/// Occurrences of this in an argument are replaced with the device path.
pub const DEVICE_PLACEHOLDER: &str = "{device}";



#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
/// # Tool Command.
///
/// A program and its leading arguments. Any argument containing
/// [`DEVICE_PLACEHOLDER`] has it swapped for the device path at launch.
pub struct ToolCommand {
	/// # Program.
	pub program: String,

	/// # Arguments.
	#[serde(default)]
	pub args: Vec<String>,
}

impl ToolCommand {
	#[must_use]
	/// # New.
	pub fn new<S: Into<String>>(program: S, args: &[&str]) -> Self {
		Self {
			program: program.into(),
			args: args.iter().map(|&s| s.to_owned()).collect(),
		}
	}

	#[must_use]
	/// # Shell Script.
	///
	/// Wrap a script in `sh -c`. Arguments appended later are visible to the
	/// script as `$1`, `$2`, etc.
	pub fn shell(script: &str) -> Self {
		Self::new("sh", &["-c", script, "sh"])
	}

	#[must_use]
	/// # Command.
	///
	/// Build a [`Command`] for the device, substituting placeholders.
	pub fn command(&self, device: &Path) -> Command {
		let dev = device.to_string_lossy();
		let mut cmd = Command::new(&self.program);
		for arg in &self.args {
			if arg.contains(DEVICE_PLACEHOLDER) {
				cmd.arg(arg.replace(DEVICE_PLACEHOLDER, &dev));
			}
			else { cmd.arg(arg); }
		}
		cmd
	}

	#[must_use]
	/// # Command (No Device).
	///
	/// Build a [`Command`] as-is, for programs like the encoder that never
	/// touch the drive.
	pub fn plain(&self) -> Command {
		let mut cmd = Command::new(&self.program);
		cmd.args(&self.args);
		cmd
	}
}



#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
/// # Toolchain.
///
/// Every external program the pipeline relies on.
pub struct Toolchain {
	/// # Table of Contents Reader.
	pub toc: ToolCommand,

	/// # ISRC Reader.
	pub isrc: ToolCommand,

	/// # Ripper.
	pub rip: ToolCommand,

	/// # Encoder.
	pub encode: ToolCommand,

	/// # Ejector.
	pub eject: ToolCommand,
}

impl Default for Toolchain {
	fn default() -> Self {
		Self {
			toc: ToolCommand::new("cd-discid", &["--musicbrainz", DEVICE_PLACEHOLDER]),
			isrc: ToolCommand::new("cd-info", &["--no-header", DEVICE_PLACEHOLDER]),
			rip: ToolCommand::new("cdparanoia", &[
				"--batch",
				"--output-wav",
				"--stderr-progress",
				"--force-progress-bar",
				"--force-cdrom-device",
				DEVICE_PLACEHOLDER,
			]),
			encode: ToolCommand::new("flac", &[]),
			eject: ToolCommand::new("eject", &[DEVICE_PLACEHOLDER]),
		}
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_placeholder() {
		let cmd = ToolCommand::new("eject", &["-v", "--dev={device}", "{device}"])
			.command(Path::new("/dev/sr1"));
		let args: Vec<_> = cmd.get_args()
			.map(|a| a.to_string_lossy().into_owned())
			.collect();
		assert_eq!(
			args,
			["-v", "--dev=/dev/sr1", "/dev/sr1"],
			"Device placeholders were not substituted.",
		);
	}

	#[test]
	fn t_partial_toolchain() {
		let tools: Toolchain = serde_json::from_str(r#"{"eject": {"program": "true"}}"#)
			.expect("Partial toolchain failed to parse.");
		assert_eq!(tools.eject.program, "true", "Eject override lost.");
		assert!(tools.eject.args.is_empty(), "Missing args should default empty.");
		assert_eq!(tools.rip, Toolchain::default().rip, "Rip should fall back to the default.");
	}
}
