/*!
# Rip Watch: Console
*/

use ripwatch_core::{
	Registry,
	SessionCommand,
};
use std::path::PathBuf;



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Console Input.
pub(crate) enum Input {
	/// # List Active Drives.
	List,

	/// # Send a Command (to a Specific Device).
	Send(Option<PathBuf>, SessionCommand),
}

impl Input {
	/// # Parse.
	///
	/// Lines take the form `[device] command`, where the command is a row
	/// number or one of the keywords. Anything else is `None`.
	pub(crate) fn parse(line: &str) -> Option<Self> {
		let mut words = line.split_whitespace();
		let first = words.next()?;
		let (dev, cmd) =
			if first.starts_with('/') { (Some(PathBuf::from(first)), words.next()?) }
			else { (None, first) };
		if words.next().is_some() { return None; }

		let cmd = match cmd.to_ascii_lowercase().as_str() {
			"list" | "l" if dev.is_none() => return Some(Self::List),
			"hold" | "h" => SessionCommand::Hold,
			"ignore" | "i" | "skip" => SessionCommand::Ignore,
			"submitted" | "s" => SessionCommand::Submitted,
			"cancel" | "c" => SessionCommand::Cancel,
			n => SessionCommand::Select(n.parse().ok()?),
		};
		Some(Self::Send(dev, cmd))
	}
}



/// # Spawn Console.
///
/// Read commands from STDIN on a background thread and pass them along to
/// the registry's sessions. The thread lives until STDIN closes.
pub(crate) fn spawn(registry: Registry) {
	let res = std::thread::Builder::new()
		.name("ripwatch console".to_owned())
		.spawn(move || {
			for line in std::io::stdin().lines() {
				let Ok(line) = line else { break; };
				let line = line.trim();
				if line.is_empty() { continue; }

				match Input::parse(line) {
					Some(Input::List) => {
						let sessions = registry.sessions();
						if sessions.is_empty() { tracing::info!("No discs are being processed."); }
						for (dev, phase) in sessions {
							tracing::info!("{} - {phase}", dev.display());
						}
					},
					Some(Input::Send(dev, cmd)) =>
						if ! registry.send(dev.as_deref(), cmd) {
							tracing::warn!("No session is waiting for that.");
						},
					None => { tracing::warn!("Unrecognized command: {line}"); },
				}
			}
		});

	if let Err(e) = res {
		tracing::warn!("Console unavailable: {e}");
	}
}
