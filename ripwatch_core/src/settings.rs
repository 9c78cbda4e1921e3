/*!
# Rip Watch: Settings
*/

use crate::{
	RipWatchError,
	SessionConfig,
	Toolchain,
};
use serde::{
	Deserialize,
	Serialize,
};
use std::{
	io::{
		ErrorKind,
		Write,
	},
	path::{
		Path,
		PathBuf,
	},
	time::Duration,
};



#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
/// # Settings.
///
/// The persisted user preferences. Every field has a default, so partial
/// (or older) files load fine.
pub struct Settings {
	/// # Output Root.
	pub outdir: PathBuf,

	/// # Selection Countdown (Seconds).
	pub countdown_secs: u64,

	/// # Submission Timeout (Seconds).
	pub submission_timeout_secs: u64,

	/// # External Programs.
	pub tools: Toolchain,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			outdir: dirs::home_dir().map_or_else(|| PathBuf::from("Music"), |d| d.join("Music")),
			countdown_secs: 30,
			submission_timeout_secs: 600,
			tools: Toolchain::default(),
		}
	}
}

impl Settings {
	#[must_use]
	/// # Default Path.
	///
	/// This is `settings.json` under a `ripwatch` folder in the user's config
	/// directory, if there is one.
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|d| d.join("ripwatch").join("settings.json"))
	}

	/// # Load.
	///
	/// Read the settings from `src`, creating the file with defaults if it
	/// doesn't exist yet.
	///
	/// ## Errors
	///
	/// This will return an error if the file exists but cannot be read or
	/// parsed, or if a missing file cannot be created.
	pub fn load(src: &Path) -> Result<Self, RipWatchError> {
		match std::fs::read(src) {
			Ok(raw) => serde_json::from_slice(&raw)
				.map_err(|e| RipWatchError::Settings(format!("{}: {e}", src.display()))),
			Err(e) if e.kind() == ErrorKind::NotFound => {
				let out = Self::default();
				out.save(src)?;
				tracing::info!("Created {}.", src.display());
				Ok(out)
			},
			Err(e) => Err(RipWatchError::Settings(format!("{}: {e}", src.display()))),
		}
	}

	/// # Save.
	///
	/// Write the settings to `dst` as pretty JSON. The file is replaced
	/// atomically.
	///
	/// ## Errors
	///
	/// This will return an error if the file cannot be written.
	pub fn save(&self, dst: &Path) -> Result<(), RipWatchError> {
		let err = || RipWatchError::Write(dst.to_string_lossy().into_owned());

		let raw = serde_json::to_vec_pretty(self).map_err(|_| err())?;
		let dir = dst.parent().filter(|p| ! p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
		std::fs::create_dir_all(dir).map_err(|_| err())?;

		let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|_| err())?;
		tmp.write_all(&raw).and_then(|()| tmp.flush()).map_err(|_| err())?;
		tmp.persist(dst).map_err(|_| err())?;
		Ok(())
	}

	#[must_use]
	/// # Session Configuration.
	pub fn session_config(&self) -> SessionConfig {
		SessionConfig {
			out_dir: self.outdir.clone(),
			countdown: Duration::from_secs(self.countdown_secs),
			submission_timeout: Duration::from_secs(self.submission_timeout_secs),
			tools: self.tools.clone(),
		}
	}
}
