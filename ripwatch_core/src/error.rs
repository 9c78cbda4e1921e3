/*!
# Rip Watch: Errors
*/

use cdtoc::TocError;
use std::{
	error::Error,
	fmt,
};



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Errors.
pub enum RipWatchError {
	/// # Bug!
	Bug(&'static str),

	/// # Disc could not be read.
	DeviceRead(String),

	/// # Tag set is empty.
	EmptyTagSet,

	/// # Device event source failure.
	EventSource(String),

	/// # User Abort.
	Killed,

	/// # Metadata lookup failure.
	LookupService(String),

	/// # No release candidates.
	NoCandidates,

	/// # Scratch directory.
	ScratchDir,

	/// # Settings load/save.
	Settings(String),

	/// # Program could not be started.
	SubprocessLaunch(String),

	/// # Writing to disk.
	Write(String),
}

impl Error for RipWatchError {}

impl fmt::Display for RipWatchError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Bug(s) => write!(f, "Bug: {s}."),
			Self::DeviceRead(s) => write!(f, "Unable to read disc: {s}."),
			Self::EmptyTagSet => f.write_str("The release metadata could not be mapped onto the disc tracks."),
			Self::EventSource(s) => write!(f, "Device event source failed: {s}."),
			Self::Killed => f.write_str("User abort."),
			Self::LookupService(s) => write!(f, "Metadata lookup failed: {s}."),
			Self::NoCandidates => f.write_str("No usable releases were found for the disc."),
			Self::ScratchDir => f.write_str("Unable to establish a scratch directory."),
			Self::Settings(s) => write!(f, "Invalid settings: {s}."),
			Self::SubprocessLaunch(s) => write!(f, "Unable to launch {s}."),
			Self::Write(s) => write!(f, "Unable to write to {s}."),
		}
	}
}

impl From<TocError> for RipWatchError {
	#[inline]
	fn from(err: TocError) -> Self { Self::DeviceRead(err.to_string()) }
}
