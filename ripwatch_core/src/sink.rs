/*!
# Rip Watch: Status Sink
*/

use crate::{
	Phase,
	ReleaseCandidate,
	RipWatchError,
	TrackTagSet,
};
use std::{
	path::Path,
	time::Duration,
};



/// # Status Sink.
///
/// Sessions report what they're up to through this. Implementations might
/// draw a GUI, print to a terminal, or record calls for a test; the only
/// requirement is tolerating concurrent calls from several sessions.
pub trait StatusSink: Send + Sync {
	/// # Disc Added.
	///
	/// Extraction is about to begin with these tags.
	fn on_disc_added(&self, device: &Path, tags: &TrackTagSet);

	/// # Track Changed.
	fn on_track_changed(&self, device: &Path, track: u32);

	/// # Track Progress (0-100).
	fn on_track_progress(&self, _device: &Path, _pct: u8) {}

	/// # Disc Removed.
	///
	/// The session is over, one way or another.
	fn on_disc_removed(&self, device: &Path);

	/// # Cancel Requested.
	fn on_cancel_requested(&self, device: &Path);

	/// # Selection Needed.
	///
	/// Several releases match; one of the `rows` should be picked (by
	/// index) before `timeout` elapses, or the first will be used.
	/// `recommended` is the index of the best-ranked row.
	fn on_selection_needed(
		&self,
		device: &Path,
		rows: &[ReleaseCandidate],
		recommended: usize,
		timeout: Duration,
	);

	/// # Submission Needed.
	///
	/// The disc is not catalogued; the user may add it at `url`.
	fn on_submission_needed(&self, device: &Path, url: &str);

	/// # Phase Changed.
	fn on_phase_changed(&self, _device: &Path, _phase: Phase) {}

	/// # Failure.
	fn on_failure(&self, _device: &Path, _err: &RipWatchError) {}
}



#[derive(Debug, Clone, Copy, Default)]
/// # Log Sink.
///
/// A [`StatusSink`] that just writes everything to the log.
pub struct LogSink;

impl StatusSink for LogSink {
	fn on_disc_added(&self, device: &Path, tags: &TrackTagSet) {
		let album = tags.album();
		tracing::info!(
			"{} - Ripping {} by {} (disc {}/{}, {} tracks).",
			device.display(),
			album.album,
			album.albumartist,
			album.discnumber,
			album.totaldiscs,
			tags.len(),
		);
	}

	fn on_track_changed(&self, device: &Path, track: u32) {
		tracing::info!("{} - Track {track:02}.", device.display());
	}

	fn on_track_progress(&self, device: &Path, pct: u8) {
		tracing::trace!("{} - {pct}%", device.display());
	}

	fn on_disc_removed(&self, device: &Path) {
		tracing::info!("{} - Disc removed.", device.display());
	}

	fn on_cancel_requested(&self, device: &Path) {
		tracing::info!("{} - Cancel requested.", device.display());
	}

	fn on_selection_needed(
		&self,
		device: &Path,
		rows: &[ReleaseCandidate],
		recommended: usize,
		timeout: Duration,
	) {
		tracing::info!(
			"{} - {} releases match (best: #{recommended}); #0 will be used in {}s.",
			device.display(),
			rows.len(),
			timeout.as_secs(),
		);
	}

	fn on_submission_needed(&self, device: &Path, url: &str) {
		tracing::warn!("{} - Disc not found; submit it at {url}", device.display());
	}

	fn on_phase_changed(&self, device: &Path, phase: Phase) {
		tracing::debug!("{} - {phase}", device.display());
	}

	fn on_failure(&self, device: &Path, err: &RipWatchError) {
		tracing::error!("{} - {err}", device.display());
	}
}
