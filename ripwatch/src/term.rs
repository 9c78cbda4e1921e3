/*!
# Rip Watch: Terminal Sink
*/

use ripwatch_core::{
	LogSink,
	Phase,
	ReleaseCandidate,
	RipWatchError,
	StatusSink,
	TrackTagSet,
};
use std::{
	fmt::Write,
	path::Path,
	time::Duration,
};



#[derive(Debug, Clone, Copy, Default)]
/// # Terminal Sink.
///
/// Questions for the user are printed to STDERR as plain text; everything
/// else goes to the log.
pub(crate) struct TermSink(LogSink);

impl StatusSink for TermSink {
	fn on_disc_added(&self, device: &Path, tags: &TrackTagSet) { self.0.on_disc_added(device, tags); }

	fn on_track_changed(&self, device: &Path, track: u32) { self.0.on_track_changed(device, track); }

	fn on_track_progress(&self, device: &Path, pct: u8) { self.0.on_track_progress(device, pct); }

	fn on_disc_removed(&self, device: &Path) { self.0.on_disc_removed(device); }

	fn on_cancel_requested(&self, device: &Path) { self.0.on_cancel_requested(device); }

	fn on_selection_needed(
		&self,
		device: &Path,
		rows: &[ReleaseCandidate],
		recommended: usize,
		timeout: Duration,
	) {
		let mut out = format!("\n{} - Several releases match this disc:\n", device.display());
		for (idx, row) in rows.iter().enumerate() {
			out.push_str(&release_row(idx, row, idx == recommended));
			out.push('\n');
		}
		let _res = writeln!(
			out,
			"Type a number to choose, \"hold\" to stop the countdown, or \"ignore\" to skip. \
			Release 0 will be used in {}s.",
			timeout.as_secs(),
		);

		// One write keeps concurrent sessions from interleaving.
		eprint!("{out}");
	}

	fn on_submission_needed(&self, device: &Path, url: &str) {
		eprint!(
			"\n{} - This disc is not in MusicBrainz. Add it here:\n  {url}\n\
			Type \"submitted\" once it has been added, or \"ignore\" to skip it.\n",
			device.display(),
		);
	}

	fn on_phase_changed(&self, device: &Path, phase: Phase) { self.0.on_phase_changed(device, phase); }

	fn on_failure(&self, device: &Path, err: &RipWatchError) { self.0.on_failure(device, err); }
}



/// # Release Row.
///
/// e.g. `  [1] Artist - Album (2001, US, disc 1/2, 0123456789) *`
fn release_row(idx: usize, row: &ReleaseCandidate, recommended: bool) -> String {
	let mut extra: Vec<String> = [&row.date, &row.country, &row.barcode]
		.into_iter()
		.filter_map(|v| v.as_deref().map(str::trim).filter(|v| ! v.is_empty()).map(str::to_owned))
		.collect();
	if 1 < row.total_discs() {
		let pos = row.mediums.first().map_or(1, |m| m.position.max(1));
		extra.push(format!("disc {pos}/{}", row.total_discs()));
	}

	let mut out = format!("  [{idx}] {} - {}", row.artist_credit_phrase(), row.title);
	if ! extra.is_empty() {
		out.push_str(" (");
		out.push_str(&extra.join(", "));
		out.push(')');
	}
	if recommended { out.push_str(" *"); }
	out
}



#[cfg(test)]
mod test {
	use super::*;
	use ripwatch_core::{
		ArtistCredit,
		Medium,
	};

	#[test]
	fn t_release_row() {
		let mut row = ReleaseCandidate {
			release_id: "abc".to_owned(),
			title: "Album".to_owned(),
			artist_credit: vec![ArtistCredit { name: "Artist".to_owned(), joinphrase: String::new() }],
			date: Some("2001".to_owned()),
			country: Some(String::new()),
			..ReleaseCandidate::default()
		};
		assert_eq!(release_row(0, &row, false), "  [0] Artist - Album (2001)", "Wrong simple row.");

		row.mediums = vec![Medium { position: 2, ..Medium::default() }, Medium::default()];
		row.barcode = Some("0123".to_owned());
		assert_eq!(
			release_row(3, &row, true),
			"  [3] Artist - Album (2001, 0123, disc 2/2) *",
			"Wrong multi-disc row.",
		);
	}
}
