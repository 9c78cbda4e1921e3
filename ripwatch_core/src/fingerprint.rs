/*!
# Rip Watch: Disc Fingerprint
*/

use cdtoc::{
	Toc,
	TocKind,
};
use crate::{
	RipWatchError,
	Toolchain,
};
use regex::Regex;
use std::{
	fmt,
	path::Path,
	sync::OnceLock,
};



/// # Lead-out Label.
const CD_LEADOUT_LABEL: &str = "AA";

/// # MusicBrainz Submission Base.
const SUBMISSION_BASE: &str = "https://musicbrainz.org/cdtoc/attach";



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Disc Fingerprint.
///
/// The identity of a physical disc, derived from its table of contents. This
/// is computed once per read and never changes afterward.
pub struct DiscFingerprint {
	/// # Disc ID.
	id: String,

	/// # Table of Contents.
	toc: Toc,

	/// # Audio Track Offsets (lead-in included).
	track_offsets: Vec<u32>,

	/// # Track ISRCs.
	///
	/// This always has one entry per audio track; unknowns are empty.
	track_isrcs: Vec<String>,
}

impl fmt::Display for DiscFingerprint {
	/// # Summarize the Disc.
	///
	/// Print the identifiers and table of contents in a little table.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		/// # Divider.
		const DIVIDER: &str = "----------------------------------------\n";

		writeln!(f, "MusicBrainz: {}", self.id)?;
		writeln!(
			f,
			"\n##   FIRST    LAST  LENGTH          {}",
			if self.track_isrcs.iter().all(String::is_empty) { "" } else { "ISRC" },
		)?;
		f.write_str(DIVIDER)?;

		// Leading data track.
		if matches!(self.toc.kind(), TocKind::DataFirst) {
			writeln!(
				f,
				"01  {:>6}                    DATA TRACK",
				self.toc.data_sector_normalized().unwrap_or_default(),
			)?;
		}

		// The audio tracks.
		let mut last = 0;
		for (idx, t) in self.toc.audio_tracks().enumerate() {
			last = t.number();
			let rng = t.sector_range_normalized();
			let isrc = self.isrc(idx).unwrap_or_default();
			writeln!(
				f,
				"{last:02}  {:>6}  {:>6}  {:>6}  {isrc:>12}",
				rng.start,
				rng.end - 1,
				rng.end - rng.start,
			)?;
		}

		// Trailing data track.
		if matches!(self.toc.kind(), TocKind::CDExtra) {
			writeln!(
				f,
				"{:02}  {:>6}                    DATA TRACK",
				last + 1,
				self.toc.data_sector_normalized().unwrap_or_default(),
			)?;
		}

		writeln!(
			f,
			"{CD_LEADOUT_LABEL}  {:>6}                      LEAD-OUT",
			self.toc.leadout_normalized(),
		)?;
		f.write_str(DIVIDER)
	}
}

impl DiscFingerprint {
	/// # New.
	///
	/// Build a fingerprint from a table of contents. Offsets are in sectors
	/// and include the standard 150-sector lead-in, the way MusicBrainz
	/// expects them. A disc may carry at most one data track, either before
	/// or after the audio.
	///
	/// The ISRC list is padded or truncated to match the audio track count.
	///
	/// ## Errors
	///
	/// This will return an error if the table of contents is nonsensical.
	pub fn new(
		track_offsets: Vec<u32>,
		data: Option<u32>,
		leadout: u32,
		mut track_isrcs: Vec<String>,
	) -> Result<Self, RipWatchError> {
		let toc = Toc::from_parts(track_offsets.clone(), data, leadout)?;
		track_isrcs.resize(track_offsets.len(), String::new());

		Ok(Self {
			id: toc.musicbrainz_id().to_string(),
			toc,
			track_offsets,
			track_isrcs,
		})
	}

	#[must_use]
	/// # With ID.
	///
	/// Replace the computed ID with one obtained elsewhere.
	pub fn with_id<S: Into<String>>(self, id: S) -> Self {
		Self {
			id: id.into(),
			..self
		}
	}
}

impl DiscFingerprint {
	#[must_use]
	/// # Disc ID.
	pub fn id(&self) -> &str { &self.id }

	#[must_use]
	/// # First Audio Track Number.
	///
	/// This is `2` for discs that lead with a data track.
	pub fn first_track(&self) -> u8 {
		self.toc.audio_tracks().next().map_or(1, |t| t.number())
	}

	#[must_use]
	/// # ISRC by Position.
	///
	/// Return the (non-empty) ISRC for the zero-based audio track position.
	pub fn isrc(&self, idx: usize) -> Option<&str> {
		self.track_isrcs.get(idx)
			.map(String::as_str)
			.filter(|s| ! s.is_empty())
	}

	#[must_use]
	/// # Audio Leadout.
	///
	/// For enhanced CDs this stops short of the data session, as MusicBrainz
	/// expects.
	pub fn leadout(&self) -> u32 { self.toc.audio_leadout() }

	#[must_use]
	/// # Table of Contents.
	pub const fn toc(&self) -> &Toc { &self.toc }

	#[must_use]
	/// # Audio Track Count.
	pub fn track_count(&self) -> usize { self.track_offsets.len() }

	#[must_use]
	/// # Track ISRCs.
	pub fn track_isrcs(&self) -> &[String] { &self.track_isrcs }

	#[must_use]
	/// # Audio Track Offsets.
	pub fn track_offsets(&self) -> &[u32] { &self.track_offsets }

	#[must_use]
	/// # Submission URL.
	///
	/// The MusicBrainz page for attaching this table of contents to a
	/// release, offered to the user when the disc is not catalogued.
	pub fn submission_url(&self) -> String {
		use std::fmt::Write;

		let first = self.first_track();
		let last = usize::from(first) + self.track_count() - 1;
		let mut out = format!(
			"{SUBMISSION_BASE}?id={}&tracks={}&toc={first}+{last}+{}",
			self.id,
			self.track_count(),
			self.leadout(),
		);
		for v in &self.track_offsets {
			let _res = write!(out, "+{v}");
		}
		out
	}
}



/// # TOC Reader.
///
/// Read a disc's table of contents (and ISRCs, where possible).
pub trait TocReader: Send + Sync {
	/// # Read.
	///
	/// ## Errors
	///
	/// Unreadable or empty drives should return
	/// [`RipWatchError::DeviceRead`].
	fn read(&self, device: &Path) -> Result<DiscFingerprint, RipWatchError>;
}

#[derive(Debug, Clone)]
/// # Disc ID Reader.
///
/// Read the table of contents with `cd-discid --musicbrainz`, then scrape
/// ISRCs out of `cd-info`. (Both programs are configurable.)
pub struct DiscIdReader {
	/// # Programs.
	tools: Toolchain,
}

impl DiscIdReader {
	#[must_use]
	/// # New.
	pub const fn new(tools: Toolchain) -> Self { Self { tools } }
}

impl TocReader for DiscIdReader {
	fn read(&self, device: &Path) -> Result<DiscFingerprint, RipWatchError> {
		let out = self.tools.toc.command(device)
			.output()
			.map_err(|e| RipWatchError::DeviceRead(format!("{}: {e}", self.tools.toc.program)))?;

		if ! out.status.success() {
			let err = String::from_utf8_lossy(&out.stderr);
			return Err(RipWatchError::DeviceRead(format!(
				"{} {}",
				device.to_string_lossy(),
				err.lines().next().unwrap_or("is not ready"),
			)));
		}

		let (offsets, leadout) = parse_discid(&String::from_utf8_lossy(&out.stdout))?;

		// The track list tells us which track (if any) holds data, and the
		// ISRCs are a bonus; lots of discs don't have them.
		let info = self.tools.isrc.command(device)
			.output()
			.ok()
			.filter(|o| o.status.success())
			.map(|o| String::from_utf8_lossy(&o.stdout).into_owned())
			.unwrap_or_default();

		let isrcs = parse_isrcs(&info, offsets.len());
		let (audio, data, isrcs) = split_data_track(offsets, isrcs, &parse_data_tracks(&info))?;
		DiscFingerprint::new(audio, data, leadout, isrcs)
	}
}



/// # Parse `cd-discid --musicbrainz`.
///
/// The output is the track count, each track offset, and then the leadout,
/// separated by whitespace.
fn parse_discid(raw: &str) -> Result<(Vec<u32>, u32), RipWatchError> {
	let nums = raw.split_whitespace()
		.map(str::parse::<u32>)
		.collect::<Result<Vec<_>, _>>()
		.map_err(|_| RipWatchError::DeviceRead("unparseable table of contents".to_owned()))?;

	let Some((&count, rest)) = nums.split_first() else {
		return Err(RipWatchError::DeviceRead("empty table of contents".to_owned()));
	};
	let Ok(count) = usize::try_from(count) else {
		return Err(RipWatchError::DeviceRead("invalid track count".to_owned()));
	};
	if rest.len() != count + 1 {
		return Err(RipWatchError::DeviceRead("track count mismatch".to_owned()));
	}

	let (offsets, leadout) = rest.split_at(count);
	Ok((offsets.to_vec(), leadout[0]))
}

/// # Parse Data Tracks.
///
/// Return the numbers of any tracks `cd-info` lists as data.
fn parse_data_tracks(raw: &str) -> Vec<usize> {
	/// # Track List Pattern.
	static DATA: OnceLock<Option<Regex>> = OnceLock::new();

	let Some(re) = DATA.get_or_init(|| Regex::new(
		r"(?m)^\s*(\d{1,2}):\s+\d{2}:\d{2}:\d{2}\s+\d+\s+data\b"
	).ok()).as_ref() else { return Vec::new(); };

	re.captures_iter(raw)
		.filter_map(|c| c[1].parse().ok())
		.collect()
}

/// # Split Data Track.
///
/// Pull the data track (if any) out of the full track list. Only the first
/// or last track may hold data, and only one of them.
fn split_data_track(mut offsets: Vec<u32>, mut isrcs: Vec<String>, data_tracks: &[usize])
-> Result<(Vec<u32>, Option<u32>, Vec<String>), RipWatchError> {
	match data_tracks {
		[] => Ok((offsets, None, isrcs)),
		[1] if 1 < offsets.len() => {
			let data = offsets.remove(0);
			if ! isrcs.is_empty() { isrcs.remove(0); }
			Ok((offsets, Some(data), isrcs))
		},
		[n] if 1 < offsets.len() && *n == offsets.len() => {
			let data = offsets.pop();
			isrcs.truncate(offsets.len());
			Ok((offsets, data, isrcs))
		},
		_ => Err(RipWatchError::DeviceRead("unsupported data track layout".to_owned())),
	}
}

/// # Parse ISRCs.
///
/// Scrape ISRCs out of free-form text. A line mentioning a track number sets
/// the context for ISRCs that follow, so both `Track 3 ISRC: ...` and a
/// track heading followed by an `ISRC: ...` line are understood.
fn parse_isrcs(raw: &str, track_count: usize) -> Vec<String> {
	/// # Track Pattern.
	static TRACK: OnceLock<Option<Regex>> = OnceLock::new();

	/// # ISRC Pattern.
	static ISRC: OnceLock<Option<Regex>> = OnceLock::new();

	let mut out = vec![String::new(); track_count];
	let (Some(re_track), Some(re_isrc)) = (
		TRACK.get_or_init(|| Regex::new(r"(?i)\btrack\s*#?\s*(\d{1,2})\b").ok()).as_ref(),
		ISRC.get_or_init(|| Regex::new(r"\b([A-Z]{2}[A-Z0-9]{3}\d{7})\b").ok()).as_ref(),
	) else { return out; };

	let mut current: Option<usize> = None;
	for line in raw.lines() {
		if let Some(num) = re_track.captures(line).and_then(|c| c[1].parse::<usize>().ok()) {
			current = Some(num);
		}

		if ! line.to_ascii_uppercase().contains("ISRC") { continue; }
		if let (Some(num), Some(isrc)) = (current, re_isrc.captures(line)) {
			if let Some(slot) = num.checked_sub(1).and_then(|idx| out.get_mut(idx)) {
				isrc[1].clone_into(slot);
			}
		}
	}

	out
}



#[cfg(test)]
mod test {
	use super::*;

	/// # Ten-Track Test Offsets.
	const OFFSETS: [u32; 10] = [
		150, 18901, 39738, 59557, 79152, 100126, 124833, 147278, 166336, 182560,
	];

	#[test]
	fn t_musicbrainz_id() {
		let fp = DiscFingerprint::new(OFFSETS.to_vec(), None, 206_535, Vec::new())
			.expect("Fingerprint failed.");
		assert_eq!(fp.id(), "Wn8eRBtfLDfM0qjYPdxrz.Zjs_U-", "Wrong MusicBrainz ID.");
		assert_eq!(fp.first_track(), 1, "Wrong first track.");
		assert_eq!(fp.track_count(), 10, "Wrong track count.");
		assert_eq!(fp.track_isrcs().len(), 10, "ISRCs should be padded.");
		assert!(matches!(fp.toc().kind(), TocKind::Audio), "Wrong disc kind.");
	}

	#[test]
	fn t_submission_url() {
		let fp = DiscFingerprint::new(OFFSETS.to_vec(), None, 206_535, Vec::new())
			.expect("Fingerprint failed.");
		assert_eq!(
			fp.submission_url(),
			"https://musicbrainz.org/cdtoc/attach?id=Wn8eRBtfLDfM0qjYPdxrz.Zjs_U-&tracks=10&toc=1+10+206535+150+18901+39738+59557+79152+100126+124833+147278+166336+182560",
			"Wrong submission URL.",
		);
	}

	#[test]
	fn t_cd_extra() {
		// MusicBrainz ends an enhanced CD's audio 11,400 sectors before its
		// data session.
		let data = 206_535 + 11_400;
		let fp = DiscFingerprint::new(OFFSETS.to_vec(), Some(data), data + 30_000, Vec::new())
			.expect("Fingerprint failed.");
		let plain = DiscFingerprint::new(OFFSETS.to_vec(), None, 206_535, Vec::new())
			.expect("Fingerprint failed.");

		assert!(matches!(fp.toc().kind(), TocKind::CDExtra), "Wrong disc kind.");
		assert_eq!(fp.leadout(), 206_535, "Wrong audio leadout.");
		assert_eq!(fp.id(), plain.id(), "The data session should not change the ID.");
		assert_eq!(fp.submission_url(), plain.submission_url(), "Wrong submission URL.");
		assert_eq!(fp.track_count(), 10, "The data track should not count.");
	}

	#[test]
	fn t_data_first() {
		let fp = DiscFingerprint::new(OFFSETS[1..].to_vec(), Some(150), 206_535, Vec::new())
			.expect("Fingerprint failed.");
		assert!(matches!(fp.toc().kind(), TocKind::DataFirst), "Wrong disc kind.");
		assert_eq!(fp.first_track(), 2, "Audio should start at track two.");
		assert_eq!(fp.track_count(), 9, "The data track should not count.");
		assert!(
			fp.submission_url().contains("&tracks=9&toc=2+10+206535+18901+"),
			"Wrong submission URL.",
		);
	}

	#[test]
	fn t_bad_toc() {
		assert!(DiscFingerprint::new(Vec::new(), None, 500, Vec::new()).is_err(), "Empty TOC accepted.");
		assert!(DiscFingerprint::new(vec![150, 100], None, 500, Vec::new()).is_err(), "Unsorted TOC accepted.");
		assert!(DiscFingerprint::new(vec![150, 300], None, 200, Vec::new()).is_err(), "Short leadout accepted.");
	}

	#[test]
	fn t_split_data_track() {
		let isrcs = || vec!["A".to_owned(), "B".to_owned(), "C".to_owned()];

		let (audio, data, out) = split_data_track(vec![150, 1000, 2000], isrcs(), &[])
			.expect("Audio-only split failed.");
		assert_eq!(audio, [150, 1000, 2000], "Wrong audio-only audio.");
		assert_eq!(data, None, "Wrong audio-only data.");
		assert_eq!(out.len(), 3, "Wrong audio-only ISRCs.");

		let (audio, data, out) = split_data_track(vec![150, 1000, 2000], isrcs(), &[3])
			.expect("CD-Extra split failed.");
		assert_eq!(audio, [150, 1000], "Wrong CD-Extra audio.");
		assert_eq!(data, Some(2000), "Wrong CD-Extra data.");
		assert_eq!(out, ["A", "B"], "Wrong CD-Extra ISRCs.");

		let (audio, data, out) = split_data_track(vec![150, 1000, 2000], isrcs(), &[1])
			.expect("Data-first split failed.");
		assert_eq!(audio, [1000, 2000], "Wrong data-first audio.");
		assert_eq!(data, Some(150), "Wrong data-first data.");
		assert_eq!(out, ["B", "C"], "Wrong data-first ISRCs.");

		assert!(split_data_track(vec![150, 1000, 2000], isrcs(), &[2]).is_err(), "Middle data track accepted.");
		assert!(split_data_track(vec![150, 1000, 2000], isrcs(), &[1, 3]).is_err(), "Two data tracks accepted.");
		assert!(split_data_track(vec![150], isrcs(), &[1]).is_err(), "Data-only disc accepted.");
	}

	#[test]
	fn t_parse_data_tracks() {
		let raw = "CD-ROM Track List (1 - 3)\n\
			  #: MSF       LSN    Type   Green? Copy? Channels Premphasis?\n\
			  1: 00:02:00  000000 audio  false  no    2        no\n\
			  2: 03:11:17  014192 audio  false  no    2        no\n\
			  3: 59:33:61  267886 data   false  no\n\
			170: 61:55:16  278041 leadout (623 MB raw, 607 MB formatted)\n";
		assert_eq!(parse_data_tracks(raw), [3], "Wrong data tracks.");
		assert!(parse_data_tracks("").is_empty(), "Phantom data tracks.");
	}

	#[test]
	fn t_parse_discid() {
		let (offsets, leadout) = parse_discid("3 150 10000 20000 30000\n")
			.expect("Valid output failed to parse.");
		assert_eq!(offsets, [150, 10000, 20000], "Wrong offsets.");
		assert_eq!(leadout, 30000, "Wrong leadout.");

		assert!(parse_discid("").is_err(), "Empty output accepted.");
		assert!(parse_discid("3 150 10000 20000").is_err(), "Truncated output accepted.");
		assert!(parse_discid("2 150 abc 30000").is_err(), "Garbage accepted.");
	}

	#[test]
	fn t_parse_isrcs() {
		let raw = "Track 1 ISRC: USSM19900789\n\
			CD-TEXT for Track  2:\n\
			\tTITLE: Whatever\n\
			\tISRC: GBAYE0000351\n\
			track 4: ISRC GBAYE000035\n";
		let isrcs = parse_isrcs(raw, 4);
		assert_eq!(
			isrcs,
			["USSM19900789", "GBAYE0000351", "", ""],
			"ISRC scraping failed.",
		);
	}

	#[test]
	fn t_isrc_lookup() {
		let fp = DiscFingerprint::new(
			vec![150, 1000],
			None,
			2000,
			vec![String::new(), "USSM19900789".to_owned()],
		).expect("Fingerprint failed.");
		assert_eq!(fp.isrc(0), None, "Empty ISRCs should be None.");
		assert_eq!(fp.isrc(1), Some("USSM19900789"), "Wrong ISRC.");
		assert_eq!(fp.isrc(2), None, "Out of range should be None.");
	}
}
