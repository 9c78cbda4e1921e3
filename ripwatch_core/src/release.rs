/*!
# Rip Watch: Release Records
*/

use serde::Deserialize;



#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
/// # Release Candidate.
///
/// One catalog entry returned by a disc lookup. Only the fields the tagger
/// consumes are kept.
pub struct ReleaseCandidate {
	#[serde(rename = "id")]
	/// # Release ID.
	pub release_id: String,

	/// # Title.
	pub title: String,

	#[serde(rename = "artist-credit")]
	/// # Artist Credit.
	pub artist_credit: Vec<ArtistCredit>,

	/// # Country.
	pub country: Option<String>,

	/// # Release Date.
	pub date: Option<String>,

	/// # Barcode.
	pub barcode: Option<String>,

	/// # Amazon ID.
	pub asin: Option<String>,

	#[serde(rename = "media")]
	/// # Mediums.
	pub mediums: Vec<Medium>,

	#[serde(skip)]
	/// # Total Mediums.
	///
	/// The number of mediums the release had before any filtering. This is
	/// filled in after decoding.
	pub medium_count: usize,
}

impl ReleaseCandidate {
	#[must_use]
	/// # Artist Credit Phrase.
	///
	/// Join the credited names with their join phrases, e.g. "A feat. B".
	pub fn artist_credit_phrase(&self) -> String {
		let mut out = String::new();
		for c in &self.artist_credit {
			out.push_str(&c.name);
			out.push_str(&c.joinphrase);
		}
		out
	}

	#[must_use]
	/// # Total Discs.
	pub fn total_discs(&self) -> usize {
		self.medium_count.max(self.mediums.len()).max(1)
	}
}



#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
/// # Artist Credit.
pub struct ArtistCredit {
	/// # Credited Name.
	pub name: String,

	/// # Join Phrase.
	pub joinphrase: String,
}



#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
/// # Medium.
///
/// One physical disc's worth of a release.
pub struct Medium {
	/// # Format.
	///
	/// E.g. "CD", "Enhanced CD", "Vinyl"…
	pub format: Option<String>,

	/// # Disc Number.
	pub position: u32,

	#[serde(rename = "track-count")]
	/// # Track Count.
	pub track_count: usize,

	/// # Tracks.
	pub tracks: Vec<TrackRecording>,

	#[serde(skip)]
	/// # ISRC Matches.
	///
	/// This is computed during ranking.
	pub isrc_match_count: usize,
}

impl Medium {
	#[must_use]
	/// # Is CD?
	pub fn is_cd(&self) -> bool {
		self.format.as_deref().is_some_and(|f| f.contains("CD"))
	}
}



#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
/// # Track.
pub struct TrackRecording {
	/// # Release Track ID.
	pub id: String,

	/// # Track Number.
	///
	/// This is a string in the source data, and not always numeric.
	pub number: String,

	/// # Position.
	pub position: u32,

	/// # Title (as printed on this release).
	pub title: String,

	/// # Recording.
	pub recording: Recording,
}

impl TrackRecording {
	#[must_use]
	/// # Track Number.
	///
	/// Parse the printed number, returning zero if it is missing or weird.
	pub fn number(&self) -> u32 { self.number.trim().parse().unwrap_or(0) }
}



#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
/// # Recording.
pub struct Recording {
	/// # Recording ID.
	pub id: String,

	/// # Title.
	pub title: String,

	/// # ISRCs.
	pub isrcs: Vec<String>,
}



#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
/// # Cover Image.
pub struct CoverImage {
	/// # Front Cover?
	pub front: bool,

	/// # Image URL.
	pub image: String,
}
