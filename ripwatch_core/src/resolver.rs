/*!
# Rip Watch: Release Resolver
*/

use crate::{
	DiscFingerprint,
	DiscLookup,
	Medium,
	MetadataService,
	ReleaseCandidate,
	RipWatchError,
	TocReader,
};
use std::{
	collections::BTreeMap,
	path::{
		Path,
		PathBuf,
	},
};



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Search Outcome.
pub enum SearchOutcome {
	/// # Releases Found.
	Found(Vec<ReleaseCandidate>),

	/// # Not Catalogued.
	///
	/// This holds the submission URL for the disc.
	NotCatalogued(String),

	/// # Service Error.
	///
	/// This is distinct from "not catalogued"; the service simply failed to
	/// give an answer.
	ServiceError(RipWatchError),
}



#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # Album Info.
///
/// The tags shared by every track on the disc.
pub struct AlbumInfo {
	/// # Artist.
	pub artist: String,

	/// # Album Artist.
	pub albumartist: String,

	/// # Album Title.
	pub album: String,

	/// # Track Total.
	pub totaltracks: usize,

	/// # Disc Number.
	pub discnumber: u32,

	/// # Disc Total.
	pub totaldiscs: usize,

	/// # Release Date.
	pub date: String,

	/// # Amazon ID.
	pub asin: String,

	/// # MusicBrainz Release ID.
	pub musicbrainz_albumid: String,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # Track Tags.
pub struct TrackTags {
	/// # Title.
	pub title: String,

	/// # Track Number.
	pub tracknumber: u32,

	/// # ISRC (from the disc).
	pub isrc: String,

	/// # Disc ID.
	pub discid: String,

	/// # MusicBrainz Recording ID.
	pub musicbrainz_trackid: String,

	/// # MusicBrainz Release Track ID.
	pub musicbrainz_releasetrackid: String,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # Track Tag Set.
///
/// Normalized per-disc metadata, keyed by the track's position on the disc,
/// ready to be handed to the encoder.
pub struct TrackTagSet {
	/// # Album Info.
	album: AlbumInfo,

	/// # Tracks.
	tracks: BTreeMap<u32, TrackTags>,

	/// # Cover Art.
	cover_art: Option<PathBuf>,
}

impl TrackTagSet {
	#[must_use]
	/// # Album Info.
	pub const fn album(&self) -> &AlbumInfo { &self.album }

	#[must_use]
	/// # Cover Art Path.
	pub fn cover_art(&self) -> Option<&Path> { self.cover_art.as_deref() }

	#[must_use]
	/// # Track.
	pub fn get(&self, num: u32) -> Option<&TrackTags> { self.tracks.get(&num) }

	#[must_use]
	/// # Is Empty?
	pub fn is_empty(&self) -> bool { self.tracks.is_empty() }

	/// # Track Numbers.
	pub fn keys(&self) -> impl Iterator<Item=u32> + '_ { self.tracks.keys().copied() }

	#[must_use]
	/// # Track Count.
	pub fn len(&self) -> usize { self.tracks.len() }

	#[must_use]
	/// # Multi-Disc?
	pub const fn multi_disc(&self) -> bool { 1 < self.album.totaldiscs }

	/// # Set Cover Art.
	pub fn set_cover_art(&mut self, src: Option<PathBuf>) { self.cover_art = src; }

	#[must_use]
	/// # Vorbis Tags.
	///
	/// Return the complete set of key/value pairs for a given track, album
	/// info included. Empty values are omitted.
	pub fn vorbis_tags(&self, num: u32) -> Vec<(&'static str, String)> {
		let Some(t) = self.get(num) else { return Vec::new(); };
		let a = &self.album;
		let out = vec![
			("ARTIST", a.artist.clone()),
			("ALBUMARTIST", a.albumartist.clone()),
			("ALBUM", a.album.clone()),
			("TOTALTRACKS", a.totaltracks.to_string()),
			("DISCNUMBER", a.discnumber.to_string()),
			("TOTALDISCS", a.totaldiscs.to_string()),
			("DATE", a.date.clone()),
			("ASIN", a.asin.clone()),
			("MUSICBRAINZ_ALBUMID", a.musicbrainz_albumid.clone()),
			("TITLE", t.title.clone()),
			("TRACKNUMBER", t.tracknumber.to_string()),
			("ISRC", t.isrc.clone()),
			("DISCID", t.discid.clone()),
			("MUSICBRAINZ_TRACKID", t.musicbrainz_trackid.clone()),
			("MUSICBRAINZ_RELEASETRACKID", t.musicbrainz_releasetrackid.clone()),
		];
		out.into_iter().filter(|(_, v)| ! v.is_empty()).collect()
	}
}



/// # Compute Fingerprint.
///
/// ## Errors
///
/// This passes through any [`RipWatchError::DeviceRead`] from the reader.
pub fn compute_fingerprint(reader: &dyn TocReader, device: &Path)
-> Result<DiscFingerprint, RipWatchError> {
	let fp = reader.read(device)?;
	tracing::debug!("{} - Disc ID: {}", device.display(), fp.id());
	Ok(fp)
}

/// # Search.
///
/// Look the fingerprint up. Unknown IDs, discless responses, and empty
/// release lists all come back as [`SearchOutcome::NotCatalogued`]; anything
/// else that goes wrong is a [`SearchOutcome::ServiceError`].
pub fn search(service: &dyn MetadataService, fp: &DiscFingerprint, includes: &[&str])
-> SearchOutcome {
	match service.lookup_disc(fp.id(), includes) {
		Ok(DiscLookup::Releases(releases)) if ! releases.is_empty() =>
			SearchOutcome::Found(releases),
		Ok(DiscLookup::Releases(_)) => {
			tracing::warn!("{} - Lookup returned no releases.", fp.id());
			SearchOutcome::NotCatalogued(fp.submission_url())
		},
		Ok(DiscLookup::NoDiscInfo) => {
			tracing::warn!("{} - No disc information returned!", fp.id());
			SearchOutcome::NotCatalogued(fp.submission_url())
		},
		Ok(DiscLookup::UnknownId) => SearchOutcome::NotCatalogued(fp.submission_url()),
		Err(e) => SearchOutcome::ServiceError(e),
	}
}

/// # Filter and Rank.
///
/// Pick the release that best matches the physical disc. Each candidate is
/// narrowed to its best CD medium (see [`selection_rows`]), and the first
/// candidate with the highest positive ISRC score wins.
///
/// If nothing scores, the first candidate (in response order) is returned
/// instead; an exact disc ID match is trusted even without ISRCs.
///
/// This only returns `None` if `candidates` is empty.
pub fn filter_and_rank(candidates: &[ReleaseCandidate], fp: &DiscFingerprint)
-> Option<ReleaseCandidate> {
	let mut best: Option<ReleaseCandidate> = None;
	let mut best_score = 0;
	for c in candidates.iter().filter_map(|c| narrow(c, fp)) {
		let score = candidate_score(&c);
		if best_score < score {
			best_score = score;
			best = Some(c);
		}
	}

	best.or_else(|| candidates.first().map(|first| narrow(first, fp).unwrap_or_else(|| {
		let mut out = first.clone();
		out.medium_count = first.total_discs();
		out.mediums.truncate(1);
		out
	})))
}

/// # Selection Rows.
///
/// Return every candidate that has at least one CD medium, each narrowed to
/// its best-scoring CD medium, in response order.
///
/// If no candidate survives the filter, the [`filter_and_rank`] fallback is
/// returned as the sole row.
pub fn selection_rows(candidates: &[ReleaseCandidate], fp: &DiscFingerprint)
-> Vec<ReleaseCandidate> {
	let rows: Vec<ReleaseCandidate> = candidates.iter()
		.filter_map(|c| narrow(c, fp))
		.collect();
	if rows.is_empty() { filter_and_rank(candidates, fp).into_iter().collect() }
	else { rows }
}

/// # Build Tag Set.
///
/// Flatten the (narrowed) release into per-track tags. Missing release
/// fields become empty strings or zeroes.
///
/// If two tracks claim the same number, an empty set is returned rather
/// than letting one overwrite the other.
pub fn build_tag_set(release: &ReleaseCandidate, fp: &DiscFingerprint) -> TrackTagSet {
	let Some(medium) = release.mediums.first() else {
		tracing::error!("{} - Release {} has no mediums!", fp.id(), release.release_id);
		return TrackTagSet::default();
	};

	let artist = release.artist_credit_phrase();
	let album = AlbumInfo {
		albumartist: artist.clone(),
		artist,
		album: release.title.clone(),
		totaltracks: medium.track_count,
		discnumber: medium.position.max(1),
		totaldiscs: release.total_discs(),
		date: release.date.clone().unwrap_or_default(),
		asin: release.asin.clone().unwrap_or_default(),
		musicbrainz_albumid: release.release_id.clone(),
	};

	// The ripper names files by their position on the disc, which is one
	// higher than the release's numbering when a data track comes first.
	let shift = u32::from(fp.first_track()).saturating_sub(1);

	let mut tracks = BTreeMap::new();
	for (idx, t) in medium.tracks.iter().enumerate() {
		let tracknumber = t.number();
		let key = tracknumber + shift;
		if tracks.contains_key(&key) {
			tracing::error!(
				"{} - Track number {tracknumber} appears twice; returning no metadata.",
				fp.id(),
			);
			return TrackTagSet::default();
		}

		tracks.insert(key, TrackTags {
			title: t.recording.title.clone(),
			tracknumber,
			isrc: fp.isrc(idx).unwrap_or_default().to_owned(),
			discid: fp.id().to_owned(),
			musicbrainz_trackid: t.recording.id.clone(),
			musicbrainz_releasetrackid: t.id.clone(),
		});
	}

	TrackTagSet {
		album,
		tracks,
		cover_art: None,
	}
}

/// # Fetch Cover Art.
///
/// Download the release's front cover into `dir`, returning the path. Any
/// failure simply returns `None`; a rip never needs cover art.
pub fn fetch_cover_art(service: &dyn MetadataService, release: &ReleaseCandidate, dir: &Path)
-> Option<PathBuf> {
	let Some(images) = service.image_list(&release.release_id) else {
		tracing::warn!("{} - Failed to get images.", release.release_id);
		return None;
	};
	let Some(front) = images.into_iter().find(|i| i.front) else {
		tracing::warn!("{} - No front cover available.", release.release_id);
		return None;
	};

	let data = service.download(&front.image)?;
	let dst = dir.join(format!("coverart.{}", image_extension(&front.image)));
	match std::fs::write(&dst, data) {
		Ok(()) => Some(dst),
		Err(e) => {
			tracing::warn!("Unable to save cover art to {}: {e}", dst.display());
			None
		},
	}
}



/// # Narrow Candidate.
///
/// Return a copy of the candidate holding only its best CD medium, scored,
/// or `None` if it has no CD mediums.
fn narrow(candidate: &ReleaseCandidate, fp: &DiscFingerprint) -> Option<ReleaseCandidate> {
	let mut best: Option<Medium> = None;
	for m in candidate.mediums.iter().filter(|m| m.is_cd()) {
		let score = medium_score(m, fp);
		if best.as_ref().map_or(true, |b| b.isrc_match_count < score) {
			let mut m = m.clone();
			m.isrc_match_count = score;
			best.replace(m);
		}
	}

	let best = best?;
	Some(ReleaseCandidate {
		release_id: candidate.release_id.clone(),
		title: candidate.title.clone(),
		artist_credit: candidate.artist_credit.clone(),
		country: candidate.country.clone(),
		date: candidate.date.clone(),
		barcode: candidate.barcode.clone(),
		asin: candidate.asin.clone(),
		mediums: vec![best],
		medium_count: candidate.total_discs(),
	})
}

/// # Candidate Score.
fn candidate_score(c: &ReleaseCandidate) -> usize {
	c.mediums.first().map_or(0, |m| m.isrc_match_count)
}

/// # Medium Score.
///
/// Count the positions where the disc's ISRC appears in the catalog track's
/// ISRC list. Mediums with the wrong number of tracks can't be aligned by
/// position, so always score zero.
fn medium_score(m: &Medium, fp: &DiscFingerprint) -> usize {
	if m.track_count != fp.track_count() { return 0; }
	m.tracks.iter()
		.enumerate()
		.filter(|(idx, t)| fp.isrc(*idx).is_some_and(|isrc|
			t.recording.isrcs.iter().any(|v| v == isrc)
		))
		.count()
}

/// # Image Extension.
///
/// Pull a sane extension from an image URL, defaulting to `jpg`.
fn image_extension(url: &str) -> String {
	url.rsplit('/')
		.next()
		.and_then(|name| name.rsplit_once('.'))
		.map(|(_, ext)| ext.to_ascii_lowercase())
		.filter(|ext| (1..=4).contains(&ext.len()) && ext.bytes().all(|b| b.is_ascii_alphanumeric()))
		.unwrap_or_else(|| "jpg".to_owned())
}
