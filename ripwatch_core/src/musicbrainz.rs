/*!
# Rip Watch: MusicBrainz
*/

use crate::{
	CoverImage,
	ReleaseCandidate,
	RipWatchError,
};
use serde::Deserialize;
use std::{
	io::Read,
	sync::{
		Mutex,
		OnceLock,
	},
	time::{
		Duration,
		Instant,
	},
};
use ureq::{
	Agent,
	AgentBuilder,
};



/// # Connection Agent.
static AGENT: OnceLock<Agent> = OnceLock::new();

/// # Last Request.
static LAST_REQUEST: Mutex<Option<Instant>> = Mutex::new(None);

/// # Cover Art Archive Base.
const CAA_BASE: &str = "https://coverartarchive.org/release";

/// # Web Service Base.
const WS_BASE: &str = "https://musicbrainz.org/ws/2/discid";

/// # Request Spacing.
///
/// MusicBrainz allows one request per second per client.
const RATE_LIMIT: Duration = Duration::from_millis(1000);

/// # Default Lookup Includes.
pub const DEFAULT_INCLUDES: [&str; 3] = ["artists", "recordings", "isrcs"];



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Disc Lookup Result.
///
/// The non-error answers a metadata service can give for a disc ID.
pub enum DiscLookup {
	/// # The disc is known.
	Releases(Vec<ReleaseCandidate>),

	/// # The response carried no disc information.
	NoDiscInfo,

	/// # The service does not know this ID.
	UnknownId,
}



/// # Metadata Service.
///
/// The remote catalog consulted for disc metadata and cover art.
pub trait MetadataService: Send + Sync {
	/// # Look Up Disc.
	///
	/// ## Errors
	///
	/// Anything other than a definitive answer (transport problems, rate
	/// limiting, bad responses) should return
	/// [`RipWatchError::LookupService`].
	fn lookup_disc(&self, disc_id: &str, includes: &[&str])
	-> Result<DiscLookup, RipWatchError>;

	/// # Image List.
	///
	/// Return the cover images for a release, if any.
	fn image_list(&self, release_id: &str) -> Option<Vec<CoverImage>>;

	/// # Download.
	///
	/// Fetch an arbitrary URL, returning the body if non-empty.
	fn download(&self, url: &str) -> Option<Vec<u8>>;
}



#[derive(Debug, Clone, Copy, Default)]
/// # MusicBrainz.
///
/// The production [`MetadataService`], backed by the MusicBrainz web
/// service and the Cover Art Archive.
pub struct MusicBrainz;

impl MetadataService for MusicBrainz {
	fn lookup_disc(&self, disc_id: &str, includes: &[&str])
	-> Result<DiscLookup, RipWatchError> {
		let url = format!("{WS_BASE}/{disc_id}?inc={}&fmt=json", includes.join("+"));
		let (status, body) = fetch(&url)?;
		decode_disc(status, &body)
	}

	fn image_list(&self, release_id: &str) -> Option<Vec<CoverImage>> {
		#[derive(Deserialize)]
		/// # Image List Response.
		struct Raw {
			#[serde(default)]
			/// # Images.
			images: Vec<CoverImage>,
		}

		let (status, body) = fetch(&format!("{CAA_BASE}/{release_id}")).ok()?;
		if status != 200 { return None; }
		serde_json::from_slice::<Raw>(&body).ok().map(|r| r.images)
	}

	fn download(&self, url: &str) -> Option<Vec<u8>> {
		let (status, body) = fetch(url).ok()?;
		if status == 200 && ! body.is_empty() { Some(body) }
		else { None }
	}
}



/// # Connection Agent.
///
/// Storing the agent statically saves a little bit of overhead on reuse,
/// and lets concurrent sessions share connections.
fn agent() -> &'static Agent {
	AGENT.get_or_init(||
		AgentBuilder::new()
			.timeout(Duration::from_secs(15))
			.user_agent(concat!(
				"RipWatch/",
				env!("CARGO_PKG_VERSION"),
				" ( https://musicbrainz.org/doc/MusicBrainz_API )",
			))
			.build()
	)
}

/// # Fetch.
///
/// Make a GET request, returning the status and body for any response the
/// server actually sent. Only transport failures are errors.
fn fetch(url: &str) -> Result<(u16, Vec<u8>), RipWatchError> {
	throttle();

	let res = match agent().get(url).call() {
		Ok(res) | Err(ureq::Error::Status(_, res)) => res,
		Err(ureq::Error::Transport(e)) => return Err(RipWatchError::LookupService(e.to_string())),
	};

	let status = res.status();
	let mut out = Vec::new();
	res.into_reader()
		.read_to_end(&mut out)
		.map_err(|e| RipWatchError::LookupService(e.to_string()))?;
	Ok((status, out))
}

/// # Throttle.
///
/// Sleep as needed to keep requests at least [`RATE_LIMIT`] apart, across
/// all threads.
fn throttle() {
	let Ok(mut last) = LAST_REQUEST.lock() else { return; };
	if let Some(wait) = last.and_then(|t| RATE_LIMIT.checked_sub(t.elapsed())) {
		tracing::debug!("Rate limiting: waiting {wait:?}.");
		std::thread::sleep(wait);
	}
	*last = Some(Instant::now());
}

/// # Decode Disc Response.
///
/// Map an HTTP status and body to a lookup answer. A 404 is the service's
/// way of saying it has never heard of the disc; every other failure is a
/// service error.
fn decode_disc(status: u16, body: &[u8]) -> Result<DiscLookup, RipWatchError> {
	#[derive(Deserialize)]
	/// # Disc Response.
	struct Raw {
		/// # Releases.
		releases: Option<Vec<ReleaseCandidate>>,
	}

	match status {
		200 => {
			let raw: Raw = serde_json::from_slice(body)
				.map_err(|e| RipWatchError::LookupService(format!("undecodable response ({e})")))?;
			Ok(raw.releases.map_or(DiscLookup::NoDiscInfo, |mut releases| {
				for r in &mut releases { r.medium_count = r.mediums.len(); }
				DiscLookup::Releases(releases)
			}))
		},
		404 => Ok(DiscLookup::UnknownId),
		400 => Err(RipWatchError::LookupService("malformed disc ID".to_owned())),
		503 => Err(RipWatchError::LookupService("rate limited".to_owned())),
		_ => Err(RipWatchError::LookupService(format!("HTTP {status}"))),
	}
}



#[cfg(test)]
mod test {
	use super::*;

	/// # Sample Response.
	const SAMPLE: &str = r#"{
		"id": "Wn8eRBtfLDfM0qjYPdxrz.Zjs_U-",
		"sectors": 206535,
		"releases": [
			{
				"id": "rel-1",
				"title": "Some Album",
				"country": null,
				"date": "1999-03-01",
				"barcode": "",
				"asin": null,
				"artist-credit": [{"name": "Somebody", "joinphrase": ""}],
				"media": [
					{
						"format": "CD",
						"position": 2,
						"track-count": 2,
						"tracks": [
							{
								"id": "t-1",
								"number": "1",
								"position": 1,
								"title": "One",
								"recording": {"id": "r-1", "title": "One", "isrcs": ["USSM19900789"]}
							},
							{
								"id": "t-2",
								"number": "2",
								"position": 2,
								"title": "Two",
								"recording": {"id": "r-2", "title": "Two"}
							}
						]
					},
					{"format": null, "position": 1, "track-count": 9}
				]
			}
		]
	}"#;

	#[test]
	fn t_decode_found() {
		let Ok(DiscLookup::Releases(releases)) = decode_disc(200, SAMPLE.as_bytes()) else {
			panic!("Sample response did not decode.");
		};
		assert_eq!(releases.len(), 1, "Wrong release count.");

		let r = &releases[0];
		assert_eq!(r.release_id, "rel-1", "Wrong release ID.");
		assert_eq!(r.artist_credit_phrase(), "Somebody", "Wrong artist.");
		assert_eq!(r.country, None, "Null country should be None.");
		assert_eq!(r.medium_count, 2, "Medium count was not recorded.");
		assert_eq!(r.mediums[0].track_count, 2, "Wrong track count.");
		assert_eq!(r.mediums[0].tracks[0].recording.isrcs, ["USSM19900789"], "Wrong ISRCs.");
		assert!(r.mediums[0].tracks[1].recording.isrcs.is_empty(), "Missing ISRCs should be empty.");
		assert!(r.mediums[1].tracks.is_empty(), "Missing tracks should be empty.");
	}

	#[test]
	fn t_decode_not_catalogued() {
		assert_eq!(
			decode_disc(404, br#"{"error": "Not Found"}"#),
			Ok(DiscLookup::UnknownId),
			"404 should mean unknown ID.",
		);
		assert_eq!(
			decode_disc(200, br#"{"id": "abc", "title": "A CD stub"}"#),
			Ok(DiscLookup::NoDiscInfo),
			"A disc-less response should mean no disc info.",
		);
	}

	#[test]
	fn t_decode_errors() {
		for status in [400, 500, 503] {
			assert!(
				matches!(decode_disc(status, b""), Err(RipWatchError::LookupService(_))),
				"HTTP {status} should be a service error.",
			);
		}
		assert!(
			matches!(decode_disc(200, b"<html>"), Err(RipWatchError::LookupService(_))),
			"Garbage should be a service error.",
		);
	}
}
