/*!
# Rip Watch: Library

This crate watches optical drives for audio CDs, looks each disc up on
MusicBrainz, rips it with `cdparanoia`, and encodes tagged FLAC files with
`flac`. Each inserted disc gets its own [`DiscSession`] thread, started and
stopped by the [`Watchdog`], and reporting through a [`StatusSink`].
*/

#![deny(unsafe_code)]

#![warn(
	clippy::filetype_is_file,
	clippy::integer_division,
	clippy::needless_borrow,
	clippy::nursery,
	clippy::pedantic,
	clippy::perf,
	clippy::suboptimal_flops,
	clippy::unneeded_field_pattern,
	macro_use_extern_crate,
	missing_copy_implementations,
	missing_debug_implementations,
	missing_docs,
	non_ascii_idents,
	trivial_casts,
	trivial_numeric_casts,
	unreachable_pub,
	unused_crate_dependencies,
	unused_extern_crates,
	unused_import_braces,
)]

#![allow(
	clippy::doc_markdown,
	clippy::module_name_repetitions,
	clippy::redundant_pub_crate,
)]

mod abort;
mod error;
mod extract;
mod fingerprint;
mod musicbrainz;
mod release;
mod resolver;
mod session;
mod settings;
mod sink;
mod tools;
mod watchdog;

pub use abort::KillSwitch;
pub use error::RipWatchError;
pub use extract::{
	convert_to_final,
	eject,
	parse_progress,
	ProcessHandle,
	ProgressEvent,
	ProgressLines,
	start_extraction,
};
pub use fingerprint::{
	DiscFingerprint,
	DiscIdReader,
	TocReader,
};
pub use musicbrainz::{
	DEFAULT_INCLUDES,
	DiscLookup,
	MetadataService,
	MusicBrainz,
};
pub use release::{
	ArtistCredit,
	CoverImage,
	Medium,
	Recording,
	ReleaseCandidate,
	TrackRecording,
};
pub use resolver::{
	AlbumInfo,
	build_tag_set,
	compute_fingerprint,
	fetch_cover_art,
	filter_and_rank,
	search,
	SearchOutcome,
	selection_rows,
	TrackTags,
	TrackTagSet,
};
pub use session::{
	DiscSession,
	Phase,
	SessionCommand,
	SessionConfig,
	SessionContext,
	SessionControl,
	SessionHandle,
};
pub use settings::Settings;
pub use sink::{
	LogSink,
	StatusSink,
};
pub use tools::{
	DEVICE_PLACEHOLDER,
	ToolCommand,
	Toolchain,
};
pub use watchdog::{
	DeviceEvent,
	DeviceEventKind,
	EventSource,
	POLL_TIMEOUT,
	RawEvent,
	Registry,
	UdevadmMonitor,
	Watchdog,
};
