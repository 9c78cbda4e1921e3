/*!
# Rip Watch: Extraction and Encoding
*/

use crate::{
	RipWatchError,
	SessionControl,
	Toolchain,
	TrackTagSet,
};
use regex::Regex;
use std::{
	ffi::OsStr,
	io::{
		BufRead,
		BufReader,
		ErrorKind,
		Read,
	},
	path::{
		Path,
		PathBuf,
	},
	process::{
		Child,
		ChildStderr,
		ExitStatus,
		Stdio,
	},
	sync::OnceLock,
};



/// # Encoded File Extension.
const OUTPUT_EXT: &str = "flac";

/// # Unknown Album.
const UNKNOWN_ALBUM: &str = "Unknown Album";

/// # Unknown Artist.
const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// # Unknown Title.
const UNKNOWN_TITLE: &str = "Unknown Title";



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Progress Event.
pub enum ProgressEvent {
	/// # The ripper moved on to a new track.
	TrackChanged(u32),

	/// # Current track completion (0-100).
	Progress(u8),
}



#[derive(Debug)]
/// # Process Handle.
///
/// A running rip. The output side lives separately in a [`ProgressLines`],
/// so the handle can be killed from another thread while the stream is
/// being read.
pub struct ProcessHandle {
	/// # Child.
	child: Child,
}

impl ProcessHandle {
	/// # Kill.
	///
	/// Forcibly terminate the process. Killing an already-finished process
	/// is not an error.
	pub fn kill(&mut self) {
		if let Err(e) = self.child.kill() {
			if e.kind() != ErrorKind::InvalidInput {
				tracing::warn!("Unable to kill process {}: {e}", self.child.id());
			}
		}
	}

	/// # Wait.
	///
	/// Wait for the process to exit, reaping it.
	///
	/// ## Errors
	///
	/// This passes through any OS error.
	pub fn wait(&mut self) -> std::io::Result<ExitStatus> { self.child.wait() }
}



#[derive(Debug)]
/// # Progress Lines.
///
/// Split a stream into lines on either `\n` or `\r`, since progress bars
/// redraw themselves with carriage returns. Empty lines are skipped.
pub struct ProgressLines<R: Read>(BufReader<R>);

impl<R: Read> ProgressLines<R> {
	/// # New.
	pub fn new(src: R) -> Self { Self(BufReader::new(src)) }
}

impl<R: Read> Iterator for ProgressLines<R> {
	type Item = String;

	fn next(&mut self) -> Option<Self::Item> {
		let mut line = Vec::new();
		loop {
			let buf: &[u8] = match self.0.fill_buf() {
				Ok(buf) => buf,
				Err(e) if e.kind() == ErrorKind::Interrupted => continue,
				Err(_) => &[],
			};

			// EOF.
			if buf.is_empty() {
				return
					if line.is_empty() { None }
					else { Some(String::from_utf8_lossy(&line).into_owned()) };
			}

			if let Some(pos) = buf.iter().position(|b| matches!(b, b'\n' | b'\r')) {
				line.extend_from_slice(&buf[..pos]);
				self.0.consume(pos + 1);
				if ! line.is_empty() {
					return Some(String::from_utf8_lossy(&line).into_owned());
				}
			}
			else {
				let len = buf.len();
				line.extend_from_slice(buf);
				self.0.consume(len);
			}
		}
	}
}



/// # Start Extraction.
///
/// Launch the ripper against the device, writing into `working_dir`. Its
/// progress is read from STDERR.
///
/// ## Errors
///
/// If the program cannot be started, [`RipWatchError::SubprocessLaunch`] is
/// returned.
pub fn start_extraction(tools: &Toolchain, device: &Path, working_dir: &Path)
-> Result<(ProcessHandle, ProgressLines<ChildStderr>), RipWatchError> {
	let mut child = tools.rip.command(device)
		.current_dir(working_dir)
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::piped())
		.spawn()
		.map_err(|e| RipWatchError::SubprocessLaunch(format!("{} ({e})", tools.rip.program)))?;

	let Some(stderr) = child.stderr.take() else {
		let _res = child.kill();
		let _res = child.wait();
		return Err(RipWatchError::Bug("ripper STDERR was not captured"));
	};

	Ok((ProcessHandle { child }, ProgressLines::new(stderr)))
}

/// # Parse Progress.
///
/// Recognize the ripper's "outputting to …trackNN…" and
/// "== PROGRESS == [ … |" lines. Everything else is ignored.
///
/// The completion value is the offset of the first non-blank character in
/// the bracketed span relative to the span's length, as a rounded
/// percentage.
pub fn parse_progress(line: &str) -> Option<ProgressEvent> {
	/// # Track Pattern.
	static TRACK: OnceLock<Option<Regex>> = OnceLock::new();

	/// # Progress Pattern.
	static PROGRESS: OnceLock<Option<Regex>> = OnceLock::new();

	let re_track = TRACK.get_or_init(|| Regex::new(r"outputting to .*?track(\d+)").ok()).as_ref()?;
	if let Some(caps) = re_track.captures(line) {
		return caps[1].parse().ok().map(ProgressEvent::TrackChanged);
	}

	let re_progress = PROGRESS.get_or_init(|| Regex::new(r"== PROGRESS == \[([^|]*)\|").ok()).as_ref()?;
	let caps = re_progress.captures(line)?;
	let span: Vec<char> = caps[1].chars().collect();
	let pos = span.iter().position(|c| ! c.is_whitespace())?;

	#[expect(clippy::cast_precision_loss, reason = "Spans are short.")]
	#[expect(clippy::cast_possible_truncation, reason = "Value is 0..=100.")]
	#[expect(clippy::cast_sign_loss, reason = "Value is positive.")]
	let pct = (pos as f64 / span.len() as f64 * 100.0).round() as u8;
	Some(ProgressEvent::Progress(pct))
}

/// # Convert to Final.
///
/// Encode every raw track in `working_dir` into
/// `out_dir/<albumartist>/<album>/`, tagging each along the way, then move
/// the cover art (if any) alongside them.
///
/// Raw files without a matching tag entry are deleted. Individual encoding
/// failures are logged and skipped.
///
/// Each encoder is attached to `control` while it runs, so a cancellation
/// kills it outright; no further tracks are started after that.
///
/// Returns `true` if every raw file was encoded.
///
/// ## Errors
///
/// If the session is cancelled, [`RipWatchError::Killed`] is returned. The
/// interrupted track's output is removed.
pub fn convert_to_final(
	tools: &Toolchain,
	working_dir: &Path,
	out_dir: &Path,
	tags: &TrackTagSet,
	control: &SessionControl,
) -> Result<bool, RipWatchError> {
	let dst_dir = album_dir(out_dir, tags);
	if let Err(e) = std::fs::create_dir_all(&dst_dir) {
		tracing::error!("{}: {e}", RipWatchError::Write(dst_dir.to_string_lossy().into_owned()));
		return Ok(false);
	}

	let prefix = disc_prefix(tags);
	let mut ok = true;
	for (num, src) in raw_files(working_dir) {
		if control.cancelled() { return Err(RipWatchError::Killed); }

		let Some(track) = tags.get(num) else {
			tracing::error!("No metadata for {}; deleting it.", src.display());
			if let Err(e) = std::fs::remove_file(&src) {
				tracing::error!("Unable to delete {}: {e}", src.display());
			}
			ok = false;
			continue;
		};

		let dst = dst_dir.join(format!(
			"{prefix}{:02} - {}.{OUTPUT_EXT}",
			track.tracknumber,
			sanitize(&track.title, UNKNOWN_TITLE),
		));
		if ! encode_track(tools, &src, &dst, tags, num, control) { ok = false; }
	}

	if control.cancelled() { return Err(RipWatchError::Killed); }

	if let Some(cover) = tags.cover_art() {
		let ext = cover.extension().and_then(OsStr::to_str).unwrap_or("jpg");
		let dst = dst_dir.join(format!("{prefix}coverart.{ext}"));
		if let Err(e) = move_file(cover, &dst) {
			tracing::warn!("Unable to move cover art to {}: {e}", dst.display());
		}
	}

	Ok(ok)
}

/// # Eject.
///
/// Pop the tray. This is best-effort; failures are logged and reported as
/// `false`.
pub fn eject(tools: &Toolchain, device: &Path) -> bool {
	match tools.eject.command(device).stdin(Stdio::null()).output() {
		Ok(out) if out.status.success() => true,
		Ok(out) => {
			tracing::warn!(
				"{} - Eject failed: {}",
				device.display(),
				String::from_utf8_lossy(&out.stderr).trim(),
			);
			false
		},
		Err(e) => {
			tracing::warn!("{} - Unable to run {}: {e}", device.display(), tools.eject.program);
			false
		},
	}
}



/// # Album Directory.
fn album_dir(out_dir: &Path, tags: &TrackTagSet) -> PathBuf {
	let album = tags.album();
	out_dir
		.join(sanitize(&album.albumartist, UNKNOWN_ARTIST))
		.join(sanitize(&album.album, UNKNOWN_ALBUM))
}

/// # Disc Prefix.
///
/// Multi-disc releases get a `D-` prefix on their file names so discs can
/// share a directory.
fn disc_prefix(tags: &TrackTagSet) -> String {
	if tags.multi_disc() { format!("{}-", tags.album().discnumber) }
	else { String::new() }
}

/// # Encode Track.
///
/// Run the encoder for one track, with the process parked in `control` so
/// it can be killed mid-flight.
fn encode_track(
	tools: &Toolchain,
	src: &Path,
	dst: &Path,
	tags: &TrackTagSet,
	num: u32,
	control: &SessionControl,
) -> bool {
	let mut cmd = tools.encode.plain();
	if let Some(cover) = tags.cover_art() {
		cmd.arg(format!("--picture={}", cover.display()));
	}
	for (k, v) in tags.vorbis_tags(num) {
		cmd.arg(format!("--tag={k}={v}"));
	}
	cmd.arg(format!("--output-name={}", dst.display())).arg(src);

	let mut child = match cmd
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::piped())
		.spawn()
	{
		Ok(child) => child,
		Err(e) => {
			tracing::error!("Track {num:02} failed to encode: {e}");
			return false;
		},
	};

	// Drain STDERR while the process runs; a kill closes it.
	let stderr = child.stderr.take();
	control.attach(ProcessHandle { child });
	let mut err = Vec::new();
	if let Some(mut stderr) = stderr {
		let _res = stderr.read_to_end(&mut err);
	}
	let status = control.detach().map(|mut h| h.wait());

	if control.cancelled() {
		if dst.exists() && std::fs::remove_file(dst).is_err() {
			tracing::warn!("Unable to remove partial {}.", dst.display());
		}
		return false;
	}

	match status {
		Some(Ok(s)) if s.success() && dst.is_file() => {
			tracing::debug!("Encoded {}.", dst.display());
			true
		},
		Some(Ok(_)) => {
			tracing::error!(
				"Track {num:02} failed to encode: {}",
				String::from_utf8_lossy(&err).trim(),
			);
			false
		},
		Some(Err(e)) => {
			tracing::error!("Track {num:02} failed to encode: {e}");
			false
		},
		None => {
			tracing::error!("Track {num:02} failed to encode: the process went missing.");
			false
		},
	}
}

/// # Move File.
///
/// Rename, falling back to copy-and-delete when crossing filesystems.
fn move_file(src: &Path, dst: &Path) -> std::io::Result<()> {
	if std::fs::rename(src, dst).is_ok() { return Ok(()); }
	std::fs::copy(src, dst)?;
	std::fs::remove_file(src)
}

/// # Raw Files.
///
/// Return the `*.wav` files in `dir` whose names contain `track<N>`, sorted
/// by track number.
fn raw_files(dir: &Path) -> Vec<(u32, PathBuf)> {
	/// # Track Pattern.
	static TRACK: OnceLock<Option<Regex>> = OnceLock::new();

	let Some(re) = TRACK.get_or_init(|| Regex::new(r"track(\d+)").ok()).as_ref() else {
		return Vec::new();
	};
	let Ok(entries) = std::fs::read_dir(dir) else { return Vec::new(); };

	let mut out: Vec<(u32, PathBuf)> = entries
		.filter_map(|e| {
			let path = e.ok()?.path();
			if path.extension() != Some(OsStr::new("wav")) || ! path.is_file() { return None; }
			let name = path.file_name()?.to_str()?;
			let num = re.captures(name)?[1].parse().ok()?;
			Some((num, path))
		})
		.collect();
	out.sort_unstable();
	out
}

/// # Sanitize Path Segment.
///
/// Swap path separators (and NULs) for underscores so each value stays a
/// single segment. Blank or dot-only values get the fallback.
fn sanitize(src: &str, fallback: &str) -> String {
	let out: String = src.trim()
		.chars()
		.map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
		.collect();
	if out.is_empty() || out.chars().all(|c| c == '.') { fallback.to_owned() }
	else { out }
}
