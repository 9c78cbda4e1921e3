/*!
# Rip Watch: Disc Session
*/

use crate::{
	build_tag_set,
	compute_fingerprint,
	convert_to_final,
	DEFAULT_INCLUDES,
	DiscFingerprint,
	eject,
	fetch_cover_art,
	filter_and_rank,
	KillSwitch,
	MetadataService,
	parse_progress,
	ProcessHandle,
	ProgressEvent,
	ReleaseCandidate,
	RipWatchError,
	search,
	SearchOutcome,
	selection_rows,
	start_extraction,
	StatusSink,
	TocReader,
	Toolchain,
};
use std::{
	fmt,
	path::{
		Path,
		PathBuf,
	},
	sync::{
		Arc,
		mpsc::{
			self,
			Receiver,
			RecvTimeoutError,
			Sender,
		},
		Mutex,
	},
	thread::JoinHandle,
	time::{
		Duration,
		Instant,
	},
};
use tempfile::TempDir;



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Session Phase.
pub enum Phase {
	/// # Fingerprinting and searching.
	LookingUp,

	/// # Waiting for the user to pick a release.
	AwaitingSelection,

	/// # Waiting for the user to submit the disc.
	SubmitPending,

	/// # Ripping and encoding.
	Extracting,

	/// # Cleaning up.
	Finalizing,

	/// # Finished.
	Done,

	/// # Cancelled.
	Cancelled,

	/// # Failed.
	Failed,
}

impl fmt::Display for Phase {
	#[inline]
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Phase {
	#[must_use]
	/// # As Str.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::LookingUp => "Looking up",
			Self::AwaitingSelection => "Awaiting selection",
			Self::SubmitPending => "Awaiting submission",
			Self::Extracting => "Extracting",
			Self::Finalizing => "Finalizing",
			Self::Done => "Done",
			Self::Cancelled => "Cancelled",
			Self::Failed => "Failed",
		}
	}

	#[must_use]
	/// # Terminal?
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Done | Self::Cancelled | Self::Failed)
	}
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Session Command.
///
/// User decisions delivered to a waiting session.
pub enum SessionCommand {
	/// # Use Row N.
	Select(usize),

	/// # Stop the Countdown.
	Hold,

	/// # Skip the Disc.
	Ignore,

	/// # The Disc Was Submitted; Look It Up Again.
	Submitted,

	/// # Cancel.
	///
	/// This is equivalent to [`SessionHandle::cancel`].
	Cancel,
}



#[derive(Debug, Clone)]
/// # Session Configuration.
pub struct SessionConfig {
	/// # Output Root.
	pub out_dir: PathBuf,

	/// # Selection Countdown.
	pub countdown: Duration,

	/// # Submission Timeout.
	pub submission_timeout: Duration,

	/// # External Programs.
	pub tools: Toolchain,
}

#[derive(Clone)]
/// # Session Context.
///
/// The collaborators every session shares.
pub struct SessionContext {
	/// # TOC Reader.
	pub reader: Arc<dyn TocReader>,

	/// # Metadata Service.
	pub service: Arc<dyn MetadataService>,

	/// # Status Sink.
	pub sink: Arc<dyn StatusSink>,

	/// # Configuration.
	pub config: Arc<SessionConfig>,
}

impl fmt::Debug for SessionContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionContext")
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}



#[derive(Debug)]
/// # Session Control.
///
/// The state shared between a session thread and its handle: the cancel
/// flag, the current phase, and whatever process is running.
///
/// Cancelling sets the flag before killing the stored process; attaching a
/// process stores it before checking the flag, under the same lock. Either
/// way, a process started around the time of a cancel gets killed.
pub struct SessionControl {
	/// # Cancelled.
	cancelled: KillSwitch,

	/// # Phase.
	phase: Mutex<Phase>,

	/// # Running Process.
	process: Mutex<Option<ProcessHandle>>,
}

impl Default for SessionControl {
	fn default() -> Self {
		Self {
			cancelled: KillSwitch::new(),
			phase: Mutex::new(Phase::LookingUp),
			process: Mutex::new(None),
		}
	}
}

impl SessionControl {
	/// # Cancel.
	///
	/// Flag the session and kill its process, if any. Only the first call
	/// does anything; it returns `true`.
	pub fn cancel(&self) -> bool {
		if ! self.cancelled.kill() { return false; }
		if let Ok(mut guard) = self.process.lock() {
			if let Some(handle) = guard.as_mut() { handle.kill(); }
		}
		true
	}

	#[must_use]
	/// # Cancelled?
	pub fn cancelled(&self) -> bool { self.cancelled.killed() }

	#[must_use]
	/// # Phase.
	pub fn phase(&self) -> Phase {
		self.phase.lock().map_or(Phase::Failed, |p| *p)
	}

	/// # Set Phase.
	fn set_phase(&self, phase: Phase) {
		if let Ok(mut p) = self.phase.lock() { *p = phase; }
	}

	/// # Attach Process.
	pub(crate) fn attach(&self, mut handle: ProcessHandle) {
		if let Ok(mut guard) = self.process.lock() {
			if self.cancelled() { handle.kill(); }
			guard.replace(handle);
		}
		else { handle.kill(); }
	}

	/// # Detach Process.
	pub(crate) fn detach(&self) -> Option<ProcessHandle> {
		self.process.lock().ok()?.take()
	}
}



/// # Session Handle.
///
/// The watchdog's end of a running session.
pub struct SessionHandle {
	/// # Device.
	device: PathBuf,

	/// # Shared Control.
	control: Arc<SessionControl>,

	/// # Command Sender.
	tx: Sender<SessionCommand>,

	/// # Status Sink.
	sink: Arc<dyn StatusSink>,

	/// # Thread.
	thread: JoinHandle<Phase>,
}

impl fmt::Debug for SessionHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionHandle")
			.field("device", &self.device)
			.field("phase", &self.phase())
			.finish_non_exhaustive()
	}
}

impl SessionHandle {
	/// # Cancel.
	///
	/// Request cancellation. This only has an effect the first time, and
	/// never once the session has finished. Returns `true` if it did
	/// anything.
	pub fn cancel(&self) -> bool {
		if self.phase().is_terminal() || ! self.control.cancel() { return false; }
		self.sink.on_cancel_requested(&self.device);

		// Wake the session if it is waiting on the user.
		let _res = self.tx.send(SessionCommand::Cancel);
		true
	}

	#[must_use]
	/// # Device.
	pub fn device(&self) -> &Path { &self.device }

	#[must_use]
	/// # Finished?
	pub fn is_finished(&self) -> bool { self.thread.is_finished() }

	#[must_use]
	/// # Join.
	///
	/// Wait for the session to end and return its final phase.
	pub fn join(self) -> Phase { self.thread.join().unwrap_or(Phase::Failed) }

	#[must_use]
	/// # Phase.
	pub fn phase(&self) -> Phase { self.control.phase() }

	/// # Send Command.
	///
	/// Returns `false` if the session is no longer listening.
	pub fn send(&self, cmd: SessionCommand) -> bool {
		if matches!(cmd, SessionCommand::Cancel) { self.cancel() }
		else { self.tx.send(cmd).is_ok() }
	}
}



/// # Disc Session.
///
/// The state machine that walks one disc from insertion to ejection:
/// lookup, optional selection or submission, extraction, then cleanup.
pub struct DiscSession {
	/// # Device.
	device: PathBuf,

	/// # Collaborators.
	ctx: SessionContext,

	/// # Shared Control.
	control: Arc<SessionControl>,

	/// # Commands.
	rx: Receiver<SessionCommand>,

	/// # Scratch Directory.
	scratch: Option<TempDir>,
}

impl fmt::Debug for DiscSession {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DiscSession")
			.field("device", &self.device)
			.field("scratch", &self.scratch)
			.finish_non_exhaustive()
	}
}

impl DiscSession {
	/// # Spawn.
	///
	/// Start a session for the device on its own thread.
	///
	/// ## Errors
	///
	/// This will return an error if the thread cannot be spawned.
	pub fn spawn(device: PathBuf, ctx: SessionContext) -> Result<SessionHandle, RipWatchError> {
		let control = Arc::new(SessionControl::default());
		let (tx, rx) = mpsc::channel();
		let sink = Arc::clone(&ctx.sink);
		let session = Self {
			device: device.clone(),
			ctx,
			control: Arc::clone(&control),
			rx,
			scratch: None,
		};

		let thread = std::thread::Builder::new()
			.name(format!("ripwatch {}", device.display()))
			.spawn(move || session.run())
			.map_err(|_| RipWatchError::Bug("unable to spawn session thread"))?;

		Ok(SessionHandle {
			device,
			control,
			tx,
			sink,
			thread,
		})
	}

	/// # Run.
	fn run(mut self) -> Phase {
		let res = self.pipeline();
		self.finish(res)
	}

	/// # Pipeline.
	///
	/// Everything up to (but not including) cleanup. Cancellation surfaces
	/// as [`RipWatchError::Killed`].
	fn pipeline(&mut self) -> Result<Phase, RipWatchError> {
		loop {
			self.enter(Phase::LookingUp)?;
			let fp = compute_fingerprint(self.ctx.reader.as_ref(), &self.device)?;
			let outcome = search(self.ctx.service.as_ref(), &fp, &DEFAULT_INCLUDES);
			self.check()?;

			match outcome {
				SearchOutcome::Found(candidates) => {
					return match self.choose(&candidates, &fp)? {
						Some(release) => self.extract(&release, &fp),
						None => Ok(Phase::Cancelled),
					};
				},
				SearchOutcome::NotCatalogued(url) => {
					self.enter(Phase::SubmitPending)?;
					self.ctx.sink.on_submission_needed(&self.device, &url);
					if ! self.await_submission()? { return Ok(Phase::Cancelled); }
					tracing::info!("{} - Retrying lookup.", self.device.display());
				},
				SearchOutcome::ServiceError(e) => return Err(e),
			}
		}
	}

	/// # Choose Release.
	///
	/// A single matching row is used straight away. Otherwise the user gets
	/// a countdown to pick one. `None` means the user chose to ignore the
	/// disc.
	fn choose(&self, candidates: &[ReleaseCandidate], fp: &DiscFingerprint)
	-> Result<Option<ReleaseCandidate>, RipWatchError> {
		let mut rows = selection_rows(candidates, fp);
		if rows.len() < 2 {
			return rows.pop().map(Some).ok_or(RipWatchError::NoCandidates);
		}

		let recommended = filter_and_rank(candidates, fp)
			.and_then(|best| rows.iter().position(|r| *r == best))
			.unwrap_or(0);

		self.enter(Phase::AwaitingSelection)?;
		self.ctx.sink.on_selection_needed(
			&self.device,
			&rows,
			recommended,
			self.ctx.config.countdown,
		);

		Ok(self.await_selection(rows.len())?.map(|idx| rows.swap_remove(idx)))
	}

	/// # Await Selection.
	///
	/// Wait for a row number, falling back to the first row when the
	/// countdown runs out. A hold stops the countdown entirely.
	fn await_selection(&self, len: usize) -> Result<Option<usize>, RipWatchError> {
		let deadline = Instant::now() + self.ctx.config.countdown;
		let mut held = false;
		loop {
			self.check()?;
			let cmd =
				if held { self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected) }
				else { self.rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) };

			match cmd {
				Ok(SessionCommand::Select(idx)) if idx < len => return Ok(Some(idx)),
				Ok(SessionCommand::Select(idx)) => {
					tracing::warn!("{} - There is no release #{idx}.", self.device.display());
				},
				Ok(SessionCommand::Hold) => {
					held = true;
					tracing::info!("{} - Countdown stopped.", self.device.display());
				},
				Ok(SessionCommand::Ignore) => return Ok(None),
				Ok(SessionCommand::Cancel) => return Err(RipWatchError::Killed),
				Ok(SessionCommand::Submitted) => {},
				Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
					tracing::info!("{} - No selection made; using the first release.", self.device.display());
					return Ok(Some(0));
				},
			}
		}
	}

	/// # Await Submission.
	///
	/// Wait for the user to say the disc has been submitted (`true`) or
	/// should be ignored (`false`). Giving up after the timeout counts as
	/// the latter.
	fn await_submission(&self) -> Result<bool, RipWatchError> {
		let deadline = Instant::now() + self.ctx.config.submission_timeout;
		loop {
			self.check()?;
			match self.rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
				Ok(SessionCommand::Submitted) => return Ok(true),
				Ok(SessionCommand::Ignore) => return Ok(false),
				Ok(SessionCommand::Cancel) => return Err(RipWatchError::Killed),
				Ok(SessionCommand::Select(_) | SessionCommand::Hold) => {},
				Err(RecvTimeoutError::Timeout) => {
					tracing::warn!("{} - Gave up waiting for a submission.", self.device.display());
					return Ok(false);
				},
				Err(RecvTimeoutError::Disconnected) => return Ok(false),
			}
		}
	}

	/// # Extract.
	///
	/// Rip the disc into a fresh scratch directory, then encode the results
	/// if the ripper succeeded. A failed rip still ends in [`Phase::Done`];
	/// there's just nothing to show for it. A cancellation at any point,
	/// encoding included, ends in [`Phase::Cancelled`].
	fn extract(&mut self, release: &ReleaseCandidate, fp: &DiscFingerprint)
	-> Result<Phase, RipWatchError> {
		let mut tags = build_tag_set(release, fp);
		if tags.is_empty() { return Err(RipWatchError::EmptyTagSet); }

		self.enter(Phase::Extracting)?;
		let scratch = tempfile::Builder::new()
			.prefix("ripwatch-")
			.tempdir()
			.map_err(|_| RipWatchError::ScratchDir)?;
		let dir = scratch.path().to_path_buf();
		self.scratch = Some(scratch);

		tags.set_cover_art(fetch_cover_art(self.ctx.service.as_ref(), release, &dir));
		self.ctx.sink.on_disc_added(&self.device, &tags);

		let (handle, lines) = start_extraction(&self.ctx.config.tools, &self.device, &dir)?;
		self.control.attach(handle);
		for line in lines {
			match parse_progress(&line) {
				Some(ProgressEvent::TrackChanged(n)) => self.ctx.sink.on_track_changed(&self.device, n),
				Some(ProgressEvent::Progress(p)) => self.ctx.sink.on_track_progress(&self.device, p),
				None => {},
			}
		}

		let status = self.control.detach().map(|mut h| h.wait());
		self.check()?;

		match status {
			Some(Ok(s)) if s.success() => {
				let config = &self.ctx.config;
				if ! convert_to_final(&config.tools, &dir, &config.out_dir, &tags, &self.control)? {
					tracing::warn!("{} - Some tracks were not saved.", self.device.display());
				}
				self.check()?;
			},
			Some(Ok(s)) => {
				tracing::error!("{} - The ripper failed ({s}); skipping conversion.", self.device.display());
			},
			Some(Err(e)) => {
				tracing::error!("{} - Lost track of the ripper ({e}); skipping conversion.", self.device.display());
			},
			None => return Err(RipWatchError::Bug("the ripper handle went missing")),
		}

		Ok(Phase::Done)
	}

	/// # Finish.
	///
	/// Clean up after the pipeline, whatever happened: kill any straggling
	/// process, delete the scratch directory, and eject the disc.
	fn finish(&mut self, res: Result<Phase, RipWatchError>) -> Phase {
		let phase = match res {
			Ok(phase) => phase,
			Err(RipWatchError::Killed) => Phase::Cancelled,
			Err(e) => {
				self.ctx.sink.on_failure(&self.device, &e);
				Phase::Failed
			},
		};

		if phase == Phase::Done {
			self.control.set_phase(Phase::Finalizing);
			self.ctx.sink.on_phase_changed(&self.device, Phase::Finalizing);
		}

		if let Some(mut handle) = self.control.detach() {
			handle.kill();
			let _res = handle.wait();
		}

		if let Some(scratch) = self.scratch.take() {
			let path = scratch.path().to_path_buf();
			if let Err(e) = scratch.close() {
				tracing::warn!("{} - Unable to remove {}: {e}", self.device.display(), path.display());
			}
		}

		eject(&self.ctx.config.tools, &self.device);

		self.control.set_phase(phase);
		self.ctx.sink.on_phase_changed(&self.device, phase);
		self.ctx.sink.on_disc_removed(&self.device);
		phase
	}

	/// # Enter Phase.
	fn enter(&self, phase: Phase) -> Result<(), RipWatchError> {
		self.check()?;
		self.control.set_phase(phase);
		self.ctx.sink.on_phase_changed(&self.device, phase);
		Ok(())
	}

	/// # Check for Cancellation.
	fn check(&self) -> Result<(), RipWatchError> {
		if self.control.cancelled() { Err(RipWatchError::Killed) }
		else { Ok(()) }
	}
}
