/*!
# Rip Watch: Device Watchdog
*/

use crate::{
	DiscSession,
	KillSwitch,
	Phase,
	RipWatchError,
	SessionCommand,
	SessionContext,
	SessionHandle,
};
use std::{
	collections::BTreeMap,
	io::{
		BufRead,
		BufReader,
	},
	path::{
		Path,
		PathBuf,
	},
	process::{
		Child,
		Command,
		Stdio,
	},
	sync::{
		Arc,
		mpsc::{
			self,
			Receiver,
			RecvTimeoutError,
		},
		Mutex,
		MutexGuard,
		PoisonError,
	},
	thread::JoinHandle,
	time::Duration,
};



/// # Poll Timeout.
///
/// This bounds how long shutdown can take to notice.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// # Device Path Property.
const KEY_DEVNAME: &str = "DEVNAME";

/// # Optical Drive Property.
const KEY_CDROM: &str = "ID_CDROM";

/// # Eject Request Property.
const KEY_EJECT: &str = "DISK_EJECT_REQUEST";

/// # Drive Ready Property.
const KEY_READY: &str = "SYSTEMD_READY";

/// # Media Change Property.
const KEY_CHANGE: &str = "DISK_MEDIA_CHANGE";

/// # Media State Property.
const KEY_STATE: &str = "ID_CDROM_MEDIA_STATE";



#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # Raw Device Event.
///
/// The `KEY=VALUE` properties of a single device notification.
pub struct RawEvent(BTreeMap<String, String>);

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawEvent {
	fn from_iter<I: IntoIterator<Item=(K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}

impl RawEvent {
	#[must_use]
	/// # Get Property.
	pub fn get(&self, key: &str) -> Option<&str> { self.0.get(key).map(String::as_str) }

	/// # Insert Property.
	pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
		self.0.insert(key.into(), value.into());
	}

	#[must_use]
	/// # Is Empty?
	pub fn is_empty(&self) -> bool { self.0.is_empty() }

	/// # Non-Empty Property.
	fn has(&self, key: &str) -> bool { self.get(key).is_some_and(|v| ! v.is_empty()) }

	/// # Property Equals.
	fn is(&self, key: &str, value: &str) -> bool { self.get(key) == Some(value) }
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Device Event Kind.
pub enum DeviceEventKind {
	/// # A Disc Was Inserted.
	Insert,

	/// # Eject Requested.
	EjectRequest,

	/// # The Drive Is Now Empty.
	Ejected,

	/// # Anything Else.
	Other,
}

#[derive(Debug, Clone, Eq, PartialEq)]
/// # Device Event.
///
/// A raw event that concerns an optical drive, with its meaning worked out.
pub struct DeviceEvent {
	/// # Device Path.
	pub device_path: PathBuf,

	/// # Kind.
	pub kind: DeviceEventKind,

	/// # Raw Properties.
	pub properties: RawEvent,
}

impl DeviceEvent {
	#[must_use]
	/// # Classify.
	///
	/// Return `None` for events without a device path or for devices that
	/// aren't optical drives.
	///
	/// A media change only counts as an insert if there's no media state
	/// attached; that property shows up on unrelated status transitions.
	pub fn classify(raw: RawEvent) -> Option<Self> {
		let device_path = PathBuf::from(raw.get(KEY_DEVNAME).filter(|v| ! v.is_empty())?);
		if ! raw.is(KEY_CDROM, "1") { return None; }

		let kind =
			if raw.has(KEY_EJECT) { DeviceEventKind::EjectRequest }
			else if raw.is(KEY_READY, "0") { DeviceEventKind::Ejected }
			else if raw.is(KEY_CHANGE, "1") && ! raw.has(KEY_STATE) { DeviceEventKind::Insert }
			else { DeviceEventKind::Other };

		Some(Self { device_path, kind, properties: raw })
	}
}



/// # Event Source.
///
/// Anything that can hand out device events one at a time.
pub trait EventSource: Send {
	/// # Poll.
	///
	/// Wait up to `timeout` for the next event. `Ok(None)` means nothing
	/// happened in time.
	///
	/// ## Errors
	///
	/// An error means the source is dead and no more events will arrive.
	fn poll(&mut self, timeout: Duration) -> Result<Option<RawEvent>, RipWatchError>;
}

#[derive(Debug)]
/// # Udevadm Monitor.
///
/// An [`EventSource`] backed by `udevadm monitor`, whose property blocks
/// are parsed on a reader thread.
pub struct UdevadmMonitor {
	/// # Child Process.
	child: Child,

	/// # Parsed Events.
	rx: Receiver<RawEvent>,

	/// # Reader Thread.
	reader: Option<JoinHandle<()>>,
}

impl Drop for UdevadmMonitor {
	fn drop(&mut self) {
		let _res = self.child.kill();
		let _res = self.child.wait();
		if let Some(reader) = self.reader.take() { let _res = reader.join(); }
	}
}

impl EventSource for UdevadmMonitor {
	fn poll(&mut self, timeout: Duration) -> Result<Option<RawEvent>, RipWatchError> {
		match self.rx.recv_timeout(timeout) {
			Ok(raw) => Ok(Some(raw)),
			Err(RecvTimeoutError::Timeout) => Ok(None),
			Err(RecvTimeoutError::Disconnected) =>
				Err(RipWatchError::EventSource("the monitor exited".to_owned())),
		}
	}
}

impl UdevadmMonitor {
	/// # New.
	///
	/// Watch block devices with `udevadm`.
	///
	/// ## Errors
	///
	/// This will return an error if `udevadm` cannot be started.
	pub fn new() -> Result<Self, RipWatchError> {
		let mut cmd = Command::new("udevadm");
		cmd.args(["monitor", "--udev", "--property", "--subsystem-match=block"]);
		Self::from_command(cmd)
	}

	/// # From Command.
	///
	/// Run an arbitrary command that prints `udevadm`-style property blocks.
	///
	/// ## Errors
	///
	/// This will return an error if the command cannot be started.
	pub fn from_command(mut cmd: Command) -> Result<Self, RipWatchError> {
		let mut child = cmd
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::null())
			.spawn()
			.map_err(|e| RipWatchError::EventSource(format!("{}: {e}", cmd.get_program().to_string_lossy())))?;

		let (tx, rx) = mpsc::channel();
		let reader = child.stdout.take().and_then(|stdout|
			std::thread::Builder::new()
				.name("ripwatch udev".to_owned())
				.spawn(move || read_blocks(BufReader::new(stdout), |raw| tx.send(raw).is_ok()))
				.ok()
		);

		if reader.is_none() {
			let _res = child.kill();
			let _res = child.wait();
			return Err(RipWatchError::EventSource("unable to read the monitor".to_owned()));
		}

		Ok(Self { child, rx, reader })
	}
}



#[derive(Debug, Default)]
/// # Registry Contents.
struct RegistryInner {
	/// # Live Sessions, by Device.
	live: BTreeMap<PathBuf, SessionHandle>,

	/// # Removed Sessions Still Winding Down.
	retired: Vec<SessionHandle>,
}

#[derive(Debug, Clone, Default)]
/// # Session Registry.
///
/// Every session the watchdog knows about, keyed by device. All changes go
/// through one lock. Clones share the same registry, so the console can
/// reach sessions the watchdog started.
pub struct Registry(Arc<Mutex<RegistryInner>>);

impl Registry {
	/// # Lock.
	fn lock(&self) -> MutexGuard<'_, RegistryInner> {
		self.0.lock().unwrap_or_else(PoisonError::into_inner)
	}

	#[must_use]
	/// # Is Empty?
	///
	/// True once there are no live or retired sessions left.
	pub fn is_empty(&self) -> bool {
		let inner = self.lock();
		inner.live.is_empty() && inner.retired.is_empty()
	}

	/// # Reap.
	///
	/// Join and drop any session whose thread has finished.
	pub fn reap(&self) {
		let mut inner = self.lock();

		let done: Vec<PathBuf> = inner.live.iter()
			.filter_map(|(k, v)| v.is_finished().then(|| k.clone()))
			.collect();
		for dev in done {
			if let Some(handle) = inner.live.remove(&dev) {
				let phase = handle.join();
				tracing::debug!("{} - Session ended ({phase}).", dev.display());
			}
		}

		let (done, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.retired)
			.into_iter()
			.partition(SessionHandle::is_finished);
		inner.retired = keep;
		for handle in done { let _res = handle.join(); }
	}

	/// # Remove.
	///
	/// Cancel and unregister the device's session, if it has one. A session
	/// still extracting gets its ripper killed. Returns `true` if there was
	/// a session to remove.
	pub fn remove(&self, device: &Path) -> bool {
		let mut inner = self.lock();
		let Some(handle) = inner.live.remove(device) else {
			tracing::debug!("{} - No session to remove.", device.display());
			return false;
		};

		if handle.phase() == Phase::Extracting {
			tracing::warn!("{} - Disc removed mid-rip; killing the ripper.", device.display());
		}
		handle.cancel();
		inner.retired.push(handle);
		true
	}

	/// # Send Command.
	///
	/// Pass a command to the device's session. Without a device, the lone
	/// live session is used, or else the first one waiting on the user.
	/// Returns `true` if the command was delivered.
	pub fn send(&self, device: Option<&Path>, cmd: SessionCommand) -> bool {
		let inner = self.lock();
		let handle = match device {
			Some(dev) => inner.live.get(dev),
			None if inner.live.len() == 1 => inner.live.values().next(),
			None => inner.live.values().find(|h| matches!(
				h.phase(),
				Phase::AwaitingSelection | Phase::SubmitPending,
			)),
		};
		handle.is_some_and(|h| h.send(cmd))
	}

	#[must_use]
	/// # Sessions.
	///
	/// Return the device and current phase of each live session.
	pub fn sessions(&self) -> Vec<(PathBuf, Phase)> {
		self.lock().live.iter().map(|(k, v)| (k.clone(), v.phase())).collect()
	}

	/// # Shutdown.
	///
	/// Cancel every session and wait for them all to finish.
	pub fn shutdown(&self) {
		let handles: Vec<SessionHandle> = {
			let mut inner = self.lock();
			let mut out: Vec<SessionHandle> = std::mem::take(&mut inner.live).into_values().collect();
			out.append(&mut inner.retired);
			out
		};

		for handle in &handles { handle.cancel(); }
		for handle in handles {
			let dev = handle.device().to_path_buf();
			let phase = handle.join();
			tracing::debug!("{} - Session ended ({phase}).", dev.display());
		}
	}

	/// # Start.
	///
	/// Start a session for the device unless it already has a live one.
	/// Returns `true` if a session was started.
	pub fn start(&self, device: PathBuf, ctx: &SessionContext) -> bool {
		let mut inner = self.lock();
		if let Some(old) = inner.live.get(&device) {
			if ! old.is_finished() {
				tracing::debug!("{} - Duplicate insert; ignoring.", device.display());
				return false;
			}
			if let Some(old) = inner.live.remove(&device) { let _res = old.join(); }
		}

		match DiscSession::spawn(device.clone(), ctx.clone()) {
			Ok(handle) => {
				tracing::info!("{} - Disc inserted.", device.display());
				inner.live.insert(device, handle);
				true
			},
			Err(e) => {
				tracing::error!("{} - {e}", device.display());
				false
			},
		}
	}
}



#[derive(Debug)]
/// # Watchdog.
///
/// Turn a stream of device events into session starts and stops.
pub struct Watchdog<S: EventSource> {
	/// # Event Source.
	source: S,

	/// # Session Collaborators.
	ctx: SessionContext,

	/// # Sessions.
	registry: Registry,

	/// # Shutdown Flag.
	killed: KillSwitch,
}

impl<S: EventSource> Watchdog<S> {
	#[must_use]
	/// # New.
	pub fn new(source: S, ctx: SessionContext, killed: KillSwitch) -> Self {
		Self {
			source,
			ctx,
			registry: Registry::default(),
			killed,
		}
	}

	#[must_use]
	/// # Registry.
	pub fn registry(&self) -> Registry { self.registry.clone() }

	/// # Run.
	///
	/// Process events until the kill switch is tripped, then cancel and
	/// join every session.
	///
	/// ## Errors
	///
	/// This returns an error if the event source dies. Sessions are still
	/// shut down first.
	pub fn run(mut self) -> Result<(), RipWatchError> {
		tracing::info!("Watching for discs.");
		let mut res = Ok(());
		while ! self.killed.killed() {
			self.registry.reap();
			match self.source.poll(POLL_TIMEOUT) {
				Ok(Some(raw)) => self.handle(raw),
				Ok(None) => {},
				Err(e) => {
					res = Err(e);
					break;
				},
			}
		}

		self.registry.shutdown();
		res
	}

	/// # Handle Event.
	fn handle(&self, raw: RawEvent) {
		let Some(event) = DeviceEvent::classify(raw) else { return; };
		let dev = event.device_path;
		match event.kind {
			DeviceEventKind::Insert => { self.registry.start(dev, &self.ctx); },
			DeviceEventKind::EjectRequest => {
				tracing::debug!("{} - Eject requested.", dev.display());
				self.registry.remove(&dev);
			},
			DeviceEventKind::Ejected => {
				tracing::debug!("{} - Drive ejected.", dev.display());
				self.registry.remove(&dev);
			},
			DeviceEventKind::Other => {
				tracing::trace!("{} - Ignoring unrelated event.", dev.display());
			},
		}
	}
}



/// # Read Property Blocks.
///
/// Split `udevadm monitor --property` output into events. Blocks are
/// separated by blank lines; lines without an `=` (headers) are skipped.
/// Stops early if `emit` returns `false`.
fn read_blocks<R: BufRead, F: FnMut(RawEvent) -> bool>(src: R, mut emit: F) {
	let mut block = RawEvent::default();
	for line in src.lines() {
		let Ok(line) = line else { break; };
		let line = line.trim();
		if line.is_empty() {
			if ! block.is_empty() && ! emit(std::mem::take(&mut block)) { return; }
		}
		else if let Some((k, v)) = line.split_once('=') {
			block.insert(k, v);
		}
	}

	if ! block.is_empty() { emit(block); }
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::{
		DiscLookup,
		RipWatchError,
		ToolCommand,
		resolver::test::{
			FakeService,
			fingerprint,
			medium,
			release,
		},
		session::test::{
			blocking_ripper,
			context,
			Event,
			FakeReader,
			marker_dir,
			RecordingSink,
			tools,
			wait_for,
		},
	};
	use std::{
		collections::VecDeque,
		time::Instant,
	};

	/// # Scripted Event Source.
	///
	/// Hands out events in order, then trips the kill switch.
	struct FakeSource {
		events: VecDeque<Result<RawEvent, RipWatchError>>,
		killed: KillSwitch,
	}

	impl EventSource for FakeSource {
		fn poll(&mut self, _timeout: Duration) -> Result<Option<RawEvent>, RipWatchError> {
			match self.events.pop_front() {
				Some(Ok(raw)) => Ok(Some(raw)),
				Some(Err(e)) => Err(e),
				None => {
					self.killed.kill();
					Ok(None)
				},
			}
		}
	}

	fn insert(dev: &str) -> RawEvent {
		[("DEVNAME", dev), ("ID_CDROM", "1"), ("DISK_MEDIA_CHANGE", "1")].into_iter().collect()
	}

	fn eject(dev: &str) -> RawEvent {
		[("DEVNAME", dev), ("ID_CDROM", "1"), ("DISK_EJECT_REQUEST", "1")].into_iter().collect()
	}

	/// # Waiting Context.
	///
	/// Sessions park on the submission prompt until cancelled.
	fn waiting(sink: &Arc<RecordingSink>) -> SessionContext {
		let out = std::env::temp_dir();
		context(
			FakeReader(Ok(fingerprint(3, &[]))),
			Arc::new(FakeService::new(vec![Ok(DiscLookup::UnknownId)])),
			Arc::clone(sink),
			tools(ToolCommand::new("false", &[])),
			&out,
			Duration::from_secs(30),
		)
	}

	/// # Sessions Started.
	///
	/// Every session reports its removal exactly once, however early it was
	/// cancelled.
	fn sessions_started(sink: &RecordingSink) -> Vec<PathBuf> {
		sink.events().into_iter().filter_map(|e| match e {
			Event::Removed(dev) => Some(dev),
			_ => None,
		}).collect()
	}

	#[test]
	fn t_read_blocks() {
		let raw = "monitor will print the received events for:
UDEV - the event which udev sends out after rule processing

UDEV  [1234.5] change   /devices/pci0000:00/block/sr0 (block)
ACTION=change
DEVNAME=/dev/sr0
ID_CDROM=1
DISK_MEDIA_CHANGE=1


UDEV  [1240.1] change   /devices/pci0000:00/block/sr0 (block)
DEVNAME=/dev/sr0
ID_FS_LABEL=A=B
";
		let mut out = Vec::new();
		read_blocks(raw.as_bytes(), |e| { out.push(e); true });

		assert_eq!(out.len(), 2, "Expected two blocks.");
		assert_eq!(out[0].get("DEVNAME"), Some("/dev/sr0"), "Device path missing.");
		assert_eq!(out[0].get("ACTION"), Some("change"), "Action missing.");
		assert_eq!(out[0].get("UDEV"), None, "Header lines should be skipped.");
		assert_eq!(out[1].get("ID_FS_LABEL"), Some("A=B"), "Values may contain equals signs.");

		let mut count = 0;
		read_blocks(raw.as_bytes(), |_| { count += 1; false });
		assert_eq!(count, 1, "Reading should stop when the receiver goes away.");
	}

	#[test]
	fn t_classify() {
		let ev = DeviceEvent::classify(insert("/dev/sr0")).expect("Insert not classified.");
		assert_eq!(ev.device_path, PathBuf::from("/dev/sr0"), "Wrong device.");
		assert_eq!(ev.kind, DeviceEventKind::Insert, "Wrong kind.");

		let ev = DeviceEvent::classify(eject("/dev/sr0")).expect("Eject not classified.");
		assert_eq!(ev.kind, DeviceEventKind::EjectRequest, "Wrong kind.");

		let mut raw = insert("/dev/sr0");
		raw.insert("SYSTEMD_READY", "0");
		assert_eq!(
			DeviceEvent::classify(raw).map(|e| e.kind),
			Some(DeviceEventKind::Ejected),
			"Ready=0 should mean ejected.",
		);

		let mut raw = insert("/dev/sr0");
		raw.insert("ID_CDROM_MEDIA_STATE", "complete");
		assert_eq!(
			DeviceEvent::classify(raw).map(|e| e.kind),
			Some(DeviceEventKind::Other),
			"Media state should disqualify an insert.",
		);

		let mut raw = insert("/dev/sr0");
		raw.insert("ID_CDROM_MEDIA_STATE", "");
		assert_eq!(
			DeviceEvent::classify(raw).map(|e| e.kind),
			Some(DeviceEventKind::Insert),
			"An empty media state is no media state.",
		);

		let mut raw = insert("/dev/sr0");
		raw.insert("DISK_MEDIA_CHANGE", "0");
		assert_eq!(
			DeviceEvent::classify(raw).map(|e| e.kind),
			Some(DeviceEventKind::Other),
			"No media change should be Other.",
		);

		let raw: RawEvent = [("DEVNAME", "/dev/sda"), ("DISK_MEDIA_CHANGE", "1")].into_iter().collect();
		assert!(DeviceEvent::classify(raw).is_none(), "Non-CD devices should be ignored.");

		let raw: RawEvent = [("ID_CDROM", "1"), ("DISK_MEDIA_CHANGE", "1")].into_iter().collect();
		assert!(DeviceEvent::classify(raw).is_none(), "Pathless events should be ignored.");
	}

	#[test]
	fn t_duplicate_inserts() {
		let sink = Arc::new(RecordingSink::default());
		let killed = KillSwitch::new();
		let source = FakeSource {
			events: VecDeque::from([
				Ok(insert("/dev/sr0")),
				Ok(insert("/dev/sr0")),
				Ok(insert("/dev/sr1")),
			]),
			killed: killed.clone(),
		};

		let dog = Watchdog::new(source, waiting(&sink), killed);
		assert!(dog.run().is_ok(), "The watchdog should exit cleanly.");

		let mut started = sessions_started(&sink);
		started.sort();
		assert_eq!(
			started,
			[PathBuf::from("/dev/sr0"), PathBuf::from("/dev/sr1")],
			"Duplicate inserts should be ignored.",
		);
	}

	#[test]
	fn t_eject_then_insert() {
		let sink = Arc::new(RecordingSink::default());
		let killed = KillSwitch::new();
		let source = FakeSource {
			events: VecDeque::from([
				Ok(insert("/dev/sr0")),
				Ok(eject("/dev/sr0")),
				Ok(eject("/dev/sr0")),
				Ok(insert("/dev/sr0")),
			]),
			killed: killed.clone(),
		};

		let dog = Watchdog::new(source, waiting(&sink), killed);
		assert!(dog.run().is_ok(), "The watchdog should exit cleanly.");
		assert_eq!(sessions_started(&sink).len(), 2, "An eject should allow a fresh session.");

		let cancels = sink.events().iter().filter(|e| matches!(e, Event::Cancel(_))).count();
		assert_eq!(cancels, 2, "Each session should be cancelled exactly once.");
	}

	#[test]
	fn t_eject_mid_rip() {
		let scratch = tempfile::tempdir().expect("Tempdir failed.");
		let out = tempfile::tempdir().expect("Tempdir failed.");
		let marker = scratch.path().join("marker");
		let sink = Arc::new(RecordingSink::default());
		let ctx = context(
			FakeReader(Ok(fingerprint(3, &[]))),
			Arc::new(FakeService::new(vec![Ok(DiscLookup::Releases(vec![
				release("rel", vec![medium("CD", 3, &[])]),
			]))])),
			Arc::clone(&sink),
			tools(blocking_ripper(&marker)),
			out.path(),
			Duration::from_secs(30),
		);

		let killed = KillSwitch::new();
		let source = FakeSource { events: VecDeque::new(), killed: killed.clone() };
		let dog = Watchdog::new(source, ctx, killed);
		let registry = dog.registry();

		dog.handle(insert("/dev/sr0"));
		assert!(wait_for(|| marker_dir(&marker).is_some()), "The ripper never started.");
		let work = marker_dir(&marker).expect("Marker vanished.");
		assert_eq!(
			registry.sessions(),
			[(PathBuf::from("/dev/sr0"), Phase::Extracting)],
			"The session should be extracting.",
		);

		let now = Instant::now();
		dog.handle(eject("/dev/sr0"));
		assert!(registry.sessions().is_empty(), "The session should be unregistered.");
		registry.shutdown();
		assert!(now.elapsed() < Duration::from_secs(10), "The ripper was not killed.");

		let events = sink.events();
		assert!(events.contains(&Event::Phase(Phase::Cancelled)), "The session should be cancelled.");
		assert!(! events.contains(&Event::Phase(Phase::Done)), "The session should not finish.");
		assert!(! work.exists(), "The scratch directory should be gone.");
	}

	#[test]
	fn t_source_failure() {
		let sink = Arc::new(RecordingSink::default());
		let killed = KillSwitch::new();
		let source = FakeSource {
			events: VecDeque::from([
				Ok(insert("/dev/sr0")),
				Err(RipWatchError::EventSource("gone".to_owned())),
			]),
			killed: killed.clone(),
		};

		let dog = Watchdog::new(source, waiting(&sink), killed);
		assert!(
			matches!(dog.run(), Err(RipWatchError::EventSource(_))),
			"The source failure should be returned.",
		);
		assert!(
			sink.events().contains(&Event::Removed(PathBuf::from("/dev/sr0"))),
			"Sessions should still be shut down.",
		);
	}

	#[test]
	fn t_registry() {
		let sink = Arc::new(RecordingSink::default());
		let registry = Registry::default();
		let dev = PathBuf::from("/dev/sr0");

		// A failing session finishes on its own and is reaped.
		let mut ctx = waiting(&sink);
		ctx.reader = Arc::new(FakeReader(Err(RipWatchError::DeviceRead("empty".to_owned()))));
		assert!(registry.start(dev.clone(), &ctx), "The session should start.");
		assert!(wait_for(|| { registry.reap(); registry.is_empty() }), "The session was never reaped.");
		assert!(registry.start(dev.clone(), &waiting(&sink)), "A reaped session should be replaced.");
		assert!(! registry.start(dev.clone(), &waiting(&sink)), "A live session should block duplicates.");

		// Commands reach the lone session without naming it.
		assert!(
			wait_for(|| registry.sessions().first().is_some_and(|(_, p)| *p == Phase::SubmitPending)),
			"The session never asked for a submission.",
		);
		assert!(! registry.send(Some(Path::new("/dev/sr9")), SessionCommand::Ignore), "Unknown devices can't be sent to.");
		assert!(registry.send(None, SessionCommand::Ignore), "Ignore was not delivered.");
		assert!(
			wait_for(|| registry.sessions().first().is_some_and(|(_, p)| *p == Phase::Cancelled)),
			"Ignore should cancel the session.",
		);
		assert!(wait_for(|| { registry.reap(); registry.is_empty() }), "The session was never reaped.");
		assert!(! registry.remove(&dev), "Removing twice should be a no-op.");
	}
}
