//! Reachability probe used to tell "no network" from "server said no".

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, trace};
use url::Url;

use crate::transport::{HttpRequest, Transport};

pub const DEFAULT_PROBE_URL: &str = "https://www.apple.com/library/test/success.html";
pub const PROBE_INTERVAL: Duration = Duration::from_secs(5);
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a caller waits for a first determination.
pub const DETERMINATION_WINDOW: Duration = Duration::from_secs(2);

/// Last probe result. `checked` is false until a probe completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Connectivity {
	pub has_internet: bool,
	pub checked: bool,
}

#[derive(Default)]
struct Tasks {
	probe: Option<AbortHandle>,
	ticker: Option<JoinHandle<()>>,
}

/// Periodic `HEAD` prober.
pub struct ConnectivityMonitor {
	transport: Arc<dyn Transport>,
	probe_url: Url,
	interval: Duration,
	state: watch::Sender<Connectivity>,
	tasks: Mutex<Tasks>,
}

impl ConnectivityMonitor {
	pub fn new(transport: Arc<dyn Transport>, probe_url: Url) -> Self {
		Self {
			transport,
			probe_url,
			interval: PROBE_INTERVAL,
			state: watch::Sender::new(Connectivity::default()),
			tasks: Mutex::new(Tasks::default()),
		}
	}

	pub fn with_interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}

	pub fn current(&self) -> Connectivity {
		*self.state.borrow()
	}

	pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
		self.state.subscribe()
	}

	/// Runs one probe and records its result.
	pub async fn check_now(&self) -> bool {
		let request = HttpRequest::head(self.probe_url.clone()).with_timeout(PROBE_TIMEOUT);
		let online = match self.transport.send(&request).await {
			Ok(response) => response.status == 200,
			Err(err) => {
				trace!(target = "doorkey.net", error = %err, "probe failed");
				false
			}
		};
		let next = Connectivity {
			has_internet: online,
			checked: true,
		};
		self.state.send_if_modified(|state| {
			let changed = *state != next;
			*state = next;
			changed
		});
		debug!(target = "doorkey.net", online, "connectivity probed");
		online
	}

	/// Returns the known state, probing once within `window` if none exists.
	/// An undetermined result counts as offline.
	pub async fn ensure_determined(&self, window: Duration) -> bool {
		let current = self.current();
		if current.checked {
			return current.has_internet;
		}
		tokio::time::timeout(window, self.check_now()).await.unwrap_or(false)
	}

	/// Starts periodic probing. No-op when already running.
	pub fn start(self: &Arc<Self>) {
		let mut tasks = self.tasks.lock();
		if tasks.ticker.is_some() {
			return;
		}
		let weak: Weak<Self> = Arc::downgrade(self);
		let interval = self.interval;
		tasks.ticker = Some(tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			loop {
				ticker.tick().await;
				let Some(monitor) = weak.upgrade() else {
					break;
				};
				monitor.spawn_probe();
			}
		}));
		debug!(target = "doorkey.net", url = %self.probe_url, "connectivity monitor started");
	}

	fn spawn_probe(self: Arc<Self>) {
		let this = self.clone();
		let handle = tokio::spawn(async move {
			this.check_now().await;
		});
		if let Some(previous) = self.tasks.lock().probe.replace(handle.abort_handle()) {
			previous.abort();
		}
	}

	/// Cancels the in-flight probe, then the ticker.
	pub fn stop(&self) {
		let mut tasks = self.tasks.lock();
		if let Some(probe) = tasks.probe.take() {
			probe.abort();
		}
		if let Some(ticker) = tasks.ticker.take() {
			ticker.abort();
			debug!(target = "doorkey.net", "connectivity monitor stopped");
		}
	}

	pub fn is_running(&self) -> bool {
		self.tasks.lock().ticker.is_some()
	}
}

impl Drop for ConnectivityMonitor {
	fn drop(&mut self) {
		self.stop();
	}
}
