//! Fan-out of one in-flight sync request to every caller that asked for it.

use parking_lot::Mutex;
use tokio::task::AbortHandle;

/// Completion callback; receives whether the sync succeeded.
pub type Waiter = Box<dyn FnOnce(bool) + Send>;

/// Result of [`Coalescer::join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
	/// No request was in flight; the caller must issue one for this round.
	Started(u64),
	/// Appended to the round already in flight.
	Joined(u64),
}

#[derive(Default)]
struct Inner {
	in_flight: bool,
	round: u64,
	waiters: Vec<Waiter>,
	timer: Option<AbortHandle>,
}

/// Waiter list keyed by an "in flight" flag.
///
/// Every waiter of a round is called exactly once, outside the lock, when
/// the round resolves. Rounds are numbered so a late timer from an earlier
/// round cannot resolve a later one.
#[derive(Default)]
pub struct Coalescer {
	inner: Mutex<Inner>,
}

impl Coalescer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn join(&self, waiter: Waiter) -> Join {
		let mut inner = self.inner.lock();
		inner.waiters.push(waiter);
		if inner.in_flight {
			Join::Joined(inner.round)
		} else {
			inner.in_flight = true;
			inner.round += 1;
			Join::Started(inner.round)
		}
	}

	/// Attaches the timeout task of `round`; aborts it if the round is over.
	pub fn arm_timer(&self, round: u64, timer: AbortHandle) {
		let mut inner = self.inner.lock();
		if inner.in_flight && inner.round == round {
			if let Some(previous) = inner.timer.replace(timer) {
				previous.abort();
			}
		} else {
			timer.abort();
		}
	}

	/// Resolves whatever round is in flight. Returns the number of waiters called.
	pub fn resolve(&self, success: bool) -> usize {
		let waiters = {
			let mut inner = self.inner.lock();
			Self::finish(&mut inner)
		};
		Self::notify(waiters, success)
	}

	/// Resolves `round` only if it is still the one in flight.
	pub fn resolve_round(&self, round: u64, success: bool) -> usize {
		let waiters = {
			let mut inner = self.inner.lock();
			if !inner.in_flight || inner.round != round {
				return 0;
			}
			Self::finish(&mut inner)
		};
		Self::notify(waiters, success)
	}

	pub fn is_in_flight(&self) -> bool {
		self.inner.lock().in_flight
	}

	pub fn pending(&self) -> usize {
		self.inner.lock().waiters.len()
	}

	fn finish(inner: &mut Inner) -> Vec<Waiter> {
		inner.in_flight = false;
		if let Some(timer) = inner.timer.take() {
			timer.abort();
		}
		std::mem::take(&mut inner.waiters)
	}

	fn notify(waiters: Vec<Waiter>, success: bool) -> usize {
		let count = waiters.len();
		for waiter in waiters {
			waiter(success);
		}
		count
	}
}
