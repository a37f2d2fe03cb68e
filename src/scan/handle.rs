use crate::errors::ShutdownError;
use std::sync::{Arc, Condvar, Mutex};

/// Raised once a session has been torn down, whoever ended it.
#[derive(Default)]
pub(super) struct Finished {
	done: Mutex<bool>,
	signal: Condvar,
}
impl Finished {
	pub(super) fn set(&self) {
		*self.done.lock().unwrap() = true;
		self.signal.notify_all();
	}

	pub(super) fn wait(&self) {
		let mut done = self.done.lock().unwrap();
		while !*done {
			done = self.signal.wait(done).unwrap();
		}
	}
}

/// The worker thread of one scan session.
pub(super) struct SessionHandle {
	pub(super) thread: std::thread::JoinHandle<()>,
	pub(super) shutdown_tx: tokio::sync::oneshot::Sender<()>,
	pub(super) finished: Arc<Finished>,
}
impl SessionHandle {
	/// Ends the session now and waits until every source is torn down.
	pub(super) fn shutdown(self) -> Result<(), ShutdownError> {
		let SessionHandle { thread, shutdown_tx, .. } = self;
		shutdown_tx.send(()).ok();
		thread.join().map_err(ShutdownError::ThreadJoinError)
	}

	/// Waits for the session to end on its own.
	pub(super) fn join(self) -> Result<(), ShutdownError> {
		let SessionHandle { thread, shutdown_tx, .. } = self;
		let joined = thread.join().map_err(ShutdownError::ThreadJoinError);
		// Dropping the sender earlier would read as a shutdown request.
		drop(shutdown_tx);
		joined
	}
}
