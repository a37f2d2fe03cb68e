use std::sync::Mutex;
use tokio::sync::oneshot;

type Deliver<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// A one-shot result slot shared by racing completion paths.
///
/// A probe finishes either naturally (the connection was established or refused) or because its timer fired. Both paths
/// call [`complete`](Completion::complete); only the first one delivers its value, every later call is a no-op.
pub struct Completion<T> {
	deliver: Mutex<Option<Deliver<T>>>,
}
impl<T: Send + 'static> Completion<T> {
	/// A completion that hands its value to `deliver`.
	pub fn new<F>(deliver: F) -> Self
	where
		F: FnOnce(T) + Send + 'static,
	{
		Self {
			deliver: Mutex::new(Some(Box::new(deliver))),
		}
	}

	/// A completion whose value arrives on the returned receiver.
	pub fn channel() -> (Self, oneshot::Receiver<T>) {
		let (tx, rx) = oneshot::channel();
		(
			Self::new(move |value| {
				tx.send(value).ok();
			}),
			rx,
		)
	}
}
impl<T> Completion<T> {
	/// Delivers `value` if nothing was delivered yet. Returns whether this call won.
	pub fn complete(&self, value: T) -> bool {
		let deliver = self.deliver.lock().unwrap().take();
		match deliver {
			Some(deliver) => {
				deliver(value);
				true
			}
			None => false,
		}
	}

	pub fn is_complete(&self) -> bool {
		self.deliver.lock().unwrap().is_none()
	}
}
