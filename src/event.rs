use crate::{
	device::{Device, DeviceField, DeviceSource},
	sweep::SweepSummary,
};
use std::{sync::Arc, time::Duration};

pub type EventHandler = Arc<dyn Fn(ScanEvent) + Send + Sync + 'static>;

#[derive(Debug, Clone)]
/// Everything an observer of a scan gets to see.
///
/// Handlers are called synchronously on whichever thread produced the event, so they should return quickly.
pub enum ScanEvent {
	/// A scan session started and will run for `duration` unless stopped early.
	ScanStarted { duration: Duration },

	/// A device was seen for the first time in this session.
	DeviceAdded(Arc<Device>),

	/// One resolved field of an already published device changed.
	DeviceUpdated { device: Arc<Device>, field: DeviceField },

	/// The subnet sweep went through every batch.
	SweepFinished(SweepSummary),

	/// A discovery source ended (finished, failed, or was cancelled) and its sockets are closed.
	SourceStopped(DeviceSource),

	/// The session is over and every source has been torn down. Sent exactly once per session.
	ScanFinished { elapsed: Duration },
}
