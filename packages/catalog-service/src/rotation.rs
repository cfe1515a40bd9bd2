//! Timed re-sampling of the active partition.

use std::{sync::Arc, time::Duration};

use rand::RngCore;
use serde::Serialize;
use tokio::{
	sync::watch,
	task::{AbortHandle, JoinHandle},
	time::{self, MissedTickBehavior},
};

use catalog_domain::{
	record::Record,
	sample::{self, SampleWindow},
};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RotationFrame {
	/// No rotation has run yet.
	#[default]
	Idle,
	/// Empty window held during the transition between draws.
	Clearing { tick: u64 },
	Showing { tick: u64, window: SampleWindow },
}
impl RotationFrame {
	pub fn window(&self) -> Option<&SampleWindow> {
		match self {
			Self::Showing { window, .. } => Some(window),
			Self::Idle | Self::Clearing { .. } => None,
		}
	}

	pub fn tick(&self) -> u64 {
		match self {
			Self::Idle => 0,
			Self::Clearing { tick } | Self::Showing { tick, .. } => *tick,
		}
	}
}

/// Supplies the ranked active partition at draw time.
pub trait ActiveSource
where
	Self: Send + Sync,
{
	fn active(&self) -> Vec<Record>;
}

/// Mirrors frames somewhere else, e.g. into a session view.
pub trait FrameSink
where
	Self: Send + Sync,
{
	fn publish_frame(&self, frame: &RotationFrame);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RotationConfig {
	pub size: usize,
	pub period: Duration,
	pub transition: Duration,
}
impl From<&catalog_config::Rotation> for RotationConfig {
	fn from(cfg: &catalog_config::Rotation) -> Self {
		Self {
			size: cfg.sample_size as usize,
			period: Duration::from_millis(cfg.period_ms),
			transition: Duration::from_millis(cfg.transition_ms),
		}
	}
}

/// Owns one rotation task. Dropping the handle stops it.
pub struct RotationHandle {
	frames: watch::Receiver<RotationFrame>,
	task: JoinHandle<()>,
}
impl RotationHandle {
	/// Spawns the rotation on the current runtime. The first draw happens immediately.
	pub fn start(
		cfg: RotationConfig,
		source: Arc<dyn ActiveSource>,
		sink: Option<Arc<dyn FrameSink>>,
		mut rng: Box<dyn RngCore + Send>,
	) -> Self {
		let (tx, frames) = watch::channel(RotationFrame::Idle);
		let period = cfg.period.max(Duration::from_millis(1));
		let task = tokio::spawn(async move {
			let emit = |frame: RotationFrame| {
				if let Some(sink) = sink.as_ref() {
					sink.publish_frame(&frame);
				}

				tx.send_replace(frame);
			};
			let mut interval = time::interval(period);
			let mut tick = 0_u64;

			interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				interval.tick().await;

				tick += 1;

				emit(RotationFrame::Clearing { tick });

				if !cfg.transition.is_zero() {
					time::sleep(cfg.transition).await;
				}

				let active = source.active();
				let window = sample::draw(&active, cfg.size, rng.as_mut());

				tracing::debug!(tick, drawn = window.len(), pool = active.len(), "Rotation drew a window.");

				emit(RotationFrame::Showing { tick, window });
			}
		});

		Self { frames, task }
	}

	/// The window being shown, empty while clearing.
	pub fn current(&self) -> SampleWindow {
		self.frames.borrow().window().cloned().unwrap_or_default()
	}

	pub fn frame(&self) -> RotationFrame {
		self.frames.borrow().clone()
	}

	pub fn frames(&self) -> watch::Receiver<RotationFrame> {
		self.frames.clone()
	}

	pub fn abort_handle(&self) -> AbortHandle {
		self.task.abort_handle()
	}

	pub fn is_running(&self) -> bool {
		!self.task.is_finished()
	}

	pub fn stop(&self) {
		self.task.abort();
	}
}
impl Drop for RotationHandle {
	fn drop(&mut self) {
		self.task.abort();
	}
}
