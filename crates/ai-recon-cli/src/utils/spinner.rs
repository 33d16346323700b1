use console::{style, Term};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;

const FRAMES: [&str; 4] = ["|", "/", "-", "\\"];

/// A one-line spinner on stderr, animated by a background task until stopped.
pub struct Spinner {
	stop_tx: watch::Sender<bool>,
	handle: JoinHandle<()>,
}

impl Spinner {
	pub fn start(label: impl Into<String>) -> Self {
		let label = label.into();
		let (stop_tx, mut stop_rx) = watch::channel(false);

		let handle = tokio::spawn(async move {
			let term = Term::stderr();
			let mut ticker = interval(Duration::from_millis(100));
			let mut frame = 0;

			loop {
				tokio::select! {
					_ = ticker.tick() => {
						let line = format!("{} {label}", style(FRAMES[frame % FRAMES.len()]).color256(45));
						let _ = term.clear_line();
						let _ = term.write_str(&line);
						frame += 1;
					}
					changed = stop_rx.changed() => {
						if changed.is_err() || *stop_rx.borrow() {
							break;
						}
					}
				}
			}

			let _ = term.clear_line();
		});

		Spinner { stop_tx, handle }
	}

	pub async fn stop(self) {
		let _ = self.stop_tx.send(true);
		let _ = self.handle.await;
	}
}
