//! Cancellable repeating display refresh.
//!
//! At most one refresh task exists at a time and at most one tick is ever
//! queued. Stopping aborts the task and discards a queued tick, so nothing
//! fires after the timer goes idle, is reset, or the loop is dropped.

use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick;

pub struct RefreshLoop {
    period: Duration,
    sender: mpsc::Sender<Tick>,
    receiver: mpsc::Receiver<Tick>,
    ticker: Option<JoinHandle<()>>,
}

impl RefreshLoop {
    pub fn new(period: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(1);
        Self {
            period,
            sender,
            receiver,
            ticker: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.ticker.is_some()
    }

    /// Spawns the ticker, cancelling any outstanding one first.
    pub fn start(&mut self) {
        self.stop();
        let sender = self.sender.clone();
        let period = self.period;
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match sender.try_send(Tick) {
                    Ok(()) | Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Closed(_)) => break,
                }
            }
        }));
        debug!(period_ms = self.period.as_millis() as u64, "refresh started");
    }

    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            while self.receiver.try_recv().is_ok() {}
            debug!("refresh stopped");
        }
    }

    /// Starts or stops the ticker to match `running`.
    pub fn sync(&mut self, running: bool) {
        match (running, self.is_active()) {
            (true, false) => self.start(),
            (false, true) => self.stop(),
            _ => {}
        }
    }

    /// Waits for the next tick. Never resolves while stopped.
    pub async fn tick(&mut self) -> Tick {
        if self.ticker.is_none() {
            std::future::pending::<()>().await;
        }
        match self.receiver.recv().await {
            Some(tick) => tick,
            // `self.sender` keeps the channel open.
            None => std::future::pending().await,
        }
    }
}

impl Drop for RefreshLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
