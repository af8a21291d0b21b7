use crate::session_manager::ClockToken;
use log::*;
use tokio::{
    sync::mpsc,
    task::{self, JoinHandle},
    time::{Duration, Instant, interval_at},
};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Sends the token of one clock run once per second. Dropping the ticker stops it.
#[derive(Debug)]
pub struct Ticker {
    join: JoinHandle<()>,
}

impl Ticker {
    pub fn spawn(token: ClockToken, tx: mpsc::Sender<ClockToken>) -> Self {
        let join = task::spawn(async move {
            let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            loop {
                interval.tick().await;
                if tx.send(token).await.is_err() {
                    debug!("Tick receiver closed, stopping the ticker");
                    break;
                }
            }
        });
        Self { join }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.join.abort();
    }
}
