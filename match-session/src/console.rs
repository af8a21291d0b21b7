use crate::{
    command::{Command, help_text},
    session_manager::{ClockToken, MatchStatus, SessionError, SessionManager, TickOutcome},
    sync::{PeriodSave, SaveStatus, SyncError, SyncHandle},
    ticker::Ticker,
};
use log::*;
use match_common::side::Side;
use std::fmt::Write as _;
use thiserror::Error;
use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    select,
    sync::{mpsc, watch},
};

const TICK_CHANNEL_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Drives a session from text commands and the once-per-second ticker
#[derive(Debug)]
pub struct Console {
    session: SessionManager,
    sync: SyncHandle,
    ticker: Option<Ticker>,
    tick_tx: mpsc::Sender<ClockToken>,
    tick_rx: mpsc::Receiver<ClockToken>,
}

impl Console {
    pub fn new(session: SessionManager, sync: SyncHandle) -> Self {
        let (tick_tx, tick_rx) = mpsc::channel(TICK_CHANNEL_LEN);
        Self {
            session,
            sync,
            ticker: None,
            tick_tx,
            tick_rx,
        }
    }

    /// Queues another write of every period other than the current one whose last write failed.
    /// The current period is covered by whatever the caller saves next.
    async fn requeue_at_risk(&self) -> Result<(), SyncError> {
        self.sync.flush().await?;
        let current = self.session.current_period();
        for period in self.sync.periods_at_risk() {
            if period != current {
                info!(
                    "{} Retrying the lost save of the {period}",
                    self.session.status_string()
                );
                self.sync.autosave(self.session.period_save_request(period))?;
            }
        }
        Ok(())
    }

    fn stop_ticker(&mut self) {
        if self.ticker.take().is_some() {
            debug!("{} Ticker stopped", self.session.status_string());
        }
    }

    /// Applies one tick. Returns a message for the user when the period has run out.
    pub fn on_tick(&mut self, token: ClockToken) -> Option<String> {
        let report = self.session.tick(token);
        if let Some(request) = report.autosave {
            let _ = self.sync.autosave(request);
        }
        match report.outcome {
            TickOutcome::PeriodEnded => {
                self.stop_ticker();
                Some(format!(
                    "The {} is over, the clock has stopped",
                    self.session.current_period()
                ))
            }
            TickOutcome::Counted | TickOutcome::Ignored => None,
        }
    }

    /// Runs one command and returns the text to show the user
    pub async fn handle(&mut self, command: Command) -> Result<String, ConsoleError> {
        let reply = match command {
            Command::Start => match self.session.start_clock()? {
                Some(token) => {
                    self.ticker = Some(Ticker::spawn(token, self.tick_tx.clone()));
                    "Clock running".to_string()
                }
                None if self.session.clock_is_running() => "Clock already running".to_string(),
                None => "No time left, reset the clock first".to_string(),
            },
            Command::Pause => {
                self.stop_ticker();
                if self.session.pause_clock() {
                    "Clock stopped".to_string()
                } else {
                    "Clock was not running".to_string()
                }
            }
            Command::Reset => {
                self.session.reset_clock()?;
                self.stop_ticker();
                format!("Clock reset to {}", clock_string(self.session.clock_time()))
            }
            Command::Toggle(id) => {
                if self.session.toggle_on_court(&id)? {
                    format!("{id} is on court")
                } else {
                    format!("{id} is off court")
                }
            }
            Command::Increment(entity, kind) => {
                let value = self.session.increment(&entity, kind)?;
                format!("{entity} {kind}: {value}")
            }
            Command::Decrement(entity, kind) => {
                let value = self.session.decrement(&entity, kind)?;
                format!("{entity} {kind}: {value}")
            }
            Command::Timeout(side) => {
                let used = self.session.use_timeout(side)?;
                format!("{side} timeouts used: {used}")
            }
            Command::ClearTimeout(side) => {
                let used = self.session.clear_timeout(side)?;
                format!("{side} timeouts used: {used}")
            }
            Command::Period(period) => {
                let sync = &self.sync;
                let switched = self.session.switch_period(period, |request| {
                    let _ = sync.autosave(request);
                })?;
                if switched {
                    self.stop_ticker();
                    format!("Now in the {period}")
                } else {
                    format!("Already in the {period}")
                }
            }
            Command::Save => {
                self.requeue_at_risk().await?;
                self.sync.save(self.session.save_request()).await?;
                format!("Saved the {}", self.session.current_period())
            }
            Command::Finish => {
                self.stop_ticker();
                let request = self.session.finish()?;
                if let Err(e) = self.requeue_at_risk().await {
                    warn!("{} Could not retry lost saves: {e}", self.session.status_string());
                }
                let _ = self.sync.autosave(request);
                format!("Match finished, final score {}", self.score_line())
            }
            Command::Reopen => {
                let request = self.session.reopen()?;
                let _ = self.sync.autosave(request);
                "Match reopened".to_string()
            }
            Command::Status => self.status_text(),
            Command::Help => help_text(),
            Command::Quit => "Bye".to_string(),
        };
        Ok(reply)
    }

    fn score_line(&self) -> String {
        let info = self.session.info();
        let score = self.session.score();
        format!(
            "{} {} - {} {}",
            info.team(Side::Local).name,
            score[Side::Local],
            score[Side::Visitor],
            info.team(Side::Visitor).name
        )
    }

    pub fn status_text(&self) -> String {
        let session = &self.session;
        let mut text = String::new();
        let _ = writeln!(
            text,
            "{} {} ({})",
            session.status_string(),
            if session.clock_is_running() {
                "running"
            } else {
                "stopped"
            },
            match session.status() {
                MatchStatus::InProgress => "in progress",
                MatchStatus::Finished => "finished",
            }
        );
        let tracked = session.tracked_side();
        let _ = writeln!(
            text,
            "Tracking {} ({tracked})",
            session.info().team(tracked).name
        );
        let _ = writeln!(text, "Score: {}", self.score_line());
        let on_court: Vec<&str> = session.on_court().map(|id| id.as_str()).collect();
        let _ = writeln!(
            text,
            "On court ({}/{}): {}",
            on_court.len(),
            session.config().max_on_court,
            on_court.join(", ")
        );
        let _ = writeln!(
            text,
            "Timeouts: local {}, visitor {}",
            session.timeouts_used(Side::Local),
            session.timeouts_used(Side::Visitor)
        );
        for player in session.players() {
            if let Some(stat) = session.player_stat(&player.id) {
                let total = session.player_totals(&player.id).unwrap_or_default();
                let _ = writeln!(
                    text,
                    "{}#{:<3} {:<20} {} played, {} goals, {} assists, {} fouls \
                     (match: {} played, {} goals)",
                    if session.is_on_court(&player.id) { "* " } else { "  " },
                    player.number,
                    player.name,
                    clock_string(stat.minutes_played),
                    stat.goals,
                    stat.assists,
                    stat.fouls,
                    clock_string(total.minutes_played),
                    total.goals
                );
            }
        }
        let opponent = session.opponent_stat();
        let _ = writeln!(
            text,
            "  Opponent: {} goals, {} fouls (match: {} goals, {} fouls)",
            opponent.goals,
            opponent.fouls,
            session.opponent_totals().goals,
            session.opponent_totals().fouls
        );
        let _ = writeln!(
            text,
            "Events this period: {}",
            session.events(session.current_period()).len()
        );
        let _ = write!(text, "Save: {}", status_line(&self.sync.status().borrow()));
        text
    }

    /// Reads commands from `input` until `quit` or end of input, writing replies to `output`
    pub async fn run<R, W>(mut self, input: R, mut output: W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut status: watch::Receiver<SaveStatus> = self.sync.status();

        loop {
            select! {
                Some(token) = self.tick_rx.recv() => {
                    if let Some(msg) = self.on_tick(token) {
                        write_line(&mut output, &msg).await?;
                    }
                }
                Ok(()) = status.changed() => {
                    let current = status.borrow_and_update().clone();
                    if current.at_risk() {
                        let warning = format!("Warning: {}", status_line(&current));
                        write_line(&mut output, &warning).await?;
                    }
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    let command = match line.parse::<Command>() {
                        Ok(c) => c,
                        Err(e) => {
                            write_line(&mut output, &e.to_string()).await?;
                            continue;
                        }
                    };
                    let quit = command == Command::Quit;
                    match self.handle(command).await {
                        Ok(reply) => write_line(&mut output, &reply).await?,
                        Err(e) => {
                            warn!("{} {e}", self.session.status_string());
                            write_line(&mut output, &format!("Error: {e}")).await?;
                        }
                    }
                    if quit {
                        break;
                    }
                }
            }
        }

        self.stop_ticker();
        if let Err(e) = self.sync.flush().await {
            error!("Pending saves may have been lost: {e}");
        }
        let last = self.sync.status().borrow().clone();
        if last.at_risk() {
            write_line(&mut output, &format!("Warning: {}", status_line(&last))).await?;
        }
        output.flush().await
    }
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> io::Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await
}

fn clock_string(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn status_line(status: &SaveStatus) -> String {
    let failures: Vec<String> = status
        .periods
        .iter()
        .filter_map(|(period, save)| match save {
            PeriodSave::AutosaveFailed(reason) => Some(format!(
                "autosave of the {period} failed ({reason}), save manually to retry"
            )),
            PeriodSave::SaveFailed(reason) => {
                Some(format!("saving the {period} failed ({reason})"))
            }
            PeriodSave::Unsaved | PeriodSave::Saved => None,
        })
        .collect();
    if !failures.is_empty() {
        return failures.join("; ");
    }
    match status.last {
        Some(period) => format!("{period} saved"),
        None => "nothing saved yet".to_string(),
    }
}
