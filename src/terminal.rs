use anyhow::Context;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{self, Clear, ClearType};
use log::debug;
use std::io;
use std::time::{Duration, Instant};

use crate::app::Viewer;
use crate::cache::OtpCache;
use crate::config::Settings;
use crate::otp::SystemClock;
use crate::refresh::{InputSource, Key, LoopState, Outcome, RefreshLoop, TickSource};
use crate::store::Secret;

/// Fixed-rate ticks. Deadlines advance by whole periods from the first one,
/// so slow renders do not push later ticks back.
pub struct IntervalTicker {
    period: Duration,
    next_due: Option<Instant>,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_due: Some(Instant::now() + period),
        }
    }
}

impl TickSource for IntervalTicker {
    fn until_next(&self) -> Duration {
        match self.next_due {
            Some(due) => due.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }

    fn advance(&mut self) {
        let Some(due) = self.next_due else {
            return;
        };
        let now = Instant::now();
        let mut next = due + self.period;
        // fell more than a period behind (suspended terminal, etc.)
        if next <= now {
            next = now + self.period;
        }
        self.next_due = Some(next);
    }

    fn stop(&mut self) {
        self.next_due = None;
    }
}

/// Key presses read from the terminal in raw mode. Raw mode is left on
/// [`InputSource::release`] or, failing that, on drop.
///
/// Ctrl-C arrives as a key press, not a signal, so it unwinds normally.
/// SIGTERM and SIGHUP are not handled: the process ends without running
/// `Drop` and the terminal stays in raw mode until `reset` or `stty sane`.
pub struct RawInput {
    raw: bool,
}

impl RawInput {
    pub fn enable() -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("cannot switch terminal to raw mode")?;
        Ok(Self { raw: true })
    }
}

impl InputSource for RawInput {
    fn poll_key(&mut self, timeout: Duration) -> anyhow::Result<Option<Key>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }

        let key = match event::read()? {
            Event::Key(key) if key.kind != KeyEventKind::Release => match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    Key::Interrupt
                }
                KeyCode::Char(c) => Key::Char(c),
                _ => Key::Other,
            },
            _ => Key::Other,
        };
        Ok(Some(key))
    }

    fn release(&mut self) -> anyhow::Result<()> {
        if self.raw {
            self.raw = false;
            terminal::disable_raw_mode().context("cannot restore terminal mode")?;
        }
        Ok(())
    }
}

impl Drop for RawInput {
    fn drop(&mut self) {
        if self.raw {
            let _ = terminal::disable_raw_mode();
        }
    }
}

/// Shows the live display on stdout until the quit key or Ctrl-C.
pub struct LiveViewer {
    settings: Settings,
}

impl LiveViewer {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

impl Viewer for LiveViewer {
    fn view(&mut self, secrets: &[Secret]) -> anyhow::Result<Outcome> {
        let mut out = io::stdout();
        let mut input = RawInput::enable()?;
        let mut ticks = IntervalTicker::new(self.settings.tick());
        let mut refresh =
            RefreshLoop::new(secrets, OtpCache::new(), SystemClock, self.settings.quit_key);

        execute!(out, Hide)?;
        let outcome = refresh.run(&mut ticks, &mut input, &mut out);
        execute!(out, Show, Clear(ClearType::All), MoveTo(0, 0))?;

        debug_assert_eq!(refresh.state(), LoopState::Stopped);
        debug!(
            "{} codes computed, {} still cached",
            refresh.cache().misses(),
            refresh.cache().len()
        );
        outcome
    }
}
