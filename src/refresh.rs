//! Live display of the current codes.
//!
//! A [`RefreshLoop`] is driven by two event sources on a single thread: a
//! [`TickSource`] that fires every tick interval and an [`InputSource`] that
//! reports key presses. The loop waits on input until the next tick is due,
//! so a key press is handled at most one tick interval after it arrives.
//! Once stopped, the loop never renders again; a new session builds a new
//! loop.

use anyhow::Context;
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{Clear, ClearType};
use log::debug;
use std::io::{self, Write};
use std::time::Duration;

use crate::cache::OtpCache;
use crate::otp::{Clock, OtpResult, PERIOD};
use crate::store::Secret;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    /// Ctrl-C while input is raw.
    Interrupt,
    Other,
}

/// How a display session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    ReturnToMenu,
    /// Leave the whole program.
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

pub trait TickSource {
    /// Time left until the next tick is due; zero when it is due now.
    fn until_next(&self) -> Duration;
    /// Acknowledges the due tick and schedules the next one.
    fn advance(&mut self);
    fn stop(&mut self);
}

pub trait InputSource {
    /// Waits at most `timeout` for a key press.
    fn poll_key(&mut self, timeout: Duration) -> anyhow::Result<Option<Key>>;
    /// Stops listening and restores normal input. Safe to call twice.
    fn release(&mut self) -> anyhow::Result<()>;
}

pub struct RefreshLoop<'a, C: Clock> {
    secrets: &'a [Secret],
    cache: OtpCache,
    clock: C,
    quit_key: char,
    state: LoopState,
}

impl<'a, C: Clock> RefreshLoop<'a, C> {
    pub fn new(secrets: &'a [Secret], cache: OtpCache, clock: C, quit_key: char) -> Self {
        Self {
            secrets,
            cache,
            clock,
            quit_key,
            state: LoopState::Running,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn cache(&self) -> &OtpCache {
        &self.cache
    }

    /// Recomputes every code and redraws. Does nothing once stopped.
    pub fn tick<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        if self.state == LoopState::Stopped {
            return Ok(());
        }

        let now = self.clock.unix_now();
        let mut rows = Vec::with_capacity(self.secrets.len());
        for secret in self.secrets {
            let result = self
                .cache
                .get(&secret.key, now)
                .with_context(|| format!("cannot compute code for '{}'", secret.name))?;
            rows.push((secret, result));
        }

        render(out, &rows, self.quit_key)?;
        Ok(())
    }

    /// Maps a key press to the session outcome, stopping the loop if the
    /// key ends it.
    pub fn on_key(&mut self, key: Key) -> Option<Outcome> {
        if self.state == LoopState::Stopped {
            return None;
        }

        let outcome = match key {
            Key::Interrupt => Outcome::Exit,
            Key::Char(c) if c.eq_ignore_ascii_case(&self.quit_key) => Outcome::ReturnToMenu,
            _ => return None,
        };
        self.state = LoopState::Stopped;
        Some(outcome)
    }

    /// Runs until a key ends the session or a tick fails. The tick source is
    /// stopped and the input released on every exit path before returning.
    pub fn run<T, I, W>(
        &mut self,
        ticks: &mut T,
        input: &mut I,
        out: &mut W,
    ) -> anyhow::Result<Outcome>
    where
        T: TickSource,
        I: InputSource,
        W: Write,
    {
        debug!("display session started for {} secrets", self.secrets.len());
        let result = self.drive(ticks, input, out);

        self.state = LoopState::Stopped;
        ticks.stop();
        let released = input.release();
        debug!("display session stopped");

        let outcome = result?;
        released?;
        Ok(outcome)
    }

    fn drive<T, I, W>(
        &mut self,
        ticks: &mut T,
        input: &mut I,
        out: &mut W,
    ) -> anyhow::Result<Outcome>
    where
        T: TickSource,
        I: InputSource,
        W: Write,
    {
        self.tick(out)?;

        loop {
            if let Some(key) = input.poll_key(ticks.until_next())? {
                if let Some(outcome) = self.on_key(key) {
                    return Ok(outcome);
                }
            }

            if ticks.until_next().is_zero() {
                ticks.advance();
                self.tick(out)?;
            }
        }
    }
}

/// Bar of [`PERIOD`] cells with `remaining` of them filled.
pub fn progress_bar(remaining: u64) -> String {
    let filled = remaining.min(PERIOD) as usize;
    let empty = PERIOD as usize - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

// Lines end in \r\n since the terminal is in raw mode while this runs.
fn render<W: Write>(
    out: &mut W,
    rows: &[(&Secret, OtpResult)],
    quit_key: char,
) -> io::Result<()> {
    queue!(
        out,
        Clear(ClearType::All),
        MoveTo(0, 0),
        Print("Current OTPs:".cyan()),
        Print("\r\n\r\n")
    )?;

    for (secret, result) in rows {
        let remaining = result.time_remaining.min(PERIOD);
        queue!(
            out,
            Print(secret.name.as_str().green()),
            Print("\r\nOTP: "),
            Print(result.current_otp.as_str().yellow()),
            Print("\r\nTime: "),
            Print(progress_bar(remaining).blue()),
            Print(format!(" {remaining}s\r\n\r\n"))
        )?;
    }

    queue!(
        out,
        Print(format!("Press [{quit_key}] to return to main menu...").dark_grey())
    )?;
    out.flush()
}
