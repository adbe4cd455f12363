use anyhow::{Result, bail};
use log::{debug, warn};
use std::time::Duration;

use crate::otp::parse_secret_input;
use crate::prompt::{Choice, Prompter, Tone};
use crate::refresh::Outcome;
use crate::store::{CachedStore, Secret};

/// Runs the live code display for a non-empty list of secrets.
pub trait Viewer {
    fn view(&mut self, secrets: &[Secret]) -> Result<Outcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Show,
    Add,
    Remove,
    Quit,
}

const ACTIONS: [Action; 4] = [Action::Show, Action::Add, Action::Remove, Action::Quit];

fn menu_choices(has_secrets: bool) -> Vec<Choice> {
    ACTIONS
        .iter()
        .map(|action| match action {
            Action::Show => {
                Choice::disabled_if("🔐 Show all OTPs", !has_secrets, "No secrets configured")
            }
            Action::Add => Choice::enabled("➕ Add OTP Secret"),
            Action::Remove => {
                Choice::disabled_if("❌ Remove OTP Secret", !has_secrets, "No secrets configured")
            }
            Action::Quit => Choice::enabled("🚪 Quit"),
        })
        .collect()
}

/// Validates user input for a new secret and returns the record to store.
pub fn new_secret(name: &str, raw_key: &str) -> Result<Secret> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Name cannot be empty");
    }
    let key = parse_secret_input(raw_key)?;
    Ok(Secret {
        name: name.to_string(),
        key,
    })
}

/// Interactive menu: every action returns to the menu until the user quits,
/// input ends, or the display is interrupted.
pub struct App<P, V> {
    store: CachedStore,
    prompter: P,
    viewer: V,
    notice: Duration,
}

impl<P: Prompter, V: Viewer> App<P, V> {
    pub fn new(store: CachedStore, prompter: P, viewer: V, notice: Duration) -> Self {
        Self {
            store,
            prompter,
            viewer,
            notice,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.step() {
                Ok(Outcome::Exit) => {
                    debug!("leaving menu loop");
                    return Ok(());
                }
                Ok(Outcome::ReturnToMenu) => {}
                Err(e) => self.report(&e)?,
            }
        }
    }

    fn step(&mut self) -> Result<Outcome> {
        self.prompter.header()?;

        let secrets = match self.store.secrets() {
            Ok(secrets) => secrets,
            Err(e) => {
                self.report(&e.into())?;
                Vec::new()
            }
        };

        let choices = menu_choices(!secrets.is_empty());
        let Some(picked) = self.prompter.select("Select an action:", &choices)? else {
            return Ok(Outcome::Exit);
        };

        match ACTIONS[picked] {
            Action::Show => self.show(&secrets),
            Action::Add => self.add(),
            Action::Remove => self.remove(&secrets),
            Action::Quit => Ok(Outcome::Exit),
        }
    }

    fn show(&mut self, secrets: &[Secret]) -> Result<Outcome> {
        if secrets.is_empty() {
            bail!("No secrets configured");
        }
        self.viewer.view(secrets)
    }

    fn add(&mut self) -> Result<Outcome> {
        let Some(name) = self.prompter.input("📝 Enter name for this OTP:")? else {
            return Ok(Outcome::Exit);
        };
        let Some(key) = self.prompter.input("🔑 Enter the OTP secret key:")? else {
            return Ok(Outcome::Exit);
        };

        let secret = new_secret(&name, &key)?;
        self.store.add(secret)?;

        self.done("OTP secret added successfully! returning to main menu...")
    }

    fn remove(&mut self, secrets: &[Secret]) -> Result<Outcome> {
        let choices: Vec<_> = secrets.iter().map(|s| Choice::enabled(&s.name)).collect();
        let Some(picked) = self
            .prompter
            .select("Select OTP secret to remove:", &choices)?
        else {
            return Ok(Outcome::Exit);
        };

        self.store.remove(&secrets[picked].name)?;

        self.done("OTP secret removed successfully! returning to main menu...")
    }

    fn done(&mut self, message: &str) -> Result<Outcome> {
        self.prompter.notice(message, Tone::Success)?;
        std::thread::sleep(self.notice);
        Ok(Outcome::ReturnToMenu)
    }

    fn report(&mut self, e: &anyhow::Error) -> Result<()> {
        warn!("{e:#}");
        self.prompter.notice(&format!("Error: {e:#}"), Tone::Error)?;
        std::thread::sleep(self.notice);
        Ok(())
    }
}
