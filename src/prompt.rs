use anyhow::Result;
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{Clear, ClearType};
use std::io::{self, BufRead, StdinLock, Stdout, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    /// Why the choice cannot be picked, if it cannot.
    pub disabled: Option<String>,
}

impl Choice {
    pub fn enabled(label: &str) -> Self {
        Self {
            label: label.to_string(),
            disabled: None,
        }
    }

    pub fn disabled_if(label: &str, disabled: bool, reason: &str) -> Self {
        Self {
            label: label.to_string(),
            disabled: disabled.then(|| reason.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Error,
}

/// Interactive questions asked by the menu loop. `None` means input ended.
pub trait Prompter {
    fn header(&mut self) -> Result<()>;
    /// Index of the picked choice; disabled choices are never returned.
    fn select(&mut self, message: &str, choices: &[Choice]) -> Result<Option<usize>>;
    fn input(&mut self, message: &str) -> Result<Option<String>>;
    fn notice(&mut self, message: &str, tone: Tone) -> Result<()>;
}

/// Line-based prompter over a reader and a writer, stdin/stdout in practice.
pub struct ConsolePrompter<R, W> {
    input: R,
    out: W,
}

impl ConsolePrompter<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePrompter<R, W> {
    pub fn new(input: R, out: W) -> Self {
        Self { input, out }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut s = String::new();
        if self.input.read_line(&mut s)? == 0 {
            return Ok(None);
        }
        if s.ends_with('\n') {
            s.pop();
            if s.ends_with('\r') {
                s.pop();
            }
        }
        Ok(Some(s))
    }
}

impl<R: BufRead, W: Write> Prompter for ConsolePrompter<R, W> {
    fn header(&mut self) -> Result<()> {
        queue!(
            self.out,
            Clear(ClearType::All),
            MoveTo(0, 0),
            Print(
                " CR OTP - Secure CLI Tool for Managing Your One-Time Password Secrets "
                    .black()
                    .on_white()
            ),
            Print("\n\n")
        )?;
        self.out.flush()?;
        Ok(())
    }

    fn select(&mut self, message: &str, choices: &[Choice]) -> Result<Option<usize>> {
        writeln!(self.out, "{}", message.bold())?;
        for (i, choice) in choices.iter().enumerate() {
            match &choice.disabled {
                None => writeln!(self.out, "  {}) {}", i + 1, choice.label)?,
                Some(reason) => writeln!(
                    self.out,
                    "  {}",
                    format!("{}) {} ({reason})", i + 1, choice.label).dark_grey()
                )?,
            }
        }

        loop {
            write!(self.out, "> ")?;
            self.out.flush()?;
            let Some(line) = self.read_line()? else {
                return Ok(None);
            };

            let picked = line
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .filter(|&i| choices.get(i).is_some_and(|c| c.disabled.is_none()));
            match picked {
                Some(i) => return Ok(Some(i)),
                None => writeln!(self.out, "Please pick one of the available options.")?,
            }
        }
    }

    fn input(&mut self, message: &str) -> Result<Option<String>> {
        write!(self.out, "{message} ")?;
        self.out.flush()?;
        self.read_line()
    }

    fn notice(&mut self, message: &str, tone: Tone) -> Result<()> {
        match tone {
            Tone::Success => writeln!(self.out, "\n{}", message.green())?,
            Tone::Error => writeln!(self.out, "\n{}", message.red())?,
        }
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(input: &str) -> ConsolePrompter<Cursor<Vec<u8>>, Vec<u8>> {
        ConsolePrompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn choices() -> Vec<Choice> {
        vec![
            Choice::disabled_if("Show", true, "No secrets configured"),
            Choice::enabled("Add"),
        ]
    }

    #[test]
    fn select_returns_zero_based_index() {
        let mut p = prompter("2\n");
        assert_eq!(p.select("Pick:", &choices()).unwrap(), Some(1));

        let shown = String::from_utf8_lossy(&p.out).to_string();
        assert!(shown.contains("Pick:"));
        assert!(shown.contains("2) Add"));
        assert!(shown.contains("No secrets configured"));
    }

    #[test]
    fn select_reprompts_on_disabled_or_invalid() {
        let mut p = prompter("1\nfoo\n7\n0\n2\r\n");
        assert_eq!(p.select("Pick:", &choices()).unwrap(), Some(1));

        let shown = String::from_utf8_lossy(&p.out).to_string();
        assert_eq!(shown.matches("Please pick one").count(), 4);
    }

    #[test]
    fn disabled_choice_carries_reason() {
        let [show, add] = <[Choice; 2]>::try_from(choices()).unwrap();
        assert_eq!(show.disabled.as_deref(), Some("No secrets configured"));
        assert_eq!(add, Choice::disabled_if("Add", false, "unused"));
        assert!(format!("{show:?}").contains("No secrets configured"));
    }

    #[test]
    fn end_of_input_is_none() {
        let mut p = prompter("");
        assert_eq!(p.select("Pick:", &choices()).unwrap(), None);
        assert_eq!(p.input("Name:").unwrap(), None);
    }

    #[test]
    fn input_strips_line_ending() {
        let mut p = prompter("github\r\n  spaced  \n");
        assert_eq!(p.input("Name:").unwrap().as_deref(), Some("github"));
        assert_eq!(p.input("Name:").unwrap().as_deref(), Some("  spaced  "));
    }
}
