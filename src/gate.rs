//! Terminal review gate
//!
//! Presents the form for a suspended thread and turns the editor's typed
//! answer into a [`RecordUpdate`] for `resume`. Reads and writes through
//! generic handles so it can be driven from a script as well as a terminal.

use std::io::{BufRead, Write};

use crate::article::{ArticleRecord, FormNumber, RecordUpdate};
use crate::workflow::RunOutcome;
use crate::Result;

/// What the editor chose at a gate
#[derive(Debug, Clone, PartialEq)]
pub enum GateAnswer {
    /// Resume the thread with this update
    Resume(RecordUpdate),
    /// Leave the thread suspended
    Quit,
}

/// Choice typed at a review prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewChoice {
    Accept,
    Revise,
    Cancel,
    Quit,
    Help,
}

impl ReviewChoice {
    pub fn parse(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "a" | "accept" | "y" | "yes" | "ok" | "" => ReviewChoice::Accept,
            "r" | "revise" | "e" | "edit" => ReviewChoice::Revise,
            "c" | "cancel" | "reject" => ReviewChoice::Cancel,
            "q" | "quit" | "later" => ReviewChoice::Quit,
            _ => ReviewChoice::Help,
        }
    }
}

const RULE_WIDTH: usize = 60;

/// Interactive gate over a reader and a writer
pub struct TerminalGate<R, W> {
    input: R,
    output: W,
    default_words: u32,
}

impl TerminalGate<std::io::StdinLock<'static>, std::io::Stdout> {
    /// Gate on the process's stdin and stdout
    pub fn stdio(default_words: u32) -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout(), default_words)
    }
}

impl<R: BufRead, W: Write> TerminalGate<R, W> {
    pub fn new(input: R, output: W, default_words: u32) -> Self {
        Self {
            input,
            output,
            default_words,
        }
    }

    /// Present the form for a suspended outcome and collect the answer
    pub fn ask(&mut self, outcome: &RunOutcome) -> Result<GateAnswer> {
        let record = outcome.record();
        match record.form_number {
            FormNumber::Intake => self.intake(),
            FormNumber::OutlineReview => {
                self.header("Significant items")?;
                writeln!(self.output, "{}\n", record.items_text())?;
                self.review(None)
            }
            FormNumber::ArticleReview => {
                self.show_article(record)?;
                self.review(record.critique.as_deref())
            }
            FormNumber::Finished => Ok(GateAnswer::Quit),
        }
    }

    fn header(&mut self, title: &str) -> Result<()> {
        let rule = "-".repeat(RULE_WIDTH);
        writeln!(self.output, "\n{}\n{}\n{}", rule, title, rule)?;
        Ok(())
    }

    fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        write!(self.output, "{}", label)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn intake(&mut self) -> Result<GateAnswer> {
        self.header("New article")?;
        let source = loop {
            match self.prompt("Source document (URL or path, empty to quit): ")? {
                None => return Ok(GateAnswer::Quit),
                Some(s) if s.trim().is_empty() => return Ok(GateAnswer::Quit),
                Some(s) => break s.trim().to_string(),
            }
        };

        let words = loop {
            let answer = self
                .prompt(&format!("Article length in words [{}]: ", self.default_words))?
                .unwrap_or_default();
            if answer.trim().is_empty() {
                break self.default_words;
            }
            match answer.trim().parse::<u32>() {
                Ok(words) if words > 0 => break words,
                _ => writeln!(self.output, "Please enter a whole number of words")?,
            }
        };

        let update = if source.starts_with("http://") || source.starts_with("https://") {
            RecordUpdate::new().url(&source)
        } else {
            RecordUpdate::new().file(&source)
        };
        Ok(GateAnswer::Resume(update.words(words)))
    }

    fn show_article(&mut self, record: &ArticleRecord) -> Result<()> {
        self.header(record.title.as_deref().unwrap_or("(untitled)"))?;
        if let Some(date) = &record.date {
            writeln!(self.output, "{}\n", date)?;
        }
        writeln!(self.output, "{}\n", record.body.as_deref().unwrap_or_default())?;
        if let Some(message) = &record.message {
            writeln!(self.output, "Writer's note: {}\n", message)?;
        }
        match &record.critique {
            Some(critique) => writeln!(self.output, "Suggested critique:\n{}\n", critique)?,
            None => writeln!(self.output, "The critic had no suggestions.\n")?,
        }
        Ok(())
    }

    /// Accept, revise or cancel; `suggested` is offered as the default critique
    fn review(&mut self, suggested: Option<&str>) -> Result<GateAnswer> {
        loop {
            let Some(answer) = self.prompt("[a]ccept  [r]evise  [c]ancel  [q]uit for now > ")?
            else {
                return Ok(GateAnswer::Quit);
            };

            match ReviewChoice::parse(&answer) {
                ReviewChoice::Accept => return Ok(GateAnswer::Resume(RecordUpdate::new().accept())),
                ReviewChoice::Cancel => return Ok(GateAnswer::Resume(RecordUpdate::new().cancel())),
                ReviewChoice::Quit => return Ok(GateAnswer::Quit),
                ReviewChoice::Revise => {
                    let label = if suggested.is_some() {
                        "What should change? (empty keeps the suggested critique) > "
                    } else {
                        "What should change? > "
                    };
                    let critique = self.prompt(label)?.unwrap_or_default();
                    let critique = match (critique.trim(), suggested) {
                        ("", Some(suggested)) => suggested.to_string(),
                        ("", None) => {
                            writeln!(self.output, "A revision needs a critique")?;
                            continue;
                        }
                        (text, _) => text.to_string(),
                    };
                    return Ok(GateAnswer::Resume(RecordUpdate::new().revise(&critique)));
                }
                ReviewChoice::Help => {
                    writeln!(self.output, "Commands:")?;
                    writeln!(self.output, "  a/accept   - Continue without changes")?;
                    writeln!(self.output, "  r/revise   - Ask for changes")?;
                    writeln!(self.output, "  c/cancel   - Abandon the article")?;
                    writeln!(self.output, "  q/quit     - Leave the thread suspended")?;
                }
            }
        }
    }
}
