//! Line-oriented terminal front end.
//!
//! Reads one command per line, pumps the coordinator before each, and prints
//! the focused item after navigation and edits.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::coordinator::{Coordinator, CrawlStatus};
use crate::edits::{EditMode, EditOutcome};

/// Suggestions printed by `recent`.
const SUGGESTION_COUNT: usize = 10;

/// How long `wait` blocks for a running crawl.
const WAIT_TIMEOUT: Duration = Duration::from_secs(60);

const HELP: &str = "\
commands:
  n, next            next photo
  p, prev            previous photo
  goto <n>           jump to photo n
  show               show the current photo
  view               open the current photo in the system viewer
  del                toggle delete
  name <text>        rename (\"del\" marks for deletion)
  dir <text>         move under <root>/<text>
  move <dir> <name>  move and rename
  commit             apply all pending edits
  open <root>        crawl a new directory
  stop               stop crawling
  wait               wait for the crawl to finish
  recent [prefix]    recent directories
  status             crawl status
  q, quit            exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Next,
    Prev,
    Goto(usize),
    Show,
    View,
    ToggleDelete,
    Name(String),
    Dir(String),
    Move { dir: String, name: String },
    Commit,
    Open(PathBuf),
    Stop,
    Wait,
    Recent(String),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command {0:?}, try 'help'")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("{0:?} is not a photo number")]
    BadIndex(String),
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let arg = |name: &'static str| {
            if rest.is_empty() {
                Err(ParseError::MissingArgument(name))
            } else {
                Ok(rest.to_owned())
            }
        };

        let cmd = match word {
            "n" | "next" => Self::Next,
            "p" | "prev" => Self::Prev,
            "goto" => {
                let text = arg("goto")?;
                match text.parse::<usize>() {
                    Ok(n) if n > 0 => Self::Goto(n - 1),
                    _ => return Err(ParseError::BadIndex(text)),
                }
            }
            "show" => Self::Show,
            "view" => Self::View,
            "del" => Self::ToggleDelete,
            "name" => Self::Name(arg("name")?),
            "dir" => Self::Dir(arg("dir")?),
            "move" => {
                let text = arg("move")?;
                match text.split_once(char::is_whitespace) {
                    Some((dir, name)) => Self::Move {
                        dir: dir.to_owned(),
                        name: name.trim().to_owned(),
                    },
                    None => return Err(ParseError::MissingArgument("move")),
                }
            }
            "commit" => Self::Commit,
            "open" => Self::Open(PathBuf::from(arg("open")?)),
            "stop" => Self::Stop,
            "wait" => Self::Wait,
            "recent" => Self::Recent(rest.to_owned()),
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "q" | "quit" | "exit" => Self::Quit,
            other => return Err(ParseError::Unknown(other.to_owned())),
        };
        Ok(Some(cmd))
    }
}

pub struct OrganizerApp {
    coordinator: Coordinator,
}

impl OrganizerApp {
    /// Build the coordinator and start crawling the configured root.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut coordinator = Coordinator::new(config).context("failed to start prefetch worker")?;
        let root = config.start_root();
        coordinator
            .start_crawl(root.clone())
            .with_context(|| format!("failed to start crawling {}", root.display()))?;
        Ok(Self { coordinator })
    }

    pub fn from_coordinator(coordinator: Coordinator) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Run against the process's stdin and stdout.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run_with(stdin.lock(), stdout.lock())
    }

    pub fn run_with<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> anyhow::Result<()> {
        writeln!(out, "Organizing {}", self.coordinator.root().display())?;

        for line in input.lines() {
            let line = line.context("failed to read command")?;
            self.coordinator.pump();

            let cmd = match Command::parse(&line) {
                Ok(Some(cmd)) => cmd,
                Ok(None) => continue,
                Err(e) => {
                    writeln!(out, "{}", e)?;
                    continue;
                }
            };
            debug!(?cmd, "Command");
            if cmd == Command::Quit {
                break;
            }
            self.execute(cmd, &mut out)?;
            out.flush()?;
        }

        self.coordinator.shutdown();
        Ok(())
    }

    fn execute<W: Write>(&mut self, cmd: Command, out: &mut W) -> io::Result<()> {
        let focus = self.coordinator.focus();
        match cmd {
            Command::Next => {
                self.coordinator.next();
                self.show(out)
            }
            Command::Prev => {
                self.coordinator.prev();
                self.show(out)
            }
            Command::Goto(index) => {
                self.coordinator.focus_changed(index);
                self.show(out)
            }
            Command::Show => self.show(out),
            Command::View => match self.coordinator.view_current() {
                Ok(Some(path)) => writeln!(out, "Opened {}", path.display()),
                Ok(None) => writeln!(out, "Nothing to open"),
                Err(e) => writeln!(out, "Cannot open viewer: {}", e),
            },
            Command::ToggleDelete => {
                let outcome = self.coordinator.toggle_delete(focus);
                self.after_edit(outcome, out)
            }
            Command::Name(name) => {
                let outcome = self
                    .coordinator
                    .request_edit(focus, EditMode::FilenameOnly, &name, "");
                self.after_edit(outcome, out)
            }
            Command::Dir(dir) => {
                let outcome = self
                    .coordinator
                    .request_edit(focus, EditMode::DirectoryOnly, "", &dir);
                self.after_edit(outcome, out)
            }
            Command::Move { dir, name } => {
                let outcome = self.coordinator.request_edit(
                    focus,
                    EditMode::FilenameAndDirectory,
                    &name,
                    &dir,
                );
                self.after_edit(outcome, out)
            }
            Command::Commit => {
                match self.coordinator.commit_all() {
                    Ok(report) => writeln!(
                        out,
                        "Committed: {} renamed, {} deleted",
                        report.renamed.len(),
                        report.deleted.len()
                    )?,
                    Err(err) => {
                        writeln!(out, "Commit failed: {}: {}", err, err.failure)?;
                        writeln!(
                            out,
                            "Applied before failure: {} renamed, {} deleted",
                            err.completed.renamed.len(),
                            err.completed.deleted.len()
                        )?;
                    }
                }
                self.show(out)
            }
            Command::Open(root) => match self.coordinator.start_crawl(root.clone()) {
                Ok(()) => writeln!(out, "Organizing {}", root.display()),
                Err(e) => writeln!(out, "Cannot crawl {}: {}", root.display(), e),
            },
            Command::Stop => {
                self.coordinator.cancel_crawl();
                self.status(out)
            }
            Command::Wait => {
                if !self.coordinator.wait_for_crawl(WAIT_TIMEOUT) {
                    writeln!(out, "Still crawling")?;
                }
                self.status(out)
            }
            Command::Recent(prefix) => {
                let suggestions = self.coordinator.suggestions(&prefix, SUGGESTION_COUNT);
                if suggestions.is_empty() {
                    writeln!(out, "No recent directories")
                } else {
                    for dir in suggestions {
                        writeln!(out, "{}", dir)?;
                    }
                    Ok(())
                }
            }
            Command::Status => self.status(out),
            Command::Help => writeln!(out, "{}", HELP),
            Command::Quit => Ok(()),
        }
    }

    /// Applied edits move on to the next photo.
    fn after_edit<W: Write>(&mut self, outcome: EditOutcome, out: &mut W) -> io::Result<()> {
        if outcome.applied() {
            self.show(out)?;
            self.coordinator.next();
            self.show(out)
        } else {
            writeln!(out, "Nothing changed")
        }
    }

    fn show<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        // Sizes are learned by decoding; a failure leaves "Size unknown".
        if let Err(e) = self.coordinator.current_image() {
            debug!(error = %e, "Showing photo without a size");
        }
        match self.coordinator.current_display() {
            Some(display) => writeln!(out, "{}", display),
            None => writeln!(out, "No photos"),
        }
    }

    fn status<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let items = self.coordinator.len();
        match self.coordinator.crawl_status() {
            CrawlStatus::Idle => writeln!(out, "Idle"),
            CrawlStatus::Running => writeln!(out, "Crawling, {} photos so far", items),
            CrawlStatus::Cancelled => writeln!(out, "Crawl stopped, {} photos", items),
            CrawlStatus::Finished { skipped, .. } if skipped > 0 => writeln!(
                out,
                "Crawl finished, {} photos ({} entries unreadable)",
                items, skipped
            ),
            CrawlStatus::Finished { .. } => writeln!(out, "Crawl finished, {} photos", items),
        }
    }
}
