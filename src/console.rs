//! Line-oriented terminal front-end
//!
//! Renders bot lines from the session's notifications and turns typed
//! lines into session events. Numbered choices are offered while a
//! category or tenancy type is being picked; everything else is free text.

use crate::backend::Document;
use crate::catalog::{CategoryCatalog, CategoryEntry, Subtype};
use crate::runtime::{SessionClosed, SessionHandle, SessionSnapshot, UiEvent};
use crate::state_machine::FlowState;
use crate::store::{DisplayMessage, Sender};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

/// Fallback when the suggested name has no usable file component
const FALLBACK_FILE_NAME: &str = "letter.docx";

const STILL_WAITING: &str = "Still waiting for a reply. Type /cancel to stop waiting.";
const PICK_FIRST: &str = "Please pick one of the numbered options first.";

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Terminal I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Session(#[from] SessionClosed),
}

/// What a typed line means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 1-based index into the choices on screen
    Choose(usize),
    Text(String),
    Cancel,
    Letter,
    Quit,
    Help,
    Blank,
}

/// Interpret one input line. Bare numbers are choices only while a menu is shown.
pub fn parse_command(line: &str, menu_shown: bool) -> Command {
    let line = line.trim();
    match line {
        "" => Command::Blank,
        "/cancel" => Command::Cancel,
        "/letter" => Command::Letter,
        "/quit" | "/exit" => Command::Quit,
        "/help" => Command::Help,
        _ => match line.parse::<usize>() {
            Ok(n) if menu_shown && n > 0 => Command::Choose(n),
            _ => Command::Text(line.to_string()),
        },
    }
}

/// Why free text cannot be sent right now, if it cannot
fn text_refusal(snapshot: &SessionSnapshot) -> Option<&'static str> {
    if snapshot.flags.busy {
        return Some(STILL_WAITING);
    }
    match snapshot.state {
        FlowState::SelectingCategory | FlowState::SelectingSubtype => Some(PICK_FIRST),
        _ => None,
    }
}

/// Tenancy types the backend holds templates for, for the chosen category
fn subtype_choices(snapshot: &SessionSnapshot, catalog: &CategoryCatalog) -> Vec<Subtype> {
    snapshot
        .selection
        .category
        .as_ref()
        .and_then(|category| catalog.get(category.as_str()))
        .map_or_else(|| Subtype::CHOICES.to_vec(), CategoryEntry::subtype_choices)
}

/// Number of numbered choices shown, if a menu is shown at all
fn menu_len(snapshot: &SessionSnapshot, catalog: &CategoryCatalog) -> Option<usize> {
    match snapshot.state {
        FlowState::SelectingCategory => Some(catalog.entries().len()),
        FlowState::SelectingSubtype => Some(subtype_choices(snapshot, catalog).len()),
        _ => None,
    }
}

/// The session's letter, unless it is the one already saved
fn unsaved_document(
    snapshot: &SessionSnapshot,
    saved: Option<&Arc<Document>>,
) -> Option<Arc<Document>> {
    let document = snapshot.document.as_ref()?;
    match saved {
        Some(saved) if Arc::ptr_eq(saved, document) => None,
        _ => Some(Arc::clone(document)),
    }
}

/// Write the letter under `dir`, keeping only the file component of its name
pub async fn save_document(dir: &Path, document: &Document) -> io::Result<PathBuf> {
    let name = Path::new(&document.file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(FALLBACK_FILE_NAME);

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, &document.bytes).await?;
    Ok(path)
}

pub struct Console {
    handle: SessionHandle,
    catalog: CategoryCatalog,
    output_dir: PathBuf,
    saved: Option<Arc<Document>>,
}

impl Console {
    pub fn new(handle: SessionHandle, catalog: CategoryCatalog, output_dir: PathBuf) -> Self {
        Self {
            handle,
            catalog,
            output_dir,
            saved: None,
        }
    }

    pub async fn run(mut self) -> Result<(), ConsoleError> {
        let mut events = self.handle.subscribe();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        let snapshot = self.handle.snapshot();
        for message in &snapshot.transcript {
            print_message(message);
        }
        self.print_menu(&snapshot);

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    if !self.handle_line(&line).await? {
                        break;
                    }
                }

                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Console fell behind session notifications");
                        // A skipped download notice is recovered from the snapshot
                        let missed = unsaved_document(&self.handle.snapshot(), self.saved.as_ref());
                        if let Some(document) = missed {
                            self.save(document).await;
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        let snapshot = self.handle.snapshot();
        tracing::info!(
            state = snapshot.state.name(),
            turns = snapshot.turns.len(),
            template = ?snapshot.selection.template_id,
            document_ready = snapshot.flags.document_ready,
            "Console closed"
        );
        Ok(())
    }

    /// Returns false once the person wants to leave
    async fn handle_line(&self, line: &str) -> Result<bool, ConsoleError> {
        let snapshot = self.handle.snapshot();
        match parse_command(line, menu_len(&snapshot, &self.catalog).is_some()) {
            Command::Quit => return Ok(false),
            Command::Blank => {}
            Command::Help => print_help(),
            Command::Cancel => self.handle.cancel().await?,
            Command::Letter => self.handle.request_document().await?,
            Command::Text(text) => self.submit(&snapshot, text).await?,
            Command::Choose(n) => match snapshot.state {
                FlowState::SelectingCategory => match self.catalog.entries().get(n - 1) {
                    Some(entry) => {
                        self.handle
                            .select_category(entry.category.as_str(), entry.label.clone())
                            .await?;
                    }
                    None => self.print_menu(&snapshot),
                },
                FlowState::SelectingSubtype => {
                    match subtype_choices(&snapshot, &self.catalog).get(n - 1) {
                        Some(subtype) => self.handle.select_subtype(*subtype).await?,
                        None => self.print_menu(&snapshot),
                    }
                }
                _ => self.submit(&snapshot, n.to_string()).await?,
            },
        }
        Ok(true)
    }

    async fn submit(&self, snapshot: &SessionSnapshot, text: String) -> Result<(), SessionClosed> {
        if let Some(reason) = text_refusal(snapshot) {
            println!("   [{reason}]");
            return Ok(());
        }
        self.handle.submit_text(text).await
    }

    async fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Message { message } => {
                // The person's own lines are already on screen
                if message.sender == Sender::Bot {
                    print_message(&message);
                }
            }
            UiEvent::StateChange { state, flags } => {
                tracing::debug!(state = state.name(), busy = flags.busy, "Console state");
                self.print_menu(&self.handle.snapshot());
            }
            UiEvent::DocumentReady { document } => self.save(document).await,
        }
    }

    async fn save(&mut self, document: Arc<Document>) {
        match save_document(&self.output_dir, &document).await {
            Ok(path) => {
                println!("   [letter saved to {}]", path.display());
                self.saved = Some(document);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to save letter");
                println!("   [could not save the letter: {e}]");
            }
        }
    }

    fn print_menu(&self, snapshot: &SessionSnapshot) {
        match snapshot.state {
            FlowState::SelectingCategory => {
                for (i, entry) in self.catalog.entries().iter().enumerate() {
                    println!("   {}. {}", i + 1, entry.label);
                }
            }
            FlowState::SelectingSubtype => {
                for (i, subtype) in subtype_choices(snapshot, &self.catalog).iter().enumerate() {
                    println!("   {}. {}", i + 1, subtype.label());
                }
            }
            _ => {}
        }
    }
}

fn print_message(message: &DisplayMessage) {
    match message.sender {
        Sender::Bot => println!("bot> {}", message.text),
        Sender::User => println!("you> {}", message.text),
    }
}

fn print_help() {
    println!("   /cancel  stop waiting for the current reply");
    println!("   /letter  ask for the letter again");
    println!("   /quit    leave");
}
