//! Terminal presentation layer.
//!
//! A small interactive loop that issues the user actions (record an
//! idea, edit notes, manage resources, expand, browse and delete saved
//! ideas) and renders the session workspace and the record list.
//! Every error aborts only the command that caused it.

use crate::audio;
use crate::pipeline::ExpansionPipeline;
use crate::record::RecordId;
use crate::store::RecordStore;
use crate::transcriber::{join_segments, Transcriber};
use crate::workspace::SessionWorkspace;
use anyhow::{anyhow, Context};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use url::Url;

const HELP: &str = "\
Commands:
  record           record a new idea from the microphone
  idea <text>      capture a new idea typed instead of spoken
  show             show the current idea
  notes <text>     set the notes on the current idea
  link <url>       attach a resource URL
  unlink <url>     detach a resource URL
  open <n>         open the n-th attached resource in the browser
  expand           regenerate the plan with notes and resources
  list             list saved ideas, most recent first
  use <n>          resume the n-th saved idea
  delete <n>       delete the n-th saved idea
  new              start over with an empty workspace
  help             show this help
  quit             exit";

pub(crate) struct Console {
    pipeline: ExpansionPipeline,
    transcriber: Arc<dyn Transcriber>,
    store: RecordStore,
    workspace: SessionWorkspace,
    language: String,
}

impl Console {
    pub(crate) fn new(
        pipeline: ExpansionPipeline,
        transcriber: Arc<dyn Transcriber>,
        store: RecordStore,
        language: String,
    ) -> Self {
        Self {
            pipeline,
            transcriber,
            store,
            workspace: SessionWorkspace::new(),
            language,
        }
    }

    pub(crate) async fn run(&mut self) -> anyhow::Result<()> {
        let mut editor = DefaultEditor::new()?;
        println!("ThinkFlow: voice-to-idea capture. Type 'help' for commands.");

        loop {
            let line = match editor.readline("> ") {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let _ = editor.add_history_entry(line);

            let (command, rest) = match line.split_once(' ') {
                Some((command, rest)) => (command, rest.trim()),
                None => (line, ""),
            };

            let result = match command {
                "help" => {
                    println!("{HELP}");
                    Ok(())
                }
                "quit" | "exit" => break,
                "record" => self.record_idea(&mut editor).await,
                "idea" => self.typed_idea(rest).await,
                "show" => self.show_current(),
                "notes" => self.edit_notes(rest),
                "link" => self.add_link(rest),
                "unlink" => self.remove_link(rest),
                "open" => self.open_link(rest),
                "expand" => self.expand().await,
                "list" => self.list_ideas(),
                "use" => self.resume_idea(rest),
                "delete" => self.delete_idea(rest),
                "new" => {
                    self.workspace.reset();
                    println!("Started a new idea.");
                    Ok(())
                }
                _ => {
                    println!("Unknown command '{command}'. Type 'help' for commands.");
                    Ok(())
                }
            };

            if let Err(e) = result {
                println!("Error: {e:#}");
            }
        }

        Ok(())
    }

    /// Record from the microphone until Enter, then transcribe and
    /// generate the first plan as a new saved idea.
    async fn record_idea(&mut self, editor: &mut DefaultEditor) -> anyhow::Result<()> {
        let handle = audio::start_capture()?;
        println!("Recording... press Enter to stop.");
        let _ = editor.readline("");

        let recorded = handle.stop();
        if recorded.samples.is_empty() {
            return Err(anyhow!("No audio was captured"));
        }

        let samples = audio::resample_to_target(&recorded);
        let wav = audio::encode_wav(&samples, audio::TARGET_SAMPLE_RATE);

        println!("Transcribing...");
        let segments = self.transcriber.transcribe(wav, &self.language).await?;
        let transcript = join_segments(&segments);
        println!("Transcript: {transcript}");

        self.create_idea(&transcript).await
    }

    /// Capture a typed idea, for sessions without a microphone.
    async fn typed_idea(&mut self, text: &str) -> anyhow::Result<()> {
        self.create_idea(text).await
    }

    async fn create_idea(&mut self, transcript: &str) -> anyhow::Result<()> {
        println!("Generating plan...");
        // The pipeline repoints the workspace only on success; whatever
        // idea was loaded stays intact when generation fails.
        self.pipeline
            .generate_initial(&mut self.store, &mut self.workspace, transcript)
            .await?;
        println!("\n{}\n", self.workspace.response);
        Ok(())
    }

    fn show_current(&self) -> anyhow::Result<()> {
        if self.workspace.transcript.is_empty() {
            println!("No idea loaded. Use 'record', 'idea', or 'use <n>'.");
            return Ok(());
        }
        println!("Transcript: {}", self.workspace.transcript);
        if !self.workspace.notes.is_empty() {
            println!("Notes: {}", self.workspace.notes);
        }
        if !self.workspace.resources.is_empty() {
            println!("Resources:");
            for (i, url) in self.workspace.resources.iter().enumerate() {
                println!("  {}. {url}", i + 1);
            }
        }
        if self.workspace.has_response() {
            println!("\n{}\n", self.workspace.response);
        }
        Ok(())
    }

    fn edit_notes(&mut self, text: &str) -> anyhow::Result<()> {
        if text.is_empty() {
            if self.workspace.notes.is_empty() {
                println!("No notes yet. Use 'notes <text>' to set them.");
            } else {
                println!("Notes: {}", self.workspace.notes);
            }
            return Ok(());
        }
        self.workspace.set_notes(text);
        println!("Notes updated. Run 'expand' to fold them into the plan.");
        Ok(())
    }

    fn add_link(&mut self, raw: &str) -> anyhow::Result<()> {
        let url = Url::parse(raw).context("Not a valid URL")?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(anyhow!("Only http and https URLs are supported"));
        }
        self.workspace.add_resource(url.to_string());
        println!(
            "Resources: {}",
            self.workspace.resources.join(", ")
        );
        Ok(())
    }

    fn remove_link(&mut self, url: &str) -> anyhow::Result<()> {
        if self.workspace.remove_resource(url) {
            println!("Removed {url}");
        } else {
            println!("{url} is not attached to this idea.");
        }
        Ok(())
    }

    fn open_link(&self, raw: &str) -> anyhow::Result<()> {
        let index: usize = raw.parse().context("Expected a resource number")?;
        let url = index
            .checked_sub(1)
            .and_then(|i| self.workspace.resources.get(i))
            .ok_or_else(|| anyhow!("No resource number {index}"))?;
        open::that(url).with_context(|| format!("Failed to open {url}"))?;
        Ok(())
    }

    async fn expand(&mut self) -> anyhow::Result<()> {
        println!("Expanding plan...");
        self.pipeline
            .generate_expansion(&mut self.store, &mut self.workspace)
            .await?;
        println!("\n{}\n", self.workspace.response);
        Ok(())
    }

    fn list_ideas(&self) -> anyhow::Result<()> {
        if self.store.is_empty() {
            println!("No saved ideas yet.");
            return Ok(());
        }
        for (i, record) in self.store.list().enumerate() {
            let marker = if Some(record.id) == self.workspace.current {
                "*"
            } else {
                " "
            };
            println!(
                "{marker}{}. {}  ({})",
                i + 1,
                record.label,
                record.timestamp.format("%Y-%m-%d %H:%M")
            );
        }
        Ok(())
    }

    fn resume_idea(&mut self, raw: &str) -> anyhow::Result<()> {
        let id = self.resolve_index(raw)?;
        // get() cannot miss here; resolve_index found the id in the list.
        if let Some(record) = self.store.get(id) {
            self.workspace.load_from(record);
        }
        self.show_current()
    }

    fn delete_idea(&mut self, raw: &str) -> anyhow::Result<()> {
        let id = self.resolve_index(raw)?;
        self.store.delete(id)?;
        if self.workspace.current == Some(id) {
            self.workspace.reset();
        }
        println!("Deleted.");
        Ok(())
    }

    /// Map a 1-based display position (most recent first) to an identity.
    fn resolve_index(&self, raw: &str) -> anyhow::Result<RecordId> {
        let index: usize = raw.parse().context("Expected an idea number")?;
        index
            .checked_sub(1)
            .and_then(|i| self.store.list().nth(i))
            .map(|record| record.id)
            .ok_or_else(|| anyhow!("No idea number {index}; see 'list'"))
    }
}
