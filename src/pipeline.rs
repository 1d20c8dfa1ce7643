//! Orchestration of prompt construction, generation, and persistence.
//!
//! The pipeline is the only place the store is written: nothing is
//! persisted until a generation call has succeeded, so a failure leaves
//! both the store and the workspace in their last-known-good state.

use crate::error::PipelineError;
use crate::fetcher::ContentFetcher;
use crate::generator::TextGenerator;
use crate::record::{IdeaRecord, RecordId, RecordPatch};
use crate::store::RecordStore;
use crate::workspace::SessionWorkspace;
use tracing::{info, instrument};

/// Per-resource cap on fetched text included in the expansion prompt.
const RESOURCE_TEXT_CAP: usize = 1500;

/// Planner persona shared by both prompts.
const PLANNER_PREAMBLE: &str = "I want you to act like an expert Planner. \
You are a planner of all things. If anyone has an idea, a task or a query, \
you lay out a detailed plan on how to tackle it, how to complete it or how \
to solve it step by step. You are very knowledgeable and know a lot about \
everything.";

pub(crate) struct ExpansionPipeline {
    generator: Box<dyn TextGenerator>,
    fetcher: Box<dyn ContentFetcher>,
}

impl ExpansionPipeline {
    pub(crate) fn new(generator: Box<dyn TextGenerator>, fetcher: Box<dyn ContentFetcher>) -> Self {
        Self { generator, fetcher }
    }

    /// Turn a fresh transcript into a saved idea with its first plan.
    ///
    /// On success a new record is appended to the store and the
    /// workspace is pointed at it. On any failure nothing is persisted.
    #[instrument(skip_all, fields(transcript_len = transcript.len()))]
    pub(crate) async fn generate_initial(
        &self,
        store: &mut RecordStore,
        workspace: &mut SessionWorkspace,
        transcript: &str,
    ) -> Result<RecordId, PipelineError> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(PipelineError::InvalidInput);
        }

        let prompt = initial_prompt(transcript);
        let raw = self.generator.generate(&prompt).await?;
        let response = strip_fences(&raw);

        let record = IdeaRecord::new(transcript.to_string(), response);
        let id = store.append(record.clone())?;
        workspace.load_from(&record);

        info!(%id, "Created idea record");
        Ok(id)
    }

    /// Regenerate the plan for the currently loaded idea, folding in
    /// the user's notes and the text of each linked resource.
    ///
    /// A fetch failure for one URL never aborts the expansion; its
    /// placeholder text goes into the prompt like any other content.
    /// Notes, resources, and the new response are persisted together
    /// in a single update once generation succeeds.
    #[instrument(skip_all, fields(resources = workspace.resources.len()))]
    pub(crate) async fn generate_expansion(
        &self,
        store: &mut RecordStore,
        workspace: &mut SessionWorkspace,
    ) -> Result<(), PipelineError> {
        let id = workspace.current.ok_or(PipelineError::InvalidState)?;

        let mut sections = Vec::with_capacity(workspace.resources.len());
        for url in &workspace.resources {
            let text = self.fetcher.fetch(url).await;
            sections.push(truncate_chars(&text, RESOURCE_TEXT_CAP));
        }
        let web_context = sections.join("\n\n");

        let prompt = expansion_prompt(&workspace.transcript, &workspace.notes, &web_context);
        let raw = self.generator.generate(&prompt).await?;
        let response = strip_fences(&raw);

        store.update(
            id,
            RecordPatch {
                notes: Some(workspace.notes.clone()),
                resources: Some(workspace.resources.clone()),
                response: Some(response.clone()),
            },
        )?;
        workspace.set_response(response);

        info!(%id, "Expanded idea record");
        Ok(())
    }
}

fn initial_prompt(transcript: &str) -> String {
    format!(
        "{PLANNER_PREAMBLE} The person has an idea/task they want to realize \
         as follows: {transcript}. Give an extremely detailed plan in MARKDOWN only."
    )
}

fn expansion_prompt(transcript: &str, notes: &str, web_context: &str) -> String {
    format!(
        "{PLANNER_PREAMBLE} The person has an idea/task they want to realize \
         as follows:\n\n\
         ## Transcript:\n{transcript}\n\n\
         ## User Notes:\n{notes}\n\n\
         ## Resource Content:\n{web_context}\n\n\
         Give an extremely detailed plan in MARKDOWN only."
    )
}

/// Strip a surrounding code fence the model sometimes wraps output in.
///
/// Only a leading fence line (with an optional language tag) and a
/// trailing fence line are removed; this is artifact cleanup, not a
/// markdown parse.
pub(crate) fn strip_fences(text: &str) -> String {
    let mut out = text.trim();

    if out.starts_with("```") {
        if let Some(newline) = out.find('\n') {
            let tag = &out[3..newline];
            if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) {
                out = &out[newline + 1..];
            }
        }
    }

    let trimmed = out.trim_end();
    if let Some(rest) = trimmed.strip_suffix("```") {
        // only a fence when it sits alone on the last line
        if rest.is_empty() || rest.ends_with('\n') {
            out = rest;
        }
    }

    out.trim().to_string()
}

fn truncate_chars(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        text.to_string()
    } else {
        text.chars().take(cap).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// Generator stub that records every prompt and returns a fixed reply.
    struct FixedGenerator {
        reply: String,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl FixedGenerator {
        fn new(reply: &str) -> (Self, Arc<Mutex<Vec<String>>>) {
            let prompts = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    reply: reply.to_string(),
                    prompts: prompts.clone(),
                },
                prompts,
            )
        }
    }

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::InvalidResponse("stubbed outage".into()))
        }
    }

    /// Fetcher stub that fails for URLs containing "down.example".
    struct FlakyFetcher;

    #[async_trait]
    impl ContentFetcher for FlakyFetcher {
        async fn fetch(&self, url: &str) -> String {
            if url.contains("down.example") {
                format!("[Could not fetch {url}: connection timed out]")
            } else {
                format!("content from {url}")
            }
        }
    }

    struct StubFetcher;

    #[async_trait]
    impl ContentFetcher for StubFetcher {
        async fn fetch(&self, _url: &str) -> String {
            "example content".to_string()
        }
    }

    fn pipeline_with(
        generator: Box<dyn TextGenerator>,
        fetcher: Box<dyn ContentFetcher>,
    ) -> ExpansionPipeline {
        ExpansionPipeline::new(generator, fetcher)
    }

    #[tokio::test]
    async fn test_initial_rejects_empty_transcript_without_persisting() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ideas.json");
        let mut store = RecordStore::open(path.clone());
        let mut workspace = SessionWorkspace::new();

        let (generator, _) = FixedGenerator::new("a plan");
        let pipeline = pipeline_with(Box::new(generator), Box::new(StubFetcher));

        let result = pipeline
            .generate_initial(&mut store, &mut workspace, "   ")
            .await;
        assert!(matches!(result, Err(PipelineError::InvalidInput)));
        assert!(store.is_empty());
        assert!(workspace.current.is_none());

        // Nothing was ever written to disk either.
        assert!(RecordStore::open(path).is_empty());
    }

    #[tokio::test]
    async fn test_initial_failure_leaves_store_and_workspace_untouched() {
        let dir = tempdir().unwrap();
        let mut store = RecordStore::open(dir.path().join("ideas.json"));
        let mut workspace = SessionWorkspace::new();

        let pipeline = pipeline_with(Box::new(FailingGenerator), Box::new(StubFetcher));
        let result = pipeline
            .generate_initial(&mut store, &mut workspace, "Build a birdhouse")
            .await;

        assert!(matches!(result, Err(PipelineError::Generation(_))));
        assert!(store.is_empty());
        assert!(workspace.current.is_none());
        assert!(workspace.transcript.is_empty());
    }

    #[tokio::test]
    async fn test_expansion_without_saved_record_is_invalid_state() {
        let dir = tempdir().unwrap();
        let mut store = RecordStore::open(dir.path().join("ideas.json"));
        let mut workspace = SessionWorkspace::new();

        let (generator, _) = FixedGenerator::new("a plan");
        let pipeline = pipeline_with(Box::new(generator), Box::new(StubFetcher));

        let result = pipeline.generate_expansion(&mut store, &mut workspace).await;
        assert!(matches!(result, Err(PipelineError::InvalidState)));
    }

    #[tokio::test]
    async fn test_expansion_failure_keeps_stored_response() {
        let dir = tempdir().unwrap();
        let mut store = RecordStore::open(dir.path().join("ideas.json"));
        let mut workspace = SessionWorkspace::new();

        let (generator, _) = FixedGenerator::new("the original plan");
        let seed = pipeline_with(Box::new(generator), Box::new(StubFetcher));
        let id = seed
            .generate_initial(&mut store, &mut workspace, "Build a birdhouse")
            .await
            .unwrap();

        workspace.set_notes("note to self");
        let failing = pipeline_with(Box::new(FailingGenerator), Box::new(StubFetcher));
        let result = failing.generate_expansion(&mut store, &mut workspace).await;

        assert!(matches!(result, Err(PipelineError::Generation(_))));
        let record = store.get(id).unwrap();
        assert_eq!(record.response, "the original plan");
        assert!(record.notes.is_empty());
        assert_eq!(workspace.response, "the original plan");
    }

    #[tokio::test]
    async fn test_expansion_tolerates_a_failing_fetch() {
        let dir = tempdir().unwrap();
        let mut store = RecordStore::open(dir.path().join("ideas.json"));
        let mut workspace = SessionWorkspace::new();

        let (generator, prompts) = FixedGenerator::new("an expanded plan");
        let pipeline = pipeline_with(Box::new(generator), Box::new(FlakyFetcher));

        pipeline
            .generate_initial(&mut store, &mut workspace, "Build a birdhouse")
            .await
            .unwrap();
        workspace.add_resource("http://one.example/a");
        workspace.add_resource("http://down.example/b");
        workspace.add_resource("http://three.example/c");

        pipeline
            .generate_expansion(&mut store, &mut workspace)
            .await
            .unwrap();

        let prompts = prompts.lock().unwrap();
        let expansion = prompts.last().unwrap();
        assert!(expansion.contains("content from http://one.example/a"));
        assert!(expansion.contains("[Could not fetch http://down.example/b: connection timed out]"));
        assert!(expansion.contains("content from http://three.example/c"));
    }

    #[tokio::test]
    async fn test_initial_then_expansion_scenario() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ideas.json");
        let mut store = RecordStore::open(path.clone());
        let mut workspace = SessionWorkspace::new();

        let (generator, prompts) =
            FixedGenerator::new("```markdown\n1. Gather wood\n2. Cut pieces\n```");
        let pipeline = pipeline_with(Box::new(generator), Box::new(StubFetcher));

        let id = pipeline
            .generate_initial(&mut store, &mut workspace, "Build a birdhouse")
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        let record = store.get(id).unwrap();
        assert_eq!(record.transcript, "Build a birdhouse");
        assert_eq!(record.response, "1. Gather wood\n2. Cut pieces");
        assert!(record.notes.is_empty());
        assert!(record.resources.is_empty());
        assert_eq!(workspace.current, Some(id));

        workspace.add_resource("http://example.com");
        pipeline
            .generate_expansion(&mut store, &mut workspace)
            .await
            .unwrap();

        let record = store.get(id).unwrap();
        assert_eq!(record.resources, vec!["http://example.com".to_string()]);
        assert_eq!(record.response, "1. Gather wood\n2. Cut pieces");

        let prompts = prompts.lock().unwrap();
        assert!(prompts.last().unwrap().contains("example content"));

        // The update survives a reopen.
        let reopened = RecordStore::open(path);
        assert_eq!(reopened.get(id).unwrap().resources.len(), 1);
    }

    #[test]
    fn test_strip_fences_removes_surrounding_fence() {
        assert_eq!(strip_fences("```markdown\na plan\n```"), "a plan");
        assert_eq!(strip_fences("```\na plan\n```"), "a plan");
    }

    #[test]
    fn test_strip_fences_leaves_plain_text_alone() {
        assert_eq!(strip_fences("just a plan"), "just a plan");
        assert_eq!(strip_fences("  padded plan  "), "padded plan");
    }

    #[test]
    fn test_strip_fences_keeps_interior_fences() {
        let text = "Intro\n```rust\nlet x = 1;\n```\nOutro";
        assert_eq!(strip_fences(text), text);
    }

    #[test]
    fn test_truncate_chars_caps_long_text() {
        let text = "abcdef";
        assert_eq!(truncate_chars(text, 4), "abcd");
        assert_eq!(truncate_chars(text, 10), "abcdef");
    }

    #[test]
    fn test_prompts_embed_inputs() {
        let initial = initial_prompt("Build a birdhouse");
        assert!(initial.contains("Build a birdhouse"));
        assert!(initial.contains("MARKDOWN"));

        let expansion = expansion_prompt("transcript text", "note text", "web text");
        assert!(expansion.contains("## Transcript:\ntranscript text"));
        assert!(expansion.contains("## User Notes:\nnote text"));
        assert!(expansion.contains("## Resource Content:\nweb text"));
    }
}
