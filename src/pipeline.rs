//! Pipeline orchestrator: draft → chunk → questions → summarize.
//!
//! The topology is fixed. Each stage reads the accumulated
//! [`PipelineState`], returns a [`StageUpdate`], and the orchestrator merges
//! that update before moving on. A backend failure in any stage aborts the
//! run and is returned unchanged; no partial state escapes.

use tracing::{info, info_span, Instrument};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::events::Event;
use crate::exec_ctx::ExecCtx;
use crate::stages::{
    ChunkExplanation, DraftExplanation, GenerateCheckQuestions, Stage, SummarizeAndMeta,
};
use crate::types::{PipelineProgress, PipelineState, StageUpdate};
use crate::PipelineError;

/// The four-stage explanation pipeline.
///
/// # Example
///
/// ```no_run
/// use chunkbuddy::{ExecCtx, Pipeline};
/// use chunkbuddy::config::Settings;
///
/// # async fn example() -> chunkbuddy::Result<()> {
/// let ctx = ExecCtx::from_settings(&Settings::from_env()?)?;
/// let pipeline = Pipeline::builder(ctx).build()?;
/// let state = pipeline.run("TLS handshake", "beginner").await?;
/// println!("{}", state.summary);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    ctx: ExecCtx,
    stages: Vec<Box<dyn Stage>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("ctx", &self.ctx)
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder(ctx: ExecCtx) -> PipelineBuilder {
        PipelineBuilder {
            ctx,
            config: PipelineConfig::default(),
        }
    }

    /// The execution context stages run against.
    pub fn ctx(&self) -> &ExecCtx {
        &self.ctx
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run all stages for a fresh state built from `topic` and `level`.
    ///
    /// A blank `level` means `"beginner"`.
    pub async fn run(&self, topic: &str, level: &str) -> Result<PipelineState> {
        self.run_state(PipelineState::new(topic, level)).await
    }

    /// Run all stages starting from `initial`.
    pub async fn run_state(&self, initial: PipelineState) -> Result<PipelineState> {
        self.run_with_progress(initial, |_| {}).await
    }

    /// Run all stages, calling `on_progress` before each one starts.
    pub async fn run_with_progress<F>(
        &self,
        initial: PipelineState,
        mut on_progress: F,
    ) -> Result<PipelineState>
    where
        F: FnMut(PipelineProgress),
    {
        let span = info_span!("pipeline", topic = %initial.topic, level = %initial.level);
        async move {
            let total_stages = self.stages.len();
            let mut state = initial;

            for (stage_index, stage) in self.stages.iter().enumerate() {
                on_progress(PipelineProgress {
                    stage_index,
                    total_stages,
                    stage_name: stage.name().to_string(),
                });

                let update = self.run_stage(stage.as_ref(), &state).await?;
                state.merge(update);
            }

            info!(
                chunks = state.chunks.len(),
                questions = state.check_questions.len(),
                notes = state.meta.learning_design_notes.len(),
                "pipeline complete"
            );
            Ok(state)
        }
        .instrument(span)
        .await
    }

    async fn run_stage(&self, stage: &dyn Stage, state: &PipelineState) -> Result<StageUpdate> {
        let name = stage.name();
        self.ctx.emit(Event::StageStart {
            name: name.to_string(),
        });

        let result = stage
            .run(&self.ctx, state)
            .instrument(info_span!("stage", name))
            .await
            .and_then(|update| check_ownership(stage, update));

        self.ctx.emit(Event::StageEnd {
            name: name.to_string(),
            ok: result.is_ok(),
        });
        result
    }
}

/// Reject updates that write fields the stage does not own.
fn check_ownership(stage: &dyn Stage, update: StageUpdate) -> Result<StageUpdate> {
    let owned = stage.owns();
    if let Some(field) = update.fields().into_iter().find(|f| !owned.contains(f)) {
        return Err(PipelineError::StageFailed {
            stage: stage.name().to_string(),
            message: format!("wrote {:?}, which it does not own", field),
        });
    }
    Ok(update)
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    ctx: ExecCtx,
    config: PipelineConfig,
}

impl PipelineBuilder {
    /// Set the stage knobs. Default: [`PipelineConfig::default`].
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration and assemble the four stages.
    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;
        let config = &self.config;
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(DraftExplanation::new(config)),
            Box::new(ChunkExplanation::new(config)),
            Box::new(GenerateCheckQuestions::new(config)),
            Box::new(SummarizeAndMeta::new(config)),
        ];
        Ok(Pipeline {
            ctx: self.ctx,
            stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockReply;
    use crate::backend::MockBackend;
    use crate::events::FnEventHandler;
    use crate::stages::BoxFut;
    use crate::types::StateField;
    use std::sync::{Arc, Mutex};

    const KAFKA_CHUNKS: &str = "Chunk 1: What a partition is\n\nA partition is a slice of a topic.\n\nChunk 2: Why partitions matter\n\nThey enable parallelism.";

    fn ctx(mock: Arc<MockBackend>) -> ExecCtx {
        ExecCtx::builder("http://unused").backend(mock).build().unwrap()
    }

    fn pipeline(mock: Arc<MockBackend>) -> Pipeline {
        Pipeline::builder(ctx(mock)).build().unwrap()
    }

    #[test]
    fn test_fixed_stage_order() {
        let p = pipeline(Arc::new(MockBackend::fixed("x")));
        assert_eq!(
            p.stage_names(),
            vec![
                "draft_explanation",
                "chunk_explanation",
                "generate_check_questions",
                "summarize_and_meta"
            ]
        );
        assert!(format!("{:?}", p).contains("summarize_and_meta"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Pipeline::builder(ctx(Arc::new(MockBackend::fixed("x"))))
            .config(PipelineConfig::default().with_chunk_target(""))
            .build();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_end_to_end_kafka() {
        let mock = Arc::new(MockBackend::new(vec![
            "Partitions split a topic into ordered logs.".into(),
            KAFKA_CHUNKS.into(),
            "1. What is a partition?\n2. Why do partitions enable parallelism?".into(),
            "Summary: Partitions split topics for parallelism.\n- Chunking reduces load.".into(),
        ]));
        let p = pipeline(mock.clone());

        let state = p.run("Kafka partitions", "beginner").await.unwrap();

        assert_eq!(state.topic, "Kafka partitions");
        assert_eq!(state.level, "beginner");
        assert_eq!(state.raw_explanation, "Partitions split a topic into ordered logs.");
        assert_eq!(
            state.chunks,
            vec![
                "Chunk 1: What a partition is\n\nA partition is a slice of a topic.",
                "Chunk 2: Why partitions matter\n\nThey enable parallelism.",
            ]
        );
        assert_eq!(
            state.check_questions,
            vec!["What is a partition?", "Why do partitions enable parallelism?"]
        );
        assert_eq!(state.summary, "Partitions split topics for parallelism.");
        assert_eq!(state.meta.learning_design_notes, vec!["Chunking reduces load."]);
        assert_eq!(state.meta.num_chunks, 2);
        assert_eq!(state.meta.num_questions, 2);
        assert_eq!(mock.call_count(), 4);

        // each stage sees the previous stage's output
        let requests = mock.requests();
        assert!(requests[1]
            .last_user_content()
            .unwrap()
            .contains("Partitions split a topic into ordered logs."));
        assert!(requests[2].last_user_content().unwrap().contains("They enable parallelism."));
        assert!(requests[3].last_user_content().unwrap().contains("- What is a partition?"));
    }

    #[tokio::test]
    async fn test_empty_explanation_skips_middle_stages() {
        let mock = Arc::new(MockBackend::new(vec![
            "".into(),
            "Summary: Nothing to see.".into(),
        ]));
        let p = pipeline(mock.clone());

        let state = p.run("Empty", "").await.unwrap();

        // draft + summarize only
        assert_eq!(mock.call_count(), 2);
        assert!(state.chunks.is_empty());
        assert!(state.check_questions.is_empty());
        assert_eq!(state.summary, "Nothing to see.");
        assert_eq!(state.meta.num_chunks, 0);
        assert_eq!(state.meta.num_questions, 0);
    }

    #[tokio::test]
    async fn test_backend_failure_aborts_run_unchanged() {
        let mock = Arc::new(MockBackend::scripted(vec![
            MockReply::text("An explanation."),
            MockReply::error(503, "upstream overloaded"),
        ]));
        let p = pipeline(mock.clone());

        let err = p.run("Kafka", "beginner").await.unwrap_err();

        match err {
            PipelineError::HttpError { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "upstream overloaded");
            }
            other => panic!("expected HttpError, got {:?}", other),
        }
        assert_eq!(mock.call_count(), 2, "no stage runs after the failure");
    }

    #[tokio::test]
    async fn test_progress_and_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mock = Arc::new(MockBackend::new(vec!["".into(), "Summary: s.".into()]));
        let ctx = ExecCtx::builder("http://unused")
            .backend(mock)
            .event_handler(Arc::new(FnEventHandler(move |e: Event| {
                sink.lock().unwrap().push(e)
            })))
            .build()
            .unwrap();
        let p = Pipeline::builder(ctx).build().unwrap();

        let mut progress = Vec::new();
        p.run_with_progress(PipelineState::new("t", "beginner"), |pr| progress.push(pr))
            .await
            .unwrap();

        assert_eq!(progress.len(), 4);
        assert_eq!(progress[2].stage_index, 2);
        assert_eq!(progress[2].total_stages, 4);
        assert_eq!(progress[2].stage_name, "generate_check_questions");

        let events = events.lock().unwrap();
        let starts = events.iter().filter(|e| matches!(e, Event::StageStart { .. })).count();
        let skips = events.iter().filter(|e| matches!(e, Event::StageSkipped { .. })).count();
        let gens = events.iter().filter(|e| matches!(e, Event::Generation { .. })).count();
        assert_eq!((starts, skips, gens), (4, 2, 2));
        assert_eq!(
            events.last(),
            Some(&Event::StageEnd {
                name: "summarize_and_meta".into(),
                ok: true
            })
        );
    }

    #[tokio::test]
    async fn test_run_state_keeps_supplied_fields() {
        let mock = Arc::new(MockBackend::new(vec![
            "fresh".into(),
            "plain paragraph".into(),
            "What now?".into(),
            "Summary: done.".into(),
        ]));
        let p = pipeline(mock);
        let initial = PipelineState::new("Raft", "advanced");

        let state = p.run_state(initial).await.unwrap();
        assert_eq!(state.level, "advanced");
        assert_eq!(state.chunks, vec!["plain paragraph"]);
        assert_eq!(state.check_questions, vec!["What now?"]);
    }

    struct Rogue;

    impl Stage for Rogue {
        fn name(&self) -> &'static str {
            "rogue"
        }

        fn owns(&self) -> &'static [StateField] {
            &[StateField::Chunks]
        }

        fn run<'a>(
            &'a self,
            _ctx: &'a ExecCtx,
            _state: &'a PipelineState,
        ) -> BoxFut<'a, Result<StageUpdate>> {
            Box::pin(async { Ok(StageUpdate::raw_explanation("overwritten")) })
        }
    }

    #[tokio::test]
    async fn test_stage_writing_foreign_field_fails() {
        let p = Pipeline {
            ctx: ctx(Arc::new(MockBackend::fixed("x"))),
            stages: vec![Box::new(Rogue)],
        };

        let err = p.run("t", "beginner").await.unwrap_err();
        match err {
            PipelineError::StageFailed { stage, message } => {
                assert_eq!(stage, "rogue");
                assert!(message.contains("RawExplanation"));
            }
            other => panic!("expected StageFailed, got {:?}", other),
        }
    }
}
