//! Evaluation harness: run the pipeline over a dataset and score the results.
//!
//! Two rule checks (chunk and question counts within 3..=7) and one
//! LLM-as-judge clarity score. A judge reply that cannot be parsed scores 0
//! with a diagnostic reason; backend failures still propagate.

use std::ops::RangeInclusive;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::LlmConfig;
use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::output_parser::parse_judge_verdict;
use crate::pipeline::Pipeline;
use crate::prompt::render;
use crate::stages::generate;
use crate::types::{PipelineState, DEFAULT_LEVEL};

/// Accepted range for both count checks.
pub const COUNT_RANGE: RangeInclusive<usize> = 3..=7;

/// One dataset row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRow {
    pub topic: String,
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    DEFAULT_LEVEL.to_string()
}

impl EvalRow {
    pub fn new(topic: impl Into<String>, level: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            level: level.into(),
        }
    }
}

/// Parse a dataset from a JSON array of `{topic, level?}` objects.
pub fn parse_dataset(json: &str) -> Result<Vec<EvalRow>> {
    Ok(serde_json::from_str(json)?)
}

/// Read and parse a dataset file.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Vec<EvalRow>> {
    let json = std::fs::read_to_string(path)?;
    parse_dataset(&json)
}

/// The pipeline fields the scorers look at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalOutputs {
    pub raw_explanation: String,
    pub chunks: Vec<String>,
    pub check_questions: Vec<String>,
    pub summary: String,
}

impl From<PipelineState> for EvalOutputs {
    fn from(state: PipelineState) -> Self {
        Self {
            raw_explanation: state.raw_explanation,
            chunks: state.chunks,
            check_questions: state.check_questions,
            summary: state.summary,
        }
    }
}

/// One named score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub name: String,
    pub score: f64,
    /// Measured value for rule checks (e.g. the chunk count).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<usize>,
    /// Judge explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn count_score(name: &str, count: usize) -> Score {
    Score {
        name: name.to_string(),
        score: if COUNT_RANGE.contains(&count) { 1.0 } else { 0.0 },
        value: Some(count),
        reason: None,
    }
}

/// 1.0 iff the chunk count is within [`COUNT_RANGE`].
pub fn chunk_count_ok(outputs: &EvalOutputs) -> Score {
    count_score("chunk_count_ok", outputs.chunks.len())
}

/// 1.0 iff the question count is within [`COUNT_RANGE`].
pub fn question_count_ok(outputs: &EvalOutputs) -> Score {
    count_score("question_count_ok", outputs.check_questions.len())
}

const JUDGE_TEMPLATE: &str = r#"You are evaluating the clarity of an explanation for a learner.

Topic: {topic}
Level: {level}

Explanation:
"""{explanation}"""

Please rate how clear, accurate, and appropriate this explanation is for the given learner level.

Respond ONLY as a JSON object with the following structure:
{{
  "score": <number from 1 to 5>,
  "reason": "<short explanation of your rating>"
}}
"#;

/// LLM-as-judge scoring of explanation clarity for the learner level.
pub struct ClarityJudge {
    ctx: ExecCtx,
    llm: LlmConfig,
}

impl ClarityJudge {
    pub const NAME: &'static str = "clarity_for_level";

    pub fn new(ctx: ExecCtx) -> Self {
        Self {
            ctx,
            llm: LlmConfig::default(),
        }
    }

    pub fn with_config(mut self, llm: LlmConfig) -> Self {
        self.llm = llm;
        self
    }

    fn prompt(row: &EvalRow, outputs: &EvalOutputs) -> String {
        render(
            JUDGE_TEMPLATE,
            &[
                ("topic", row.topic.as_str()),
                ("level", row.level.as_str()),
                ("explanation", outputs.raw_explanation.as_str()),
            ],
        )
    }

    /// Ask the judge model for a verdict.
    ///
    /// An unparseable reply scores 0 with the reply in the reason.
    pub async fn judge(&self, row: &EvalRow, outputs: &EvalOutputs) -> Result<Score> {
        let response = generate(
            &self.ctx,
            Self::NAME,
            Self::prompt(row, outputs),
            &self.llm,
        )
        .await?;

        let (score, reason) = match parse_judge_verdict(&response.text) {
            Ok(verdict) => (verdict.score, verdict.reason),
            Err(e) => {
                warn!(error = %e, "judge reply was not a JSON verdict");
                (
                    0.0,
                    format!("Could not parse JSON from response: {}", response.text),
                )
            }
        };

        Ok(Score {
            name: Self::NAME.to_string(),
            score,
            value: None,
            reason: Some(reason),
        })
    }
}

/// Everything recorded for one dataset row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub row: EvalRow,
    pub outputs: EvalOutputs,
    pub scores: Vec<Score>,
}

impl EvalReport {
    pub fn score(&self, name: &str) -> Option<f64> {
        self.scores.iter().find(|s| s.name == name).map(|s| s.score)
    }
}

/// Runs rows through a [`Pipeline`] and scores each result.
pub struct Evaluator {
    pipeline: Pipeline,
    judge: Option<ClarityJudge>,
}

impl Evaluator {
    /// Evaluator with only the rule checks.
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            judge: None,
        }
    }

    /// Add the clarity judge.
    pub fn with_judge(mut self, judge: ClarityJudge) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Evaluate rows one at a time, in order.
    pub async fn evaluate(&self, rows: &[EvalRow]) -> Result<Vec<EvalReport>> {
        let mut reports = Vec::with_capacity(rows.len());

        for (index, row) in rows.iter().enumerate() {
            let state = self.pipeline.run(&row.topic, &row.level).await?;
            let outputs = EvalOutputs::from(state);

            let mut scores = vec![chunk_count_ok(&outputs), question_count_ok(&outputs)];
            if let Some(judge) = &self.judge {
                scores.push(judge.judge(row, &outputs).await?);
            }

            info!(
                row = index,
                topic = %row.topic,
                chunks = outputs.chunks.len(),
                questions = outputs.check_questions.len(),
                "row evaluated"
            );
            reports.push(EvalReport {
                row: row.clone(),
                outputs,
                scores,
            });
        }

        Ok(reports)
    }
}

/// Mean of one score name across reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub name: String,
    pub mean: f64,
    pub count: usize,
}

/// Mean score per name, in first-seen order.
pub fn summarize_reports(reports: &[EvalReport]) -> Vec<ScoreSummary> {
    let mut summaries: Vec<ScoreSummary> = Vec::new();
    for score in reports.iter().flat_map(|r| &r.scores) {
        match summaries.iter_mut().find(|s| s.name == score.name) {
            Some(summary) => {
                summary.mean += score.score;
                summary.count += 1;
            }
            None => summaries.push(ScoreSummary {
                name: score.name.clone(),
                mean: score.score,
                count: 1,
            }),
        }
    }
    for summary in &mut summaries {
        summary.mean /= summary.count as f64;
    }
    summaries
}
