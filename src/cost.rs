//! Cost estimation from token usage.
//!
//! `cost = input_tokens * price_in + output_tokens * price_out`, with prices
//! in USD per token. No rounding happens until [`format_cost`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::backend::TokenUsage;
use crate::error::Result;
use crate::events::{Event, EventHandler};
use crate::PipelineError;

/// Price of one model, in USD per token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input: f64,
    pub output: f64,
}

impl ModelPrice {
    /// Build from the usual "USD per million tokens" figures.
    pub fn per_million(input: f64, output: f64) -> Self {
        Self {
            input: input / 1_000_000.0,
            output: output / 1_000_000.0,
        }
    }

    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        usage.input_tokens as f64 * self.input + usage.output_tokens as f64 * self.output
    }
}

/// Model name → price lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    prices: HashMap<String, ModelPrice>,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::empty()
            .with_model("gpt-4o-mini", ModelPrice::per_million(0.15, 0.60))
            .with_model("gpt-4.1-mini", ModelPrice::per_million(0.40, 1.60))
    }
}

impl PriceTable {
    /// A table with no models.
    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    /// Add or replace a model's price.
    pub fn with_model(mut self, model: impl Into<String>, price: ModelPrice) -> Self {
        self.prices.insert(model.into(), price);
        self
    }

    pub fn get(&self, model: &str) -> Option<&ModelPrice> {
        self.prices.get(model)
    }

    /// Estimated USD cost of `usage` on `model`.
    pub fn estimate(&self, model: &str, usage: &TokenUsage) -> Result<f64> {
        let price = self.get(model).ok_or_else(|| {
            PipelineError::InvalidConfig(format!("no price known for model '{}'", model))
        })?;
        Ok(price.cost(usage))
    }
}

/// Estimate against the default [`PriceTable`].
///
/// ```
/// use chunkbuddy::backend::TokenUsage;
/// use chunkbuddy::cost::{estimate_cost, format_cost};
///
/// let cost = estimate_cost("gpt-4o-mini", &TokenUsage::new(1_000, 500)).unwrap();
/// assert_eq!(format_cost(cost), "$0.00045000");
/// ```
pub fn estimate_cost(model: &str, usage: &TokenUsage) -> Result<f64> {
    PriceTable::default().estimate(model, usage)
}

/// Format a cost as dollars with 8 decimal places.
pub fn format_cost(cost: f64) -> String {
    format!("${:.8}", cost)
}

/// [`EventHandler`] that sums token usage per model across generation calls.
///
/// Install it on an [`ExecCtx`](crate::ExecCtx) (wrapped in an `Arc`) and
/// read the totals after a run.
#[derive(Debug, Default)]
pub struct UsageTracker {
    inner: Mutex<Totals>,
}

#[derive(Debug, Default)]
struct Totals {
    calls: usize,
    by_model: HashMap<String, TokenUsage>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Totals> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Generation calls observed (including those without usage counters).
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    /// Usage summed over all models.
    pub fn total(&self) -> TokenUsage {
        let mut total = TokenUsage::default();
        for usage in self.lock().by_model.values() {
            total += *usage;
        }
        total
    }

    /// Usage per model name.
    pub fn by_model(&self) -> HashMap<String, TokenUsage> {
        self.lock().by_model.clone()
    }

    /// Estimated cost of everything observed so far.
    ///
    /// Fails if any observed model is missing from `prices`.
    pub fn estimated_cost(&self, prices: &PriceTable) -> Result<f64> {
        self.lock()
            .by_model
            .iter()
            .map(|(model, usage)| prices.estimate(model, usage))
            .sum()
    }

    pub fn reset(&self) {
        *self.lock() = Totals::default();
    }
}

impl EventHandler for UsageTracker {
    fn on_event(&self, event: Event) {
        if let Event::Generation { model, usage, .. } = event {
            let mut totals = self.lock();
            totals.calls += 1;
            if let Some(usage) = usage {
                *totals.by_model.entry(model).or_default() += usage;
            }
        }
    }
}
