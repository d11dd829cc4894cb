//! Language model adapter: labeling entity groups and generating exemplars.
//!
//! Implementors supply [`LanguageModel::call`]; the two higher-level
//! operations are built from fixed few-shot prompts on top of it.

use std::num::NonZeroU32;
use std::time::Duration;

use autohist_core::HistogramConfig;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::debug;

use crate::AiError;

/// Label returned when a group has no coherent theme.
pub const NO_LABEL: &str = "none";

const LABEL_PROMPT: &str = "
Entities: rollouts, releases/rollouts, link-outs, rollout, rollouts/releases, deliverables/dependencies
Label: release-related

Entities: unclear, 1265, good, expected, UpToDate, hot, difficult, tomorrow, Russia
Label: none

Entities: Sleep, Making out, Shower, Morning, Funeral, Driving, Eating
Label: activities

Entities: Man, Woman, Nonconforming
Label: genders

Entities: fabulous, outstanding, interesting, delicious, beautiful, interesting, fascinating, awesome, wonderful
Label: positive adjectives

Entities: 1990s, 1970s, Early 2000s, 2000s, 1980s, 1920s, 1980, 1950s, Roaring Twenties
Label: decades
";

const EXEMPLAR_PROMPT: &str = "
Label: activities
Entities: Sleep, Making out, Shower, Morning, Funeral, Driving, Eating

Label: decades
Entities: 1990s, 1970s, Early 2000s, 1980, 1950s, Roaring Twenties

Label: subjects
Entities: English, Post-modernism, Calculous, Robotics, Early french literature

Label: genders
Entities: Man, Woman, Nonconforming
";

pub trait LanguageModel {
    /// Complete `prompt`. May block for a long time (network, rate limits).
    fn call(&mut self, prompt: &str) -> Result<String, AiError>;

    /// Name a group of entities, most frequent first. Returns [`NO_LABEL`]
    /// when nothing coherent fits.
    fn label(&mut self, top_entities: &[&str]) -> Result<String, AiError> {
        let response = self.call(&label_prompt(top_entities))?;
        Ok(first_line(&response).to_string())
    }

    /// Example entities for `label`, in the order the model gave them.
    fn exemplars(&mut self, label: &str) -> Result<Vec<String>, AiError> {
        let response = self.call(&exemplar_prompt(label))?;
        Ok(parse_exemplars(&response))
    }
}

pub fn label_prompt(top_entities: &[&str]) -> String {
    format!(
        "{LABEL_PROMPT}\nEntities: {}\nLabel: ",
        top_entities.join(", ")
    )
    .to_lowercase()
}

pub fn exemplar_prompt(label: &str) -> String {
    format!("{EXEMPLAR_PROMPT}\nLabel: {label}\nEntities:").to_lowercase()
}

/// First non-empty line of a completion, trimmed.
pub fn first_line(response: &str) -> &str {
    response
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

/// Split a comma-separated completion into trimmed, non-empty items.
pub fn parse_exemplars(response: &str) -> Vec<String> {
    first_line(response)
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether a label means "discard this group".
pub fn is_no_label(label: &str) -> bool {
    let label = label.trim();
    label.is_empty() || label.eq_ignore_ascii_case(NO_LABEL)
}

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// A language model that never exceeds `calls` in any window of `period`.
///
/// Calls are spaced evenly, one every `period / calls`, with no burst: a
/// burst on top of the steady refill would admit up to `2 * calls - 1` calls
/// in one window. A call beyond quota blocks the calling thread until
/// capacity frees; it is never dropped or turned into an error.
pub struct RateLimited<L> {
    inner: L,
    limiter: DirectRateLimiter,
}

impl<L> RateLimited<L> {
    pub fn new(inner: L, calls: u32, period: Duration) -> Result<Self, AiError> {
        if calls == 0 {
            return Err(AiError::InvalidParameter {
                name: "llm_calls_per_period",
                message: "must be > 0".into(),
            });
        }
        let quota = Quota::with_period(period / calls)
            .ok_or_else(|| AiError::InvalidParameter {
                name: "llm_period_secs",
                message: format!("{period:?} is too short for {calls} calls"),
            })?
            .allow_burst(NonZeroU32::MIN);

        Ok(Self {
            inner,
            limiter: RateLimiter::direct(quota),
        })
    }

    pub fn from_config(inner: L, config: &HistogramConfig) -> Result<Self, AiError> {
        Self::new(
            inner,
            config.llm_calls_per_period,
            Duration::from_secs(config.llm_period_secs),
        )
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    pub fn into_inner(self) -> L {
        self.inner
    }
}

impl<L: LanguageModel> LanguageModel for RateLimited<L> {
    fn call(&mut self, prompt: &str) -> Result<String, AiError> {
        if self.limiter.check().is_err() {
            debug!("language model quota exhausted, waiting");
            futures::executor::block_on(self.limiter.until_ready());
        }
        self.inner.call(prompt)
    }
}
