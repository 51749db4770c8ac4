//! Built-in providers that never leave the process.
//!
//! Every call sleeps for the configured delay and then returns a
//! deterministic artifact, so a full run can be exercised offline.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

use contentflow_config::Config;
use contentflow_utils::types::{RunId, StageId};

use crate::{
    AudioProvider, MetadataSink, ProviderError, PublishMetadata, PublishProvider, TextProvider,
    VideoProvider,
};

/// Text pool the simulated text provider draws from.
pub const RHYMES: [&str; 5] = [
    "In the digital space where the data flows free,\nAI creates content for you and for me,\nFrom words to music, videos so bright,\nAutomation working day and night.",
    "Algorithms dance with creative might,\nGenerating rhymes from morning to night,\nWith sheets and logs keeping track so clean,\nThe most efficient workflow ever seen.",
    "Cloud-based systems working in sync,\nCreating content faster than you can blink,\nFrom idea to YouTube in automated flow,\nWatching your channel continuously grow.",
    "Neural networks weaving words so fine,\nEvery syllable perfectly in line,\nMusic and video come alive with ease,\nAutomation sailing on digital seas.",
    "Innovation sparks in silicon dreams,\nContent creation flows in endless streams,\nFrom rhyme to rhythm, video to view,\nAI makes magic, always something new.",
];

/// Length of the hex digest used in simulated media references
const REF_DIGEST_LEN: usize = 16;

/// Simulated implementation of all five provider traits.
#[derive(Debug, Default)]
pub struct SimulatedProviders {
    delay: Duration,
    fail_stage: Option<StageId>,
    next_rhyme: AtomicUsize,
}

impl SimulatedProviders {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Delay and failing stage from `[providers.simulated]`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.simulated_delay()).failing_at(config.providers.simulated.fail_stage)
    }

    /// Report an outage whenever the provider behind `stage` is called.
    #[must_use]
    pub fn failing_at(mut self, stage: Option<StageId>) -> Self {
        self.fail_stage = stage;
        self
    }

    async fn call(&self, stage: StageId) -> Result<(), ProviderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        debug!(provider = "simulated", stage = %stage, "Simulated provider call");
        if self.fail_stage == Some(stage) {
            return Err(ProviderError::Outage(format!(
                "simulated {stage} provider unavailable"
            )));
        }
        Ok(())
    }

    /// A seed always selects the same rhyme; without one the pool rotates.
    fn pick_rhyme(&self, seed: Option<&str>) -> &'static str {
        let index = match seed {
            Some(seed) => {
                let hash = blake3::hash(seed.as_bytes());
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&hash.as_bytes()[..8]);
                (u64::from_le_bytes(bytes) % RHYMES.len() as u64) as usize
            }
            None => self.next_rhyme.fetch_add(1, Ordering::Relaxed) % RHYMES.len(),
        };
        RHYMES[index]
    }
}

fn digest(parts: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(&[0]);
    }
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..REF_DIGEST_LEN].to_string()
}

#[async_trait]
impl TextProvider for SimulatedProviders {
    async fn generate(&self, seed: Option<&str>) -> Result<String, ProviderError> {
        self.call(StageId::Text).await?;
        Ok(self.pick_rhyme(seed).to_string())
    }
}

#[async_trait]
impl MetadataSink for SimulatedProviders {
    async fn record(&self, run_id: &RunId, _text: &str) -> Result<String, ProviderError> {
        self.call(StageId::Metadata).await?;
        Ok(format!("sheet-row:{run_id}"))
    }
}

#[async_trait]
impl AudioProvider for SimulatedProviders {
    async fn synthesize(&self, text: &str) -> Result<String, ProviderError> {
        self.call(StageId::Audio).await?;
        Ok(format!("/api/audio/{}.mp3", digest(&[text])))
    }
}

#[async_trait]
impl VideoProvider for SimulatedProviders {
    async fn synthesize(&self, text: &str, audio_ref: &str) -> Result<String, ProviderError> {
        self.call(StageId::Video).await?;
        Ok(format!("/api/video/{}.mp4", digest(&[text, audio_ref])))
    }
}

#[async_trait]
impl PublishProvider for SimulatedProviders {
    async fn publish(
        &self,
        _video_ref: &str,
        metadata: &PublishMetadata,
    ) -> Result<String, ProviderError> {
        self.call(StageId::Publish).await?;
        Ok(format!("https://youtube.com/watch?v={}", metadata.run_id))
    }
}
