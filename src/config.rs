//! Collection configuration
use crate::buffers::EpisodeReplay;
use crate::hindsight::GoalEnvironment;
use crate::simulation::HindsightCollector;
use serde::{Deserialize, Serialize};

/// Configuration for a [`HindsightCollector`] storing into an [`EpisodeReplay`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Maximum number of steps per episode.
    pub max_episode_steps: usize,
    /// Replay buffer capacity in steps.
    pub buffer_capacity: usize,
    /// Whether to add a hindsight-relabeled copy of each episode.
    pub relabel: bool,
    /// Seed of the environment random state.
    pub seed: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_episode_steps: 200,
            buffer_capacity: 100_000,
            relabel: true,
            seed: 0,
        }
    }
}

impl CollectorConfig {
    pub const fn build_buffer(&self) -> EpisodeReplay {
        EpisodeReplay::with_capacity(self.buffer_capacity)
    }

    pub fn build_collector<E: GoalEnvironment>(
        &self,
        env: E,
    ) -> HindsightCollector<E, EpisodeReplay> {
        HindsightCollector::new(
            env,
            self.build_buffer(),
            self.max_episode_steps,
            self.relabel,
            self.seed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hindsight::testing::LineEnv;

    #[test]
    fn json_round_trip() {
        let config = CollectorConfig {
            max_episode_steps: 50,
            ..CollectorConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<CollectorConfig>(&json).unwrap(), config);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: CollectorConfig = serde_json::from_str(r#"{"relabel": false}"#).unwrap();
        assert_eq!(
            config,
            CollectorConfig {
                relabel: false,
                ..CollectorConfig::default()
            }
        );
    }

    #[test]
    fn build_collector() {
        let config = CollectorConfig {
            buffer_capacity: 10,
            max_episode_steps: 4,
            ..CollectorConfig::default()
        };
        let mut collector = config.build_collector(LineEnv::new(0.9));
        assert_eq!(collector.buffer.capacity(), 10);
        assert_eq!(collector.max_episode_steps, 4);
        let summary = collector
            .run_episode(&mut crate::simulation::RandomActor::new(1, -1.0, 1.0, 0), &mut ())
            .unwrap();
        assert_eq!(summary.len, 4);
        assert_eq!(collector.buffer.num_episodes(), 2);
    }
}
