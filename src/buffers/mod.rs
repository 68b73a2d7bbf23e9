//! Trajectory buffers
use crate::hindsight::Trajectory;
use std::collections::{vec_deque, VecDeque};
use thiserror::Error;

/// Error appending a trajectory to a buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Error)]
pub enum BufferError {
    #[error("episode of {len} steps does not fit in a buffer of capacity {capacity}")]
    EpisodeTooLong { len: usize, capacity: usize },
    #[error("cannot store an empty episode")]
    EmptyEpisode,
}

/// A destination for whole-episode trajectories.
pub trait TrajectoryBuffer {
    fn append(&mut self, trajectory: Trajectory) -> Result<(), BufferError>;
}

impl<B: TrajectoryBuffer + ?Sized> TrajectoryBuffer for &'_ mut B {
    #[inline]
    fn append(&mut self, trajectory: Trajectory) -> Result<(), BufferError> {
        B::append(self, trajectory)
    }
}

/// Unbounded buffer
impl TrajectoryBuffer for Vec<Trajectory> {
    fn append(&mut self, trajectory: Trajectory) -> Result<(), BufferError> {
        if trajectory.is_empty() {
            return Err(BufferError::EmptyEpisode);
        }
        self.push(trajectory);
        Ok(())
    }
}

/// Replay buffer of whole episodes with a bounded total number of steps.
///
/// When full, the oldest episodes are dropped to make room.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeReplay {
    episodes: VecDeque<Trajectory>,
    /// Maximum number of stored steps.
    capacity: usize,
    /// Number of stored steps.
    num_steps: usize,
    /// Total number of steps appended to this buffer over its lifetime.
    ///
    /// Includes steps from old episodes that are dropped to make room in the buffer.
    total_step_count: u64,
}

impl EpisodeReplay {
    /// Create a new `EpisodeReplay` with space for `capacity` steps.
    #[must_use]
    pub const fn with_capacity(capacity: usize) -> Self {
        Self {
            episodes: VecDeque::new(),
            capacity,
            num_steps: 0,
            total_step_count: 0,
        }
    }

    /// The step capacity of the buffer.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of steps stored in the buffer.
    #[must_use]
    pub const fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// The number of episodes stored in the buffer.
    #[must_use]
    pub fn num_episodes(&self) -> usize {
        self.episodes.len()
    }

    #[must_use]
    pub const fn total_step_count(&self) -> u64 {
        self.total_step_count
    }

    /// Iterator over the stored episodes, oldest first.
    pub fn episodes(&self) -> vec_deque::Iter<Trajectory> {
        self.episodes.iter()
    }

    /// The `i`-th stored episode, oldest first.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&Trajectory> {
        self.episodes.get(i)
    }

    /// The most recently appended episode.
    #[must_use]
    pub fn last(&self) -> Option<&Trajectory> {
        self.episodes.back()
    }

    /// Remove all episodes. The lifetime step count is kept.
    pub fn clear(&mut self) {
        self.episodes.clear();
        self.num_steps = 0;
    }
}

impl TrajectoryBuffer for EpisodeReplay {
    fn append(&mut self, trajectory: Trajectory) -> Result<(), BufferError> {
        let len = trajectory.len();
        if len == 0 {
            return Err(BufferError::EmptyEpisode);
        }
        if len > self.capacity {
            return Err(BufferError::EpisodeTooLong {
                len,
                capacity: self.capacity,
            });
        }
        while self.num_steps + len > self.capacity {
            // Drop the oldest episode to free up space.
            match self.episodes.pop_front() {
                Some(oldest) => self.num_steps -= oldest.len(),
                None => break,
            }
        }
        self.episodes.push_back(trajectory);
        self.num_steps += len;
        self.total_step_count += len as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hindsight::testing::line_trajectory;
    use rstest::{fixture, rstest};

    fn episode(len: usize) -> Trajectory {
        #[allow(clippy::cast_precision_loss)]
        let positions: Vec<f64> = (1..=len).map(|i| i as f64 / 10.0).collect();
        line_trajectory(&positions, 1.0)
    }

    #[fixture]
    fn buffer() -> EpisodeReplay {
        EpisodeReplay::with_capacity(7)
    }

    /// Comprehensive test of [`EpisodeReplay`] happy-path
    #[rstest]
    fn comprehensive(mut buffer: EpisodeReplay) {
        let ep1 = episode(3);
        buffer.append(ep1.clone()).unwrap();
        assert_eq!(buffer.num_steps(), 3);
        assert_eq!(buffer.num_episodes(), 1);
        assert_eq!(buffer.last(), Some(&ep1));

        let ep2 = episode(2);
        buffer.append(ep2.clone()).unwrap();
        assert_eq!(buffer.num_steps(), 5);
        assert_eq!(buffer.num_episodes(), 2);
        assert!(buffer.episodes().eq([&ep1, &ep2]));

        // Overflows and causes the first episode to be dropped
        let ep3 = episode(4);
        buffer.append(ep3.clone()).unwrap();
        assert_eq!(buffer.num_steps(), 6);
        assert_eq!(buffer.num_episodes(), 2);
        assert!(buffer.episodes().eq([&ep2, &ep3]));
        assert_eq!(buffer.total_step_count(), 9);

        // Exactly fills the buffer, dropping everything else
        let ep4 = episode(7);
        buffer.append(ep4.clone()).unwrap();
        assert_eq!(buffer.num_steps(), 7);
        assert_eq!(buffer.get(0), Some(&ep4));
        assert_eq!(buffer.get(1), None);
        assert_eq!(buffer.total_step_count(), 16);
    }

    #[rstest]
    fn episode_too_long(mut buffer: EpisodeReplay) {
        buffer.append(episode(2)).unwrap();
        assert_eq!(
            buffer.append(episode(8)),
            Err(BufferError::EpisodeTooLong {
                len: 8,
                capacity: 7
            })
        );
        // Unchanged
        assert_eq!(buffer.num_steps(), 2);
        assert_eq!(buffer.total_step_count(), 2);
    }

    #[rstest]
    fn empty_episode(mut buffer: EpisodeReplay) {
        let empty = episode(1).truncate(0).unwrap();
        assert_eq!(buffer.append(empty), Err(BufferError::EmptyEpisode));
        assert_eq!(buffer.num_episodes(), 0);
    }

    #[rstest]
    fn clear_keeps_total(mut buffer: EpisodeReplay) {
        buffer.append(episode(3)).unwrap();
        buffer.clear();
        assert_eq!(buffer.num_steps(), 0);
        assert_eq!(buffer.num_episodes(), 0);
        assert_eq!(buffer.total_step_count(), 3);
    }

    #[test]
    fn vec_buffer() {
        let mut buffer: Vec<Trajectory> = Vec::new();
        TrajectoryBuffer::append(&mut buffer, episode(2)).unwrap();
        assert_eq!(buffer.len(), 1);
    }
}
