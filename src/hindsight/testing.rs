//! Scripted goal environments and trajectories for tests.
use super::goal::{CompositeGoal, Criterion, ScalarGoal};
use super::observation::{Observation, Step, Trajectory};
use super::wrapper::GoalEnvironment;
use crate::tree::{ArrayTree, Tree};
use crate::Prng;
use ndarray::ArrayD;

const STEP_SIZE: f64 = 0.1;

fn action_delta(action: &ArrayD<f64>, i: usize) -> f64 {
    action.iter().nth(i).map_or(0.0, |&a| a.clamp(-1.0, 1.0)) * STEP_SIZE
}

/// A point moving along `[0, 1]` towards a scalar goal position.
///
/// Observation: `[position, velocity]`. Reward `-1` per step until within `0.05` of the goal.
#[derive(Debug, Clone, PartialEq)]
pub struct LineEnv {
    pub goal: f64,
    pub position: f64,
    pub velocity: f64,
    goals: ScalarGoal,
}

impl LineEnv {
    pub const fn new(goal: f64) -> Self {
        Self {
            goal,
            position: 0.0,
            velocity: 0.0,
            goals: ScalarGoal {
                tolerance: 0.05,
                criterion: Criterion::Within,
            },
        }
    }

    fn observation(&self) -> ArrayTree {
        ArrayTree::from_vec(vec![self.position, self.velocity])
    }
}

impl GoalEnvironment for LineEnv {
    type Goals = ScalarGoal;

    fn reset(&mut self, _: &mut Prng) -> ArrayTree {
        self.position = 0.0;
        self.velocity = 0.0;
        self.observation()
    }

    fn step(&mut self, action: &ArrayD<f64>, _: &mut Prng) -> (ArrayTree, f64, bool) {
        let next = (self.position + action_delta(action, 0)).clamp(0.0, 1.0);
        self.velocity = next - self.position;
        self.position = next;
        let done = (self.position - self.goal).abs() <= self.goals.tolerance;
        (self.observation(), if done { 0.0 } else { -1.0 }, done)
    }

    fn achieved_goal(&self) -> ArrayTree {
        ArrayTree::scalar(self.position)
    }

    fn desired_goal(&self) -> ArrayTree {
        ArrayTree::scalar(self.goal)
    }

    fn goal_space(&self) -> &ScalarGoal {
        &self.goals
    }
}

fn reach_goal(gripper: [f64; 3], block: [f64; 3]) -> ArrayTree {
    Tree::record([
        ("gripper", ArrayTree::from_vec(gripper.to_vec())),
        ("block", ArrayTree::from_vec(block.to_vec())),
    ])
}

/// A gripper holding a block, both of which should reach a target position.
#[derive(Debug, Clone, PartialEq)]
pub struct ReachEnv {
    pub target: [f64; 3],
    pub gripper: [f64; 3],
    goals: CompositeGoal,
}

impl ReachEnv {
    pub fn new(target: [f64; 3]) -> Self {
        Self {
            target,
            gripper: [0.0; 3],
            goals: CompositeGoal::default(),
        }
    }

    fn observation(&self) -> ArrayTree {
        Tree::record([
            ("gripper", ArrayTree::from_vec(self.gripper.to_vec())),
            ("grip", ArrayTree::scalar(1.0)),
        ])
    }
}

impl GoalEnvironment for ReachEnv {
    type Goals = CompositeGoal;

    fn reset(&mut self, _: &mut Prng) -> ArrayTree {
        self.gripper = [0.0; 3];
        self.observation()
    }

    fn step(&mut self, action: &ArrayD<f64>, _: &mut Prng) -> (ArrayTree, f64, bool) {
        for (i, x) in self.gripper.iter_mut().enumerate() {
            *x += action_delta(action, i);
        }
        let distance = self
            .gripper
            .iter()
            .zip(&self.target)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt();
        let done = distance < self.goals.geofence;
        (self.observation(), if done { 0.0 } else { -1.0 }, done)
    }

    fn achieved_goal(&self) -> ArrayTree {
        reach_goal(self.gripper, self.gripper)
    }

    fn desired_goal(&self) -> ArrayTree {
        reach_goal(self.target, self.target)
    }

    fn goal_space(&self) -> &CompositeGoal {
        &self.goals
    }
}

/// A non-terminating line trajectory that visits `positions`, starting from `0.0`.
pub fn line_trajectory(positions: &[f64], goal: f64) -> Trajectory {
    let obs = |position: f64, velocity: f64| {
        Observation::new(
            ArrayTree::from_vec(vec![position, velocity]),
            ArrayTree::scalar(position),
            ArrayTree::scalar(goal),
        )
    };
    let mut previous = 0.0;
    let steps: Vec<_> = positions
        .iter()
        .map(|&position| {
            let step = Step {
                o1: obs(previous, 0.0),
                a: ArrayTree::from_vec(vec![position - previous]),
                r: -1.0,
                o2: obs(position, position - previous),
                t: false,
            };
            previous = position;
            step
        })
        .collect();
    Trajectory::from_steps(steps).unwrap()
}

/// A non-terminating reach trajectory in which the gripper and block move to `[x, 0, 0]`
/// for each `x` in `positions`, with target `[1, 0, 0]`.
pub fn reach_trajectory(positions: &[f64]) -> Trajectory {
    let target = reach_goal([1.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
    let obs = |x: f64| {
        let p = [x, 0.0, 0.0];
        Observation::new(
            Tree::record([
                ("gripper", ArrayTree::from_vec(p.to_vec())),
                ("grip", ArrayTree::scalar(1.0)),
            ]),
            reach_goal(p, p),
            target.clone(),
        )
    };
    let mut previous = 0.0;
    let steps: Vec<_> = positions
        .iter()
        .map(|&x| {
            let step = Step {
                o1: obs(previous),
                a: ArrayTree::from_vec(vec![x - previous, 0.0, 0.0]),
                r: -1.0,
                o2: obs(x),
                t: false,
            };
            previous = x;
            step
        })
        .collect();
    Trajectory::from_steps(steps).unwrap()
}
