use crate::game::{Intent, PlayerIndex};
use nalgebra::Point2;

/// Puck-chasing agent.
///
/// Holds nothing but the index of the player it steers; the movement intent
/// is recomputed from scratch every tick.
#[derive(Debug, Clone)]
pub struct SteeringAgent {
    pub player: PlayerIndex,
}

impl SteeringAgent {
    pub fn new(player: PlayerIndex) -> Self {
        SteeringAgent { player }
    }

    /// Simple pursuit: head straight at the target. No prediction, no
    /// obstacle avoidance. Coincident positions yield the neutral intent.
    pub fn follow(&self, agent_pos: Point2<f32>, target_pos: Point2<f32>) -> Intent {
        let diff = target_pos - agent_pos;
        if diff.norm_squared() < f32::EPSILON {
            Intent::neutral()
        } else {
            Intent {
                heading: diff.normalize(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::point;

    #[test]
    fn heads_straight_at_the_target() {
        let agent = SteeringAgent::new(PlayerIndex(0));
        let intent = agent.follow(point![1.0, 1.0], point![4.0, 5.0]);
        assert!((intent.heading.x - 0.6).abs() < 1e-6);
        assert!((intent.heading.y - 0.8).abs() < 1e-6);
    }

    #[test]
    fn coincident_positions_give_neutral_intent() {
        let agent = SteeringAgent::new(PlayerIndex(0));
        for p in [point![0.0, 0.0], point![30.5, 15.0], point![-3.0, 7.5]] {
            assert!(agent.follow(p, p).is_neutral());
        }
    }
}
