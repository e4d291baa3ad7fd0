//! The payoff matrix.
//!
//! ```text
//!                 B cooperates   B defects
//! A cooperates       (3, 3)        (0, 5)
//! A defects          (5, 0)        (1, 1)
//! ```

use dilemma_protocol::Choice;

/// Both cooperate.
pub const REWARD: u32 = 3;
/// Defecting against a cooperator.
pub const TEMPTATION: u32 = 5;
/// Cooperating against a defector.
pub const SUCKER: u32 = 0;
/// Both defect.
pub const PUNISHMENT: u32 = 1;

/// Scores one round. Returns `(points_a, points_b)`.
pub fn score(a: Choice, b: Choice) -> (u32, u32) {
    match (a, b) {
        (Choice::Cooperate, Choice::Cooperate) => (REWARD, REWARD),
        (Choice::Defect, Choice::Cooperate) => (TEMPTATION, SUCKER),
        (Choice::Cooperate, Choice::Defect) => (SUCKER, TEMPTATION),
        (Choice::Defect, Choice::Defect) => (PUNISHMENT, PUNISHMENT),
    }
}
