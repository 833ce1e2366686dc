// src/ranking.rs

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{history::HistoryStats, user::UserProfile};

const SCORE_WEIGHT: f64 = 0.5;
const TESTS_WEIGHT: f64 = 0.3;
const QUESTIONS_WEIGHT: f64 = 0.2;

/// Scores are percentages, so they normalize against a fixed ceiling.
const SCORE_CEILING: f64 = 100.0;

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedUser {
    /// 1-based position after sorting.
    pub rank: usize,
    pub user: UserProfile,
    pub tests_completed: usize,
    pub average_score: f64,
    pub questions_attempted: i64,
    /// Weighted, normalized composite in `[0, 1]`.
    pub composite_score: f64,
}

/// Ranks users by a weighted mix of mean score, test count and volume of
/// attempted questions.
///
/// `histories` is keyed by email. Users without any history are left out.
/// Test and question counts are normalized by the largest value among the
/// ranked users (at least 1); the mean score by 100. The sort is stable, so
/// ties keep the order of `users`.
pub fn rank_users(
    users: &[UserProfile],
    histories: &HashMap<String, Vec<HistoryStats>>,
) -> Vec<RankedUser> {
    let stats: Vec<(&UserProfile, usize, f64, i64)> = users
        .iter()
        .filter_map(|user| {
            let history = histories.get(&user.email).filter(|h| !h.is_empty())?;
            let tests_completed = history.len();
            let questions_attempted: i64 = history.iter().map(|h| h.attempted_questions).sum();
            let average_score = history.iter().map(|h| h.score_percentage).sum::<f64>()
                / tests_completed as f64;
            Some((user, tests_completed, average_score, questions_attempted))
        })
        .collect();

    if stats.is_empty() {
        return Vec::new();
    }

    let max_tests = stats.iter().map(|s| s.1).max().unwrap_or(1).max(1) as f64;
    let max_questions = stats.iter().map(|s| s.3).max().unwrap_or(1).max(1) as f64;

    let mut ranked: Vec<RankedUser> = stats
        .into_iter()
        .map(|(user, tests_completed, average_score, questions_attempted)| {
            let composite_score = SCORE_WEIGHT * (average_score / SCORE_CEILING)
                + TESTS_WEIGHT * (tests_completed as f64 / max_tests)
                + QUESTIONS_WEIGHT * (questions_attempted as f64 / max_questions);
            RankedUser {
                rank: 0,
                user: user.clone(),
                tests_completed,
                average_score,
                questions_attempted,
                composite_score,
            }
        })
        .collect();

    // `sort_by` is stable: equal composites keep their input order.
    ranked.sort_by(|a, b| b.composite_score.total_cmp(&a.composite_score));

    for (index, entry) in ranked.iter_mut().enumerate() {
        entry.rank = index + 1;
    }

    ranked
}

/// Rank and composite score of one user, if they are on the board.
pub fn rank_of(ranked: &[RankedUser], email: &str) -> Option<(usize, f64)> {
    ranked
        .iter()
        .find(|r| r.user.email == email)
        .map(|r| (r.rank, r.composite_score))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, email: &str) -> UserProfile {
        UserProfile {
            id,
            name: format!("User {}", id),
            email: email.to_string(),
            initials: "U".to_string(),
        }
    }

    fn stats(score: f64, attempted: i64) -> HistoryStats {
        HistoryStats {
            score_percentage: score,
            attempted_questions: attempted,
        }
    }

    #[test]
    fn test_users_without_history_are_excluded() {
        let users = vec![user(1, "a@x.io"), user(2, "b@x.io"), user(3, "c@x.io")];
        let mut histories = HashMap::new();
        histories.insert("a@x.io".to_string(), vec![stats(50.0, 4)]);
        histories.insert("b@x.io".to_string(), vec![]);

        let ranked = rank_users(&users, &histories);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].user.email, "a@x.io");
        assert_eq!(ranked[0].rank, 1);
    }

    #[test]
    fn test_sole_perfect_user_scores_one() {
        let users = vec![user(1, "a@x.io")];
        let mut histories = HashMap::new();
        histories.insert("a@x.io".to_string(), vec![stats(100.0, 1)]);

        let ranked = rank_users(&users, &histories);
        // 0.5 from the score term, then 0.3 + 0.2 from being the maximum.
        assert!((ranked[0].composite_score - 1.0).abs() < 1e-12);
        assert!((ranked[0].composite_score - 0.5 - 0.3 - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let users = vec![user(1, "z@x.io"), user(2, "a@x.io"), user(3, "m@x.io")];
        let mut histories = HashMap::new();
        for u in &users {
            histories.insert(u.email.clone(), vec![stats(70.0, 10)]);
        }

        let ranked = rank_users(&users, &histories);
        let order: Vec<i64> = ranked.iter().map(|r| r.user.id).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(
            ranked.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_weighted_ordering() {
        let users = vec![user(1, "a@x.io"), user(2, "b@x.io")];
        let mut histories = HashMap::new();
        // a: one perfect test with 2 questions.
        histories.insert("a@x.io".to_string(), vec![stats(100.0, 2)]);
        // b: four average tests with 40 questions in total.
        histories.insert(
            "b@x.io".to_string(),
            vec![stats(60.0, 10), stats(60.0, 10), stats(60.0, 10), stats(60.0, 10)],
        );

        let ranked = rank_users(&users, &histories);
        // a = 0.5 + 0.3 * 0.25 + 0.2 * 0.05 = 0.585
        // b = 0.3 + 0.3 + 0.2 = 0.8
        assert_eq!(ranked[0].user.email, "b@x.io");
        assert!((ranked[0].composite_score - 0.8).abs() < 1e-9);
        assert!((ranked[1].composite_score - 0.585).abs() < 1e-9);
        assert_eq!(rank_of(&ranked, "a@x.io").map(|r| r.0), Some(2));
        assert_eq!(rank_of(&ranked, "nobody@x.io"), None);
    }

    #[test]
    fn test_zero_attempts_do_not_divide_by_zero() {
        let users = vec![user(1, "a@x.io")];
        let mut histories = HashMap::new();
        histories.insert("a@x.io".to_string(), vec![stats(0.0, 0)]);

        let ranked = rank_users(&users, &histories);
        assert!((ranked[0].composite_score - 0.3).abs() < 1e-12);
    }
}
