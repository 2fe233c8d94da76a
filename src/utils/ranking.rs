// src/utils/ranking.rs

use chrono::{DateTime, Utc};

/// The fields of an evaluated attempt that ranking cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedAttempt {
    pub attempt_id: i64,
    pub user_id: i64,
    pub score: i32,
    pub submitted_at: DateTime<Utc>,
}

/// Integer percentage score, rounded half-up.
///
/// `total` must be > 0; zero-question quizzes are rejected before scoring
/// ever runs.
pub fn percentage_score(correct: i64, total: i64) -> i32 {
    ((correct * 100 + total / 2) / total) as i32
}

/// Number of attempts admitted to the winning cohort: the top `pct` percent
/// of `total` evaluated attempts, rounded up, never less than one.
pub fn cohort_size(total: usize, pct: f64) -> usize {
    let raw = (total as f64 * pct / 100.0).ceil() as usize;
    raw.max(1)
}

/// Orders attempts for allocation: score descending, earlier submission
/// winning ties.
pub fn rank(attempts: &mut [RankedAttempt]) {
    attempts.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.submitted_at.cmp(&b.submitted_at))
    });
}

/// Selects the winning cohort from already-evaluated attempts: rank, take
/// the top slice, drop zero-scorers.
pub fn select_winners(mut attempts: Vec<RankedAttempt>, pct: f64) -> Vec<RankedAttempt> {
    if attempts.is_empty() {
        return attempts;
    }
    let size = cohort_size(attempts.len(), pct);
    rank(&mut attempts);
    attempts.truncate(size);
    attempts.retain(|a| a.score > 0);
    attempts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn attempt(id: i64, score: i32, secs: i64) -> RankedAttempt {
        RankedAttempt {
            attempt_id: id,
            user_id: id,
            score,
            submitted_at: at(secs),
        }
    }

    #[test]
    fn score_rounds_half_up() {
        assert_eq!(percentage_score(1, 3), 33);
        assert_eq!(percentage_score(2, 3), 67);
        assert_eq!(percentage_score(1, 2), 50);
        assert_eq!(percentage_score(1, 8), 13); // 12.5 rounds up
        assert_eq!(percentage_score(0, 5), 0);
        assert_eq!(percentage_score(5, 5), 100);
    }

    #[test]
    fn cohort_size_rounds_up_with_floor_of_one() {
        assert_eq!(cohort_size(7, 10.0), 1);
        assert_eq!(cohort_size(23, 10.0), 3);
        assert_eq!(cohort_size(10, 10.0), 1);
        assert_eq!(cohort_size(11, 10.0), 2);
        assert_eq!(cohort_size(1, 0.01), 1);
        assert_eq!(cohort_size(100, 100.0), 100);
    }

    #[test]
    fn earlier_submission_wins_ties() {
        let mut attempts = vec![attempt(1, 80, 100), attempt(2, 80, 50), attempt(3, 90, 200)];
        rank(&mut attempts);
        let ids: Vec<i64> = attempts.iter().map(|a| a.attempt_id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn winners_exclude_zero_scorers() {
        let attempts = vec![attempt(1, 50, 0), attempt(2, 0, 1), attempt(3, 0, 2)];
        let winners = select_winners(attempts, 100.0);
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].attempt_id, 1);
    }

    #[test]
    fn all_zero_scores_yield_empty_cohort() {
        let attempts = vec![attempt(1, 0, 0), attempt(2, 0, 1)];
        assert!(select_winners(attempts, 10.0).is_empty());
    }

    #[test]
    fn ten_percent_of_seven_takes_only_the_best() {
        let attempts = (0..7).map(|i| attempt(i, 10 * i as i32, i)).collect();
        let winners = select_winners(attempts, 10.0);
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].attempt_id, 6);
    }
}
