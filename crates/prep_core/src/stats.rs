//! crates/prep_core/src/stats.rs
//!
//! Builds a `UserStats` snapshot from a user's test results and study log.
//!
//! The aggregation itself is a set of pure functions over fetched rows;
//! `StatsService` only gathers the rows and hands them over.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{Achievement, SkillProgress, SkillType, StudyLogEntry, TestResult, UserStats};
use crate::error::{require_user, ServiceError, ServiceResult};
use crate::ports::DatabaseService;

/// Skill targets never go above this percentage.
pub const MAX_SKILL_TARGET: f64 = 100.0;

/// How far above the current level the next skill target sits.
pub const SKILL_TARGET_STEP: f64 = 10.0;

//=========================================================================================
// The Service
//=========================================================================================

/// Computes progress snapshots. Holds no state besides its collaborators,
/// so one instance can serve any number of concurrent requests.
#[derive(Clone)]
pub struct StatsService {
    db: Arc<dyn DatabaseService>,
    clock: Clock,
}

impl StatsService {
    pub fn new(db: Arc<dyn DatabaseService>, clock: Clock) -> Self {
        Self { db, clock }
    }

    /// Fetches the user's results, study log and achievements and aggregates them.
    ///
    /// Any failed fetch aborts the whole computation.
    pub async fn compute_user_stats(&self, user_id: Uuid) -> ServiceResult<UserStats> {
        require_user(user_id)?;

        let (results, log, achievements) = futures::try_join!(
            async {
                self.db
                    .fetch_completed_test_results(user_id)
                    .await
                    .map_err(ServiceError::fetch("test results"))
            },
            async {
                self.db
                    .fetch_study_log(user_id)
                    .await
                    .map_err(ServiceError::fetch("study log"))
            },
            async {
                self.db
                    .fetch_unlocked_achievements(user_id)
                    .await
                    .map_err(ServiceError::fetch("achievements"))
            },
        )?;

        debug!(
            %user_id,
            results = results.len(),
            log_entries = log.len(),
            "Aggregating user stats"
        );

        Ok(aggregate_user_stats(
            &results,
            &log,
            achievements,
            self.clock.today(),
        ))
    }
}

//=========================================================================================
// Pure Aggregation
//=========================================================================================

/// Aggregates already-fetched rows into a snapshot as of `today` (UTC).
pub fn aggregate_user_stats(
    results: &[TestResult],
    log: &[StudyLogEntry],
    achievements: Vec<Achievement>,
    today: NaiveDate,
) -> UserStats {
    let daily = daily_minutes(log);

    UserStats {
        overall_score: overall_score(results),
        study_streak_days: study_streak(&daily, today),
        hours_studied: hours_studied(log),
        tests_completed: results.len() as u32,
        skill_progress: skill_progress(results),
        weekly_study_minutes: weekly_minutes(&daily, today),
        achievements,
    }
}

/// Mean of all recorded scores to one decimal, or `None` if nothing is scored yet.
pub fn overall_score(results: &[TestResult]) -> Option<f64> {
    let scores: Vec<f64> = results.iter().filter_map(scored).collect();
    mean(&scores).map(round1)
}

/// Progress for each of the four tracked skills.
///
/// Every tracked skill is present in the result. Skills with no scored
/// results get `SkillProgress::default()`.
pub fn skill_progress(results: &[TestResult]) -> BTreeMap<SkillType, SkillProgress> {
    let mut ordered: Vec<&TestResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.completed_at);

    let mut buckets: BTreeMap<SkillType, Vec<f64>> = SkillType::TRACKED
        .into_iter()
        .map(|skill| (skill, Vec::new()))
        .collect();

    for result in ordered {
        let Some(score) = scored(result) else { continue };
        if let Some(bucket) = buckets.get_mut(&result.skill) {
            bucket.push(score);
        }
    }

    buckets
        .into_iter()
        .map(|(skill, history)| {
            let progress = match mean(&history) {
                Some(avg) => SkillProgress {
                    current: round1(avg * 10.0),
                    target: round1(avg * 10.0 + SKILL_TARGET_STEP).min(MAX_SKILL_TARGET),
                    history,
                },
                None => SkillProgress::default(),
            };
            (skill, progress)
        })
        .collect()
}

/// Total minutes studied per calendar date.
pub fn daily_minutes(log: &[StudyLogEntry]) -> BTreeMap<NaiveDate, u32> {
    let mut daily = BTreeMap::new();
    for entry in log {
        let total = daily.entry(entry.date).or_insert(0u32);
        *total = total.saturating_add(entry.duration_minutes);
    }
    daily
}

/// Counts consecutive logged days ending at `today`.
///
/// A day is present if it has any log entry, even one of zero minutes.
/// No entry today means a streak of zero.
pub fn study_streak(daily: &BTreeMap<NaiveDate, u32>, today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut cursor = Some(today);
    while let Some(date) = cursor {
        if !daily.contains_key(&date) {
            break;
        }
        streak += 1;
        cursor = date.pred_opt();
    }
    streak
}

/// Total study time in hours, to one decimal.
pub fn hours_studied(log: &[StudyLogEntry]) -> f64 {
    let minutes: u64 = log.iter().map(|e| u64::from(e.duration_minutes)).sum();
    round1(minutes as f64 / 60.0)
}

/// Minutes per day for the seven days ending `today`, oldest first.
pub fn weekly_minutes(daily: &BTreeMap<NaiveDate, u32>, today: NaiveDate) -> [u32; 7] {
    let mut week = [0u32; 7];
    let mut cursor = Some(today);
    for slot in week.iter_mut().rev() {
        let Some(date) = cursor else { break };
        *slot = daily.get(&date).copied().unwrap_or(0);
        cursor = date.pred_opt();
    }
    week
}

fn scored(result: &TestResult) -> Option<f64> {
    result.score.filter(|s| s.is_finite())
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
