use crate::activity::Activity;
use crate::error::TrackerResult;
use crate::storage::{read_json_file, write_json_file};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaType {
    ActivityCount,
    TotalDistance,
    TotalElevation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeCriteria {
    #[serde(rename = "type")]
    pub kind: CriteriaType,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub criteria: BadgeCriteria,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnedBadge {
    pub badge_id: String,
    pub earned_date: DateTime<Utc>,
    pub badge: Badge,
}

/// Totals the badge thresholds are compared against
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregateStats {
    pub activity_count: usize,
    pub total_distance_km: f64,
    pub total_elevation_m: f64,
}

impl AggregateStats {
    pub fn from_activities<'a>(activities: impl IntoIterator<Item = &'a Activity>) -> Self {
        activities
            .into_iter()
            .fold(Self::default(), |mut stats, activity| {
                stats.activity_count += 1;
                stats.total_distance_km += activity.distance;
                stats.total_elevation_m += activity.elevation_gain;
                stats
            })
    }

    fn value_for(&self, kind: CriteriaType) -> f64 {
        match kind {
            CriteriaType::ActivityCount => self.activity_count as f64,
            CriteriaType::TotalDistance => self.total_distance_km,
            CriteriaType::TotalElevation => self.total_elevation_m,
        }
    }
}

/// Badges whose threshold is now met and that were not earned before
pub fn evaluate_badges(
    available: &[Badge],
    earned: &[EarnedBadge],
    stats: &AggregateStats,
    now: DateTime<Utc>,
) -> Vec<EarnedBadge> {
    available
        .iter()
        .filter(|badge| !earned.iter().any(|e| e.badge_id == badge.id))
        .filter(|badge| stats.value_for(badge.criteria.kind) >= badge.criteria.threshold)
        .map(|badge| EarnedBadge {
            badge_id: badge.id.clone(),
            earned_date: now,
            badge: badge.clone(),
        })
        .collect()
}

/// Check the badge catalogue in `badges_file` and append newly earned badges to `earned_file`
pub fn award_badges(
    badges_file: &Path,
    earned_file: &Path,
    activities: &[Activity],
    now: DateTime<Utc>,
) -> TrackerResult<Vec<EarnedBadge>> {
    let available: Vec<Badge> = read_json_file(badges_file)?;
    let mut earned: Vec<EarnedBadge> = read_json_file(earned_file)?;
    let stats = AggregateStats::from_activities(activities);

    let new_badges = evaluate_badges(&available, &earned, &stats, now);
    if !new_badges.is_empty() {
        for badge in &new_badges {
            info!("Badge earned: {}", badge.badge.name);
        }
        earned.extend(new_badges.iter().cloned());
        write_json_file(earned_file, &earned)?;
    }
    Ok(new_badges)
}
