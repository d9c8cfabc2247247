//! Longitudinal progress across a user's recorded sessions.

use serde::{Deserialize, Serialize};

use stabilo_core::{stats, ClinicalThresholds, Error, Result, UserId};

use crate::session::TestSession;

/// Fewest sessions needed before a trend is reported
pub const MIN_TREND_SESSIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl Trend {
    pub fn description(&self) -> &'static str {
        match self {
            Trend::Improving => "Sway area is decreasing across sessions",
            Trend::Stable => "Sway area is steady across sessions",
            Trend::Declining => "Sway area is increasing across sessions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongitudinalProgress {
    pub user_id: UserId,
    /// Oldest first
    pub sessions: Vec<TestSession>,
    pub trend: Trend,
    pub average_area: f64,
    /// 0-100, higher is better
    pub progress_score: f64,
}

impl LongitudinalProgress {
    /// Trend over sessions in any order; they are sorted by timestamp
    pub fn from_sessions<'a, I>(
        user_id: UserId,
        sessions: I,
        thresholds: &ClinicalThresholds,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = &'a TestSession>,
    {
        let mut sessions: Vec<TestSession> = sessions.into_iter().cloned().collect();
        if sessions.len() < MIN_TREND_SESSIONS {
            return Err(Error::InsufficientData {
                required: MIN_TREND_SESSIONS,
                available: sessions.len(),
            });
        }
        sessions.sort_by_key(|s| s.timestamp);

        let areas: Vec<f64> = sessions.iter().map(TestSession::area_cm2).collect();
        let trend = trend_of(&areas, thresholds);
        let average_area = stats::mean(&areas);

        Ok(Self {
            user_id,
            sessions,
            trend,
            average_area,
            progress_score: progress_score(average_area, thresholds.normal_area_max_cm2),
        })
    }
}

/// Compare the mean of the latest window of areas against the earliest one.
///
/// The window shrinks to half the history so the two never overlap.
pub fn trend_of(areas: &[f64], thresholds: &ClinicalThresholds) -> Trend {
    let window = thresholds.trend_window.min(areas.len() / 2);
    if window == 0 {
        return Trend::Stable;
    }

    let early = stats::mean(&areas[..window]);
    let late = stats::mean(&areas[areas.len() - window..]);
    if early <= 0.0 {
        return Trend::Stable;
    }

    let change_pct = (late - early) / early * 100.0;
    if change_pct < -thresholds.trend_change_pct {
        Trend::Improving
    } else if change_pct > thresholds.trend_change_pct {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

pub fn progress_score(average_area: f64, normal_max_cm2: f64) -> f64 {
    if normal_max_cm2 <= 0.0 {
        return 0.0;
    }
    (100.0 - average_area / normal_max_cm2 * 50.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::session_with_area;

    fn history(areas: &[f64]) -> Vec<TestSession> {
        areas
            .iter()
            .enumerate()
            .map(|(day, &area)| session_with_area(area, day as i64))
            .collect()
    }

    #[test]
    fn test_three_sessions_improving() {
        let user = UserId::new();
        let sessions = history(&[20.0, 18.0, 10.0]);
        let progress =
            LongitudinalProgress::from_sessions(user, &sessions, &ClinicalThresholds::default())
                .unwrap();

        assert_eq!(progress.trend, Trend::Improving);
        assert!((progress.average_area - 16.0).abs() < 1e-9);
        assert!((progress.progress_score - 60.0).abs() < 1e-9);
        assert_eq!(progress.sessions.len(), 3);
    }

    #[test]
    fn test_sessions_sorted_by_time() {
        let mut sessions = history(&[20.0, 18.0, 10.0]);
        sessions.reverse();
        let progress = LongitudinalProgress::from_sessions(
            UserId::new(),
            &sessions,
            &ClinicalThresholds::default(),
        )
        .unwrap();

        let areas: Vec<f64> = progress.sessions.iter().map(|s| s.area_cm2()).collect();
        assert_eq!(areas, vec![20.0, 18.0, 10.0]);
        assert!(progress.sessions.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        // Full sessions are kept, not just their areas
        assert_eq!(progress.sessions[0], sessions[2]);
        assert_eq!(progress.trend, Trend::Improving);
    }

    #[test]
    fn test_declining_and_stable() {
        let thresholds = ClinicalThresholds::default();
        assert_eq!(
            trend_of(&[10.0, 11.0, 12.0, 14.0, 15.0, 16.0], &thresholds),
            Trend::Declining
        );
        assert_eq!(trend_of(&[15.0, 16.0, 15.5, 15.0], &thresholds), Trend::Stable);
        assert_eq!(trend_of(&[0.0, 0.0, 5.0], &thresholds), Trend::Stable);
    }

    #[test]
    fn test_too_few_sessions() {
        let sessions = history(&[20.0, 10.0]);
        let result = LongitudinalProgress::from_sessions(
            UserId::new(),
            &sessions,
            &ClinicalThresholds::default(),
        );
        assert!(matches!(
            result,
            Err(Error::InsufficientData {
                required: 3,
                available: 2
            })
        ));
    }

    #[test]
    fn test_progress_score_clamped() {
        assert_eq!(progress_score(0.0, 20.0), 100.0);
        assert_eq!(progress_score(20.0, 20.0), 50.0);
        assert_eq!(progress_score(500.0, 20.0), 0.0);
    }
}
