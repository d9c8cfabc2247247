//! Recorded test sessions and pre/post comparison.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use stabilo_core::{
    ClinicalThresholds, ConfidenceEllipse, EngineConfig, Error, ExerciseType, OrientationEstimate,
    Result, SessionId, SwayPoint, TestType, UserId,
};

use crate::features::{PosturalFeatureExtractor, PosturalFeatures};
use crate::longitudinal::LongitudinalProgress;

const MM_PER_CM: f64 = 10.0;

/// A completed exercise with its full sway trajectory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSession {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub exercise_type: ExerciseType,
    pub test_type: TestType,
    pub timestamp: DateTime<Utc>,
    pub duration_s: f64,
    /// Sway trajectory (mm)
    pub sway_path: Vec<SwayPoint>,
    pub confidence_ellipse: ConfidenceEllipse,
    pub postural_features: PosturalFeatures,
}

impl TestSession {
    /// Build a session from the orientation estimates of a whole exercise
    pub fn from_orientations(
        user_id: UserId,
        exercise_type: ExerciseType,
        test_type: TestType,
        timestamp: DateTime<Utc>,
        orientations: &[OrientationEstimate],
        extractor: &PosturalFeatureExtractor,
    ) -> Self {
        let sway_path: Vec<SwayPoint> = extractor
            .sway_path(orientations)
            .iter()
            .map(|p| p.scaled(MM_PER_CM))
            .collect();
        let confidence_ellipse = ConfidenceEllipse::from_sway_path(&sway_path);
        let postural_features = extractor.extract(orientations);

        let duration_s = match (orientations.first(), orientations.last()) {
            (Some(first), Some(last)) => {
                last.timestamp_ms.saturating_sub(first.timestamp_ms).max(0) as f64 / 1000.0
            }
            _ => 0.0,
        };

        Self {
            session_id: SessionId::new(),
            user_id,
            exercise_type,
            test_type,
            timestamp,
            duration_s,
            sway_path,
            confidence_ellipse,
            postural_features,
        }
    }

    /// Ellipse area used for comparisons (cm²)
    pub fn area_cm2(&self) -> f64 {
        self.confidence_ellipse.area_cm2
    }
}

/// Outcome class of a pre/post sway-area change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    SignificantImprovement,
    Improvement,
    Stable,
    Deterioration,
    SignificantDeterioration,
}

impl ChangeCategory {
    /// Sway-area reduction counts as improvement
    pub fn classify(percent_change: f64, thresholds: &ClinicalThresholds) -> Self {
        if percent_change <= -thresholds.significant_change_pct {
            ChangeCategory::SignificantImprovement
        } else if percent_change <= -thresholds.change_pct {
            ChangeCategory::Improvement
        } else if percent_change >= thresholds.significant_change_pct {
            ChangeCategory::SignificantDeterioration
        } else if percent_change >= thresholds.change_pct {
            ChangeCategory::Deterioration
        } else {
            ChangeCategory::Stable
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChangeCategory::SignificantImprovement => "Significant improvement in postural control",
            ChangeCategory::Improvement => "Improvement in postural control",
            ChangeCategory::Stable => "No meaningful change in postural control",
            ChangeCategory::Deterioration => "Decline in postural control",
            ChangeCategory::SignificantDeterioration => "Significant decline in postural control",
        }
    }

    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            ChangeCategory::SignificantImprovement => &[
                "Continue the current exercise program",
                "Consider progressing to more challenging balance tasks",
                "Reassess in 4 weeks to confirm the improvement is retained",
            ],
            ChangeCategory::Improvement => &[
                "Continue the current exercise program",
                "Maintain training frequency",
                "Reassess in 2-4 weeks",
            ],
            ChangeCategory::Stable => &[
                "Review adherence to the exercise program",
                "Consider adjusting exercise intensity or variety",
                "Reassess in 2 weeks",
            ],
            ChangeCategory::Deterioration => &[
                "Review recent changes in medication, sleep or fatigue",
                "Reduce exercise difficulty and focus on safe stances",
                "Reassess within 1 week",
            ],
            ChangeCategory::SignificantDeterioration => &[
                "Refer for clinical evaluation",
                "Review fall risk and home safety",
                "Pause unsupervised balance exercises until reviewed",
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionComparison {
    pub pre: TestSession,
    pub post: TestSession,
    pub area_change_cm2: f64,
    pub percent_change: f64,
    pub category: ChangeCategory,
    pub interpretation: String,
    pub recommendations: Vec<String>,
}

impl SessionComparison {
    pub fn between(pre: &TestSession, post: &TestSession, thresholds: &ClinicalThresholds) -> Self {
        let pre_area = pre.area_cm2();
        let post_area = post.area_cm2();
        let area_change_cm2 = post_area - pre_area;
        let percent_change = if pre_area > 0.0 {
            area_change_cm2 / pre_area * 100.0
        } else {
            0.0
        };
        let category = ChangeCategory::classify(percent_change, thresholds);

        Self {
            pre: pre.clone(),
            post: post.clone(),
            area_change_cm2,
            percent_change,
            category,
            interpretation: interpret(pre_area, post_area, percent_change, category, thresholds),
            recommendations: category
                .recommendations()
                .iter()
                .map(|r| r.to_string())
                .collect(),
        }
    }
}

fn interpret(
    pre_area: f64,
    post_area: f64,
    percent_change: f64,
    category: ChangeCategory,
    thresholds: &ClinicalThresholds,
) -> String {
    let range = if post_area > thresholds.pathological_area_cm2 {
        format!(
            "Post-test sway area exceeds the pathological threshold of {:.0} cm².",
            thresholds.pathological_area_cm2
        )
    } else if post_area > thresholds.normal_area_max_cm2 {
        format!(
            "Post-test sway area is above the normal range of {:.0}-{:.0} cm².",
            thresholds.normal_area_min_cm2, thresholds.normal_area_max_cm2
        )
    } else if post_area >= thresholds.normal_area_min_cm2 {
        format!(
            "Post-test sway area is within the normal range of {:.0}-{:.0} cm².",
            thresholds.normal_area_min_cm2, thresholds.normal_area_max_cm2
        )
    } else {
        format!(
            "Post-test sway area is below {:.0} cm², indicating a very steady stance.",
            thresholds.normal_area_min_cm2
        )
    };

    format!(
        "{}: sway area changed from {:.1} cm² to {:.1} cm² ({:+.1}%). {}",
        category.description(),
        pre_area,
        post_area,
        percent_change,
        range
    )
}

/// In-memory registry of sessions for pre/post and longitudinal analysis
#[derive(Debug, Clone)]
pub struct SessionComparator {
    sessions: HashMap<SessionId, TestSession>,
    thresholds: ClinicalThresholds,
    extractor: PosturalFeatureExtractor,
}

impl SessionComparator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            thresholds: config.clinical.clone(),
            extractor: PosturalFeatureExtractor::from_config(config),
        }
    }

    pub fn thresholds(&self) -> &ClinicalThresholds {
        &self.thresholds
    }

    pub fn insert(&mut self, session: TestSession) -> SessionId {
        let id = session.session_id;
        tracing::debug!(
            "Registered {:?} session {} ({:.2} cm²)",
            session.test_type,
            id,
            session.area_cm2()
        );
        self.sessions.insert(id, session);
        id
    }

    /// Build a session from raw orientations and register it
    pub fn record_session(
        &mut self,
        user_id: UserId,
        exercise_type: ExerciseType,
        test_type: TestType,
        timestamp: DateTime<Utc>,
        orientations: &[OrientationEstimate],
    ) -> SessionId {
        let session = TestSession::from_orientations(
            user_id,
            exercise_type,
            test_type,
            timestamp,
            orientations,
            &self.extractor,
        );
        self.insert(session)
    }

    pub fn get(&self, id: SessionId) -> Result<&TestSession> {
        self.sessions.get(&id).ok_or(Error::SessionNotFound(id))
    }

    pub fn remove(&mut self, id: SessionId) -> Result<TestSession> {
        self.sessions.remove(&id).ok_or(Error::SessionNotFound(id))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn compare(&self, pre_id: SessionId, post_id: SessionId) -> Result<SessionComparison> {
        let pre = self.get(pre_id)?;
        let post = self.get(post_id)?;

        if pre.test_type != TestType::Pre || post.test_type != TestType::Post {
            tracing::warn!(
                "Comparing {:?} session {} against {:?} session {}",
                pre.test_type,
                pre_id,
                post.test_type,
                post_id
            );
        }
        if pre.exercise_type != post.exercise_type {
            tracing::warn!(
                "Comparing different exercises: {:?} vs {:?}",
                pre.exercise_type,
                post.exercise_type
            );
        }

        Ok(SessionComparison::between(pre, post, &self.thresholds))
    }

    /// A user's sessions, oldest first
    pub fn sessions_for_user(&self, user_id: UserId) -> Vec<&TestSession> {
        let mut sessions: Vec<&TestSession> = self
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .collect();
        sessions.sort_by_key(|s| s.timestamp);
        sessions
    }

    pub fn longitudinal_progress(&self, user_id: UserId) -> Result<LongitudinalProgress> {
        LongitudinalProgress::from_sessions(
            user_id,
            self.sessions_for_user(user_id),
            &self.thresholds,
        )
    }
}
