//! # Stabilo-Posture
//!
//! Postural stability analysis: sway features from orientation windows,
//! stabilogram diffusion, sensory-integration estimates, the normalized
//! feature vector for downstream scoring, and pre/post session comparison
//! with longitudinal progress tracking.

pub mod diffusion;
pub mod feature_vector;
pub mod features;
pub mod longitudinal;
pub mod sensory;
pub mod session;

pub use diffusion::StabilogramDiffusion;
pub use feature_vector::{build_feature_vector, feature_names, Demographics, Sex, TemporalContext};
pub use features::{PosturalFeatureExtractor, PosturalFeatures};
pub use longitudinal::{LongitudinalProgress, Trend};
pub use sensory::{BalanceCondition, SensoryWeights};
pub use session::{ChangeCategory, SessionComparator, SessionComparison, TestSession};
