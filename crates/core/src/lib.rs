pub mod config;
pub mod discretizer;
pub mod error;
pub mod lookup;
pub mod types;

pub use config::AppConfig;
pub use discretizer::{categorize, FeatureDiscretizer, Thresholds};
pub use error::{RecommenderError, RecommenderResult};
pub use lookup::{argmax, LookupError, PolicyLookup};
pub use types::{Decision, DiscretizedState, Feature, Gender, PatientProfile};
