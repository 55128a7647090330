//! Model training module
//!
//! - Weighted-Gini decision trees and a class-weighted Random Forest
//! - Stratified train / hold-out splitting
//! - Binary classification metrics
//! - The training engine tying loading, preprocessing, SMOTE and the forest together

mod config;
mod engine;
pub mod decision_tree;
pub mod metrics;
pub mod random_forest;
pub mod split;

pub use config::{ClassWeight, TrainingConfig};
pub use decision_tree::{DecisionTree, TreeNode};
pub use engine::{TrainEngine, TrainingOutcome, TrainingReport};
pub use metrics::{roc_auc, ModelMetrics};
pub use random_forest::{MaxFeatures, RandomForest};
pub use split::{train_test_split, HoldoutSplit};
