//! Data loading and sample data utilities

pub mod data_loader;
pub mod sample_data;

pub use data_loader::{save_csv, ChurnDataset, DataLoader};
pub use sample_data::SampleDataGenerator;
