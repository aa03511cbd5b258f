pub mod ad7746;
pub mod filter;
pub mod hdc1080;
pub mod pca9536;
