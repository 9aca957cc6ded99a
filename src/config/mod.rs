// src/config/mod.rs
pub mod screener;

pub use screener::{
    ClassifierConfig, ClassifierMode, RelevanceConfig, ScreenerConfig, ServerConfig,
};
