use serde::Deserialize;

use crate::analysis::AnalysisConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: AnalysisConfig,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            config: AnalysisConfig::default(),
        }
    }
}
