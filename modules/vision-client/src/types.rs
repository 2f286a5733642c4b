use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct ProcessVisionRequest {
    pub screenshot_bytes: Vec<u8>,
    pub context: String,
    pub text_command: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessVisionResponse {
    pub found: bool,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub confidence: f64,
    pub description: Option<String>,
}

impl ProcessVisionResponse {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.x, self.y) {
            (Some(x), Some(y)) if self.found => Some((x, y)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryMemoryRequest {
    pub query: Option<String>,
    pub ax_tree_summary: Option<String>,
    pub screenshot_hash: Option<String>,
    pub top_k: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryHit {
    pub text: String,
    pub similarity: f64,
    pub action_plan: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateWorldModelRequest {
    pub state_id: String,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateWorldModelResponse {
    pub success: bool,
    pub prediction: Option<serde_json::Value>,
}
