pub mod types;

pub use types::*;

use async_trait::async_trait;
use tracing::debug;

/// Façade over the external vision-language-model service. The service
/// itself is opaque (SPEC_FULL.md §1 Non-goals: "training or hosting the
/// vision model") — this crate only knows its three operations.
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn process_vision(&self, req: ProcessVisionRequest) -> anyhow::Result<ProcessVisionResponse>;
    async fn query_memory(&self, req: QueryMemoryRequest) -> anyhow::Result<Vec<MemoryHit>>;
    async fn update_world_model(&self, req: UpdateWorldModelRequest) -> anyhow::Result<UpdateWorldModelResponse>;
}

/// HTTP implementation, grounded on `ai-client`'s `ClaudeClient`: a small
/// reqwest wrapper with one header-building step and one POST per op.
pub struct HttpVisionClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpVisionClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &impl serde::Serialize,
    ) -> anyhow::Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "vision service call");
        let response = self.http.post(&url).json(body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("vision service error ({status}): {text}");
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl VisionClient for HttpVisionClient {
    async fn process_vision(&self, req: ProcessVisionRequest) -> anyhow::Result<ProcessVisionResponse> {
        self.post("/process_vision", &req).await
    }

    async fn query_memory(&self, req: QueryMemoryRequest) -> anyhow::Result<Vec<MemoryHit>> {
        self.post("/query_memory", &req).await
    }

    async fn update_world_model(
        &self,
        req: UpdateWorldModelRequest,
    ) -> anyhow::Result<UpdateWorldModelResponse> {
        self.post("/update_world_model", &req).await
    }
}

/// Test-only scripted client, exposed unconditionally (not `cfg(test)`) so
/// other crates in the workspace can depend on it from their own tests.
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Scripted responses for unit tests elsewhere in the workspace
    /// (selector-registry, chimera-worker). Each call pops the next queued
    /// response; panics if the queue runs dry, so tests fail loudly on an
    /// unexpected extra call.
    pub struct MockVisionClient {
        pub process_vision_responses: Mutex<Vec<ProcessVisionResponse>>,
        pub query_memory_responses: Mutex<Vec<Vec<MemoryHit>>>,
        pub update_world_model_responses: Mutex<Vec<UpdateWorldModelResponse>>,
    }

    impl MockVisionClient {
        pub fn new() -> Self {
            Self {
                process_vision_responses: Mutex::new(Vec::new()),
                query_memory_responses: Mutex::new(Vec::new()),
                update_world_model_responses: Mutex::new(Vec::new()),
            }
        }

        pub fn with_process_vision(self, resp: ProcessVisionResponse) -> Self {
            self.process_vision_responses.lock().unwrap().push(resp);
            self
        }
    }

    #[async_trait]
    impl VisionClient for MockVisionClient {
        async fn process_vision(&self, _req: ProcessVisionRequest) -> anyhow::Result<ProcessVisionResponse> {
            self.process_vision_responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("mock process_vision queue empty"))
        }

        async fn query_memory(&self, _req: QueryMemoryRequest) -> anyhow::Result<Vec<MemoryHit>> {
            Ok(self.query_memory_responses.lock().unwrap().pop().unwrap_or_default())
        }

        async fn update_world_model(
            &self,
            _req: UpdateWorldModelRequest,
        ) -> anyhow::Result<UpdateWorldModelResponse> {
            self.update_world_model_responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("mock update_world_model queue empty"))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn mock_returns_queued_response() {
            let mock = MockVisionClient::new().with_process_vision(ProcessVisionResponse {
                found: true,
                x: Some(10.0),
                y: Some(20.0),
                width: Some(5.0),
                height: Some(5.0),
                confidence: 0.9,
                description: Some("submit button".into()),
            });
            let resp = mock
                .process_vision(ProcessVisionRequest {
                    screenshot_bytes: vec![],
                    context: "".into(),
                    text_command: "find submit".into(),
                })
                .await
                .unwrap();
            assert_eq!(resp.coordinates(), Some((10.0, 20.0)));
        }

        #[test]
        fn coordinates_none_when_not_found() {
            let resp = ProcessVisionResponse {
                found: false,
                x: Some(1.0),
                y: Some(1.0),
                width: None,
                height: None,
                confidence: 0.0,
                description: None,
            };
            assert_eq!(resp.coordinates(), None);
        }
    }
}
