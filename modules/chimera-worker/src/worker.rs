use std::sync::Arc;
use std::time::Duration;

use browserless_client::{BrowserlessClient, LaunchOptions, SessionCookie};
use chimera_common::{
    Blueprint, BlueprintStep, BlueprintStepKind, ExtractedFields, Mission, MissionResult, MissionStatus,
    TraumaSignal,
};
use chimera_queue::ForbiddenRegions;
use fingerprint::{mouse_path, typing_model, FingerprintConfig, MotionState};
use rand::Rng;
use tracing::warn;
use vision_client::{ProcessVisionRequest, VisionClient};

use crate::captcha;
use crate::entropy::{self, EntropySink};
use crate::error::WorkerError;
use crate::honeypot;

/// Selectors checked after every blueprint step as a coarse CAPTCHA
/// presence heuristic (SPEC_FULL.md §4.5).
const CAPTCHA_SELECTORS: &[&str] = &[".g-recaptcha", "iframe[src*='captcha']", "#challenge-form"];

const WARMUP_URLS: &[&str] = &["https://www.reuters.com", "https://www.weather.com"];

/// One worker's configuration, loaded by the caller from `Config`.
pub struct WorkerConfig {
    pub worker_id: String,
    pub proxy_base: Option<String>,
    pub chrome_version: String,
    pub chrome_platform: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub mission_timeout_s: u64,
    pub warmup_enabled: bool,
    pub captcha_max_attempts: u32,
}

impl WorkerConfig {
    pub fn from_common(config: &chimera_common::Config) -> Self {
        Self {
            worker_id: config.worker_id.clone(),
            proxy_base: config.proxy_url.clone(),
            chrome_version: config.chrome_ua_version.clone(),
            chrome_platform: config.chrome_ua_platform.clone(),
            viewport_width: 1366,
            viewport_height: 768,
            mission_timeout_s: 120,
            warmup_enabled: true,
            captcha_max_attempts: captcha::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

struct MissionOutcome {
    extracted: ExtractedFields,
    vision_confidence_min: f64,
    captcha_faced: bool,
    captcha_solved: bool,
    trauma_signals: Vec<TraumaSignal>,
}

/// One worker: one Browserless client, one Vision Client, one forbidden-
/// region lookup. Owns the full per-mission lifecycle (SPEC_FULL.md §4.2).
pub struct Worker {
    browser: BrowserlessClient,
    vision: Arc<dyn VisionClient>,
    forbidden: Arc<dyn ForbiddenLookup>,
    entropy_sink: Arc<dyn EntropySink>,
    cookies: Option<Arc<dyn CookieLookup>>,
    config: WorkerConfig,
    last_vlm_confidence: LastConfidence,
}

/// Thin seam over `chimera_queue::ForbiddenRegionsStore` so tests can swap
/// in an in-memory policy without a Redis connection.
#[async_trait::async_trait]
pub trait ForbiddenLookup: Send + Sync {
    async fn get(&self, domain: &str) -> anyhow::Result<ForbiddenRegions>;
}

#[async_trait::async_trait]
impl ForbiddenLookup for chimera_queue::ForbiddenRegionsStore {
    async fn get(&self, domain: &str) -> anyhow::Result<ForbiddenRegions> {
        Ok(chimera_queue::ForbiddenRegionsStore::get(self, domain).await?)
    }
}

/// Thin seam over `chimera_queue::CookieStore` so a session can be primed
/// with an authenticated platform's cookies before its first navigation.
/// Optional: a worker with no cookie store configured simply launches
/// unauthenticated sessions (SPEC_FULL.md §5/§6).
#[async_trait::async_trait]
pub trait CookieLookup: Send + Sync {
    async fn get(&self, platform: &str) -> anyhow::Result<Vec<SessionCookie>>;
}

#[async_trait::async_trait]
impl CookieLookup for chimera_queue::CookieStore {
    async fn get(&self, platform: &str) -> anyhow::Result<Vec<SessionCookie>> {
        let cookies = chimera_queue::CookieStore::get_cookies(self, platform).await?.unwrap_or_default();
        Ok(cookies
            .into_iter()
            .map(|c| SessionCookie { name: c.name, value: c.value, domain: c.domain, path: c.path })
            .collect())
    }
}

impl Worker {
    pub fn new(
        browser: BrowserlessClient,
        vision: Arc<dyn VisionClient>,
        forbidden: Arc<dyn ForbiddenLookup>,
        entropy_sink: Arc<dyn EntropySink>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            browser,
            vision,
            forbidden,
            entropy_sink,
            cookies: None,
            config,
            last_vlm_confidence: LastConfidence::new(),
        }
    }

    pub fn with_cookies(mut self, cookies: Arc<dyn CookieLookup>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    pub async fn process_mission(&self, mission: Mission) -> MissionResult {
        let start = std::time::Instant::now();
        let timeout = Duration::from_secs(self.config.mission_timeout_s);

        match tokio::time::timeout(timeout, self.run_mission(&mission)).await {
            Ok(Ok(outcome)) => MissionResult {
                status: MissionStatus::Completed,
                vision_confidence: outcome.vision_confidence_min,
                captcha_faced: outcome.captcha_faced,
                captcha_solved: outcome.captcha_faced && outcome.captcha_solved,
                duration_s: start.elapsed().as_secs_f64(),
                provider: mission.target_provider.clone(),
                extracted: outcome.extracted,
                trauma_signals: outcome.trauma_signals.iter().map(TraumaSignal::to_string).collect(),
            },
            Ok(Err(err)) => {
                warn!(mission_id = %mission.mission_id, error = %err, "mission failed");
                MissionResult {
                    status: MissionStatus::Failed,
                    vision_confidence: 0.0,
                    captcha_faced: false,
                    captcha_solved: false,
                    duration_s: start.elapsed().as_secs_f64(),
                    provider: mission.target_provider.clone(),
                    extracted: ExtractedFields::default(),
                    trauma_signals: trauma_signals_for(&err).iter().map(TraumaSignal::to_string).collect(),
                }
            }
            Err(_) => {
                warn!(mission_id = %mission.mission_id, "mission timed out");
                MissionResult {
                    status: MissionStatus::TimedOut,
                    vision_confidence: 0.0,
                    captcha_faced: false,
                    captcha_solved: false,
                    duration_s: start.elapsed().as_secs_f64(),
                    provider: mission.target_provider.clone(),
                    extracted: ExtractedFields::default(),
                    trauma_signals: vec![TraumaSignal::Timeout.to_string()],
                }
            }
        }
    }

    async fn run_mission(&self, mission: &Mission) -> Result<MissionOutcome, WorkerError> {
        let blueprint = mission
            .blueprint
            .clone()
            .unwrap_or_else(|| Blueprint { domain: domain_of(mission), steps: vec![] });
        let domain = blueprint.domain.clone();
        let resolved = blueprint.resolve_templates(&mission.lead.seed_fields());

        let seeds = {
            let mut rng = rand::rng();
            entropy::allocate(&mut rng)
        };
        let _ = self.entropy_sink.record(&self.config.worker_id, seeds).await;

        let fp = FingerprintConfig::derive(seeds, &self.config.chrome_version, &self.config.chrome_platform);
        let forbidden = self.forbidden.get(&domain).await.unwrap_or_default();

        let mut session_id = mission.session_id.clone();
        let proxy_username = fingerprint::proxy_username(
            self.config.proxy_base.as_deref().unwrap_or("chimera"),
            mission.carrier_hint.as_deref().unwrap_or("default"),
            &session_id,
        );

        let cookies = match &self.cookies {
            Some(store) => store.get(&mission.target_provider).await.unwrap_or_else(|err| {
                warn!(error = %err, provider = %mission.target_provider, "cookie lookup failed");
                vec![]
            }),
            None => vec![],
        };

        let launch = LaunchOptions {
            proxy_url: self.config.proxy_base.clone().map(|_| proxy_username.clone()),
            stealth_init_script: fp.render_init_script(),
            viewport_width: self.config.viewport_width,
            viewport_height: self.config.viewport_height,
            user_agent: format!(
                "Mozilla/5.0 ({}) AppleWebKit/537.36 Chrome/{} Safari/537.36",
                self.config.chrome_platform, self.config.chrome_version
            ),
            cookies,
        };

        let mut session = self.browser.launch_session(&session_id, launch.clone()).await?;
        session.apply_cookies().await?;
        let mut motion = MotionState::new();
        let mut cursor = (0.0_f64, 0.0_f64);
        let mut extracted = ExtractedFields::default();
        let mut vision_confidences: Vec<f64> = vec![];
        let mut trauma: Vec<TraumaSignal> = vec![];
        let mut captcha_faced = false;
        let mut captcha_solved = false;

        if self.config.warmup_enabled {
            self.warmup(&session, &mut motion, &mut cursor).await?;
        }

        let mut step_idx = 0usize;
        let mut rotated_once = false;
        while step_idx < resolved.steps.len() {
            let step = &resolved.steps[step_idx];
            let outcome = self
                .execute_step(&session, &domain, step, &forbidden, &mut motion, &mut cursor, &mut extracted)
                .await;

            match outcome {
                Ok(()) => {}
                Err(WorkerError::Browser(browserless_client::BrowserlessError::Api { status: 403, .. }))
                    if !rotated_once =>
                {
                    warn!(mission_id = %mission.mission_id, "403 observed, rotating session");
                    trauma.push(TraumaSignal::SessionBroken);
                    session.close().await.ok();
                    let ts = chrono::Utc::now().timestamp();
                    session_id = format!("{}_r403_{ts}", mission.mission_id);
                    session = self.browser.launch_session(&session_id, launch.clone()).await?;
                    session.apply_cookies().await?;
                    rotated_once = true;
                    continue;
                }
                Err(err) => return Err(err),
            }

            if self.captcha_present(&session).await {
                captcha_faced = true;
                let solved = captcha::resolve_with_vision(
                    &session,
                    self.vision.as_ref(),
                    &mut motion,
                    CAPTCHA_SELECTORS[0],
                    "solve the visible challenge",
                    self.config.captcha_max_attempts,
                )
                .await?;
                captcha_solved = solved;
                if !solved {
                    trauma.push(TraumaSignal::CaptchaUnsolved);
                    return Err(WorkerError::CaptchaUnsolved { attempts: self.config.captcha_max_attempts });
                }
            }

            if let BlueprintStepKind::VlmGround = step.kind {
                if let Some(confidence) = self.last_vlm_confidence.take_confidence() {
                    vision_confidences.push(confidence);
                }
            }

            step_idx += 1;
        }

        session.close().await.ok();

        Ok(MissionOutcome {
            extracted,
            vision_confidence_min: vision_confidences.iter().cloned().fold(1.0, f64::min),
            captcha_faced,
            captcha_solved,
            trauma_signals: trauma,
        })
    }

    async fn warmup(
        &self,
        session: &browserless_client::BrowserSession,
        motion: &mut MotionState,
        cursor: &mut (f64, f64),
    ) -> Result<(), WorkerError> {
        let url = {
            let mut rng = rand::rng();
            WARMUP_URLS[rng.random_range(0..WARMUP_URLS.len())]
        };
        session.goto(url, 20_000).await?;

        let (dwell_s, scroll) = {
            let mut rng = rand::rng();
            let dwell_s = rng.random_range(30..60);
            let scroll = fingerprint::scrolling_model(rng.random_range(800..2400), motion);
            (dwell_s, scroll)
        };
        let mut elapsed_ms: u64 = 0;
        for chunk in scroll {
            elapsed_ms += chunk.delay_ms;
            if elapsed_ms > (dwell_s as u64) * 1000 {
                break;
            }
        }
        let _ = mouse_path(cursor.0, cursor.1, cursor.0, cursor.1, motion);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    }

    async fn captcha_present(&self, session: &browserless_client::BrowserSession) -> bool {
        for selector in CAPTCHA_SELECTORS {
            if session.element_exists(selector).await.unwrap_or(false) {
                return true;
            }
        }
        false
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_step(
        &self,
        session: &browserless_client::BrowserSession,
        domain: &str,
        step: &BlueprintStep,
        forbidden: &ForbiddenRegions,
        motion: &mut MotionState,
        cursor: &mut (f64, f64),
        extracted: &mut ExtractedFields,
    ) -> Result<(), WorkerError> {
        match step.kind {
            BlueprintStepKind::Goto => {
                let url = step.url.as_deref().unwrap_or_default();
                let outcome = session.goto(url, 20_000).await?;
                if outcome.is_forbidden() {
                    return Err(WorkerError::Browser(browserless_client::BrowserlessError::Api {
                        status: 403,
                        message: "document 403".to_string(),
                    }));
                }
                Ok(())
            }
            BlueprintStepKind::Wait => {
                session.wait(step.wait_ms.unwrap_or(500)).await?;
                Ok(())
            }
            BlueprintStepKind::Click => {
                let selector = step.selector.as_deref().unwrap_or_default();
                let description = step.intent.clone().unwrap_or_else(|| selector.to_string());
                let point =
                    honeypot::guard_click(session, self.vision.as_ref(), forbidden, domain, selector, &description)
                        .await?;
                self.behavioral_click(session, motion, cursor, point).await
            }
            BlueprintStepKind::Input => {
                let selector = step.selector.as_deref().unwrap_or_default();
                let value = step.value.as_deref().unwrap_or_default();
                let keystrokes: Vec<(char, u64)> =
                    typing_model(value, motion).into_iter().map(|k| (k.ch, k.delay_ms)).collect();
                session
                    .type_keystrokes(selector, &keystrokes, step.press_enter.unwrap_or(false))
                    .await?;
                motion.record_action();
                Ok(())
            }
            BlueprintStepKind::VlmGround => {
                let screenshot = session.screenshot().await?;
                let response = self
                    .vision
                    .process_vision(ProcessVisionRequest {
                        screenshot_bytes: screenshot,
                        context: domain.to_string(),
                        text_command: step.intent.clone().unwrap_or_else(|| "locate the target field".to_string()),
                    })
                    .await
                    .map_err(|e| WorkerError::Vision(e.to_string()))?;
                self.last_vlm_confidence.set(response.confidence);
                if let Some(point) = response.coordinates() {
                    honeypot::guard_direct_click(point, domain, forbidden)?;
                    self.behavioral_click(session, motion, cursor, point).await?;
                }
                apply_extraction_hint(extracted, step.intent.as_deref(), &response);
                Ok(())
            }
            BlueprintStepKind::Unknown => {
                warn!(domain, "unknown blueprint step kind, skipping");
                Ok(())
            }
        }
    }

    async fn behavioral_click(
        &self,
        session: &browserless_client::BrowserSession,
        motion: &mut MotionState,
        cursor: &mut (f64, f64),
        point: (f64, f64),
    ) -> Result<(), WorkerError> {
        let path = mouse_path(cursor.0, cursor.1, point.0, point.1, motion);
        for step in &path {
            tokio::time::sleep(Duration::from_millis(step.delay_ms)).await;
        }
        session.click_at(point.0, point.1).await?;
        motion.record_action();
        *cursor = point;
        Ok(())
    }
}

/// Vision confidence from the most recent `vlm_ground` step, threaded
/// through `execute_step` without widening its signature further.
struct LastConfidence(std::sync::Mutex<Option<f64>>);

impl LastConfidence {
    fn new() -> Self {
        Self(std::sync::Mutex::new(None))
    }

    fn set(&self, value: f64) {
        *self.0.lock().unwrap() = Some(value);
    }

    fn take_confidence(&self) -> Option<f64> {
        self.0.lock().unwrap().take()
    }
}

fn domain_of(mission: &Mission) -> String {
    let url = &mission.lead.canonical_url;
    url.split("://")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .unwrap_or(url)
        .to_string()
}

/// Route a `vlm_ground` step's reading into the matching [`ExtractedFields`]
/// column. `intent` names the field being looked for (e.g. `"phone"`); the
/// vision agent's `description` carries the text it read off the page.
fn apply_extraction_hint(
    extracted: &mut ExtractedFields,
    intent: Option<&str>,
    response: &vision_client::ProcessVisionResponse,
) {
    let Some(text) = response.description.clone() else { return };
    match intent {
        Some("phone") => extracted.phone.get_or_insert(text),
        Some("email") => extracted.email.get_or_insert(text),
        Some("address") => extracted.address.get_or_insert(text),
        Some("age") => {
            if let Ok(age) = text.trim().parse::<i32>() {
                extracted.age.get_or_insert(age);
            }
            return;
        }
        Some("income") => {
            let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
            if let Ok(income) = digits.parse::<i64>() {
                extracted.income.get_or_insert(income);
            }
            return;
        }
        _ => return,
    };
}

fn trauma_signals_for(err: &WorkerError) -> Vec<TraumaSignal> {
    match err {
        WorkerError::HoneypotBlocked { .. } => vec![TraumaSignal::HoneypotTrap],
        WorkerError::CaptchaUnsolved { .. } => vec![TraumaSignal::CaptchaUnsolved],
        WorkerError::Timeout { .. } => vec![TraumaSignal::Timeout],
        // A Browser 403 only ever reaches this far after `run_mission`'s own
        // rotate-once retry has already been exhausted (the first 403 is
        // handled inline and never returned as an error), so this is always
        // the second, unrecoverable 403 for the mission.
        WorkerError::Browser(browserless_client::BrowserlessError::Api { status: 403, .. }) => {
            vec![TraumaSignal::SessionBroken]
        }
        _ => vec![],
    }
}
