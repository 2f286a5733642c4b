pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One cookie to seed into a session before its first navigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

/// Browser launch options for one worker session.
///
/// `stealth_init_script` is injected before any page script runs (see the
/// `fingerprint` crate, which renders this from the per-session seeds).
/// `cookies` primes an authenticated session (see `chimera-queue`'s cookie
/// store) without a separate login flow per mission.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub proxy_url: Option<String>,
    pub stealth_init_script: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: String,
    pub cookies: Vec<SessionCookie>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_zero_size(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GotoOutcome {
    pub status_code: Option<u16>,
}

impl GotoOutcome {
    pub fn is_forbidden(&self) -> bool {
        self.status_code == Some(403)
    }
}

/// Thin REST client over a Browserless instance.
pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let mut url = format!("{}{path}", self.base_url);
        if let Some(ref token) = self.token {
            url.push_str(if path.contains('?') { "&" } else { "?" });
            url.push_str(&format!("token={token}"));
        }
        url
    }

    /// Fetch fully-rendered HTML content for a URL via Browserless `/content`.
    pub async fn content(&self, url: &str) -> Result<String> {
        let body = serde_json::json!({ "url": url });
        let resp = self
            .client
            .post(self.endpoint("/content"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }

    /// Launch one session: a dedicated browser context pinned to `session_id`
    /// via a request header so subsequent `/function` calls reuse the same
    /// underlying container (Browserless session affinity).
    pub async fn launch_session(
        &self,
        session_id: &str,
        opts: LaunchOptions,
    ) -> Result<BrowserSession> {
        Ok(BrowserSession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            session_id: session_id.to_string(),
            opts,
        })
    }
}

/// One headless-browser session: one worker, one page, one sticky proxy key.
///
/// Every action is a single `/function` call running a small puppeteer
/// snippet server-side; the `X-Session-Id` header tells Browserless to keep
/// routing this worker's calls to the same launched browser instance.
pub struct BrowserSession {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    session_id: String,
    opts: LaunchOptions,
}

#[derive(Serialize)]
struct FunctionRequest {
    code: String,
    context: serde_json::Value,
}

impl BrowserSession {
    fn endpoint(&self, path: &str) -> String {
        let mut url = format!("{}{path}", self.base_url);
        if let Some(ref token) = self.token {
            url.push_str(if path.contains('?') { "&" } else { "?" });
            url.push_str(&format!("token={token}"));
        }
        url
    }

    async fn run_function(&self, code: &str, context: serde_json::Value) -> Result<serde_json::Value> {
        let req = FunctionRequest {
            code: code.to_string(),
            context,
        };
        let resp = self
            .client
            .post(self.endpoint("/function"))
            .header("X-Session-Id", &self.session_id)
            .header("Content-Type", "application/json")
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json().await.unwrap_or(serde_json::Value::Null))
    }

    pub fn opts(&self) -> &LaunchOptions {
        &self.opts
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Navigate and return the document response's HTTP status code.
    pub async fn goto(&self, url: &str, timeout_ms: u64) -> Result<GotoOutcome> {
        let code = r#"
            module.exports = async ({ page, context }) => {
                await page.setUserAgent(context.userAgent);
                await page.setViewport({ width: context.width, height: context.height });
                await page.evaluateOnNewDocument(context.stealthScript);
                const response = await page.goto(context.url, {
                    waitUntil: 'domcontentloaded',
                    timeout: context.timeoutMs,
                });
                return { data: { statusCode: response ? response.status() : null } };
            };
        "#;
        let result = self
            .run_function(
                code,
                serde_json::json!({
                    "url": url,
                    "userAgent": self.opts.user_agent,
                    "width": self.opts.viewport_width,
                    "height": self.opts.viewport_height,
                    "stealthScript": self.opts.stealth_init_script,
                    "timeoutMs": timeout_ms,
                }),
            )
            .await?;
        let status_code = result
            .get("data")
            .and_then(|d| d.get("statusCode"))
            .and_then(|v| v.as_u64())
            .map(|v| v as u16);
        Ok(GotoOutcome { status_code })
    }

    pub async fn wait(&self, ms: u64) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }

    /// Seed this session's cookie jar from `opts().cookies`. No-op if empty.
    /// Called once right after launch (and again after a session rotation),
    /// before the first navigation.
    pub async fn apply_cookies(&self) -> Result<()> {
        if self.opts.cookies.is_empty() {
            return Ok(());
        }
        let code = r#"
            module.exports = async ({ page, context }) => {
                await page.setCookie(...context.cookies);
                return { data: {} };
            };
        "#;
        self.run_function(code, serde_json::json!({ "cookies": self.opts.cookies })).await?;
        Ok(())
    }

    /// Whether `selector` resolves to an element in the DOM at all
    /// (independent of visibility — see the honeypot guard in `chimera-worker`).
    pub async fn element_exists(&self, selector: &str) -> Result<bool> {
        let code = r#"
            module.exports = async ({ page, context }) => {
                const exists = await page.$(context.selector) !== null;
                return { data: { exists } };
            };
        "#;
        let result = self
            .run_function(code, serde_json::json!({ "selector": selector }))
            .await?;
        Ok(result
            .get("data")
            .and_then(|d| d.get("exists"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    /// Bounding box of `selector`, or `None` if it has no box
    /// (`display:none` / zero size / not found).
    pub async fn bounding_box(&self, selector: &str) -> Result<Option<BoundingBox>> {
        let code = r#"
            module.exports = async ({ page, context }) => {
                const el = await page.$(context.selector);
                if (!el) return { data: { box: null } };
                const box = await el.boundingBox();
                return { data: { box } };
            };
        "#;
        let result = self
            .run_function(code, serde_json::json!({ "selector": selector }))
            .await?;
        let box_val = result.get("data").and_then(|d| d.get("box")).cloned();
        match box_val {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(v) => Ok(serde_json::from_value(v).ok()),
        }
    }

    /// Click at the element's center. Caller is responsible for the honeypot
    /// and behavioral-motion checks before calling this.
    pub async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        let code = r#"
            module.exports = async ({ page, context }) => {
                await page.mouse.click(context.x, context.y, { delay: context.delayMs });
                return { data: {} };
            };
        "#;
        self.run_function(
            code,
            serde_json::json!({ "x": x, "y": y, "delayMs": context_click_delay() }),
        )
        .await?;
        Ok(())
    }

    pub async fn input(&self, selector: &str, value: &str, press_enter: bool) -> Result<()> {
        let code = r#"
            module.exports = async ({ page, context }) => {
                await page.type(context.selector, context.value, { delay: 40 });
                if (context.pressEnter) await page.keyboard.press('Enter');
                return { data: {} };
            };
        "#;
        self.run_function(
            code,
            serde_json::json!({ "selector": selector, "value": value, "pressEnter": press_enter }),
        )
        .await?;
        Ok(())
    }

    /// Type one character at a time with per-keystroke delay, honoring
    /// backspace (`'\u{8}'`) as a typo correction. Lets a caller's WPM/typo
    /// model (the `fingerprint` crate) drive realistic inter-key timing
    /// without a round trip per character.
    pub async fn type_keystrokes(&self, selector: &str, keystrokes: &[(char, u64)], press_enter: bool) -> Result<()> {
        let code = r#"
            module.exports = async ({ page, context }) => {
                await page.focus(context.selector);
                for (const [ch, delayMs] of context.keystrokes) {
                    if (ch === '\b') {
                        await page.keyboard.press('Backspace');
                    } else {
                        await page.keyboard.type(ch);
                    }
                    await new Promise((resolve) => setTimeout(resolve, delayMs));
                }
                if (context.pressEnter) await page.keyboard.press('Enter');
                return { data: {} };
            };
        "#;
        let payload: Vec<(String, u64)> = keystrokes.iter().map(|(ch, delay)| (ch.to_string(), *delay)).collect();
        self.run_function(
            code,
            serde_json::json!({ "selector": selector, "keystrokes": payload, "pressEnter": press_enter }),
        )
        .await?;
        Ok(())
    }

    /// Full-page screenshot as PNG bytes (base64-decoded).
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        let code = r#"
            module.exports = async ({ page }) => {
                const buf = await page.screenshot({ encoding: 'base64' });
                return { data: { image: buf } };
            };
        "#;
        let result = self.run_function(code, serde_json::json!({})).await?;
        let b64 = result
            .get("data")
            .and_then(|d| d.get("image"))
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        base64_decode(b64).ok_or_else(|| BrowserlessError::Network("bad screenshot payload".into()))
    }

    /// Release the underlying browser context. Safe to call more than once.
    pub async fn close(&self) -> Result<()> {
        let code = r#"
            module.exports = async ({ page }) => {
                await page.close();
                return { data: {} };
            };
        "#;
        let _ = self.run_function(code, serde_json::json!({})).await;
        Ok(())
    }
}

/// Click-down delay per SPEC_FULL.md §4.5 (150-300ms), sampled by the caller
/// in `fingerprint`; this default covers direct `BrowserSession` use.
fn context_click_delay() -> u64 {
    180
}

fn base64_decode(s: &str) -> Option<Vec<u8>> {
    // Minimal standard-alphabet base64 decoder; avoids pulling in a new
    // dependency for a single decode call.
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut table = [255u8; 256];
    for (i, &c) in ALPHABET.iter().enumerate() {
        table[c as usize] = i as u8;
    }
    let clean: Vec<u8> = s.bytes().filter(|b| *b != b'=' && !b.is_ascii_whitespace()).collect();
    let mut out = Vec::with_capacity(clean.len() * 3 / 4);
    for chunk in clean.chunks(4) {
        let mut buf = [0u8; 4];
        for (i, &b) in chunk.iter().enumerate() {
            let v = table[b as usize];
            if v == 255 {
                return None;
            }
            buf[i] = v;
        }
        let n = chunk.len();
        out.push((buf[0] << 2) | (buf[1] >> 4));
        if n > 2 {
            out.push((buf[1] << 4) | (buf[2] >> 2));
        }
        if n > 3 {
            out.push((buf[2] << 6) | buf[3]);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_center_is_midpoint() {
        let b = BoundingBox { x: 10.0, y: 20.0, width: 100.0, height: 50.0 };
        assert_eq!(b.center(), (60.0, 45.0));
    }

    #[test]
    fn bounding_box_zero_size_detected() {
        let b = BoundingBox { x: 0.0, y: 0.0, width: 0.0, height: 10.0 };
        assert!(b.is_zero_size());
    }

    #[test]
    fn goto_outcome_detects_forbidden() {
        let outcome = GotoOutcome { status_code: Some(403) };
        assert!(outcome.is_forbidden());
        let ok = GotoOutcome { status_code: Some(200) };
        assert!(!ok.is_forbidden());
    }

    #[test]
    fn base64_roundtrip_known_value() {
        // "hi" -> "aGk="
        assert_eq!(base64_decode("aGk="), Some(b"hi".to_vec()));
    }
}
