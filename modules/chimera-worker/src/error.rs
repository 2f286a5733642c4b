use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("browser error: {0}")]
    Browser(#[from] browserless_client::BrowserlessError),

    #[error("vision call failed: {0}")]
    Vision(String),

    #[error("selector {0} not found in DOM")]
    SelectorNotFound(String),

    #[error("honeypot blocked click on {selector} in {domain}")]
    HoneypotBlocked { domain: String, selector: String },

    #[error("captcha unsolved after {attempts} attempts")]
    CaptchaUnsolved { attempts: u32 },

    #[error("mission timed out after {elapsed_s}s")]
    Timeout { elapsed_s: f64 },
}
