pub mod captcha;
pub mod coords;
pub mod entropy;
pub mod error;
pub mod honeypot;
pub mod worker;

pub use entropy::{EntropySink, NoopEntropySink};
pub use error::{Result, WorkerError};
pub use worker::{CookieLookup, ForbiddenLookup, Worker, WorkerConfig};
