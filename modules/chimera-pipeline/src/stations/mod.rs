pub mod blueprint_loader;
pub mod demographics;
pub mod dnc_gatekeep;
pub mod identity;
pub mod persist;
pub mod phone_gatekeep;
pub mod scraper;
pub mod skip_trace;

pub use blueprint_loader::BlueprintLoaderStation;
pub use demographics::DemographicsStation;
pub use dnc_gatekeep::DncGatekeeperStation;
pub use identity::IdentityResolutionStation;
pub use persist::PersistStation;
pub use phone_gatekeep::PhoneGatekeepStation;
pub use scraper::ScraperEnrichmentStation;
pub use skip_trace::SkipTracingFallbackStation;
