pub mod loader;
pub mod schema;

pub use loader::{ConfigLoader, Overrides};
pub use schema::{API_KEY_ENV, AuthConfig, FallbackConfig, ScanConfig};
