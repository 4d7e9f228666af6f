mod settings;

pub use settings::{BackendConfig, ComposerConfig, JwtConfig, ServerConfig, Settings};
