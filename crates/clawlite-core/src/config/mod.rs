//! ClawLite configuration layer
//!
//! Every environment read lives here; the rest of the workspace consumes typed
//! structs instead of calling `std::env::var`.
//!
//! - `loader`: env_or, env_optional, env_bool, env_u64, `.env` parsing
//! - `schema`: RunnerConfig, ObservabilityConfig
//! - `env_keys`: key constants (with legacy aliases)

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{
    env_bool, env_optional, env_or, env_u64, load_dotenv, read_env_file,
    secret_key_names,
};
pub use schema::{ObservabilityConfig, RunnerConfig};
