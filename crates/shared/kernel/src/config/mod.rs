use config::{Config, Environment, File, Map};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::info;

const DEFAULT_CONFIG: &str = "server";
const ENV_PREFIX: &str = "DHUB";

#[dhub_derive::dhub_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Loads layered configuration: a file, then `DHUB__`-prefixed environment overrides.
///
/// 1. **File**: `path` if given (it must exist), otherwise `server.{toml,json,yaml}` in the
///    working directory when present. The extension is resolved by the `config` crate.
/// 2. **Environment**: `DHUB__SCANNER__PATH=/srv/deployments` maps to `scanner.path`.
///
/// # Errors
/// Returns [`ConfigError::Config`] when an explicit file is missing, a source cannot
/// be parsed, or the merged values do not deserialize into `T`.
///
/// # Example
/// ```rust
/// use dhub_kernel::config::load_config;
///
/// #[derive(Default, serde::Deserialize)]
/// struct ScannerOnly {
///     #[serde(default)]
///     interval_ms: u64,
/// }
///
/// let cfg: ScannerOnly = load_config(Some("config/local")).unwrap_or_default();
/// ```
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    load_config_with_env(path, None)
}

/// Like [`load_config`], but reads overrides from `env` instead of the process
/// environment when given. Keys keep their `DHUB__` prefix.
///
/// # Errors
/// Same as [`load_config`].
pub fn load_config_with_env<T>(path: Option<impl AsRef<Path>>, env: Option<Map<String, String>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let (effective_path, required) = path
        .map_or_else(|| (PathBuf::from(DEFAULT_CONFIG), false), |p| (p.as_ref().to_path_buf(), true));

    let builder = Config::builder()
        .add_source(File::from(effective_path.as_path()).required(required))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .convert_case(config::Case::Snake)
                .try_parsing(true)
                .source(env),
        );

    info!(path = %effective_path.display(), required, "Loading configuration");

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}
