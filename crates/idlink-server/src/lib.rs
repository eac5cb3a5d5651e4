//! Server wiring for idlink: configuration loading and the top-level router.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use axum::Router;
use config::{Config, ConfigError, Environment, File};
use idlink_core::store::IdentityStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration.
///
/// Sources, lowest precedence first: built-in defaults, the TOML file,
/// `IDLINK_*` environment variables, then `DATABASE_URL` for the store path.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  /// How long an identify call waits for another connection's write lock.
  pub busy_timeout_ms: u64,
}

impl ServerConfig {
  pub fn busy_timeout(&self) -> Duration { Duration::from_millis(self.busy_timeout_ms) }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Load configuration from `path` (optional), the environment, and
/// `DATABASE_URL`.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
  let database_url = std::env::var("DATABASE_URL").ok();
  build_config(
    File::from(path).required(false),
    database_url.as_deref(),
  )
}

fn build_config<T>(file: T, database_url: Option<&str>) -> Result<ServerConfig, ConfigError>
where
  T: config::Source + Send + Sync + 'static,
{
  let mut builder = Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 3000)?
    .set_default("store_path", "idlink.db")?
    .set_default("busy_timeout_ms", 5000)?
    .add_source(file)
    .add_source(Environment::with_prefix("IDLINK"));

  if let Some(url) = database_url {
    match store_path_from_database_url(url) {
      Some(path) => {
        builder = builder.set_override("store_path", path.to_string_lossy().into_owned())?;
      }
      None => tracing::warn!(%url, "ignoring DATABASE_URL: only sqlite:/// URLs are supported"),
    }
  }

  let mut cfg: ServerConfig = builder.build()?.try_deserialize()?;
  cfg.store_path = expand_tilde(&cfg.store_path);
  Ok(cfg)
}

/// Map an SQLAlchemy-style SQLite URL to a file path: `sqlite:///rel.db` is
/// relative, `sqlite:////abs/path.db` is absolute.
pub fn store_path_from_database_url(url: &str) -> Option<PathBuf> {
  url
    .strip_prefix("sqlite:///")
    .filter(|rest| !rest.is_empty())
    .map(PathBuf::from)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The API router wrapped in request tracing.
pub fn app<S>(store: Arc<S>) -> Router
where
  S: IdentityStore + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  idlink_api::api_router(store).layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use config::FileFormat;
  use idlink_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  fn toml(src: &str) -> File<config::FileSourceString, FileFormat> {
    File::from_str(src, FileFormat::Toml)
  }

  #[test]
  fn defaults_apply_without_file() {
    let cfg = build_config(toml(""), None).unwrap();
    assert_eq!(cfg.port, 3000);
    assert_eq!(cfg.store_path, PathBuf::from("idlink.db"));
    assert_eq!(cfg.busy_timeout(), Duration::from_secs(5));
  }

  #[test]
  fn file_values_override_defaults() {
    let cfg = build_config(
      toml("host = \"0.0.0.0\"\nport = 8080\nstore_path = \"/var/lib/idlink.db\""),
      None,
    )
    .unwrap();
    assert_eq!(cfg.address(), "0.0.0.0:8080");
    assert_eq!(cfg.store_path, PathBuf::from("/var/lib/idlink.db"));
  }

  #[test]
  fn database_url_overrides_store_path() {
    let cfg = build_config(
      toml("store_path = \"from-file.db\""),
      Some("sqlite:///database.db"),
    )
    .unwrap();
    assert_eq!(cfg.store_path, PathBuf::from("database.db"));
  }

  #[test]
  fn unsupported_database_url_is_ignored() {
    let cfg = build_config(toml(""), Some("postgres://localhost/idlink")).unwrap();
    assert_eq!(cfg.store_path, PathBuf::from("idlink.db"));
  }

  #[test]
  fn database_url_forms() {
    assert_eq!(
      store_path_from_database_url("sqlite:///database.db"),
      Some(PathBuf::from("database.db"))
    );
    assert_eq!(
      store_path_from_database_url("sqlite:////srv/idlink/contacts.db"),
      Some(PathBuf::from("/srv/idlink/contacts.db"))
    );
    assert_eq!(store_path_from_database_url("sqlite:///"), None);
    assert_eq!(store_path_from_database_url("mysql://x"), None);
  }

  #[test]
  fn expand_tilde_leaves_plain_paths_alone() {
    assert_eq!(expand_tilde(Path::new("/tmp/x.db")), PathBuf::from("/tmp/x.db"));
    assert_eq!(expand_tilde(Path::new("rel.db")), PathBuf::from("rel.db"));
  }

  #[tokio::test]
  async fn app_serves_identify_through_trace_layer() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let req = Request::builder()
      .method("POST")
      .uri("/identify")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(r#"{"email":"a@x.com","phoneNumber":"1"}"#))
      .unwrap();

    let resp = app(store).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["contact"]["emails"], serde_json::json!(["a@x.com"]));
  }
}
