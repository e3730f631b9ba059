use std::env;
use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::error::BoxError;
use crate::models::config::{AppConfig, LogConfig};

pub const DIRECTUS_TOKEN_ENV: &str = "CROSSPOST_DIRECTUS_TOKEN";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, BoxError> {
    let content = fs::read_to_string(path)?;
    let mut cfg: AppConfig = serde_yaml::from_str(&content)?;
    override_directus_token(&mut cfg, env::var(DIRECTUS_TOKEN_ENV).ok());
    Ok(cfg)
}

/// Токен из окружения имеет приоритет над файлом
fn override_directus_token(cfg: &mut AppConfig, token: Option<String>) {
    let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
        return;
    };
    if let Some(directus) = cfg.directus.as_mut() {
        directus.token = token;
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `log.level`.
///
/// The returned guard must be held for the lifetime of the process when file output is on.
pub fn init_logging(log: Option<&LogConfig>) -> Option<WorkerGuard> {
    let spec = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| log.and_then(|l| l.level.clone()))
        .unwrap_or_else(|| "info".to_string());

    match log.and_then(|l| l.dir.as_deref()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "crosspost.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(spec))
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .compact()
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(spec))
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact()
                .try_init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::platform::Platform;
    use std::io::Write;

    const SAMPLE: &str = r#"
directus:
  base_url: http://localhost:8055
  token: file-token
media:
  media_root: ./media
  imgur:
    client_id: abc
platforms:
  vk:
    api_version: "5.199"
credentials:
  telegram:
    bot_token: "123:ABC"
    chat_id: "555"
publish:
  default_platforms: [telegram, facebook]
"#;

    #[test]
    fn loads_yaml_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let cfg = load_config(file.path()).unwrap();

        let directus = cfg.directus.clone().unwrap();
        assert_eq!(directus.collection(), "campaign_content");
        assert_eq!(directus.timeout_secs(), 10);

        let media = cfg.media();
        assert_eq!(media.imgur.unwrap().api_base_url(), "https://api.imgur.com");
        assert!(media.object_storage.is_none());

        let platforms = cfg.platforms();
        assert_eq!(platforms.vk.unwrap().api_version(), "5.199");
        assert_eq!(platforms.facebook.unwrap_or_default().api_version(), "v19.0");

        assert_eq!(cfg.default_platforms(), vec![Platform::Telegram, Platform::Facebook]);
        let creds = cfg.credential_set();
        assert!(creds.require(Platform::Telegram).is_ok());
        assert!(creds.require(Platform::Facebook).is_err());
    }

    #[test]
    fn env_token_overrides_file() {
        let mut cfg: AppConfig = serde_yaml::from_str(SAMPLE).unwrap();
        override_directus_token(&mut cfg, Some("  ".into()));
        assert_eq!(cfg.directus.as_ref().unwrap().token, "file-token");
        override_directus_token(&mut cfg, Some("env-token".into()));
        assert_eq!(cfg.directus.as_ref().unwrap().token, "env-token");
    }

    #[test]
    fn empty_config_is_valid() {
        let cfg: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert!(cfg.default_platforms().is_empty());
        assert!(cfg.credential_set().platforms().next().is_none());
    }
}
