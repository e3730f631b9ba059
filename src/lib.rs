pub mod error;
pub mod media;
pub mod models;
pub mod publishers;
pub mod services;
pub mod traits;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, bail};
use tracing::info;

use crate::models::config::AppConfig;
use crate::models::platform::Platform;
use crate::models::publication::{PublishReport, StatusWrite};
use crate::models::types::{ContentId, ImageRef};
use crate::services::media_resolver::{MediaResolver, ResolvedMedia};
use crate::services::orchestrator::Orchestrator;
use crate::services::settings::load_config;
use crate::services::text_adapter::{PlatformText, adapt_text};

/// Loads the YAML config with file context on failure.
pub fn load_app_config(path: &str) -> anyhow::Result<AppConfig> {
    load_config(path).map_err(|e| anyhow::anyhow!("failed to load {}: {}", path, e))
}

/// Publishes one content item. An empty `platforms` falls back to `publish.default_platforms`.
pub async fn publish_content(cfg: &AppConfig, content_id: &str, platforms: Vec<Platform>) -> anyhow::Result<PublishReport> {
    let platforms = if platforms.is_empty() { cfg.default_platforms() } else { platforms };
    if platforms.is_empty() {
        bail!("no platforms given and publish.default_platforms is empty");
    }
    let orchestrator = Orchestrator::from_config(cfg).map_err(|e| anyhow::anyhow!("setup failed: {}", e))?;
    let id = ContentId::from(content_id);
    info!(content_id = %id, platforms = ?platforms, "cli: publish");
    let report = orchestrator.publish(&id, platforms, &cfg.credential_set()).await?;
    Ok(report)
}

/// Adapts a body read from `source` (`-` is stdin).
pub fn adapt_source(source: &str, platform: Platform, hashtags: &[String]) -> anyhow::Result<PlatformText> {
    let body = if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(Path::new(source)).with_context(|| format!("failed to read {}", source))?
    };
    Ok(adapt_text(&body, hashtags, platform))
}

pub async fn resolve_reference(cfg: &AppConfig, reference: &str) -> anyhow::Result<ResolvedMedia> {
    let resolver = MediaResolver::from_config(&cfg.media()).map_err(|e| anyhow::anyhow!("setup failed: {}", e))?;
    Ok(resolver.resolve(&ImageRef::from(reference)).await?)
}

/// One line per platform, then the status write outcome.
pub fn format_report(report: &PublishReport) -> String {
    let mut lines: Vec<String> = report
        .results
        .values()
        .map(|r| match (r.post_url(), r.error()) {
            (Some(url), _) => format!("{}: {} {}", r.platform(), r.status(), url),
            (None, Some(err)) => format!("{}: {} ({})", r.platform(), r.status(), err),
            (None, None) => format!("{}: {}", r.platform(), r.status()),
        })
        .collect();
    lines.push(match &report.status {
        StatusWrite::Recorded => "status: recorded".to_string(),
        StatusWrite::Failed(reason) => format!("status: NOT recorded ({})", reason),
    });
    lines.join("\n")
}
