//! Manifest command

use anyhow::{Context, Result};
use camino::Utf8Path;
use keeper_core::{parse_manifest, ParsedManifest};
use keeper_extensions::{HttpManifestFetcher, ManifestFetcher};
use serde_json::json;
use url::Url;

use crate::cli::{ManifestCheckArgs, ManifestCommands};
use crate::output;
use crate::utils;

pub async fn run(cmd: ManifestCommands, config_path: Option<&Utf8Path>) -> Result<()> {
    match cmd {
        ManifestCommands::Check(args) => check(args, config_path).await,
    }
}

/// Where a manifest document comes from
#[derive(Debug, PartialEq, Eq)]
enum ManifestSource {
    Remote(Url),
    File(String),
}

impl ManifestSource {
    fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Remote(url),
            _ => Self::File(raw.to_string()),
        }
    }
}

async fn check(args: ManifestCheckArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let content = match ManifestSource::parse(&args.source) {
        ManifestSource::Remote(url) => {
            let config = utils::load_config(config_path)?;
            let fetcher = HttpManifestFetcher::new(&config.network)?;
            let spinner = (!args.json).then(|| output::spinner(&format!("Fetching {}", url)));
            let fetched = fetcher.fetch(&url).await;
            if let Some(spinner) = spinner {
                spinner.finish_and_clear();
            }
            fetched.with_context(|| format!("Failed to fetch manifest from {}", url))?
        }
        ManifestSource::File(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read manifest file {}", path))?,
    };

    let parsed = parse_manifest(&content).context("Manifest rejected")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&check_report(&parsed))?);
    } else {
        print_report(&args.source, &parsed);
    }

    Ok(())
}

fn check_report(parsed: &ParsedManifest) -> serde_json::Value {
    let dropped: Vec<_> = parsed
        .dropped
        .iter()
        .map(|d| json!({ "key": d.key, "reason": d.reason }))
        .collect();

    json!({
        "accepted": parsed.manifest,
        "dropped": dropped,
    })
}

fn print_report(source: &str, parsed: &ParsedManifest) {
    output::header(&format!("Manifest: {}", source));

    for (id, directive) in parsed.manifest.iter() {
        let detail = match (&directive.update_url, &directive.external_crx) {
            (Some(url), _) => url.to_string(),
            (None, Some(crx)) => format!(
                "{} ({})",
                crx,
                directive.external_version.as_deref().unwrap_or("?")
            ),
            (None, None) => String::new(),
        };
        output::kv(id.as_str(), &detail);
    }

    if parsed.dropped.is_empty() {
        output::success(&format!("{} entries accepted", parsed.manifest.len()));
    } else {
        output::warning(&format!(
            "{} entries accepted, {} dropped",
            parsed.manifest.len(),
            parsed.dropped.len()
        ));
        for dropped in &parsed.dropped {
            output::kv(&dropped.key, &dropped.reason);
        }
    }
}
