use std::str::FromStr;

use anyhow::{Context, Result};

use super::{
    config_model::{Asaas, Database, DotEnvyConfig, Reconcile, Server},
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    from_lookup(|key| std::env::var(key).ok())
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or("".to_string());
    Stage::try_from(&stage_str).unwrap_or_default()
}

fn from_lookup<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let value = |key: &str| {
        lookup(key).and_then(|v| {
            let trimmed = v.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        })
    };

    let server = Server {
        port: parse_or(value("SERVER_PORT"), 8080).context("SERVER_PORT is invalid")?,
        body_limit: parse_or(value("SERVER_BODY_LIMIT"), 10)
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: parse_or(value("SERVER_TIMEOUT"), 30).context("SERVER_TIMEOUT is invalid")?,
    };

    let database = value("DATABASE_URL").map(|url| Database { url });

    let stage = value("STAGE")
        .and_then(|raw| Stage::try_from(&raw).ok())
        .unwrap_or_default();

    let asaas = Asaas {
        access_token: value("ASAAS_ACCESS_TOKEN"),
        api_version: value("ASAAS_API_VERSION").unwrap_or_else(|| "v3".to_string()),
        sandbox: parse_or(value("ASAAS_SANDBOX"), stage != Stage::Production)
            .context("ASAAS_SANDBOX is invalid")?,
        webhook_token: value("ASAAS_WEBHOOK_TOKEN"),
    };

    let reconcile = Reconcile {
        page_size: parse_or(value("RECONCILE_PAGE_SIZE"), 100u32)
            .context("RECONCILE_PAGE_SIZE is invalid")?
            .clamp(1, 100),
        max_pages: value("RECONCILE_MAX_PAGES")
            .map(|raw| raw.parse::<u32>())
            .transpose()
            .context("RECONCILE_MAX_PAGES is invalid")?
            .filter(|max| *max > 0),
    };

    Ok(DotEnvyConfig {
        server,
        database,
        asaas,
        reconcile,
    })
}

fn parse_or<T>(raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(default),
    }
}
