use anyhow::{bail, Context};
use greeting_lb::{api, config::Config, runner};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // greeting_lb <api|client> [config.yaml]
    let mut args = std::env::args().skip(1);
    let role = args.next().unwrap_or_else(|| "client".to_string());
    let path = args.next().map(PathBuf::from);
    let cfg = Config::load(path.as_deref()).context("loading configuration")?;

    match role.as_str() {
        "api" => api::run_api(&cfg.api).await.context("api service stopped")?,
        "client" => {
            let report = runner::run_client(&cfg.client).await?;
            if report.configured.is_err() && report.filter.is_err() && report.manual.is_err() {
                bail!("no style reached service '{}'", cfg.client.service_id);
            }
        }
        other => bail!("unknown role '{}', expected 'api' or 'client'", other),
    }
    Ok(())
}
