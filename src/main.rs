use anyhow::Result;
use specvit_extract::config::ExtractConfig;
use specvit_extract::pipeline;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ExtractConfig::from_env();
    log::debug!("{config:?}");
    pipeline::run(&config)?;
    Ok(())
}
