use anyhow::{Context, Result};
use gp_archives::{datasets, sink, Config};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) config: optional YAML path as the only argument ──────────
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_yaml_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => Config::default(),
    };
    info!(
        raw_dir = %config.raw_dir.display(),
        interim_dir = %config.interim_dir.display(),
        "configured"
    );

    // ─── 3) monthly appointments ─────────────────────────────────────
    let daily = datasets::sub_icb_daily(&config, None)
        .context("building sub-ICB daily appointments")?;
    sink::write_interim(&config.interim_dir, "sub_icb_daily_df", &daily, config.output_format)?;

    // ─── 4) QOF prevalence mapped to geographies ─────────────────────
    let joined = datasets::mapped_practice_prevalence(&config, None)
        .context("building mapped practice prevalence")?;
    info!(
        null_counts = %serde_json::to_string(&joined.report.null_counts)?,
        "join null counts"
    );
    sink::write_interim(
        &config.interim_dir,
        "mapped_practice_prevalence_df",
        &joined.table,
        config.output_format,
    )?;

    info!("all done");
    Ok(())
}
