use clap::Parser;
use dealflow::{mailer, settings, store, web};
use miette::Result;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "dealflow",
    version,
    about = "Off-market wholesale marketplace API"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(platform_url = %settings.platform.url, "Loaded configuration");

    // clients for the hosted platform and the mail provider
    let store = store::Store::new(&settings.platform)?;
    let mailer = mailer::Mailer::new(&settings.mail)?;

    // start web server
    web::serve(settings, store, mailer).await?;
    Ok(())
}
