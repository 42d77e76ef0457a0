use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use weather_report::email::report_sender;
use weather_report::notify::ConsoleNotifier;
use weather_report::records::FileRecordStore;
use weather_report::{
    EntityId, HttpWeatherLookup, LocationResolver, ReportDispatcher, Severity, ViewState,
    WeatherFetcher, WeatherWidget, WidgetConfig, geolocation, logging,
};

/// Current weather for a record's address or your position, with email reports
#[derive(Debug, Parser)]
#[command(name = "weather-report", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show current weather
    Show {
        /// Record whose stored address is used instead of the device position
        #[arg(long)]
        entity: Option<String>,
    },
    /// Show current weather, then email it as a report
    Send {
        #[arg(long)]
        entity: Option<String>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = WidgetConfig::load_from_path(cli.config.clone())?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    logging::init(&config.logging)?;

    match cli.command {
        Command::Show { entity } => {
            let widget = build_widget(&config, entity.map(EntityId::new))?;
            let mut feed = widget.mount();
            widget.settle(&mut feed).await;
            render(&widget.state(), &config);
        }
        Command::Send { entity } => {
            let widget = build_widget(&config, entity.map(EntityId::new))?;
            let mut feed = widget.mount();
            widget.settle(&mut feed).await;
            render(&widget.state(), &config);
            let sent = widget
                .send_report()
                .await
                .is_some_and(|notification| notification.severity == Severity::Success);
            if !sent {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Config => {
            let path = cli.config.or_else(WidgetConfig::get_config_path);
            println!(
                "Using config from: {}",
                path.map_or_else(|| "<defaults>".to_string(), |p| p.display().to_string())
            );
            println!(
                "{}",
                serde_json::to_string_pretty(&redacted(config))
                    .context("Failed to render configuration")?
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn build_widget(config: &WidgetConfig, entity: Option<EntityId>) -> Result<WeatherWidget> {
    let timeout = Duration::from_secs(config.weather.timeout_seconds.into());
    let records = Arc::new(FileRecordStore::load(config.records_path())?);
    let geolocation = geolocation::from_config(&config.geolocation, timeout)?;
    let lookup = Arc::new(HttpWeatherLookup::new(&config.weather)?);

    let sender = report_sender(&config.email, records.clone(), config.actor());

    Ok(WeatherWidget::new(
        LocationResolver::new(records, geolocation),
        WeatherFetcher::new(lookup),
        ReportDispatcher::new(sender),
        Arc::new(ConsoleNotifier),
        entity,
        config.actor(),
    ))
}

fn render(state: &ViewState, config: &WidgetConfig) {
    println!("Location:     {}", state.location.place);
    println!("Temperature:  {}", state.temperature());
    println!("Conditions:   {}", state.weather_conditions());
    println!("Humidity:     {}", state.humidity());
    println!("Wind speed:   {}", state.wind_speed());
    if !state.cloud_icon_url().is_empty() {
        println!("Clouds:       {}", state.cloud_icon_url());
    }
    println!(
        "Last report:  {}",
        state.last_report_sent_formatted_as(&Local, &config.display.date_time_format)
    );
    if let Some(error) = &state.error {
        println!("Error:        {error}");
    }
}

fn redacted(mut config: WidgetConfig) -> WidgetConfig {
    if config.email.password.is_some() {
        config.email.password = Some("********".to_string());
    }
    if config.weather.api_key.is_some() {
        config.weather.api_key = Some("********".to_string());
    }
    config
}
