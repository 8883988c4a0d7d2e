use clap::Parser;
use geocodeable::config::Settings;
use geocodeable::geocode::{
    geocode_record, AddressComponents, AddressInput, GeoResult, ProviderInfo, ResolutionOptions, Resolver,
};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// geocode — resolve addresses to coordinates through interchangeable providers.
///
/// Examples:
///   geocode "1600 Amphitheatre Pkwy, Mountain View, CA"
///   geocode "10 Downing Street, London, SW1A 2AA" --country GB
///   geocode --city Berlin --country-name Germany --country DE --provider yahoo
///   geocode --record customer.json
///   geocode --providers
///   geocode --serve --port 8080
#[derive(Parser)]
#[command(name = "geocode", version, about, long_about = None)]
struct Cli {
    /// Free-text address. Example: geocode "Stockholm"
    #[arg(index = 1)]
    query: Option<String>,

    /// Street address part.
    #[arg(long)]
    street: Option<String>,

    /// City part.
    #[arg(long)]
    city: Option<String>,

    /// Region / state part.
    #[arg(long)]
    region: Option<String>,

    /// Postal code part.
    #[arg(long)]
    postal_code: Option<String>,

    /// Country part of the address text (e.g. "Germany").
    #[arg(long)]
    country_name: Option<String>,

    /// Country code for the request (ISO 3166-1 alpha-2, e.g. GB).
    #[arg(long)]
    country: Option<String>,

    /// Force a provider (e.g. google, multimap, yahoo).
    #[arg(long)]
    provider: Option<String>,

    /// Skip the result cache.
    #[arg(long)]
    no_cache: bool,

    /// Fetch timeout in seconds for this run.
    #[arg(long)]
    timeout: Option<u64>,

    /// Config file (JSON). Defaults to ~/.geocodeable/config.json.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Geocode a JSON record file and print it with coordinates filled in.
    #[arg(long)]
    record: Option<PathBuf>,

    /// List configured providers.
    #[arg(long)]
    providers: bool,

    /// Serve the HTTP API instead of resolving once.
    #[arg(long)]
    serve: bool,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,
}

impl Cli {
    fn components(&self) -> AddressComponents {
        AddressComponents {
            street_address: self.street.clone(),
            city: self.city.clone(),
            region: self.region.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country_name.clone(),
        }
    }

    fn input(&self) -> Result<AddressInput, String> {
        let components = self.components();
        match (&self.query, components.is_empty()) {
            (Some(_), false) => Err("Give either a query or address parts, not both.".into()),
            (Some(q), true) => Ok(AddressInput::Query(q.clone())),
            (None, _) => Ok(AddressInput::Components(components)),
        }
    }

    fn options(&self) -> ResolutionOptions {
        ResolutionOptions {
            provider: self.provider.clone(),
            country_code: self.country.clone(),
            use_cache: !self.no_cache,
            timeout: self.timeout.map(Duration::from_secs),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let mut settings = Settings::load(cli.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(secs) = cli.timeout {
        settings.timeout_secs = secs;
    }
    let resolver = settings.build_resolver().map_err(|e| e.to_string())?;

    if cli.providers {
        let list: Vec<ProviderInfo> = resolver.registry().iter().map(ProviderInfo::from).collect();
        return print_json(&list);
    }

    if cli.serve {
        let runtime = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
        return runtime
            .block_on(geocodeable::server::start(resolver, settings.fields, &cli.host, cli.port))
            .map_err(|e| format!("Server error: {}", e));
    }

    if let Some(path) = &cli.record {
        return geocode_record_file(&resolver, &settings, path, &cli.options());
    }

    let input = cli.input()?;
    let result = resolver.resolve(input, &cli.options()).map_err(|e| e.to_string())?;
    print_summary(&result);
    print_json(&result)
}

fn geocode_record_file(
    resolver: &Resolver,
    settings: &Settings,
    path: &Path,
    opts: &ResolutionOptions,
) -> Result<(), String> {
    let data = std::fs::read_to_string(path).map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
    let mut record: Map<String, Value> =
        serde_json::from_str(&data).map_err(|e| format!("{} is not a JSON object: {}", path.display(), e))?;

    match geocode_record(resolver, &settings.fields, &mut record, opts).map_err(|e| e.to_string())? {
        Some(result) => print_summary(&result),
        None => eprintln!(
            "  Record has no '{}'/'{}' fields; nothing to geocode.",
            settings.fields.lat, settings.fields.lng
        ),
    }
    print_json(&record)
}

fn print_summary(result: &GeoResult) {
    eprintln!("  \u{1F4CD} {}", result);
    if !result.has_coordinates() {
        eprintln!("  Provider '{}' could not geocode this address.", result.provider);
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}
