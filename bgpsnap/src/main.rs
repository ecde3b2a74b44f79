//! bgpsnap binary entry point.
//!
//! Runs one collection over a device fleet, optionally persists the
//! snapshot, and reports the outcome. Exit status: 0 when every device
//! succeeded, 1 for partial failure, 2 when no device succeeded, 3 for
//! a fatal configuration or persistence error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use secrecy::SecretString;

use bgpsnap::collect::{self, CollectOptions, RunOptions};
use bgpsnap::config::{self, CredentialStore, Credentials, DeviceDescriptor};
use bgpsnap::error::{ConfigError, Error};
use bgpsnap::model::AddressFamily;
use bgpsnap::normalize::{AsFilterMode, AsPolicy};
use bgpsnap::report::{self, OutputFormat};
use bgpsnap::store::SnapshotStore;
use bgpsnap::transport::SshTransport;
use bgpsnap::vendor::{Vendor, VendorCatalog};

/// bgpsnap - fleet-wide BGP neighbour snapshots
#[derive(Parser, Debug)]
#[command(name = "bgpsnap", version, about, long_about = None)]
struct Cli {
    /// JSON seed file with devices to connect to
    #[arg(short, long, value_name = "FILE", conflicts_with = "device")]
    seed: Option<PathBuf>,

    /// Single device to connect to: hostname and vendor (IOS, IOS-XR, EOS, JunOS)
    #[arg(short, long, num_args = 2, value_names = ["HOSTNAME", "VENDOR"])]
    device: Option<Vec<String>>,

    /// JSON credentials file of {name: {username, password | key_file}}
    #[arg(long, value_name = "FILE", env = "BGPSNAP_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Username for the default credential set
    #[arg(short, long, env = "BGPSNAP_USERNAME")]
    username: Option<String>,

    /// Password for the default credential set
    #[arg(short, long, env = "BGPSNAP_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Snapshot database path; no path means report-only
    #[arg(long, value_name = "PATH")]
    db: Option<String>,

    /// Maximum devices in flight at once
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Overall run deadline in seconds
    #[arg(long, value_name = "SECONDS")]
    deadline: Option<u64>,

    /// Per-device connection timeout in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    connect_timeout: u64,

    /// Per-command timeout in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    command_timeout: u64,

    /// Routing tables to collect from text vendors
    #[arg(long, value_delimiter = ',', default_value = "ipv4,ipv6")]
    tables: Vec<String>,

    /// Keep only these AS numbers; can be given multiple times
    #[arg(long = "except-as", value_name = "ASN", conflicts_with = "ignore_as")]
    except_as: Vec<u32>,

    /// Drop these AS numbers; can be given multiple times
    #[arg(long = "ignore-as", value_name = "ASN")]
    ignore_as: Vec<u32>,

    /// Drop peers with reserved or private AS numbers
    #[arg(long)]
    ignore_private_asn: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormatArg::Summary)]
    out_format: OutputFormatArg,

    /// Verify device host keys against known_hosts
    #[arg(long)]
    verify_host_key: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormatArg {
    Json,
    Csv,
    Summary,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(value: OutputFormatArg) -> Self {
        match value {
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Csv => OutputFormat::Csv,
            OutputFormatArg::Summary => OutputFormat::Summary,
        }
    }
}

impl Cli {
    fn devices(&self) -> Result<Vec<DeviceDescriptor>, ConfigError> {
        if let Some(path) = &self.seed {
            return config::load_seed(path);
        }
        if let Some(pair) = &self.device {
            let vendor: Vendor = pair[1].parse()?;
            return Ok(vec![DeviceDescriptor::new(pair[0].clone(), vendor)]);
        }
        Err(ConfigError::InvalidOption {
            message: "required --seed or --device options are missing".to_string(),
        })
    }

    fn credential_store(&self) -> Result<CredentialStore, ConfigError> {
        if let Some(path) = &self.credentials {
            return CredentialStore::from_file(path);
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Ok(CredentialStore::single(
                Credentials::password(username, SecretString::from(password.as_str())),
            )),
            _ => Err(ConfigError::InvalidOption {
                message: "required --credentials or --username/--password options are missing"
                    .to_string(),
            }),
        }
    }

    fn tables(&self) -> Result<Vec<AddressFamily>, ConfigError> {
        self.tables
            .iter()
            .map(|name| {
                AddressFamily::from_table(name).ok_or_else(|| ConfigError::InvalidOption {
                    message: format!("unknown routing table '{name}'"),
                })
            })
            .collect()
    }

    fn as_policy(&self) -> AsPolicy {
        let mode = if !self.except_as.is_empty() {
            AsFilterMode::Except(self.except_as.iter().copied().collect())
        } else if !self.ignore_as.is_empty() {
            AsFilterMode::Ignore(self.ignore_as.iter().copied().collect())
        } else {
            AsFilterMode::All
        };
        AsPolicy {
            mode,
            ignore_private: self.ignore_private_asn,
        }
    }

    fn run_options(&self) -> Result<RunOptions, ConfigError> {
        Ok(RunOptions {
            concurrency: self.concurrency,
            deadline: self.deadline.map(Duration::from_secs),
            collect: CollectOptions {
                connect_timeout: Duration::from_secs(self.connect_timeout),
                command_timeout: Duration::from_secs(self.command_timeout),
                tables: self.tables()?,
                as_policy: self.as_policy(),
                ..CollectOptions::default()
            },
        })
    }
}

/// Build a SQLite URL from a plain path argument.
fn db_url(arg: &str) -> String {
    if arg.contains(':') {
        arg.to_string()
    } else {
        format!("sqlite:{arg}")
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Error> {
    let devices = cli.devices()?;
    let credentials = cli.credential_store()?;
    let options = cli.run_options()?;
    let catalog = VendorCatalog::builtin();

    let transport = if cli.verify_host_key {
        SshTransport::with_host_key_verification(None)
    } else {
        SshTransport::new()
    };

    let result = collect::run(
        Arc::new(transport),
        &catalog,
        &credentials,
        &devices,
        &options,
    )
    .await?;

    // Do not report the run as persisted until the store acknowledges.
    if let Some(db) = &cli.db {
        let store = SnapshotStore::connect(&db_url(db)).await?;
        store.save(&result).await?;
        store.close().await;
    }

    print!("{}", report::render(&result, cli.out_format.into())?);

    Ok(ExitCode::from(report::exit_code(&result)))
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("bgpsnap: {e}");
            ExitCode::from(3)
        }
    }
}
