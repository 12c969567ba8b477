//! CLI error handling with user-friendly messages.
//!
//! Every failure ends up here, is printed as one line and exits with code 1.

use std::fmt;
use std::process;
use tilesnap::config::ConfigFileError;
use tilesnap::export::ExportError;
use tilesnap::provider::ProviderError;
use tilesnap::service::ServiceError;
use tilesnap::snapshot::{IntervalParseError, StoreError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Failed to start the async runtime
    Runtime(String),
    /// Configuration error
    Config(String),
    /// Bad command-line input
    Usage(String),
    /// Snapshot store failure
    Store(StoreError),
    /// Tile service failure
    Service(ServiceError),
    /// Failed to build the chunk source
    Provider(ProviderError),
    /// Image export failure
    Export(ExportError),
    /// Tile server failure
    Serve(std::io::Error),
    /// Prompt could not be shown
    Prompt(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Store(StoreError::NoArea)
            | CliError::Service(ServiceError::Store(StoreError::NoArea)) => {
                eprintln!();
                eprintln!("Select an area with --rect or --polygon, or capture an existing snapshot.");
            }
            CliError::Serve(_) => {
                eprintln!();
                eprintln!("Is another process already listening on that port?");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Runtime(msg) => write!(f, "Failed to start runtime: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Usage(msg) => write!(f, "{}", msg),
            CliError::Store(e) => write!(f, "{}", e),
            CliError::Service(e) => write!(f, "{}", e),
            CliError::Provider(e) => write!(f, "Failed to create chunk source: {}", e),
            CliError::Export(e) => write!(f, "Export failed: {}", e),
            CliError::Serve(e) => write!(f, "Tile server error: {}", e),
            CliError::Prompt(msg) => write!(f, "Prompt failed: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Store(e) => Some(e),
            CliError::Service(e) => Some(e),
            CliError::Provider(e) => Some(e),
            CliError::Export(e) => Some(e),
            CliError::Serve(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}

impl From<ServiceError> for CliError {
    fn from(e: ServiceError) -> Self {
        CliError::Service(e)
    }
}

impl From<ProviderError> for CliError {
    fn from(e: ProviderError) -> Self {
        CliError::Provider(e)
    }
}

impl From<ExportError> for CliError {
    fn from(e: ExportError) -> Self {
        CliError::Export(e)
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<IntervalParseError> for CliError {
    fn from(e: IntervalParseError) -> Self {
        CliError::Usage(e.to_string())
    }
}
