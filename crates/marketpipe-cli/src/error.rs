use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] marketpipe_core::ConfigError),

    #[error(transparent)]
    Validation(#[from] marketpipe_core::ValidationError),

    #[error("pipeline run failed: {0}")]
    Flow(#[from] marketpipe_core::FlowError),

    #[error(transparent)]
    Warehouse(#[from] marketpipe_core::WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Validation(_) => 2,
            Self::Flow(_) => 3,
            Self::Warehouse(_) => 4,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
