use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Operate a remote NDI viewer and camera controller")]
pub struct Args {
    /// Base URL of the controller (e.g. http://ndi-box.local:5000)
    #[arg(long, default_value = "http://localhost:5000")]
    pub url: String,

    /// API path prefix on the controller
    #[arg(long, default_value = "/api")]
    pub api_path: String,

    /// Username for the controller login
    #[arg(long)]
    pub username: Option<String>,

    /// Password for the controller login
    #[arg(long, env = "EXTRASHOT_PASSWORD")]
    pub password: Option<String>,

    /// Allow invalid TLS certificates
    #[arg(long)]
    pub insecure: bool,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Reconciliation interval in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub poll_interval_ms: u64,

    /// Timeout in seconds for an explicit source refresh
    #[arg(long, default_value_t = 8)]
    pub refresh_timeout_secs: u64,

    /// Initial PTZ speed factor (0.1 - 1.0)
    #[arg(long, default_value_t = 0.5)]
    pub speed: f32,

    /// Default log directive, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
