use clap::Parser;
use std::net::IpAddr;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to bind to
    #[arg(long, default_value_t = 8001)]
    pub port: u16,

    /// Root directory for per-request workspaces (uploads and presentations)
    #[arg(long, env = "FRAME_DECK_WORK_ROOT", default_value = "./frame-deck-runs")]
    pub work_root: String,

    /// Largest accepted upload, in megabytes
    #[arg(long, env = "FRAME_DECK_MAX_UPLOAD_MB", default_value_t = 1024)]
    pub max_upload_mb: usize,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
