use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "keyserver-server", about = "Federation puller and export-file mirror server")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/keyserver.toml")]
    pub config: String,
}
