use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "cadenza-server", about = "Cadenza group-call media queue controller")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/cadenza.toml")]
    pub config: String,
}
