use clap::{Args, Subcommand};
use std::path::PathBuf;
use wisp_config::Mode;

/// Available wisp subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the project and write the output directory
    ///
    /// Exits with a non-zero status when the configuration is invalid or
    /// any entry point fails to build.
    Build(BuildArgs),

    /// Start the development server
    ///
    /// Serves the build from memory, rebuilds incrementally on file changes
    /// and pushes updates to connected browsers. Build errors are reported
    /// in the browser and the terminal, never fatal.
    Serve(ServeArgs),
}

/// Arguments for the build command
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Build mode: development or production
    ///
    /// Takes precedence over WISP_MODE, the config file and NODE_ENV.
    #[arg(long, value_name = "MODE")]
    pub mode: Option<Mode>,

    /// Output directory, relative to the project root
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Configuration file to use instead of discovering one
    ///
    /// Without this flag wisp.toml, wisp.json and the "wisp" key of
    /// package.json are tried in that order.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Project root (defaults to the current directory)
    #[arg(short = 'C', long = "cwd", value_name = "DIR")]
    pub cwd: Option<PathBuf>,
}

/// Arguments for the serve command
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Port to listen on
    ///
    /// When the port is busy the next ten ports are tried.
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Host address to bind
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Disable hot module replacement
    ///
    /// Rebuilds still happen on change; the page is not updated in place.
    #[arg(long)]
    pub no_hmr: bool,

    /// Build mode: development or production
    #[arg(long, value_name = "MODE")]
    pub mode: Option<Mode>,

    /// Configuration file to use instead of discovering one
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Project root (defaults to the current directory)
    #[arg(short = 'C', long = "cwd", value_name = "DIR")]
    pub cwd: Option<PathBuf>,
}
