//! `wisp serve`: the development server.
//!
//! Startup order:
//! 1. load configuration (invalid configuration exits before serving)
//! 2. initial build; failures are shown in the overlay, never fatal
//! 3. file watcher
//! 4. HTTP server with the HMR channel
//! 5. rebuild loop until Ctrl+C

use std::sync::Arc;

use tokio::signal;
use wisp_bundler::{Bundler, BundlerRuntime};
use wisp_config::ConfigOverrides;

use crate::cli::ServeArgs;
use crate::commands::{load_config, resolve_root};
use crate::dev::{DevBuilder, DevConfig, DevServer, DevServerState, FileWatcher, config::server_url};
use crate::error::{CliError, Result};
use crate::ui;

/// Execute the serve command.
///
/// # Errors
///
/// Configuration errors, a port range that is fully taken, or a watcher
/// that cannot start. Build errors are not returned.
pub async fn execute(args: ServeArgs) -> Result<()> {
    let root = resolve_root(args.cwd.as_deref())?;
    let overrides = ConfigOverrides::default()
        .with_mode(args.mode)
        .with_dev_server(args.host.clone(), args.port, args.no_hmr.then_some(false));
    let config = Arc::new(load_config(&root, args.config.clone(), &overrides)?);
    let dev = DevConfig::new(Arc::clone(&config));

    ui::info(&format!("Starting development server in {} mode", config.mode));

    let state = Arc::new(DevServerState::new());
    let server = DevServer::new(dev.clone(), Arc::clone(&state))?;
    let runtime = BundlerRuntime::new(&config.context);
    let bundler = Arc::new(Bundler::new(Arc::clone(&config), Arc::new(runtime))?);

    let mut builder = DevBuilder::new(bundler, Arc::clone(&state), dev.hot());
    builder.initial_build().await?;

    let (watcher, changes) =
        FileWatcher::new(dev.watch_root.clone(), dev.watch_ignore.clone(), dev.debounce)?;
    tracing::debug!(root = %watcher.root().display(), "watching");

    let listener = dev.bind()?;
    let addr = listener.local_addr()?;
    let mut server_task = tokio::spawn(server.serve(listener));
    let mut builder_task = tokio::spawn(builder.run(changes));

    ui::success(&format!("Development server running at {}", server_url(addr)));
    if !dev.hot() {
        ui::info("Hot module replacement is disabled");
    }
    ui::info("Press Ctrl+C to stop");

    let result = tokio::select! {
        _ = signal::ctrl_c() => {
            ui::info("Shutting down development server...");
            Ok(())
        }
        result = &mut server_task => match result {
            Ok(Ok(())) => Err(CliError::Server("server stopped unexpectedly".to_string())),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(CliError::Server(format!("server task failed: {e}"))),
        },
        _ = &mut builder_task => {
            Err(CliError::Server("file watcher stopped unexpectedly".to_string()))
        }
    };

    server_task.abort();
    builder_task.abort();
    drop(watcher);
    if result.is_ok() {
        ui::success("Development server stopped");
    }
    result
}
