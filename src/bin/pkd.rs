// ABOUTME: pK router daemon entry point — binds, installs a pidfile, runs until Shutdown

use argh::FromArgs;
use pk_ipc::config::RouterConfig;
use pk_ipc::router::Router;
use pk_ipc::service::{logging, PidFile};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(FromArgs)]
/// pK router daemon: accepts client connections and routes messages between ports
struct Args {
    /// address to listen on
    #[argh(option, default = "default_bind_addr()")]
    bind: SocketAddr,

    /// write the daemon's pid to this path and remove it on clean shutdown
    #[argh(option)]
    pidfile: Option<PathBuf>,
}

fn default_bind_addr() -> SocketAddr {
    RouterConfig::default().bind_addr
}

fn main() -> ExitCode {
    logging::init();
    let args: Args = argh::from_env();

    let _pidfile = match args.pidfile.as_deref().map(PidFile::create) {
        Some(Ok(pidfile)) => Some(pidfile),
        Some(Err(e)) => {
            tracing::error!(error = %e, "failed to write pidfile");
            return ExitCode::FAILURE;
        }
        None => None,
    };

    let config = RouterConfig {
        bind_addr: args.bind,
        ..RouterConfig::default()
    };

    let mut router = match Router::bind(config) {
        Ok(router) => router,
        Err(e) => {
            tracing::error!(error = %e, bind = %args.bind, "failed to bind router");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(platform = router.platform_banner(), "pK router ready");

    if let Err(e) = router.run() {
        tracing::error!(error = %e, "router loop exited with an error");
        return ExitCode::FAILURE;
    }

    tracing::info!("pK router stopped");
    ExitCode::SUCCESS
}
