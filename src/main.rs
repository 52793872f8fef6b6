//! Heimdall - Certificate Transparency log monitor
//!
//! Watches every public CT log for newly issued certificates and reports
//! the domain names they assert.

use anyhow::Result;
use heimdall::{app, config::Config};
use tokio::sync::watch;

const BANNER: &str = r#"
  _  _      _           _       _ _
 | || |___ (_)_ __  __| | __ _| | |
 | __ / -_)| | '  \/ _  |/ _  | | |
 |_||_\___||_|_|_|_\__,_|\__,_|_|_|

        CT Log Monitor - v3.0
        github.com/Imsol0/heimdall
"#;

#[tokio::main]
async fn main() -> Result<()> {
    print!("{}", BANNER);

    let config = Config::load()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if config.verbose { "debug" } else { "info" },
    ))
    .init();

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(());
    });

    app::run(config, shutdown_rx, None, None).await
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
