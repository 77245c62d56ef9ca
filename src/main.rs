// This file is part of Moonfire NVR, a security camera network video recorder.
// Copyright (C) 2021 The Moonfire NVR Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later WITH GPL-3.0-linking-exception.

//! Entry point: loads configuration, opens the database, and runs the job
//! loop until asked to shut down (SPEC_FULL.md §4.6, §6).

mod audio;
mod config;
mod context;
mod events;
mod risk;
mod runner;
mod video;

use config::Config;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    base::tracing_setup::install();
    dotenvy::dotenv().ok();
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(err = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let pool = match db::create_pool(&config.database_url, config.database_max_connections).await {
        Ok(pool) => pool,
        Err(err) => {
            tracing::error!(err = %err, "failed to connect to database");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = db::run_migrations(&pool).await {
        tracing::error!(err = %err, "failed to run migrations");
        return ExitCode::FAILURE;
    }

    let (shutdown_tx, shutdown_rx) = base::shutdown::channel();
    tokio::spawn(wait_for_signal(shutdown_tx));

    let gateway = db::Gateway::new(pool);
    let runner = runner::Runner::new(
        gateway,
        Arc::new(video::NullImageAnalyzer),
        Arc::new(video::NullImageAnalyzer),
        Arc::new(audio::NullAudioAnalyzer),
        &config,
    );
    runner.run(shutdown_rx).await;
    ExitCode::SUCCESS
}

/// Resolves once SIGINT or (on unix) SIGTERM arrives, dropping `tx` to wake
/// every outstanding `shutdown::Receiver` (SPEC_FULL.md §4.6 step 11,
/// "graceful shutdown").
async fn wait_for_signal(tx: base::shutdown::Sender) {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!(err = %err, "failed to install SIGTERM handler");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("shutdown signal received");
    drop(tx);
}
