use std::{sync::Arc, time::Duration};

use {
    anyhow::Context,
    prayerwall_config::PrayerwallConfig,
    prayerwall_store::PrayerStore,
    prayerwall_web::AppState,
    prayerwall_whatsapp::{
        LifecycleCoordinator, NativeConfig, NativeTransport, ServiceRegistry, ShutdownOutcome,
        WhatsAppClient, WhatsAppOutbound, client::ClientOptions,
    },
    tracing::{error, info, warn},
};

/// Extra time the coordinator allows on top of the client's own disconnect timeout.
const TEARDOWN_SLACK: Duration = Duration::from_secs(2);

pub async fn run(
    config: PrayerwallConfig,
    bind: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let port = port.unwrap_or(config.server.port);

    let store = PrayerStore::connect(&config.database.url).await?;
    info!(
        requests = store.count().await.unwrap_or(0),
        "database ready"
    );

    let grace = config.whatsapp.shutdown_timeout() + TEARDOWN_SLACK;
    let (state, coordinator) = if config.whatsapp.enabled {
        let client = acquire_client(&config)?;
        client.initialize();
        let target = config.whatsapp.target().map(str::to_string);
        if target.is_none() {
            warn!("WHATSAPP_GROUP_ID not set, submissions will not be relayed");
        }
        let state = AppState::new(
            store,
            Arc::new(WhatsAppOutbound::new(Arc::clone(&client))),
            target,
        );
        (state, LifecycleCoordinator::new(client, grace))
    } else {
        info!("whatsapp relay disabled");
        (
            AppState::without_channel(store),
            LifecycleCoordinator::without_client(grace),
        )
    };

    let _signals = coordinator.listen_for_signals();
    let token = coordinator.token();
    let mut server = tokio::spawn(async move {
        prayerwall_web::start_server(&bind, port, state, token.cancelled_owned()).await
    });

    tokio::select! {
        outcome = coordinator.wait_and_teardown() => {
            report(outcome);
            std::process::exit(0)
        },
        res = &mut server => {
            // Server stopped on its own, e.g. the port was taken. Release the session first.
            coordinator.request_shutdown();
            report(coordinator.wait_and_teardown().await);
            res.context("http server task panicked")?
        },
    }
}

fn acquire_client(config: &PrayerwallConfig) -> anyhow::Result<Arc<WhatsAppClient>> {
    let client = ServiceRegistry::global().whatsapp_client(|| {
        let transport = NativeTransport::new(NativeConfig::from_config(&config.whatsapp));
        WhatsAppClient::new(
            Arc::new(transport),
            ClientOptions::from_config(&config.whatsapp, config.mode),
        )
    })?;
    Ok(client)
}

fn report(outcome: ShutdownOutcome) {
    match outcome {
        ShutdownOutcome::Completed | ShutdownOutcome::AlreadyShuttingDown => {
            info!(?outcome, "shutdown complete");
        },
        ShutdownOutcome::Failed | ShutdownOutcome::TimedOut => {
            error!(?outcome, "whatsapp session did not close cleanly");
        },
    }
}
