//! Coordinator composition root.

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use revid_broker::Broker;
use revid_core::Settings;
use revid_db::{build_repos, setup_database};

use crate::routes::create_router;
use crate::state::AppContext;

/// Wire the record store and broker into an [`AppContext`].
///
/// Path validation (input != output, work directory disjoint) already ran
/// inside `Settings::load`; this only has to create the directories.
pub async fn build_context(settings: Settings) -> anyhow::Result<AppContext> {
    std::fs::create_dir_all(&settings.paths.input)
        .with_context(|| format!("creating input root [{}]", settings.paths.input.display()))?;
    std::fs::create_dir_all(&settings.paths.output)
        .with_context(|| format!("creating output root [{}]", settings.paths.output.display()))?;

    let pool = setup_database(&settings.paths.database)
        .await
        .with_context(|| {
            format!(
                "opening record store [{}]",
                settings.paths.database.display()
            )
        })?;
    let repos = build_repos(pool);

    let broker = Broker::connect(&settings.rabbitmq)
        .await
        .context("connecting to broker")?;

    Ok(AppContext {
        settings,
        repos,
        queue: Arc::new(broker),
    })
}

/// Serve the coordinator until the process is stopped.
pub async fn serve(context: AppContext) -> anyhow::Result<()> {
    let bind = context.settings.http.bind.clone();
    let router = create_router(Arc::new(context));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding [{bind}]"))?;
    info!(bind = %bind, "coordinator listening");

    axum::serve(listener, router).await?;
    Ok(())
}
