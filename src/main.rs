use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use campaign_link_sync::{
    config::{self, link_sync_capsule, notifier_capsule},
    link_sync::{self, LinkSync},
    notifier::Notifier,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let container = config::init_container()?;
    let (sync, notifier): (Arc<LinkSync>, Arc<dyn Notifier>) =
        container.read((link_sync_capsule, notifier_capsule));

    let run_id = Uuid::new_v4();
    info!(%run_id, "Starting short link sync");
    let report = link_sync::execute(&sync, notifier.as_ref(), run_id).await?;

    info!(%run_id, outcome = ?report.outcome, "Short link sync finished");
    Ok(())
}
