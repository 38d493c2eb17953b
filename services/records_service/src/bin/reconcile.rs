use records_service::operations::reconcile::reconcile;
use records_service::Context;
use service_core::telemetry::{init_subscriber, make_subscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_subscriber(make_subscriber("records-reconcile", "info"))?;

    let ctx = Context::from_env().await?;
    let report = reconcile(&ctx.entity_store()).await?;

    if report.is_clean() {
        tracing::info!("Records were already consistent.");
    } else {
        tracing::warn!(?report, "Repaired inconsistent records.");
    }
    Ok(())
}
