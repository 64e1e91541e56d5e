use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_rest::ApiDoc;
use triage_core::{
    Bed, BedNumber, BedObserver, BedType, CoreConfig, JsonFileRepository, QueueEntry,
    QueueObserver, StaffRolePolicy, TriageService,
};

/// Observer that mirrors queue and bed changes into the log stream.
///
/// Display boards subscribe through the same traits; the server always
/// keeps this one registered so every mutation leaves a trace line.
struct LogObserver;

impl QueueObserver for LogObserver {
    fn queue_changed(&self, ordered: &[QueueEntry]) {
        tracing::info!(pending = ordered.len(), "queue changed");
    }
}

impl BedObserver for LogObserver {
    fn bed_changed(&self, bed: &Bed) {
        tracing::info!(bed = %bed.number, status = ?bed.status, "bed changed");
    }
}

/// The fleet provisioned on first boot when no beds have been stored yet.
fn default_fleet() -> anyhow::Result<Vec<Bed>> {
    let bed = |number: &str, bed_type, location: &str| -> anyhow::Result<Bed> {
        Ok(Bed::new(BedNumber::new(number)?, bed_type, location))
    };
    let mut fleet = vec![
        bed("ER-001", BedType::Emergency, "Emergency Ward - Room 1")?,
        bed("ER-002", BedType::Emergency, "Emergency Ward - Room 2")?,
        bed("ICU-001", BedType::Icu, "ICU - Room 1")?,
        bed("GEN-001", BedType::General, "General Ward - Room 1")?,
        bed("ISO-001", BedType::Isolation, "Isolation Ward - Room 1")?,
    ];
    // ICU-002 starts out of service until commissioning signs it off.
    fleet.push(Bed::out_of_service(
        BedNumber::new("ICU-002")?,
        BedType::Icu,
        "ICU - Room 2",
    ));
    Ok(fleet)
}

/// Main entry point for the triage server.
///
/// # Environment Variables
/// - `TRIAGE_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `TRIAGE_DATA_DIR`: Directory for engine state (default: "./triage_data")
/// - `TRIAGE_CATALOG`: Optional path to a YAML symptom catalogue override
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("triage_core=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("triage_run=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("TRIAGE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let data_dir = std::env::var("TRIAGE_DATA_DIR").unwrap_or_else(|_| "./triage_data".into());
    let catalog_path = std::env::var("TRIAGE_CATALOG").ok().map(PathBuf::from);

    let config = CoreConfig::new(PathBuf::from(data_dir), catalog_path)?;
    let catalog = config.load_catalog()?;
    tracing::info!(rules = catalog.len(), "symptom catalogue loaded");

    let repository = JsonFileRepository::new(config.data_dir())?;
    if !repository.has_beds() {
        let fleet = default_fleet()?;
        tracing::info!(beds = fleet.len(), "provisioning default bed fleet");
        repository.provision_beds(&fleet)?;
    }

    let observer = Arc::new(LogObserver);
    let service = TriageService::new(catalog, Arc::new(repository), Arc::new(StaffRolePolicy))?
        .with_queue_observer(observer.clone())
        .with_bed_observer(observer);

    let app = api_rest::router(Arc::new(service))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    tracing::info!("++ Starting triage REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
