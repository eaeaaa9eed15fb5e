use anyhow::Result;
use axum::{Router, routing};
use certservice::core::{app_state::AppState, bootstrap, config, db};
use certservice::routes;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use utoipa_swagger_ui::SwaggerUi;

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let config = config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let port = config.server.port;
    let state = AppState::init(config).await?;

    let api_routes = routes::booking::routes_with_openapi()
        .merge(routes::admin::routes_with_openapi())
        .merge(routes::verify::routes_with_openapi());

    let (api_router, mut openapi) = api_routes.split_for_parts();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("CertService API")
        .version("1.0.0")
        .build();
    let swagger_ui = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi);

    let app: Router = Router::new()
        .merge(api_router)
        .route("/healthz", routing::get(|| async { "ok" }))
        .with_state(state)
        .merge(swagger_ui);

    bootstrap::serve("CertService", app, port).await?;
    Ok(())
}
