use crate::boundaries::StateBoundaries;
use crate::config::AppConfig;
use crate::coverage::{regional_table, representative_table, CoverageTable};
use crate::filter::{apply_filters, Facets, FilterSelection};
use crate::style::{regional_colors, representative_colors, ColorTable};
use crate::types::{Customer, Uf};
use crate::view::{build_snapshot, MapOptions, MapSnapshot, MapView, ViewContext};
use anyhow::Result;
use axum::{extract::State, response::Json, routing::get, Router};
use axum_extra::extract::Query;
use serde::Serialize;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::debug;

pub struct AppState {
    pub customers: Vec<Customer>,
    pub boundaries: StateBoundaries,
    pub universe: BTreeSet<Uf>,
    pub view: Mutex<MapView>,
}

impl AppState {
    fn view_context(&self) -> ViewContext<'_> {
        ViewContext {
            boundaries: &self.boundaries,
            regional: regional_table(),
            regional_colors: regional_colors(),
            representatives: representative_table(),
            representative_colors: representative_colors(),
        }
    }
}

pub async fn start_server(
    config: AppConfig,
    customers: Vec<Customer>,
    boundaries: StateBoundaries,
) -> Result<()> {
    let universe = boundaries.codes();
    let state = Arc::new(AppState {
        customers,
        boundaries,
        universe,
        view: Mutex::new(MapView::default()),
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    println!("Starting server on http://{}", addr);

    let static_service = ServeDir::new(&config.server.static_dir);
    let app = Router::new()
        .route("/clientes", get(clientes))
        .route("/clientes/filtrar", get(clientes_filtrar))
        .route("/filtros", get(filtros))
        .route("/cobertura/opcoes", get(cobertura_opcoes))
        .route("/mapa", get(mapa))
        .nest_service("/static", static_service.clone())
        .fallback_service(static_service)
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn clientes(State(state): State<Arc<AppState>>) -> Json<Vec<Customer>> {
    Json(state.customers.clone())
}

async fn clientes_filtrar(
    State(state): State<Arc<AppState>>,
    Query(selection): Query<FilterSelection>,
) -> Json<Vec<Customer>> {
    let outcome = apply_filters(&state.customers, &selection, regional_table(), &state.universe);
    Json(outcome.records.into_iter().cloned().collect())
}

/// Facet lists for the current constraints; the cascade comes from reusing
/// the exact same query the record request carried.
async fn filtros(
    State(state): State<Arc<AppState>>,
    Query(selection): Query<FilterSelection>,
) -> Json<Facets> {
    let outcome = apply_filters(&state.customers, &selection, regional_table(), &state.universe);
    Json(outcome.facets)
}

#[derive(Serialize)]
struct CoverageOption {
    nome: String,
    cor: String,
}

#[derive(Serialize)]
struct CoverageOptions {
    regional: Vec<CoverageOption>,
    representante: Vec<CoverageOption>,
}

/// Entry names and legend colors for the two coverage selection groups.
async fn cobertura_opcoes() -> Json<CoverageOptions> {
    fn options(table: &CoverageTable, colors: &ColorTable) -> Vec<CoverageOption> {
        table
            .names()
            .into_iter()
            .map(|name| CoverageOption {
                nome: name.to_string(),
                cor: colors.color_of(name).to_string(),
            })
            .collect()
    }
    Json(CoverageOptions {
        regional: options(regional_table(), regional_colors()),
        representante: options(representative_table(), representative_colors()),
    })
}

/// Composed dashboard render: one request, every layer rebuilt. The view's
/// sequence guard tags the snapshot so clients can discard stale responses.
async fn mapa(
    State(state): State<Arc<AppState>>,
    Query(selection): Query<FilterSelection>,
    Query(options): Query<MapOptions>,
) -> Json<MapSnapshot> {
    let outcome = apply_filters(&state.customers, &selection, regional_table(), &state.universe);
    let ctx = state.view_context();

    let snapshot = {
        let mut view = state.view.lock().await;
        let token = view.begin();
        let snapshot = build_snapshot(token, &ctx, &outcome.records, outcome.facets, &options);
        view.commit(snapshot).clone()
    };
    debug!(
        seq = snapshot.seq,
        markers = snapshot.markers.len(),
        "map snapshot rebuilt"
    );
    Json(snapshot)
}
