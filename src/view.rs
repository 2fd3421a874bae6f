use crate::boundaries::StateBoundaries;
use crate::coverage::CoverageTable;
use crate::filter::{count_by_state, Facets};
use crate::kpi::{kpis, ranking, Kpis, RankingEntry};
use crate::style::{choropleth_color, style_for, tooltip_for, ColorTable, RegionStyle};
use crate::types::{Customer, Uf};
use serde::{Deserialize, Serialize};

const HEATMAP_RADIUS: u32 = 25;
const HEATMAP_MAX_INTENSITY: f64 = 20.0;
const HEATMAP_GRADIENT: [(f64, &str); 4] = [
    (0.0, "#eaff00ff"),
    (0.3, "#ff1500ff"),
    (0.6, "#ff9900"),
    (1.0, "#ff0000"),
];

/// Layer toggles and coverage selections for one render request. Clustered
/// and unclustered markers are mutually exclusive, hence a single flag.
#[derive(Debug, Clone, Deserialize)]
pub struct MapOptions {
    #[serde(default = "default_clusters")]
    pub clusters: bool,
    #[serde(default)]
    pub heat: bool,
    #[serde(default)]
    pub choropleth: bool,
    #[serde(default)]
    pub cobertura_regional: Vec<String>,
    #[serde(default)]
    pub cobertura_representante: Vec<String>,
}

fn default_clusters() -> bool {
    true
}

impl Default for MapOptions {
    fn default() -> Self {
        MapOptions {
            clusters: true,
            heat: false,
            choropleth: false,
            cobertura_regional: Vec::new(),
            cobertura_representante: Vec::new(),
        }
    }
}

/// Everything the mapping layer needs for one point marker.
#[derive(Debug, Clone, Serialize)]
pub struct Marker {
    pub latitude: f64,
    pub longitude: f64,
    pub titulo: Option<String>,
    pub cidade: Option<String>,
    pub uf: Option<Uf>,
    pub rede: Option<String>,
    pub representante: Option<String>,
    pub valor_venda: Option<f64>,
    pub valor_display: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradientStop {
    pub stop: f64,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeatLayer {
    pub pontos: Vec<[f64; 3]>,
    pub radius: u32,
    pub max: f64,
    pub gradient: Vec<GradientStop>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChoroplethFeature {
    pub sigla: Uf,
    pub nome: String,
    pub total: u64,
    pub style: RegionStyle,
    pub tooltip: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverageFeature {
    pub sigla: Uf,
    pub nome: String,
    pub cobertura: Vec<String>,
    pub style: RegionStyle,
    pub tooltip: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverageLayer {
    pub titulo: String,
    pub features: Vec<CoverageFeature>,
}

/// One full render of the dashboard: every layer rebuilt from the filtered
/// records, no incremental updates.
#[derive(Debug, Clone, Serialize)]
pub struct MapSnapshot {
    pub seq: u64,
    pub clusters_ativos: bool,
    pub markers: Vec<Marker>,
    pub heat: Option<HeatLayer>,
    pub choropleth: Option<Vec<ChoroplethFeature>>,
    pub cobertura: Option<CoverageLayer>,
    pub kpis: Kpis,
    pub ranking_regiao: Vec<RankingEntry>,
    pub ranking_rede: Vec<RankingEntry>,
    pub filtros: Facets,
}

impl Default for MapSnapshot {
    fn default() -> Self {
        MapSnapshot {
            seq: 0,
            clusters_ativos: true,
            markers: Vec::new(),
            heat: None,
            choropleth: None,
            cobertura: None,
            kpis: Kpis::default(),
            ranking_regiao: Vec::new(),
            ranking_rede: Vec::new(),
            filtros: Facets::default(),
        }
    }
}

/// Static references the view renders against.
pub struct ViewContext<'a> {
    pub boundaries: &'a StateBoundaries,
    pub regional: &'a CoverageTable,
    pub regional_colors: &'a ColorTable,
    pub representatives: &'a CoverageTable,
    pub representative_colors: &'a ColorTable,
}

/// Hands out monotonically increasing render tokens and rejects commits
/// that arrive after a newer render already landed, so an out-of-order
/// response can never overwrite fresher state.
#[derive(Debug, Default)]
pub struct SequenceGuard {
    next: u64,
    committed: u64,
}

impl SequenceGuard {
    pub fn begin(&mut self) -> u64 {
        self.next += 1;
        self.next
    }

    pub fn commit(&mut self, token: u64) -> bool {
        if token > self.committed {
            self.committed = token;
            true
        } else {
            false
        }
    }
}

/// Owner of the current render. Layer state lives here, not in globals; a
/// commit either replaces the snapshot or, when stale, leaves the newer one
/// in place.
#[derive(Debug, Default)]
pub struct MapView {
    guard: SequenceGuard,
    current: Option<MapSnapshot>,
}

impl MapView {
    pub fn begin(&mut self) -> u64 {
        self.guard.begin()
    }

    pub fn commit(&mut self, snapshot: MapSnapshot) -> &MapSnapshot {
        if self.guard.commit(snapshot.seq) {
            self.current = Some(snapshot);
        }
        // Tokens come from begin(), so the very first commit always lands.
        self.current.as_ref().expect("commit before first render")
    }

    pub fn current(&self) -> Option<&MapSnapshot> {
        self.current.as_ref()
    }
}

/// Builds the full snapshot for one render token.
pub fn build_snapshot(
    seq: u64,
    ctx: &ViewContext<'_>,
    records: &[&Customer],
    facets: Facets,
    options: &MapOptions,
) -> MapSnapshot {
    MapSnapshot {
        seq,
        clusters_ativos: options.clusters,
        markers: markers(records),
        heat: options.heat.then(|| heat_layer(records)),
        choropleth: options
            .choropleth
            .then(|| choropleth_layer(ctx.boundaries, records)),
        cobertura: coverage_layer(ctx, options),
        kpis: kpis(records),
        ranking_regiao: ranking(records, |c| c.regiao.as_deref()),
        ranking_rede: ranking(records, |c| c.rede.as_deref()),
        filtros: facets,
    }
}

fn markers(records: &[&Customer]) -> Vec<Marker> {
    records
        .iter()
        .filter_map(|c| {
            let (latitude, longitude) = c.position()?;
            Some(Marker {
                latitude,
                longitude,
                titulo: c.titulo.clone(),
                cidade: c.cidade.clone(),
                uf: c.uf,
                rede: c.rede.clone(),
                representante: c.representante.clone(),
                valor_venda: c.valor_venda,
                valor_display: c
                    .valor_venda
                    .map(format_brl)
                    .unwrap_or_else(|| "Valor indisponível".to_string()),
            })
        })
        .collect()
}

fn heat_layer(records: &[&Customer]) -> HeatLayer {
    let pontos = records
        .iter()
        .filter_map(|c| c.position())
        .map(|(lat, lon)| [lat, lon, 1.0])
        .collect();
    HeatLayer {
        pontos,
        radius: HEATMAP_RADIUS,
        max: HEATMAP_MAX_INTENSITY,
        gradient: HEATMAP_GRADIENT
            .iter()
            .map(|(stop, color)| GradientStop {
                stop: *stop,
                color: color.to_string(),
            })
            .collect(),
    }
}

fn choropleth_layer(boundaries: &StateBoundaries, records: &[&Customer]) -> Vec<ChoroplethFeature> {
    let counts = count_by_state(records);
    let max = counts.values().copied().max().unwrap_or(0);
    boundaries
        .shapes()
        .iter()
        .map(|shape| {
            let total = counts.get(&shape.code).copied().unwrap_or(0);
            ChoroplethFeature {
                sigla: shape.code,
                nome: shape.name.clone(),
                total,
                style: RegionStyle {
                    fill_color: choropleth_color(total, max),
                    fill_opacity: 0.55,
                    weight: 1.0,
                    color: "#444".to_string(),
                },
                tooltip: format!("{}: {} clientes", shape.name, total),
            }
        })
        .collect()
}

/// Coverage overlay for the active selection. The regional group takes
/// priority when both groups have selections; no selection, no layer.
fn coverage_layer(ctx: &ViewContext<'_>, options: &MapOptions) -> Option<CoverageLayer> {
    let (table, colors, selection) = if !options.cobertura_regional.is_empty() {
        (ctx.regional, ctx.regional_colors, &options.cobertura_regional)
    } else if !options.cobertura_representante.is_empty() {
        (
            ctx.representatives,
            ctx.representative_colors,
            &options.cobertura_representante,
        )
    } else {
        return None;
    };

    let universe = ctx.boundaries.codes();
    let assignment = table.resolve(selection, &universe);
    let features = ctx
        .boundaries
        .shapes()
        .iter()
        .map(|shape| {
            let covering = assignment.get(&shape.code).cloned().unwrap_or_default();
            let style = style_for(&covering, selection, colors);
            let tooltip = tooltip_for(&covering, table.sentinel(), table.label(), &shape.name);
            CoverageFeature {
                sigla: shape.code,
                nome: shape.name.clone(),
                cobertura: covering,
                style,
                tooltip,
            }
        })
        .collect();

    Some(CoverageLayer {
        titulo: table.label().to_string(),
        features,
    })
}

/// "R$ 1.234,56" without pulling in a locale stack.
pub fn format_brl(value: f64) -> String {
    let cents = (value * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    let whole = (cents / 100).to_string();
    let frac = cents % 100;
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("{}R$ {},{:02}", sign, grouped, frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundaries::tests::sample_boundaries;
    use crate::coverage::Territory;
    use crate::style::{FALLBACK_COLOR, OVERLAP_COLOR};

    fn test_tables() -> (CoverageTable, ColorTable) {
        let table = CoverageTable::new(
            "Regional",
            vec![
                ("A".to_string(), Territory::Explicit(vec![Uf::Sp])),
                ("B".to_string(), Territory::Explicit(vec![Uf::Sp, Uf::Rj])),
            ],
        );
        let colors = ColorTable::new(vec![("A", "rgba(1, 1, 1, 0.5)")]);
        (table, colors)
    }

    fn located(lat: f64, lon: f64, valor: Option<f64>) -> Customer {
        Customer {
            latitude: Some(lat),
            longitude: Some(lon),
            titulo: Some("Cliente".to_string()),
            uf: Some(Uf::Sp),
            regiao: Some("Sudeste".to_string()),
            rede: Some("Rede".to_string()),
            valor_venda: valor,
            ..Customer::default()
        }
    }

    #[test]
    fn stale_commits_never_overwrite_newer_renders() {
        let mut view = MapView::default();
        let older = view.begin();
        let newer = view.begin();

        let newer_snap = MapSnapshot {
            seq: newer,
            ..MapSnapshot::default()
        };
        assert_eq!(view.commit(newer_snap).seq, newer);

        // The slower, older render finishes afterwards and is discarded.
        let older_snap = MapSnapshot {
            seq: older,
            ..MapSnapshot::default()
        };
        assert_eq!(view.commit(older_snap).seq, newer);
        assert_eq!(view.current().unwrap().seq, newer);
    }

    #[test]
    fn markers_skip_records_without_coordinates() {
        let on_map = located(0.5, 0.5, Some(1234.56));
        let off_map = Customer {
            titulo: Some("Sem coordenada".to_string()),
            ..Customer::default()
        };
        let records: Vec<&Customer> = vec![&on_map, &off_map];
        let markers = markers(&records);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].valor_display, "R$ 1.234,56");
    }

    #[test]
    fn missing_sale_values_get_the_placeholder() {
        let c = located(0.5, 0.5, None);
        let records: Vec<&Customer> = vec![&c];
        assert_eq!(markers(&records)[0].valor_display, "Valor indisponível");
    }

    #[test]
    fn heat_and_choropleth_follow_their_toggles() {
        let boundaries = sample_boundaries();
        let (table, colors) = test_tables();
        let ctx = ViewContext {
            boundaries: &boundaries,
            regional: &table,
            regional_colors: &colors,
            representatives: &table,
            representative_colors: &colors,
        };
        let c = located(0.5, 0.5, None);
        let records: Vec<&Customer> = vec![&c];

        let plain = build_snapshot(1, &ctx, &records, Facets::default(), &MapOptions::default());
        assert!(plain.heat.is_none());
        assert!(plain.choropleth.is_none());
        assert!(plain.cobertura.is_none());

        let options = MapOptions {
            heat: true,
            choropleth: true,
            ..MapOptions::default()
        };
        let full = build_snapshot(2, &ctx, &records, Facets::default(), &options);
        let heat = full.heat.unwrap();
        assert_eq!(heat.pontos, vec![[0.5, 0.5, 1.0]]);
        assert_eq!(heat.radius, HEATMAP_RADIUS);
        let choropleth = full.choropleth.unwrap();
        assert_eq!(choropleth.len(), 2);
        let sp = choropleth.iter().find(|f| f.sigla == Uf::Sp).unwrap();
        assert_eq!(sp.total, 1);
        assert_eq!(sp.tooltip, "São Paulo: 1 clientes");
    }

    #[test]
    fn empty_records_scale_the_choropleth_against_one() {
        let boundaries = sample_boundaries();
        let features = choropleth_layer(&boundaries, &[]);
        for feature in features {
            assert_eq!(feature.total, 0);
            assert_eq!(feature.style.fill_color, "rgb(55, 120, 255)");
        }
    }

    #[test]
    fn regional_selection_takes_priority_over_representatives() {
        let boundaries = sample_boundaries();
        let (table, colors) = test_tables();
        let rep_table = CoverageTable::new(
            "Representantes",
            vec![("R".to_string(), Territory::Explicit(vec![Uf::Rj]))],
        );
        let ctx = ViewContext {
            boundaries: &boundaries,
            regional: &table,
            regional_colors: &colors,
            representatives: &rep_table,
            representative_colors: &colors,
        };
        let options = MapOptions {
            cobertura_regional: vec!["A".to_string()],
            cobertura_representante: vec!["R".to_string()],
            ..MapOptions::default()
        };
        let layer = coverage_layer(&ctx, &options).unwrap();
        assert_eq!(layer.titulo, "Regional");
    }

    #[test]
    fn coverage_features_style_overlap_and_uncovered_states() {
        let boundaries = sample_boundaries();
        let (table, colors) = test_tables();
        let ctx = ViewContext {
            boundaries: &boundaries,
            regional: &table,
            regional_colors: &colors,
            representatives: &table,
            representative_colors: &colors,
        };
        let options = MapOptions {
            cobertura_regional: vec!["A".to_string(), "B".to_string()],
            ..MapOptions::default()
        };
        let layer = coverage_layer(&ctx, &options).unwrap();
        let sp = layer.features.iter().find(|f| f.sigla == Uf::Sp).unwrap();
        assert_eq!(sp.style.fill_color, OVERLAP_COLOR);
        assert_eq!(
            sp.tooltip.as_deref(),
            Some("Regional: A, B | Estado: São Paulo")
        );

        // RJ is covered by B alone; B has no configured color.
        let rj = layer.features.iter().find(|f| f.sigla == Uf::Rj).unwrap();
        assert_eq!(rj.style.fill_color, FALLBACK_COLOR);
    }

    #[test]
    fn formats_brazilian_currency() {
        assert_eq!(format_brl(1234.56), "R$ 1.234,56");
        assert_eq!(format_brl(99.0), "R$ 99,00");
        assert_eq!(format_brl(1_000_000.0), "R$ 1.000.000,00");
        assert_eq!(format_brl(0.5), "R$ 0,50");
    }
}
