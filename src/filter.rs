use crate::coverage::CoverageTable;
use crate::types::{Customer, Uf};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Active filter selections, straight off the sidebar widgets. Multi-select
/// dimensions serialize as repeated `key=value` pairs; the singletons
/// (`busca_texto`, `data_inicio`, `data_fim`, `regional_cobertura`) as at
/// most one pair each. Absent dimensions mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSelection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rede: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tipo_cliente: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub funil: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub representante: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regiao: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responsavel: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub busca_texto: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_inicio: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_fim: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regional_cobertura: Option<String>,
}

impl FilterSelection {
    /// Flat query string, reused verbatim for both the record request and
    /// the facet refresh so the cascade sees the same constraints.
    pub fn to_query(&self) -> String {
        serde_html_form::to_string(self).unwrap_or_default()
    }

    /// Drops selected values no longer offered by the refreshed facets. A
    /// value that filtered itself out of reach is implicitly unchecked.
    pub fn prune(&mut self, facets: &Facets) {
        self.rede.retain(|v| facets.rede.contains(v));
        self.tipo_cliente.retain(|v| facets.tipo_cliente.contains(v));
        self.funil.retain(|v| facets.funil.contains(v));
        self.representante.retain(|v| facets.representante.contains(v));
        self.regiao.retain(|v| facets.regiao.contains(v));
        self.responsavel.retain(|v| facets.responsavel.contains(v));
    }

    pub fn clear(&mut self) {
        *self = FilterSelection::default();
    }
}

/// Candidate values per dimension, computed over the *filtered* record set
/// (cascading facets).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Facets {
    pub rede: Vec<String>,
    pub tipo_cliente: Vec<String>,
    pub funil: Vec<String>,
    pub representante: Vec<String>,
    pub regiao: Vec<String>,
    pub responsavel: Vec<String>,
}

/// Selection compiled against the coverage table: the text term is
/// uppercased once and the `regional_cobertura` name is resolved to its
/// state set up front.
pub struct CompiledFilter<'a> {
    selection: &'a FilterSelection,
    term: Option<String>,
    regional_scope: Option<BTreeSet<Uf>>,
}

pub fn compile<'a>(
    selection: &'a FilterSelection,
    regional: &CoverageTable,
    universe: &BTreeSet<Uf>,
) -> CompiledFilter<'a> {
    let term = selection
        .busca_texto
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_uppercase);
    let regional_scope = selection
        .regional_cobertura
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|name| {
            regional
                .resolve(&[name.to_string()], universe)
                .keys()
                .copied()
                .collect()
        });
    CompiledFilter {
        selection,
        term,
        regional_scope,
    }
}

impl CompiledFilter<'_> {
    pub fn matches(&self, c: &Customer) -> bool {
        let sel = self.selection;
        if !selected(&sel.rede, &c.rede)
            || !selected(&sel.tipo_cliente, &c.tipo_cliente)
            || !selected(&sel.funil, &c.funil)
            || !selected(&sel.representante, &c.representante)
            || !selected(&sel.regiao, &c.regiao)
            || !selected(&sel.responsavel, &c.responsavel)
        {
            return false;
        }
        if let Some(start) = sel.data_inicio {
            if !c.data.map_or(false, |d| d >= start) {
                return false;
            }
        }
        if let Some(end) = sel.data_fim {
            if !c.data.map_or(false, |d| d <= end) {
                return false;
            }
        }
        if let Some(term) = &self.term {
            if !text_matches(c, term) {
                return false;
            }
        }
        if let Some(scope) = &self.regional_scope {
            if !c.uf.map_or(false, |uf| scope.contains(&uf)) {
                return false;
            }
        }
        true
    }
}

fn selected(selection: &[String], value: &Option<String>) -> bool {
    if selection.is_empty() {
        return true;
    }
    value
        .as_deref()
        .map_or(false, |v| selection.iter().any(|s| s == v))
}

/// Case-insensitive substring search over the same fields the backend's
/// text filter covered.
fn text_matches(c: &Customer, upper_term: &str) -> bool {
    let fields = [
        c.titulo.as_deref(),
        c.endereco_cliente.as_deref(),
        c.local_de_entrega.as_deref(),
        c.endereco_usado_geocode.as_deref(),
        c.cidade.as_deref(),
        c.uf.map(|uf| uf.as_str()),
        c.rede.as_deref(),
    ];
    fields
        .into_iter()
        .flatten()
        .any(|field| field.to_uppercase().contains(upper_term))
}

/// Filtered records plus the facets recomputed from them.
pub struct FilterOutcome<'a> {
    pub records: Vec<&'a Customer>,
    pub facets: Facets,
}

/// The "apply" action: filter the records, then derive the cascading facet
/// lists from the filtered set.
pub fn apply_filters<'a>(
    all: &'a [Customer],
    selection: &FilterSelection,
    regional: &CoverageTable,
    universe: &BTreeSet<Uf>,
) -> FilterOutcome<'a> {
    let compiled = compile(selection, regional, universe);
    let records: Vec<&Customer> = all.iter().filter(|c| compiled.matches(c)).collect();
    let facets = facets(&records);
    FilterOutcome { records, facets }
}

/// Sorted distinct non-empty values per dimension.
pub fn facets(records: &[&Customer]) -> Facets {
    Facets {
        rede: distinct(records, |c| c.rede.as_deref()),
        tipo_cliente: distinct(records, |c| c.tipo_cliente.as_deref()),
        funil: distinct(records, |c| c.funil.as_deref()),
        representante: distinct(records, |c| c.representante.as_deref()),
        regiao: distinct(records, |c| c.regiao.as_deref()),
        responsavel: distinct(records, |c| c.responsavel.as_deref()),
    }
}

fn distinct<'a>(
    records: &[&'a Customer],
    field: impl Fn(&'a Customer) -> Option<&'a str>,
) -> Vec<String> {
    let values: BTreeSet<&str> = records
        .iter()
        .copied()
        .filter_map(|c| field(c))
        .filter(|v| !v.is_empty())
        .collect();
    values.into_iter().map(str::to_string).collect()
}

/// Count-per-state over the filtered records, for the choropleth layer.
pub fn count_by_state(records: &[&Customer]) -> BTreeMap<Uf, u64> {
    let mut counts = BTreeMap::new();
    for c in records {
        if let Some(uf) = c.uf {
            *counts.entry(uf).or_insert(0) += 1;
        }
    }
    counts
}
