use crate::types::Customer;
use serde::Serialize;
use std::collections::BTreeSet;

/// Headline indicators recomputed from the filtered records on every apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Kpis {
    pub total_clientes: usize,
    pub regioes_presenca: usize,
    pub redes_presenca: usize,
    pub representantes_ativos: usize,
}

pub fn kpis(records: &[&Customer]) -> Kpis {
    Kpis {
        total_clientes: records.len(),
        regioes_presenca: distinct_count(records, |c| c.regiao.as_deref()),
        redes_presenca: distinct_count(records, |c| c.rede.as_deref()),
        representantes_ativos: distinct_count(records, |c| c.representante.as_deref()),
    }
}

fn distinct_count<'a>(
    records: &[&'a Customer],
    field: impl Fn(&'a Customer) -> Option<&'a str>,
) -> usize {
    records
        .iter()
        .copied()
        .filter_map(|c| field(c))
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<&str>>()
        .len()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub nome: String,
    pub total: u64,
}

/// Value frequency table sorted descending by count. The sort is stable, so
/// values with equal counts keep their first-encountered order.
pub fn ranking<'a>(
    records: &[&'a Customer],
    field: impl Fn(&'a Customer) -> Option<&'a str>,
) -> Vec<RankingEntry> {
    let mut entries: Vec<RankingEntry> = Vec::new();
    for &c in records {
        let Some(value) = field(c).filter(|v| !v.is_empty()) else {
            continue;
        };
        match entries.iter_mut().find(|e| e.nome == value) {
            Some(entry) => entry.total += 1,
            None => entries.push(RankingEntry {
                nome: value.to_string(),
                total: 1,
            }),
        }
    }
    entries.sort_by(|a, b| b.total.cmp(&a.total));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Uf;

    fn customer(rede: &str, regiao: &str, representante: Option<&str>) -> Customer {
        Customer {
            rede: Some(rede.to_string()),
            regiao: Some(regiao.to_string()),
            representante: representante.map(str::to_string),
            uf: Some(Uf::Sp),
            ..Customer::default()
        }
    }

    #[test]
    fn empty_records_yield_zeroed_kpis_and_empty_rankings() {
        let records: Vec<&Customer> = Vec::new();
        assert_eq!(kpis(&records), Kpis::default());
        assert!(ranking(&records, |c| c.rede.as_deref()).is_empty());
    }

    #[test]
    fn counts_are_distinct_per_dimension() {
        let data = vec![
            customer("R1", "Sul", Some("A")),
            customer("R1", "Sul", Some("B")),
            customer("R2", "Norte", None),
        ];
        let records: Vec<&Customer> = data.iter().collect();
        let k = kpis(&records);
        assert_eq!(k.total_clientes, 3);
        assert_eq!(k.redes_presenca, 2);
        assert_eq!(k.regioes_presenca, 2);
        assert_eq!(k.representantes_ativos, 2);
    }

    #[test]
    fn ranking_sorts_descending_by_count() {
        let data = vec![
            customer("R1", "Sul", None),
            customer("R2", "Sul", None),
            customer("R2", "Norte", None),
            customer("R2", "Norte", None),
        ];
        let records: Vec<&Customer> = data.iter().collect();
        let ranked = ranking(&records, |c| c.rede.as_deref());
        assert_eq!(ranked[0].nome, "R2");
        assert_eq!(ranked[0].total, 3);
        assert_eq!(ranked[1].nome, "R1");
    }

    #[test]
    fn ties_keep_first_encountered_order() {
        let data = vec![
            customer("Zeta", "Sul", None),
            customer("Alfa", "Sul", None),
            customer("Zeta", "Sul", None),
            customer("Alfa", "Sul", None),
            customer("Beta", "Sul", None),
        ];
        let records: Vec<&Customer> = data.iter().collect();
        let ranked = ranking(&records, |c| c.rede.as_deref());
        let names: Vec<&str> = ranked.iter().map(|e| e.nome.as_str()).collect();
        // Zeta and Alfa tie at 2 and keep encounter order; Beta trails.
        assert_eq!(names, vec!["Zeta", "Alfa", "Beta"]);
    }
}
