use crate::types::Uf::{self, *};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Territory served by one organizational entry. The remainder variant means
/// "every state not explicitly claimed elsewhere in this table".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Territory {
    Explicit(Vec<Uf>),
    Remainder,
}

/// Static mapping from entry name (regional office or sales representative)
/// to the territory it serves. Entry order is the display order; at most one
/// entry should carry `Territory::Remainder` (if the table is misconfigured
/// with two, the remainder set still excludes only explicit claims, so the
/// first lookup wins and both resolve to the same set).
#[derive(Debug, Clone)]
pub struct CoverageTable {
    label: &'static str,
    entries: Vec<(String, Territory)>,
    /// Union of all explicit territories, cached at construction. The
    /// remainder of any universe is `universe - claimed`, independent of the
    /// current selection.
    claimed: BTreeSet<Uf>,
}

impl CoverageTable {
    pub fn new(label: &'static str, entries: Vec<(String, Territory)>) -> Self {
        let claimed = entries
            .iter()
            .filter_map(|(_, territory)| match territory {
                Territory::Explicit(ufs) => Some(ufs.iter().copied()),
                Territory::Remainder => None,
            })
            .flatten()
            .collect();
        CoverageTable {
            label,
            entries,
            claimed,
        }
    }

    /// Display label for the table ("Regional" / "Representantes").
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Entry names in table order, for populating selection widgets.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn territory_of(&self, name: &str) -> Option<&Territory> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, territory)| territory)
    }

    /// Name of the sentinel entry, if the table has one.
    pub fn sentinel(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, territory)| *territory == Territory::Remainder)
            .map(|(name, _)| name.as_str())
    }

    /// States left to the sentinel entry for the given universe.
    pub fn remainder(&self, universe: &BTreeSet<Uf>) -> BTreeSet<Uf> {
        universe.difference(&self.claimed).copied().collect()
    }

    /// Resolves the selected entries to a per-state list of covering entry
    /// names. Iteration follows selection order, so the first selected entry
    /// covering a state heads that state's list. States claimed by nobody
    /// stay absent; codes outside the universe are silently unmapped.
    pub fn resolve(&self, selected: &[String], universe: &BTreeSet<Uf>) -> CoverageAssignment {
        let mut covered: BTreeMap<Uf, Vec<String>> = BTreeMap::new();
        if selected.is_empty() {
            return covered;
        }
        for name in selected {
            let Some(territory) = self.territory_of(name) else {
                continue;
            };
            let states: Vec<Uf> = match territory {
                Territory::Explicit(ufs) => ufs
                    .iter()
                    .filter(|uf| universe.contains(uf))
                    .copied()
                    .collect(),
                Territory::Remainder => self.remainder(universe).into_iter().collect(),
            };
            for uf in states {
                let names = covered.entry(uf).or_default();
                if !names.iter().any(|existing| existing == name) {
                    names.push(name.clone());
                }
            }
        }
        covered
    }
}

/// Per-state covering entries, rebuilt from scratch on every draw.
pub type CoverageAssignment = BTreeMap<Uf, Vec<String>>;

pub const REGIONAL_SENTINEL: &str = "Regional sem GR";
pub const REPRESENTATIVE_SENTINEL: &str = "SEM COBERTURA";

/// Regional office coverage, fixed for the process lifetime.
pub fn regional_table() -> &'static CoverageTable {
    static TABLE: OnceLock<CoverageTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        CoverageTable::new(
            "Regional",
            vec![
                entry("Escritório Ceará", vec![Pa, Pi, Ma, Ce, Rn]),
                entry("Regional Allexandre Lago", vec![Al, Go, Ba, Se, Pe, Pb, Rn]),
                entry("Regional Evelyn Castor", vec![Es, Mt, Ms, Rj]),
                entry("Regional Sérgio Saez", vec![Sp, Pr, Sc, Rs]),
                (REGIONAL_SENTINEL.to_string(), Territory::Remainder),
            ],
        )
    })
}

/// Sales representative coverage, fixed for the process lifetime.
pub fn representative_table() -> &'static CoverageTable {
    static TABLE: OnceLock<CoverageTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        CoverageTable::new(
            "Representantes",
            vec![
                entry("RENATO PEREIRA", vec![Mt]),
                entry("RODRIGO LISBOA", vec![Mg]),
                entry("DANIEL DE EQUIP.", vec![Pe, Rn]),
                entry("VICTOR MOURA", vec![Ma, Ce, Pi, Rn]),
                entry("CLECIO SALVIANO", vec![Sp]),
                entry("HAMILTON MORAES", vec![Go, Ms]),
                entry("MARCOS BARIANI", vec![Sp, Al]),
                entry("ALEXANDRE CÂND.", vec![Al, Df]),
                entry("EDSEU MARQUES", vec![To, Pa]),
                entry("MAURO FOLLMANN", vec![Pa]),
                entry("MANOEL AFONSO", vec![Ac, Ro]),
                entry("JOSÉ LOBO", vec![Ba]),
                entry("PEDRO AMORIM", vec![Rj]),
                entry("CRYSTIANO SILVA", vec![Am]),
                entry("ROGÉRIO CASAGRANDE", vec![Mg, Sp]),
                entry("ERNESTO (LLAMPE)", vec![Sc, Pr]),
                (REPRESENTATIVE_SENTINEL.to_string(), Territory::Remainder),
            ],
        )
    })
}

fn entry(name: &str, ufs: Vec<Uf>) -> (String, Territory) {
    (name.to_string(), Territory::Explicit(ufs))
}
