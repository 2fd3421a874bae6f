use serde::Serialize;
use std::sync::OnceLock;

/// Fill used when two or more selected entries cover the same state.
pub const OVERLAP_COLOR: &str = "rgba(255, 102, 0, 0.8)";
/// Fill for entries missing from the color table.
pub const FALLBACK_COLOR: &str = "rgba(180, 180, 180, 0.55)";

pub const COVERED_OPACITY: f64 = 0.55;
pub const COVERED_WEIGHT: f64 = 2.0;
pub const UNCOVERED_WEIGHT: f64 = 0.5;
pub const COVERED_STROKE: &str = "#444";
pub const UNCOVERED_STROKE: &str = "#aaa";

/// Entry name to display color. Entries absent from the table render gray.
#[derive(Debug, Clone)]
pub struct ColorTable {
    colors: Vec<(String, String)>,
}

impl ColorTable {
    pub fn new(colors: Vec<(&str, &str)>) -> Self {
        ColorTable {
            colors: colors
                .into_iter()
                .map(|(name, color)| (name.to_string(), color.to_string()))
                .collect(),
        }
    }

    pub fn color_of(&self, name: &str) -> &str {
        self.colors
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, color)| color.as_str())
            .unwrap_or(FALLBACK_COLOR)
    }
}

/// Per-feature style handed to the mapping layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionStyle {
    pub fill_color: String,
    pub fill_opacity: f64,
    pub weight: f64,
    pub color: String,
}

impl RegionStyle {
    fn uncovered() -> Self {
        RegionStyle {
            fill_color: "transparent".to_string(),
            fill_opacity: 0.0,
            weight: UNCOVERED_WEIGHT,
            color: UNCOVERED_STROKE.to_string(),
        }
    }

    fn covered(fill_color: String) -> Self {
        RegionStyle {
            fill_color,
            fill_opacity: COVERED_OPACITY,
            weight: COVERED_WEIGHT,
            color: COVERED_STROKE.to_string(),
        }
    }
}

/// Style for one state given the entries covering it and the overall
/// selection. A single selection always paints with that entry's configured
/// color, never the overlap color, even when other table entries also claim
/// the state.
pub fn style_for(covering: &[String], selection: &[String], colors: &ColorTable) -> RegionStyle {
    if covering.is_empty() {
        return RegionStyle::uncovered();
    }
    let fill = if selection.len() == 1 {
        colors.color_of(&selection[0]).to_string()
    } else if covering.len() >= 2 {
        OVERLAP_COLOR.to_string()
    } else {
        colors.color_of(&covering[0]).to_string()
    };
    RegionStyle::covered(fill)
}

/// Tooltip for one state: the covering display names joined onto the state
/// name. A state covered solely by the sentinel entry gets the distinct
/// "Sem cobertura" label instead of a blank list.
pub fn tooltip_for(
    covering: &[String],
    sentinel: Option<&str>,
    role_label: &str,
    state_name: &str,
) -> Option<String> {
    if covering.is_empty() {
        return None;
    }
    let named: Vec<&str> = covering
        .iter()
        .map(String::as_str)
        .filter(|name| Some(*name) != sentinel)
        .collect();
    if named.is_empty() {
        Some(format!("Sem cobertura | Estado: {}", state_name))
    } else {
        Some(format!(
            "{}: {} | Estado: {}",
            role_label,
            named.join(", "),
            state_name
        ))
    }
}

/// Choropleth fill scaled by count against the current maximum. `max` is
/// clamped to at least 1 so an empty result set never divides by zero.
pub fn choropleth_color(count: u64, max: u64) -> String {
    let pct = count as f64 / max.max(1) as f64;
    let step = (200.0 * pct).floor() as i64;
    let r = (55 - step).clamp(0, 255);
    let g = (120 + step).clamp(0, 255);
    format!("rgb({}, {}, 255)", r, g)
}

pub fn regional_colors() -> &'static ColorTable {
    static COLORS: OnceLock<ColorTable> = OnceLock::new();
    COLORS.get_or_init(|| {
        ColorTable::new(vec![
            ("Escritório Ceará", "rgba(255, 166, 0, 0.77)"),
            ("Regional Allexandre Lago", "rgba(255, 215, 0, 0.85)"),
            ("Regional Evelyn Castor", "rgba(135, 206, 235, 0.55)"),
            ("Regional Sérgio Saez", "rgba(144, 238, 144, 0.55)"),
            ("Regional sem GR", "rgba(180, 180, 180, 0.55)"),
        ])
    })
}

pub fn representative_colors() -> &'static ColorTable {
    static COLORS: OnceLock<ColorTable> = OnceLock::new();
    COLORS.get_or_init(|| {
        ColorTable::new(vec![
            ("RENATO PEREIRA", "rgba(255, 105, 180, 0.7)"),
            ("RODRIGO LISBOA", "rgba(0, 191, 255, 0.7)"),
            ("DANIEL DE EQUIP.", "rgba(255, 69, 0, 0.7)"),
            ("VICTOR MOURA", "rgba(50, 205, 50, 0.7)"),
            ("CLECIO SALVIANO", "rgba(147, 112, 219, 0.7)"),
            ("HAMILTON MORAES", "rgba(255, 215, 0, 0.7)"),
            ("MARCOS BARIANI", "rgba(0, 255, 255, 0.7)"),
            ("ALEXANDRE CÂND.", "rgba(255, 165, 0, 0.7)"),
            ("EDSEU MARQUES", "rgba(128, 0, 128, 0.7)"),
            ("MAURO FOLLMANN", "rgba(255, 0, 0, 0.7)"),
            ("MANOEL AFONSO", "rgba(0, 128, 0, 0.7)"),
            ("JOSÉ LOBO", "rgba(255, 140, 0, 0.7)"),
            ("PEDRO AMORIM", "rgba(70, 130, 180, 0.7)"),
            ("CRYSTIANO SILVA", "rgba(0, 0, 255, 0.7)"),
            ("ROGÉRIO CASAGRANDE", "rgba(128, 0, 0, 0.7)"),
            ("ERNESTO (LLAMPE)", "rgba(0, 128, 15, 0.58)"),
            ("SEM COBERTURA", "rgba(180, 180, 180, 0.55)"),
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colors() -> ColorTable {
        ColorTable::new(vec![("A", "rgba(1, 1, 1, 0.5)"), ("B", "rgba(2, 2, 2, 0.5)")])
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn uncovered_states_render_transparent() {
        let style = style_for(&[], &names(&["A"]), &colors());
        assert_eq!(style.fill_color, "transparent");
        assert_eq!(style.fill_opacity, 0.0);
        assert!(style.weight <= UNCOVERED_WEIGHT);
    }

    #[test]
    fn single_selection_never_uses_the_overlap_color() {
        // B also covers the state, but with one entry selected the selected
        // entry's color always wins.
        let style = style_for(&names(&["A", "B"]), &names(&["A"]), &colors());
        assert_eq!(style.fill_color, "rgba(1, 1, 1, 0.5)");
        assert_eq!(style.fill_opacity, COVERED_OPACITY);
    }

    #[test]
    fn multi_selection_overlap_paints_the_overlap_color() {
        let style = style_for(&names(&["A", "B"]), &names(&["A", "B"]), &colors());
        assert_eq!(style.fill_color, OVERLAP_COLOR);
    }

    #[test]
    fn multi_selection_single_coverer_keeps_its_color() {
        let style = style_for(&names(&["B"]), &names(&["A", "B"]), &colors());
        assert_eq!(style.fill_color, "rgba(2, 2, 2, 0.5)");
    }

    #[test]
    fn unmapped_entries_fall_back_to_gray() {
        let style = style_for(&names(&["X"]), &names(&["X", "Y"]), &colors());
        assert_eq!(style.fill_color, FALLBACK_COLOR);
    }

    #[test]
    fn tooltip_joins_names_onto_the_state() {
        let text = tooltip_for(&names(&["A", "B"]), Some("C"), "Representantes", "São Paulo");
        assert_eq!(
            text.as_deref(),
            Some("Representantes: A, B | Estado: São Paulo")
        );
    }

    #[test]
    fn sentinel_only_states_get_the_distinct_label() {
        let text = tooltip_for(&names(&["C"]), Some("C"), "Representantes", "Amazonas");
        assert_eq!(text.as_deref(), Some("Sem cobertura | Estado: Amazonas"));
        assert_eq!(tooltip_for(&[], Some("C"), "Representantes", "Amazonas"), None);
    }

    #[test]
    fn choropleth_scale_defaults_to_one_on_empty_data() {
        assert_eq!(choropleth_color(0, 0), "rgb(55, 120, 255)");
        assert_eq!(choropleth_color(5, 5), "rgb(0, 255, 255)");
    }

    #[test]
    fn choropleth_channels_stay_in_range() {
        for count in 0..=10 {
            let color = choropleth_color(count, 10);
            assert!(color.starts_with("rgb("));
            assert!(!color.contains('-'));
        }
    }
}
