use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Two-letter codes for the 27 federative units. Aggregations are keyed on
/// this enum; a record whose raw `uf` does not parse simply keeps `None` and
/// drops out of state-keyed stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[rustfmt::skip]
pub enum Uf {
    Ac, Al, Ap, Am, Ba, Ce, Df, Es, Go, Ma, Mt, Ms, Mg, Pa,
    Pb, Pr, Pe, Pi, Rj, Rn, Rs, Ro, Rr, Sc, Sp, Se, To,
}

impl Uf {
    #[rustfmt::skip]
    pub const ALL: [Uf; 27] = [
        Uf::Ac, Uf::Al, Uf::Ap, Uf::Am, Uf::Ba, Uf::Ce, Uf::Df, Uf::Es, Uf::Go,
        Uf::Ma, Uf::Mt, Uf::Ms, Uf::Mg, Uf::Pa, Uf::Pb, Uf::Pr, Uf::Pe, Uf::Pi,
        Uf::Rj, Uf::Rn, Uf::Rs, Uf::Ro, Uf::Rr, Uf::Sc, Uf::Sp, Uf::Se, Uf::To,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Uf::Ac => "AC", Uf::Al => "AL", Uf::Ap => "AP", Uf::Am => "AM",
            Uf::Ba => "BA", Uf::Ce => "CE", Uf::Df => "DF", Uf::Es => "ES",
            Uf::Go => "GO", Uf::Ma => "MA", Uf::Mt => "MT", Uf::Ms => "MS",
            Uf::Mg => "MG", Uf::Pa => "PA", Uf::Pb => "PB", Uf::Pr => "PR",
            Uf::Pe => "PE", Uf::Pi => "PI", Uf::Rj => "RJ", Uf::Rn => "RN",
            Uf::Rs => "RS", Uf::Ro => "RO", Uf::Rr => "RR", Uf::Sc => "SC",
            Uf::Sp => "SP", Uf::Se => "SE", Uf::To => "TO",
        }
    }

    /// Geographic macro-region the unit belongs to, used to derive the
    /// `regiao` attribute during import.
    pub fn region(&self) -> &'static str {
        match self {
            Uf::Ac | Uf::Ap | Uf::Am | Uf::Pa | Uf::Ro | Uf::Rr | Uf::To => "Norte",
            Uf::Al | Uf::Ba | Uf::Ce | Uf::Ma | Uf::Pb | Uf::Pe | Uf::Pi | Uf::Rn | Uf::Se => {
                "Nordeste"
            }
            Uf::Df | Uf::Go | Uf::Mt | Uf::Ms => "Centro-Oeste",
            Uf::Es | Uf::Mg | Uf::Rj | Uf::Sp => "Sudeste",
            Uf::Pr | Uf::Sc | Uf::Rs => "Sul",
        }
    }

    /// Case-insensitive parse of a raw code, tolerating surrounding noise.
    pub fn from_code(raw: &str) -> Option<Uf> {
        let code = raw.trim().to_uppercase();
        Uf::ALL.iter().copied().find(|uf| uf.as_str() == code)
    }
}

impl fmt::Display for Uf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Uf {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uf::from_code(s).ok_or(())
    }
}

/// One customer record. Field names double as the wire names for the JSON
/// API, matching what the dashboard frontend binds to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Customer {
    pub titulo: Option<String>,
    pub rede: Option<String>,
    pub tipo_cliente: Option<String>,
    pub funil: Option<String>,
    pub representante: Option<String>,
    pub responsavel: Option<String>,
    pub regiao: Option<String>,
    pub data: Option<NaiveDate>,
    pub valor_venda: Option<f64>,
    pub cidade: Option<String>,
    pub uf: Option<Uf>,
    pub cep: Option<String>,
    pub local_de_entrega: Option<String>,
    pub endereco_cliente: Option<String>,
    pub endereco_usado_geocode: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Customer {
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_case_insensitively() {
        assert_eq!(Uf::from_code("sp"), Some(Uf::Sp));
        assert_eq!(Uf::from_code(" RJ "), Some(Uf::Rj));
        assert_eq!(Uf::from_code("XX"), None);
        assert_eq!(Uf::from_code(""), None);
    }

    #[test]
    fn covers_all_27_units() {
        assert_eq!(Uf::ALL.len(), 27);
        let regions: std::collections::BTreeSet<_> =
            Uf::ALL.iter().map(|uf| uf.region()).collect();
        assert_eq!(regions.len(), 5);
    }

    #[test]
    fn serializes_as_two_letter_code() {
        let json = serde_json::to_string(&Uf::Sp).unwrap();
        assert_eq!(json, "\"SP\"");
        let back: Uf = serde_json::from_str("\"MG\"").unwrap();
        assert_eq!(back, Uf::Mg);
    }
}
