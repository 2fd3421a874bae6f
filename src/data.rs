use crate::boundaries::StateBoundaries;
use crate::config::AppConfig;
use crate::geocode::{self, geocode_with_priority, GeocodeCache, Geocoder};
use crate::types::{Customer, Uf};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::OnceLock;

/// Spreadsheet headers collapse to lowercase ASCII identifiers; accented and
/// punctuation characters all become underscores, so lookups use the mangled
/// names ("Título do Negócio" is `t_tulo_do_neg_cio`).
pub fn normalize_header(raw: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| Regex::new("[^a-z0-9]+").unwrap());
    re.replace_all(&raw.to_lowercase(), "_").into_owned()
}

/// Strips a CEP down to its digits; anything but exactly 8 is discarded.
pub fn clean_cep(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() == 8).then_some(digits)
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().split_whitespace().next()?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(head, "%d/%m/%Y"))
        .ok()
}

/// Sale values arrive either machine-formatted ("1234.56") or in Brazilian
/// notation ("R$ 1.234,56").
pub fn parse_valor(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_start_matches("R$").trim().replace(' ', "");
    if cleaned.is_empty() {
        return None;
    }
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };
    normalized.parse().ok()
}

fn read_rows(path: &Path) -> Result<Vec<HashMap<String, String>>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    let mut rdr = csv::ReaderBuilder::new().from_reader(file);
    let headers: Vec<String> = rdr.headers()?.iter().map(normalize_header).collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let mut row = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            if let Some(value) = record.get(i) {
                row.insert(header.clone(), value.to_string());
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

fn field(row: &HashMap<String, String>, key: &str) -> Option<String> {
    row.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Builds a customer from one normalized row. Returns the record plus the
/// spreadsheet's "address to consider" override, which only feeds geocoding.
pub fn customer_from_row(row: &HashMap<String, String>) -> (Customer, Option<String>) {
    let uf = field(row, "estado_do_cliente").and_then(|v| Uf::from_code(&v));
    let customer = Customer {
        titulo: field(row, "t_tulo_do_neg_cio"),
        rede: field(row, "rede_do_neg_cio"),
        tipo_cliente: field(row, "classifica_o_estrat_gico_spot_do_neg_cio"),
        funil: field(row, "funil"),
        representante: field(row, "representante_do_neg_cio"),
        responsavel: field(row, "respons_vel_do_neg_cio"),
        regiao: uf.map(|uf| uf.region().to_string()),
        data: field(row, "data").and_then(|v| parse_date(&v)),
        valor_venda: field(row, "valor").and_then(|v| parse_valor(&v)),
        cidade: field(row, "cidade_do_cliente"),
        uf,
        cep: field(row, "cep_do_cliente").and_then(|v| clean_cep(&v)),
        local_de_entrega: field(row, "local_de_entrega"),
        endereco_cliente: field(row, "endere_o_do_cliente"),
        endereco_usado_geocode: None,
        latitude: None,
        longitude: None,
    };
    let address_override = field(row, "endere_o_a_considerar");
    (customer, address_override)
}

/// Point-locates every geocoded record against the boundary shapes: a record
/// without a claimed UF adopts the located one, a record whose claimed UF
/// disagrees is counted but keeps its claim. Returns (filled, mismatched).
pub fn validate_locations(
    customers: &mut [Customer],
    boundaries: &StateBoundaries,
) -> (usize, usize) {
    customers
        .par_iter_mut()
        .map(|c| {
            let Some((lat, lon)) = c.position() else {
                return (0, 0);
            };
            match (c.uf, boundaries.locate(lat, lon)) {
                (None, Some(located)) => {
                    c.uf = Some(located);
                    c.regiao = Some(located.region().to_string());
                    (1, 0)
                }
                (Some(claimed), Some(located)) if claimed != located => (0, 1),
                _ => (0, 0),
            }
        })
        .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
}

/// The `import` subcommand: read the raw export, geocode by candidate
/// priority against the persistent cache, validate locations against the
/// boundaries, write the normalized records for `serve`.
pub async fn import_customers(config: &AppConfig) -> Result<()> {
    let rows = read_rows(&config.input.customers_csv)?;
    let boundaries = StateBoundaries::load(&config.input.boundaries)?;
    let mut cache = GeocodeCache::load(&config.geocode.cache);
    let geocoder = Geocoder::new(&config.geocode)?;
    println!(
        "Importando {} registros... (cache atual: {} entradas)",
        rows.len(),
        cache.len()
    );

    let mut customers = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let (mut customer, address_override) = customer_from_row(row);
        let candidates = geocode::candidates(&customer, address_override.as_deref());
        if let Some(located) = geocode_with_priority(&candidates, &mut cache, &geocoder).await {
            customer.latitude = Some(located.lat);
            customer.longitude = Some(located.lon);
            customer.endereco_usado_geocode = Some(located.query);
        }
        customers.push(customer);

        if (idx + 1) % config.geocode.save_every == 0 {
            cache.save()?;
            println!("  {} de {} processados", idx + 1, rows.len());
        }
    }
    cache.save()?;

    let (filled, mismatched) = validate_locations(&mut customers, &boundaries);
    println!(
        "Validação de UF: {} preenchidos pela localização, {} divergentes",
        filled, mismatched
    );

    write_customers(&config.output.customers_json, &customers)?;
    println!(
        "Importação concluída: {} clientes gravados em {:?}",
        customers.len(),
        config.output.customers_json
    );
    Ok(())
}

pub fn write_customers(path: &Path, customers: &[Customer]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer(BufWriter::new(file), customers)
        .with_context(|| format!("Failed to write customers to {:?}", path))?;
    Ok(())
}

pub fn load_customers(path: &Path) -> Result<Vec<Customer>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open customers file: {:?}", path))?;
    let customers: Vec<Customer> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse customers from {:?}", path))?;
    println!("Loaded {} customers", customers.len());
    Ok(customers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundaries::tests::sample_boundaries;

    #[test]
    fn headers_collapse_to_ascii_identifiers() {
        assert_eq!(normalize_header("Título do Negócio"), "t_tulo_do_neg_cio");
        assert_eq!(normalize_header("Funil"), "funil");
        assert_eq!(normalize_header("CEP do Cliente"), "cep_do_cliente");
    }

    #[test]
    fn cep_keeps_only_complete_digit_runs() {
        assert_eq!(clean_cep("01.001-000"), Some("01001000".to_string()));
        assert_eq!(clean_cep("1234"), None);
        assert_eq!(clean_cep("abc"), None);
    }

    #[test]
    fn dates_parse_both_conventions() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15);
        assert_eq!(parse_date("2024-03-15"), expected);
        assert_eq!(parse_date("15/03/2024"), expected);
        assert_eq!(parse_date("2024-03-15 00:00:00"), expected);
        assert_eq!(parse_date("sem data"), None);
    }

    #[test]
    fn sale_values_parse_both_notations() {
        assert_eq!(parse_valor("1234.56"), Some(1234.56));
        assert_eq!(parse_valor("R$ 1.234,56"), Some(1234.56));
        assert_eq!(parse_valor("99"), Some(99.0));
        assert_eq!(parse_valor(""), None);
        assert_eq!(parse_valor("indisponível"), None);
    }

    #[test]
    fn rows_map_to_customers_with_derived_region() {
        let mut row = HashMap::new();
        row.insert("t_tulo_do_neg_cio".to_string(), "Padaria Central".to_string());
        row.insert("estado_do_cliente".to_string(), "sp".to_string());
        row.insert("cidade_do_cliente".to_string(), "Campinas".to_string());
        row.insert("valor".to_string(), "1.500,00".to_string());
        row.insert("data".to_string(), "01/02/2024".to_string());
        row.insert("cep_do_cliente".to_string(), "13010-100".to_string());
        row.insert("endere_o_a_considerar".to_string(), "Av. Brasil 1".to_string());

        let (customer, address_override) = customer_from_row(&row);
        assert_eq!(customer.titulo.as_deref(), Some("Padaria Central"));
        assert_eq!(customer.uf, Some(Uf::Sp));
        assert_eq!(customer.regiao.as_deref(), Some("Sudeste"));
        assert_eq!(customer.valor_venda, Some(1500.0));
        assert_eq!(customer.data, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(customer.cep.as_deref(), Some("13010100"));
        assert_eq!(address_override.as_deref(), Some("Av. Brasil 1"));
    }

    #[test]
    fn validation_fills_missing_states_and_counts_mismatches() {
        let boundaries = sample_boundaries();
        let mut customers = vec![
            // Inside the SP square, no claimed UF: gets filled.
            Customer {
                latitude: Some(0.5),
                longitude: Some(0.5),
                ..Customer::default()
            },
            // Inside the RJ square but claims SP: mismatch, claim kept.
            Customer {
                latitude: Some(0.5),
                longitude: Some(2.5),
                uf: Some(Uf::Sp),
                ..Customer::default()
            },
            // No coordinates: untouched.
            Customer {
                uf: Some(Uf::Mg),
                ..Customer::default()
            },
        ];

        let (filled, mismatched) = validate_locations(&mut customers, &boundaries);
        assert_eq!((filled, mismatched), (1, 1));
        assert_eq!(customers[0].uf, Some(Uf::Sp));
        assert_eq!(customers[0].regiao.as_deref(), Some("Sudeste"));
        assert_eq!(customers[1].uf, Some(Uf::Sp));
    }
}
