//! Scenario loading: the unified CSV with a `type` discriminator column,
//! carrying both bond rows and event rows. Column names follow the original
//! sheet layout (`valor_nominal`, `tasa_cupon_anual`, ...).
//!
//! The engine itself only ever sees the typed `Bond` / `MarketEvent` values
//! built here; raw text never crosses that boundary.

use std::fs::File;
use std::io;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::engine::types::{Bond, EventKind, MarketEvent};

/// Malformed scenario input. Always recoverable by fixing the row; the engine
/// is never handed a bad record.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("row {row}: missing required field `{field}`")]
    MissingField { row: usize, field: &'static str },
    #[error("row {row}: invalid value `{value}` for `{field}`")]
    InvalidValue {
        row: usize,
        field: &'static str,
        value: String,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scenario {
    pub bonds: Vec<Bond>,
    pub events: Vec<MarketEvent>,
}

// One raw row of the unified CSV. Optional everywhere; defaults and
// validation are applied per row kind below.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "type")]
    row_type: String,
    #[serde(default)]
    bond_id: Option<String>,
    #[serde(default)]
    nombre: Option<String>,
    #[serde(default)]
    valor_nominal: Option<f64>,
    #[serde(default)]
    tasa_cupon_anual: Option<f64>,
    #[serde(default)]
    frecuencia_anual: Option<f64>,
    #[serde(default)]
    vencimiento_anios: Option<f64>,
    #[serde(default)]
    spread_bps: Option<f64>,
    #[serde(default)]
    callable: Option<String>,
    #[serde(default)]
    precio_call: Option<f64>,
    #[serde(default)]
    round: Option<f64>,
    #[serde(default)]
    delta_tasa_bps: Option<f64>,
    #[serde(default)]
    impacto_bps: Option<f64>,
    #[serde(default)]
    favored_bps: Option<f64>,
    #[serde(default)]
    penalized_bps: Option<f64>,
    #[serde(default)]
    descripcion: Option<String>,
}

pub fn load_scenario_csv(path: &Path) -> Result<Scenario, ScenarioError> {
    let file = File::open(path)?;
    let scenario = parse_scenario(file)?;
    info!(
        path = %path.display(),
        bonds = scenario.bonds.len(),
        events = scenario.events.len(),
        "scenario loaded"
    );
    Ok(scenario)
}

pub fn parse_scenario<R: io::Read>(reader: R) -> Result<Scenario, ScenarioError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut scenario = Scenario::default();
    for (idx, record) in csv_reader.deserialize::<RawRow>().enumerate() {
        let row = idx + 2; // header is line 1
        let raw = record?;
        match raw.row_type.trim().to_ascii_uppercase().as_str() {
            "BOND" => scenario.bonds.push(bond_from_row(row, raw)?),
            "MARKET" | "IDIOS" | "MIXED" => scenario.events.push(event_from_row(row, raw)?),
            other => {
                warn!(row, row_type = other, "skipping row with unknown type");
            }
        }
    }
    Ok(scenario)
}

fn bond_from_row(row: usize, raw: RawRow) -> Result<Bond, ScenarioError> {
    let bond_id = raw
        .bond_id
        .filter(|s| !s.is_empty())
        .ok_or(ScenarioError::MissingField {
            row,
            field: "bond_id",
        })?;
    // Defaults as documented for the sheet template.
    let face_value = raw.valor_nominal.unwrap_or(1000.0);
    if face_value <= 0.0 {
        return Err(ScenarioError::InvalidValue {
            row,
            field: "valor_nominal",
            value: face_value.to_string(),
        });
    }
    let annual_coupon_rate = raw.tasa_cupon_anual.unwrap_or(0.0);
    if annual_coupon_rate < 0.0 {
        return Err(ScenarioError::InvalidValue {
            row,
            field: "tasa_cupon_anual",
            value: annual_coupon_rate.to_string(),
        });
    }
    let freq = raw.frecuencia_anual.unwrap_or(2.0);
    if freq < 1.0 || freq.fract() != 0.0 {
        return Err(ScenarioError::InvalidValue {
            row,
            field: "frecuencia_anual",
            value: freq.to_string(),
        });
    }
    let years_to_maturity = raw.vencimiento_anios.unwrap_or(1.0);
    if years_to_maturity < 0.0 {
        return Err(ScenarioError::InvalidValue {
            row,
            field: "vencimiento_anios",
            value: years_to_maturity.to_string(),
        });
    }
    let callable = raw
        .callable
        .map(|s| s.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    Ok(Bond {
        name: raw.nombre.unwrap_or_else(|| bond_id.clone()),
        bond_id,
        face_value,
        annual_coupon_rate,
        payments_per_year: freq as u32,
        years_to_maturity,
        credit_spread_bps: raw.spread_bps.unwrap_or(0.0),
        callable,
        call_price: if callable { raw.precio_call } else { None },
    })
}

fn event_from_row(row: usize, raw: RawRow) -> Result<MarketEvent, ScenarioError> {
    let round_raw = raw.round.unwrap_or(1.0);
    if round_raw < 1.0 || round_raw.fract() != 0.0 {
        return Err(ScenarioError::InvalidValue {
            row,
            field: "round",
            value: round_raw.to_string(),
        });
    }
    let kind = match raw.row_type.trim().to_ascii_uppercase().as_str() {
        "MARKET" => EventKind::Market {
            rate_shock_bps: raw.delta_tasa_bps.unwrap_or(0.0),
        },
        "IDIOS" => EventKind::Idiosyncratic {
            target_bond_id: raw
                .bond_id
                .filter(|s| !s.is_empty())
                .ok_or(ScenarioError::MissingField {
                    row,
                    field: "bond_id",
                })?,
            impact_bps: raw.impacto_bps.unwrap_or(0.0),
        },
        "MIXED" => EventKind::Mixed {
            favored_bps: raw.favored_bps.unwrap_or(0.0),
            penalized_bps: raw.penalized_bps.unwrap_or(0.0),
        },
        // parse_scenario only routes the three event types here
        other => {
            return Err(ScenarioError::InvalidValue {
                row,
                field: "type",
                value: other.to_string(),
            })
        }
    };
    Ok(MarketEvent {
        round: round_raw as u32,
        kind,
        description: raw.descripcion.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
type,bond_id,nombre,valor_nominal,tasa_cupon_anual,frecuencia_anual,vencimiento_anios,spread_bps,callable,precio_call,round,delta_tasa_bps,impacto_bps,favored_bps,penalized_bps,descripcion
BOND,B1,Bono Soberano,1000,0.06,2,3,80,FALSE,,,,,,,Soberano 3y
BOND,B2,Corporativo AA,1000,0.08,2,5,150,TRUE,1020,,,,,,Callable corporativo
MARKET,,,,,,,,,,1,50,,,,Sube la curva
IDIOS,B2,,,,,,,,,2,,75,,,Rebaja de calificacion
MIXED,,,,,,,,,,3,,,-25,40,Vuelo a calidad
";

    #[test]
    fn parses_unified_sample() {
        let scenario = parse_scenario(SAMPLE.as_bytes()).unwrap();
        assert_eq!(scenario.bonds.len(), 2);
        assert_eq!(scenario.events.len(), 3);

        let b2 = &scenario.bonds[1];
        assert_eq!(b2.bond_id, "B2");
        assert!(b2.callable);
        assert_eq!(b2.call_price, Some(1020.0));

        assert!(matches!(
            scenario.events[0].kind,
            EventKind::Market { rate_shock_bps } if rate_shock_bps == 50.0
        ));
        assert!(matches!(
            &scenario.events[1].kind,
            EventKind::Idiosyncratic { target_bond_id, impact_bps }
                if target_bond_id == "B2" && *impact_bps == 75.0
        ));
        assert!(matches!(
            scenario.events[2].kind,
            EventKind::Mixed { favored_bps, penalized_bps }
                if favored_bps == -25.0 && penalized_bps == 40.0
        ));
    }

    #[test]
    fn bond_defaults_fill_missing_numerics() {
        let csv = "type,bond_id,nombre,valor_nominal,tasa_cupon_anual,frecuencia_anual,vencimiento_anios,spread_bps\nBOND,B9,,,,,,\n";
        let scenario = parse_scenario(csv.as_bytes()).unwrap();
        let bond = &scenario.bonds[0];
        assert_eq!(bond.face_value, 1000.0);
        assert_eq!(bond.payments_per_year, 2);
        assert_eq!(bond.years_to_maturity, 1.0);
        assert_eq!(bond.name, "B9");
        assert!(!bond.callable);
    }

    #[test]
    fn bond_without_id_is_an_input_error() {
        let csv = "type,bond_id,valor_nominal\nBOND,,1000\n";
        let err = parse_scenario(csv.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::MissingField { field: "bond_id", .. }
        ));
    }

    #[test]
    fn idios_without_target_is_an_input_error() {
        let csv = "type,bond_id,round,impacto_bps\nIDIOS,,2,75\n";
        let err = parse_scenario(csv.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::MissingField { field: "bond_id", .. }
        ));
    }

    #[test]
    fn zero_frequency_is_rejected_upstream() {
        let csv = "type,bond_id,frecuencia_anual\nBOND,B1,0\n";
        let err = parse_scenario(csv.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::InvalidValue { field: "frecuencia_anual", .. }
        ));
    }

    #[test]
    fn unknown_row_types_are_skipped() {
        let csv = "type,bond_id\nNOTE,B1\nBOND,B1\n";
        let scenario = parse_scenario(csv.as_bytes()).unwrap();
        assert_eq!(scenario.bonds.len(), 1);
        assert!(scenario.events.is_empty());
    }

    #[test]
    fn non_callable_bond_drops_call_price() {
        let csv = "type,bond_id,callable,precio_call\nBOND,B1,FALSE,1020\n";
        let scenario = parse_scenario(csv.as_bytes()).unwrap();
        assert_eq!(scenario.bonds[0].call_price, None);
    }
}
