use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::models::records::{
    AggregateValues, Aggregates, DayAggregate, HourlySimulationRecord, MonthAggregate, YearAggregate,
};

/// Fixed day count for the yearly mean daily irradiation, leap years included.
const DAYS_PER_YEAR: f64 = 365.0;

/// Turns per-module power into delivered energy and rolls hours up by period.
#[derive(Debug, Clone, Copy)]
pub struct EnergyAggregator {
    /// m² of panel per m² of ground
    pub packing_density: f64,
    pub module_efficiency: f64,
}

impl EnergyAggregator {
    pub fn new(packing_density: f64, module_efficiency: f64) -> Self {
        Self { packing_density, module_efficiency }
    }

    /// kWh delivered in one hour by `area_panel` m² at module power `p_mp` (W).
    pub fn energy_kwh(&self, p_mp: f64, area_panel: f64) -> f64 {
        p_mp * area_panel * self.packing_density * self.module_efficiency / 1000.0
    }

    pub fn assign_energy(&self, hours: &mut [HourlySimulationRecord], area_panel: f64) {
        for h in hours.iter_mut() {
            h.area_panel = area_panel;
            h.energy_kwh = self.energy_kwh(h.p_mp, area_panel);
            h.energy_mwh = h.energy_kwh / 1000.0;
        }
    }

    /// Fills in energy for every hour, then reduces to day, month and year rows.
    pub fn aggregate(&self, hours: &mut [HourlySimulationRecord], polygon_id: &str, area_panel: f64) -> Aggregates {
        self.assign_energy(hours, area_panel);
        rollup(hours, polygon_id)
    }
}

// ─── Reduction ───────────────────────────────────────────────

/// NaN-skipping accumulator: an all-missing group sums to 0 and averages to NaN.
#[derive(Debug, Clone, Copy, Default)]
struct Field {
    sum: f64,
    n: u32,
}

impl Field {
    fn push(&mut self, x: f64) {
        if !x.is_nan() {
            self.sum += x;
            self.n += 1;
        }
    }

    fn total(&self) -> f64 {
        self.sum
    }

    fn mean(&self) -> f64 {
        if self.n == 0 { f64::NAN } else { self.sum / self.n as f64 }
    }
}

/// Declares the per-period accumulator from the reduction table. Each entry
/// names a field present on both `HourlySimulationRecord` and
/// `AggregateValues`, so hourly inputs and aggregate outputs pair by name.
macro_rules! reduction {
    (mean: [$($m:ident),* $(,)?], sum: [$($s:ident),* $(,)?] $(,)?) => {
        #[derive(Debug, Default)]
        struct Fields {
            $($m: Field,)*
            $($s: Field,)*
        }

        impl Fields {
            fn push(&mut self, h: &HourlySimulationRecord) {
                $(self.$m.push(h.$m);)*
                $(self.$s.push(h.$s);)*
            }

            fn values(&self) -> AggregateValues {
                AggregateValues {
                    $($m: self.$m.mean(),)*
                    $($s: self.$s.total(),)*
                    // Derived rather than summed so the kWh/MWh relation holds exactly
                    energy_mwh: self.energy_kwh.total() / 1000.0,
                }
            }
        }
    };
}

reduction! {
    mean: [
        latitude, longitude, area_panel, surface_tilt, surface_azimuth,
        temp_air, iam, temp_cell,
    ],
    sum: [
        ghi, dhi, dni, dni_extra, poa_direct, poa_diffuse, poa_global,
        effective_irradiance, i_mp, v_mp, p_mp, energy_kwh,
    ],
}

#[derive(Debug, Default)]
struct Group {
    fields: Fields,
    days: BTreeSet<NaiveDate>,
}

impl Group {
    fn push(&mut self, h: &HourlySimulationRecord) {
        self.fields.push(h);
        self.days.insert(h.timestamp.date_naive());
    }

    fn values(&self) -> AggregateValues {
        self.fields.values()
    }
}

/// Groups hours by (period, geometry), keys sorted like the period then the WKT.
fn group_by<K, F>(hours: &[HourlySimulationRecord], period: F) -> BTreeMap<(K, String), Group>
where
    K: Ord,
    F: Fn(&DateTime<Utc>) -> K,
{
    let mut groups: BTreeMap<(K, String), Group> = BTreeMap::new();
    for h in hours {
        groups
            .entry((period(&h.timestamp), h.geometry.clone()))
            .or_default()
            .push(h);
    }
    groups
}

/// Reduces an hourly series (possibly several placements) to day, month and year rows.
pub fn rollup(hours: &[HourlySimulationRecord], polygon_id: &str) -> Aggregates {
    let days = group_by(hours, |t| t.date_naive())
        .into_iter()
        .map(|((date, geometry), g)| DayAggregate {
            date_day: date.format("%Y-%m-%d").to_string(),
            geometry,
            values: g.values(),
            polygons_id: polygon_id.to_string(),
        })
        .collect();

    let months = group_by(hours, |t| (t.year(), t.month()))
        .into_iter()
        .map(|(((year, month), geometry), g)| {
            let values = g.values();
            let dias_por_mes = g.days.len() as u32;
            MonthAggregate {
                date: format!("{:04}-{:02}", year, month),
                geometry,
                values,
                dias_por_mes,
                ghi_kwh_dia: values.ghi / dias_por_mes as f64 / 1000.0,
            }
        })
        .collect();

    let years = group_by(hours, |t| t.year())
        .into_iter()
        .map(|((year, geometry), g)| {
            let values = g.values();
            YearAggregate {
                date: format!("{:04}", year),
                geometry,
                values,
                ghi_kwh_dia: values.ghi / DAYS_PER_YEAR / 1000.0,
            }
        })
        .collect();

    Aggregates { days, months, years }
}
