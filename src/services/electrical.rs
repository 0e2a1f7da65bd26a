/// Single-diode module model.
///
/// `calcparams_cec` turns irradiance and cell temperature into the five
/// diode-equation parameters; `max_power_points` solves the whole series for
/// the maximum power point with a lockstep Newton iteration on the diode
/// voltage (Bishop 1988 formulation). Each hour converges or fails on its own.

use tracing::debug;

use crate::config::SolverConfig;
use crate::services::catalog::CecModule;

/// Boltzmann constant (eV/K)
const BOLTZMANN_EV: f64 = 8.617_333_262e-5;
/// Band gap of silicon at reference temperature (eV)
const EG_REF: f64 = 1.121;
const D_EG_DT: f64 = -0.000_267_7;
const IRRAD_REF: f64 = 1000.0;
const TEMP_REF_C: f64 = 25.0;
const KELVIN: f64 = 273.15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiodeParams {
    pub photocurrent: f64,
    pub saturation_current: f64,
    pub resistance_series: f64,
    pub resistance_shunt: f64,
    /// n·Ns·Vth (V)
    pub n_ns_vth: f64,
}

impl DiodeParams {
    fn is_finite(&self) -> bool {
        self.photocurrent.is_finite()
            && self.saturation_current.is_finite()
            && self.resistance_series.is_finite()
            && !self.resistance_shunt.is_nan()
            && self.n_ns_vth.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxPowerPoint {
    pub i_mp: f64,
    pub v_mp: f64,
    pub p_mp: f64,
}

impl MaxPowerPoint {
    const MISSING: MaxPowerPoint = MaxPowerPoint { i_mp: f64::NAN, v_mp: f64::NAN, p_mp: f64::NAN };
}

#[derive(Debug, Clone)]
pub struct MppBatch {
    pub points: Vec<MaxPowerPoint>,
    /// Indices of hours with valid inputs whose solve did not converge
    pub unconverged: Vec<usize>,
}

/// CEC parameters at operating conditions (De Soto model with adjusted alpha_sc).
pub fn calcparams_cec(effective_irradiance: f64, temp_cell: f64, module: &CecModule) -> DiodeParams {
    let alpha_sc = module.alpha_sc * (1.0 - module.adjust / 100.0);
    let tref_k = TEMP_REF_C + KELVIN;
    let tcell_k = temp_cell + KELVIN;

    let e_g = EG_REF * (1.0 + D_EG_DT * (tcell_k - tref_k));
    let n_ns_vth = module.a_ref * (tcell_k / tref_k);
    let photocurrent = effective_irradiance / IRRAD_REF * (module.i_l_ref + alpha_sc * (tcell_k - tref_k));
    let saturation_current = module.i_o_ref
        * (tcell_k / tref_k).powi(3)
        * (EG_REF / (BOLTZMANN_EV * tref_k) - e_g / (BOLTZMANN_EV * tcell_k)).exp();
    // Infinite at zero irradiance, which the solver treats as no shunt leakage
    let resistance_shunt = module.r_sh_ref * (IRRAD_REF / effective_irradiance);

    DiodeParams {
        photocurrent,
        saturation_current,
        resistance_series: module.r_s,
        resistance_shunt,
        n_ns_vth,
    }
}

struct DiodeState {
    i: f64,
    v: f64,
    /// dP/dV
    grad_p: f64,
    /// d(dP/dV)/dVd
    grad2p: f64,
}

/// Current, voltage and power derivatives at diode voltage `vd`.
fn bishop88(vd: f64, p: &DiodeParams) -> DiodeState {
    let g_sh = 1.0 / p.resistance_shunt;
    let a = p.n_ns_vth;
    let exp = (vd / a).exp();

    let i = p.photocurrent - p.saturation_current * (exp - 1.0) - vd * g_sh;
    let v = vd - i * p.resistance_series;

    let grad_i = -p.saturation_current * exp / a - g_sh;
    let grad_v = 1.0 - grad_i * p.resistance_series;
    let grad = grad_i / grad_v;
    let grad_p = v * grad + i;

    let grad2i = -p.saturation_current * exp / (a * a);
    let grad2v = -grad2i * p.resistance_series;
    let grad2p = grad_v * grad + v * (grad2i / grad_v - grad_i * grad2v / (grad_v * grad_v)) + grad_i;

    DiodeState { i, v, grad_p, grad2p }
}

fn estimate_voc(p: &DiodeParams) -> f64 {
    p.n_ns_vth * (p.photocurrent / p.saturation_current + 1.0).ln()
}

/// Maximum power point of every hour in the series.
///
/// Hours with missing inputs come back as NaN without being counted; hours
/// that fail to converge within `solver.max_iter` also come back as NaN and
/// are listed in `unconverged`.
pub fn max_power_points(params: &[DiodeParams], solver: &SolverConfig) -> MppBatch {
    let mut vd: Vec<f64> = params.iter().map(estimate_voc).collect();
    let mut active: Vec<usize> = (0..params.len()).filter(|&k| params[k].is_finite() && vd[k].is_finite()).collect();
    let mut converged = vec![false; params.len()];

    for _ in 0..solver.max_iter {
        if active.is_empty() {
            break;
        }
        active.retain(|&k| {
            let state = bishop88(vd[k], &params[k]);
            let step = state.grad_p / state.grad2p;
            if !step.is_finite() {
                // Dead lane: leave it unconverged
                return false;
            }
            vd[k] -= step;
            if step.abs() < solver.tol {
                converged[k] = true;
                return false;
            }
            true
        });
    }

    let mut unconverged = Vec::new();
    let points = params
        .iter()
        .enumerate()
        .map(|(k, p)| {
            if converged[k] {
                let state = bishop88(vd[k], p);
                MaxPowerPoint { i_mp: state.i, v_mp: state.v, p_mp: state.i * state.v }
            } else {
                if p.is_finite() {
                    unconverged.push(k);
                }
                MaxPowerPoint::MISSING
            }
        })
        .collect();

    debug!(hours = params.len(), unconverged = unconverged.len(), "max power point solve finished");
    MppBatch { points, unconverged }
}
