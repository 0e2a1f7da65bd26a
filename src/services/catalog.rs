use serde::Serialize;
use utoipa::ToSchema;

pub const DEFAULT_MODULE: &str = "Canadian_Solar_Inc__CS6X_300M";
pub const DEFAULT_INVERTER: &str = "SMA_America__STP_60_US_10__480V_";

/// CEC single-diode reference parameters for one module type.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct CecModule {
    pub name: &'static str,
    pub technology: &'static str,
    /// Cells in series
    pub n_s: u32,
    pub i_sc_ref: f64,
    pub v_oc_ref: f64,
    pub i_mp_ref: f64,
    pub v_mp_ref: f64,
    /// Short-circuit current temperature coefficient (A/K)
    pub alpha_sc: f64,
    /// Modified ideality factor at reference conditions (V)
    pub a_ref: f64,
    pub i_l_ref: f64,
    pub i_o_ref: f64,
    pub r_s: f64,
    pub r_sh_ref: f64,
    /// Adjustment to alpha_sc (%)
    pub adjust: f64,
}

/// Nameplate of a grid-tie inverter.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct Inverter {
    pub name: &'static str,
    /// Rated AC output (W)
    pub paco: f64,
    /// DC input at rated AC output (W)
    pub pdco: f64,
    /// Nominal DC voltage (V)
    pub vdco: f64,
    pub mppt_low: f64,
    pub mppt_high: f64,
    pub vac: f64,
}

/// Fitted single-diode values for the two 72-cell 300 W modules, not the SAM
/// CEC database rows. Nameplate figures follow the datasheets; `i_l_ref`,
/// `i_o_ref`, `r_s`, `r_sh_ref` and `a_ref` were chosen so the diode equation
/// reproduces Voc at reference conditions and Pmp lands near 300 W at STC.
const MODULES: &[CecModule] = &[
    CecModule {
        name: "Canadian_Solar_Inc__CS6X_300M",
        technology: "Mono-c-Si",
        n_s: 72,
        i_sc_ref: 8.74,
        v_oc_ref: 45.6,
        i_mp_ref: 8.22,
        v_mp_ref: 36.5,
        alpha_sc: 0.004371,
        a_ref: 1.8,
        i_l_ref: 8.753,
        i_o_ref: 8.64e-11,
        r_s: 0.45,
        r_sh_ref: 600.0,
        adjust: 9.0,
    },
    CecModule {
        name: "Canadian_Solar_Inc__CS6X_300P",
        technology: "Multi-c-Si",
        n_s: 72,
        i_sc_ref: 8.87,
        v_oc_ref: 44.6,
        i_mp_ref: 8.30,
        v_mp_ref: 36.1,
        alpha_sc: 0.005765,
        a_ref: 1.8,
        i_l_ref: 8.882,
        i_o_ref: 1.52e-10,
        r_s: 0.40,
        r_sh_ref: 400.0,
        adjust: 7.5,
    },
];

const INVERTERS: &[Inverter] = &[Inverter {
    name: "SMA_America__STP_60_US_10__480V_",
    paco: 60000.0,
    pdco: 61362.0,
    vdco: 722.0,
    mppt_low: 570.0,
    mppt_high: 800.0,
    vac: 480.0,
}];

pub fn module_by_id(id: &str) -> Option<CecModule> {
    MODULES.iter().find(|m| m.name == id).copied()
}

pub fn inverter_by_id(id: &str) -> Option<Inverter> {
    INVERTERS.iter().find(|i| i.name == id).copied()
}
