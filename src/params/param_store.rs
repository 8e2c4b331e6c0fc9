use std::collections::HashMap;

use nalgebra::Vector3;

use super::ParameterProvider;
use crate::error::{ParamError, ParamResult};

/// Hardware parameter names known to the store, with the controller key
/// (last path segment) each one feeds.
const PARAM_TABLE: &[(&str, &str)] = &[
    ("MC_PITCH_P", "kpBank"),
    ("MC_YAW_P", "kpYaw"),
    ("MPC_XY_P", "kpPosXY"),
    ("MPC_Z_P", "kpPosZ"),
    ("MPC_Z_I", "KiPosZ"),
    ("MPC_XY_VEL_P", "kpVelXY"),
    ("MPC_Z_VEL_P", "kpVelZ"),
    ("MPC_Z_VEL_MAX_UP", "maxAscentRate"),
    ("MPC_Z_VEL_MAX_DN", "maxDescentRate"),
    ("MPC_XY_VEL_MAX", "maxSpeedXY"),
    ("MPC_ACC_HOR_MAX", "maxHorizAccel"),
];

/// Per-axis body rate gains, in [p, q, r] order.
const RATE_GAIN_PARAMS: [&str; 3] = ["MC_ROLLRATE_P", "MC_PITCHRATE_P", "MC_YAWRATE_P"];

/// Flat table of single-precision parameters, as kept by flight hardware.
///
/// Only the names in the fixed table can be stored. Controller keys such as
/// `QuadControlParams.kpBank` are resolved through their last segment;
/// anything without a hardware counterpart reads as the caller's default.
/// Both kinds of name match case-insensitively, like [`SimpleConfig`] keys.
///
/// [`SimpleConfig`]: super::SimpleConfig
#[derive(Clone, Debug, Default)]
pub struct ParamStore {
    values: HashMap<&'static str, f32>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under a hardware name such as `MC_PITCH_P`.
    pub fn set(&mut self, name: &str, value: f32) -> ParamResult<()> {
        let name = table_name(name)
            .ok_or_else(|| ParamError::UnknownParameter(name.to_string()))?;
        self.values.insert(name, value);
        Ok(())
    }

    /// Raw value of a hardware parameter, if it has been set.
    pub fn param(&self, name: &str) -> Option<f32> {
        table_name(name).and_then(|name| self.values.get(name).copied())
    }

    fn hardware_name(key: &str) -> Option<&'static str> {
        let segment = last_segment(key);
        PARAM_TABLE
            .iter()
            .find(|(_, ctrl_key)| ctrl_key.eq_ignore_ascii_case(segment))
            .map(|(name, _)| *name)
    }
}

fn table_name(name: &str) -> Option<&'static str> {
    PARAM_TABLE
        .iter()
        .map(|(hw, _)| *hw)
        .chain(RATE_GAIN_PARAMS)
        .find(|hw| hw.eq_ignore_ascii_case(name.trim()))
}

fn last_segment(key: &str) -> &str {
    key.rsplit('.').next().unwrap_or(key).trim()
}

impl ParameterProvider for ParamStore {
    fn find(&self, key: &str) -> Option<f64> {
        Self::hardware_name(key)
            .and_then(|name| self.param(name))
            .map(f64::from)
    }

    fn get_vector(&self, key: &str, default: Vector3<f64>) -> Vector3<f64> {
        if !last_segment(key).eq_ignore_ascii_case("kpPQR") {
            return default;
        }
        Vector3::from_fn(|i, _| {
            self.param(RATE_GAIN_PARAMS[i])
                .map_or(default[i], f64::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_read_back() {
        let mut store = ParamStore::new();
        store.set("MPC_XY_P", 0.95).unwrap();
        assert_eq!(store.param("MPC_XY_P"), Some(0.95));
        // Widened from f32
        assert_eq!(store.get("QuadControlParams.kpPosXY", 0.0), f64::from(0.95f32));
    }

    #[test]
    fn test_unknown_name_rejected() {
        let mut store = ParamStore::new();
        let err = store.set("MC_NOT_A_PARAM", 1.0).unwrap_err();
        assert!(matches!(err, ParamError::UnknownParameter(name) if name == "MC_NOT_A_PARAM"));
    }

    #[test]
    fn test_unmapped_key_returns_default() {
        let store = ParamStore::new();
        assert_eq!(store.get("QuadControlParams.Mass", 0.5), 0.5);
        // Mapped but never set
        assert_eq!(store.get("QuadControlParams.kpYaw", 2.0), 2.0);
    }

    #[test]
    fn test_names_match_case_insensitively() {
        let mut store = ParamStore::new();
        store.set("mc_pitch_p", 6.5).unwrap();
        store.set("MC_ROLLRATE_P", 40.0).unwrap();

        assert_eq!(store.param("MC_PITCH_P"), Some(6.5));
        assert_eq!(store.get("QuadControlParams.kpbank", 0.0), 6.5);
        assert_eq!(store.get("quadcontrolparams.KPBANK", 0.0), 6.5);
        assert_eq!(
            store.get_vector("quadcontrolparams.kppqr", Vector3::zeros()),
            Vector3::new(40.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_rate_gains_partial() {
        let mut store = ParamStore::new();
        store.set("MC_YAWRATE_P", 5.0).unwrap();
        let v = store.get_vector("QuadControlParams.kpPQR", Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(v, Vector3::new(1.0, 2.0, 5.0));
    }
}
