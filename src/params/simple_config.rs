use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use log::warn;
use nalgebra::Vector3;

use super::ParameterProvider;
use crate::error::{parse_error, ParamError, ParamResult};

/// Simulator-side parameter store read from `.txt` config files.
///
/// ```text
/// # comment
/// [QuadPhysicalParams]
/// Mass = 0.5
///
/// [QuadControlParams : QuadPhysicalParams]   // inherits Mass
/// kpPQR = 70, 70, 15
/// ```
///
/// Keys are case-insensitive and addressed as `Section.key`.
#[derive(Clone, Debug, Default)]
pub struct SimpleConfig {
    values: HashMap<String, Vec<f64>>,
}

impl SimpleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads and parses a config file.
    pub fn load(path: impl AsRef<Path>) -> ParamResult<Self> {
        let text = std::fs::read_to_string(path)?;
        text.parse()
    }

    /// Sets (or overrides) a fully qualified key.
    pub fn set(&mut self, key: &str, values: &[f64]) {
        self.values.insert(normalize(key), values.to_vec());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(&normalize(key))
    }

    fn lookup(&self, key: &str) -> Option<&[f64]> {
        self.values.get(&normalize(key)).map(Vec::as_slice)
    }
}

impl ParameterProvider for SimpleConfig {
    fn find(&self, key: &str) -> Option<f64> {
        self.lookup(key).and_then(|v| v.first().copied())
    }

    fn get_vector(&self, key: &str, default: Vector3<f64>) -> Vector3<f64> {
        match self.lookup(key) {
            Some(&[x, y, z]) => Vector3::new(x, y, z),
            Some(other) => {
                warn!("{key}: expected 3 values, found {}", other.len());
                default
            }
            None => default,
        }
    }
}

impl FromStr for SimpleConfig {
    type Err = ParamError;

    fn from_str(text: &str) -> ParamResult<Self> {
        let mut config = Self::new();
        let mut section = String::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let header = header
                    .strip_suffix(']')
                    .ok_or_else(|| parse_error(line_no, "unterminated section header"))?;
                section = config.open_section(header, line_no)?;
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                parse_error(line_no, format!("expected `key = value`, got `{line}`"))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(parse_error(line_no, "empty key"));
            }

            let values = value
                .split(',')
                .map(|v| {
                    let v = v.trim();
                    v.parse::<f64>()
                        .map_err(|_| parse_error(line_no, format!("`{v}` is not a number")))
                })
                .collect::<ParamResult<Vec<_>>>()?;

            let full_key = if section.is_empty() {
                key.to_string()
            } else {
                format!("{section}.{key}")
            };
            config.values.insert(normalize(&full_key), values);
        }

        Ok(config)
    }
}

impl SimpleConfig {
    /// Handles `Name` or `Name : Parent`, copying the parent's keys into the
    /// new section. Returns the normalized section name.
    fn open_section(&mut self, header: &str, line_no: usize) -> ParamResult<String> {
        let (name, parent) = match header.split_once(':') {
            Some((name, parent)) => (name.trim(), Some(parent.trim())),
            None => (header.trim(), None),
        };
        if name.is_empty() {
            return Err(parse_error(line_no, "empty section name"));
        }
        let name = normalize(name);

        if let Some(parent) = parent {
            let prefix = format!("{}.", normalize(parent));
            let inherited: Vec<(String, Vec<f64>)> = self
                .values
                .iter()
                .filter_map(|(k, v)| {
                    k.strip_prefix(&prefix)
                        .map(|rest| (format!("{name}.{rest}"), v.clone()))
                })
                .collect();
            if inherited.is_empty() {
                return Err(parse_error(line_no, format!("unknown parent section `{parent}`")));
            }
            self.values.extend(inherited);
        }

        Ok(name)
    }
}

fn strip_comment(line: &str) -> &str {
    let end = [line.find('#'), line.find("//")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(line.len());
    &line[..end]
}

fn normalize(key: &str) -> String {
    key.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections_and_values() {
        let config: SimpleConfig = "
            # physical
            [Quad]
            Mass = 0.5   // kg
            kpPQR = 23, 23.5, 5
        "
        .parse()
        .unwrap();

        assert_eq!(config.get("Quad.Mass", 0.0), 0.5);
        assert_eq!(config.get("quad.mass", 0.0), 0.5);
        assert_eq!(
            config.get_vector("QUAD.kpPQR", Vector3::zeros()),
            Vector3::new(23.0, 23.5, 5.0)
        );
        assert_eq!(config.get("Quad.missing", 7.0), 7.0);
    }

    #[test]
    fn test_section_inheritance() {
        let config: SimpleConfig = "
            [Base]
            Mass = 0.5
            kpBank = 10
            [Tuned : Base]
            kpBank = 12
        "
        .parse()
        .unwrap();

        assert_eq!(config.get("Tuned.Mass", 0.0), 0.5);
        assert_eq!(config.get("Tuned.kpBank", 0.0), 12.0);
        assert_eq!(config.get("Base.kpBank", 0.0), 10.0);
    }

    #[test]
    fn test_unknown_parent_is_an_error() {
        let err = "[Child : Nobody]".parse::<SimpleConfig>().unwrap_err();
        assert!(matches!(err, ParamError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_bad_number_reports_line() {
        let err = "[Q]\nMass = 0.5\nkpBank = twelve".parse::<SimpleConfig>().unwrap_err();
        match err {
            ParamError::Parse { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("twelve"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_equals_is_an_error() {
        let err = "[Q]\nMass 0.5".parse::<SimpleConfig>().unwrap_err();
        assert!(matches!(err, ParamError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_wrong_vector_length_falls_back() {
        let mut config = SimpleConfig::new();
        config.set("Q.kpPQR", &[1.0, 2.0]);
        let default = Vector3::new(4.0, 5.0, 6.0);
        assert_eq!(config.get_vector("Q.kpPQR", default), default);
    }

    #[test]
    fn test_set_overrides() {
        let mut config: SimpleConfig = "[Q]\nkpYaw = 1".parse().unwrap();
        config.set("Q.kpYaw", &[3.0]);
        assert!(config.contains("q.kpyaw"));
        assert_eq!(config.get("Q.kpYaw", 0.0), 3.0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = SimpleConfig::load("/nonexistent/quad-control/params.txt").unwrap_err();
        assert!(matches!(err, ParamError::Io(_)));
    }
}
