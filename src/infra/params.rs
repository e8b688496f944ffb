// ============================================================
// Layer 6 — Parameter Files
// ============================================================
// A trained model's parameters are saved as one tensor
// dictionary whose keys carry their role:
//
//   arg:target_embed_weight   ← learned weight
//   aux:bn_moving_mean        ← running statistic, not trained
//
// Loading splits the dictionary into an `arg` and an `aux`
// mapping. Keys are split at the FIRST colon, so tensor names
// may themselves contain colons. A key without a colon, with
// an empty side, or with a role other than arg/aux is rejected.

use burn::tensor::TensorData;
use std::{collections::BTreeMap, path::Path};

use crate::data::tensor_dict::NamedTensors;
use crate::domain::artifact::ParamRole;
use crate::domain::constants::PARAM_KEY_SEPARATOR;
use crate::domain::error::{ExportError, Result};

/// Model parameters split by role.
#[derive(Debug, Clone, Default)]
pub struct ParamSet {
    pub arg: BTreeMap<String, TensorData>,
    pub aux: BTreeMap<String, TensorData>,
}

impl ParamSet {
    /// Split a `<role>:<name>` keyed dictionary.
    pub fn split(dict: NamedTensors) -> Result<Self> {
        let mut params = Self::default();
        for (key, tensor) in dict {
            let (role, name) = parse_param_key(&key)?;
            params.bucket_mut(role).insert(name.to_string(), tensor);
        }
        Ok(params)
    }

    /// Read a params file and split it by role.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path   = path.as_ref();
        let params = Self::split(NamedTensors::load(path)?)?;

        tracing::info!(
            "Loaded {} arg and {} aux parameters from '{}'",
            params.arg.len(),
            params.aux.len(),
            path.display()
        );
        Ok(params)
    }

    /// Re-join both buckets into a `<role>:<name>` keyed dictionary.
    pub fn join(&self) -> NamedTensors {
        [ParamRole::Arg, ParamRole::Aux]
            .into_iter()
            .flat_map(|role| {
                self.bucket(role).iter().map(move |(name, tensor)| {
                    (format!("{role}{PARAM_KEY_SEPARATOR}{name}"), tensor.clone())
                })
            })
            .collect()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.join().save(path)
    }

    pub fn bucket(&self, role: ParamRole) -> &BTreeMap<String, TensorData> {
        match role {
            ParamRole::Arg => &self.arg,
            ParamRole::Aux => &self.aux,
        }
    }

    fn bucket_mut(&mut self, role: ParamRole) -> &mut BTreeMap<String, TensorData> {
        match role {
            ParamRole::Arg => &mut self.arg,
            ParamRole::Aux => &mut self.aux,
        }
    }

    /// Look a parameter up in its role bucket.
    ///
    /// A parameter stored under the other role is still missing, the
    /// error message just points at where it was found.
    pub fn require(&self, role: ParamRole, name: &str) -> Result<&TensorData> {
        if let Some(tensor) = self.bucket(role).get(name) {
            return Ok(tensor);
        }
        let other = match role {
            ParamRole::Arg => ParamRole::Aux,
            ParamRole::Aux => ParamRole::Arg,
        };
        let hint = if self.bucket(other).contains_key(name) {
            format!(" (it is stored as '{other}{PARAM_KEY_SEPARATOR}{name}')")
        } else {
            String::new()
        };
        Err(ExportError::not_found(format!(
            "parameter '{role}{PARAM_KEY_SEPARATOR}{name}' is missing{hint}"
        )))
    }

    pub fn len(&self) -> usize {
        self.arg.len() + self.aux.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split `arg:weight` into its role and tensor name.
pub fn parse_param_key(key: &str) -> Result<(ParamRole, &str)> {
    let (role, name) = key.split_once(PARAM_KEY_SEPARATOR).ok_or_else(|| {
        ExportError::format(format!(
            "parameter key '{key}' is not of the form <role>{PARAM_KEY_SEPARATOR}<name>"
        ))
    })?;
    if name.is_empty() {
        return Err(ExportError::format(format!("parameter key '{key}' has an empty name")));
    }
    let role = ParamRole::parse(role).ok_or_else(|| {
        ExportError::format(format!(
            "parameter key '{key}' has role '{role}', expected 'arg' or 'aux'"
        ))
    })?;
    Ok((role, name))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tensor_dict::f32_values;

    fn scalar(v: f32) -> TensorData {
        TensorData::new(vec![v], vec![1])
    }

    #[test]
    fn test_split_by_role() {
        let mut dict = NamedTensors::new();
        dict.insert("arg:weight1", scalar(1.0));
        dict.insert("aux:mean1", scalar(2.0));

        let params = ParamSet::split(dict).unwrap();
        assert_eq!(params.arg.keys().collect::<Vec<_>>(), vec!["weight1"]);
        assert_eq!(params.aux.keys().collect::<Vec<_>>(), vec!["mean1"]);
        assert_eq!(f32_values(&params.arg["weight1"]).unwrap(), vec![1.0]);
        assert_eq!(f32_values(&params.aux["mean1"]).unwrap(), vec![2.0]);
    }

    #[test]
    fn test_key_without_colon_is_format_error() {
        let mut dict = NamedTensors::new();
        dict.insert("weight1", scalar(1.0));
        assert!(matches!(ParamSet::split(dict), Err(ExportError::Format(_))));
    }

    #[test]
    fn test_unknown_role_is_format_error() {
        assert!(matches!(parse_param_key("grad:weight1"), Err(ExportError::Format(_))));
        assert!(matches!(parse_param_key("arg:"), Err(ExportError::Format(_))));
    }

    #[test]
    fn test_name_may_contain_colons() {
        let (role, name) = parse_param_key("aux:encoder:bn:mean").unwrap();
        assert_eq!(role, ParamRole::Aux);
        assert_eq!(name, "encoder:bn:mean");
    }

    #[test]
    fn test_save_and_load_keeps_roles() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.best");

        let mut params = ParamSet::default();
        params.arg.insert("w".to_string(), scalar(3.0));
        params.aux.insert("var".to_string(), scalar(4.0));
        params.save(&path).unwrap();

        let back = ParamSet::load(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert!(back.require(ParamRole::Aux, "var").is_ok());
    }

    #[test]
    fn test_wrong_role_lookup_is_not_found() {
        let mut params = ParamSet::default();
        params.aux.insert("w".to_string(), scalar(3.0));
        let err = params.require(ParamRole::Arg, "w").unwrap_err();
        assert!(matches!(err, ExportError::NotFound(_)));
        assert!(err.to_string().contains("aux:w"));
    }
}
