// json.rs - JSON parameter files

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::core::{ParameterSet, Value};

/// Load a JSON object as a parameter set; `null` members are left unset
pub fn load_json_parameters(path: &Path) -> Result<ParameterSet, String> {
    let file = File::open(path)
        .map_err(|e| format!("Failed to open parameter file {}: {}", path.display(), e))?;
    let object: BTreeMap<String, Option<Value>> = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| format!("Failed to parse JSON parameters in {}: {}", path.display(), e))?;
    Ok(collect(object))
}

pub fn parse_json_parameters(content: &str) -> Result<ParameterSet, String> {
    let object: BTreeMap<String, Option<Value>> = serde_json::from_str(content)
        .map_err(|e| format!("Failed to parse JSON parameters: {}", e))?;
    Ok(collect(object))
}

fn collect(object: BTreeMap<String, Option<Value>>) -> ParameterSet {
    let mut params = ParameterSet::new();
    for (name, value) in object {
        if let Some(value) = value {
            params.insert(&name, value);
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_members_are_unset() {
        let params = parse_json_parameters(
            r#"{"input_image": "t1.nii", "mask_image": null, "shrink_factor": 4, "convergence": [50, 50]}"#,
        )
        .unwrap();
        assert_eq!(params.len(), 3);
        assert!(!params.is_set("mask_image"));
        assert_eq!(params.get("convergence"), Some(&Value::from(vec![50, 50])));
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(parse_json_parameters("[1, 2, 3]").is_err());
        assert!(parse_json_parameters(r#"{"a": {"b": 1}}"#).is_err());
    }
}
