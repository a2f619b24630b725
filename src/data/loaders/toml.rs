// toml.rs - TOML parameter files and TOML literal parsing

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::core::{ParameterSet, Value};

/// Load a top-level TOML table as a parameter set
pub fn load_toml_parameters(path: &Path) -> Result<ParameterSet, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read parameter file {}: {}", path.display(), e))?;
    parse_toml_parameters(&content).map_err(|e| format!("{}: {}", path.display(), e))
}

pub fn parse_toml_parameters(content: &str) -> Result<ParameterSet, String> {
    let table: BTreeMap<String, Value> =
        toml::from_str(content).map_err(|e| format!("Failed to parse TOML parameters: {}", e))?;

    let mut params = ParameterSet::new();
    for (name, value) in table {
        params.insert(&name, value);
    }
    Ok(params)
}

/// Parse a single TOML value such as `0.25` or `[8,4,2,1]`
pub fn parse_literal(raw: &str) -> Option<Value> {
    #[derive(serde::Deserialize)]
    struct Literal {
        value: Value,
    }

    toml::from_str::<Literal>(&format!("value = {}", raw))
        .ok()
        .map(|literal| literal.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_toml_parameters() {
        let params = parse_toml_parameters(
            r#"
            dimension = 3
            fixed_image = "fixed.nii"
            shrink_factors = [[8, 4], [2, 1]]
            use_histogram_matching = true
            sampling_percentage = 0.25
            "#,
        )
        .unwrap();
        assert_eq!(params.len(), 5);
        assert_eq!(params.get("dimension"), Some(&Value::Int(3)));
        assert_eq!(params.get("sampling_percentage"), Some(&Value::Float(0.25)));
        assert_eq!(
            params.get("shrink_factors"),
            Some(&Value::List(vec![Value::from(vec![8, 4]), Value::from(vec![2, 1])]))
        );
    }

    #[test]
    fn test_nested_table_is_rejected() {
        assert!(parse_toml_parameters("[section]\nkey = 1").is_err());
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(parse_literal("1e-6"), Some(Value::Float(1e-6)));
        assert_eq!(parse_literal("false"), Some(Value::Bool(false)));
        assert_eq!(parse_literal("moving.nii"), None);
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "op1 = \"a.nii\"\noperation = \"m\"").unwrap();
        let params = load_toml_parameters(file.path()).unwrap();
        assert_eq!(params.get("operation"), Some(&Value::from("m")));

        let missing = file.path().with_extension("missing");
        assert!(load_toml_parameters(&missing).unwrap_err().contains("Failed to read"));
    }
}
