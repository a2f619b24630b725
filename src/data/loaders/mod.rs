// mod.rs - Parameter file loaders and command-line overrides

pub mod json;
pub mod toml;

use std::path::Path;

use crate::core::{ParameterSet, Value};

/// Load a parameter file, choosing the format from its extension
pub fn load_parameters(path: &Path) -> Result<ParameterSet, String> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "toml" => toml::load_toml_parameters(path),
        "json" => json::load_json_parameters(path),
        other => Err(format!(
            "Unsupported parameter file extension '{}' for {} (expected .toml or .json)",
            other,
            path.display()
        )),
    }
}

/// Parse a `key=value` override.
///
/// The value is read as a TOML literal (`3`, `0.25`, `true`, `[8,4,2,1]`, `"text"`);
/// anything that does not parse is taken as plain text.
pub fn parse_assignment(assignment: &str) -> Result<(String, Value), String> {
    let (key, raw) = assignment
        .split_once('=')
        .ok_or_else(|| format!("Invalid override '{}': expected key=value", assignment))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Invalid override '{}': empty key", assignment));
    }

    let raw = raw.trim();
    let value = toml::parse_literal(raw).unwrap_or_else(|| Value::Text(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Apply `key=value` overrides on top of a parameter set
pub fn apply_assignments(
    mut params: ParameterSet,
    assignments: &[String],
) -> Result<ParameterSet, String> {
    for assignment in assignments {
        let (key, value) = parse_assignment(assignment)?;
        params.insert(&key, value);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_parse_assignment_literals() {
        assert_eq!(
            parse_assignment("dimension=3").unwrap(),
            ("dimension".to_string(), Value::Int(3))
        );
        assert_eq!(parse_assignment("weight = 0.25").unwrap().1, Value::Float(0.25));
        assert_eq!(parse_assignment("verbose=true").unwrap().1, Value::Bool(true));
        assert_eq!(parse_assignment("shrink=[8,4,2,1]").unwrap().1, Value::from(vec![8, 4, 2, 1]));
        assert_eq!(parse_assignment("op=\"+\"").unwrap().1, Value::from("+"));
        assert_eq!(parse_assignment("input=moving.nii").unwrap().1, Value::from("moving.nii"));
        assert_eq!(parse_assignment("expr=a=b").unwrap().1, Value::from("a=b"));
    }

    #[test]
    fn test_parse_assignment_errors() {
        assert!(parse_assignment("dimension").is_err());
        assert!(parse_assignment("=3").is_err());
    }

    #[test]
    fn test_apply_assignments_override() {
        let params = ParameterSet::new().with("dimension", 2);
        let params = apply_assignments(
            params,
            &["dimension=3".to_string(), "op1=a.nii".to_string()],
        ).unwrap();
        assert_eq!(params.get("dimension"), Some(&Value::Int(3)));
        assert_eq!(params.get("op1"), Some(&Value::from("a.nii")));
    }

    #[test]
    fn test_load_by_extension() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, r#"{{"dimension": 3, "first_input": "a.nii"}}"#).unwrap();
        let params = load_parameters(file.path()).unwrap();
        assert_eq!(params.get("dimension"), Some(&Value::Int(3)));

        let mut file = Builder::new().suffix(".TOML").tempfile().unwrap();
        writeln!(file, "dimension = 2").unwrap();
        let params = load_parameters(file.path()).unwrap();
        assert_eq!(params.get("dimension"), Some(&Value::Int(2)));

        let file = Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = load_parameters(file.path()).unwrap_err();
        assert!(err.contains("Unsupported parameter file extension"));
    }
}
