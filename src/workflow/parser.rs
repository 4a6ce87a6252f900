//! Workflow Parser
//!
//! Handles loading workflow definitions from YAML files and trigger payloads
//! from JSON files. Parsing always ends in validation, so a definition
//! obtained through this module is ready to execute.

use std::error::Error;
use std::fs;

use log::{debug, info};
use serde_json::Value;

use super::model::WorkflowDefinition;
use super::validator::validate_definition;

/// Loads a workflow definition from a YAML file.
///
/// This function:
/// 1. Reads and parses the YAML file
/// 2. Validates the definition structure
///
/// # Arguments
///
/// * `path` - Path to the workflow YAML file
///
/// # Returns
///
/// * `Ok(WorkflowDefinition)` - Successfully loaded and validated definition
/// * `Err` - Read, parse, or validation error
///
/// # Example
///
/// ```rust,no_run
/// use flowrunner::workflow::load_definition;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let definition = load_definition("onboarding.yaml")?;
///     println!("Loaded {} steps", definition.steps.len());
///     Ok(())
/// }
/// ```
pub fn load_definition(path: &str) -> Result<WorkflowDefinition, Box<dyn Error>> {
    info!("Loading workflow definition from: {}", path);

    let yaml_content = fs::read_to_string(path).map_err(|e| {
        format!(
            "Failed to read workflow file '{}': {}. Check that the file exists and is readable.",
            path, e
        )
    })?;

    debug!("YAML content loaded ({} bytes)", yaml_content.len());

    let definition: WorkflowDefinition = serde_yaml::from_str(&yaml_content).map_err(|e| {
        format!(
            "Failed to parse workflow YAML: {}. Check the file format.",
            e
        )
    })?;

    validate_definition(&definition)?;

    info!(
        "Workflow '{}' loaded: {} steps, {} variables",
        definition.metadata.name,
        definition.steps.len(),
        definition.variables.len()
    );

    Ok(definition)
}

/// Loads a trigger payload from a JSON file.
///
/// An absent or empty payload is represented as an empty JSON object.
pub fn load_trigger(path: &str) -> Result<Value, Box<dyn Error>> {
    info!("Loading trigger payload from: {}", path);

    let json_content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read trigger file '{}': {}", path, e))?;

    if json_content.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }

    let trigger: Value = serde_json::from_str(&json_content)
        .map_err(|e| format!("Failed to parse trigger JSON: {}", e))?;

    Ok(trigger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID_YAML: &str = r#"
metadata:
  name: onboarding
  version: "1.0"
  description: test workflow
variables:
  who: ${trigger.employee.name}
steps:
  - id: create
    action: create
  - id: notify
    action: notify
"#;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_definition() {
        let file = write_temp(VALID_YAML);
        let definition = load_definition(file.path().to_str().unwrap()).unwrap();

        assert_eq!(definition.metadata.name, "onboarding");
        assert_eq!(definition.steps.len(), 2);
        assert_eq!(definition.variables.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_definition("/nonexistent/workflow.yaml");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to read"));
    }

    #[test]
    fn test_load_malformed_yaml() {
        let file = write_temp("metadata: [not: valid");
        let result = load_definition(file.path().to_str().unwrap());

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("parse"));
    }

    #[test]
    fn test_load_invalid_definition() {
        let file = write_temp("metadata:\n  name: broken\nsteps: []\n");
        let result = load_definition(file.path().to_str().unwrap());

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("at least one step"));
    }

    #[test]
    fn test_load_trigger_json() {
        let file = write_temp(r#"{"employee": {"name": "Ada"}}"#);
        let trigger = load_trigger(file.path().to_str().unwrap()).unwrap();

        assert_eq!(trigger["employee"]["name"], "Ada");
    }

    #[test]
    fn test_load_empty_trigger_is_object() {
        let file = write_temp("  \n");
        let trigger = load_trigger(file.path().to_str().unwrap()).unwrap();

        assert!(trigger.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_load_malformed_trigger() {
        let file = write_temp("{not json");
        assert!(load_trigger(file.path().to_str().unwrap()).is_err());
    }
}
