// src/config/validate.rs

use crate::config::model::ConfigFile;
use crate::dag::build_graph;
use crate::errors::{SimError, SimResult};

/// Run semantic validation against a loaded configuration.
///
/// This checks:
/// - there is at least one agent
/// - runtime constraints hold (`slots`, `max_splits`, `min_vector_size`
///   all >= 1)
/// - the model builds: no duplicate names, no dangling variable/message
///   references, known variable types
/// - the dependency graph of the model is acyclic
pub fn validate_config(cfg: &ConfigFile) -> SimResult<()> {
    ensure_has_agents(cfg)?;
    // Surfaces `InvalidArgument` for runtime constraint violations.
    cfg.exec_options(None)?;
    // Surfaces `ModelValidation` for bad models and `DependencyCycle` for
    // cyclic state machines, before any worker is spawned.
    let model = cfg.to_model()?;
    build_graph(&model)?;
    Ok(())
}

fn ensure_has_agents(cfg: &ConfigFile) -> SimResult<()> {
    if cfg.agent.is_empty() {
        return Err(SimError::ModelValidation(
            "config must contain at least one [agent.<name>] section".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> ConfigFile {
        toml::from_str(toml).expect("test config parses")
    }

    #[test]
    fn minimal_config_validates() {
        let cfg = parse(
            r#"
            [agent.A]
            [[agent.A.function]]
            name = "f"
            current_state = "s"
            next_state = "t"
            "#,
        );
        validate_config(&cfg).unwrap();
    }

    #[test]
    fn empty_config_is_rejected() {
        let cfg = parse("");
        assert!(matches!(
            validate_config(&cfg),
            Err(SimError::ModelValidation(_))
        ));
    }

    #[test]
    fn zero_slots_is_invalid_argument() {
        let cfg = parse(
            r#"
            [runtime]
            slots = 0

            [agent.A]
            [[agent.A.function]]
            name = "f"
            current_state = "s"
            next_state = "t"
            "#,
        );
        assert!(matches!(
            validate_config(&cfg),
            Err(SimError::InvalidArgument(_))
        ));
    }

    #[test]
    fn cyclic_state_machine_is_rejected() {
        let cfg = parse(
            r#"
            [agent.A]
            [[agent.A.function]]
            name = "f1"
            current_state = "s"
            next_state = "t"

            [[agent.A.function]]
            name = "f2"
            current_state = "t"
            next_state = "s"
            "#,
        );
        assert!(matches!(
            validate_config(&cfg),
            Err(SimError::DependencyCycle { .. })
        ));
    }

    #[test]
    fn unknown_variable_type_is_rejected() {
        let cfg = parse(
            r#"
            [agent.A]
            [[agent.A.variable]]
            name = "x"
            type = "quaternion"

            [[agent.A.function]]
            name = "f"
            current_state = "s"
            next_state = "t"
            "#,
        );
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("unknown type 'quaternion'"));
    }
}
