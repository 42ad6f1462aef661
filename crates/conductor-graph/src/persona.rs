//! Persona selection (§4.5 Plan step 1): chosen once per invocation and
//! held stable across every subsequent round.

use conductor_core::config::PersonaConfig;
use rand::seq::SliceRandom;

pub fn select_persona(cfg: &PersonaConfig, available: &[String]) -> Option<String> {
    if !cfg.enabled {
        return None;
    }
    if cfg.random_selection && !available.is_empty() {
        return available.choose(&mut rand::thread_rng()).cloned();
    }
    cfg.default_persona.clone().or_else(|| available.first().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_persona_config_yields_none() {
        let cfg = PersonaConfig {
            enabled: false,
            random_selection: true,
            default_persona: Some("ada".into()),
            persona_directory: None,
        };
        assert_eq!(select_persona(&cfg, &["ada".into()]), None);
    }

    #[test]
    fn non_random_enabled_config_uses_default() {
        let cfg = PersonaConfig {
            enabled: true,
            random_selection: false,
            default_persona: Some("ada".into()),
            persona_directory: None,
        };
        assert_eq!(select_persona(&cfg, &["ada".into(), "grace".into()]), Some("ada".into()));
    }

    #[test]
    fn random_selection_picks_from_available() {
        let cfg = PersonaConfig {
            enabled: true,
            random_selection: true,
            default_persona: None,
            persona_directory: None,
        };
        let available = vec!["ada".to_string()];
        assert_eq!(select_persona(&cfg, &available), Some("ada".to_string()));
    }
}
