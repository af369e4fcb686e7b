//! Request modes and the canned quick prompts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiMode {
    /// Free-form chat.
    #[default]
    General,
    Explain,
    Refactor,
    Fix,
    ConvertTsx,
}

impl AiMode {
    pub const QUICK: [AiMode; 4] = [
        AiMode::Explain,
        AiMode::Refactor,
        AiMode::Fix,
        AiMode::ConvertTsx,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AiMode::General => "general",
            AiMode::Explain => "explain",
            AiMode::Refactor => "refactor",
            AiMode::Fix => "fix",
            AiMode::ConvertTsx => "convert_tsx",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "general" => Some(AiMode::General),
            "explain" => Some(AiMode::Explain),
            "refactor" => Some(AiMode::Refactor),
            "fix" => Some(AiMode::Fix),
            "convert_tsx" => Some(AiMode::ConvertTsx),
            _ => None,
        }
    }

    /// Canned prompt sent by the quick action; `None` for free-form chat.
    pub fn quick_prompt(self) -> Option<&'static str> {
        match self {
            AiMode::General => None,
            AiMode::Explain => Some("Explique ce composant et sa logique."),
            AiMode::Refactor => Some(
                "Refactorise le composant pour améliorer lisibilité et performance. Garde la même API.",
            ),
            AiMode::Fix => Some("Corrige les bugs probables et ajoute une gestion d’erreurs robuste."),
            AiMode::ConvertTsx => Some("Convertis en TSX avec des types raisonnables."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_modes_have_prompts() {
        for mode in AiMode::QUICK {
            assert!(mode.quick_prompt().is_some(), "{mode:?}");
            assert_eq!(AiMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(AiMode::General.quick_prompt(), None);
    }

    #[test]
    fn serializes_as_wire_names() {
        assert_eq!(
            serde_json::to_value(AiMode::ConvertTsx).unwrap(),
            serde_json::json!("convert_tsx")
        );
    }
}
