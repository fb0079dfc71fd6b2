//! Configuration system

pub use serde::{Deserialize, Serialize};

/// Configuration trait
///
/// Implemented by plain-data config types to get RON file loading and
/// saving for free.
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = ron::ser::to_string_pretty(self, Default::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::scene::TransformRecipe;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct DemoConfig {
        recipe: TransformRecipe,
        label: String,
    }

    impl Config for DemoConfig {}

    #[test]
    fn test_recipe_survives_ron_roundtrip() {
        let config = DemoConfig {
            recipe: TransformRecipe::from_position(Vec3::new(1.0, 2.0, 3.0)),
            label: "planet".to_string(),
        };

        let text = ron::ser::to_string_pretty(&config, Default::default()).unwrap();
        let parsed: DemoConfig = ron::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
