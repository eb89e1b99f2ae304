use serde::{Deserialize, Serialize};

use crate::error::{AslError, AslResult};

/// Settings that shape the emitted GLSL text.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GlslConfig {
    /// Used when a shader class carries no `Version` attribute.
    pub default_version: String,
    /// Appended after the extensions a class declares itself.
    pub extensions: Vec<String>,
    pub indent: String,
}

impl Default for GlslConfig {
    fn default() -> Self {
        Self {
            default_version: "430".to_string(),
            extensions: Vec::new(),
            indent: "    ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Force debug trace comments for every shader unit.
    pub debug: bool,
    /// Vertex inputs and fragment outputs must carry a `location` layout.
    pub require_locations: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            debug: false,
            require_locations: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AslConfig {
    #[serde(default)]
    pub glsl: GlslConfig,
    #[serde(default)]
    pub compile: CompileConfig,
}

impl AslConfig {
    pub fn load_from_file(path: &std::path::Path) -> AslResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> AslResult<Self> {
        toml::from_str(contents).map_err(|e| AslError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> AslResult<String> {
        toml::to_string_pretty(self).map_err(|e| AslError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = AslConfig::from_toml_str("[compile]\ndebug = true\n")
            .expect("config should parse");
        assert!(config.compile.debug);
        assert!(config.compile.require_locations);
        assert_eq!(config.glsl.default_version, "430");
        assert_eq!(config.glsl.indent, "    ");
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let mut config = AslConfig::default();
        config.glsl.extensions.push("GL_ARB_gpu_shader5".to_string());
        let text = config.to_toml_string().unwrap();
        let back = AslConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.glsl.extensions, vec!["GL_ARB_gpu_shader5".to_string()]);
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let err = AslConfig::from_toml_str("[glsl]\ndefault_version = 3\n").unwrap_err();
        assert!(matches!(err, AslError::Config(_)));
    }
}
