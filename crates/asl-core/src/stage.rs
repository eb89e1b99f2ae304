use std::fmt;

use serde::{Deserialize, Serialize};

/// A programmable pipeline stage. One shader class compiles to one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Vertex,
    Fragment,
    Geometry,
    TessControl,
    TessEvaluation,
}

impl Stage {
    /// Stage selected by an ASL base-class name.
    pub fn from_base_class(name: &str) -> Option<Self> {
        match name {
            "VertexShader" => Some(Stage::Vertex),
            "FragmentShader" => Some(Stage::Fragment),
            "GeometryShader" => Some(Stage::Geometry),
            "TessControlShader" => Some(Stage::TessControl),
            "TessEvaluationShader" => Some(Stage::TessEvaluation),
            _ => None,
        }
    }

    pub fn base_class(self) -> &'static str {
        match self {
            Stage::Vertex => "VertexShader",
            Stage::Fragment => "FragmentShader",
            Stage::Geometry => "GeometryShader",
            Stage::TessControl => "TessControlShader",
            Stage::TessEvaluation => "TessEvaluationShader",
        }
    }

    /// Conventional file extension for compiled sources of this stage.
    pub fn file_extension(self) -> &'static str {
        match self {
            Stage::Vertex => "vert",
            Stage::Fragment => "frag",
            Stage::Geometry => "geom",
            Stage::TessControl => "tesc",
            Stage::TessEvaluation => "tese",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
            Stage::Geometry => "geometry",
            Stage::TessControl => "tessellation-control",
            Stage::TessEvaluation => "tessellation-evaluation",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_class_round_trip() {
        for stage in [
            Stage::Vertex,
            Stage::Fragment,
            Stage::Geometry,
            Stage::TessControl,
            Stage::TessEvaluation,
        ] {
            assert_eq!(Stage::from_base_class(stage.base_class()), Some(stage));
        }
        assert_eq!(Stage::from_base_class("ComputeShader"), None);
    }
}
