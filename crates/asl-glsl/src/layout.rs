//! Closed per-stage layout vocabulary.

use asl_core::{AslError, AslResult, Stage};

use crate::model::Layout;

/// What a layout qualifier is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutRole {
    Input,
    Output,
    Uniform,
    UniformBlock,
    InputBlock,
    OutputBlock,
}

/// Keys that only make sense on a redeclared `gl_FragCoord`.
const FRAG_COORD_KEYS: &[&str] = &["origin_upper_left", "pixel_center_integer"];

/// Keys that take a `= value`; every other key is a bare flag.
const VALUED_KEYS: &[&str] = &["location", "index", "component", "binding", "stream"];

/// Legal layout keys for a role in a stage.
pub fn legal_keys(stage: Stage, role: LayoutRole) -> &'static [&'static str] {
    match (stage, role) {
        (Stage::Vertex, LayoutRole::Input) => &["location", "component"],
        (Stage::Fragment, LayoutRole::Input) => &[
            "location",
            "component",
            "origin_upper_left",
            "pixel_center_integer",
        ],
        (Stage::Fragment, LayoutRole::Output) => &["location", "index", "component"],
        (Stage::Geometry, LayoutRole::Output) => &["location", "component", "stream"],
        (_, LayoutRole::Input) | (_, LayoutRole::Output) => &["location", "component"],
        (_, LayoutRole::Uniform) => &["location", "binding"],
        (_, LayoutRole::UniformBlock) => &[
            "std140",
            "shared",
            "packed",
            "row_major",
            "column_major",
            "binding",
        ],
        (_, LayoutRole::InputBlock) | (_, LayoutRole::OutputBlock) => &["location"],
    }
}

/// `OriginUpperLeft` → `origin_upper_left`; already snake-cased keys pass through.
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

/// Check every parameter of `layout` against the table.
///
/// `owner` names the declaration in error messages; `frag_coord` is set for a
/// redeclared built-in `gl_FragCoord`.
pub fn validate(
    stage: Stage,
    role: LayoutRole,
    layout: &Layout,
    owner: &str,
    frag_coord: bool,
) -> AslResult<()> {
    let legal = legal_keys(stage, role);
    for param in &layout.params {
        let key = param.key.as_str();
        if !legal.contains(&key) {
            return Err(AslError::Layout(format!(
                "'{}' is not a legal layout parameter for {} ({} stage); expected one of: {}",
                key,
                owner,
                stage,
                legal.join(", ")
            )));
        }
        if FRAG_COORD_KEYS.contains(&key) && !frag_coord {
            return Err(AslError::Layout(format!(
                "'{}' is only legal on a redeclared gl_FragCoord, not on {}",
                key, owner
            )));
        }
        let valued = VALUED_KEYS.contains(&key);
        match (&param.value, valued) {
            (None, true) => {
                return Err(AslError::Layout(format!(
                    "layout parameter '{}' on {} requires a value",
                    key, owner
                )))
            }
            (Some(_), false) => {
                return Err(AslError::Layout(format!(
                    "layout parameter '{}' on {} does not take a value",
                    key, owner
                )))
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(params: &[(&str, Option<&str>)]) -> Layout {
        let mut layout = Layout::default();
        for (key, value) in params {
            layout.push(*key, value.map(str::to_string));
        }
        layout
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("OriginUpperLeft"), "origin_upper_left");
        assert_eq!(normalize_key("location"), "location");
        assert_eq!(normalize_key("Std140"), "std140");
        assert_eq!(normalize_key("RowMajor"), "row_major");
    }

    #[test]
    fn test_vertex_input_location_is_legal() {
        let l = layout(&[("location", Some("0"))]);
        assert!(validate(Stage::Vertex, LayoutRole::Input, &l, "position", false).is_ok());
    }

    #[test]
    fn test_block_mode_only_on_uniform_blocks() {
        let l = layout(&[("std140", None)]);
        assert!(validate(Stage::Vertex, LayoutRole::UniformBlock, &l, "Camera", false).is_ok());
        let err = validate(Stage::Vertex, LayoutRole::Input, &l, "position", false).unwrap_err();
        assert!(matches!(err, AslError::Layout(_)));
    }

    #[test]
    fn test_origin_requires_frag_coord() {
        let l = layout(&[("origin_upper_left", None)]);
        assert!(validate(Stage::Fragment, LayoutRole::Input, &l, "gl_FragCoord", true).is_ok());
        assert!(validate(Stage::Fragment, LayoutRole::Input, &l, "uv", false).is_err());
    }

    #[test]
    fn test_stream_only_on_geometry_outputs() {
        let l = layout(&[("stream", Some("1"))]);
        assert!(validate(Stage::Geometry, LayoutRole::Output, &l, "color", false).is_ok());
        assert!(validate(Stage::Vertex, LayoutRole::Output, &l, "color", false).is_err());
    }

    #[test]
    fn test_value_arity() {
        let missing = layout(&[("location", None)]);
        assert!(validate(Stage::Vertex, LayoutRole::Input, &missing, "p", false).is_err());
        let extra = layout(&[("std140", Some("1"))]);
        assert!(validate(Stage::Vertex, LayoutRole::UniformBlock, &extra, "B", false).is_err());
    }
}
