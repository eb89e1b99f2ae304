//! GLSL built-in functions.
//!
//! Calls to these are emitted by name and never recorded as dependencies.

/// The verbatim text passthrough: `Glsl("...")` emits its argument unchanged.
pub const PASSTHROUGH: &str = "Glsl";

/// How an intrinsic's result type relates to its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnRule {
    /// Same type as the first argument (`abs`, `mix`, `normalize`, ...).
    FirstArg,
    /// Scalar of the first argument's component kind (`dot`, `length`).
    ScalarOfFirst,
    Fixed(&'static str),
    Unknown,
}

const SAME_AS_FIRST: &[&str] = &[
    "radians", "degrees", "sin", "cos", "tan", "asin", "acos", "atan", "sinh", "cosh", "tanh",
    "asinh", "acosh", "atanh", "pow", "exp", "log", "exp2", "log2", "sqrt", "inversesqrt", "abs",
    "sign", "floor", "trunc", "round", "roundEven", "ceil", "fract", "mod", "modf", "min", "max",
    "clamp", "mix", "step", "smoothstep", "fma", "frexp", "ldexp", "normalize", "faceforward",
    "reflect", "refract", "cross", "matrixCompMult", "transpose", "inverse", "bitfieldExtract",
    "bitfieldInsert", "bitfieldReverse", "dFdx", "dFdy", "dFdxFine", "dFdyFine", "dFdxCoarse",
    "dFdyCoarse", "fwidth", "fwidthFine", "fwidthCoarse", "interpolateAtCentroid",
    "interpolateAtSample", "interpolateAtOffset",
];

const SCALAR_OF_FIRST: &[&str] = &["length", "distance", "dot", "determinant"];

const OTHER: &[&str] = &[
    "isnan", "isinf", "floatBitsToInt", "floatBitsToUint", "intBitsToFloat", "uintBitsToFloat",
    "packUnorm2x16", "packSnorm2x16", "packUnorm4x8", "packSnorm4x8", "unpackUnorm2x16",
    "unpackSnorm2x16", "unpackUnorm4x8", "unpackSnorm4x8", "packHalf2x16", "unpackHalf2x16",
    "packDouble2x32", "unpackDouble2x32", "outerProduct", "lessThan", "lessThanEqual",
    "greaterThan", "greaterThanEqual", "equal", "notEqual", "any", "all", "not", "uaddCarry",
    "usubBorrow", "umulExtended", "imulExtended", "bitCount", "findLSB", "findMSB",
    "textureSize", "textureQueryLod", "textureQueryLevels", "textureSamples", "texture",
    "textureProj", "textureLod", "textureOffset", "texelFetch", "texelFetchOffset",
    "textureProjOffset", "textureLodOffset", "textureProjLod", "textureProjLodOffset",
    "textureGrad", "textureGradOffset", "textureProjGrad", "textureProjGradOffset",
    "textureGather", "textureGatherOffset", "textureGatherOffsets", "texture1D", "texture2D",
    "texture3D", "textureCube", "shadow2D", "EmitVertex", "EndPrimitive", "EmitStreamVertex",
    "EndStreamPrimitive", "barrier", "memoryBarrier", "memoryBarrierAtomicCounter",
    "memoryBarrierBuffer", "memoryBarrierShared", "memoryBarrierImage", "groupMemoryBarrier",
    "imageLoad", "imageStore", "imageSize", "imageAtomicAdd", "imageAtomicMin", "imageAtomicMax",
    "imageAtomicAnd", "imageAtomicOr", "imageAtomicXor", "imageAtomicExchange",
    "imageAtomicCompSwap", "atomicAdd", "atomicMin", "atomicMax", "atomicAnd", "atomicOr",
    "atomicXor", "atomicExchange", "atomicCompSwap", "atomicCounter", "atomicCounterIncrement",
    "atomicCounterDecrement", "noise1", "noise2", "noise3", "noise4",
];

/// Whether `name` is a GLSL built-in function.
pub fn is_intrinsic(name: &str) -> bool {
    SAME_AS_FIRST.contains(&name) || SCALAR_OF_FIRST.contains(&name) || OTHER.contains(&name)
}

/// Result type rule used by modulus typing.
pub fn return_rule(name: &str) -> ReturnRule {
    if SAME_AS_FIRST.contains(&name) {
        ReturnRule::FirstArg
    } else if SCALAR_OF_FIRST.contains(&name) {
        ReturnRule::ScalarOfFirst
    } else if name.starts_with("texture") && !name.starts_with("textureSize") && !name.starts_with("textureQuery") {
        ReturnRule::Fixed("vec4")
    } else if matches!(name, "any" | "all" | "isnan" | "isinf") {
        ReturnRule::Fixed("bool")
    } else if matches!(name, "bitCount" | "findLSB" | "findMSB" | "textureQueryLevels" | "textureSamples") {
        ReturnRule::Fixed("int")
    } else {
        ReturnRule::Unknown
    }
}

/// Argument positions typed `int`/`ivecN` whatever the other arguments are.
pub fn integer_params(name: &str) -> &'static [usize] {
    match name {
        "ldexp" | "frexp" | "interpolateAtSample" | "textureSize" => &[1],
        "bitfieldExtract" => &[1, 2],
        "bitfieldInsert" => &[2, 3],
        "texelFetch" | "texelFetchOffset" | "textureGather" => &[2],
        "EmitStreamVertex" | "EndStreamPrimitive" => &[0],
        _ => &[],
    }
}
