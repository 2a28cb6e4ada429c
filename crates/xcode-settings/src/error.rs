//! Parse errors.

/// Fatal conditions detected in xcodebuild output.
///
/// The two variants are deliberately distinct: a tool error means xcodebuild
/// ran and rejected the request (missing project, bad scheme), while empty
/// output means nothing usable came back at all (tool missing, broken
/// environment).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// xcodebuild printed an `xcodebuild: error: ...` line.
    #[error("xcodebuild: error: {0}")]
    ToolError(String),

    /// The output contained no non-whitespace characters.
    #[error("xcodebuild produced no output")]
    EmptyOutput,
}
