use thiserror::Error;

/// Errors raised while building, serializing or segmenting a [`Document`](crate::Document).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocError {
    /// Malformed fragment or a violated input precondition
    #[error("parse error at byte {position}: {message} (near `{context}`)")]
    Parse {
        message: String,
        position: usize,
        context: String,
    },

    /// Fragment rejected before parsing because of its size
    #[error("input of {size} bytes exceeds the limit of {limit} bytes")]
    InputTooLarge { size: usize, limit: usize },

    /// An item sequence that does not nest properly
    #[error("structure error: {0}")]
    Structure(String),

    /// A block whose tag stack never returned to empty
    #[error("segmentation error: {0}")]
    Segmentation(String),
}

impl DocError {
    /// Build a parse error carrying a short snippet of `input` around `position`.
    pub fn parse(message: impl Into<String>, input: &str, position: usize) -> Self {
        DocError::Parse {
            message: message.into(),
            position,
            context: snippet(input, position),
        }
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(self, DocError::Parse { .. } | DocError::InputTooLarge { .. })
    }
}

/// Result type for document operations
pub type DocResult<T> = Result<T, DocError>;

const SNIPPET_RADIUS: usize = 24;

fn snippet(input: &str, position: usize) -> String {
    let mut start = position.saturating_sub(SNIPPET_RADIUS).min(input.len());
    while !input.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (position + SNIPPET_RADIUS).min(input.len());
    while !input.is_char_boundary(end) {
        end += 1;
    }
    input[start..end].replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_context_is_clamped() {
        let err = DocError::parse("bad", "<p>short</p>", 100);
        match err {
            DocError::Parse { context, position, .. } => {
                assert_eq!(position, 100);
                assert_eq!(context, "");
            }
            _ => panic!("Expected parse error"),
        }
    }

    #[test]
    fn test_parse_error_context_respects_char_boundaries() {
        let input = "<p>".to_string() + &"é".repeat(40) + "</p>";
        let err = DocError::parse("bad", &input, 30);
        assert!(err.to_string().contains("parse error at byte 30"));
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_input_too_large_message() {
        let err = DocError::InputTooLarge { size: 10, limit: 5 };
        assert_eq!(
            err.to_string(),
            "input of 10 bytes exceeds the limit of 5 bytes"
        );
        assert!(err.is_parse_error());
    }
}
