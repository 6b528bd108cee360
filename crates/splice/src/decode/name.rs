use thiserror::Error;

/// Longest accepted function name, in characters.
pub const MAX_NAME_LENGTH: usize = 64;

/// Reasons a detected call name is rejected.
///
/// The validator is the single gate between incidentally call-shaped JSON
/// and a real tool call, so rejections are cheap and final: the candidate
/// is dropped, never surfaced as an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NameError {
    #[error("name is empty")]
    Empty,

    #[error("name is {0} characters, longer than {MAX_NAME_LENGTH}")]
    TooLong(usize),

    #[error("name has leading or trailing whitespace")]
    Untrimmed,

    #[error("name contains more than one period")]
    MultiplePeriods,

    #[error("name starts or ends with a period")]
    BoundaryPeriod,

    #[error("name contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Check a detected call name against the identifier rules: non-empty,
/// trimmed, at most [`MAX_NAME_LENGTH`] characters, at most one interior
/// period, and otherwise ASCII letters, digits, underscore, or hyphen.
///
/// A space is an invalid character, which is what keeps a person record
/// like `{"name": "John Smith"}` from becoming a tool call.
pub fn validate(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }

    if name.trim() != name {
        return Err(NameError::Untrimmed);
    }

    let length = name.chars().count();
    if length > MAX_NAME_LENGTH {
        return Err(NameError::TooLong(length));
    }

    let mut periods = 0usize;
    for (index, ch) in name.chars().enumerate() {
        match ch {
            '.' => {
                if index == 0 || index == length - 1 {
                    return Err(NameError::BoundaryPeriod);
                }
                periods += 1;
                if periods > 1 {
                    return Err(NameError::MultiplePeriods);
                }
            }
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' => {}
            other => return Err(NameError::InvalidCharacter(other)),
        }
    }

    Ok(())
}
