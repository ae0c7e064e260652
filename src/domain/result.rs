//! Result type alias for the uploader

use super::errors::UploaderError;

/// Result type alias for uploader operations
///
/// # Examples
///
/// ```
/// use phi_uploader::domain::result::Result;
/// use phi_uploader::domain::errors::UploaderError;
///
/// fn failing_function() -> Result<()> {
///     Err(UploaderError::Input("participants.tsv not found".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, UploaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }
}
