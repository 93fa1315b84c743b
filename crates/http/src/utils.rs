/// Returns early with `$error` unless `$predicate` holds.
///
/// ```text
/// ensure!(line_len <= MAX_LINE_BYTES, ParseError::invalid_body("chunk size line too long"));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
