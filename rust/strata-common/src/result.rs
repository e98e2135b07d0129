pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Fails with `InvalidArgument` unless the expression holds.
#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_arg(result, stringify!($name), stringify!($expr))?;
    }};
}

/// Fails with `InvalidFormat` unless the expression holds.
#[macro_export]
macro_rules! verify_data {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_data(result, stringify!($name), stringify!($expr))?;
    }};
}

#[inline]
pub fn verify_arg(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_arg(name, condition)
    }
}

#[inline]
pub fn verify_data(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_format(name, condition)
    }
}

/// Converts a `u64` row or element count into `usize`, failing with
/// `RowCountOverflow` when it does not fit the platform word.
#[inline]
pub fn to_usize(count: u64) -> Result<usize> {
    usize::try_from(count)
        .map_err(|_| crate::error::Error::row_count_overflow(count, usize::MAX as u64))
}

#[cold]
pub fn invalid_arg(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::InvalidArgument {
        name: name.to_string(),
        message: condition.to_string(),
    }
    .into())
}

#[cold]
pub fn invalid_format(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::InvalidFormat {
        element: name.to_string(),
        message: condition.to_string(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;

    fn check_positive(value: i64) -> crate::Result<i64> {
        verify_arg!(value, value > 0);
        Ok(value)
    }

    fn check_header(len: usize) -> crate::Result<()> {
        verify_data!(len, len >= 8);
        Ok(())
    }

    #[test]
    fn test_verify_arg() {
        assert_eq!(check_positive(3).unwrap(), 3);
        let err = check_positive(-1).unwrap_err();
        match err.kind() {
            ErrorKind::InvalidArgument { name, message } => {
                assert_eq!(name, "value");
                assert_eq!(message, "value > 0");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_verify_data() {
        check_header(16).unwrap();
        assert!(matches!(
            check_header(4).unwrap_err().kind(),
            ErrorKind::InvalidFormat { .. }
        ));
    }
}
