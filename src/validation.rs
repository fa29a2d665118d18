use crate::error::ApiError;

pub fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let len = value.len();
    if len < min || len > max {
        return Err(ApiError::BadRequest(format!(
            "{field} must be between {min} and {max} characters (got {len})"
        )));
    }
    Ok(())
}

/// Database / RDI instance display names: free text, bounded.
pub fn check_display_name(value: &str) -> Result<(), ApiError> {
    check_length("name", value, 1, 500)
}

pub fn check_host(value: &str) -> Result<(), ApiError> {
    check_length("host", value, 1, 255)?;
    if value.chars().any(char::is_whitespace) {
        return Err(ApiError::BadRequest("host must not contain whitespace".into()));
    }
    Ok(())
}

pub fn check_port(value: i64) -> Result<(), ApiError> {
    if !(1..=65535).contains(&value) {
        return Err(ApiError::BadRequest("port must be between 1 and 65535".into()));
    }
    Ok(())
}

/// Logical database index (SELECT target).
pub fn check_db_index(value: i64) -> Result<(), ApiError> {
    if !(0..=15).contains(&value) {
        return Err(ApiError::BadRequest("db must be between 0 and 15".into()));
    }
    Ok(())
}

pub fn check_key_name(value: &str) -> Result<(), ApiError> {
    if value.is_empty() {
        return Err(ApiError::BadRequest("key name must not be empty".into()));
    }
    if value.len() > 1024 * 1024 {
        return Err(ApiError::BadRequest("key name too long".into()));
    }
    Ok(())
}

pub const COMPRESSORS: &[&str] = &["NONE", "LZ4", "GZIP", "ZSTD", "SNAPPY"];

pub fn check_compressor(value: &str) -> Result<(), ApiError> {
    if !COMPRESSORS.contains(&value) {
        return Err(ApiError::BadRequest(format!(
            "compressor must be one of {COMPRESSORS:?}"
        )));
    }
    Ok(())
}

pub fn check_certificate_pem(field: &str, value: &str) -> Result<(), ApiError> {
    check_length(field, value, 1, 64 * 1024)?;
    if !value.contains("-----BEGIN") {
        return Err(ApiError::BadRequest(format!(
            "{field} must be a PEM-encoded certificate"
        )));
    }
    Ok(())
}

pub fn check_url(value: &str) -> Result<(), ApiError> {
    check_length("url", value, 1, 2048)?;
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ApiError::BadRequest(
            "url must use http or https scheme".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn valid_display_name() {
        assert!(check_display_name("My local redis (copy)").is_ok());
    }

    #[test]
    fn display_name_empty_rejected() {
        let err = check_display_name("").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref msg) if msg.contains("name")));
    }

    #[test]
    fn display_name_at_max_length() {
        assert!(check_display_name(&"a".repeat(500)).is_ok());
    }

    #[test]
    fn display_name_over_max_length() {
        assert!(check_display_name(&"a".repeat(501)).is_err());
    }

    #[rstest]
    #[case("localhost", true)]
    #[case("redis-12345.c1.eu-west-1.ec2.cloud.redislabs.com", true)]
    #[case("192.168.0.10", true)]
    #[case("::1", true)]
    #[case("has space", false)]
    #[case("", false)]
    fn host_validation(#[case] host: &str, #[case] expected: bool) {
        assert_eq!(check_host(host).is_ok(), expected, "host: {host:?}");
    }

    #[rstest]
    #[case(1, true)]
    #[case(6379, true)]
    #[case(65535, true)]
    #[case(0, false)]
    #[case(65536, false)]
    #[case(-1, false)]
    fn port_validation(#[case] port: i64, #[case] expected: bool) {
        assert_eq!(check_port(port).is_ok(), expected, "port: {port}");
    }

    #[rstest]
    #[case(0, true)]
    #[case(15, true)]
    #[case(16, false)]
    #[case(-1, false)]
    fn db_index_validation(#[case] db: i64, #[case] expected: bool) {
        assert_eq!(check_db_index(db).is_ok(), expected, "db: {db}");
    }

    #[test]
    fn key_name_empty_rejected() {
        assert!(check_key_name("").is_err());
    }

    #[test]
    fn key_name_binaryish_ok() {
        assert!(check_key_name("weird\u{1}key").is_ok());
    }

    #[rstest]
    #[case("NONE", true)]
    #[case("LZ4", true)]
    #[case("SNAPPY", true)]
    #[case("lz4", false)]
    #[case("BROTLI", false)]
    fn compressor_validation(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(check_compressor(value).is_ok(), expected);
    }

    #[test]
    fn certificate_requires_pem_marker() {
        assert!(check_certificate_pem("certificate", "not a cert").is_err());
        assert!(
            check_certificate_pem(
                "certificate",
                "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----"
            )
            .is_ok()
        );
    }

    #[test]
    fn url_scheme_enforced() {
        assert!(check_url("https://rdi.example.com").is_ok());
        assert!(check_url("ftp://rdi.example.com").is_err());
    }
}
