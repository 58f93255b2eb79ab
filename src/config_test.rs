use super::*;

// =============================================================================
// env_bool: unique env var names avoid races with parallel tests.
// =============================================================================

#[test]
fn env_bool_true_variants() {
    for (i, val) in ["1", "true", "yes", "on"].iter().enumerate() {
        let key = format!("__HQ_TEST_EB_TRUE_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(true), "expected true for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_false_variants() {
    for (i, val) in ["0", "false", "no", "off"].iter().enumerate() {
        let key = format!("__HQ_TEST_EB_FALSE_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(false), "expected false for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_trims_and_ignores_case() {
    let key = "__HQ_TEST_EB_CASE__";
    unsafe { std::env::set_var(key, "  On ") };
    assert_eq!(env_bool(key), Some(true));
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_bool_garbage_is_none() {
    let key = "__HQ_TEST_EB_GARBAGE__";
    unsafe { std::env::set_var(key, "maybe") };
    assert_eq!(env_bool(key), None);
    unsafe { std::env::remove_var(key) };
    assert_eq!(env_bool("__HQ_TEST_EB_SURELY_UNSET__"), None);
}

// =============================================================================
// env_parse
// =============================================================================

#[test]
fn env_parse_reads_value() {
    let key = "__HQ_TEST_EP_VALUE__";
    unsafe { std::env::set_var(key, " 42 ") };
    assert_eq!(env_parse::<u32>(key, 7), 42);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_falls_back_on_bad_value() {
    let key = "__HQ_TEST_EP_BAD__";
    unsafe { std::env::set_var(key, "forty-two") };
    assert_eq!(env_parse::<u32>(key, 7), 7);
    unsafe { std::env::remove_var(key) };
    assert_eq!(env_parse::<u32>("__HQ_TEST_EP_UNSET__", 9), 9);
}

#[test]
fn env_path_uses_default_when_blank() {
    let key = "__HQ_TEST_PATH_BLANK__";
    unsafe { std::env::set_var(key, "   ") };
    assert_eq!(env_path(key, "website"), PathBuf::from("website"));
    unsafe { std::env::remove_var(key) };
}

// =============================================================================
// bcrypt cost
// =============================================================================

#[test]
fn bcrypt_cost_accepts_supported_range() {
    assert_eq!(parse_bcrypt_cost("4").unwrap(), 4);
    assert_eq!(parse_bcrypt_cost(" 12 ").unwrap(), 12);
    assert_eq!(parse_bcrypt_cost("31").unwrap(), 31);
}

#[test]
fn bcrypt_cost_rejects_out_of_range_and_garbage() {
    for raw in ["3", "32", "0", "-1", "twelve", ""] {
        match parse_bcrypt_cost(raw) {
            Err(ConfigError::Invalid { key, value }) => {
                assert_eq!(key, "BCRYPT_COST");
                assert_eq!(value, raw);
            }
            other => panic!("expected invalid BCRYPT_COST for {raw:?}, got {other:?}"),
        }
    }
}

#[test]
fn default_bcrypt_cost_is_in_range() {
    assert!(BCRYPT_COST_RANGE.contains(&DEFAULT_BCRYPT_COST));
}

// =============================================================================
// errors
// =============================================================================

#[test]
fn config_error_display() {
    assert_eq!(ConfigError::Missing("DATABASE_URL").to_string(), "DATABASE_URL required");
    let err = ConfigError::Invalid { key: "PORT", value: "abc".into() };
    assert_eq!(err.to_string(), "invalid PORT: abc");
}
