use rewired_config::{ConfigError, OriginPolicy, Settings};

#[test]
fn wildcard_admits_any_origin() {
    let policy = OriginPolicy::parse("*").expect("parse");
    assert_eq!(policy, OriginPolicy::Any);
    assert!(policy.allows("http://a.example"));
    assert!(policy.allows(""));
}

#[test]
fn single_origin_requires_exact_match() {
    let policy = OriginPolicy::parse("a.example").expect("parse");
    assert!(policy.allows("a.example"));
    assert!(!policy.allows("b.example"));
    assert!(!policy.allows("a.example.evil"));
    assert!(!policy.allows(""));
}

#[test]
fn origin_list_admits_members_only() {
    let policy = OriginPolicy::parse("a.example,b.example").expect("parse");
    assert!(policy.allows("a.example"));
    assert!(policy.allows("b.example"));
    assert!(!policy.allows("c.example"));
}

#[test]
fn empty_origins_are_rejected() {
    let err = OriginPolicy::parse("").expect_err("empty value");
    assert!(matches!(err, ConfigError::EmptyOrigins));
}

#[test]
fn list_with_empty_entry_is_rejected() {
    for value in ["a.example,", ",a.example", "a.example,,b.example"] {
        let err = OriginPolicy::parse(value).expect_err("empty entry");
        assert!(matches!(err, ConfigError::EmptyOriginEntry(_)));
    }
}

#[test]
fn settings_carry_listen_ports() {
    let settings = Settings::new(42069, 80, OriginPolicy::Any);
    assert_eq!(settings.tcp_port, 42069);
    assert_eq!(settings.ws_port, 80);
    assert!(settings.database_url.starts_with("sqlite://"));
}
