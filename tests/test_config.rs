use portico::config::{Config, MiddlewarePolicy, SameSite};

// Environment variables are process-wide, so every `LISTEN` case runs in
// one test.
#[test]
fn test_config_listen_override() {
    unsafe {
        std::env::remove_var("PORTICO_CONFIG");
        std::env::remove_var("LISTEN");
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");

    unsafe {
        std::env::set_var("LISTEN", "0.0.0.0:3000");
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.server.listen_addr, "0.0.0.0:3000");

    unsafe {
        std::env::remove_var("LISTEN");
    }
}

#[test]
fn test_config_defaults() {
    let cfg = Config::default();

    assert_eq!(cfg.server.max_body_bytes, 8 * 1024 * 1024);
    assert_eq!(cfg.static_files.index, "index.html");
    assert!(cfg.static_files.cache.enabled);
    assert_eq!(cfg.static_files.cache.max_entries, None);
    assert_eq!(cfg.session.expiry_secs, 300);
    assert_eq!(cfg.session.same_site, SameSite::Lax);
    assert_eq!(cfg.session.path, "/");
    assert!(!cfg.session.emit_flags);
    assert_eq!(cfg.middleware.policy, MiddlewarePolicy::LastMatchWins);
    assert!(cfg.middleware.chains.is_empty());
}

#[test]
fn test_config_clone() {
    let cfg1 = Config::default();
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1.server.listen_addr, cfg2.server.listen_addr);
}

#[test]
fn test_config_from_yaml() {
    let cfg = Config::from_yaml(
        r#"
server:
  listen_addr: "0.0.0.0:5000"
  max_body_bytes: 1024
static_files:
  root: /srv/site
  cache:
    max_entries: 64
session:
  key: sid
  expiry_secs: 60
  same_site: Strict
  domain: example.com
middleware:
  policy: first_match
  chains:
    - prefix: /admin/*
      middleware: [auth, audit]
"#,
    )
    .unwrap();

    assert!(cfg.server.listen_addr.starts_with("0.0.0.0"));
    assert_eq!(cfg.server.max_body_bytes, 1024);
    assert_eq!(cfg.static_files.root.to_str(), Some("/srv/site"));
    assert!(cfg.static_files.cache.enabled);
    assert_eq!(cfg.static_files.cache.max_entries, Some(64));
    assert_eq!(cfg.static_files.index, "index.html");
    assert_eq!(cfg.session.key, "sid");
    assert_eq!(cfg.session.expiry_secs, 60);
    assert_eq!(cfg.session.same_site, SameSite::Strict);
    assert_eq!(cfg.session.domain.as_deref(), Some("example.com"));
    assert_eq!(cfg.middleware.policy, MiddlewarePolicy::FirstMatch);
    assert_eq!(cfg.middleware.chains[0].prefix, "/admin/*");
    assert_eq!(cfg.middleware.chains[0].middleware, vec!["auth", "audit"]);
}

#[test]
fn test_config_rejects_unknown_policy() {
    let result = Config::from_yaml("middleware:\n  policy: random\n");
    assert!(result.is_err());
}

#[test]
fn test_config_missing_file() {
    let result = Config::from_file("/nonexistent/portico.yaml");
    assert!(result.is_err());
}
