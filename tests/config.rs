//! Tests for loading TOML configs and building loggers from them.

use driftlog::buffer::BufferMode;
use driftlog::{Config, Error, Level, RotateTime};
use std::fs;
use tempfile::TempDir;

#[test]
fn empty_config_uses_defaults() {
    let config = Config::from_toml("").unwrap();
    assert_eq!(config.logger.name, "application");
    assert_eq!(config.logger.level, Level::Trace);
    assert!(config.logger.report_caller);
    assert!(config.handlers.is_empty());
}

#[test]
fn missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
    assert!(config.handlers.is_empty());
}

#[test]
fn handler_settings_parse() {
    let config = Config::from_toml(
        r#"
        [logger]
        name = "api"
        level = "info"
        report_caller = false

        [[handlers]]
        logfile = "/var/log/api/api.log"
        levels = "notice"
        max_size = "10M"
        rotate_time = "day"
        backup_num = 7
        backup_time = 48
        compress = true
        buff_mode = "bytes"
        buff_size = "64K"

        [[handlers]]
        logfile = "/var/log/api/error.log"
        levels = ["error", "fatal"]
        use_json = true
        rotate_time = "none"
        max_size = 0
        "#,
    )
    .unwrap();

    assert_eq!(config.logger.name, "api");
    assert_eq!(config.logger.level, Level::Info);
    assert!(!config.logger.report_caller);

    let main = &config.handlers[0];
    assert!(!main.levels.accepts(Level::Info));
    assert!(main.levels.accepts(Level::Warn));
    assert_eq!(main.max_size, 10 * 1024 * 1024);
    assert_eq!(main.rotate_time, Some(RotateTime::Day));
    assert_eq!(main.backup_num, 7);
    assert_eq!(main.backup_time, 48);
    assert!(main.compress);
    assert_eq!(main.buff_mode, BufferMode::Bytes);
    assert_eq!(main.buff_size, 64 * 1024);

    let errors = &config.handlers[1];
    assert!(errors.levels.accepts(Level::Fatal));
    assert!(!errors.levels.accepts(Level::Panic));
    assert!(errors.use_json);
    assert_eq!(errors.rotate_time, None);
    assert_eq!(errors.max_size, 0);
}

#[test]
fn invalid_values_are_rejected() {
    let err = Config::from_toml("[[handlers]]\nmax_size = \"ten megs\"").unwrap_err();
    assert!(matches!(err, Error::ConfigParse(_)));

    let err = Config::from_toml("[[handlers]]\nrotate_time = \"fortnightly\"").unwrap_err();
    assert!(matches!(err, Error::ConfigParse(_)));
}

#[test]
fn tilde_in_logfile_is_expanded() {
    let config = Config::from_toml("[[handlers]]\nlogfile = \"~/logs/app.log\"").unwrap();
    assert!(!config.handlers[0].logfile.starts_with("~"));
    assert!(config.handlers[0].logfile.ends_with("logs/app.log"));
}

#[test]
fn built_logger_writes_through_configured_handlers() {
    let dir = TempDir::new().unwrap();
    let all = dir.path().join("all.log");
    let errors = dir.path().join("nested").join("errors.log");
    let path = dir.path().join("driftlog.toml");
    fs::write(
        &path,
        format!(
            r#"
            [logger]
            name = "svc"
            report_caller = false

            [[handlers]]
            logfile = "{}"
            max_size = "1M"

            [[handlers]]
            logfile = "{}"
            levels = ["error"]
            use_json = true
            "#,
            all.display(),
            errors.display()
        ),
    )
    .unwrap();

    let logger = Config::load_from(&path).unwrap().build().unwrap();
    assert_eq!(logger.name(), "svc");
    assert_eq!(logger.handler_count(), 2);

    logger.info("hello");
    logger.error("boom");
    logger.close().unwrap();

    let text = fs::read_to_string(&all).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(text.contains("[svc] [INFO] hello"));

    let json: serde_json::Value =
        serde_json::from_str(fs::read_to_string(&errors).unwrap().trim()).unwrap();
    assert_eq!(json["level"], "ERROR");
    assert_eq!(json["channel"], "svc");
    assert_eq!(json["message"], "boom");
}

#[test]
fn build_fails_on_an_unusable_handler() {
    let config = Config::from_toml("[[handlers]]\nlevels = \"info\"").unwrap();
    assert!(matches!(config.build(), Err(Error::Config(_))));
}
