// Command notifier: argument substitution, body on stdin, exit status, timeout
#![cfg(unix)]

use dbcheckpoint::config::{NotifyConfig, NotifyKind};
use dbcheckpoint::notify::{AppNotifier, CommandNotifier, Notifier};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn sh(script: &str, timeout: Duration) -> CommandNotifier {
    CommandNotifier::new(
        "sh",
        vec![
            "-c".into(),
            script.into(),
            "notify".into(),
            "{subject}".into(),
            "{description}".into(),
        ],
        timeout,
    )
}

#[tokio::test]
async fn command_receives_subject_and_body() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("mail.txt");
    let script = format!(
        "{{ echo \"$1|$2\"; cat; }} > '{}'",
        out.to_str().unwrap()
    );
    let notifier = sh(&script, Duration::from_secs(5));

    notifier
        .notify(
            "alert notifications",
            "db1: alert notification",
            &["first".to_string(), "second".to_string()],
        )
        .await
        .unwrap();

    let written = std::fs::read_to_string(&out).unwrap();
    assert_eq!(
        written,
        "db1: alert notification|alert notifications\nfirst\nsecond"
    );
}

#[tokio::test]
async fn failing_command_is_an_error() {
    let notifier = sh("cat > /dev/null; echo relay down >&2; exit 3", Duration::from_secs(5));
    let err = notifier.notify("d", "s", &["body".to_string()]).await.unwrap_err();
    assert!(err.to_string().contains("relay down"), "{err}");
}

#[tokio::test]
async fn hung_command_times_out() {
    let notifier = sh("sleep 30", Duration::from_millis(200));
    let started = Instant::now();
    let err = notifier.notify("d", "s", &[]).await.unwrap_err();
    assert!(err.to_string().contains("timed out"), "{err}");
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn app_notifier_from_config() {
    let log = AppNotifier::from_config(&NotifyConfig::default()).unwrap();
    assert!(matches!(log, AppNotifier::Log(_)));
    log.notify("d", "s", &["body".to_string()]).await.unwrap();

    let missing = NotifyConfig {
        kind: NotifyKind::Command,
        ..NotifyConfig::default()
    };
    assert!(AppNotifier::from_config(&missing).is_err());
}
