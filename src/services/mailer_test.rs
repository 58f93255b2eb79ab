use super::*;

use std::sync::Arc;

use crate::state::test_helpers::RecordingMailer;

fn sample() -> OutgoingMail {
    OutgoingMail {
        to: "joy@clinic.org".into(),
        subject: "Password Reset Request".into(),
        html: "<p>hi</p>".into(),
        text: "hi".into(),
    }
}

#[tokio::test]
async fn log_mailer_always_succeeds() {
    assert!(LogMailer.send(sample()).await.is_ok());
}

#[tokio::test]
async fn trait_object_dispatch_records_mail() {
    let recorder = Arc::new(RecordingMailer::default());
    let mailer: Arc<dyn Mailer> = recorder.clone();
    mailer.send(sample()).await.unwrap();

    let sent = recorder.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "joy@clinic.org");
}

#[test]
fn resend_mailer_keeps_sender() {
    let mailer = ResendMailer::new(&MailConfig { resend_api_key: "re_test".into(), from: "noreply@demo.com".into() });
    assert_eq!(mailer.from, "noreply@demo.com");
}

#[test]
fn mail_error_display() {
    assert_eq!(MailError::Delivery("503".into()).to_string(), "email delivery failed: 503");
}
