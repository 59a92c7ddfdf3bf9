//! Subject and body of the test messages.
//!
//! The body describes the tested configuration; it never includes the
//! password.

use crate::core::models::{ConnectionProfile, Credentials, MessageSpec};

pub const SINGLE_TEST_SUBJECT: &str = "SMTP Test - Advanced SMTP Tester";

fn describe(profile: &ConnectionProfile, credentials: &Credentials, headline: &str) -> String {
    format!(
        "{}\n\n\
         Host:       {}\n\
         Port:       {}\n\
         Encryption: {}\n\
         Username:   {}\n\n\
         Generated by smtp-probe {}\n",
        headline,
        profile.host(),
        profile.port(),
        profile.encryption(),
        credentials.user(),
        env!("CARGO_PKG_VERSION"),
    )
}

/// Message sent by a single test.
pub fn single_test_message(
    profile: &ConnectionProfile,
    credentials: &Credentials,
    from: &str,
    to: &str,
) -> MessageSpec {
    MessageSpec::new(
        from,
        to,
        SINGLE_TEST_SUBJECT,
        describe(
            profile,
            credentials,
            "SMTP Test Successful: your SMTP configuration is working.",
        ),
        credentials,
    )
}

/// Message sent for each working discovery candidate.
pub fn discovery_message(
    profile: &ConnectionProfile,
    credentials: &Credentials,
    from: &str,
    to: &str,
) -> MessageSpec {
    MessageSpec::new(
        from,
        to,
        format!("SMTP Auto-Discovery: {} - SUCCESS", profile.label()),
        describe(
            profile,
            credentials,
            "Auto-Discovery Success: this configuration was discovered and verified automatically.",
        ),
        credentials,
    )
}
