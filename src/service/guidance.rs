//! Remediation tips shown next to a failed test, keyed by error kind.

use crate::core::models::ErrorKind;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Guidance {
    pub title: &'static str,
    pub tips: &'static [&'static str],
}

const AUTHENTICATION: Guidance = Guidance {
    title: "Authentication Failed",
    tips: &[
        "Verify your username and password are correct",
        "For Gmail: Enable \"Less secure app access\" or use an App Password",
        "For Office 365: Check if Modern Authentication is required",
        "Some providers require OAuth2 instead of password authentication",
    ],
};

const CONNECTION: Guidance = Guidance {
    title: "Connection Failed",
    tips: &[
        "Check if the SMTP host address is correct",
        "Verify the port number (587 for STARTTLS, 465 for SSL/TLS)",
        "Ensure your firewall isn't blocking the connection",
        "Try switching between STARTTLS and SSL/TLS encryption",
    ],
};

const TIMEOUT: Guidance = Guidance {
    title: "Connection Timeout",
    tips: &[
        "The server took too long to respond",
        "Check your internet connection",
        "The SMTP server might be down or overloaded",
        "Try again in a few moments",
    ],
};

const HOST_NOT_FOUND: Guidance = Guidance {
    title: "Host Not Found",
    tips: &[
        "Double-check the SMTP host address for typos",
        "Ensure you have an active internet connection",
        "The SMTP server might be temporarily unavailable",
    ],
};

const DEFAULT: Guidance = Guidance {
    title: "SMTP Error",
    tips: &[
        "Review your SMTP configuration settings",
        "Check the error message for specific details",
        "Consult your email provider's documentation",
        "Try using the Auto Discovery feature",
    ],
};

pub fn guidance_for(kind: ErrorKind) -> Guidance {
    match kind {
        ErrorKind::AuthenticationFailed => AUTHENTICATION,
        ErrorKind::ConnectionRefused => CONNECTION,
        ErrorKind::Timeout => TIMEOUT,
        ErrorKind::HostUnresolvable => HOST_NOT_FOUND,
        ErrorKind::Other => DEFAULT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_tips() {
        for kind in [
            ErrorKind::AuthenticationFailed,
            ErrorKind::ConnectionRefused,
            ErrorKind::Timeout,
            ErrorKind::HostUnresolvable,
            ErrorKind::Other,
        ] {
            assert!(!guidance_for(kind).tips.is_empty());
        }
        assert_eq!(guidance_for(ErrorKind::Timeout).title, "Connection Timeout");
    }
}
