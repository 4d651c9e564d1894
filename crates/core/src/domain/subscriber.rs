use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub const DEFAULT_ALLOWED_DOMAINS: [&str; 7] = [
    "gmail.com",
    "naver.com",
    "daum.net",
    "kakao.com",
    "hanmail.net",
    "nate.com",
    "icloud.com",
];

pub const SIGNUP_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub email: String,
    pub signup_time: NaiveDateTime,
}

impl Subscriber {
    /// Row layout of the subscriber sheet: email in column 1, timestamp in column 2.
    pub fn to_row(&self) -> [String; 2] {
        [
            self.email.clone(),
            self.signup_time.format(SIGNUP_TIME_FORMAT).to_string(),
        ]
    }
}

/// The only check applied before a stored address is mailed.
pub fn is_deliverable(email: &str) -> bool {
    email.contains('@')
}

/// Keeps deliverable addresses, dropping exact-string duplicates.
///
/// Comparison is case-sensitive; first-seen order is kept.
pub fn dedup_recipients<I, S>(emails: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for email in emails {
        let email = email.as_ref();
        if is_deliverable(email) && seen.insert(email.to_string()) {
            out.push(email.to_string());
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupRejection {
    InvalidFormat,
    DomainNotAllowed { domain: String },
}

impl fmt::Display for SignupRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignupRejection::InvalidFormat => write!(f, "올바른 이메일 형식을 입력해주세요."),
            SignupRejection::DomainNotAllowed { domain } => write!(
                f,
                "봇 무단 가입 방지를 위해 주요 포털 이메일로만 가입할 수 있습니다. (입력한 도메인: {domain})"
            ),
        }
    }
}

impl std::error::Error for SignupRejection {}

/// Validates a signup address against the domain allowlist.
///
/// The address must contain `@` and `.`; the part after the first `@` is lowercased before
/// the allowlist lookup. The address itself is returned unchanged.
pub fn validate_signup<S: AsRef<str>>(email: &str, allowed: &[S]) -> Result<(), SignupRejection> {
    if !email.contains('@') || !email.contains('.') {
        return Err(SignupRejection::InvalidFormat);
    }

    let domain = email
        .split('@')
        .nth(1)
        .unwrap_or_default()
        .to_ascii_lowercase();

    if allowed.iter().any(|d| d.as_ref() == domain) {
        Ok(())
    } else {
        Err(SignupRejection::DomainNotAllowed { domain })
    }
}
