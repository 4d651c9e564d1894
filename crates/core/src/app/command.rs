use crate::domain::briefing::Briefing;
use crate::domain::subscriber::SignupRejection;
use crate::notify::BroadcastReport;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every action the front end can trigger.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    FetchBriefing,
    SendSingle,
    Broadcast {
        password: String,
        #[serde(default)]
        issue: Option<String>,
        #[serde(default)]
        dry_run: bool,
    },
    Subscribe {
        email: String,
        #[serde(default = "default_true")]
        newsletter: bool,
    },
    Logout,
}

fn default_true() -> bool {
    true
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::FetchBriefing => "fetch_briefing",
            Command::SendSingle => "send_single",
            Command::Broadcast { .. } => "broadcast",
            Command::Subscribe { .. } => "subscribe",
            Command::Logout => "logout",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Soft, user-visible message attached to a command result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub briefing: Option<Briefing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<BroadcastReport>,
    /// Deduplicated recipient count resolved by a dry-run broadcast.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run_recipients: Option<usize>,
    pub logged_in_user: Option<String>,
    pub notices: Vec<Notice>,
}

impl CommandOutcome {
    pub(crate) fn notice(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notices.push(Notice::new(level, text));
    }
}

/// Expected rejections, reported to the user rather than treated as failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Unauthorized,
    BroadcastDisabled,
    NoBriefing,
    Signup(SignupRejection),
    Unavailable(&'static str),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Unauthorized => write!(f, "관리자 비밀번호가 올바르지 않습니다."),
            CommandError::BroadcastDisabled => write!(f, "관리자 발송 기능이 설정되어 있지 않습니다."),
            CommandError::NoBriefing => write!(f, "먼저 오늘의 브리핑을 가져와 주세요."),
            CommandError::Signup(rejection) => write!(f, "{rejection}"),
            CommandError::Unavailable(what) => write!(f, "{what} is not configured"),
        }
    }
}

impl std::error::Error for CommandError {}
