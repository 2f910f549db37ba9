//! Recovery actions delegated to the browser/selector/config collaborators
//! (spec.md §4.9, §6).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    RestartBrowser,
    ClearCache,
    ClearCookies,
    ChangeUserAgent,
    RediscoverSelectors,
    WaitAndRetry,
    ResetSession,
    UpdateConfig,
}

impl RecoveryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryAction::RestartBrowser => "restart_browser",
            RecoveryAction::ClearCache => "clear_cache",
            RecoveryAction::ClearCookies => "clear_cookies",
            RecoveryAction::ChangeUserAgent => "change_user_agent",
            RecoveryAction::RediscoverSelectors => "rediscover_selectors",
            RecoveryAction::WaitAndRetry => "wait_and_retry",
            RecoveryAction::ResetSession => "reset_session",
            RecoveryAction::UpdateConfig => "update_config",
        }
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
