//! Connection and crawl state machines.
//!
//! Each status dimension is a closed tagged union with an explicit,
//! exhaustive transition function. Services drive every status write
//! through [`ConnectionStatus::transition`] / [`CrawlStatus::transition`],
//! so an illegal edge is a bug caught at the call site rather than a stale
//! string in the database. The UI-facing projection ([`ui_label`]) is a
//! separate pure mapping and never touches persistence.
//!
//! ```text
//! connection:  unknown ──▶ checking ──▶ connected
//!                 ▲            │  ▲          │
//!                 └────────────┤  └──────────┘
//!                              ▼
//!                            error ──▶ checking (re-check)
//!
//! crawl:  not_crawled ──▶ crawling ──▶ crawled
//!                             │  ▲         │
//!                             ▼  └─────────┘
//!                           error ──▶ crawling (retry)
//! ```
//!
//! [`ui_label`]: ConnectionStatus::ui_label

use crate::error::CoreError;

/// Reachability state of a source. `checking` is re-enterable: a source can
/// be re-checked from `connected` or `error`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionStatus {
    Unknown,
    Checking,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Unknown => "unknown",
            ConnectionStatus::Checking => "checking",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unknown" => Some(ConnectionStatus::Unknown),
            "checking" => Some(ConnectionStatus::Checking),
            "connected" => Some(ConnectionStatus::Connected),
            "error" => Some(ConnectionStatus::Error),
            _ => None,
        }
    }

    /// Whether the edge `self → next` is legal. Terminal states are only
    /// reachable from `checking`; `checking` is reachable from everywhere.
    pub fn can_transition(&self, next: ConnectionStatus) -> bool {
        use ConnectionStatus::*;
        match (self, next) {
            (_, Checking) => true,
            (Checking, Connected) | (Checking, Error) => true,
            (_, Connected) | (_, Error) | (_, Unknown) => false,
        }
    }

    /// Validate and take the edge `self → next`.
    pub fn transition(&self, next: ConnectionStatus) -> Result<ConnectionStatus, CoreError> {
        if self.can_transition(next) {
            Ok(next)
        } else {
            Err(CoreError::Internal(format!(
                "illegal connection status transition: {} -> {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }

    /// UI-facing projection. Pure; kept apart from persistence on purpose.
    pub fn ui_label(&self) -> &'static str {
        match self {
            ConnectionStatus::Unknown => "not checked",
            ConnectionStatus::Checking => "checking...",
            ConnectionStatus::Connected => "online",
            ConnectionStatus::Error => "offline",
        }
    }
}

/// Metadata extraction state of a source. Independent of
/// [`ConnectionStatus`], except that a failed crawl also surfaces as a
/// connection error (see the crawl service).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CrawlStatus {
    NotCrawled,
    Crawling,
    Crawled,
    Error,
}

impl CrawlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlStatus::NotCrawled => "not_crawled",
            CrawlStatus::Crawling => "crawling",
            CrawlStatus::Crawled => "crawled",
            CrawlStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_crawled" => Some(CrawlStatus::NotCrawled),
            "crawling" => Some(CrawlStatus::Crawling),
            "crawled" => Some(CrawlStatus::Crawled),
            "error" => Some(CrawlStatus::Error),
            _ => None,
        }
    }

    /// Whether the edge `self → next` is legal. `crawling` is re-enterable
    /// (retry after error, re-crawl after success, and a provisioning
    /// transition followed by the worker's own transition).
    pub fn can_transition(&self, next: CrawlStatus) -> bool {
        use CrawlStatus::*;
        match (self, next) {
            (_, Crawling) => true,
            (Crawling, Crawled) | (Crawling, Error) => true,
            (_, Crawled) | (_, Error) | (_, NotCrawled) => false,
        }
    }

    /// Validate and take the edge `self → next`.
    pub fn transition(&self, next: CrawlStatus) -> Result<CrawlStatus, CoreError> {
        if self.can_transition(next) {
            Ok(next)
        } else {
            Err(CoreError::Internal(format!(
                "illegal crawl status transition: {} -> {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }

    /// UI-facing projection.
    pub fn ui_label(&self) -> &'static str {
        match self {
            CrawlStatus::NotCrawled => "not crawled",
            CrawlStatus::Crawling => "crawling...",
            CrawlStatus::Crawled => "crawled",
            CrawlStatus::Error => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_round_trip() {
        for s in [
            ConnectionStatus::Unknown,
            ConnectionStatus::Checking,
            ConnectionStatus::Connected,
            ConnectionStatus::Error,
        ] {
            assert_eq!(ConnectionStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ConnectionStatus::parse("online"), None);
    }

    #[test]
    fn crawl_round_trip() {
        for s in [
            CrawlStatus::NotCrawled,
            CrawlStatus::Crawling,
            CrawlStatus::Crawled,
            CrawlStatus::Error,
        ] {
            assert_eq!(CrawlStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(CrawlStatus::parse("done"), None);
    }

    #[test]
    fn checking_precedes_terminal_connection_states() {
        use ConnectionStatus::*;
        // Terminal writes only ever follow a checking write.
        assert!(Checking.can_transition(Connected));
        assert!(Checking.can_transition(Error));
        assert!(!Unknown.can_transition(Connected));
        assert!(!Connected.can_transition(Error));
        assert!(!Error.can_transition(Connected));

        // Checking is re-enterable from every state.
        for from in [Unknown, Checking, Connected, Error] {
            assert!(from.can_transition(Checking));
        }

        // Nothing ever goes back to unknown.
        for from in [Unknown, Checking, Connected, Error] {
            assert!(!from.can_transition(Unknown));
        }
    }

    #[test]
    fn crawling_precedes_terminal_crawl_states() {
        use CrawlStatus::*;
        assert!(Crawling.can_transition(Crawled));
        assert!(Crawling.can_transition(Error));
        assert!(!NotCrawled.can_transition(Crawled));
        assert!(!Crawled.can_transition(Error));

        // Retry and re-crawl are allowed.
        for from in [NotCrawled, Crawling, Crawled, Error] {
            assert!(from.can_transition(Crawling));
        }
    }

    #[test]
    fn illegal_transition_is_reported_not_silently_taken() {
        let err = ConnectionStatus::Connected
            .transition(ConnectionStatus::Error)
            .unwrap_err();
        assert!(err.to_string().contains("connected -> error"));
    }

    #[test]
    fn ui_projection_is_total() {
        assert_eq!(ConnectionStatus::Connected.ui_label(), "online");
        assert_eq!(ConnectionStatus::Error.ui_label(), "offline");
        assert_eq!(CrawlStatus::Error.ui_label(), "failed");
    }
}
