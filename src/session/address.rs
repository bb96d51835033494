use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

pub const MEET_HOST: &str = "meet.google.com";

fn meeting_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:https?://)?(?:meet\.google\.com/)?([a-z0-9\-]+)").expect("valid regex")
    })
}

fn is_bare_code(input: &str) -> bool {
    !input.is_empty()
        && input
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// A meeting to join: the URL to open and the identifier used in file names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingAddress {
    url: String,
    meeting_id: String,
}

impl MeetingAddress {
    /// Accepts a full URL or a bare code such as `abc-defg-hij`
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let lowered = input.to_ascii_lowercase();

        let url = if !lowered.contains(MEET_HOST) && is_bare_code(&lowered) {
            format!("https://{}/{}", MEET_HOST, lowered)
        } else if !input.contains("://") && !input.is_empty() {
            // WebDriver only navigates to absolute URLs
            format!("https://{}", input)
        } else {
            input.to_string()
        };

        let meeting_id = meeting_id_pattern()
            .captures(&lowered)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Self { url, meeting_id }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }
}

impl fmt::Display for MeetingAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

fn host_and_path(url: &str) -> (&str, &str) {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
    let host = host.rsplit_once('@').map_or(host, |(_, host)| host);
    let host = host.split_once(':').map_or(host, |(host, _)| host);
    (host, path)
}

/// Whether `url` is on the meeting host
pub fn is_session_url(url: &str) -> bool {
    host_and_path(url).0.eq_ignore_ascii_case(MEET_HOST)
}

/// Whether `url` is on the meeting host and names a meeting
pub fn has_meeting_path(url: &str) -> bool {
    let (host, path) = host_and_path(url);
    host.eq_ignore_ascii_case(MEET_HOST)
        && path
            .split(['?', '#'])
            .next()
            .is_some_and(|p| !p.trim_matches('/').is_empty())
}
