//! YouTube video id extraction for limited mode, when no extractor is
//! available to resolve a URL properly.

use regex::Regex;
use std::sync::LazyLock;
use url::{Position, Url};

/// Path patterns for the long youtube.com forms, matched against the path
/// and query only
static WATCH_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"^/watch\?(?:[^#]*&)?v=([A-Za-z0-9_-]+)").expect("valid regex"),
        Regex::new(r"^/embed/([A-Za-z0-9_-]+)").expect("valid regex"),
    ]
});

static SHORT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/([A-Za-z0-9_-]+)").expect("valid regex"));

const YOUTUBE_HOSTS: [&str; 3] = ["youtube.com", "www.youtube.com", "m.youtube.com"];
const SHORT_HOSTS: [&str; 2] = ["youtu.be", "www.youtu.be"];

/// Best-effort YouTube video id from a URL. Only YouTube hosts qualify;
/// a YouTube-looking fragment elsewhere in the URL is ignored.
pub fn youtube_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let target = &parsed[Position::BeforePath..];

    if SHORT_HOSTS.contains(&host) {
        return capture(&SHORT_PATTERN, target);
    }
    if !YOUTUBE_HOSTS.contains(&host) {
        return None;
    }

    WATCH_PATTERNS
        .iter()
        .find_map(|re| capture(re, target))
        // Query-string fallback for shapes the patterns miss
        .or_else(|| {
            parsed
                .query_pairs()
                .find(|(key, value)| key == "v" && !value.is_empty())
                .map(|(_, value)| value.into_owned())
        })
}

fn capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
}

/// Full-size thumbnail URL for a YouTube video id
pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/maxresdefault.jpg")
}
