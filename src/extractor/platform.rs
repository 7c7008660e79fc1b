//! URL -> source platform detection

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Known source platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    TikTok,
    Instagram,
    Twitter,
    Facebook,
    Vimeo,
    Dailymotion,
    Twitch,
    Reddit,
    Bilibili,
}

impl Platform {
    pub fn id(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::TikTok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Vimeo => "vimeo",
            Platform::Dailymotion => "dailymotion",
            Platform::Twitch => "twitch",
            Platform::Reddit => "reddit",
            Platform::Bilibili => "bilibili",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::YouTube => "Youtube",
            Platform::TikTok => "Tiktok",
            Platform::Instagram => "Instagram",
            Platform::Twitter => "Twitter",
            Platform::Facebook => "Facebook",
            Platform::Vimeo => "Vimeo",
            Platform::Dailymotion => "Dailymotion",
            Platform::Twitch => "Twitch",
            Platform::Reddit => "Reddit",
            Platform::Bilibili => "Bilibili",
        }
    }

    /// Containers the platform usually serves.
    pub fn native_containers(&self) -> &'static [&'static str] {
        match self {
            Platform::YouTube => &["mp4", "mkv", "webm"],
            Platform::Vimeo => &["mp4", "webm"],
            Platform::Twitch => &["mp4", "m3u8"],
            Platform::Bilibili => &["mp4", "flv"],
            _ => &["mp4"],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

const PATTERNS: &[(Platform, &[&str])] = &[
    (
        Platform::YouTube,
        &[r"youtube\.com/watch", r"youtu\.be/", r"youtube\.com/shorts/"],
    ),
    (
        Platform::TikTok,
        &[r"tiktok\.com/", r"vm\.tiktok\.com/", r"vt\.tiktok\.com/"],
    ),
    (Platform::Instagram, &[r"instagram\.com/", r"instagr\.am/"]),
    (Platform::Twitter, &[r"twitter\.com/", r"x\.com/"]),
    (Platform::Facebook, &[r"facebook\.com/", r"fb\.watch/"]),
    (Platform::Vimeo, &[r"vimeo\.com/"]),
    (Platform::Dailymotion, &[r"dailymotion\.com/"]),
    (Platform::Twitch, &[r"twitch\.tv/", r"twitch\.tv/videos/"]),
    (Platform::Reddit, &[r"reddit\.com/", r"redd\.it/"]),
    (Platform::Bilibili, &[r"bilibili\.com/", r"b23\.tv/"]),
];

lazy_static! {
    static ref MATCHERS: Vec<(Platform, Vec<Regex>)> = PATTERNS
        .iter()
        .map(|(platform, patterns)| {
            let compiled = patterns
                .iter()
                .filter_map(|p| Regex::new(&format!("(?i){}", p)).ok())
                .collect();
            (*platform, compiled)
        })
        .collect();
}

/// Detect which platform a url belongs to. First matching platform wins.
pub fn detect(url: &str) -> Option<Platform> {
    MATCHERS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(url)))
        .map(|(platform, _)| *platform)
}

/// Text for the platform indicator next to the url field.
pub fn platform_label(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return "Platform: Auto".to_string();
    }
    match detect(url) {
        Some(platform) => format!("Platform: {}", platform.display_name()),
        None => "Platform: Unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_detect_known_platforms() {
        let cases = [
            ("https://www.youtube.com/watch?v=abc", Platform::YouTube),
            ("https://youtu.be/abc", Platform::YouTube),
            ("https://youtube.com/shorts/abc", Platform::YouTube),
            ("https://vm.tiktok.com/ZM123/", Platform::TikTok),
            ("https://www.instagram.com/reel/xyz/", Platform::Instagram),
            ("https://instagr.am/p/xyz", Platform::Instagram),
            ("https://twitter.com/user/status/1", Platform::Twitter),
            ("https://x.com/user/status/1", Platform::Twitter),
            ("https://fb.watch/abc/", Platform::Facebook),
            ("https://vimeo.com/123456", Platform::Vimeo),
            ("https://www.dailymotion.com/video/x7", Platform::Dailymotion),
            ("https://www.twitch.tv/videos/42", Platform::Twitch),
            ("https://redd.it/abc", Platform::Reddit),
            ("https://b23.tv/xyz", Platform::Bilibili),
        ];

        for (url, expected) in cases {
            assert_eq!(detect(url), Some(expected), "url: {}", url);
        }
    }

    #[test]
    fn test_detect_is_case_insensitive() {
        assert_eq!(
            detect("HTTPS://WWW.YOUTUBE.COM/WATCH?v=abc"),
            Some(Platform::YouTube)
        );
    }

    #[test]
    fn test_unknown_url_yields_none() {
        assert_eq!(detect("https://example.com/video"), None);
        assert_eq!(detect(""), None);
        assert_eq!(detect("not a url at all"), None);
    }

    #[test]
    fn test_youtube_channel_page_is_not_a_video() {
        assert_eq!(detect("https://www.youtube.com/@channel"), None);
    }

    #[test]
    fn test_platform_label() {
        assert_eq!(platform_label("  "), "Platform: Auto");
        assert_eq!(platform_label("https://example.com"), "Platform: Unknown");
        assert_eq!(platform_label("https://vimeo.com/1"), "Platform: Vimeo");
    }

    #[test]
    fn test_native_containers() {
        assert_eq!(Platform::YouTube.native_containers(), &["mp4", "mkv", "webm"]);
        assert_eq!(Platform::Reddit.native_containers(), &["mp4"]);
    }

    proptest! {
        #[test]
        fn detect_never_panics_and_is_stable(url in ".*") {
            let first = detect(&url);
            prop_assert_eq!(first, detect(&url));
        }
    }
}
