use once_cell::sync::Lazy;
use regex::Regex;

pub const FEED_POST_COLLECTION: &str = "app.bsky.feed.post";
pub const WEB_BASE_URL: &str = "https://bsky.app";

static PROFILE_POST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"profile/([\w:.]+)/post/(\w+)").expect("valid profile path regex"));

/// Rewrites a bsky.app post URL into its at:// form. Inputs already in
/// at:// form, and anything unrecognizable, pass through unchanged.
pub fn at_uri(input: &str) -> String {
    if !input.starts_with("at://") && input.contains("bsky.app/profile/") {
        if let Some(caps) = PROFILE_POST_RE.captures(input) {
            return format!("at://{}/{}/{}", &caps[1], FEED_POST_COLLECTION, &caps[2]);
        }
    }
    input.to_string()
}

/// Maps an at:// identifier back to the bsky.app URL used for outbound
/// links. Non-at:// input is treated as already being a web URL.
pub fn web_url(input: &str) -> String {
    if let Some(rest) = input.strip_prefix("at://") {
        let mut segments = rest.split('/');
        if let (Some(did), Some(_collection), Some(rkey)) =
            (segments.next(), segments.next(), segments.next())
        {
            return format!("{}/profile/{}/post/{}", WEB_BASE_URL, did, rkey);
        }
    }
    input.to_string()
}
