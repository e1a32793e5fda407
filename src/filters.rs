use crate::bluesky::ThreadViewPost;

/// A comment is hidden when any active filter returns true for it.
pub type CommentFilter = Box<dyn Fn(&ThreadViewPost) -> bool + Send + Sync>;

pub const PIN_GLYPH: &str = "\u{1F4CC}";

pub fn min_like_count(min: i64) -> CommentFilter {
    Box::new(move |comment| comment.post.like_count < min)
}

/// Hides comments shorter than `min` characters. Comments whose record is
/// not a plain feed post are always hidden.
pub fn min_character_count(min: usize) -> CommentFilter {
    Box::new(move |comment| match comment.post.text() {
        Some(text) => text.chars().count() < min,
        None => true,
    })
}

pub fn text_contains(needle: &str) -> CommentFilter {
    let needle = needle.to_lowercase();
    Box::new(move |comment| match comment.post.text() {
        Some(text) => text.to_lowercase().contains(&needle),
        None => true,
    })
}

pub fn exact_match(text: &str) -> CommentFilter {
    let wanted = text.to_lowercase();
    Box::new(move |comment| match comment.post.text() {
        Some(text) => text.to_lowercase() == wanted,
        None => true,
    })
}

/// Hides nothing: a like count is never below zero.
pub fn no_likes() -> CommentFilter {
    min_like_count(0)
}

/// Hides comments that are just a pin emoji, the usual self-pin marker.
pub fn no_pins() -> CommentFilter {
    exact_match(PIN_GLYPH)
}

pub fn passes(comment: &ThreadViewPost, filters: &[CommentFilter]) -> bool {
    filters.iter().all(|filter| !filter(comment))
}
