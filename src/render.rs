use std::io::{self, Write};

use crate::bluesky::{PostView, ThreadViewPost};
use crate::uri;
use crate::widget::{CommentSection, State};

/// Writes the widget's current state as plain text: an error line, a
/// loading line, or the post summary with the visible comments.
pub fn render<W: Write>(section: &CommentSection, out: &mut W) -> io::Result<()> {
    match section.state() {
        State::Errored => {
            let message = section
                .error_message()
                .unwrap_or_else(|| "Error loading comments".to_string());
            writeln!(out, "{}", message)
        }
        State::Ready => render_thread(section, out),
        _ => writeln!(out, "Loading comments..."),
    }
}

fn render_thread<W: Write>(section: &CommentSection, out: &mut W) -> io::Result<()> {
    let thread = match section.thread() {
        Some(thread) => thread,
        None => return writeln!(out, "Loading comments..."),
    };
    let post_url = section
        .post_url()
        .unwrap_or_else(|| uri::web_url(&thread.post.uri));

    post_summary(&thread.post, &post_url, out)?;

    if thread.replies.is_empty() {
        return Ok(());
    }

    writeln!(out)?;
    writeln!(out, "Comments")?;
    writeln!(out, "Join the conversation by replying on Bluesky: {}", post_url)?;
    writeln!(out)?;

    for reply in section.visible() {
        comment(reply, out)?;
    }

    let hidden = section.hidden_count();
    if hidden > 0 {
        writeln!(out, "{} more comments not shown", hidden)?;
    }
    Ok(())
}

fn post_summary<W: Write>(post: &PostView, post_url: &str, out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "{} likes, {} reposts, {} replies",
        post.like_count, post.repost_count, post.reply_count
    )?;
    writeln!(out, "{}", post_url)
}

fn comment<W: Write>(reply: &ThreadViewPost, out: &mut W) -> io::Result<()> {
    let post = &reply.post;
    let name = post
        .author
        .display_name
        .clone()
        .unwrap_or_else(|| post.author.handle.clone());
    writeln!(out, "{} (@{})", name, post.author.handle)?;
    if let Some(text) = post.text() {
        for line in text.lines() {
            writeln!(out, "  {}", line)?;
        }
    }
    writeln!(
        out,
        "  {} likes, {} replies  {}",
        post.like_count,
        post.reply_count,
        uri::web_url(&post.uri)
    )?;
    writeln!(out)
}
