fn main() {
    if handle_cli_flags() {
        return;
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(err) = bsky_comments::run(&args) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags() -> bool {
    let mut saw_flag = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("bsky-comments {}", bsky_comments::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!(
                    "bsky-comments — Bluesky comment threads for your posts, ranked and filtered.\n\nUsage:\n  bsky-comments <post URL or at:// URI> [--show-more N]\n  bsky-comments --author <handle> --page <url> [--show-more N]\n\n  --author <handle>    Find the post by this author linking to --page\n  --page <url>         Page URL to search for when no post is given\n  --show-more <n>      Reveal n additional pages of comments\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message"
                );
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}
