use std::sync::LazyLock;

/// Defines the application version.
pub static VERSION: LazyLock<String> = LazyLock::new(|| {
    format!(
        "{}-{}{}",
        env!("IMAGE_VERSION"),
        short_sha(option_env!("VERGEN_GIT_SHA")),
        if option_env!("VERGEN_GIT_DIRTY") == Some("true") {
            "-dirty"
        } else {
            ""
        }
    )
});

fn short_sha(sha: Option<&'static str>) -> &'static str {
    match sha {
        Some(sha) if sha.len() > 8 => &sha[..8],
        Some(sha) if !sha.is_empty() => sha,
        _ => "unknown",
    }
}
