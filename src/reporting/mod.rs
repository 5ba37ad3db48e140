pub mod formatter;
pub mod writer;

pub use writer::ReportWriter;

/// Crate version with the build's git hash and build time when known.
pub fn tool_version() -> String {
    format_version(
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_HASH"),
        option_env!("BUILD_TIMESTAMP"),
    )
}

fn format_version(version: &str, git_hash: Option<&str>, built: Option<&str>) -> String {
    let details: Vec<String> = [git_hash.map(str::to_string), built.map(|ts| format!("built {}", ts))]
        .into_iter()
        .flatten()
        .collect();
    if details.is_empty() {
        version.to_string()
    } else {
        format!("{} ({})", version, details.join(", "))
    }
}
