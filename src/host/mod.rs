//! Script hosts.
//!
//! A script host is the execution environment the downloaded library is
//! activated into. The loader installs code, checks the installed code
//! exposes the `mermaid` surface, runs its initialization hook and later
//! hands render requests to it.

mod disk;

pub use disk::DiskHost;

use async_trait::async_trait;

use crate::error::LoaderResult;
use crate::render::RenderRequest;

/// Global the library attaches itself to
pub const LIBRARY_GLOBAL: &str = "mermaid";

/// Members the global must expose to be usable
pub const REQUIRED_MEMBERS: &[&str] = &["initialize", "render"];

/// Execution environment for the rendering library
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Install `code` as `version`. Completion may never be signalled by
    /// some hosts; the loader bounds this call with a timeout.
    async fn install(&self, code: &str, version: &str) -> LoaderResult<()>;

    /// Whether `version` is installed and exposes the expected surface.
    fn has_capability(&self, version: &str) -> bool;

    /// Run the library's initialization hook.
    async fn initialize(&self) -> LoaderResult<()>;

    /// Render one diagram with the active library.
    async fn render(&self, request: &RenderRequest) -> LoaderResult<String>;
}

/// Static check that `code` looks like a script defining the library global
/// and its members.
///
/// This is a heuristic over the source text, not an evaluation: markup is
/// rejected outright, the global must be assigned (`mermaid=`) or named as a
/// string key, and each member must appear as a property or method
/// definition (`render:`, `render(`, `render=`). Prose that merely mentions
/// the names does not pass.
pub fn exposes_library_surface(code: &str) -> bool {
    if code.trim_start().starts_with('<') {
        return false;
    }
    let global_defined =
        is_assigned(code, LIBRARY_GLOBAL) || is_string_key(code, LIBRARY_GLOBAL);
    global_defined && REQUIRED_MEMBERS.iter().all(|m| is_member_definition(code, m))
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Text following each standalone occurrence of `name`.
fn occurrences<'a>(
    code: &'a str,
    name: &'a str,
) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
    code.match_indices(name).filter_map(move |(at, _)| {
        let before = &code[..at];
        let after = &code[at + name.len()..];
        let bounded = !before.chars().next_back().map_or(false, is_ident_char)
            && !after.chars().next().map_or(false, is_ident_char);
        bounded.then_some((before, after))
    })
}

fn starts_with_assignment(rest: &str) -> bool {
    let rest = rest.trim_start();
    rest.starts_with('=') && !rest.starts_with("==") && !rest.starts_with("=>")
}

fn is_assigned(code: &str, name: &str) -> bool {
    occurrences(code, name).any(|(_, after)| starts_with_assignment(after))
}

fn is_string_key(code: &str, name: &str) -> bool {
    occurrences(code, name).any(|(before, after)| {
        matches!(
            (before.chars().next_back(), after.chars().next()),
            (Some('"'), Some('"')) | (Some('\''), Some('\''))
        )
    })
}

fn is_member_definition(code: &str, name: &str) -> bool {
    occurrences(code, name).any(|(_, after)| {
        let rest = after.trim_start();
        rest.starts_with(':') || rest.starts_with('(') || starts_with_assignment(rest)
    })
}
