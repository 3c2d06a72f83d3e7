//! Prefix routing: the `server:` / `client:` / `editor:` namespace shared by
//! every I/O-bearing tool.

use super::error::DispatchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Server(String),
    Client(String),
    /// `editor:<buffer>` directly, or `editor:server:<path>` / `editor:client:<path>`
    /// to load a buffer's initial content from another target.
    Editor { buffer: String, source: Option<Box<Target>> },
}

/// Parse one path per the prefix grammar. Bare paths (no prefix) default to
/// `server:`.
pub fn parse(path: &str) -> Result<Target, DispatchError> {
    if let Some(rest) = path.strip_prefix("server:") {
        return non_empty(rest).map(|s| Target::Server(s.to_string()));
    }
    if let Some(rest) = path.strip_prefix("client:") {
        return non_empty(rest).map(|s| Target::Client(s.to_string()));
    }
    if let Some(rest) = path.strip_prefix("editor:") {
        if let Some(inner) = rest.strip_prefix("server:") {
            return non_empty(inner).map(|s| Target::Editor {
                buffer: s.to_string(),
                source: Some(Box::new(Target::Server(s.to_string()))),
            });
        }
        if let Some(inner) = rest.strip_prefix("client:") {
            return non_empty(inner).map(|s| Target::Editor {
                buffer: s.to_string(),
                source: Some(Box::new(Target::Client(s.to_string()))),
            });
        }
        return non_empty(rest).map(|s| Target::Editor { buffer: s.to_string(), source: None });
    }
    non_empty(path).map(|s| Target::Server(s.to_string()))
}

fn non_empty(s: &str) -> Result<&str, DispatchError> {
    if s.is_empty() {
        Err(DispatchError::EmptyPath)
    } else {
        Ok(s)
    }
}

/// Strip `..` segments and any leading path separator, per the server-write
/// sanitization rule.
pub fn sanitize_server_path(path: &str) -> String {
    let trimmed = path.trim_start_matches(['/', '\\']);
    trimmed
        .split(['/', '\\'])
        .filter(|segment| *segment != "..")
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_path_defaults_to_server() {
        assert_eq!(parse("foo/bar.txt").unwrap(), Target::Server("foo/bar.txt".to_string()));
    }

    #[test]
    fn explicit_prefixes_route() {
        assert_eq!(parse("server:x").unwrap(), Target::Server("x".to_string()));
        assert_eq!(parse("client:x").unwrap(), Target::Client("x".to_string()));
    }

    #[test]
    fn editor_buffer_alone() {
        assert_eq!(
            parse("editor:buf1").unwrap(),
            Target::Editor { buffer: "buf1".to_string(), source: None }
        );
    }

    #[test]
    fn editor_loads_from_server_or_client() {
        assert_eq!(
            parse("editor:server:foo.txt").unwrap(),
            Target::Editor { buffer: "foo.txt".to_string(), source: Some(Box::new(Target::Server("foo.txt".to_string()))) }
        );
        assert_eq!(
            parse("editor:client:foo.txt").unwrap(),
            Target::Editor { buffer: "foo.txt".to_string(), source: Some(Box::new(Target::Client("foo.txt".to_string()))) }
        );
    }

    #[test]
    fn empty_tail_is_rejected() {
        assert!(matches!(parse("client:"), Err(DispatchError::EmptyPath)));
        assert!(matches!(parse("server:"), Err(DispatchError::EmptyPath)));
        assert!(matches!(parse("editor:"), Err(DispatchError::EmptyPath)));
    }

    #[test]
    fn sanitize_strips_dotdot_and_leading_slash() {
        assert_eq!(sanitize_server_path("/etc/../etc/passwd"), "etc/passwd");
        assert_eq!(sanitize_server_path("../../x"), "x");
    }
}
