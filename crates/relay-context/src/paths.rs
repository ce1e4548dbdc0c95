//! Namespaced-path parsing and formatting.
//!
//! A namespaced path has the shape `"<context_id>:/absolute/path"`. The
//! reserved id `local` is implicit when no prefix is present. Windows drive
//! letters (`C:/...`) must never be mistaken for a namespace prefix.

pub const LOCAL: &str = "local";

/// Parse a (possibly) namespaced path into `(context_id, absolute_path)`.
///
/// - Empty input returns `("local", "/")`.
/// - A single uppercase/lowercase ASCII letter followed by `:` is a drive
///   letter, not a namespace — `"C:/Users"` parses as `("local", "C:/Users")`.
/// - Anything else of the form `id:...` is treated as `(id, ...)`.
/// - Input without a namespace prefix defaults to `local`.
pub fn parse_namespaced_path(raw: &str) -> (String, String) {
    if raw.is_empty() {
        return (LOCAL.to_string(), "/".to_string());
    }

    if let Some(colon_idx) = raw.find(':') {
        let prefix = &raw[..colon_idx];
        let rest = &raw[colon_idx + 1..];

        let is_drive_letter = prefix.len() == 1
            && prefix.chars().next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false);

        if !is_drive_letter && !prefix.is_empty() {
            return (prefix.to_string(), rest.to_string());
        }
    }

    (LOCAL.to_string(), raw.to_string())
}

/// Inverse of [`parse_namespaced_path`] for the `local` namespace — and the
/// canonical way tools reference files across contexts for non-local ids.
pub fn format_namespaced_path(context_id: &str, absolute_path: &str) -> String {
    if context_id == LOCAL {
        format!("{LOCAL}:{absolute_path}")
    } else {
        format!("{context_id}:{absolute_path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_defaults_to_local_root() {
        assert_eq!(parse_namespaced_path(""), ("local".into(), "/".into()));
    }

    #[test]
    fn bare_absolute_path_defaults_to_local() {
        assert_eq!(
            parse_namespaced_path("/home/user/file.txt"),
            ("local".into(), "/home/user/file.txt".into())
        );
    }

    #[test]
    fn drive_letters_are_not_namespaces() {
        assert_eq!(
            parse_namespaced_path("C:/Users/file.txt"),
            ("local".into(), "C:/Users/file.txt".into())
        );
        assert_eq!(
            parse_namespaced_path("c:/Users/file.txt"),
            ("local".into(), "c:/Users/file.txt".into())
        );
    }

    #[test]
    fn namespaced_paths_parse_the_context_id() {
        assert_eq!(
            parse_namespaced_path("staging:/var/www/app"),
            ("staging".into(), "/var/www/app".into())
        );
    }

    #[test]
    fn round_trip_for_any_valid_context_and_path() {
        for (ctx, path) in [
            ("local", "/a/b"),
            ("staging", "/var/www"),
            ("prod-east", "/opt/app"),
        ] {
            let namespaced = format_namespaced_path(ctx, path);
            assert_eq!(parse_namespaced_path(&namespaced), (ctx.to_string(), path.to_string()));
        }
    }
}
