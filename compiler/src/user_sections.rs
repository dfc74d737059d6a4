use std::{fs, io, path::Path};

use crate::error::{CapnpGenError, Result};

/// Hand-written regions of a previously generated file.
///
/// A region is every line strictly between `// USER_<NAME>_START` and
/// `// USER_<NAME>_END`. Markers are matched on trimmed lines, so their
/// indentation does not matter.
#[derive(Debug, Default, Clone)]
pub struct UserSections {
    content: String,
}

impl UserSections {
    /// Sections of the file at `path`. A file that does not exist yet has
    /// no sections. Bytes that are not valid UTF-8 are replaced rather than
    /// losing the section they sit in. Any other read failure is an error, so
    /// the caller never regenerates over a file it could not read.
    pub fn load(path: &Path) -> Result<UserSections> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(UserSections::default()),
            Err(e) => return Err(CapnpGenError::io(path, e)),
        };

        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %path.display(), "previous output is not valid UTF-8; invalid bytes replaced");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        Ok(UserSections { content })
    }

    pub fn from_text(content: impl Into<String>) -> UserSections {
        UserSections { content: content.into() }
    }

    /// Lines of section `name`, or an empty list when the section (or its
    /// end marker) is missing.
    pub fn get(&self, name: &str) -> Vec<String> {
        let start = start_marker(name);
        let end = end_marker(name);

        let mut lines = self.content.lines();
        if !lines.by_ref().any(|l| l.trim() == start) {
            return Vec::new();
        }

        let mut body = Vec::new();
        for line in lines {
            if line.trim() == end {
                return body;
            }
            body.push(line.to_string());
        }
        Vec::new()
    }

    /// Both markers, indented by `indent`, with the preserved lines between.
    pub fn render(&self, name: &str, indent: &str) -> Vec<String> {
        let mut lines = vec![format!("{}{}", indent, start_marker(name))];
        lines.extend(self.get(name));
        lines.push(format!("{}{}", indent, end_marker(name)));
        lines
    }
}

fn start_marker(name: &str) -> String {
    format!("// USER_{}_START", name)
}

fn end_marker(name: &str) -> String {
    format!("// USER_{}_END", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREVIOUS: &str = "\
#include \"a.hpp\"
// USER_INCLUDES_START
#include <map>
#include \"mine.hpp\"
// USER_INCLUDES_END
class A {
    // USER_METHODS_START
    int twice() const { return x * 2; }

    // USER_METHODS_END
    // USER_PRIVATE_START
    // USER_PRIVATE_END
};
// USER_BROKEN_START
never closed
";

    #[test]
    fn test_get_sections() {
        let sections = UserSections::from_text(PREVIOUS);
        assert_eq!(sections.get("INCLUDES"), vec!["#include <map>", "#include \"mine.hpp\""]);
        assert_eq!(
            sections.get("METHODS"),
            vec!["    int twice() const { return x * 2; }", ""]
        );
        assert!(sections.get("PRIVATE").is_empty());
        assert!(sections.get("BROKEN").is_empty());
        assert!(sections.get("MISSING").is_empty());
    }

    #[test]
    fn test_render_is_stable_across_regenerations() {
        let first = UserSections::from_text(PREVIOUS).render("METHODS", "    ").join("\n");
        let second = UserSections::from_text(first.clone()).render("METHODS", "    ").join("\n");
        assert_eq!(first, second);
        assert!(first.starts_with("    // USER_METHODS_START\n    int twice()"));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sections = UserSections::load(&dir.path().join("nope.hpp")).unwrap();
        assert_eq!(sections.render("IMPL", ""), vec!["// USER_IMPL_START", "// USER_IMPL_END"]);
    }

    #[test]
    fn test_load_keeps_sections_with_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Player.hpp");
        fs::write(&path, b"// USER_METHODS_START\n    int f(); // caf\xe9\n// USER_METHODS_END\n").unwrap();

        let sections = UserSections::load(&path).unwrap();
        assert_eq!(sections.get("METHODS"), vec!["    int f(); // caf\u{fffd}"]);
    }

    #[test]
    fn test_load_unreadable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = UserSections::load(dir.path()).unwrap_err();
        assert!(matches!(err, CapnpGenError::Io { .. }), "{:?}", err);
    }
}
