//! Display names derived from Rust type names.

/// Returns the simple name of `T` with module paths removed and the first matching
/// suffix stripped.
///
/// Generic arguments keep their own simple names: `app::steps::CopyStep<app::Dir>`
/// becomes `Copy<Dir>` with suffix `"Step"`. Purely cosmetic.
///
/// # Example
/// ```
/// struct UploadStep;
/// assert_eq!(pipeworks::type_display_name::<UploadStep>(&["Step"]), "Upload");
/// ```
pub fn type_display_name<T: ?Sized>(suffixes: &[impl AsRef<str>]) -> String {
    let simple = simplify(std::any::type_name::<T>());
    strip_suffix(&simple, suffixes)
}

/// Removes `a::b::` prefixes from every path in a type name.
fn simplify(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    let mut chars = full.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                out.push_str(&segment);
                segment.clear();
                out.push(c);
            }
            _ => segment.push(c),
        }
    }
    out.push_str(&segment);
    out
}

fn strip_suffix(name: &str, suffixes: &[impl AsRef<str>]) -> String {
    let (head, generics) = match name.find('<') {
        Some(idx) => name.split_at(idx),
        None => (name, ""),
    };
    for suffix in suffixes {
        let suffix = suffix.as_ref();
        match head.strip_suffix(suffix) {
            Some(stripped) if !stripped.is_empty() => return format!("{stripped}{generics}"),
            _ => {}
        }
    }
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    mod nested {
        pub struct CopyStep<T>(pub T);
        pub struct Dir;
    }

    struct UploadTask;
    struct Step;

    #[test]
    fn test_strips_module_path_and_suffix() {
        assert_eq!(type_display_name::<UploadTask>(&["Step", "Task"]), "Upload");
    }

    #[test]
    fn test_generic_arguments_are_simplified() {
        assert_eq!(
            type_display_name::<nested::CopyStep<nested::Dir>>(&["Step"]),
            "Copy<Dir>"
        );
    }

    #[test]
    fn test_name_equal_to_suffix_is_kept() {
        assert_eq!(type_display_name::<Step>(&["Step"]), "Step");
    }

    #[test]
    fn test_no_suffixes() {
        let none: [&str; 0] = [];
        assert_eq!(type_display_name::<UploadTask>(&none), "UploadTask");
    }
}
