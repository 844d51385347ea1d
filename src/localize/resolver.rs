//! Mapping of ranking entries to source files.

/// Resolves a method reference from a ranking report to the source file that
/// declares it, relative to the source root.
pub trait ClassNameResolver {
    fn source_file(&self, method_ref: &str) -> Option<String>;
}

/// Default resolver for the coverage tool's reference format.
///
/// References look like `org.jsoup.helper$HttpConnection$Response#parse(int)`:
/// the package is separated from the top-level class by the first `$`, and
/// nested classes follow with further `$` separators. References without any
/// `$` (`pkg.Bar#m()`) take the last dot-separated segment as the class.
///
/// Some libraries generate classes whose own name contains `$`
/// (`$Gson$Types`); those are listed per project and used verbatim.
#[derive(Debug, Clone)]
pub struct NestedClassResolver {
    synthetic_classes: Vec<String>,
}

impl NestedClassResolver {
    pub fn new(synthetic_classes: Vec<String>) -> Self {
        Self { synthetic_classes }
    }

    fn split_class_ref<'a>(&'a self, class_ref: &'a str) -> Option<(&'a str, &'a str)> {
        if let Some((package, nested)) = class_ref.split_once('$') {
            let class_name = self
                .synthetic_classes
                .iter()
                .find(|synthetic| class_ref.contains(synthetic.as_str()))
                .map(String::as_str)
                .or_else(|| nested.split('$').next())?;
            Some((package, class_name))
        } else {
            Some(class_ref.rsplit_once('.').unwrap_or(("", class_ref)))
        }
    }
}

impl ClassNameResolver for NestedClassResolver {
    fn source_file(&self, method_ref: &str) -> Option<String> {
        let class_ref = method_ref.split('#').next().unwrap_or_default().trim();
        let (package, class_name) = self.split_class_ref(class_ref)?;
        if class_name.is_empty() {
            return None;
        }

        let file_name = format!("{}.java", class_name);
        if package.is_empty() {
            Some(file_name)
        } else {
            Some(format!("{}/{}", package.replace('.', "/"), file_name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> NestedClassResolver {
        NestedClassResolver::new(vec![])
    }

    #[test]
    fn test_plain_class_reference() {
        assert_eq!(
            resolver().source_file("pkg.Bar#m()"),
            Some("pkg/Bar.java".to_string())
        );
    }

    #[test]
    fn test_package_separated_by_dollar() {
        assert_eq!(
            resolver().source_file("org.jsoup.helper$HttpConnection$Response#processResponseHeaders(java.util.Map)"),
            Some("org/jsoup/helper/HttpConnection.java".to_string())
        );
    }

    #[test]
    fn test_top_level_class_with_dollar_package_separator() {
        assert_eq!(
            resolver().source_file("org.apache.commons.lang3$StringUtils#isBlank(java.lang.CharSequence)"),
            Some("org/apache/commons/lang3/StringUtils.java".to_string())
        );
    }

    #[test]
    fn test_synthetic_class_name_used_verbatim() {
        let resolver =
            NestedClassResolver::new(vec!["$Gson$Preconditions".into(), "$Gson$Types".into()]);
        assert_eq!(
            resolver.source_file("com.google.gson.internal$$Gson$Types#canonicalize(java.lang.reflect.Type)"),
            Some("com/google/gson/internal/$Gson$Types.java".to_string())
        );
        assert_eq!(
            resolver.source_file("com.google.gson.internal$$Gson$Preconditions#checkNotNull(java.lang.Object)"),
            Some("com/google/gson/internal/$Gson$Preconditions.java".to_string())
        );
    }

    #[test]
    fn test_synthetic_class_without_configuration_is_unresolved() {
        assert_eq!(
            resolver().source_file("com.google.gson.internal$$Gson$Types#canonicalize()"),
            None
        );
    }

    #[test]
    fn test_default_package() {
        assert_eq!(resolver().source_file("Bar#m()"), Some("Bar.java".to_string()));
    }

    #[test]
    fn test_empty_reference() {
        assert_eq!(resolver().source_file(""), None);
    }
}
