/// Split an identifier into lowercase words at separators and case changes.
///
/// `"getHTTPStatus"` -> `["get", "http", "status"]`
fn words(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }

        current.extend(c.to_lowercase());
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Convert an identifier to dash-case.
///
/// `"getWidget"` -> `"get-widget"`, `"GET-widgets/{id}"` -> `"get-widgets-id"`
pub fn kebab(s: &str) -> String {
    words(s).join("-")
}

/// Legacy slug form: lowercase, with every run of other characters
/// collapsed into one dash. Case changes are not word boundaries.
///
/// `"getWidget"` -> `"getwidget"`
pub fn slug(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_alphanumeric() {
            result.extend(c.to_lowercase());
        } else if !result.is_empty() && !result.ends_with('-') {
            result.push('-');
        }
    }
    while result.ends_with('-') {
        result.pop();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kebab_camel_case() {
        assert_eq!(kebab("getWidget"), "get-widget");
    }

    #[test]
    fn kebab_pascal_case() {
        assert_eq!(kebab("CreatePod"), "create-pod");
    }

    #[test]
    fn kebab_consecutive_uppercase() {
        assert_eq!(kebab("getHTTPStatus"), "get-http-status");
        assert_eq!(kebab("HTMLParser"), "html-parser");
        assert_eq!(kebab("getAPI"), "get-api");
    }

    #[test]
    fn kebab_method_path() {
        assert_eq!(kebab("GET-widgets/{id}"), "get-widgets-id");
        assert_eq!(kebab("post-users/{user-id}/items"), "post-users-user-id-items");
    }

    #[test]
    fn kebab_separators() {
        assert_eq!(kebab("list_all_things"), "list-all-things");
        assert_eq!(kebab("v2Items"), "v2-items");
        assert_eq!(kebab(""), "");
    }

    #[test]
    fn slug_legacy_form() {
        assert_eq!(slug("getWidget"), "getwidget");
        assert_eq!(slug("get_widget"), "get-widget");
        assert_eq!(slug("  Weird..Name "), "weird-name");
    }
}
