//! Domain ID generation
//!
//! All IDs use the format: `{6-char-hex}-{type}-{slug}`
//! Example: `019430-job-send-weekly-report`

/// Generate a domain ID from type and title.
pub fn generate_id(domain_type: &str, title: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    let hex_prefix = &uuid.to_string()[..6];
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{hex_prefix}-{domain_type}")
    } else {
        format!("{hex_prefix}-{domain_type}-{slug}")
    }
}

fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_id_has_expected_shape() {
        let id = generate_id("job", "Send Weekly Report");
        assert!(id.contains("-job-"));
        assert!(id.ends_with("send-weekly-report"));
        assert_eq!(&id[6..7], "-");
    }

    #[test]
    fn slugify_strips_apostrophes() {
        assert_eq!(slugify("don't stop"), "dont-stop");
        assert_eq!(slugify("Multiple   Spaces"), "multiple-spaces");
    }

    #[test]
    fn generate_id_without_title_has_no_trailing_dash() {
        let id = generate_id("job", "");
        assert!(!id.ends_with('-'));
    }
}
