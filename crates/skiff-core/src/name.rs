//! Entry name validation.

/// Validate an entry name for use across backends.
///
/// Staging never calls this; callers validate user input before handing a
/// name to `rename` or `create`.
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name cannot be empty".into());
    }

    if name.len() > 255 {
        return Err("Name is too long (max 255 characters)".into());
    }

    for c in ['/', '\0'] {
        if name.contains(c) {
            return Err(format!("Name cannot contain '{}'", c.escape_default()));
        }
    }

    if name == "." || name == ".." {
        return Err("'.' and '..' are reserved names".into());
    }

    if name.starts_with(' ') || name.ends_with(' ') {
        return Err("Name cannot start or end with spaces".into());
    }

    if name.ends_with('.') {
        return Err("Name cannot end with a dot".into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_valid() {
        assert!(validate_name("report.pdf").is_ok());
        assert!(validate_name(".env").is_ok());
        assert!(validate_name("two words").is_ok());
    }

    #[test]
    fn test_validate_name_invalid() {
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name(" lead").is_err());
        assert!(validate_name("trail.").is_err());
        assert!(validate_name(&"x".repeat(256)).is_err());
    }
}
