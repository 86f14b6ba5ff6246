//! Name and identifier grammars.
//!
//! Package names are slash-separated segments. A segment starts with an
//! ASCII letter, continues with letters, digits and the punctuation
//! characters `.`, `_`, `-`, and ends with a letter or digit. Tag and
//! reference names are single segments. Validation runs before any I/O.

use shop_archive::DIGEST_HEX_LEN;

use crate::error::{RegistryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Start of input or just after `/`: only a letter may follow.
    Start,
    /// After a letter or digit. Accepting.
    Word,
    /// After `.`, `_` or `-`.
    Punct,
}

fn is_punct(c: char) -> bool {
    matches!(c, '.' | '_' | '-')
}

fn scan(value: &str, allow_slash: bool) -> bool {
    let mut state = State::Start;
    for c in value.chars() {
        state = match state {
            State::Start if c.is_ascii_alphabetic() => State::Word,
            State::Word | State::Punct if c.is_ascii_alphanumeric() => State::Word,
            State::Word | State::Punct if is_punct(c) => State::Punct,
            State::Word if allow_slash && c == '/' => State::Start,
            _ => return false,
        };
    }
    state == State::Word
}

pub fn is_valid_package_name(name: &str) -> bool {
    scan(name, true)
}

pub fn is_valid_tag_name(name: &str) -> bool {
    scan(name, false)
}

/// References share the tag-name grammar.
pub fn is_valid_reference_name(name: &str) -> bool {
    scan(name, false)
}

pub fn is_valid_tag_value(value: &str) -> bool {
    fn edge(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '@')
    }

    let len = value.chars().count();
    len > 0
        && value
            .chars()
            .enumerate()
            .all(|(i, c)| edge(c) || (c == '.' && i != 0 && i != len - 1))
}

/// Exactly 40 lowercase hex characters.
pub fn is_valid_instance_id(id: &str) -> bool {
    id.len() == DIGEST_HEX_LEN && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

pub fn check_package_name(name: &str) -> Result<()> {
    if is_valid_package_name(name) {
        Ok(())
    } else {
        Err(RegistryError::InvalidPackageName(name.to_string()))
    }
}

pub fn check_instance_id(id: &str) -> Result<()> {
    if is_valid_instance_id(id) {
        Ok(())
    } else {
        Err(RegistryError::InvalidInstanceId(id.to_string()))
    }
}

pub fn check_tag_name(name: &str) -> Result<()> {
    if is_valid_tag_name(name) {
        Ok(())
    } else {
        Err(RegistryError::InvalidTagName(name.to_string()))
    }
}

pub fn check_tag_value(value: &str) -> Result<()> {
    if is_valid_tag_value(value) {
        Ok(())
    } else {
        Err(RegistryError::InvalidTagValue(value.to_string()))
    }
}

pub fn check_reference_name(name: &str) -> Result<()> {
    if is_valid_reference_name(name) {
        Ok(())
    } else {
        Err(RegistryError::InvalidReferenceName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_names_accepted() {
        for name in ["a", "a/b-c.d9", "tools/clang", "a.b", "a..b", "Ab9/c_d/e"] {
            assert!(is_valid_package_name(name), "{name}");
        }
    }

    #[test]
    fn package_names_rejected() {
        for name in ["", "/a", "a/", "a//b", ".a", "a.", "9a", "a/.b", "a-/b", "a b", "ä"] {
            assert!(!is_valid_package_name(name), "{name}");
        }
    }

    #[test]
    fn tag_names() {
        assert!(is_valid_tag_name("git_revision"));
        assert!(is_valid_tag_name("v1"));
        assert!(!is_valid_tag_name("1v"));
        assert!(!is_valid_tag_name("_x"));
        assert!(!is_valid_tag_name("x-"));
        assert!(!is_valid_tag_name("a/b"));
        assert!(is_valid_reference_name("latest"));
        assert!(!is_valid_reference_name("refs/latest"));
    }

    #[test]
    fn tag_values() {
        for value in ["deadbeef", "1.2.3", "user@host", "_x-", "9"] {
            assert!(is_valid_tag_value(value), "{value}");
        }
        for value in ["", ".1", "1.", "a/b", "a b", "a:b"] {
            assert!(!is_valid_tag_value(value), "{value}");
        }
    }

    #[test]
    fn instance_ids() {
        let valid = "0123456789abcdef0123456789abcdef01234567";
        assert!(is_valid_instance_id(valid));
        assert!(!is_valid_instance_id(&valid[..39]));
        assert!(!is_valid_instance_id(&format!("{valid}8")));
        assert!(!is_valid_instance_id(&valid.replace('a', "A")));
        assert!(!is_valid_instance_id(&valid.replace('a', "g")));
    }

    #[test]
    fn check_helpers_name_the_bad_input() {
        match check_package_name("/bad") {
            Err(RegistryError::InvalidPackageName(name)) => assert_eq!(name, "/bad"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            check_tag_value("bad value"),
            Err(RegistryError::InvalidTagValue(_))
        ));
    }
}
