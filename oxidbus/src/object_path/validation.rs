use super::ObjectPathError;

/// Validate an object path per the D-Bus specification's grammar:
///
/// * Begins with `/`.
/// * Elements are separated by a single `/`.
/// * Each element matches `[A-Za-z0-9_]+`.
/// * No trailing `/` unless the path is the root `/`.
pub(super) fn validate(bytes: &[u8]) -> Result<(), ObjectPathError> {
    if bytes.first() != Some(&b'/') {
        return Err(ObjectPathError);
    }

    if bytes == b"/" {
        return Ok(());
    }

    for element in bytes[1..].split(|&b| b == b'/') {
        if element.is_empty() {
            return Err(ObjectPathError);
        }

        if !element
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || *b == b'_')
        {
            return Err(ObjectPathError);
        }
    }

    Ok(())
}
