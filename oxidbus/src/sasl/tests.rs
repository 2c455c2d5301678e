use super::hex_encode;

#[test]
fn hex_encode_matches_reference_auth_line() {
    assert_eq!(hex_encode(b"1000"), "31303030");
    assert_eq!(hex_encode(b""), "");
}
