use super::{ObjectPath, ObjectPathBuf};

#[test]
fn validates_paths() {
    assert!(ObjectPath::new("/").is_ok());
    assert!(ObjectPath::new("/org/example/Sample").is_ok());
    assert!(ObjectPath::new("/org/example/_1").is_ok());

    assert!(ObjectPath::new("").is_err());
    assert!(ObjectPath::new("no/leading/slash").is_err());
    assert!(ObjectPath::new("/trailing/").is_err());
    assert!(ObjectPath::new("/double//slash").is_err());
    assert!(ObjectPath::new("/bad-element").is_err());
}

#[test]
fn iterates_elements() {
    let path = ObjectPath::new("/org/example/Sample").unwrap();
    let elements: Vec<_> = path.iter().collect();
    assert_eq!(elements, ["org", "example", "Sample"]);

    assert_eq!(ObjectPath::ROOT.iter().next(), None);
}

#[test]
fn detects_strict_prefix() {
    let parent = ObjectPath::new("/org/example").unwrap();
    let child = ObjectPath::new("/org/example/Sample").unwrap();
    let unrelated = ObjectPath::new("/org/other").unwrap();

    assert!(parent.is_strict_prefix_of(child));
    assert!(!parent.is_strict_prefix_of(parent));
    assert!(!parent.is_strict_prefix_of(unrelated));
    assert_eq!(parent.immediate_child(child), Some("Sample"));

    assert!(ObjectPath::ROOT.is_strict_prefix_of(child));
    assert_eq!(ObjectPath::ROOT.immediate_child(child), Some("org"));
}

#[test]
fn builds_and_joins() {
    let root = ObjectPathBuf::root();
    let joined = root.join("org").unwrap().join("example").unwrap();
    assert_eq!(joined.as_str(), "/org/example");

    assert!(root.join("bad/element").is_err());
}
