use super::*;

const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<node name="/org/example/Sample">
  <interface name="org.example.Sample">
    <method name="Echo">
      <arg name="input" type="s" direction="in"/>
      <arg name="output" type="s" direction="out"/>
      <annotation name="org.freedesktop.DBus.Method.NoReply" value="false"/>
    </method>
    <signal name="Pinged">
      <arg name="count" type="u"/>
    </signal>
    <property name="Counter" type="u" access="read">
      <annotation name="org.freedesktop.DBus.Property.EmitsChangedSignal" value="true"/>
    </property>
    <property name="Label" type="s" access="readwrite"/>
  </interface>
  <node name="child"/>
</node>
"#;

#[test]
fn parses_full_document() {
    let node = parse_node(SAMPLE).expect("valid introspection document");

    assert_eq!(node.name.as_deref(), Some("/org/example/Sample"));
    assert_eq!(node.children.len(), 1);
    assert_eq!(node.children[0].name.as_deref(), Some("child"));

    assert_eq!(node.interfaces.len(), 1);
    let interface = &node.interfaces[0];
    assert_eq!(interface.name, "org.example.Sample");

    assert_eq!(interface.methods.len(), 1);
    let echo = &interface.methods[0];
    assert_eq!(echo.name, "Echo");
    assert_eq!(echo.in_signature().as_str(), "s");
    assert_eq!(echo.out_signature().as_str(), "s");
    assert_eq!(echo.annotations.len(), 1);

    assert_eq!(interface.signals.len(), 1);
    let pinged = &interface.signals[0];
    assert_eq!(pinged.name, "Pinged");
    assert_eq!(pinged.signature().as_str(), "u");

    assert_eq!(interface.properties.len(), 2);
    assert_eq!(interface.properties[0].name, "Counter");
    assert_eq!(interface.properties[0].access, Access::Read);
    assert_eq!(interface.properties[1].access, Access::ReadWrite);
}

#[test]
fn skips_documentation_elements() {
    let xml = r#"<node>
  <interface name="org.example.Doc">
    <doc>
      <summary>Ignored entirely.</summary>
    </doc>
    <method name="Noop"/>
  </interface>
</node>"#;

    let node = parse_node(xml).expect("doc elements are skipped, not rejected");
    assert_eq!(node.interfaces[0].methods[0].name, "Noop");
}

#[test]
fn rejects_unknown_element() {
    let xml = r#"<node><bogus/></node>"#;
    assert!(parse_node(xml).is_err());
}

#[test]
fn rejects_missing_required_attribute() {
    let xml = r#"<node><interface name="org.example.X"><method name="M"><arg/></method></interface></node>"#;
    assert!(parse_node(xml).is_err());
}

#[test]
fn round_trips_through_writer() {
    let node = parse_node(SAMPLE).unwrap();
    let rendered = write_node(&node);
    let reparsed = parse_node(&rendered).expect("writer output parses back");

    assert_eq!(reparsed.name, node.name);
    assert_eq!(reparsed.interfaces[0].methods.len(), node.interfaces[0].methods.len());
    assert_eq!(
        reparsed.interfaces[0].properties.len(),
        node.interfaces[0].properties.len()
    );
    assert_eq!(reparsed.children.len(), node.children.len());
}

#[test]
fn writer_escapes_special_characters() {
    let node = Node {
        name: Some("weird\"name".to_owned()),
        interfaces: Vec::new(),
        children: Vec::new(),
    };

    let rendered = write_node(&node);
    assert!(rendered.contains("weird&quot;name"));
}
