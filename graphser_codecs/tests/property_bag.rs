use std::collections::BTreeMap;
use std::sync::Arc;

use graphser_codecs::{default_registry, PropertyBag, PropertySnapshot, PropertyValue};
use graphser_core::{from_bytes, to_bytes};

#[test]
fn test_parse_properties_text() {
    let text = "\
# build settings
! also a comment

org.gradle.jvmargs=-Xmx2g -Dfile.encoding=UTF-8
org.gradle.caching : true
version 1.4.0
   indented.key=indented value
empty=
";
    let bag = PropertyBag::parse(text);
    assert_eq!(bag.len(), 5);
    assert_eq!(bag.find("org.gradle.jvmargs"), Some("-Xmx2g -Dfile.encoding=UTF-8"));
    assert_eq!(bag.find("org.gradle.caching"), Some("true"));
    assert_eq!(bag.find("version"), Some("1.4.0"));
    assert_eq!(bag.find("indented.key"), Some("indented value"));
    assert_eq!(bag.find("empty"), Some(""));
    assert_eq!(bag.find("missing"), None);
}

#[test]
fn test_parse_escapes_and_continuations() {
    let text = "path=C:\\\\tools\\\\bin\nkey\\=with\\:seps=v\nlist=a,\\\n    b,\\\n    c\nsnow=\\u2603\ntab=a\\tb\n";
    let bag = PropertyBag::parse(text);
    assert_eq!(bag.find("path"), Some("C:\\tools\\bin"));
    assert_eq!(bag.find("key=with:seps"), Some("v"));
    assert_eq!(bag.find("list"), Some("a,b,c"));
    assert_eq!(bag.find("snow"), Some("\u{2603}"));
    assert_eq!(bag.find("tab"), Some("a\tb"));
}

#[test]
fn test_later_keys_win() {
    let bag = PropertyBag::parse("a=1\na=2\n");
    assert_eq!(bag.find("a"), Some("2"));
}

#[test]
fn test_properties_with_prefix() {
    let bag: PropertyBag = [
        ("systemProp.http.proxyHost", "proxy"),
        ("systemProp.http.proxyPort", "8080"),
        ("org.gradle.daemon", "false"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let system = bag.properties_with_prefix("systemProp.");
    let mut expected = BTreeMap::new();
    expected.insert("systemProp.http.proxyHost".to_string(), PropertyValue::from("proxy"));
    expected.insert("systemProp.http.proxyPort".to_string(), PropertyValue::from("8080"));
    assert_eq!(system, expected);
    assert!(bag.properties_with_prefix("nothing.").is_empty());
}

#[test]
fn test_snapshot_roundtrip_keeps_scope_order_and_sharing() {
    let registry = default_registry().unwrap();
    let build = Arc::new(PropertyBag::parse("org.gradle.parallel=true\n"));
    let lib = Arc::new(PropertyBag::parse("lib.flag=on\n"));

    let mut snapshot = PropertySnapshot::new();
    snapshot.push("build", Arc::clone(&build));
    snapshot.push(":lib", lib);
    snapshot.push(":app", build);

    let bytes = to_bytes(&registry, &snapshot).unwrap();
    let decoded: PropertySnapshot = from_bytes(&registry, &bytes).unwrap();

    let names: Vec<&str> = decoded.scopes().iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["build", ":lib", ":app"]);
    assert!(Arc::ptr_eq(decoded.scope("build").unwrap(), decoded.scope(":app").unwrap()));
    assert!(!Arc::ptr_eq(decoded.scope("build").unwrap(), decoded.scope(":lib").unwrap()));
    assert_eq!(decoded.scope(":lib").unwrap().find("lib.flag"), Some("on"));
}
