#![no_main]
use libfuzzer_sys::fuzz_target;
use mcx::{CompatibilityFilter, FilterOptions, XmlEvent};

fuzz_target!(|data: &[u8]| {
    let Ok(xml) = std::str::from_utf8(data) else {
        return;
    };
    let opts = FilterOptions::default()
        .with_supported_namespace("urn:a", ["a"])
        .with_extension_element("{urn:a}ext");
    let Ok(mut filter) = CompatibilityFilter::with_options(Vec::<XmlEvent>::new(), &opts) else {
        return;
    };
    let parsed = mcx::tokenize_str(xml, &mut filter);

    // Vorwaerts geleitete Start/End-Tags und Namespace-Scopes sind balanciert.
    let mut elements: Vec<&str> = Vec::new();
    let mut scopes: Vec<&str> = Vec::new();
    for event in filter.handler() {
        match event {
            XmlEvent::StartElement { name, .. } => elements.push(name),
            XmlEvent::EndElement { name } => assert_eq!(elements.pop(), Some(name.as_str())),
            XmlEvent::StartNamespace { prefix, .. } => scopes.push(prefix),
            XmlEvent::EndNamespace { prefix } => assert_eq!(scopes.pop(), Some(prefix.as_str())),
            _ => {}
        }
    }
    if parsed.is_ok() {
        assert!(elements.is_empty());
        assert!(scopes.is_empty());
    }
});
