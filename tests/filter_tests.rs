//! End-to-end behaviour of the MC filter: tokenizer → filter → collected events.

use mcx::xml::XmlTokenizer;
use mcx::{
    Attribute, CompatibilityFilter, ErrorCategory, ErrorKind, FilterOptions, MC_NAMESPACE,
    XmlEvent, filter_str, tokenize_str,
};

fn run(xml: &str, opts: &FilterOptions) -> (Vec<XmlEvent>, Vec<ErrorKind>) {
    let mut filter = CompatibilityFilter::with_options(Vec::<XmlEvent>::new(), opts)
        .expect("valid options");
    tokenize_str(xml, &mut filter).unwrap_or_else(|e| panic!("tokenize failed: {e}\nXML: {xml}"));
    let kinds = filter.drain_errors().into_iter().map(|e| e.kind).collect();
    (filter.into_handler(), kinds)
}

fn supporting(uris: &[&str]) -> FilterOptions {
    let mut opts = FilterOptions::new();
    for uri in uris {
        opts.add_supported_namespace(uri, Vec::<String>::new());
    }
    opts
}

fn element_names(events: &[XmlEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            XmlEvent::StartElement { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect()
}

fn text(events: &[XmlEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            XmlEvent::Characters(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

fn alternate_content_doc() -> String {
    format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}" xmlns:a="urn:a" xmlns:b="urn:b"><mc:AlternateContent><mc:Choice Requires="a"><a:x/></mc:Choice><mc:Fallback><b:y/></mc:Fallback></mc:AlternateContent></r>"#
    )
}

// ============================================================================
// AlternateContent
// ============================================================================

#[test]
fn satisfied_choice_is_the_only_content_forwarded() {
    let (events, errors) = run(&alternate_content_doc(), &supporting(&["urn:a"]));
    assert_eq!(element_names(&events), ["r", "a:x"]);
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn fallback_forwarded_when_no_choice_matches() {
    let (events, errors) = run(&alternate_content_doc(), &FilterOptions::default());
    assert_eq!(element_names(&events), ["r", "b:y"]);
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn first_satisfiable_choice_wins() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}" xmlns:a="urn:a" xmlns:b="urn:b"><mc:AlternateContent><mc:Choice Requires="a b"><a:both/></mc:Choice><mc:Choice Requires="a"><a:first/></mc:Choice><mc:Choice Requires="a"><a:second/></mc:Choice></mc:AlternateContent></r>"#
    );
    let (events, errors) = run(&xml, &supporting(&["urn:a"]));
    assert_eq!(element_names(&events), ["r", "a:first"]);
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn no_match_and_no_fallback_forwards_nothing() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}" xmlns:b="urn:b"><mc:AlternateContent><mc:Choice Requires="b"><b:x>t</b:x></mc:Choice></mc:AlternateContent></r>"#
    );
    let (events, errors) = run(&xml, &FilterOptions::default());
    assert_eq!(element_names(&events), ["r"]);
    assert_eq!(text(&events), "");
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn wrapper_text_is_hidden_but_branch_text_kept() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}">a<mc:AlternateContent>hidden<mc:Fallback>b</mc:Fallback></mc:AlternateContent>c</r>"#
    );
    let (events, _) = run(&xml, &FilterOptions::default());
    assert_eq!(text(&events), "abc");
}

#[test]
fn nested_content_of_selected_branch_follows_ignorability() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}" xmlns:a="urn:a" xmlns:e="urn:e" mc:Ignorable="e"><mc:AlternateContent><mc:Choice Requires="a"><a:x><e:hint/><a:y/></a:x></mc:Choice></mc:AlternateContent></r>"#
    );
    let (events, errors) = run(&xml, &supporting(&["urn:a"]));
    assert_eq!(element_names(&events), ["r", "a:x", "a:y"]);
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn multiple_fallbacks_drop_the_second() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}" xmlns:a="urn:a"><mc:AlternateContent><mc:Fallback><a:one/></mc:Fallback><mc:Fallback><a:two/></mc:Fallback></mc:AlternateContent></r>"#
    );
    let (events, errors) = run(&xml, &supporting(&["urn:a"]));
    assert_eq!(element_names(&events), ["r", "a:one"]);
    assert_eq!(errors, [ErrorKind::MultipleFallbacks]);
}

#[test]
fn choice_after_fallback_is_late() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}" xmlns:a="urn:a"><mc:AlternateContent><mc:Fallback/><mc:Choice Requires="a"><a:x/></mc:Choice></mc:AlternateContent></r>"#
    );
    let (events, errors) = run(&xml, &supporting(&["urn:a"]));
    assert_eq!(element_names(&events), ["r"]);
    assert_eq!(errors, [ErrorKind::LateChoice]);
}

#[test]
fn prefixed_requires_attribute() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}" xmlns:a="urn:a"><mc:AlternateContent><mc:Choice mc:Requires="a"><a:x/></mc:Choice></mc:AlternateContent></r>"#
    );
    let (events, errors) = run(&xml, &supporting(&["urn:a"]));
    assert_eq!(element_names(&events), ["r"]);
    assert_eq!(errors, [ErrorKind::PrefixedAttribute]);
    assert!(errors[0].is_illegal_attribute());
}

#[test]
fn wrapper_attributes_follow_the_wrappers_own_ignorable() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}" xmlns:a="urn:a" xmlns:e="urn:e"><mc:AlternateContent mc:Ignorable="e" e:v="1"><mc:Choice Requires="a" mc:Ignorable="e" e:hint="1"><a:x/></mc:Choice><mc:Fallback><fb/></mc:Fallback></mc:AlternateContent></r>"#
    );
    let (events, errors) = run(&xml, &supporting(&["urn:a"]));
    assert_eq!(element_names(&events), ["r", "a:x"]);
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn requires_of_an_ignorable_namespace_is_not_a_prefixed_directive() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}" xmlns:a="urn:a" xmlns:e="urn:e" mc:Ignorable="e"><mc:AlternateContent><mc:Choice Requires="a" e:Requires="zz"><a:x/></mc:Choice></mc:AlternateContent></r>"#
    );
    let (events, errors) = run(&xml, &supporting(&["urn:a"]));
    assert_eq!(element_names(&events), ["r", "a:x"]);
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn fallback_child_keeps_its_own_attributes() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}" xmlns:a="urn:a" xmlns:b="urn:b"><mc:AlternateContent><mc:Choice Requires="a"><a:x/></mc:Choice><mc:Fallback><b:y b:k="1"/></mc:Fallback></mc:AlternateContent></r>"#
    );
    let (events, errors) = run(&xml, &FilterOptions::default());
    assert_eq!(element_names(&events), ["r", "b:y"]);
    assert!(errors.is_empty(), "{errors:?}");
    let attributes = events.iter().find_map(|e| match e {
        XmlEvent::StartElement { name, attributes } if name == "b:y" => Some(attributes),
        _ => None,
    });
    assert_eq!(attributes.map(Vec::as_slice), Some(&[Attribute::new("b:k", "1")][..]));
}

#[test]
fn choice_without_requires_is_missing_attribute() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}"><mc:AlternateContent><mc:Choice><x/></mc:Choice></mc:AlternateContent></r>"#
    );
    let (_, errors) = run(&xml, &FilterOptions::default());
    assert_eq!(errors, [ErrorKind::MissingAttribute]);
}

#[test]
fn unprefixed_directive_on_wrapper() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}"><mc:AlternateContent Ignorable="x"/></r>"#
    );
    let (_, errors) = run(&xml, &FilterOptions::default());
    assert_eq!(errors, [ErrorKind::UnprefixedAttribute]);
}

#[test]
fn directly_nested_alternate_content() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}"><mc:AlternateContent><mc:AlternateContent/><mc:Fallback><ok/></mc:Fallback></mc:AlternateContent></r>"#
    );
    let (events, errors) = run(&xml, &FilterOptions::default());
    assert_eq!(element_names(&events), ["r", "ok"]);
    assert_eq!(errors, [ErrorKind::XmlNestedAlternateContent]);
}

#[test]
fn alternate_content_inside_selected_choice_is_allowed() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}" xmlns:a="urn:a"><mc:AlternateContent><mc:Choice Requires="a"><a:x><mc:AlternateContent><mc:Fallback><a:inner/></mc:Fallback></mc:AlternateContent></a:x></mc:Choice></mc:AlternateContent></r>"#
    );
    let (events, errors) = run(&xml, &supporting(&["urn:a"]));
    assert_eq!(element_names(&events), ["r", "a:x", "a:inner"]);
    assert!(errors.is_empty(), "{errors:?}");
}

// ============================================================================
// Ignorable / ProcessContent / MustUnderstand
// ============================================================================

#[test]
fn ignorable_subtree_never_reaches_consumer() {
    let xml = format!(
        r#"<root xmlns:mc="{MC_NAMESPACE}" xmlns:e="ext" mc:Ignorable="e"><e:foo><e:bar>text</e:bar></e:foo></root>"#
    );
    let (events, errors) = run(&xml, &FilterOptions::default());
    assert_eq!(
        events,
        [
            XmlEvent::StartNamespace { prefix: "mc".into(), uri: MC_NAMESPACE.into() },
            XmlEvent::StartNamespace { prefix: "e".into(), uri: "ext".into() },
            XmlEvent::StartElement { name: "root".into(), attributes: Vec::new() },
            XmlEvent::EndElement { name: "root".into() },
            XmlEvent::EndNamespace { prefix: "e".into() },
            XmlEvent::EndNamespace { prefix: "mc".into() },
        ]
    );
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn process_content_forwards_listed_wrapper_only() {
    let xml = format!(
        r#"<root xmlns:mc="{MC_NAMESPACE}" xmlns:e="ext" mc:Ignorable="e" mc:ProcessContent="e:foo"><e:foo><e:bar>text</e:bar></e:foo></root>"#
    );
    let (events, errors) = run(&xml, &FilterOptions::default());
    assert_eq!(element_names(&events), ["root", "e:foo"]);
    assert_eq!(text(&events), "");
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn process_content_children_are_evaluated() {
    let xml = format!(
        r#"<root xmlns:mc="{MC_NAMESPACE}" xmlns:e="ext" mc:Ignorable="e" mc:ProcessContent="e:foo"><e:foo>keep<plain/></e:foo></root>"#
    );
    let (events, _) = run(&xml, &FilterOptions::default());
    assert_eq!(element_names(&events), ["root", "e:foo", "plain"]);
    assert_eq!(text(&events), "keep");
}

#[test]
fn process_content_must_name_ignorable_namespace() {
    let xml = format!(
        r#"<root xmlns:mc="{MC_NAMESPACE}" xmlns:e="ext" mc:ProcessContent="e:foo"><e:foo/></root>"#
    );
    let (events, errors) = run(&xml, &FilterOptions::default());
    assert!(element_names(&events).is_empty());
    assert_eq!(errors, [ErrorKind::InvalidNamespaceReference]);
}

#[test]
fn ignorable_scope_ends_with_declaring_element() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}" xmlns:e="ext"><a mc:Ignorable="e"><e:x/></a><e:y/></r>"#
    );
    let (events, errors) = run(&xml, &FilterOptions::default());
    assert_eq!(element_names(&events), ["r", "a"]);
    assert_eq!(errors, [ErrorKind::UnknownElement]);
}

#[test]
fn must_understand_unsupported_namespace() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}" xmlns:u="urn:u" mc:MustUnderstand="u"><x/></r>"#
    );
    let (events, errors) = run(&xml, &FilterOptions::default());
    assert!(events.is_empty(), "{events:?}");
    assert_eq!(errors, [ErrorKind::MustUnderstandViolation]);
    assert_eq!(errors[0].category(), ErrorCategory::InsufficientSupport);
}

#[test]
fn must_understand_satisfied() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}" xmlns:a="urn:a" mc:MustUnderstand="a" k="v"><a:x/></r>"#
    );
    let (events, errors) = run(&xml, &supporting(&["urn:a"]));
    assert_eq!(element_names(&events), ["r", "a:x"]);
    let XmlEvent::StartElement { attributes, .. } = &events[2] else {
        panic!("start tag expected: {events:?}");
    };
    assert_eq!(attributes, &[Attribute::new("k", "v")]);
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn attributes_of_ignorable_namespace_dropped() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}" xmlns:e="ext" mc:Ignorable="e" e:hint="1" xml:lang="de" mc:PreserveAttributes="e:hint"/>"#
    );
    let (events, errors) = run(&xml, &FilterOptions::default());
    let XmlEvent::StartElement { attributes, .. } = &events[2] else {
        panic!("start tag expected: {events:?}");
    };
    assert_eq!(attributes, &[Attribute::new("xml:lang", "de")]);
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn unknown_attribute_ignores_subtree() {
    let xml = r#"<r xmlns:u="urn:u"><x u:k="1"><y/></x><z/></r>"#;
    let (events, errors) = run(xml, &FilterOptions::default());
    assert_eq!(element_names(&events), ["r", "z"]);
    assert_eq!(errors, [ErrorKind::UnknownAttribute]);
    assert!(errors[0].is_unknown_item());
}

#[test]
fn unknown_element_ignored_and_rest_still_processed() {
    let xml = r#"<r xmlns:u="urn:u" xmlns:a="urn:a"><u:x><a:y/></u:x><a:z/><u:w/></r>"#;
    let (events, errors) = run(xml, &supporting(&["urn:a"]));
    assert_eq!(element_names(&events), ["r", "a:z"]);
    assert_eq!(errors, [ErrorKind::UnknownElement, ErrorKind::UnknownElement]);
}

#[test]
fn unbound_prefix_reported() {
    let xml = r#"<r><q:x/></r>"#;
    let (events, errors) = run(xml, &FilterOptions::default());
    assert_eq!(element_names(&events), ["r"]);
    assert_eq!(errors, [ErrorKind::UnknownNamespacePrefix]);
}

// ============================================================================
// Identity, extension elements, polling
// ============================================================================

/// `xmlns:a=""` hebt die Bindung auf; der Prefix der Optionen greift dann nicht.
#[test]
fn undeclared_prefix_does_not_use_registered_prefix() {
    let xml = r#"<r xmlns:a="urn:a"><inner xmlns:a=""><a:x/></inner><a:y/></r>"#;
    let mut opts = FilterOptions::new();
    opts.add_supported_namespace("urn:a", ["a"]);
    let (events, errors) = run(xml, &opts);
    assert_eq!(element_names(&events), ["r", "inner", "a:y"]);
    assert_eq!(errors, [ErrorKind::UnknownNamespacePrefix]);
}

#[test]
fn mc_free_document_is_identity() {
    let xml = r#"<doc xmlns="urn:d" xmlns:a="urn:a" k="v"><a:p a:at="1" xml:space="preserve">t &amp; u<!--c--><?pi data?></a:p><q/></doc>"#;

    let mut direct: Vec<XmlEvent> = Vec::new();
    tokenize_str(xml, &mut direct).unwrap();

    let (filtered, errors) = run(xml, &supporting(&["urn:d", "urn:a"]));
    assert_eq!(filtered, direct);
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn extension_element_passes_through_verbatim() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}" xmlns:x="urn:x"><x:blob x:k="1" mc:Ignorable="x"><mc:AlternateContent/><x:inner/></x:blob></r>"#
    );
    let opts = FilterOptions::default().with_extension_element("{urn:x}blob");
    let (events, errors) = run(&xml, &opts);
    assert_eq!(element_names(&events), ["r", "x:blob", "mc:AlternateContent", "x:inner"]);
    let XmlEvent::StartElement { attributes, .. } = &events[3] else {
        panic!("start tag expected: {events:?}");
    };
    assert_eq!(attributes.len(), 2);
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn comments_and_pis_follow_options() {
    let xml = r#"<r><!--c--><?t d?></r>"#;
    let opts = FilterOptions::default().with_comments(false).with_processing_instructions(false);
    let (events, _) = run(xml, &opts);
    assert_eq!(events.len(), 2);
}

#[test]
fn errors_polled_between_chunks() {
    let xml = r#"<r xmlns:u="urn:u"><u:a/><ok/><u:b/></r>"#;
    let mut filter = CompatibilityFilter::new(Vec::<XmlEvent>::new());
    let mut tokenizer = XmlTokenizer::new(xml.as_bytes());
    let mut per_step = Vec::new();
    while tokenizer.step(&mut filter).unwrap() {
        per_step.push(filter.drain_errors().len());
        assert!(!filter.error_reported());
    }
    assert_eq!(per_step.iter().sum::<usize>(), 2);
    assert_eq!(element_names(filter.handler()), ["r", "ok"]);
}

#[test]
fn serialized_output_redeclares_hidden_bindings() {
    let xml = format!(
        r#"<r xmlns:mc="{MC_NAMESPACE}"><mc:AlternateContent xmlns:a="urn:a"><mc:Choice Requires="a"><a:x/><a:y/></mc:Choice></mc:AlternateContent></r>"#
    );
    let (out, errors) = filter_str(&xml, &supporting(&["urn:a"])).unwrap();
    assert_eq!(
        out,
        format!(r#"<r xmlns:mc="{MC_NAMESPACE}"><a:x xmlns:a="urn:a"/><a:y xmlns:a="urn:a"/></r>"#)
    );
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn filtering_serialized_output_again_is_stable() {
    let opts = supporting(&["urn:a"]);
    let (once, _) = filter_str(&alternate_content_doc(), &opts).unwrap();
    let (twice, errors) = filter_str(&once, &opts).unwrap();
    assert_eq!(once, twice);
    assert!(errors.is_empty(), "{errors:?}");
}
