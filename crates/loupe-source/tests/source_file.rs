use std::io::Write as _;
use std::rc::Rc;

use loupe_model::{ClassBuilder, ClassRegistry, Value};
use loupe_source::{
    DeclarationKind, FileFlags, LookupOptions, SourceError, SourceFile, StructureHandle,
};

const LIBRARY: &str = r#"<?php
namespace Acme\Text;

use Acme\Support\Arrays;
use Acme\Support\Strings as Str;

/**
 * Default separator between joined fragments.
 * @var string
 */
const SEPARATOR = ', ';

const LIMIT = 1_000;

interface Renderer
{
    const FORMAT = 'plain';

    public function render($value);
}

trait Countable
{
    public function count()
    {
        return 0;
    }
}

class Joiner implements Renderer
{
    use Countable;

    public function render($value)
    {
        return Joiner::class;
    }
}

function join_all($fragments)
{
    return implode(SEPARATOR, $fragments);
}
"#;

#[test]
fn declarations_are_indexed_in_order() {
    let file = SourceFile::from_source(LIBRARY, FileFlags::empty());

    assert_eq!(file.namespaces().unwrap(), vec!["Acme\\Text"]);
    assert_eq!(
        file.constant_names().unwrap(),
        vec!["Acme\\Text\\SEPARATOR", "Acme\\Text\\LIMIT"]
    );
    assert_eq!(file.interface_names().unwrap(), vec!["Acme\\Text\\Renderer"]);
    assert_eq!(file.trait_names().unwrap(), vec!["Acme\\Text\\Countable"]);
    assert_eq!(file.class_names().unwrap(), vec!["Acme\\Text\\Joiner"]);
    assert_eq!(
        file.structure_names().unwrap(),
        vec![
            "Acme\\Text\\Renderer",
            "Acme\\Text\\Countable",
            "Acme\\Text\\Joiner"
        ]
    );

    let functions: Vec<&str> = file
        .functions()
        .unwrap()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(functions, vec!["Acme\\Text\\join_all"]);
}

#[test]
fn two_scans_of_the_same_source_agree() {
    let first = SourceFile::from_source(LIBRARY, FileFlags::SAFE);
    let second = SourceFile::from_source(LIBRARY, FileFlags::SAFE);

    assert_eq!(
        first.structure_names().unwrap(),
        second.structure_names().unwrap()
    );
    assert_eq!(
        first.constant_names().unwrap(),
        second.constant_names().unwrap()
    );
    assert_eq!(first.use_aliases().unwrap(), second.use_aliases().unwrap());
}

#[test]
fn constant_values_follow_the_safe_flag() {
    let safe = SourceFile::from_source(LIBRARY, FileFlags::SAFE);
    let separator = safe.constant("SEPARATOR").unwrap();
    assert_eq!(separator.value().as_value(), Some(&Value::Str(", ".into())));
    let limit = safe.constant("LIMIT").unwrap();
    assert_eq!(limit.value().as_value(), Some(&Value::Int(1000)));

    let unsafe_file = SourceFile::from_source(LIBRARY, FileFlags::empty());
    let separator = unsafe_file.constant("SEPARATOR").unwrap();
    assert_eq!(separator.value().as_value(), None);
    assert_eq!(separator.value().source_text(), Some("', '"));
}

#[test]
fn constant_doc_comment_survives_indexing() {
    let file = SourceFile::from_source(LIBRARY, FileFlags::SAFE);
    let separator = file.constant("Acme\\Text\\SEPARATOR").unwrap();
    assert!(separator.doc_comment().contains("@var string"));
}

#[test]
fn non_literal_constant_falls_back_to_raw_text() {
    let file = SourceFile::from_source(
        "<?php const COMPUTED = 2 + 3; const PLAIN = 5;",
        FileFlags::SAFE,
    );
    let computed = file.constant("COMPUTED").unwrap();
    assert_eq!(computed.value().as_value(), None);
    assert_eq!(computed.value().source_text(), Some("2+3"));
    let plain = file.constant("PLAIN").unwrap();
    assert_eq!(plain.value().as_value(), Some(&Value::Int(5)));
}

#[test]
fn unterminated_string_constant_stays_raw() {
    // The lexer swallows the rest of the file into the literal; safe
    // evaluation must decline it, not panic on the byte boundary.
    let file = SourceFile::from_source("<?php const A = 'é", FileFlags::SAFE);
    assert_eq!(file.constant_names().unwrap(), vec!["A"]);
    let constant = file.constant("A").unwrap();
    assert_eq!(constant.value().as_value(), None);
    assert_eq!(constant.value().source_text(), Some("'é"));
}

#[test]
fn group_imports_do_not_pollute_the_alias_table() {
    let file = SourceFile::from_source(
        "<?php\nuse Acme\\{Alpha, Beta};\nuse Acme\\Support\\Strings;\n",
        FileFlags::empty(),
    );

    let aliases = file.use_aliases().unwrap();
    assert_eq!(aliases.get("Acme\\Support\\Strings"), Some(&"Strings".to_string()));
    assert!(aliases.keys().all(|name| !name.ends_with('\\')));
}

#[test]
fn structure_constants_are_scanned_on_demand() {
    let file = SourceFile::from_source(LIBRARY, FileFlags::SAFE);

    let format = file.structure_constant("Renderer", "FORMAT").unwrap();
    assert_eq!(format.name(), "FORMAT");
    assert_eq!(format.value().as_value(), Some(&Value::Str("plain".into())));

    // A second request answers from the cached table.
    let again = file.structure_constant("Acme\\Text\\Renderer", "FORMAT").unwrap();
    assert_eq!(again.value().as_value(), format.value().as_value());

    let missing = file.structure_constant("Renderer", "NOPE").unwrap_err();
    assert!(matches!(missing, SourceError::NotFound(_)));
}

#[test]
fn qualified_name_resolution_order() {
    let file = SourceFile::from_source(LIBRARY, FileFlags::empty());
    let options = LookupOptions::default();

    // Absolute names pass through with the root marker stripped.
    assert_eq!(
        file.qualified_name("\\Other\\Ns\\Thing", None, &options).unwrap(),
        "Other\\Ns\\Thing"
    );
    // Import aliases win over declarations.
    assert_eq!(
        file.qualified_name("Str", None, &options).unwrap(),
        "Acme\\Support\\Strings"
    );
    assert_eq!(
        file.qualified_name("Arrays", None, &options).unwrap(),
        "Acme\\Support\\Arrays"
    );
    // Short names resolve against the declared namespace.
    assert_eq!(
        file.qualified_name("Joiner", None, &options).unwrap(),
        "Acme\\Text\\Joiner"
    );
    assert_eq!(
        file.qualified_name("SEPARATOR", None, &options).unwrap(),
        "Acme\\Text\\SEPARATOR"
    );
    // Restricting the kinds filters the match.
    let only_classes = [DeclarationKind::Class];
    let error = file
        .qualified_name("SEPARATOR", Some(&only_classes), &options)
        .unwrap_err();
    assert!(matches!(error, SourceError::NotFound(_)));
}

#[test]
fn fully_qualified_name_keeps_the_root_marker() {
    let file = SourceFile::from_source(LIBRARY, FileFlags::empty());
    let options = LookupOptions::default();
    assert_eq!(
        file.fully_qualified_name("Joiner", None, &options).unwrap(),
        "\\Acme\\Text\\Joiner"
    );
    assert_eq!(
        file.fully_qualified_name("\\Kept\\As\\Is", None, &options).unwrap(),
        "\\Kept\\As\\Is"
    );
}

#[test]
fn global_lookup_consults_the_registry() {
    let mut registry = ClassRegistry::default();
    ClassBuilder::class("Acme\\Text\\External").register(&mut registry);
    let registry = Rc::new(registry);

    let file = SourceFile::from_source(LIBRARY, FileFlags::empty())
        .with_registry(Rc::clone(&registry));

    let options = LookupOptions::default();
    let error = file.qualified_name("External", None, &options).unwrap_err();
    assert!(matches!(error, SourceError::NotFound(_)));

    let options = LookupOptions {
        global: true,
        ..LookupOptions::default()
    };
    assert_eq!(
        file.qualified_name("External", None, &options).unwrap(),
        "Acme\\Text\\External"
    );
}

#[test]
fn namespace_override_restricts_candidates() {
    let source = "<?php
namespace First { const X = 1; }
namespace Second { const X = 2; }
";
    let file = SourceFile::from_source(source, FileFlags::SAFE);
    assert_eq!(file.namespaces().unwrap(), vec!["First", "Second"]);
    assert_eq!(file.constant_names().unwrap(), vec!["First\\X", "Second\\X"]);

    let options = LookupOptions {
        namespaces: Some(vec!["Second".to_string()]),
        ..LookupOptions::default()
    };
    assert_eq!(file.qualified_name("X", None, &options).unwrap(), "Second\\X");
}

#[test]
fn structure_kind_distinguishes_the_buckets() {
    let file = SourceFile::from_source(LIBRARY, FileFlags::empty());
    assert_eq!(
        file.structure_kind("Renderer").unwrap(),
        Some(DeclarationKind::Interface)
    );
    assert_eq!(
        file.structure_kind("Countable").unwrap(),
        Some(DeclarationKind::Trait)
    );
    assert_eq!(
        file.structure_kind("Joiner").unwrap(),
        Some(DeclarationKind::Class)
    );
    assert_eq!(file.structure_kind("join_all").unwrap(), None);
}

#[test]
fn open_reads_from_disk_lazily() {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(LIBRARY.as_bytes()).unwrap();
    tmp.flush().unwrap();

    let file = SourceFile::open(tmp.path(), FileFlags::SAFE).unwrap();
    assert!(file.path().is_some());
    assert_eq!(file.class_names().unwrap(), vec!["Acme\\Text\\Joiner"]);

    let missing = SourceFile::open("/no/such/file.php", FileFlags::empty());
    assert!(matches!(missing, Err(SourceError::Io { .. })));
}

#[test]
fn for_class_binds_declarations_to_the_registry() {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(LIBRARY.as_bytes()).unwrap();
    tmp.flush().unwrap();

    let mut registry = ClassRegistry::default();
    let joiner = ClassBuilder::class("Acme\\Text\\Joiner")
        .source_path(tmp.path())
        .register(&mut registry);
    let registry = Rc::new(registry);

    let file = SourceFile::for_class(&registry, joiner, FileFlags::empty()).unwrap();
    assert!(file.flags().contains(FileFlags::LOADED));

    match file.class("Joiner").unwrap() {
        StructureHandle::Bound { name, class } => {
            assert_eq!(name, "Acme\\Text\\Joiner");
            assert_eq!(class, joiner);
        }
        StructureHandle::Name(name) => panic!("expected a bound handle, got '{name}'"),
    }
    // The interface is not registered, so it stays a plain name.
    match file.interface("Renderer").unwrap() {
        StructureHandle::Name(name) => assert_eq!(name, "Acme\\Text\\Renderer"),
        StructureHandle::Bound { .. } => panic!("unexpected registry binding"),
    }
}

#[test]
fn class_keyword_in_strings_and_comments_is_inert() {
    let source = "<?php
// class NotReal
/* class AlsoNotReal */
const TEXT = 'class Fake {}';
class Real {}
";
    let file = SourceFile::from_source(source, FileFlags::SAFE);
    assert_eq!(file.class_names().unwrap(), vec!["Real"]);
    assert_eq!(
        file.constant("TEXT").unwrap().value().as_value(),
        Some(&Value::Str("class Fake {}".into()))
    );
}

#[test]
fn declaration_report_serializes_to_json() {
    let file = SourceFile::from_source(LIBRARY, FileFlags::empty());
    let report: Vec<(String, DeclarationKind)> = file
        .structure_names()
        .unwrap()
        .into_iter()
        .map(|name| {
            let kind = file.structure_kind(name).unwrap().unwrap();
            (name.to_string(), kind)
        })
        .collect();
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"Interface\""));
    assert!(json.contains("Acme\\\\Text\\\\Joiner"));
}

#[test]
fn duplicate_declaration_keeps_the_last_one() {
    let source = "<?php
const TWICE = 1;
const TWICE = 2;
";
    let file = SourceFile::from_source(source, FileFlags::SAFE);
    assert_eq!(file.constant_names().unwrap(), vec!["TWICE"]);
    assert_eq!(
        file.constant("TWICE").unwrap().value().as_value(),
        Some(&Value::Int(2))
    );
}
