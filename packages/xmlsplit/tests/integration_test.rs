//! End-to-end tests for the reader: scanning, extraction and batching
//! across one or more files.

use std::fs;
use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use tempfile::tempdir;
use xmlsplit::{
    Batch, CollectingSink, MemoryOpener, ReaderConfig, XmlReader, XmlSplitError,
};

const SCENARIO: &str = "<root><item>A</item><item>B</item></root>";

/// Load fixture file content.
fn load_fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load {}: {}", path.display(), e))
}

fn reader(tag: Option<&str>, per_batch: usize) -> XmlReader {
    let mut config = ReaderConfig::from_message()
        .with_tags_per_message(NonZeroUsize::new(per_batch).unwrap());
    config.read_tag = tag.map(String::from);
    XmlReader::new(config).unwrap()
}

fn names(files: &[&str]) -> Vec<String> {
    files.iter().map(|f| f.to_string()).collect()
}

fn run(reader: &XmlReader, opener: &MemoryOpener, files: &[&str]) -> Vec<Batch> {
    let mut sink = CollectingSink::new();
    reader
        .process_files(&names(files), opener, &mut sink, true)
        .unwrap();
    sink.batches
}

fn texts(batch: &Batch) -> Vec<&str> {
    batch.texts().collect()
}

/// Shared in-memory log sink for the fmt subscriber.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber and return what it logged.
fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    (result, logs)
}

fn default_notices(logs: &str) -> Vec<&str> {
    logs.lines()
        .filter(|line| line.contains("defaulting to root tag"))
        .collect()
}

#[test]
fn test_one_fragment_per_batch() {
    let opener = MemoryOpener::new().with_file("in.xml", SCENARIO);
    let batches = run(&reader(Some("item"), 1), &opener, &["in.xml"]);

    assert_eq!(batches.len(), 2);
    assert_eq!(texts(&batches[0]), vec!["<item>A</item>"]);
    assert_eq!(texts(&batches[1]), vec!["<item>B</item>"]);
    assert!(!batches[0].is_final);
    assert!(batches[1].is_final);
}

#[test]
fn test_two_fragments_per_batch() {
    let opener = MemoryOpener::new().with_file("in.xml", SCENARIO);
    let batches = run(&reader(Some("item"), 2), &opener, &["in.xml"]);

    assert_eq!(batches.len(), 1);
    assert_eq!(texts(&batches[0]), vec!["<item>A</item>", "<item>B</item>"]);
    assert!(batches[0].is_final);
}

#[test]
fn test_no_matches_emits_no_batches() {
    let opener = MemoryOpener::new().with_file("in.xml", "<root><other>A</other></root>");
    let batches = run(&reader(Some("item"), 1), &opener, &["in.xml"]);
    assert!(batches.is_empty());
}

#[test]
fn test_unset_tag_defaults_to_root() {
    let opener = MemoryOpener::new().with_file("in.xml", "<doc><a/></doc>");
    let batches = run(&reader(None, 1), &opener, &["in.xml"]);

    assert_eq!(batches.len(), 1);
    assert_eq!(texts(&batches[0]), vec!["<doc><a/></doc>"]);
}

#[test]
fn test_unset_tag_logs_default_notice() {
    let opener = MemoryOpener::new().with_file("in.xml", "<doc><a/></doc>");
    let (batches, logs) = with_captured_logs(|| run(&reader(None, 1), &opener, &["in.xml"]));

    assert_eq!(batches.len(), 1);
    let notices = default_notices(&logs);
    assert_eq!(notices.len(), 1, "logs:\n{logs}");
    assert!(notices[0].contains("INFO"));
    assert!(notices[0].contains("tag=doc"));
}

#[test]
fn test_default_notice_logged_once_per_run() {
    let opener = MemoryOpener::new()
        .with_file("a.xml", "<doc><x/></doc>")
        .with_file("b.xml", "<doc>y</doc>");
    let (batches, logs) =
        with_captured_logs(|| run(&reader(None, 1), &opener, &["a.xml", "b.xml"]));

    assert_eq!(batches.len(), 2);
    assert_eq!(default_notices(&logs).len(), 1, "logs:\n{logs}");
}

#[test]
fn test_configured_tag_logs_no_default_notice() {
    let opener = MemoryOpener::new().with_file("in.xml", SCENARIO);
    let (_, logs) = with_captured_logs(|| run(&reader(Some("item"), 1), &opener, &["in.xml"]));
    assert!(default_notices(&logs).is_empty(), "logs:\n{logs}");
}

#[test]
fn test_headers_name_the_source_file() {
    let opener = MemoryOpener::new()
        .with_file("a.xml", SCENARIO)
        .with_file("b.xml", SCENARIO);
    let batches = run(&reader(Some("item"), 1), &opener, &["a.xml", "b.xml"]);

    let sources: Vec<_> = batches
        .iter()
        .map(|b| b.headers["source.file.path"].as_str())
        .collect();
    assert_eq!(sources, vec!["a.xml", "a.xml", "b.xml", "b.xml"]);
}

#[test]
fn test_final_flag_only_on_last_batch_of_last_file() {
    let opener = MemoryOpener::new()
        .with_file("a.xml", "<r><item>1</item><item>2</item><item>3</item></r>")
        .with_file("b.xml", "<r><item>4</item></r>")
        .with_file("c.xml", "<r><item>5</item><item>6</item><item>7</item></r>");
    let batches = run(&reader(Some("item"), 2), &opener, &["a.xml", "b.xml", "c.xml"]);

    let sizes: Vec<_> = batches.iter().map(Batch::len).collect();
    assert_eq!(sizes, vec![2, 1, 1, 2, 1]);
    let finals: Vec<_> = batches.iter().map(|b| b.is_final).collect();
    assert_eq!(finals, vec![false, false, false, false, true]);
}

#[test]
fn test_no_final_flag_when_unit_of_work_continues() {
    let opener = MemoryOpener::new().with_file("in.xml", SCENARIO);
    let mut sink = CollectingSink::new();
    reader(Some("item"), 1)
        .process_files(&names(&["in.xml"]), &opener, &mut sink, false)
        .unwrap();
    assert_eq!(sink.batches.len(), 2);
    assert!(sink.batches.iter().all(|b| !b.is_final));
}

#[test]
fn test_fixture_fragments_are_verbatim() {
    let xml = load_fixture("catalog.xml");
    let opener = MemoryOpener::new().with_file("catalog.xml", xml.as_str());
    let batches = run(&reader(Some("book"), 10), &opener, &["catalog.xml"]);

    assert_eq!(batches.len(), 1);
    let fragments = texts(&batches[0]);
    assert_eq!(fragments.len(), 5);

    // Text between the previous tag and the match (here a comment line) is
    // part of the fragment.
    assert_eq!(
        fragments[0],
        concat!(
            "  <!-- <book id=\"commented-out\">ignored</book> -->\n",
            "  <book id=\"bk101\" format='hardcover'>\n",
            "    <author>Gambardella, Matthew</author>\n",
            "    <title>XML Developer's Guide</title>\n",
            "    <price currency=\"EUR\">44.95</price>\n",
            "    <description><![CDATA[An in-depth look at <book> and </book> tags.]]></description>\n",
            "  </book>"
        )
    );
    assert_eq!(
        fragments[1],
        concat!(
            "  <book id=\"bk102\" note=\"a > b\">\n",
            "      <author>Ralls, Kim</author>\n",
            "      <!-- odd indentation on purpose -->\n",
            "      <title>Midnight Rain</title>\n",
            "      <isbn/>\n",
            "  </book>"
        )
    );
    assert_eq!(fragments[2], "  <book id=\"bk103\"/>");
    assert_eq!(
        fragments[3],
        "  <book id=\"bk104\"><title>Maeve Ascendant</title></book>"
    );
    assert_eq!(
        fragments[4],
        "<book id=\"bk105\"><title>Oberon's Legacy</title></book>"
    );
}

#[test]
fn test_fixture_fragments_parse_as_standalone_elements() {
    let xml = load_fixture("catalog.xml");
    let opener = MemoryOpener::new().with_file("catalog.xml", xml.as_str());
    let batches = run(&reader(Some("book"), 2), &opener, &["catalog.xml"]);

    for fragment in batches.iter().flat_map(Batch::texts) {
        let doc = roxmltree::Document::parse(fragment)
            .unwrap_or_else(|e| panic!("fragment is not well-formed: {e}\n{fragment}"));
        assert_eq!(doc.root_element().tag_name().name(), "book");
    }
}

#[test]
fn test_root_extraction_reproduces_document() {
    let xml = load_fixture("catalog.xml");
    let opener = MemoryOpener::new().with_file("catalog.xml", xml.as_str());
    let batches = run(&reader(Some("catalog"), 1), &opener, &["catalog.xml"]);

    assert_eq!(batches.len(), 1);
    let fragment = batches[0].fragments[0].as_str();
    assert_eq!(fragment, xml.trim_end_matches('\n'));

    let with_dtd = || roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let reparsed = roxmltree::Document::parse_with_options(fragment, with_dtd()).unwrap();
    let original = roxmltree::Document::parse_with_options(&xml, with_dtd()).unwrap();
    assert_eq!(
        reparsed.root_element().descendants().count(),
        original.root_element().descendants().count()
    );
}

#[test]
fn test_extraction_is_idempotent() {
    let xml = load_fixture("catalog.xml");
    let opener = MemoryOpener::new().with_file("catalog.xml", xml.as_str());
    let reader = reader(Some("book"), 3);

    let first = run(&reader, &opener, &["catalog.xml"]);
    let second = run(&reader, &opener, &["catalog.xml"]);
    assert_eq!(first, second);
}

#[test]
fn test_crlf_file_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("crlf.xml");
    fs::write(&path, "<r>\r\n  <item>\r\n    A\r\n  </item>\r\n</r>\r\n").unwrap();

    let reader = XmlReader::new(
        ReaderConfig::for_path("crlf.xml")
            .with_read_tag("item")
            .with_base_dir(dir.path()),
    )
    .unwrap();
    let mut sink = CollectingSink::new();
    reader
        .handle(None, &reader.fs_opener(), &mut sink, true)
        .unwrap();

    assert_eq!(sink.fragments(), vec!["  <item>\r\n    A\r\n  </item>"]);
    assert_eq!(sink.batches[0].headers["source.file.path"], "crlf.xml");
}

#[test]
fn test_latin1_document_is_extracted() {
    let xml: &[u8] =
        b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<r>\n<item>caf\xE9</item>\n<item>na\xEFve</item>\n</r>\n";
    let opener = MemoryOpener::new().with_file("in.xml", xml.to_vec());
    let batches = run(&reader(Some("item"), 2), &opener, &["in.xml"]);

    assert_eq!(batches.len(), 1);
    assert_eq!(
        texts(&batches[0]),
        vec!["<item>caf\u{e9}</item>", "<item>na\u{ef}ve</item>"]
    );
}

#[test]
fn test_multibyte_text_on_one_line() {
    let opener =
        MemoryOpener::new().with_file("in.xml", "<r><i>é</i><i>über ✓</i><i>日本</i></r>");
    let batches = run(&reader(Some("i"), 5), &opener, &["in.xml"]);
    assert_eq!(
        texts(&batches[0]),
        vec!["<i>é</i>", "<i>über ✓</i>", "<i>日本</i>"]
    );
}

#[test]
fn test_nested_same_name_extracts_innermost() {
    let opener = MemoryOpener::new().with_file(
        "in.xml",
        "<r>\n  <node>\n    <node>leaf</node>\n  </node>\n</r>",
    );
    let batches = run(&reader(Some("node"), 5), &opener, &["in.xml"]);
    assert_eq!(texts(&batches[0]), vec!["    <node>leaf</node>"]);
}

#[test]
fn test_many_matches_in_large_file() {
    let mut xml = String::from("<feed>\n");
    for i in 0..5_000 {
        xml.push_str(&format!("  <entry n=\"{i}\">\n    <v>{i}</v>\n  </entry>\n"));
    }
    xml.push_str("</feed>\n");
    let opener = MemoryOpener::new().with_file("feed.xml", xml);

    let batches = run(&reader(Some("entry"), 100), &opener, &["feed.xml"]);
    assert_eq!(batches.len(), 50);
    assert!(batches.iter().all(|b| b.len() == 100));
    assert_eq!(
        batches[49].fragments[99].as_str(),
        "  <entry n=\"4999\">\n    <v>4999</v>\n  </entry>"
    );
}

#[test]
fn test_malformed_markup_aborts_and_keeps_delivered_batches() {
    let opener = MemoryOpener::new().with_file(
        "bad.xml",
        "<r>\n<item>1</item>\n<item>2</item>\n<item>3</item>\n</oops>",
    );
    let mut sink = CollectingSink::new();
    let err = reader(Some("item"), 1)
        .process_files(&names(&["bad.xml"]), &opener, &mut sink, true)
        .unwrap_err();

    match err {
        XmlSplitError::MalformedMarkup { path, line, .. } => {
            assert_eq!(path, "bad.xml");
            assert_eq!(line, 5);
        }
        other => panic!("expected malformed markup error, got {other:?}"),
    }
    // The batch still in flight when the error hit is not delivered.
    assert_eq!(sink.fragments(), vec!["<item>1</item>", "<item>2</item>"]);
    assert!(sink.batches.iter().all(|b| !b.is_final));
}

#[test]
fn test_missing_second_file_reports_its_path() {
    let opener = MemoryOpener::new().with_file("a.xml", SCENARIO);
    let mut sink = CollectingSink::new();
    let err = reader(Some("item"), 1)
        .process_files(&names(&["a.xml", "b.xml"]), &opener, &mut sink, true)
        .unwrap_err();

    assert!(err.to_string().contains("b.xml"));
    assert_eq!(sink.batches.len(), 2);
}

#[test]
fn test_from_message_requires_message() {
    let opener = MemoryOpener::new();
    let mut sink = CollectingSink::new();
    let err = reader(Some("item"), 1)
        .handle(None, &opener, &mut sink, true)
        .unwrap_err();
    assert!(matches!(err, XmlSplitError::Config(_)));
}
