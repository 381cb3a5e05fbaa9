//! # Scenario Tier Tests (T0-T3)
//!
//! ## Tiers
//! - T0: Header grammar and cell codec
//! - T1: Reconstruction of the reference tables
//! - T2: Serialization of the reference graphs
//! - T3: Round-trip and reconstruction edge cases

use isatab_core::{
    Compositor, DataFileLabel, DiagnosticCode, Graph, Ingestor, IsaError, MaterialType, Node,
    NodeTag, OntologyAnnotation, OntologySource, PathSet, Protocol, QuoteStyle, Qualifier, Registry,
    RunAttribute, StudyFactor, TabOptions, Table, TableKind, Translation, Unit, Value,
    is_isomorphic,
};
use std::time::{Duration, Instant};

const UO_KILOGRAM: &str = "http://purl.obolibrary.org/obo/UO_0000009";
const TAXON_HUMAN: &str = "http://purl.obolibrary.org/obo/NCBITaxon_9606";

fn registry() -> Registry {
    Registry::new()
        .with_source(OntologySource::named("NCBITaxon"))
        .with_source(OntologySource::named("UO"))
        .with_protocol(Protocol::new("sample collection"))
        .with_protocol(Protocol::new("aliquoting"))
        .with_protocol(Protocol::new("extraction"))
        .with_protocol(Protocol::new("labeling"))
        .with_protocol(Protocol::new("mass spectrometry").with_type("mass spectrometry"))
        .with_protocol(Protocol::new("hybridization").with_type("nucleic acid hybridization"))
        .with_factor(StudyFactor::new("dose"))
}

fn plain() -> TabOptions {
    TabOptions {
        write_quotes: QuoteStyle::Never,
        ..TabOptions::default()
    }
}

fn tsv(lines: &[&[&str]]) -> String {
    lines.iter().map(|l| format!("{}\n", l.join("\t"))).collect()
}

fn read(text: &str, kind: TableKind) -> Translation {
    Ingestor::read("t.txt", text, kind, &mut registry(), &plain()).expect("read")
}

fn compose(graph: &Graph, kind: TableKind) -> Table {
    Compositor::compose("t.txt", graph, kind, &registry(), &plain()).expect("compose")
}

fn rows(table: &Table) -> Vec<Vec<&str>> {
    table
        .rows
        .iter()
        .map(|r| r.iter().map(String::as_str).collect())
        .collect()
}

// =============================================================================
// REFERENCE GRAPHS
// =============================================================================

fn split() -> Graph {
    let mut g = Graph::new();
    let src = g.add(Node::source("source1"));
    let p = g.add(Node::process("sample collection"));
    let s1 = g.add(Node::sample("sample1"));
    let s2 = g.add(Node::sample("sample2"));
    g.add_input(p, src).expect("input");
    g.add_output(p, s1).expect("output");
    g.add_output(p, s2).expect("output");
    g
}

fn pool() -> Graph {
    let mut g = Graph::new();
    let a = g.add(Node::source("source1"));
    let b = g.add(Node::source("source2"));
    let p = g.add(Node::process("sample collection"));
    let s = g.add(Node::sample("sample1"));
    g.add_input(p, a).expect("input");
    g.add_input(p, b).expect("input");
    g.add_output(p, s).expect("output");
    g
}

fn chained() -> Graph {
    let mut g = Graph::new();
    let src = g.add(Node::source("source1"));
    let p1 = g.add(Node::process("sample collection"));
    let p2 = g.add(Node::process("aliquoting"));
    let s = g.add(Node::sample("aliquot1"));
    g.add_input(p1, src).expect("input");
    g.link(p1, p2).expect("link");
    g.add_output(p2, s).expect("output");
    g
}

fn mass_spec() -> Graph {
    let mut g = Graph::new();
    let s = g.add(Node::sample("sample1"));
    let ext = g.add(Node::process("extraction"));
    let e = g.add(Node::material("extract1", MaterialType::Extract));
    let ms = g.add(Node::process("mass spectrometry"));
    let f = g.add(Node::data_file("run1.raw", DataFileLabel::RawSpectralData));
    g.add_input(ext, s).expect("input");
    g.add_output(ext, e).expect("output");
    g.add_input(ms, e).expect("input");
    g.add_output(ms, f).expect("output");
    g.set_run_attribute(ms, RunAttribute::Name, "assay1")
        .expect("name");
    g
}

fn organism() -> Graph {
    let mut g = Graph::new();
    let src = g.add(Node::source("source1"));
    g.append_characteristic(
        src,
        Qualifier::new(
            "Organism",
            OntologyAnnotation::sourced("Homo sapiens", "NCBITaxon", TAXON_HUMAN),
        ),
    )
    .expect("characteristic");
    g
}

fn body_weight() -> Graph {
    let mut g = Graph::new();
    let src = g.add(Node::source("source1"));
    g.append_characteristic(
        src,
        Qualifier::with_unit(
            "body weight",
            Value::Int(72),
            Unit::Term(OntologyAnnotation::sourced("kilogram", "UO", UO_KILOGRAM)),
        ),
    )
    .expect("characteristic");
    g
}

// =============================================================================
// TIER T0: HEADER GRAMMAR AND CELL CODEC
// =============================================================================

mod t0_grammar {
    use super::*;
    use isatab_core::{HeaderKind, classify, clean};

    /// T0.1: Labels classify case- and whitespace-insensitively.
    #[test]
    fn labels_are_tolerant() {
        assert_eq!(classify(" source name ").kind, HeaderKind::Source);
        assert_eq!(
            classify("ms assay name").kind,
            HeaderKind::AssayName(isatab_core::AssayNameLabel::MsAssayName)
        );
        assert_eq!(clean("Characteristics [organism].2"), "Characteristics[organism]");
    }

    /// T0.2: Unknown labels survive verbatim.
    #[test]
    fn unknown_labels_survive() {
        let h = classify("Lab Notebook Page");
        assert_eq!(h.kind, HeaderKind::Ignored);
        assert_eq!(h.label(), "Lab Notebook Page");
    }

    /// T0.3: Unmatched brackets are fatal for the file.
    #[test]
    fn unmatched_bracket_is_fatal() {
        let text = tsv(&[&["Source Name", "Characteristics[organism"], &["s1", "mouse"]]);
        let result = Ingestor::read("t.txt", &text, TableKind::Study, &mut registry(), &plain());
        assert!(matches!(result, Err(IsaError::UnmatchedBracket { .. })));
    }

    /// T0.4: A missing header line is fatal.
    #[test]
    fn empty_file_is_fatal() {
        let result = Ingestor::read("t.txt", "", TableKind::Study, &mut registry(), &plain());
        assert!(matches!(result, Err(IsaError::HeaderMissing { .. })));
    }
}

// =============================================================================
// TIER T1: RECONSTRUCTION
// =============================================================================

mod t1_reconstruction {
    use super::*;

    /// T1.1: Split reads back as one process with two outputs.
    #[test]
    fn split_table() {
        let t = read(
            &tsv(&[
                &["Source Name", "Protocol REF", "Sample Name"],
                &["source1", "sample collection", "sample1"],
                &["source1", "sample collection", "sample2"],
            ]),
            TableKind::Study,
        );
        assert!(t.report.is_clean(), "{}", t.report);
        assert!(is_isomorphic(&t.graph, &split()));
    }

    /// T1.2: Pool reads back as one process with two inputs.
    #[test]
    fn pool_table() {
        let t = read(
            &tsv(&[
                &["Source Name", "Protocol REF", "Sample Name"],
                &["source1", "sample collection", "sample1"],
                &["source2", "sample collection", "sample1"],
            ]),
            TableKind::Study,
        );
        assert!(t.report.is_clean(), "{}", t.report);
        assert!(is_isomorphic(&t.graph, &pool()));
    }

    /// T1.3: Consecutive protocol columns become linked processes.
    #[test]
    fn chained_table() {
        let t = read(
            &tsv(&[
                &["Source Name", "Protocol REF", "Protocol REF", "Sample Name"],
                &["source1", "sample collection", "aliquoting", "aliquot1"],
            ]),
            TableKind::Study,
        );
        assert!(t.is_valid(), "{}", t.report);
        assert!(is_isomorphic(&t.graph, &chained()));
    }

    /// T1.4: The MS assay name names its process.
    #[test]
    fn mass_spec_table() {
        let t = read(
            &tsv(&[
                &[
                    "Sample Name",
                    "Protocol REF",
                    "Extract Name",
                    "Protocol REF",
                    "MS Assay Name",
                    "Raw Spectral Data File",
                ],
                &["sample1", "extraction", "extract1", "mass spectrometry", "assay1", "run1.raw"],
            ]),
            TableKind::Assay,
        );
        assert!(t.report.is_clean(), "{}", t.report);
        assert!(is_isomorphic(&t.graph, &mass_spec()));
    }

    /// T1.5: Term Source REF and accession make an ontology annotation.
    #[test]
    fn organism_table() {
        let t = read(
            &tsv(&[
                &[
                    "Source Name",
                    "Characteristics[Organism]",
                    "Term Source REF",
                    "Term Accession Number",
                ],
                &["source1", "Homo sapiens", "NCBITaxon", TAXON_HUMAN],
            ]),
            TableKind::Study,
        );
        assert!(t.report.is_clean(), "{}", t.report);
        assert!(is_isomorphic(&t.graph, &organism()));
        let src = t.graph.find(NodeTag::Source, "source1").expect("source");
        let c = &t.graph.node(src).expect("node").characteristics()[0];
        assert!(matches!(&c.value, Value::Term(oa) if oa.source_cell() == "NCBITaxon"));
    }

    /// T1.6: A number with an ontology unit is promoted.
    #[test]
    fn body_weight_table() {
        let t = read(
            &tsv(&[
                &[
                    "Source Name",
                    "Characteristics[body weight]",
                    "Unit",
                    "Term Source REF",
                    "Term Accession Number",
                ],
                &["source1", "72", "kilogram", "UO", UO_KILOGRAM],
            ]),
            TableKind::Study,
        );
        assert!(t.report.is_clean(), "{}", t.report);
        let src = t.graph.find(NodeTag::Source, "source1").expect("source");
        let c = &t.graph.node(src).expect("node").characteristics()[0];
        assert_eq!(c.value, Value::Int(72));
        assert!(matches!(&c.unit, Some(Unit::Term(oa)) if oa.term == "kilogram"));
    }
}

// =============================================================================
// TIER T2: SERIALIZATION
// =============================================================================

mod t2_serialization {
    use super::*;

    /// T2.1: Split writes one row per sample.
    #[test]
    fn split_rows() {
        let table = compose(&split(), TableKind::Study);
        assert_eq!(table.headers, ["Source Name", "Protocol REF", "Sample Name"]);
        assert_eq!(
            rows(&table),
            [
                ["source1", "sample collection", "sample1"],
                ["source1", "sample collection", "sample2"]
            ]
        );
    }

    /// T2.2: Pool writes one row per source, sharing the sample.
    #[test]
    fn pool_rows() {
        let table = compose(&pool(), TableKind::Study);
        assert_eq!(
            rows(&table),
            [
                ["source1", "sample collection", "sample1"],
                ["source2", "sample collection", "sample1"]
            ]
        );
    }

    /// T2.3: Linked processes get one Protocol REF each.
    #[test]
    fn chained_columns() {
        let table = compose(&chained(), TableKind::Study);
        assert_eq!(
            table.headers,
            ["Source Name", "Protocol REF", "Protocol REF", "Sample Name"]
        );
        assert_eq!(
            rows(&table),
            [["source1", "sample collection", "aliquoting", "aliquot1"]]
        );
    }

    /// T2.4: MS Assay Name follows the mass spectrometry Protocol REF.
    #[test]
    fn assay_name_column() {
        let table = compose(&mass_spec(), TableKind::Assay);
        let at = table
            .headers
            .iter()
            .position(|h| h == "MS Assay Name")
            .expect("assay name column");
        assert_eq!(table.headers[at - 1], "Protocol REF");
        assert_eq!(table.rows[0][at - 1], "mass spectrometry");
        assert_eq!(table.rows[0][at], "assay1");
    }

    /// T2.5: An ontology characteristic takes three columns.
    #[test]
    fn ontology_columns() {
        let table = compose(&organism(), TableKind::Study);
        assert_eq!(
            table.headers,
            [
                "Source Name",
                "Characteristics[Organism]",
                "Term Source REF",
                "Term Accession Number"
            ]
        );
        assert_eq!(
            rows(&table),
            [["source1", "Homo sapiens", "NCBITaxon", TAXON_HUMAN]]
        );
    }

    /// T2.6: A number with an ontology unit takes four columns.
    #[test]
    fn unit_columns() {
        let table = compose(&body_weight(), TableKind::Study);
        assert_eq!(
            table.headers,
            [
                "Source Name",
                "Characteristics[body weight]",
                "Unit",
                "Term Source REF",
                "Term Accession Number"
            ]
        );
        assert_eq!(
            rows(&table),
            [["source1", "72", "kilogram", "UO", UO_KILOGRAM]]
        );
    }

    /// T2.7: Factor values are left out of assay tables unless asked for.
    #[test]
    fn assay_factor_values_are_optional() {
        let mut g = mass_spec();
        let sample = g.find(NodeTag::Sample, "sample1").expect("sample");
        g.append_factor_value(sample, Qualifier::new("dose", "high"))
            .expect("factor");
        let without = compose(&g, TableKind::Assay);
        assert!(!without.headers.iter().any(|h| h == "Factor Value[dose]"));

        let options = TabOptions {
            write_factor_values_in_assays: true,
            ..plain()
        };
        let with = Compositor::compose("a.txt", &g, TableKind::Assay, &registry(), &options)
            .expect("compose");
        assert!(with.headers.iter().any(|h| h == "Factor Value[dose]"));
    }
}

// =============================================================================
// TIER T3: ROUND-TRIP AND EDGE CASES
// =============================================================================

mod t3_roundtrip {
    use super::*;

    fn roundtrip(graph: &Graph, kind: TableKind) {
        let text = Compositor::write("t.txt", graph, kind, &registry(), &TabOptions::default())
            .expect("write");
        let back = Ingestor::read("t.txt", &text, kind, &mut registry(), &TabOptions::default())
            .expect("read");
        assert!(back.report.is_clean(), "{}", back.report);
        assert!(is_isomorphic(graph, &back.graph), "{text}");
    }

    /// T3.1: Every reference graph survives a write and a read.
    #[test]
    fn reference_graphs_roundtrip() {
        roundtrip(&split(), TableKind::Study);
        roundtrip(&pool(), TableKind::Study);
        roundtrip(&chained(), TableKind::Study);
        roundtrip(&mass_spec(), TableKind::Assay);
        roundtrip(&organism(), TableKind::Study);
        roundtrip(&body_weight(), TableKind::Study);
    }

    /// T3.2: Writing, reading and writing again is byte-identical.
    #[test]
    fn rewriting_is_stable() {
        let text = tsv(&[
            &["Source Name", "Protocol REF", "Sample Name", "Comment[batch]"],
            &["source1", "sample collection", "sample1", "b1"],
            &["source2", "sample collection", "sample2", "b2"],
        ]);
        let first = read(&text, TableKind::Study);
        let written = Compositor::write("t.txt", &first.graph, TableKind::Study, &registry(), &plain())
            .expect("write");
        assert_eq!(written, text);
    }

    /// T3.3: Duplicate rows collapse on write.
    #[test]
    fn duplicate_rows_collapse() {
        let text = tsv(&[
            &["Source Name", "Protocol REF", "Sample Name"],
            &["source1", "sample collection", "sample1"],
            &["source1", "sample collection", "sample1"],
        ]);
        let t = read(&text, TableKind::Study);
        assert_eq!(compose(&t.graph, TableKind::Study).rows.len(), 1);
    }

    /// T3.4: Columns empty in every row are dropped unless asked to keep.
    #[test]
    fn empty_units_are_dropped() {
        let mut g = Graph::new();
        let e = g.add(Node::material("le1", MaterialType::LabeledExtract));
        let p = g.add(Node::process("hybridization"));
        let f = g.add(Node::data_file("scan1.cel", DataFileLabel::ArrayData));
        g.add_input(p, e).expect("input");
        g.add_output(p, f).expect("output");
        g.set_run_attribute(p, RunAttribute::Name, "hyb1")
            .expect("name");

        let dropped = compose(&g, TableKind::Assay);
        assert_eq!(
            dropped.headers,
            ["Labeled Extract Name", "Protocol REF", "Hybridization Assay Name", "Array Data File"]
        );

        let options = TabOptions {
            drop_empty_columns: false,
            ..plain()
        };
        let kept = Compositor::compose("a.txt", &g, TableKind::Assay, &registry(), &options)
            .expect("compose");
        assert_eq!(
            kept.headers,
            [
                "Labeled Extract Name",
                "Protocol REF",
                "Hybridization Assay Name",
                "Array Design REF",
                "Array Data File"
            ]
        );
        assert_eq!(kept.rows[0][3], "");
    }

    /// T3.5: Skipped rows are reported and leave the rest intact.
    #[test]
    fn semantic_errors_skip_rows() {
        let text = tsv(&[
            &["Source Name", "Protocol REF", "Sample Name", "Factor Value[time]"],
            &["source1", "sample collection", "sample1", ""],
            &["source2", "sample collection", "sample2", "4h"],
        ]);
        let t = read(&text, TableKind::Study);
        assert!(!t.is_valid());
        assert!(t.report.has(DiagnosticCode::UnregisteredFactor));
        assert_eq!(t.report.skipped_rows.len(), 1);
        assert!(t.graph.find(NodeTag::Sample, "sample1").is_some());
        assert!(t.graph.find(NodeTag::Source, "source2").is_none());
    }

    /// T3.6: Disambiguation suffixes do not survive a write.
    #[test]
    fn suffixes_do_not_survive() {
        let text = tsv(&[
            &["Sample Name", "Protocol REF", "Extract Name", "Protocol REF", "Extract Name.1"],
            &["sample1", "extraction", "e1", "extraction", "e2"],
        ]);
        let t = read(&text, TableKind::Assay);
        assert!(t.is_valid(), "{}", t.report);
        let table = compose(&t.graph, TableKind::Assay);
        assert_eq!(
            table.headers,
            ["Sample Name", "Protocol REF", "Extract Name", "Protocol REF", "Extract Name"]
        );
        let again = read(&table.to_tsv(&plain()).expect("tsv"), TableKind::Assay);
        assert!(is_isomorphic(&t.graph, &again.graph));
    }

    /// T3.7: A sample labeled directly and through an extract keeps both runs.
    #[test]
    fn mixed_material_paths_roundtrip() {
        let mut g = mass_spec();
        let s = g.find(NodeTag::Sample, "sample1").expect("sample");
        let label = g.add(Node::process("labeling"));
        let le = g.add(Node::material("le1", MaterialType::LabeledExtract));
        let hyb = g.add(Node::process("hybridization"));
        let f = g.add(Node::data_file("scan1.cel", DataFileLabel::ArrayData));
        g.add_input(label, s).expect("input");
        g.add_output(label, le).expect("output");
        g.add_input(hyb, le).expect("input");
        g.add_output(hyb, f).expect("output");
        g.set_run_attribute(hyb, RunAttribute::Name, "hyb1")
            .expect("name");

        let table = compose(&g, TableKind::Assay);
        let is_node = |h: &str| h.ends_with(" File") || (h.ends_with(" Name") && !h.contains("Assay"));
        assert!(
            table.headers.windows(2).all(|w| !(is_node(&w[0]) && is_node(&w[1]))),
            "{:?}",
            table.headers
        );
        roundtrip(&g, TableKind::Assay);
    }

    /// T3.8: Ten thousand paths are enumerated, written and read back quickly.
    #[test]
    fn ten_thousand_paths_stay_fast() {
        let mut g = Graph::new();
        for i in 0..5_000 {
            let src = g.add(Node::source(format!("source{i}")));
            let p = g.add(Node::process("sample collection"));
            g.add_input(p, src).expect("input");
            for j in 0..2 {
                let s = g.add(Node::sample(format!("sample{i}-{j}")));
                g.add_output(p, s).expect("output");
            }
        }

        let started = Instant::now();
        let paths = PathSet::enumerate(&g, TableKind::Study).expect("paths");
        assert_eq!(paths.len(), 10_000);
        let table = compose(&g, TableKind::Study);
        assert_eq!(table.rows.len(), 10_000);
        let back = read(&table.to_tsv(&plain()).expect("tsv"), TableKind::Study);
        assert!(back.is_valid(), "{}", back.report);
        assert_eq!(back.graph.len(), g.len());
        let elapsed = started.elapsed();
        assert!(elapsed < Duration::from_secs(30), "took {elapsed:?}");
    }
}
