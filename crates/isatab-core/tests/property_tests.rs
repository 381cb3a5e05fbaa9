//! # Property-Based Tests
//!
//! Invariants that must hold for any input:
//! header canonicalization, value-codec round-trip, deterministic output,
//! the row-count bound, path completeness and graph round-trip.
//!
//! Study graphs mix splits, pools, chained protocols and lone sources.
//! Assay graphs mix extracts, labeled extracts taken from samples or
//! extracts, and named runs producing data files.

use isatab_core::{
    Codec, Compositor, DataFileLabel, Graph, Ingestor, MaterialType, Node, NodeId,
    OntologyAnnotation, OntologySource, PathSet, Protocol, Qualifier, Registry, Report,
    RunAttribute, TabOptions, TableKind, Unit, Value, ValueShape, classify, clean, encode,
    is_isomorphic,
};
use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;

fn registry() -> Registry {
    Registry::new()
        .with_source(OntologySource::named("OBI"))
        .with_protocol(Protocol::new("sample collection"))
        .with_protocol(Protocol::new("aliquoting"))
        .with_protocol(Protocol::new("pooling"))
        .with_protocol(Protocol::new("extraction").with_parameters(["kit"]))
        .with_protocol(Protocol::new("labeling"))
        .with_protocol(Protocol::new("mass spectrometry").with_type("mass spectrometry"))
        .with_protocol(Protocol::new("hybridization").with_type("nucleic acid hybridization"))
}

// =============================================================================
// GENERATORS
// =============================================================================

/// What happens to the sources of one study stage.
#[derive(Debug, Clone)]
enum Fate {
    /// A source no protocol touches.
    Alone,
    /// One source split into samples.
    Split(usize),
    /// Sample collection linked to aliquoting, then samples.
    Chain(usize),
    /// Several sources pooled into one sample.
    Pool(usize),
}

#[derive(Debug, Clone)]
struct Stage {
    fate: Fate,
    organism: Option<String>,
    weight: Option<i64>,
}

fn fate() -> impl Strategy<Value = Fate> {
    prop_oneof![
        Just(Fate::Alone),
        (1usize..4).prop_map(Fate::Split),
        (1usize..3).prop_map(Fate::Chain),
        (2usize..4).prop_map(Fate::Pool),
    ]
}

fn stages() -> impl Strategy<Value = Vec<Stage>> {
    vec(
        (fate(), option::of("[a-z]{1,6}"), option::of(0i64..500)).prop_map(
            |(fate, organism, weight)| Stage {
                fate,
                organism,
                weight,
            },
        ),
        1..8,
    )
}

fn add_source(g: &mut Graph, name: String, stage: &Stage) -> NodeId {
    let src = g.add(Node::source(name));
    if let Some(organism) = &stage.organism {
        g.append_characteristic(src, Qualifier::new("organism", organism.as_str()))
            .expect("organism");
    }
    if let Some(weight) = stage.weight {
        g.append_characteristic(
            src,
            Qualifier::with_unit("weight", Value::Int(weight), Unit::Plain("kg".into())),
        )
        .expect("weight");
    }
    src
}

fn add_samples(g: &mut Graph, process: NodeId, prefix: &str, count: usize) {
    for j in 0..count {
        let s = g.add(Node::sample(format!("{prefix}-{j}")));
        g.add_output(process, s).expect("output");
        if j % 2 == 0 {
            g.append_characteristic(s, Qualifier::new("sex", "female"))
                .expect("sex");
        }
    }
}

fn study(stages: &[Stage]) -> Graph {
    let mut g = Graph::new();
    for (i, stage) in stages.iter().enumerate() {
        match stage.fate {
            Fate::Alone => {
                add_source(&mut g, format!("source{i}"), stage);
            }
            Fate::Split(samples) => {
                let src = add_source(&mut g, format!("source{i}"), stage);
                let p = g.add(Node::process("sample collection"));
                g.add_input(p, src).expect("input");
                add_samples(&mut g, p, &format!("sample{i}"), samples);
            }
            Fate::Chain(samples) => {
                let src = add_source(&mut g, format!("source{i}"), stage);
                let collect = g.add(Node::process("sample collection"));
                let aliquot = g.add(Node::process("aliquoting"));
                g.add_input(collect, src).expect("input");
                g.link(collect, aliquot).expect("link");
                add_samples(&mut g, aliquot, &format!("aliquot{i}"), samples);
            }
            Fate::Pool(width) => {
                let p = g.add(Node::process("pooling"));
                for k in 0..width {
                    let src = add_source(&mut g, format!("source{i}-{k}"), stage);
                    g.add_input(p, src).expect("input");
                }
                add_samples(&mut g, p, &format!("pool{i}"), 1);
            }
        }
    }
    g
}

/// One extract and the runs taken from it.
#[derive(Debug, Clone)]
struct ExtractPlan {
    spectra: usize,
    labeled: bool,
    hybridized: bool,
}

/// One assay sample: its extracts and an optional direct labeling.
#[derive(Debug, Clone)]
struct SamplePlan {
    kit: Option<String>,
    extracts: Vec<ExtractPlan>,
    labeled: bool,
    hybridized: bool,
}

fn samples() -> impl Strategy<Value = Vec<SamplePlan>> {
    let extract = (0usize..3, any::<bool>(), any::<bool>()).prop_map(
        |(spectra, labeled, hybridized)| ExtractPlan {
            spectra,
            labeled,
            hybridized,
        },
    );
    vec(
        (
            option::of("[a-z]{2,5}"),
            vec(extract, 0..3),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(kit, extracts, labeled, hybridized)| SamplePlan {
                kit,
                extracts,
                labeled,
                hybridized,
            }),
        1..6,
    )
}

/// `input -> labeling -> labeled extract`, then an optional named
/// hybridization producing one array file.
fn add_labeling(g: &mut Graph, input: NodeId, tag: &str, hybridized: bool) {
    let p = g.add(Node::process("labeling"));
    let le = g.add(Node::material(format!("label{tag}"), MaterialType::LabeledExtract));
    g.add_input(p, input).expect("input");
    g.add_output(p, le).expect("output");
    if hybridized {
        let hyb = g.add(Node::process("hybridization"));
        let f = g.add(Node::data_file(format!("scan{tag}.cel"), DataFileLabel::ArrayData));
        g.add_input(hyb, le).expect("input");
        g.add_output(hyb, f).expect("output");
        g.set_run_attribute(hyb, RunAttribute::Name, &format!("hyb{tag}"))
            .expect("name");
    }
}

fn assay(plans: &[SamplePlan]) -> Graph {
    let mut g = Graph::new();
    for (i, plan) in plans.iter().enumerate() {
        let s = g.add(Node::sample(format!("sample{i}")));
        if !plan.extracts.is_empty() {
            let ext = g.add(Node::process("extraction"));
            g.add_input(ext, s).expect("input");
            if let Some(kit) = &plan.kit {
                g.append_parameter_value(ext, Qualifier::new("kit", kit.as_str()))
                    .expect("kit");
            }
            for (j, extract) in plan.extracts.iter().enumerate() {
                let e = g.add(Node::material(format!("extract{i}-{j}"), MaterialType::Extract));
                g.add_output(ext, e).expect("output");
                if extract.spectra > 0 {
                    let ms = g.add(Node::process("mass spectrometry"));
                    g.add_input(ms, e).expect("input");
                    g.set_run_attribute(ms, RunAttribute::Name, &format!("ms{i}-{j}"))
                        .expect("name");
                    for k in 0..extract.spectra {
                        let f = g.add(Node::data_file(
                            format!("run{i}-{j}-{k}.raw"),
                            DataFileLabel::RawSpectralData,
                        ));
                        g.add_output(ms, f).expect("output");
                    }
                }
                if extract.labeled {
                    add_labeling(&mut g, e, &format!("{i}-{j}"), extract.hybridized);
                }
            }
        }
        if plan.labeled {
            add_labeling(&mut g, s, &format!("{i}"), plan.hybridized);
        }
    }
    g
}

/// A generated graph together with the table kind it is written as.
fn graphs() -> impl Strategy<Value = (Graph, TableKind)> {
    prop_oneof![
        stages().prop_map(|s| (study(&s), TableKind::Study)),
        samples().prop_map(|s| (assay(&s), TableKind::Assay)),
    ]
}

fn header() -> impl Strategy<Value = String> {
    let kinds = prop::sample::select(vec![
        "Source Name",
        "sample name",
        " Protocol REF ",
        "Extract Name",
        "MS Assay Name",
        "Raw Data File",
        "Unit",
        "Term Source REF",
        "Characteristics[organism]",
        "characteristics[ Material Type ]",
        "Factor Value[dose]",
        "Parameter Value[ temperature]",
        "Comment[note]",
        "Characteristics[label",
        "Mystery Column",
    ]);
    (kinds, option::of(1usize..5)).prop_map(|(k, n)| match n {
        Some(n) => format!("{k}.{n}"),
        None => k.to_string(),
    })
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Cleaning a header never changes its classification.
    #[test]
    fn header_canonicalization(h in header()) {
        prop_assert_eq!(classify(&clean(&h)), classify(&h));
    }

    /// Classification is total and stable over arbitrary labels.
    #[test]
    fn header_canonicalization_arbitrary(h in "[A-Za-z \\[\\]\\.0-9]{0,30}") {
        prop_assert_eq!(classify(&clean(&h)), classify(&h));
    }

    /// Text values decode to themselves.
    #[test]
    fn codec_text_roundtrip(text in "[A-Za-z0-9 ]{0,12}[A-Za-z]") {
        let registry = registry();
        let mut codec = Codec::new(&registry);
        let value = Value::Text(text);
        let cells = encode(ValueShape::Text, &value, None);
        let refs: Vec<&str> = cells.iter().map(String::as_str).collect();
        let decoded = codec.decode(ValueShape::Text, &refs, 0, &mut Report::new());
        prop_assert_eq!(decoded, Some((value, None)));
    }

    /// Ontology annotations decode to themselves, with or without accession.
    #[test]
    fn codec_term_roundtrip(
        term in "[a-z]{1,10}",
        accession in option::of("OBI_[0-9]{7}"),
    ) {
        let registry = registry();
        let mut codec = Codec::new(&registry);
        let oa = OntologyAnnotation {
            term,
            term_source: Some("OBI".to_string()),
            term_accession: accession,
        };
        let value = Value::Term(oa);
        let shape = ValueShape::of(&value, None);
        let cells = encode(shape, &value, None);
        let refs: Vec<&str> = cells.iter().map(String::as_str).collect();
        let mut report = Report::new();
        let decoded = codec.decode(shape, &refs, 0, &mut report);
        prop_assert_eq!(decoded, Some((value, None)));
        prop_assert!(report.is_clean());
    }

    /// Integers and floats with plain or ontology units decode to themselves.
    #[test]
    fn codec_number_roundtrip(
        int in any::<i64>(),
        float in 0.0f64..1.0e9,
        use_float in any::<bool>(),
        sourced_unit in any::<bool>(),
    ) {
        let registry = registry();
        let mut codec = Codec::new(&registry);
        let value = if use_float { Value::Float(float) } else { Value::Int(int) };
        let unit = if sourced_unit {
            Unit::Term(OntologyAnnotation::sourced("kilogram", "OBI", "UO_0000009"))
        } else {
            Unit::Plain("kg".to_string())
        };
        let shape = ValueShape::of(&value, Some(&unit));
        let cells = encode(shape, &value, Some(&unit));
        prop_assert_eq!(cells.len(), shape.width());
        let refs: Vec<&str> = cells.iter().map(String::as_str).collect();
        let decoded = codec.decode(shape, &refs, 0, &mut Report::new());
        prop_assert_eq!(decoded, Some((value, Some(unit))));
    }

    /// Serializing twice yields byte-identical output.
    #[test]
    fn serialization_is_deterministic((g, kind) in graphs()) {
        let options = TabOptions::default();
        let first = Compositor::write("t.txt", &g, kind, &registry(), &options)
            .expect("first");
        let second = Compositor::write("t.txt", &g.clone(), kind, &registry(), &options)
            .expect("second");
        prop_assert_eq!(first, second);
    }

    /// Emitted rows never outnumber enumerated paths.
    #[test]
    fn rows_bounded_by_paths((g, kind) in graphs()) {
        let paths = PathSet::enumerate(&g, kind).expect("paths");
        let table = Compositor::compose("t.txt", &g, kind, &registry(), &TabOptions::default())
            .expect("compose");
        prop_assert!(table.rows.len() <= paths.len());
    }

    /// Every input, output and link edge lies on some path.
    #[test]
    fn paths_cover_every_edge((g, kind) in graphs()) {
        let paths: Vec<Vec<NodeId>> = PathSet::enumerate(&g, kind)
            .expect("paths")
            .iter()
            .map(<[NodeId]>::to_vec)
            .collect();
        let covered = |from: NodeId, to: NodeId| {
            paths.iter().any(|p| p.windows(2).any(|w| w[0] == from && w[1] == to))
        };
        for (id, p) in g.processes() {
            for &i in &p.inputs {
                prop_assert!(covered(i, id));
            }
            for &o in &p.outputs {
                prop_assert!(covered(id, o));
            }
            if let Some(next) = p.next {
                prop_assert!(covered(id, next));
            }
        }
    }

    /// Writing a graph and reading the table back yields an isomorphic graph.
    #[test]
    fn graph_roundtrip((g, kind) in graphs()) {
        let options = TabOptions::default();
        let text = Compositor::write("t.txt", &g, kind, &registry(), &options)
            .expect("write");
        let back = Ingestor::read("t.txt", &text, kind, &mut registry(), &options)
            .expect("read");
        prop_assert!(back.report.is_clean(), "{}", back.report);
        prop_assert!(is_isomorphic(&g, &back.graph), "{}", text);
    }

    /// Pools and chains keep their shape through a round trip.
    #[test]
    fn study_shapes_survive(plan in stages()) {
        let g = study(&plan);
        let options = TabOptions::default();
        let text = Compositor::write("s.txt", &g, TableKind::Study, &registry(), &options)
            .expect("write");
        let back = Ingestor::read("s.txt", &text, TableKind::Study, &mut registry(), &options)
            .expect("read");
        let pools = plan.iter().filter(|s| matches!(s.fate, Fate::Pool(_))).count();
        let pooled = back
            .graph
            .processes()
            .filter(|(_, p)| p.protocol == "pooling" && p.inputs.len() >= 2)
            .count();
        prop_assert_eq!(pooled, pools);
        let chains = plan.iter().filter(|s| matches!(s.fate, Fate::Chain(_))).count();
        let linked = back.graph.processes().filter(|(_, p)| p.next.is_some()).count();
        prop_assert_eq!(linked, chains);
    }
}
