//! Building, validating and round-tripping whole collections

use histbuf::{
    Assignment, Axis, BinnedEvaluatedFunction, CategoryBinning, Chunk, CodecConfig, Collection,
    Column, ColumnChunk, Counts, DType, Distribution, EdgesBinning, Endianness, ErrorCategory,
    Histogram, IntegerBinning, InterpretedBuffer, InterpretedInlineBuffer, Metadata, Node, Ntuple,
    Object, Page, Parameter, ParameterizedFunction, RawInlineBuffer, RealInterval, Region,
    RegularBinning, Validate, Variation,
};

fn regular(num: u64) -> RegularBinning {
    RegularBinning::new(num, RealInterval::new(0.0, 1.0).unwrap()).unwrap()
}

fn counts_of(histogram: &Histogram) -> Vec<f64> {
    match histogram.distribution().counts() {
        Counts::Unweighted(c) => match c.counts() {
            InterpretedBuffer::Inline(b) => b.array().unwrap().to_f64_vec().unwrap(),
            InterpretedBuffer::External(_) => panic!("inline counts expected"),
        },
        Counts::Weighted(_) => panic!("unweighted counts expected"),
    }
}

fn two_axis_histogram() -> Histogram {
    let x = Axis::new().with_binning(regular(10)).unwrap().with_expression("x");
    let y = Axis::new()
        .with_binning(CategoryBinning::new(["e", "mu", "tau"]))
        .unwrap()
        .with_expression("flavor");
    let values: Vec<f64> = (0..36).map(f64::from).collect();
    let counts = histbuf::UnweightedCounts::new(InterpretedInlineBuffer::from_values(&values)).unwrap();
    Histogram::new("h", vec![x, y], Distribution::new(counts).unwrap())
        .unwrap()
        .with_title("x by flavor")
}

fn ntuple() -> Ntuple {
    let column = Column::new("pt", DType::Float32)
        .unwrap()
        .with_endianness(Endianness::native());
    let values: Vec<f32> = vec![21.5, 40.0, 33.25, 18.0, 56.5];
    let page = Page::new(RawInlineBuffer::new(bytemuck::cast_slice(&values).to_vec())).unwrap();
    let column_chunk = ColumnChunk::new(vec![page], vec![0, 5]).unwrap();
    Ntuple::new("events", vec![column], vec![Chunk::new(vec![column_chunk]).unwrap()], vec![0, 5]).unwrap()
}

fn collection() -> Collection {
    let fit = ParameterizedFunction::new("fit", "a * x + b")
        .unwrap()
        .with_parameters(vec![
            Parameter::new("a", 2.0).unwrap(),
            Parameter::new("b", -1.0).unwrap(),
        ])
        .unwrap();
    let efficiency = BinnedEvaluatedFunction::new(
        "efficiency",
        vec![Axis::new().with_binning(IntegerBinning::new(0, 4)).unwrap()],
        InterpretedInlineBuffer::from_values(&[0.5f64; 7]),
    )
    .unwrap();
    let objects: Vec<Object> = vec![
        two_axis_histogram().into(),
        ntuple().into(),
        fit.into(),
        efficiency.into(),
    ];
    Collection::new("analysis", objects)
        .unwrap()
        .with_regions(vec![Region::new(["njets >= 2"]).unwrap()])
        .unwrap()
        .with_variations(vec![Variation::new(vec![Assignment::new("jes", "1.05").unwrap()])
            .unwrap()
            .with_systematic(vec![1.0])])
        .unwrap()
        .with_metadata(Metadata::json(r#"{"lumi": 139.0}"#))
        .unwrap()
}

#[test]
fn test_collection_is_valid() {
    let c = collection();
    assert!(c.is_valid().unwrap());
    let Some(Object::Histogram(h)) = c.get("h") else {
        panic!("histogram expected");
    };
    assert_eq!(h.binshape().unwrap(), vec![12, 3]);
    assert_eq!(counts_of(&h)[35], 35.0);
}

#[test]
fn test_container_roundtrip() {
    let original = collection();
    let bytes = original.to_container().unwrap();
    assert_eq!(&bytes[..4], b"hist");
    assert_eq!(&bytes[bytes.len() - 4..], b"hist");

    let back = Collection::from_container(&bytes).unwrap();
    back.check_valid().unwrap();
    assert_eq!(back.identifier(), "analysis");
    let ids: Vec<String> = back.objects().iter().map(Object::identifier).collect();
    assert_eq!(ids, ["h", "events", "fit", "efficiency"]);

    let Some(Object::Histogram(h)) = back.get("h") else {
        panic!("histogram expected");
    };
    assert_eq!(h.title(), "x by flavor");
    assert_eq!(h.binshape().unwrap(), vec![12, 3]);
    assert_eq!(counts_of(&h), (0..36).map(f64::from).collect::<Vec<_>>());

    let Some(Object::Ntuple(n)) = back.get("events") else {
        panic!("ntuple expected");
    };
    let column = n.column("pt").unwrap();
    let page = n.chunks()[0].columns()[0].pages()[0].clone();
    let view = page.array(&column).unwrap();
    assert_eq!(view.to_vec::<f32>().unwrap(), vec![21.5, 40.0, 33.25, 18.0, 56.5]);

    let Some(Object::ParameterizedFunction(fit)) = back.get("fit") else {
        panic!("function expected");
    };
    assert_eq!(fit.parameter("a").unwrap().value(), 2.0);
    assert_eq!(back.variations()[0].systematic(), vec![1.0]);
    assert_eq!(back.metadata().unwrap().data(), r#"{"lumi": 139.0}"#);
}

#[test]
fn test_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("analysis.hist");
    let written = collection().to_file(&path).unwrap();
    assert_eq!(written, std::fs::metadata(&path).unwrap().len());

    for mmap in [true, false] {
        let config = CodecConfig::default().with_mmap(mmap);
        let back = Collection::from_file_with(&path, &config).unwrap();
        assert!(back.is_valid().unwrap());
        assert_eq!(back.objects().len(), 4);
    }
}

#[test]
fn test_stream_matches_buffer() {
    let c = collection();
    let mut sink = Vec::new();
    let written = c.write_container(&mut sink).unwrap();
    assert_eq!(written as usize, sink.len());
    assert_eq!(sink, c.to_container().unwrap());
}

#[test]
fn test_corrupted_trailing_magic() {
    let mut bytes = collection().to_container().unwrap();
    let n = bytes.len();
    bytes[n - 2] = b'X';
    let err = Collection::from_container(&bytes).unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::ContainerFormat));
}

#[test]
fn test_bad_offset_is_rejected() {
    let mut bytes = collection().to_container().unwrap();
    let n = bytes.len();
    bytes[n - 12..n - 4].copy_from_slice(&(n as u64).to_le_bytes());
    let err = Collection::from_container(&bytes).unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::ContainerFormat));
}

#[test]
fn test_regular_binning_shape() {
    let binning = regular(10);
    assert_eq!(binning.validate(&[]).unwrap(), vec![12]);
}

#[test]
fn test_degenerate_integer_binning() {
    let err = IntegerBinning::new(3, 3).validate(&[]).unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::Structure));
}

#[test]
fn test_edges_binning() {
    let duplicated = EdgesBinning::new(vec![0.0, 1.0, 1.0, 2.0]).unwrap();
    assert!(duplicated.validate(&[]).unwrap_err().is_structural());
    let edges = EdgesBinning::new(vec![0.0, 1.0, 3.0]).unwrap();
    assert_eq!(edges.validate(&[]).unwrap(), vec![5]);
}

#[test]
fn test_axis_cannot_be_shared() {
    let axis = Axis::new().with_binning(regular(2)).unwrap();
    let counts = || {
        let c = histbuf::UnweightedCounts::new(InterpretedInlineBuffer::from_values(&[0u8; 4])).unwrap();
        Distribution::new(c).unwrap()
    };
    let first = Histogram::new("a", vec![axis.clone()], counts()).unwrap();
    let err = Histogram::new("b", vec![axis.clone()], counts()).unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::Ownership));
    assert_eq!(first.axis()[0], axis);
}

#[test]
fn test_invalid_page_offsets() {
    let page = |n: usize| Page::new(RawInlineBuffer::new(vec![0u8; n])).unwrap();
    let chunk = ColumnChunk::new(vec![page(5), page(7)], vec![1, 5, 12]).unwrap();
    assert!(chunk.validate(&[]).unwrap_err().is_structural());
    let chunk = ColumnChunk::new(vec![page(5), page(0), page(7)], vec![0, 5, 5, 12]).unwrap();
    assert!(chunk.validate(&[]).is_ok());
}

#[test]
fn test_deferred_counts_read_as_zeros() {
    let counts = InterpretedInlineBuffer::deferred(DType::Float64);
    let distribution = Distribution::new(histbuf::UnweightedCounts::new(counts.clone()).unwrap()).unwrap();
    let axis = Axis::new().with_binning(regular(18)).unwrap();
    let histogram = Histogram::new("h", vec![axis], distribution).unwrap();
    let _root = Collection::new("c", vec![histogram.into()]).unwrap();

    let view = counts.array().unwrap();
    assert_eq!(view.shape(), &[20]);
    assert_eq!(view.to_vec::<f64>().unwrap(), vec![0.0; 20]);
}

#[test]
fn test_node_outside_collection() {
    let axis = Axis::new();
    let err = axis.collection().unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::Structure));
    let c = collection();
    let Some(Object::Histogram(h)) = c.get("h") else {
        panic!("histogram expected");
    };
    assert_eq!(h.axis()[1].collection().unwrap(), c);
}
