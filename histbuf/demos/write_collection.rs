//! Fill a two-axis histogram and a small ntuple, then write them to a container

use histbuf::{
    Axis, CategoryBinning, Chunk, Collection, Column, ColumnChunk, DType, Distribution,
    Endianness, Histogram, InterpretedInlineBuffer, Ntuple, Page, RawInlineBuffer, RealInterval,
    RegularBinning, Result, UnweightedCounts,
};
use std::time::Instant;

const FLAVORS: [&str; 3] = ["e", "mu", "tau"];

fn main() -> Result<()> {
    let events = build_demo_events(100_000);
    println!("Generated {} events", events.len());

    // 50 regular bins in pt plus underflow and overflow, by flavor
    let start = Instant::now();
    let nbins = 50u64;
    let mut counts = vec![0u64; (nbins as usize + 2) * FLAVORS.len()];
    for &(pt, flavor) in &events {
        let slot = if pt < 0.0 {
            0
        } else if pt >= 100.0 {
            nbins as usize + 1
        } else {
            1 + (pt / 100.0 * nbins as f64) as usize
        };
        counts[slot * FLAVORS.len() + flavor] += 1;
    }
    println!("Filled histogram in {:?}", start.elapsed());

    let pt = Axis::new()
        .with_binning(RegularBinning::new(nbins, RealInterval::new(0.0, 100.0)?)?)?
        .with_expression("pt");
    let flavor = Axis::new()
        .with_binning(CategoryBinning::new(FLAVORS))?
        .with_expression("flavor");
    let distribution = Distribution::new(UnweightedCounts::new(InterpretedInlineBuffer::from_values(&counts))?)?;
    let histogram = Histogram::new("pt_by_flavor", vec![pt, flavor], distribution)?
        .with_title("Transverse momentum by lepton flavor");

    // one chunk, pages of 10k entries
    let column = Column::new("pt", DType::Float64)?.with_endianness(Endianness::native());
    let values: Vec<f64> = events.iter().map(|&(pt, _)| pt).collect();
    let mut pages = Vec::new();
    let mut offsets = vec![0u64];
    for page in values.chunks(10_000) {
        pages.push(Page::new(RawInlineBuffer::new(bytemuck::cast_slice(page).to_vec()))?);
        offsets.push(offsets[offsets.len() - 1] + page.len() as u64);
    }
    let total = offsets[offsets.len() - 1];
    let chunk = Chunk::new(vec![ColumnChunk::new(pages, offsets)?])?;
    let ntuple = Ntuple::new("events", vec![column], vec![chunk], vec![0, total])?;

    let collection = Collection::new("demo", vec![histogram.into(), ntuple.into()])?;

    let start = Instant::now();
    let written = collection.to_file("demo.hist")?;
    println!("Wrote {written} bytes to demo.hist in {:?}", start.elapsed());
    println!("\nRun 'cargo run --example read_collection' to read it back!");
    Ok(())
}

/// Deterministic pseudo-random (pt, flavor) pairs for demo purposes
fn build_demo_events(n: usize) -> Vec<(f64, usize)> {
    let mut state = 0x2545_f491_4f6c_dd1du64;
    (0..n)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let pt = (state % 12_000) as f64 / 100.0 - 5.0;
            (pt, (state >> 32) as usize % FLAVORS.len())
        })
        .collect()
}
