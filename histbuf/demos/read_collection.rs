//! Read the container written by `write_collection` and summarize it

use histbuf::{Counts, InterpretedBuffer, Object, Result};
use std::time::Instant;

fn main() -> Result<()> {
    let filename = "demo.hist";

    if !std::path::Path::new(filename).exists() {
        println!("File '{filename}' not found!");
        println!("   Run 'cargo run --example write_collection' first");
        return Ok(());
    }

    let start = Instant::now();
    let collection = histbuf::Collection::from_file(filename)?;
    println!("Decoded container in {:.3}ms", start.elapsed().as_secs_f64() * 1000.0);

    let start = Instant::now();
    collection.check_valid()?;
    println!("Validated in {:.3}ms", start.elapsed().as_secs_f64() * 1000.0);

    println!("\nCollection {:?}:", collection.identifier());
    for object in collection.objects() {
        match object {
            Object::Histogram(h) => {
                println!("   histogram {:?} ({}), bins {:?}", h.identifier(), h.title(), h.binshape()?);
                if let Counts::Unweighted(counts) = h.distribution().counts() {
                    if let InterpretedBuffer::Inline(buffer) = counts.counts() {
                        let view = buffer.array()?;
                        let total: f64 = view.to_f64_vec()?.iter().sum();
                        println!("      {total} entries, shape {:?}", view.shape());
                    }
                }
            }
            Object::Ntuple(n) => {
                println!("   ntuple {:?}, {} entries", n.identifier(), n.entries());
                for column in n.columns() {
                    let mut sum = 0.0;
                    for chunk in n.chunks() {
                        for column_chunk in chunk.columns() {
                            for page in column_chunk.pages() {
                                sum += page.array(&column)?.to_f64_vec()?.iter().sum::<f64>();
                            }
                        }
                    }
                    println!("      column {:?}: mean {:.3}", column.identifier(), sum / n.entries() as f64);
                }
            }
            other => println!("   {} {:?}", histbuf::Node::kind(&other), other.identifier()),
        }
    }
    Ok(())
}
