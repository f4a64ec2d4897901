//! Recursive shape validation
//!
//! Validation is a depth-first walk. Every node receives the shape of the
//! bins it sits inside (its context) and returns the shape it contributes.
//! Binnings contribute their slot counts, axes concatenate into a bin shape,
//! and buffers check that they hold exactly as many elements as their
//! context describes. The first violation aborts the walk.

use crate::error::Result;

/// Multiplicities contributed by nested axes, outermost first
pub type Shape = Vec<usize>;

/// A node that can check itself against an enclosing shape
pub trait Validate {
    /// Check this node and its children; return the shape this node adds
    fn validate(&self, context: &[usize]) -> Result<Shape>;
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self, context: &[usize]) -> Result<Shape> {
        match self {
            Some(node) => node.validate(context),
            None => Ok(context.to_vec()),
        }
    }
}

/// Validate every node of a vector against the same context
pub(crate) fn validate_all<T: Validate>(nodes: &[T], context: &[usize]) -> Result<()> {
    for node in nodes {
        node.validate(context)?;
    }
    Ok(())
}

/// `context` followed by `inner`
pub(crate) fn extend(context: &[usize], inner: &[usize]) -> Shape {
    let mut shape = Vec::with_capacity(context.len() + inner.len());
    shape.extend_from_slice(context);
    shape.extend_from_slice(inner);
    shape
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend() {
        assert_eq!(extend(&[2], &[3, 4]), vec![2, 3, 4]);
        assert_eq!(extend(&[], &[5]), vec![5]);
    }

    #[test]
    fn test_absent_node_passes_context_through() {
        let absent: Option<crate::binning::IntegerBinning> = None;
        assert_eq!(absent.validate(&[7]).unwrap(), vec![7]);
    }
}
